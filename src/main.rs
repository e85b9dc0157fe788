mod citations;
mod config;
mod error;
mod history;
mod http;
mod llm;
mod output;
mod research;

use anyhow::{Context, Result, bail};
use clap::Parser;
use config::{Config, Difficulty};
use llm::{GeminiClient, ModelRouter, TaskKind};
use research::RunOptions;
use std::path::PathBuf;
use std::time::Instant;

#[derive(Parser)]
#[command(
    name = "scour",
    version,
    about = "LLM-driven deep research from your terminal"
)]
struct Cli {
    /// The research query to run
    query: String,

    /// Difficulty tier (affects search breadth, loop depth, and default model)
    #[arg(short, long, value_enum, default_value_t = Difficulty::Medium)]
    difficulty: Difficulty,

    /// Reasoning model override (default depends on difficulty)
    #[arg(short, long)]
    model: Option<String>,

    /// Save the rendered report to a text file
    #[arg(long, value_name = "FILENAME")]
    save: Option<PathBuf>,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// Maximum retries when the model is overloaded
    #[arg(long, default_value_t = 3)]
    retries: u32,

    /// Path to config file
    #[arg(short, long, default_value = "scour.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "scour=info".parse().unwrap()),
        )
        .init();

    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    if cli.no_color {
        colored::control::set_override(false);
    }
    let renderer = output::Renderer::new(cli.no_color);

    if let Err(e) = run(cli, &renderer).await {
        eprint!("{}", renderer.format_error(&format!("{e:#}")));
        std::process::exit(1);
    }
}

async fn run(cli: Cli, renderer: &output::Renderer) -> Result<()> {
    let config = Config::load(&cli.config).unwrap_or_default();

    let api_key_env = config
        .llm
        .api_key_env
        .clone()
        .unwrap_or_else(|| llm::DEFAULT_API_KEY_ENV.into());
    if std::env::var(&api_key_env).is_err() {
        bail!("{api_key_env} is not set. Export it or put it in a .env file.");
    }

    let reasoning_model = config.reasoning_model(cli.difficulty, cli.model.as_deref());
    let opts = RunOptions {
        initial_queries: config.initial_queries(cli.difficulty),
        max_loops: config.max_loops(cli.difficulty),
        max_retries: cli.retries,
    };
    let router = build_router(&config, &reasoning_model)?;

    println!(
        "{}",
        renderer.format_header(&cli.query, cli.difficulty, &reasoning_model)
    );

    let progress = output::Progress::new(cli.no_color);
    let started = Instant::now();
    let report = research::run_research(&router, &cli.query, &opts, &progress).await?;
    let elapsed = started.elapsed();

    print!("{}", renderer.format_answer(&report));
    print!("{}", renderer.format_sources(&report.sources));
    print!("{}", renderer.format_completion(elapsed));

    if let Some(path) = &cli.save {
        let text = output::render_saved_report(&report, cli.difficulty, &reasoning_model)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, &text)
            .with_context(|| format!("write report to {}", path.display()))?;
        print!("{}", renderer.format_saved(path));
    }

    let record = history::RunRecord {
        timestamp: chrono::Utc::now(),
        query: cli.query,
        difficulty: cli.difficulty.to_string(),
        model: reasoning_model,
        research_loops: report.research_loops,
        queries_run: report.queries_run.len(),
        source_count: report.sources.len(),
        duration_secs: elapsed.as_secs_f64(),
    };
    if let Err(e) = record.save() {
        tracing::warn!(error = %e, "failed to save run history");
    }

    Ok(())
}

/// Wire up the per-stage model router: the resolved reasoning model is the
/// default, query writing goes to the fast query model, and any `[models]`
/// entries from the config override individual stages.
fn build_router(config: &Config, reasoning_model: &str) -> Result<ModelRouter> {
    let default = GeminiClient::from_env(
        reasoning_model.to_string(),
        config.llm.max_tokens,
        config.llm.api_key_env.clone(),
        config.llm.base_url.clone(),
    )?;
    let query_client = GeminiClient::from_env(
        config.research.query_model.clone(),
        config.llm.max_tokens,
        config.llm.api_key_env.clone(),
        config.llm.base_url.clone(),
    )?;

    let mut router =
        ModelRouter::new(default).with_client(TaskKind::QueryGeneration, query_client);

    if let Some(models) = &config.models {
        let stages = [
            (TaskKind::QueryGeneration, &models.query_generation),
            (TaskKind::WebResearch, &models.web_research),
            (TaskKind::Reflection, &models.reflection),
            (TaskKind::Answer, &models.answer),
        ];
        for (task, stage) in stages {
            if let Some(mc) = stage {
                let client = GeminiClient::from_env(
                    mc.model.clone(),
                    mc.max_tokens.unwrap_or(config.llm.max_tokens),
                    mc.api_key_env
                        .clone()
                        .or_else(|| config.llm.api_key_env.clone()),
                    mc.base_url.clone().or_else(|| config.llm.base_url.clone()),
                )?;
                router = router.with_client(task, client);
            }
        }
    }
    Ok(router)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn zero_arguments_is_a_usage_error() {
        assert!(Cli::try_parse_from(["scour"]).is_err());
    }

    #[test]
    fn default_flag_values() {
        let cli = Cli::try_parse_from(["scour", "rust async runtimes"]).unwrap();
        assert_eq!(cli.query, "rust async runtimes");
        assert_eq!(cli.difficulty, Difficulty::Medium);
        assert_eq!(cli.retries, 3);
        assert!(cli.model.is_none());
        assert!(cli.save.is_none());
        assert!(!cli.no_color);
    }

    #[test]
    fn all_flags_parse() {
        let cli = Cli::try_parse_from([
            "scour",
            "q",
            "--difficulty",
            "hard",
            "--model",
            "gemini-exp-1206",
            "--save",
            "out.txt",
            "--no-color",
            "--retries",
            "7",
        ])
        .unwrap();
        assert_eq!(cli.difficulty, Difficulty::Hard);
        assert_eq!(cli.model.as_deref(), Some("gemini-exp-1206"));
        assert_eq!(cli.save.as_deref(), Some(std::path::Path::new("out.txt")));
        assert!(cli.no_color);
        assert_eq!(cli.retries, 7);
    }

    #[test]
    fn negative_retries_rejected() {
        assert!(Cli::try_parse_from(["scour", "q", "--retries", "-1"]).is_err());
    }
}
