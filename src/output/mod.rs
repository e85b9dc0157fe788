use crate::citations;
use crate::config::Difficulty;
use crate::research::{ResearchReport, Source};
use askama::Template;
use chrono::Utc;
use colored::Colorize;
use fancy_regex::Regex;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::LazyLock;
use std::time::Duration;

const BANNER: &str = r#"
  ___  ___ ___  _   _ _ __
 / __|/ __/ _ \| | | | '__|
 \__ \ (_| (_) | |_| | |
 |___/\___\___/ \__,_|_|
"#;

static MD_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[([^\]]*)\]\((https?://[^)\s]+)\)").expect("markdown link pattern")
});

/// Builds the strings printed to the terminal. Color is controlled globally
/// through `colored::control`; `no_color` additionally drops the glyph
/// decorations that aren't ANSI codes.
pub struct Renderer {
    no_color: bool,
}

impl Renderer {
    pub fn new(no_color: bool) -> Self {
        Self { no_color }
    }

    pub fn format_header(&self, query: &str, difficulty: Difficulty, model: &str) -> String {
        let tier_label = difficulty.to_string().to_uppercase();
        let tier = match difficulty {
            Difficulty::Easy => tier_label.green().bold(),
            Difficulty::Medium => tier_label.yellow().bold(),
            Difficulty::Hard => tier_label.red().bold(),
        };
        let icon = match difficulty {
            Difficulty::Easy => "🟢 ",
            Difficulty::Medium => "🟡 ",
            Difficulty::Hard => "🔴 ",
        };
        let icon = if self.no_color { "" } else { icon };

        let mut out = String::new();
        out.push_str(&format!("{}\n", BANNER.blue().bold()));
        out.push_str(&format!("{} {}\n", "Query:".cyan().bold(), query.yellow()));
        out.push_str(&format!("{} {icon}{tier}\n", "Difficulty:".cyan().bold()));
        out.push_str(&format!("{} {model}\n", "Model:".cyan().bold()));
        out.push_str(&format!(
            "{} {}\n",
            "Date:".cyan().bold(),
            Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
        ));
        out
    }

    pub fn format_answer(&self, report: &ResearchReport) -> String {
        let body = citations::strip_unresolved_redirects(&report.answer);
        format!(
            "\n{}\n\n{}\n",
            "═══ Search Results ═══".green().bold(),
            style_markdown(&body)
        )
    }

    pub fn format_sources(&self, sources: &[Source]) -> String {
        if sources.is_empty() {
            return String::new();
        }
        let mut out = String::new();
        out.push_str(&format!("\n{}\n", "SOURCES & CITATIONS".yellow().bold()));
        for (i, source) in sources.iter().enumerate() {
            out.push_str(&format!(
                "  [{}] {} {}\n",
                i + 1,
                source.label.yellow(),
                source.url.cyan().underline()
            ));
        }
        out
    }

    pub fn format_completion(&self, elapsed: Duration) -> String {
        format!(
            "\n{}\n",
            format!("Search completed in {:.2}s", elapsed.as_secs_f64())
                .green()
                .bold()
        )
    }

    pub fn format_saved(&self, path: &std::path::Path) -> String {
        format!(
            "{}\n",
            format!("Results saved to {}", path.display()).green()
        )
    }

    pub fn format_error(&self, message: &str) -> String {
        format!("{} {message}\n", "ERROR:".red().bold())
    }
}

/// Light markdown styling for terminal display: headings, bullets, and
/// citation links collapsed to their labels (the sources table carries the
/// full URLs).
fn style_markdown(text: &str) -> String {
    let linked = MD_LINK.replace_all(text, |caps: &fancy_regex::Captures| {
        format!("{}🔗", caps[1].blue().underline())
    });

    linked
        .lines()
        .map(|line| {
            let trimmed = line.trim_start();
            if let Some(h) = trimmed.strip_prefix("## ") {
                h.to_uppercase().cyan().bold().to_string()
            } else if let Some(h) = trimmed.strip_prefix("# ") {
                h.to_uppercase().cyan().bold().to_string()
            } else if let Some(h) = trimmed.strip_prefix("### ") {
                h.bold().to_string()
            } else if let Some(item) = trimmed
                .strip_prefix("- ")
                .or_else(|| trimmed.strip_prefix("* "))
            {
                format!("  • {item}")
            } else {
                line.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Transient spinner per pipeline stage. Falls back to plain stage lines
/// when color/decoration is disabled.
pub struct Progress {
    plain: bool,
}

impl Progress {
    pub fn new(no_color: bool) -> Self {
        Self { plain: no_color }
    }

    pub fn stage(&self, label: &str) -> StageGuard {
        if self.plain {
            println!("> {label}");
            return StageGuard { bar: None };
        }
        println!("{} {label}", "▶".blue().bold());
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg} ({elapsed})")
                .unwrap(),
        );
        bar.set_message(label.to_string());
        bar.enable_steady_tick(Duration::from_millis(100));
        StageGuard { bar: Some(bar) }
    }
}

pub struct StageGuard {
    bar: Option<ProgressBar>,
}

impl StageGuard {
    pub fn done(mut self) {
        self.finish();
    }

    fn finish(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
    }
}

impl Drop for StageGuard {
    fn drop(&mut self) {
        self.finish();
    }
}

#[derive(Template)]
#[template(path = "report.txt")]
struct SavedReport<'a> {
    query: &'a str,
    difficulty: String,
    model: &'a str,
    generated_at: String,
    answer: &'a str,
    sources: &'a [Source],
}

/// Render the plain-text report written by `--save`. Never carries ANSI
/// styling, whatever the terminal settings.
pub fn render_saved_report(
    report: &ResearchReport,
    difficulty: Difficulty,
    model: &str,
) -> anyhow::Result<String> {
    let answer = citations::strip_unresolved_redirects(&report.answer);
    let saved = SavedReport {
        query: &report.topic,
        difficulty: difficulty.to_string(),
        model,
        generated_at: Utc::now().format("%Y-%m-%d %H:%M UTC").to_string(),
        answer: answer.trim_end(),
        sources: &report.sources,
    };
    saved
        .render()
        .map_err(|e| anyhow::anyhow!("template render: {e}"))
}
