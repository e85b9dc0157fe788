use crate::error::{Error, Result};
use clap::ValueEnum;
use serde::Deserialize;
use std::path::Path;

/// Difficulty tier. Selects how many initial queries are generated, how many
/// research loops may run, and which reasoning model is used by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

pub struct TierSettings {
    pub initial_queries: u32,
    pub max_loops: u32,
    pub reasoning_model: &'static str,
}

impl Difficulty {
    pub fn tier(&self) -> TierSettings {
        match self {
            Self::Easy => TierSettings {
                initial_queries: 1,
                max_loops: 1,
                reasoning_model: "gemini-2.0-flash",
            },
            Self::Medium => TierSettings {
                initial_queries: 3,
                max_loops: 2,
                reasoning_model: "gemini-2.5-flash-preview-05-20",
            },
            Self::Hard => TierSettings {
                initial_queries: 5,
                max_loops: 3,
                reasoning_model: "gemini-2.5-pro-preview-05-06",
            },
        }
    }
}

impl std::fmt::Display for Difficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Easy => write!(f, "easy"),
            Self::Medium => write!(f, "medium"),
            Self::Hard => write!(f, "hard"),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub research: ResearchConfig,
    #[serde(default)]
    pub models: Option<ModelsConfig>,
}

#[derive(Debug, Deserialize)]
pub struct LlmConfig {
    /// Reasoning model for every tier; CLI `--model` still wins.
    pub model: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    pub api_key_env: Option<String>,
    pub base_url: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: None,
            max_tokens: default_max_tokens(),
            api_key_env: None,
            base_url: None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ResearchConfig {
    pub initial_queries: Option<u32>,
    pub max_loops: Option<u32>,
    /// Model used to write search queries. Kept fast and cheap regardless of tier.
    #[serde(default = "default_query_model")]
    pub query_model: String,
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            initial_queries: None,
            max_loops: None,
            query_model: default_query_model(),
        }
    }
}

/// Per-stage model configuration for the `[models]` config section.
#[derive(Debug, Deserialize)]
pub struct ModelConfig {
    pub model: String,
    pub base_url: Option<String>,
    pub api_key_env: Option<String>,
    pub max_tokens: Option<u32>,
}

/// Stage-specific model routing: overrides the resolved reasoning model for
/// individual pipeline stages.
#[derive(Debug, Deserialize)]
pub struct ModelsConfig {
    pub query_generation: Option<ModelConfig>,
    pub web_research: Option<ModelConfig>,
    pub reflection: Option<ModelConfig>,
    pub answer: Option<ModelConfig>,
}

fn default_max_tokens() -> u32 {
    8192
}
fn default_query_model() -> String {
    "gemini-2.0-flash".into()
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("Failed to read config {}: {e}", path.display())))?;
        toml::from_str(&content).map_err(|e| Error::config(format!("Failed to parse config: {e}")))
    }

    /// Effective reasoning model: CLI override > `[llm].model` > tier default.
    pub fn reasoning_model(&self, difficulty: Difficulty, cli_override: Option<&str>) -> String {
        cli_override
            .map(str::to_string)
            .or_else(|| self.llm.model.clone())
            .unwrap_or_else(|| difficulty.tier().reasoning_model.to_string())
    }

    pub fn initial_queries(&self, difficulty: Difficulty) -> u32 {
        self.research
            .initial_queries
            .unwrap_or_else(|| difficulty.tier().initial_queries)
            .max(1)
    }

    pub fn max_loops(&self, difficulty: Difficulty) -> u32 {
        self.research
            .max_loops
            .unwrap_or_else(|| difficulty.tier().max_loops)
            .max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_defaults_resolve_per_difficulty() {
        let config = Config::default();
        assert_eq!(
            config.reasoning_model(Difficulty::Easy, None),
            "gemini-2.0-flash"
        );
        assert_eq!(
            config.reasoning_model(Difficulty::Medium, None),
            "gemini-2.5-flash-preview-05-20"
        );
        assert_eq!(
            config.reasoning_model(Difficulty::Hard, None),
            "gemini-2.5-pro-preview-05-06"
        );
        assert_eq!(config.initial_queries(Difficulty::Easy), 1);
        assert_eq!(config.initial_queries(Difficulty::Medium), 3);
        assert_eq!(config.initial_queries(Difficulty::Hard), 5);
        assert_eq!(config.max_loops(Difficulty::Easy), 1);
        assert_eq!(config.max_loops(Difficulty::Medium), 2);
        assert_eq!(config.max_loops(Difficulty::Hard), 3);
    }

    #[test]
    fn cli_model_overrides_tier_default() {
        let config = Config::default();
        assert_eq!(
            config.reasoning_model(Difficulty::Hard, Some("gemini-exp-1206")),
            "gemini-exp-1206"
        );
    }

    #[test]
    fn cli_model_overrides_config_model() {
        let toml = r#"
[llm]
model = "gemini-from-config"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(
            config.reasoning_model(Difficulty::Medium, None),
            "gemini-from-config"
        );
        assert_eq!(
            config.reasoning_model(Difficulty::Medium, Some("gemini-from-cli")),
            "gemini-from-cli"
        );
    }

    #[test]
    fn full_config_parses() {
        let toml = r#"
[llm]
max_tokens = 4096
api_key_env = "MY_GEMINI_KEY"
base_url = "http://localhost:8080/v1beta"

[research]
initial_queries = 4
max_loops = 5
query_model = "gemini-2.0-flash-lite"

[models]
[models.reflection]
model = "gemini-2.5-pro-preview-05-06"
max_tokens = 2048
[models.answer]
model = "gemini-2.5-pro-preview-05-06"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.llm.max_tokens, 4096);
        assert_eq!(config.llm.api_key_env.as_deref(), Some("MY_GEMINI_KEY"));
        assert_eq!(config.initial_queries(Difficulty::Easy), 4);
        assert_eq!(config.max_loops(Difficulty::Easy), 5);
        assert_eq!(config.research.query_model, "gemini-2.0-flash-lite");
        let models = config.models.unwrap();
        assert!(models.reflection.is_some());
        assert!(models.answer.is_some());
        assert!(models.query_generation.is_none());
        assert!(models.web_research.is_none());
    }

    #[test]
    fn minimal_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert!(config.llm.model.is_none());
        assert_eq!(config.llm.max_tokens, 8192);
        assert_eq!(config.research.query_model, "gemini-2.0-flash");
        assert!(config.models.is_none());
    }

    #[test]
    fn loop_and_query_counts_never_zero() {
        let toml = r#"
[research]
initial_queries = 0
max_loops = 0
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.initial_queries(Difficulty::Medium), 1);
        assert_eq!(config.max_loops(Difficulty::Medium), 1);
    }
}
