//! Crate configuration
//!
//! Loaded from an optional TOML file, then overridden by `CONVMEM__*`
//! environment variables (`CONVMEM__TOKEN_BUDGET__MODEL_LIMIT=16000`). API
//! keys fall back to `OPENAI_API_KEY`.

use crate::context::summarizer::SummarizerConfig;
use crate::context::token_budget::TokenBudgetConfig;
use crate::context::token_estimator::EstimatorKind;
use crate::error::{ContextError, Result};
use crate::logging::LoggingConfig;
use crate::model::ModelConfig;
use crate::strategy::{StrategyConfig, StrategySection};
use serde::Deserialize;
use tracing::debug;

/// Prefix for environment overrides
pub const ENV_PREFIX: &str = "CONVMEM";

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub memory: MemoryConfig,

    #[serde(default)]
    pub token_budget: TokenBudgetConfig,

    #[serde(default)]
    pub summarizer: SummarizerConfig,

    #[serde(default)]
    pub model: ModelConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Which summarizer backs the summarizing strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummarizerBackend {
    /// Chat-completions endpoint from the `summarizer` section
    #[default]
    Llm,
    /// Local transcript concatenation, no network
    Concatenation,
}

/// Memory strategy configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MemoryConfig {
    #[serde(default)]
    pub strategy: StrategyConfig,

    /// Messages containing any of these words are flagged key on append
    #[serde(default)]
    pub key_keywords: Vec<String>,

    #[serde(default)]
    pub estimator: EstimatorKind,

    #[serde(default)]
    pub summarizer_backend: SummarizerBackend,
}

impl Config {
    /// Load from `path` (if given) and the environment, then validate
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            debug!(path, "Loading configuration file");
            builder = builder.add_source(config::File::with_name(path).required(true));
        }
        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );

        let built = builder.build()?;
        check_strategy_section(&built)?;
        let config: Config = built.try_deserialize()?;
        let config = config.with_env_secrets();
        config.validate()?;
        Ok(config)
    }

    /// Fill missing API keys from the process environment
    pub fn with_env_secrets(mut self) -> Self {
        self.summarizer = self.summarizer.from_env();
        self.model = self.model.from_env();
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.memory.strategy.validate()?;
        self.token_budget
            .validate()
            .map_err(|e| ContextError::InvalidConfiguration(e.to_string()))?;
        if self.summarizer.timeout_ms == 0 || self.model.timeout_ms == 0 {
            return Err(ContextError::InvalidConfiguration(
                "timeout_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Resolve `memory.strategy` on its own so a bad name or parameter is
/// reported as invalid configuration rather than a generic load error
fn check_strategy_section(built: &config::Config) -> Result<()> {
    match built.get::<StrategySection>("memory.strategy") {
        Ok(section) => StrategyConfig::try_from(section).map(|_| ()),
        Err(config::ConfigError::NotFound(_)) => Ok(()),
        Err(e) => Err(ContextError::InvalidConfiguration(format!(
            "memory.strategy: {}",
            e
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::SummaryTrigger;
    use std::io::Write;

    fn write_toml(contents: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("convmem-{}.toml", uuid::Uuid::new_v4()));
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_defaults_validate() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.memory.strategy.label(), "sliding_window(6)");
        assert_eq!(config.token_budget.model_limit, 8000);
        assert_eq!(config.memory.estimator, EstimatorKind::Word);
    }

    #[test]
    fn test_load_from_file() {
        let path = write_toml(
            r#"
[memory]
key_keywords = ["remember"]
summarizer_backend = "concatenation"

[memory.strategy]
kind = "recursive_summary_window"
window_size = 4
trigger = { every_messages = 2 }

[token_budget]
model_limit = 4000
completion_reserve = 500
"#,
        );
        let config = Config::load(path.to_str()).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(
            config.memory.strategy,
            StrategyConfig::RecursiveSummaryWindow {
                window_size: 4,
                trigger: SummaryTrigger::every(2)
            }
        );
        assert_eq!(config.memory.key_keywords, vec!["remember".to_string()]);
        assert_eq!(config.memory.summarizer_backend, SummarizerBackend::Concatenation);
        assert_eq!(config.token_budget.model_limit, 4000);
        assert_eq!(config.token_budget.completion_reserve, 500);
    }

    #[test]
    fn test_load_rejects_invalid_strategy() {
        let path = write_toml(
            r#"
[memory.strategy]
kind = "sliding_window"
window_size = 0
"#,
        );
        let result = Config::load(path.to_str());
        std::fs::remove_file(&path).ok();
        assert!(matches!(result, Err(ContextError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_load_rejects_unknown_strategy_kind() {
        let path = write_toml(
            r#"
[memory.strategy]
kind = "lossless_magic"
"#,
        );
        let result = Config::load(path.to_str());
        std::fs::remove_file(&path).ok();
        match result {
            Err(ContextError::InvalidConfiguration(msg)) => {
                assert!(msg.contains("lossless_magic"))
            }
            other => panic!("expected invalid configuration, got {:?}", other),
        }
    }

    #[test]
    fn test_load_rejects_malformed_strategy_table() {
        let path = write_toml(
            r#"
[memory.strategy]
window_size = 3
"#,
        );
        let result = Config::load(path.to_str());
        std::fs::remove_file(&path).ok();
        assert!(matches!(result, Err(ContextError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_load_accepts_strategy_alias() {
        let path = write_toml(
            r#"
[memory.strategy]
kind = "summary-key"
"#,
        );
        let config = Config::load(path.to_str()).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(
            config.memory.strategy,
            StrategyConfig::RecursiveSummaryKey {
                trigger: SummaryTrigger::default()
            }
        );
    }

    #[test]
    fn test_load_missing_file() {
        let result = Config::load(Some("/nonexistent/convmem-config"));
        assert!(matches!(result, Err(ContextError::Config(_))));
    }

    #[test]
    fn test_reserve_must_fit_limit() {
        let mut config = Config::default();
        config.token_budget.completion_reserve = config.token_budget.model_limit;
        assert!(matches!(
            config.validate(),
            Err(ContextError::InvalidConfiguration(_))
        ));
    }
}
