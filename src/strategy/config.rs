//! Strategy selection

use super::trigger::SummaryTrigger;
use crate::error::{ContextError, Result};
use serde::{Deserialize, Serialize};

/// Recognized memory strategies and their parameters.
///
/// Deserializes through [`StrategySection`], so configuration accepts the
/// same names and defaults as [`StrategyConfig::parse`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", try_from = "StrategySection")]
pub enum StrategyConfig {
    /// Every message, unbounded
    Buffer,
    /// The last `window_size` messages
    SlidingWindow { window_size: usize },
    /// Rolling summary plus messages not yet summarized
    RecursiveSummary {
        #[serde(default)]
        trigger: SummaryTrigger,
    },
    /// Rolling summary of everything outside the last `window_size` messages
    RecursiveSummaryWindow {
        window_size: usize,
        #[serde(default = "window_trigger")]
        trigger: SummaryTrigger,
    },
    /// Rolling summary that never folds key messages
    RecursiveSummaryKey {
        #[serde(default)]
        trigger: SummaryTrigger,
    },
}

pub const DEFAULT_WINDOW_SIZE: usize = 6;

/// Raw `[memory.strategy]` table before the name is resolved
#[derive(Debug, Clone, Deserialize)]
pub struct StrategySection {
    pub kind: String,
    #[serde(default)]
    pub window_size: Option<usize>,
    #[serde(default)]
    pub trigger: Option<SummaryTrigger>,
}

impl TryFrom<StrategySection> for StrategyConfig {
    type Error = ContextError;

    fn try_from(section: StrategySection) -> Result<Self> {
        StrategyConfig::parse(&section.kind, section.window_size, section.trigger)
    }
}

/// Summarize as soon as anything leaves the window
fn window_trigger() -> SummaryTrigger {
    SummaryTrigger::every(1)
}

impl Default for StrategyConfig {
    fn default() -> Self {
        StrategyConfig::SlidingWindow {
            window_size: DEFAULT_WINDOW_SIZE,
        }
    }
}

impl StrategyConfig {
    /// Build from a strategy name plus optional parameters.
    ///
    /// Missing parameters fall back to defaults; unknown names are rejected.
    pub fn parse(
        name: &str,
        window_size: Option<usize>,
        trigger: Option<SummaryTrigger>,
    ) -> Result<Self> {
        let window_size = window_size.unwrap_or(DEFAULT_WINDOW_SIZE);
        let config = match name.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
            "buffer" | "in_memory" => StrategyConfig::Buffer,
            "sliding_window" | "window" => StrategyConfig::SlidingWindow { window_size },
            "recursive_summary" | "summary" => StrategyConfig::RecursiveSummary {
                trigger: trigger.unwrap_or_default(),
            },
            "recursive_summary_window" | "summary_window" => StrategyConfig::RecursiveSummaryWindow {
                window_size,
                trigger: trigger.unwrap_or_else(window_trigger),
            },
            "recursive_summary_key" | "summary_key" => StrategyConfig::RecursiveSummaryKey {
                trigger: trigger.unwrap_or_default(),
            },
            other => {
                return Err(ContextError::InvalidConfiguration(format!(
                    "unknown strategy '{}'",
                    other
                )))
            }
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            StrategyConfig::Buffer => Ok(()),
            StrategyConfig::SlidingWindow { window_size } => validate_window(*window_size),
            StrategyConfig::RecursiveSummary { trigger }
            | StrategyConfig::RecursiveSummaryKey { trigger } => trigger.validate(),
            StrategyConfig::RecursiveSummaryWindow {
                window_size,
                trigger,
            } => {
                validate_window(*window_size)?;
                trigger.validate()
            }
        }
    }

    /// Canonical strategy name
    pub fn name(&self) -> &'static str {
        match self {
            StrategyConfig::Buffer => "buffer",
            StrategyConfig::SlidingWindow { .. } => "sliding_window",
            StrategyConfig::RecursiveSummary { .. } => "recursive_summary",
            StrategyConfig::RecursiveSummaryWindow { .. } => "recursive_summary_window",
            StrategyConfig::RecursiveSummaryKey { .. } => "recursive_summary_key",
        }
    }

    /// Name plus parameters, e.g. `sliding_window(6)`
    pub fn label(&self) -> String {
        match self {
            StrategyConfig::Buffer => self.name().to_string(),
            StrategyConfig::SlidingWindow { window_size } => {
                format!("{}({})", self.name(), window_size)
            }
            StrategyConfig::RecursiveSummary { trigger }
            | StrategyConfig::RecursiveSummaryKey { trigger } => {
                format!("{}({})", self.name(), trigger.describe())
            }
            StrategyConfig::RecursiveSummaryWindow {
                window_size,
                trigger,
            } => format!("{}({},{})", self.name(), window_size, trigger.describe()),
        }
    }

    pub fn uses_summarizer(&self) -> bool {
        matches!(
            self,
            StrategyConfig::RecursiveSummary { .. }
                | StrategyConfig::RecursiveSummaryWindow { .. }
                | StrategyConfig::RecursiveSummaryKey { .. }
        )
    }
}

fn validate_window(window_size: usize) -> Result<()> {
    if window_size < 1 {
        return Err(ContextError::InvalidConfiguration(
            "window_size must be at least 1".to_string(),
        ));
    }
    Ok(())
}
