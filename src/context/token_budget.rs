//! Token budget for context payloads
//!
//! The model has a hard context limit. Part of it is reserved for the
//! completion; what remains is the budget a payload may occupy.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Token budget configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenBudgetConfig {
    /// Hard context limit of the model
    #[serde(default = "default_model_limit")]
    pub model_limit: usize,
    /// Tokens held back for the model's reply
    #[serde(default = "default_completion_reserve")]
    pub completion_reserve: usize,
}

fn default_model_limit() -> usize {
    8000
}

fn default_completion_reserve() -> usize {
    1000
}

impl Default for TokenBudgetConfig {
    fn default() -> Self {
        Self {
            model_limit: default_model_limit(),
            completion_reserve: default_completion_reserve(),
        }
    }
}

impl TokenBudgetConfig {
    /// Budget with no completion reserve
    pub fn with_limit(model_limit: usize) -> Self {
        Self {
            model_limit,
            completion_reserve: 0,
        }
    }

    /// Validate that the budget configuration is consistent
    pub fn validate(&self) -> Result<(), BudgetError> {
        if self.model_limit == 0 || self.completion_reserve >= self.model_limit {
            return Err(BudgetError::ConfigurationInvalid {
                reserved: self.completion_reserve,
                max: self.model_limit,
            });
        }
        Ok(())
    }
}

/// Token budget errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BudgetError {
    #[error("Budget exceeded: {used} tokens used, {max} tokens allowed")]
    BudgetExceeded { used: usize, max: usize },

    #[error("Configuration invalid: {reserved} tokens reserved, {max} tokens max")]
    ConfigurationInvalid { reserved: usize, max: usize },
}

/// Token budget manager
#[derive(Debug, Clone)]
pub struct TokenBudgetManager {
    config: TokenBudgetConfig,
}

impl TokenBudgetManager {
    /// Create a new token budget manager
    pub fn new(config: TokenBudgetConfig) -> Result<Self, BudgetError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Tokens a context payload may occupy
    pub fn context_budget(&self) -> usize {
        self.config.model_limit - self.config.completion_reserve
    }

    /// Check if a given token count fits within the context budget
    pub fn check_budget(&self, tokens: usize) -> Result<(), BudgetError> {
        let max = self.context_budget();
        if tokens > max {
            return Err(BudgetError::BudgetExceeded { used: tokens, max });
        }
        Ok(())
    }

    /// Tokens left in the context budget after `used`
    pub fn remaining(&self, used: usize) -> usize {
        self.context_budget().saturating_sub(used)
    }

    /// Get the maximum total tokens
    pub fn max_total(&self) -> usize {
        self.config.model_limit
    }

    /// Get the configuration
    pub fn config(&self) -> &TokenBudgetConfig {
        &self.config
    }
}

impl Default for TokenBudgetManager {
    fn default() -> Self {
        Self {
            config: TokenBudgetConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = TokenBudgetConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_reserve_must_leave_room() {
        let config = TokenBudgetConfig {
            model_limit: 1000,
            completion_reserve: 1000,
        };
        assert!(TokenBudgetManager::new(config).is_err());
        assert!(TokenBudgetManager::new(TokenBudgetConfig::with_limit(0)).is_err());
    }

    #[test]
    fn test_context_budget() {
        let manager = TokenBudgetManager::default();
        assert_eq!(manager.context_budget(), 7000);
        assert_eq!(manager.max_total(), 8000);
    }

    #[test]
    fn test_check_budget() {
        let manager = TokenBudgetManager::default();
        assert!(manager.check_budget(7000).is_ok());
        assert_eq!(
            manager.check_budget(7001),
            Err(BudgetError::BudgetExceeded { used: 7001, max: 7000 })
        );
    }

    #[test]
    fn test_remaining() {
        let manager = TokenBudgetManager::new(TokenBudgetConfig::with_limit(10)).unwrap();
        assert_eq!(manager.remaining(4), 6);
        assert_eq!(manager.remaining(40), 0);
    }
}
