//! Engine configuration
//!
//! Every field has a default, so an empty JSON object is a valid configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::compliance::ComplianceThresholds;
use crate::ledger::chart::codes;

/// Top-level configuration for the pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Only transactions in this currency are posted
    pub base_currency: String,
    pub posting: PostingAccounts,
    pub classification: ClassificationConfig,
    /// Directory holding `<jurisdiction>_<taxYear>.json` rulebooks
    pub rulebook_dir: Option<PathBuf>,
    pub compliance: ComplianceThresholds,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            base_currency: "NGN".to_string(),
            posting: PostingAccounts::default(),
            classification: ClassificationConfig::default(),
            rulebook_dir: None,
            compliance: ComplianceThresholds::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_currency.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "base_currency cannot be empty".to_string(),
            ));
        }
        let threshold = self.classification.ai_confidence_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ConfigError::Invalid(format!(
                "ai_confidence_threshold {threshold} must be within [0, 1]"
            )));
        }
        if self.classification.ai_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "ai_timeout_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Settlement accounts: the bank for cash, receivables and payables for
/// transactions posted on account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostingAccounts {
    pub bank_account: String,
    pub receivable_account: String,
    pub payable_account: String,
}

impl Default for PostingAccounts {
    fn default() -> Self {
        Self {
            bank_account: codes::BANK.to_string(),
            receivable_account: codes::ACCOUNTS_RECEIVABLE.to_string(),
            payable_account: codes::ACCOUNTS_PAYABLE.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassificationConfig {
    /// Below this rule-based confidence the AI collaborator is consulted
    pub ai_confidence_threshold: f64,
    pub ai_timeout_ms: u64,
}

impl ClassificationConfig {
    pub fn ai_timeout(&self) -> Duration {
        Duration::from_millis(self.ai_timeout_ms)
    }
}

impl Default for ClassificationConfig {
    fn default() -> Self {
        Self {
            ai_confidence_threshold: 0.6,
            ai_timeout_ms: 3000,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_object_uses_defaults() {
        let config = EngineConfig::from_json_str("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.posting.bank_account, "1020");
    }

    #[test]
    fn test_partial_override() {
        let config = EngineConfig::from_json_str(
            r#"{"classification": {"ai_timeout_ms": 500}, "rulebook_dir": "rulebooks"}"#,
        )
        .unwrap();
        assert_eq!(config.classification.ai_timeout(), Duration::from_millis(500));
        assert_eq!(config.classification.ai_confidence_threshold, 0.6);
        assert_eq!(config.rulebook_dir, Some(PathBuf::from("rulebooks")));
    }

    #[test]
    fn test_invalid_threshold_rejected() {
        let result =
            EngineConfig::from_json_str(r#"{"classification": {"ai_confidence_threshold": 1.5}}"#);
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }
}
