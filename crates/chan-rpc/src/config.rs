//! # Node Configuration
//!
//! Loaded from YAML. Every field has a default, so an empty document is a
//! valid configuration:
//!
//! ```yaml
//! tolerance:
//!   past_secs: 5
//!   future_secs: 10
//! retry:
//!   max_attempts: 5
//!   delay_ms: 200
//!   backoff: exponential
//! confirmation_timeout_secs: 30
//! join_window_secs: 60
//! ```

use std::path::{Path, PathBuf};

use chan_core::TolerancePolicy;
use chan_sync::RetryPolicy;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Upper bound on either clock tolerance.
pub const MAX_TOLERANCE_SECS: u64 = 3600;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeConfig {
    #[serde(default)]
    pub tolerance: TolerancePolicy,
    /// Applied to arbitrator calls and peer requests.
    #[serde(default)]
    pub retry: RetryPolicy,
    /// How long an authored block may stay short of full confirmation
    /// before its calldata is posted on-chain.
    #[serde(default = "default_confirmation_timeout_secs")]
    pub confirmation_timeout_secs: u64,
    /// Deadline offset for join commitments this node authors.
    #[serde(default = "default_join_window_secs")]
    pub join_window_secs: u64,
}

fn default_confirmation_timeout_secs() -> u64 {
    30
}

fn default_join_window_secs() -> u64 {
    60
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            tolerance: TolerancePolicy::default(),
            retry: RetryPolicy::default(),
            confirmation_timeout_secs: default_confirmation_timeout_secs(),
            join_window_secs: default_join_window_secs(),
        }
    }
}

impl NodeConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(yaml)?
        };
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let yaml = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&yaml)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid("retry.max_attempts must be at least 1".into()));
        }
        for (name, secs) in [
            ("tolerance.past_secs", self.tolerance.past_secs),
            ("tolerance.future_secs", self.tolerance.future_secs),
        ] {
            if secs > MAX_TOLERANCE_SECS {
                return Err(ConfigError::Invalid(format!(
                    "{name} is {secs}, limit is {MAX_TOLERANCE_SECS}"
                )));
            }
        }
        if self.confirmation_timeout_secs == 0 {
            return Err(ConfigError::Invalid("confirmation_timeout_secs must be positive".into()));
        }
        if self.join_window_secs == 0 {
            return Err(ConfigError::Invalid("join_window_secs must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chan_sync::Backoff;
    use std::io::Write;

    #[test]
    fn empty_document_is_default() {
        assert_eq!(NodeConfig::from_yaml_str("").unwrap(), NodeConfig::default());
        assert_eq!(NodeConfig::from_yaml_str("{}").unwrap(), NodeConfig::default());
    }

    #[test]
    fn partial_document_keeps_other_defaults() {
        let config = NodeConfig::from_yaml_str(
            "tolerance:\n  future_secs: 20\nretry:\n  backoff: fixed\n",
        )
        .unwrap();
        assert_eq!(config.tolerance.future_secs, 20);
        assert_eq!(config.tolerance.past_secs, 5);
        assert_eq!(config.retry.backoff, Backoff::Fixed);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.confirmation_timeout_secs, 30);
    }

    #[test]
    fn rejects_invalid_values() {
        assert!(matches!(
            NodeConfig::from_yaml_str("retry:\n  max_attempts: 0\n"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            NodeConfig::from_yaml_str("tolerance:\n  past_secs: 7200\n"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            NodeConfig::from_yaml_str("join_window_secs: 0\n"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            NodeConfig::from_yaml_str("unknown_field: 1\n"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn zero_tolerance_is_allowed() {
        let config = NodeConfig::from_yaml_str("tolerance:\n  past_secs: 0\n  future_secs: 0\n").unwrap();
        assert_eq!(config.tolerance.past_secs, 0);
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "confirmation_timeout_secs: 12").unwrap();
        let config = NodeConfig::load(file.path()).unwrap();
        assert_eq!(config.confirmation_timeout_secs, 12);

        let missing = NodeConfig::load(Path::new("/nonexistent/chan.yaml"));
        assert!(matches!(missing, Err(ConfigError::Io { .. })));
    }
}
