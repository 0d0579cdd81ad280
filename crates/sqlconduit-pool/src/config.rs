//! Pool configuration and the auto-commit release policy.

use serde::{Deserialize, Deserializer};
use sqlconduit_core::{ConfigErrorKind, Error};
use std::fmt;
use std::str::FromStr;

/// What happens to a transaction-capable connection when it is released
/// outside an explicit transaction.
///
/// | mode | effect |
/// |---|---|
/// | `Exception` | ROLLBACK, then fail with `Error::TransactionPolicy` |
/// | `Commit` (`true`, default) | COMMIT |
/// | `Rollback` (`false`) | ROLLBACK |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AutoCommit {
    #[default]
    Commit,
    Rollback,
    Exception,
}

impl AutoCommit {
    pub const fn as_str(self) -> &'static str {
        match self {
            AutoCommit::Commit => "true",
            AutoCommit::Rollback => "false",
            AutoCommit::Exception => "exception",
        }
    }
}

impl From<bool> for AutoCommit {
    fn from(enabled: bool) -> Self {
        if enabled {
            AutoCommit::Commit
        } else {
            AutoCommit::Rollback
        }
    }
}

impl FromStr for AutoCommit {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Ok(AutoCommit::Commit),
            "false" | "0" => Ok(AutoCommit::Rollback),
            "exception" => Ok(AutoCommit::Exception),
            other => Err(Error::config(
                ConfigErrorKind::InvalidSetting,
                format!("invalid auto-commit mode {other:?}; expected true, false or exception"),
            )),
        }
    }
}

impl fmt::Display for AutoCommit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for AutoCommit {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Flag(bool),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Flag(enabled) => Ok(enabled.into()),
            Raw::Text(text) => text.parse().map_err(serde::de::Error::custom),
        }
    }
}

/// Whether released handles are kept for reuse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PoolMode {
    /// Released handles return to the idle set.
    #[default]
    Pooled,
    /// Released handles are dropped; every borrow opens a new connection.
    Detached,
}

/// Connection pool configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    pub mode: PoolMode,
}

impl PoolConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the pool mode.
    pub fn mode(mut self, mode: PoolMode) -> Self {
        self.mode = mode;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_modes() {
        assert_eq!("true".parse::<AutoCommit>().unwrap(), AutoCommit::Commit);
        assert_eq!("0".parse::<AutoCommit>().unwrap(), AutoCommit::Rollback);
        assert_eq!(
            "Exception".parse::<AutoCommit>().unwrap(),
            AutoCommit::Exception
        );
        let err = "sometimes".parse::<AutoCommit>().unwrap_err();
        assert_eq!(err.config_kind(), Some(ConfigErrorKind::InvalidSetting));
    }

    #[test]
    fn deserialize_bool_or_text() {
        let commit: AutoCommit = serde_json::from_str("true").unwrap();
        let rollback: AutoCommit = serde_json::from_str("false").unwrap();
        let strict: AutoCommit = serde_json::from_str("\"exception\"").unwrap();
        assert_eq!(commit, AutoCommit::Commit);
        assert_eq!(rollback, AutoCommit::Rollback);
        assert_eq!(strict, AutoCommit::Exception);
        assert!(serde_json::from_str::<AutoCommit>("\"maybe\"").is_err());
    }

    #[test]
    fn pool_config_defaults() {
        let config: PoolConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.mode, PoolMode::Pooled);
        let config: PoolConfig = serde_json::from_str(r#"{"mode":"detached"}"#).unwrap();
        assert_eq!(config.mode, PoolMode::Detached);
    }
}
