//! Configuration loading for the ledger services.

use core::fmt;

use thiserror::Error;
use tracing::warn;

/// Knobs for the ledger services.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerConfig {
    /// Attempts for an optimistic commit before giving up with `Conflict`.
    pub commit_retries: u32,
}

impl LedgerConfig {
    pub const DEFAULT_COMMIT_RETRIES: u32 = 8;

    /// Reads `FINKEN_COMMIT_RETRIES`; invalid values fall back to the default.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let commit_retries = match lookup("FINKEN_COMMIT_RETRIES") {
            None => Self::DEFAULT_COMMIT_RETRIES,
            Some(raw) => match raw.trim().parse::<u32>() {
                Ok(n) => n.max(1),
                Err(_) => {
                    warn!(value = %raw, "ignoring invalid FINKEN_COMMIT_RETRIES");
                    Self::DEFAULT_COMMIT_RETRIES
                }
            },
        };
        Self { commit_retries }
    }

    pub fn with_commit_retries(mut self, n: u32) -> Self {
        self.commit_retries = n.max(1);
        self
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            commit_retries: Self::DEFAULT_COMMIT_RETRIES,
        }
    }
}

/// Where the ledger is persisted.
#[derive(Clone, PartialEq, Eq, Default)]
pub enum StoreConfig {
    #[default]
    InMemory,
    Postgres {
        database_url: String,
        max_connections: u32,
    },
}

/// Rejected store configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("FINKEN_STORE=postgres requires DATABASE_URL")]
    MissingDatabaseUrl,

    #[error("unknown FINKEN_STORE '{0}' (expected 'memory' or 'postgres')")]
    UnknownStore(String),
}

impl StoreConfig {
    pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

    /// Reads `FINKEN_STORE` (`memory` by default, or `postgres`), `DATABASE_URL`
    /// and `FINKEN_DB_MAX_CONNECTIONS`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let kind = lookup("FINKEN_STORE")
            .map(|v| v.trim().to_ascii_lowercase())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| "memory".to_string());

        match kind.as_str() {
            "memory" | "in-memory" => Ok(StoreConfig::InMemory),
            "postgres" | "postgresql" => {
                let database_url = lookup("DATABASE_URL")
                    .map(|v| v.trim().to_string())
                    .filter(|v| !v.is_empty())
                    .ok_or(ConfigError::MissingDatabaseUrl)?;
                let max_connections = match lookup("FINKEN_DB_MAX_CONNECTIONS") {
                    None => Self::DEFAULT_MAX_CONNECTIONS,
                    Some(raw) => match raw.trim().parse::<u32>() {
                        Ok(n) if n > 0 => n,
                        _ => {
                            warn!(value = %raw, "ignoring invalid FINKEN_DB_MAX_CONNECTIONS");
                            Self::DEFAULT_MAX_CONNECTIONS
                        }
                    },
                };
                Ok(StoreConfig::Postgres {
                    database_url,
                    max_connections,
                })
            }
            _ => Err(ConfigError::UnknownStore(kind)),
        }
    }
}

// Keeps credentials embedded in the URL out of logs.
impl fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreConfig::InMemory => f.write_str("InMemory"),
            StoreConfig::Postgres { max_connections, .. } => f
                .debug_struct("Postgres")
                .field("database_url", &"<redacted>")
                .field("max_connections", max_connections)
                .finish(),
        }
    }
}
