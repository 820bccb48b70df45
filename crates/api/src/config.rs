//! Process configuration for the HTTP binary.

use tracing::warn;

use finken_infra::{ConfigError, LedgerConfig, StoreConfig};

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEV_JWT_SECRET: &str = "dev-secret";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    pub bind_addr: String,
    pub jwt_secret: String,
    pub ledger: LedgerConfig,
    pub store: StoreConfig,
}

impl ApiConfig {
    /// Reads `FINKEN_BIND_ADDR`, `JWT_SECRET`, the ledger settings and the
    /// store selection.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bind_addr = lookup("FINKEN_BIND_ADDR")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());

        let jwt_secret = match lookup("JWT_SECRET").filter(|v| !v.is_empty()) {
            Some(secret) => secret,
            None => {
                warn!("JWT_SECRET not set; using insecure dev default");
                DEV_JWT_SECRET.to_string()
            }
        };

        Ok(Self {
            bind_addr,
            jwt_secret,
            ledger: LedgerConfig::from_lookup(&lookup),
            store: StoreConfig::from_lookup(&lookup)?,
        })
    }

    /// Config for an in-process server backed by the in-memory store.
    pub fn with_secret(jwt_secret: impl Into<String>) -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            jwt_secret: jwt_secret.into(),
            ledger: LedgerConfig::default(),
            store: StoreConfig::InMemory,
        }
    }
}
