//! Secret and batch size of the refresh endpoint, resolved per request.

use crate::constants::{BATCH_LIMIT_ENV, MAX_BATCH_LIMIT, SECRET_TOKEN_ENV};

use super::config_toml::BatchUpdateToml;

/// Values a single batch update invocation runs with.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BatchUpdateConfig {
    /// Expected bearer token. `None` rejects every request.
    pub secret_token: Option<String>,
    /// Maximum number of pairs refreshed.
    pub batch_limit: u64,
}

/// Supplies the [`BatchUpdateConfig`] of the current invocation.
pub trait ConfigProvider: Send + Sync + 'static {
    fn resolve(&self) -> BatchUpdateConfig;
}

/// Parse a batch limit. Only non-negative integers up to `i64::MAX` are accepted.
pub fn parse_batch_limit(raw: &str) -> Option<u64> {
    raw.trim()
        .parse()
        .ok()
        .filter(|limit| *limit <= MAX_BATCH_LIMIT)
}

/// Reads the environment on every call and falls back to the config file.
#[derive(Debug, Clone, Default)]
pub struct EnvConfigProvider {
    fallback: BatchUpdateToml,
}

impl EnvConfigProvider {
    pub fn new(fallback: BatchUpdateToml) -> Self {
        Self { fallback }
    }

    fn secret_token(&self) -> Option<String> {
        std::env::var(SECRET_TOKEN_ENV)
            .ok()
            .or_else(|| self.fallback.secret_token.clone())
            .filter(|token| !token.is_empty())
    }

    fn batch_limit(&self) -> u64 {
        let limit = match std::env::var(BATCH_LIMIT_ENV) {
            Ok(raw) => parse_batch_limit(&raw).unwrap_or_else(|| {
                tracing::warn!("{BATCH_LIMIT_ENV}={raw:?} is not an integer between 0 and {MAX_BATCH_LIMIT}");
                0
            }),
            Err(_) => self.fallback.num_records.min(MAX_BATCH_LIMIT),
        };
        if limit == 0 {
            tracing::warn!("Batch limit is 0, no pairs will be refreshed");
        }
        limit
    }
}

impl ConfigProvider for EnvConfigProvider {
    fn resolve(&self) -> BatchUpdateConfig {
        BatchUpdateConfig {
            secret_token: self.secret_token(),
            batch_limit: self.batch_limit(),
        }
    }
}

/// Always returns the same config.
#[derive(Debug, Clone, Default)]
pub struct StaticConfigProvider(pub BatchUpdateConfig);

impl ConfigProvider for StaticConfigProvider {
    fn resolve(&self) -> BatchUpdateConfig {
        self.0.clone()
    }
}
