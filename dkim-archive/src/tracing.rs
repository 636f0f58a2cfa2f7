//!
//! Module to initialize tracing logs.
//!
//! Precedence, highest first:
//! - the `--tracing-env-filter` command line flag,
//! - the `RUST_LOG` environment variable,
//! - the `[logging]` section of the config file.
//!

use tracing_subscriber::EnvFilter;

use crate::config::LoggingToml;

/// Filter built from the `[logging]` config section.
pub fn env_filter_from_config(config: &LoggingToml) -> EnvFilter {
    let mut filter = EnvFilter::new("");
    filter = filter.add_directive(config.level.clone().into());
    for module_level in &config.module_levels {
        filter = filter.add_directive(module_level.clone().into());
    }
    filter
}

/// Initialize the global tracing subscriber.
pub fn init_tracing_logs(config: &LoggingToml, cli_filter: Option<&str>) -> anyhow::Result<()> {
    let env_filter = match cli_filter {
        Some(directives) => EnvFilter::try_new(directives)
            .map_err(|e| anyhow::anyhow!("Invalid tracing env filter {directives:?}: {e}"))?,
        None => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| env_filter_from_config(config)),
    };
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {}", e))?;
    Ok(())
}
