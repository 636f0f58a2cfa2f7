mod batch_update_config;
mod config_toml;
mod log_level;

pub use batch_update_config::{
    parse_batch_limit, BatchUpdateConfig, ConfigProvider, EnvConfigProvider,
    StaticConfigProvider,
};
pub use config_toml::{
    BatchUpdateToml, ConfigReadError, ConfigToml, DnsToml, GeneralToml, LoggingToml, ServerToml,
    WitnessToml, SAMPLE_CONFIG,
};
pub use log_level::{LogLevel, ModuleLevel};
