//! Configuration file of the service.
//!
//! Every section is optional. Missing keys fall back to the defaults
//! documented in `config.sample.toml`.

use std::{fmt::Debug, fs, net::SocketAddr, path::Path, str::FromStr};

use serde::{Deserialize, Serialize};
use url::Url;

use super::log_level::{LogLevel, ModuleLevel};
use crate::constants::{
    DEFAULT_DATABASE_URL, DEFAULT_DNS_ATTEMPTS, DEFAULT_DNS_TIMEOUT_MS, DEFAULT_LISTEN_SOCKET,
};
use crate::persistence::sql::ConnectionString;

/// Example configuration file
pub const SAMPLE_CONFIG: &str = include_str!("../../config.sample.toml");

/// Error that can occur when reading a configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigReadError {
    /// The file did not exist or could not be read.
    #[error("config file not found: {0}")]
    ConfigFileNotFound(#[from] std::io::Error),
    /// The TOML was syntactically invalid or had values of the wrong type.
    #[error("config file is not valid TOML: {0}")]
    ConfigFileNotValid(#[from] toml::de::Error),
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct GeneralToml {
    pub database_url: ConnectionString,
}

impl Default for GeneralToml {
    fn default() -> Self {
        Self {
            database_url: ConnectionString::new(DEFAULT_DATABASE_URL)
                .expect("default database url is a valid postgres url"),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ServerToml {
    pub listen_socket: SocketAddr,
}

impl Default for ServerToml {
    fn default() -> Self {
        Self {
            listen_socket: DEFAULT_LISTEN_SOCKET,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(default)]
pub struct BatchUpdateToml {
    /// Fallback for the `CRON_SECRET` environment variable.
    pub secret_token: Option<String>,
    /// Fallback for the `BATCH_UPDATE_NUM_RECORDS` environment variable.
    pub num_records: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct DnsToml {
    pub timeout_ms: u64,
    pub attempts: usize,
    /// Empty means the system resolver configuration.
    pub nameservers: Vec<SocketAddr>,
}

impl Default for DnsToml {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_DNS_TIMEOUT_MS,
            attempts: DEFAULT_DNS_ATTEMPTS,
            nameservers: vec![],
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(default)]
pub struct WitnessToml {
    /// Witness generation is disabled without an endpoint.
    pub endpoint: Option<Url>,
    pub api_key: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(default)]
pub struct LoggingToml {
    pub level: LogLevel,
    pub module_levels: Vec<ModuleLevel>,
}

/// The overall application configuration, composed of several subsections.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(default)]
pub struct ConfigToml {
    /// Database settings.
    pub general: GeneralToml,
    /// HTTP listen socket.
    pub server: ServerToml,
    /// Secret and batch size of the refresh endpoint.
    pub batch_update: BatchUpdateToml,
    /// Resolver options of the DKIM fetcher.
    pub dns: DnsToml,
    /// Witness service the new records are posted to.
    pub witness: WitnessToml,
    /// Log levels.
    pub logging: LoggingToml,
}

impl ConfigToml {
    /// Read and parse a configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigReadError> {
        let raw = fs::read_to_string(path)?;
        Ok(raw.parse()?)
    }

    /// The sample config with every value commented out.
    pub fn sample_string() -> String {
        SAMPLE_CONFIG
            .lines()
            .map(|line| {
                let trimmed = line.trim_start();
                if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('[') {
                    line.to_string()
                } else {
                    format!("# {}", line)
                }
            })
            .collect::<Vec<String>>()
            .join("\n")
    }

    /// Returns a default config tuned for unit tests.
    pub fn test() -> Self {
        let mut config = Self::default();
        // Ephemeral port so parallel tests don't collide.
        config.server.listen_socket = SocketAddr::from(([127, 0, 0, 1], 0));
        config.batch_update.secret_token = Some("test-secret".to_string());
        config.batch_update.num_records = 10;
        config
    }
}

impl FromStr for ConfigToml {
    type Err = toml::de::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        toml::from_str(s)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_default_config() {
        let c = ConfigToml::default();
        assert_eq!(c.general.database_url.database_name(), "dkim_archive");
        assert_eq!(c.server.listen_socket, DEFAULT_LISTEN_SOCKET);
        assert_eq!(c.batch_update.secret_token, None);
        assert_eq!(c.batch_update.num_records, 0);
        assert_eq!(c.dns.timeout_ms, 5000);
        assert_eq!(c.dns.attempts, 2);
        assert!(c.dns.nameservers.is_empty());
        assert_eq!(c.witness.endpoint, None);
        assert_eq!(c.logging.level, LogLevel::default());
    }

    #[test]
    fn test_sample_config_matches_defaults() {
        let sample: ConfigToml = SAMPLE_CONFIG.parse().expect("sample config is valid");
        assert_eq!(sample, ConfigToml::default());
    }

    #[test]
    fn test_commented_sample_is_empty_config() {
        let commented: ConfigToml = ConfigToml::sample_string()
            .parse()
            .expect("commented sample is valid");
        assert_eq!(commented, ConfigToml::default());
    }

    #[test]
    fn test_partial_config() {
        let config: ConfigToml = r#"
            [batch_update]
            secret_token = "s3cret"
            num_records = 25

            [dns]
            nameservers = ["1.1.1.1:53", "[2606:4700:4700::1111]:53"]

            [witness]
            endpoint = "https://witness.example.com/postLeafAndGetIndex"

            [logging]
            level = "debug"
            module_levels = ["tower_http=trace"]
        "#
        .parse()
        .unwrap();
        assert_eq!(config.batch_update.secret_token.as_deref(), Some("s3cret"));
        assert_eq!(config.batch_update.num_records, 25);
        assert_eq!(config.dns.nameservers.len(), 2);
        assert_eq!(config.dns.timeout_ms, DEFAULT_DNS_TIMEOUT_MS);
        assert_eq!(
            config.witness.endpoint.as_ref().map(Url::as_str),
            Some("https://witness.example.com/postLeafAndGetIndex")
        );
        assert_eq!(config.logging.module_levels.len(), 1);
        assert_eq!(config.server, ServerToml::default());
    }

    #[test]
    fn test_invalid_values() {
        assert!("[general]\ndatabase_url = \"mysql://localhost/db\""
            .parse::<ConfigToml>()
            .is_err());
        assert!("[batch_update]\nnum_records = -1"
            .parse::<ConfigToml>()
            .is_err());
        assert!("[server]\nlisten_socket = \"localhost\""
            .parse::<ConfigToml>()
            .is_err());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[batch_update]\nnum_records = 3").unwrap();
        let config = ConfigToml::from_file(file.path()).unwrap();
        assert_eq!(config.batch_update.num_records, 3);

        let missing = ConfigToml::from_file("/definitely/not/here.toml");
        assert!(matches!(missing, Err(ConfigReadError::ConfigFileNotFound(_))));
    }
}
