use std::fmt::{self, Display};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing_subscriber::filter::{Directive, LevelFilter};

/// Global log level, e.g. `info`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LogLevel(pub LevelFilter);

impl FromStr for LogLevel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let level: LevelFilter = s
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("invalid log level: {}", s))?;
        Ok(Self(level))
    }
}

impl Default for LogLevel {
    fn default() -> Self {
        Self(LevelFilter::INFO)
    }
}

impl Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for LogLevel {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<LogLevel> for String {
    fn from(value: LogLevel) -> Self {
        value.to_string()
    }
}

impl From<LogLevel> for Directive {
    fn from(value: LogLevel) -> Self {
        value.0.into()
    }
}

/// Level for a single module, e.g. `tower_http=debug`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ModuleLevel(pub Directive);

impl FromStr for ModuleLevel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || anyhow::anyhow!("invalid module log level: {}", s);
        let (module, level) = s.trim().split_once('=').ok_or_else(invalid)?;
        if module.trim().is_empty() || level.trim().parse::<LevelFilter>().is_err() {
            return Err(invalid());
        }
        let directive = s.trim().parse().map_err(|_| invalid())?;
        Ok(Self(directive))
    }
}

impl Display for ModuleLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for ModuleLevel {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ModuleLevel> for String {
    fn from(value: ModuleLevel) -> Self {
        value.to_string()
    }
}

impl From<ModuleLevel> for Directive {
    fn from(value: ModuleLevel) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level() {
        for level in ["TRACE", "Debug", "info", "warN", "eRRoR", "off"] {
            assert!(level.parse::<LogLevel>().is_ok(), "{level} should be valid");
        }
        for level in ["verbose", "dkim_archive=debug", "loud"] {
            assert!(level.parse::<LogLevel>().is_err(), "{level} should be invalid");
        }
        assert_eq!(LogLevel::default().to_string(), "info");
    }

    #[test]
    fn test_module_level() {
        for level in ["dkim_archive=debug", "tower_http=TRACE", "sqlx::query=warn"] {
            assert!(
                level.parse::<ModuleLevel>().is_ok(),
                "{level} should be valid"
            );
        }
        for level in ["debug", "=debug", "dkim_archive=loud"] {
            assert!(
                level.parse::<ModuleLevel>().is_err(),
                "{level} should be invalid"
            );
        }
    }

    #[test]
    fn test_deserialize_from_toml() {
        #[derive(Deserialize)]
        struct Logging {
            level: LogLevel,
            module_levels: Vec<ModuleLevel>,
        }
        let logging: Logging =
            toml::from_str("level = \"warn\"\nmodule_levels = [\"tower_http=debug\"]").unwrap();
        assert_eq!(logging.level, LogLevel(LevelFilter::WARN));
        assert_eq!(logging.module_levels.len(), 1);

        let invalid: Result<Logging, _> = toml::from_str("level = \"loud\"\nmodule_levels = []");
        assert!(invalid.is_err());
    }
}
