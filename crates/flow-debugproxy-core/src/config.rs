//! Relay configuration

use crate::error::{DebugProxyError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;
use std::path::Path;
use std::str::FromStr;

/// Default address the debugger engine connects to
pub const DEFAULT_LISTEN: &str = "127.0.0.1:9000";
/// Default address of the IDE
pub const DEFAULT_IDE: &str = "127.0.0.1:9010";
/// Default Flow context
pub const DEFAULT_CONTEXT: &str = "Development";

/// Framework whose cache layout drives the path mapping
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Framework {
    /// Flow Framework proxy class cache
    #[default]
    Flow,
    /// Forward everything untouched
    Dummy,
}

impl FromStr for Framework {
    type Err = DebugProxyError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "flow" => Ok(Framework::Flow),
            "dummy" => Ok(Framework::Dummy),
            other => Err(DebugProxyError::UnknownFramework(other.to_string())),
        }
    }
}

impl fmt::Display for Framework {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Framework::Flow => f.write_str("flow"),
            Framework::Dummy => f.write_str("dummy"),
        }
    }
}

/// Relay configuration
///
/// The verbosity flags only drive logging; nothing in the rewrite path
/// reads them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Local address the debugger engine connects to
    pub listen: String,
    /// IDE address every session is relayed to
    pub ide: String,
    /// Flow context used to locate cache artifacts
    pub context: String,
    /// Path mapping strategy
    pub framework: Framework,
    /// Log sessions and discovered mappings
    pub verbose: bool,
    /// Also dump raw and processed protocol chunks
    pub very_verbose: bool,
    /// Log resolution decisions
    pub debug: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: DEFAULT_LISTEN.into(),
            ide: DEFAULT_IDE.into(),
            context: DEFAULT_CONTEXT.into(),
            framework: Framework::default(),
            verbose: false,
            very_verbose: false,
            debug: false,
        }
    }
}

impl Config {
    /// Load a configuration from a JSON file; missing fields keep their defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path).map_err(|e| {
            DebugProxyError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json(&data)
    }

    /// Parse a configuration from JSON text
    pub fn from_json(data: &str) -> Result<Self> {
        Ok(serde_json::from_str(data)?)
    }

    /// Check addresses and context before the relay starts
    pub fn validate(&self) -> Result<()> {
        if self.context.trim().is_empty() {
            return Err(DebugProxyError::Config("Context must not be empty".into()));
        }
        if self.context.starts_with('/') || self.context.ends_with('/') {
            return Err(DebugProxyError::Config(format!(
                "Context must not start or end with '/', got {:?}",
                self.context
            )));
        }
        self.listen_addr()?;
        self.ide_addr()?;
        Ok(())
    }

    /// Parsed listen address
    pub fn listen_addr(&self) -> Result<SocketAddr> {
        parse_addr("listen", &self.listen)
    }

    /// Parsed IDE address
    pub fn ide_addr(&self) -> Result<SocketAddr> {
        parse_addr("ide", &self.ide)
    }
}

fn parse_addr(field: &str, value: &str) -> Result<SocketAddr> {
    value.parse().map_err(|e| {
        DebugProxyError::Config(format!("Invalid {} address {:?}: {}", field, value, e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert_eq!(config.context, "Development");
        assert_eq!(config.framework, Framework::Flow);
        config.validate().unwrap();
        assert_eq!(config.listen_addr().unwrap().port(), 9000);
        assert_eq!(config.ide_addr().unwrap().port(), 9010);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = Config::from_json(r#"{"context":"Testing","verbose":true}"#).unwrap();
        assert_eq!(config.context, "Testing");
        assert!(config.verbose);
        assert_eq!(config.listen, DEFAULT_LISTEN);
        assert_eq!(config.framework, Framework::Flow);
    }

    #[test]
    fn test_nested_context_accepted() {
        let config = Config {
            context: "Development/Docker".into(),
            ..Config::default()
        };
        config.validate().unwrap();

        let config = Config {
            context: "Production/".into(),
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(DebugProxyError::Config(_))));
    }

    #[test]
    fn test_framework_from_json() {
        let config = Config::from_json(r#"{"framework":"dummy"}"#).unwrap();
        assert_eq!(config.framework, Framework::Dummy);
        assert!(Config::from_json(r#"{"framework":"symfony"}"#).is_err());
    }

    #[test]
    fn test_framework_from_str() {
        assert_eq!("Flow".parse::<Framework>().unwrap(), Framework::Flow);
        assert_eq!("dummy".parse::<Framework>().unwrap(), Framework::Dummy);
        assert!(matches!(
            "neos".parse::<Framework>(),
            Err(DebugProxyError::UnknownFramework(name)) if name == "neos"
        ));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = Config {
            context: "  ".into(),
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(DebugProxyError::Config(_))));

        let config = Config {
            ide: "localhost".into(),
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(DebugProxyError::Config(_))));
    }
}
