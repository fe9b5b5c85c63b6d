//! Configuration for the vayulink command-line tools
//!
//! Loads configuration from a TOML file with the parameters the CLI tools
//! need: where the bridge lives, the pairing PIN, and where decoded sensor
//! values get forwarded.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Top-level application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub bridge: BridgeConfig,
    pub forward: ForwardConfig,
    pub logging: LoggingConfig,
}

/// Bridge connection configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BridgeConfig {
    /// Bridge IP address for direct discovery
    ///
    /// When absent, discovery falls back to a UDP broadcast probe.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,

    /// Pairing PIN registered on the bridge (typically 4 digits)
    pub pin: u32,

    /// Master switch; when false the status forwarder exits immediately
    pub enabled: bool,
}

/// Sensor value forwarding configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ForwardConfig {
    /// Host that receives `name=value` UDP datagrams
    pub target_host: String,

    /// UDP port on the target host
    pub target_port: u16,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl AppConfig {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Default configuration
    ///
    /// Suitable for testing. Production deployments should use a proper
    /// TOML configuration file.
    pub fn defaults() -> Self {
        Self {
            bridge: BridgeConfig {
                address: None,
                pin: 0,
                enabled: true,
            },
            forward: ForwardConfig {
                target_host: "127.0.0.1".to_string(),
                target_port: 7001,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
            },
        }
    }

    /// Save configuration to TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::defaults();
        assert!(config.bridge.address.is_none());
        assert_eq!(config.bridge.pin, 0);
        assert!(config.bridge.enabled);
        assert_eq!(config.forward.target_host, "127.0.0.1");
        assert_eq!(config.forward.target_port, 7001);
    }

    #[test]
    fn test_toml_serialization() {
        let config = AppConfig::defaults();
        let toml_string = toml::to_string_pretty(&config).unwrap();

        // Should contain all sections
        assert!(toml_string.contains("[bridge]"));
        assert!(toml_string.contains("[forward]"));
        assert!(toml_string.contains("[logging]"));

        // Should contain key values
        assert!(toml_string.contains("target_host = \"127.0.0.1\""));
        assert!(toml_string.contains("enabled = true"));
    }

    #[test]
    fn test_toml_deserialization() {
        let toml_content = r#"
[bridge]
address = "10.0.0.5"
pin = 1234
enabled = true

[forward]
target_host = "192.168.1.20"
target_port = 7000

[logging]
level = "debug"
"#;

        let config: AppConfig = toml::from_str(toml_content).unwrap();
        assert_eq!(config.bridge.address.as_deref(), Some("10.0.0.5"));
        assert_eq!(config.bridge.pin, 1234);
        assert_eq!(config.forward.target_port, 7000);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_missing_address_falls_back_to_broadcast() {
        let toml_content = r#"
[bridge]
pin = 4321
enabled = false

[forward]
target_host = "10.1.1.1"
target_port = 7001

[logging]
level = "info"
"#;

        let config: AppConfig = toml::from_str(toml_content).unwrap();
        assert!(config.bridge.address.is_none());
        assert!(!config.bridge.enabled);
    }
}
