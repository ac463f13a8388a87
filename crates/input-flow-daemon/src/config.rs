//! Service configuration loaded from TOML.

use serde::{Deserialize, Serialize};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub daemon: DaemonConfig,
    #[serde(default)]
    pub identity: IdentityConfig,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub peers: Vec<PeerConfig>,
}

/// Network and runtime settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind: default_bind(),
            log_level: default_log_level(),
        }
    }
}

/// Local device identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    #[serde(default = "default_device_id")]
    pub device_id: String,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            device_id: default_device_id(),
        }
    }
}

/// Local display geometry, used to normalize pointer coordinates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    #[serde(default = "default_display_width")]
    pub width: i32,
    #[serde(default = "default_display_height")]
    pub height: i32,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            width: default_display_width(),
            height: default_display_height(),
        }
    }
}

/// A paired peer device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerConfig {
    pub device_id: String,
    pub address: String,
}

fn default_port() -> u16 {
    24850
}

fn default_bind() -> String {
    "0.0.0.0".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_device_id() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "input-flow".to_string())
}

fn default_display_width() -> i32 {
    1920
}

fn default_display_height() -> i32 {
    1080
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = Config::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("port = 24850"));
    }

    #[test]
    fn parse_example_config() {
        let toml_str = r#"
[daemon]
port = 24850
bind = "0.0.0.0"
log_level = "debug"

[identity]
device_id = "workstation-left"

[display]
width = 2560
height = 1440

[[peers]]
device_id = "laptop-right"
address = "192.168.1.42:24850"
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.daemon.port, 24850);
        assert_eq!(config.identity.device_id, "workstation-left");
        assert_eq!(config.display.width, 2560);
        assert_eq!(config.peers.len(), 1);
        assert_eq!(config.peers[0].device_id, "laptop-right");
    }
}
