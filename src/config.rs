//! # Configuration File
//!
//! One TOML file describes the driver name, the broker connection and the
//! list of bindings. Every setting has a default so a minimal file only
//! lists `[[binding]]` tables.
//!
//! ```toml
//! [driver]
//! name = "MqttDriver"
//!
//! [mqtt]
//! broker_url = "mqtt://localhost:1883"
//!
//! [[binding]]
//! name = "STATUS"
//! selector = "FLAT:DIGITAL"
//! args = "plant/status"
//! mask = 0x0F
//! ```

use crate::dispatch::DispatcherConfig;
use crate::mqtt::MqttConfig;
use color_eyre::{eyre::eyre, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const CONFIG_DIR: &str = "topicbind";
const CONFIG_FILE: &str = "config.toml";

const TEMPLATE: &str = r#"# topicbind configuration

[driver]
# Tags every log line of the dispatcher
name = "MqttDriver"
# Retain flag for outbound publishes
retain_writes = false

[mqtt]
# Scheme (mqtt:// or tcp://) and port are optional, the port defaults to 1883
broker_url = "mqtt://localhost:1883"
client_id = "topicbind"
# 0, 1 or 2
qos = 1
keep_alive_secs = 20
clean_start = true
reconnect_delay_ms = 2000
connect_timeout_secs = 10
request_capacity = 100
# username = "user"
# password = "secret"

# One table per variable. `selector` is FLAT:<TYPE> with TYPE one of
# INT, FLOAT, DIGITAL, STRING, INTARRAY, FLOATARRAY. `args` is the topic.
#
# [[binding]]
# name = "STATUS"
# selector = "FLAT:DIGITAL"
# args = "plant/status"
# mask = 0x0F
"#;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverSection {
    pub name: String,
    pub retain_writes: bool,
}

impl Default for DriverSection {
    fn default() -> Self {
        Self {
            name: "MqttDriver".to_string(),
            retain_writes: false,
        }
    }
}

impl From<&DriverSection> for DispatcherConfig {
    fn from(section: &DriverSection) -> Self {
        DispatcherConfig {
            name: section.name.clone(),
            retain_writes: section.retain_writes,
        }
    }
}

/// One `[[binding]]` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindingConfig {
    pub name: String,
    /// `PREFIX:TYPE`, e.g. `FLAT:INT`
    pub selector: String,
    /// Topic, optionally followed by a field name
    pub args: String,
    /// Write mask for bit-field bindings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mask: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    pub driver: DriverSection,
    pub mqtt: MqttConfig,
    pub binding: Vec<BindingConfig>,
}

impl DriverConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| eyre!("Failed to parse configuration: {}", e))
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;
        let config = Self::from_toml_str(&content)
            .map_err(|e| eyre!("{} ({})", e, path.display()))?;
        info!(
            "Loaded {} binding(s) from {}",
            config.binding.len(),
            path.display()
        );
        Ok(config)
    }

    /// `$XDG_CONFIG_HOME/topicbind/config.toml`, or the home directory
    /// equivalent where no config directory is known.
    pub fn default_path() -> PathBuf {
        let base = dirs::config_dir().unwrap_or_else(|| {
            warn!("Could not determine config directory, using home directory");
            get_home_dir().join(".config")
        });
        base.join(CONFIG_DIR).join(CONFIG_FILE)
    }

    /// Writes the commented template to `path` unless a file already exists.
    ///
    /// Returns `true` when the template was written.
    pub async fn ensure_template(path: &Path) -> Result<bool> {
        if tokio::fs::try_exists(path)
            .await
            .map_err(|e| eyre!("Failed to check if config file exists: {}", e))?
        {
            return Ok(false);
        }

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| eyre!("Failed to create config directory: {}", e))?;
        }
        tokio::fs::write(path, TEMPLATE)
            .await
            .map_err(|e| eyre!("Failed to write config template: {}", e))?;
        info!("Wrote configuration template to {}", path.display());
        Ok(true)
    }
}

fn get_home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| {
        warn!("Could not determine home directory, using current directory");
        PathBuf::from(".")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_parses_to_defaults() {
        let config = DriverConfig::from_toml_str(TEMPLATE).unwrap();
        assert_eq!(config, DriverConfig::default());
    }

    #[test]
    fn test_minimal_file_uses_defaults() {
        let config = DriverConfig::from_toml_str(
            r#"
            [[binding]]
            name = "TEMP"
            selector = "FLAT:FLOAT"
            args = "plant/temp"
            "#,
        )
        .unwrap();

        assert_eq!(config.driver.name, "MqttDriver");
        assert_eq!(config.mqtt, MqttConfig::default());
        assert_eq!(config.binding.len(), 1);
        assert_eq!(config.binding[0].mask, None);
    }

    #[test]
    fn test_driver_section_converts_to_dispatcher_config() {
        let section = DriverSection {
            name: "Plant".to_string(),
            retain_writes: true,
        };
        let config = DispatcherConfig::from(&section);
        assert_eq!(config.name, "Plant");
        assert!(config.retain_writes);
    }
}
