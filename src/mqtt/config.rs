use rumqttc::QoS;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_PORT: u16 = 1883;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MqttConfigError {
    #[error("unsupported QoS level {0} (expected 0, 1 or 2)")]
    InvalidQos(u8),

    #[error("broker url '{0}' has no host")]
    MissingHost(String),

    #[error("broker url '{0}' has an invalid port")]
    InvalidPort(String),

    #[error("broker url scheme '{0}' is not supported (use mqtt:// or tcp://)")]
    UnsupportedScheme(String),

    #[error("request capacity must be at least 1")]
    ZeroCapacity,
}

/// Broker connection settings, the `[mqtt]` table of the config file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    /// `host[:port]`, optionally prefixed with `mqtt://` or `tcp://`
    pub broker_url: String,
    /// Must be unique per broker
    pub client_id: String,
    /// Default QoS for every subscribe and publish
    pub qos: u8,
    pub keep_alive_secs: u64,
    pub clean_start: bool,
    /// Pause between polls after a connection error
    pub reconnect_delay_ms: u64,
    /// Upper bound for the initial connection attempt
    pub connect_timeout_secs: u64,
    /// Capacity of the client's request queue
    pub request_capacity: usize,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            broker_url: "mqtt://localhost:1883".to_string(),
            client_id: "topicbind".to_string(),
            qos: 1,
            keep_alive_secs: 20,
            clean_start: true,
            reconnect_delay_ms: 2000,
            connect_timeout_secs: 10,
            request_capacity: 100,
            username: None,
            password: None,
        }
    }
}

impl MqttConfig {
    pub fn qos(&self) -> Result<QoS, MqttConfigError> {
        match self.qos {
            0 => Ok(QoS::AtMostOnce),
            1 => Ok(QoS::AtLeastOnce),
            2 => Ok(QoS::ExactlyOnce),
            other => Err(MqttConfigError::InvalidQos(other)),
        }
    }

    /// Splits the broker url into host and port.
    pub fn broker_address(&self) -> Result<(String, u16), MqttConfigError> {
        let url = self.broker_url.trim();
        let rest = match url.split_once("://") {
            Some(("mqtt" | "tcp", rest)) => rest,
            Some((scheme, _)) => return Err(MqttConfigError::UnsupportedScheme(scheme.to_string())),
            None => url,
        };
        let rest = rest.trim_end_matches('/');

        let (host, port) = match rest.rsplit_once(':') {
            Some((host, port)) => {
                let port = port
                    .parse::<u16>()
                    .map_err(|_| MqttConfigError::InvalidPort(self.broker_url.clone()))?;
                (host, port)
            }
            None => (rest, DEFAULT_PORT),
        };

        if host.is_empty() {
            return Err(MqttConfigError::MissingHost(self.broker_url.clone()));
        }
        Ok((host.to_string(), port))
    }

    pub fn validate(&self) -> Result<(), MqttConfigError> {
        self.qos()?;
        self.broker_address()?;
        if self.request_capacity == 0 {
            return Err(MqttConfigError::ZeroCapacity);
        }
        Ok(())
    }
}
