//! # MQTT Integration Module
//!
//! Connects the dispatcher to an MQTT broker through `rumqttc`. This is the
//! only module that knows about MQTT; the dispatcher sees it as a
//! [`Transport`](crate::dispatch::Transport) plus a stream of
//! `on_message` calls.
//!
//! ```text
//! mqtt/
//! ├── config.rs           - Broker settings and url resolution
//! ├── message_manager.rs  - Inbound message representation
//! └── mqtt_handler.rs     - Session state machine, event loop, transport
//! ```

pub mod config;
pub mod message_manager;
pub mod mqtt_handler;

pub use config::{MqttConfig, MqttConfigError};
pub use message_manager::MqttMessage;
pub use mqtt_handler::{
    Configured, Connected, ConnectionState, LinkStatus, MqttSession, MqttTransport, SessionError,
};
