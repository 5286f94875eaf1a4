//! # topicbind
//!
//! Binds named, typed variables to MQTT topics. Inbound publishes are
//! decoded per variable kind and stored; outbound writes are encoded and
//! published, with read-modify-write masking for bit-field variables.
//!
//! ```text
//! src/
//! ├── address.rs   - selector and argument parsing, topic addresses
//! ├── codec/       - text payload grammars, decode and encode
//! ├── registry.rs  - variables, ids, topic index
//! ├── host.rs      - ParamStore trait and the in-memory store
//! ├── dispatch/    - inbound routing, outbound writes
//! ├── mqtt/        - rumqttc session and transport
//! └── config.rs    - TOML configuration file
//! ```

pub mod address;
pub mod codec;
pub mod config;
pub mod dispatch;
pub mod host;
pub mod mqtt;
pub mod registry;

pub use address::{parse_address, ParseError, TopicAddress, TopicFormat};
pub use codec::{DecodeError, Value, VariableKind};
pub use dispatch::{DispatchReport, Dispatcher, DispatcherConfig, Transport, WriteError};
pub use host::{MemoryStore, ParamStore};
pub use registry::{Variable, VariableId, VariableRegistry};
