//! # Dispatcher
//!
//! Bidirectional bridge between bus messages and variables.
//!
//! ```text
//! dispatch/
//! ├── dispatcher.rs  - inbound routing, outbound writes, masked updates
//! ├── transport.rs   - Transport trait (subscribe / publish)
//! └── error.rs       - WriteError, ApplyError, TransportError, BindingError
//! ```

pub mod dispatcher;
pub mod error;
pub mod transport;

pub use dispatcher::{DispatchReport, Dispatcher, DispatcherConfig};
pub use error::{ApplyError, BindingError, TransportError, WriteError};
pub use transport::Transport;
