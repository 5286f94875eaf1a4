use crate::address::ParseError;
use crate::codec::{DecodeError, VariableKind};
use crate::host::HostError;
use crate::registry::{RegistryError, VariableId};
use thiserror::Error;

/// Failure of a publish or subscribe request, reported by the transport
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("transport not connected")]
    NotConnected,

    #[error("request queue rejected {operation} on '{topic}': {details}")]
    Rejected {
        operation: &'static str,
        topic: String,
        details: String,
    },
}

/// Why an outbound write was refused
///
/// Write errors go back to whoever asked for the write; the dispatcher stays
/// usable afterwards.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum WriteError {
    #[error("no variable with id {0}")]
    UnknownVariable(VariableId),

    #[error("variable '{name}' holds {expected} values, got {actual}")]
    KindMismatch {
        name: String,
        expected: VariableKind,
        actual: VariableKind,
    },

    #[error("masked write on '{0}' needs a current value, but none was received yet")]
    UndefinedBaseline(String),

    #[error("structured addresses are not supported (variable '{0}')")]
    UnsupportedFormat(String),

    #[error("publish failed: {0}")]
    Publish(#[from] TransportError),
}

/// Why a single variable was not updated by an inbound message
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ApplyError {
    #[error("decode failed: {0}")]
    Decode(#[from] DecodeError),

    #[error("structured payload decoding is not supported")]
    UnsupportedFormat,

    #[error("host rejected value: {0}")]
    Host(#[from] HostError),
}

/// Configuration-time failure of a single binding
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BindingError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}
