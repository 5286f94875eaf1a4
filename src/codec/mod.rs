//! # Payload Codec
//!
//! Validates and converts between wire text and typed values. Payloads are
//! always plain text as delivered by the transport; there is no framing.
//!
//! ```text
//! codec/
//! ├── decode.rs   - text → value, one function per grammar
//! ├── encode.rs   - value → text
//! └── error.rs    - DecodeError
//! ```
//!
//! [`decode`] and [`encode`] are the only places that branch on the value
//! kind; everything above this module passes [`VariableKind`] and [`Value`]
//! around without looking inside.

pub mod decode;
pub mod encode;
pub mod error;

pub use decode::{
    decode_float64, decode_float64_array, decode_int32, decode_int32_array, decode_uint32,
};
pub use encode::encode;
pub use error::DecodeError;

use std::fmt;

/// The closed set of value kinds a variable can carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VariableKind {
    /// Signed 32-bit integer (`INT`)
    SignedInt32,
    /// 64-bit float (`FLOAT`)
    Float64,
    /// Unsigned 32-bit bit-field (`DIGITAL`), supports masked writes
    BitField32,
    /// Verbatim text (`STRING`)
    Text,
    /// Delimited list of signed 32-bit integers (`INTARRAY`)
    Int32Array,
    /// Delimited list of 64-bit floats (`FLOATARRAY`)
    Float64Array,
}

impl VariableKind {
    /// Maps the `TYPE` part of a `PREFIX:TYPE` selector to a kind.
    pub fn from_type_token(token: &str) -> Option<Self> {
        match token {
            "INT" => Some(VariableKind::SignedInt32),
            "FLOAT" => Some(VariableKind::Float64),
            "DIGITAL" => Some(VariableKind::BitField32),
            "STRING" => Some(VariableKind::Text),
            "INTARRAY" => Some(VariableKind::Int32Array),
            "FLOATARRAY" => Some(VariableKind::Float64Array),
            _ => None,
        }
    }

    /// The selector token for this kind.
    pub fn as_type_token(&self) -> &'static str {
        match self {
            VariableKind::SignedInt32 => "INT",
            VariableKind::Float64 => "FLOAT",
            VariableKind::BitField32 => "DIGITAL",
            VariableKind::Text => "STRING",
            VariableKind::Int32Array => "INTARRAY",
            VariableKind::Float64Array => "FLOATARRAY",
        }
    }
}

impl fmt::Display for VariableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_type_token())
    }
}

/// A typed value, one variant per [`VariableKind`]
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int32(i32),
    Float64(f64),
    Digital(u32),
    Text(String),
    Int32Array(Vec<i32>),
    Float64Array(Vec<f64>),
}

impl Value {
    pub fn kind(&self) -> VariableKind {
        match self {
            Value::Int32(_) => VariableKind::SignedInt32,
            Value::Float64(_) => VariableKind::Float64,
            Value::Digital(_) => VariableKind::BitField32,
            Value::Text(_) => VariableKind::Text,
            Value::Int32Array(_) => VariableKind::Int32Array,
            Value::Float64Array(_) => VariableKind::Float64Array,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", encode(self))
    }
}

/// Decodes `payload` according to `kind`.
pub fn decode(kind: VariableKind, payload: &str) -> Result<Value, DecodeError> {
    match kind {
        VariableKind::SignedInt32 => decode_int32(payload).map(Value::Int32),
        VariableKind::Float64 => decode_float64(payload).map(Value::Float64),
        VariableKind::BitField32 => decode_uint32(payload).map(Value::Digital),
        VariableKind::Text => Ok(Value::Text(payload.to_string())),
        VariableKind::Int32Array => decode_int32_array(payload).map(Value::Int32Array),
        VariableKind::Float64Array => decode_float64_array(payload).map(Value::Float64Array),
    }
}
