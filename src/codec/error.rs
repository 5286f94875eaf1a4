//! Decode errors for textual payloads

use thiserror::Error;

/// Why a payload could not be turned into a typed value
///
/// Decode errors are always local to one message and one variable: the
/// dispatcher logs them and leaves the variable's stored value untouched.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Payload is not an optional sign followed by decimal digits
    #[error("not an integer")]
    NotAnInteger,

    /// Payload is a well-formed integer that does not fit the target width
    #[error("integer out of range")]
    OutOfRange,

    /// Payload is not a decimal or scientific floating-point numeral
    #[error("not a floating-point number")]
    NotAFloat,

    /// Opening `[` without a closing `]` or the other way round
    #[error("unbalanced array brackets")]
    MalformedBrackets,

    /// Nothing left after removing the brackets
    #[error("array has no elements")]
    EmptyArray,

    /// A boundary used a different separator style than the first one
    #[error("inconsistent separator at byte {position}")]
    InconsistentSeparator { position: usize },

    /// An element does not satisfy the element grammar
    #[error("invalid element #{index}: '{element}'")]
    InvalidElement { index: usize, element: String },

    /// A separator with no element after it
    #[error("trailing separator")]
    TrailingSeparator,
}
