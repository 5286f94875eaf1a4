//! Text → typed value conversion
//!
//! Every function here is pure and total: an input either yields a value or
//! a specific [`DecodeError`]. Nothing trims whitespace around scalars, a
//! payload of `" 5"` is rejected like any other stray character.
//!
//! # Array grammar
//!
//! ```text
//! array     = "[" body "]" | body
//! body      = element { separator element }
//! separator = ws+ | "," ws*          (style fixed by the first boundary)
//! ```

use super::error::DecodeError;
use std::num::IntErrorKind;

/// Separator style of a delimited array, fixed at the first element boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Separator {
    Whitespace,
    Comma,
}

fn is_sign(byte: u8) -> bool {
    byte == b'+' || byte == b'-'
}

fn strip_sign(text: &str) -> &str {
    match text.as_bytes().first() {
        Some(&byte) if is_sign(byte) => &text[1..],
        _ => text,
    }
}

fn is_decimal(text: &str, signed: bool) -> bool {
    let digits = if signed { strip_sign(text) } else { text };
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

fn int_error(kind: &IntErrorKind) -> DecodeError {
    match kind {
        IntErrorKind::PosOverflow | IntErrorKind::NegOverflow => DecodeError::OutOfRange,
        _ => DecodeError::NotAnInteger,
    }
}

/// Decodes a signed 32-bit integer: optional `+`/`-`, then decimal digits
pub fn decode_int32(payload: &str) -> Result<i32, DecodeError> {
    if !is_decimal(payload, true) {
        return Err(DecodeError::NotAnInteger);
    }
    payload.parse::<i32>().map_err(|e| int_error(e.kind()))
}

/// Decodes an unsigned 32-bit word; a leading sign is rejected
pub fn decode_uint32(payload: &str) -> Result<u32, DecodeError> {
    if !is_decimal(payload, false) {
        return Err(DecodeError::NotAnInteger);
    }
    payload.parse::<u32>().map_err(|e| int_error(e.kind()))
}

/// Decodes a finite 64-bit float written in decimal or scientific notation
///
/// The whole payload has to be consumed by the numeral. Words like `inf` or
/// `NaN` are not numerals and are rejected, numerals beyond the `f64` range
/// yield [`DecodeError::OutOfRange`].
pub fn decode_float64(payload: &str) -> Result<f64, DecodeError> {
    match strip_sign(payload).as_bytes().first() {
        Some(byte) if byte.is_ascii_digit() || *byte == b'.' => {}
        _ => return Err(DecodeError::NotAFloat),
    }
    let value = payload
        .parse::<f64>()
        .map_err(|_| DecodeError::NotAFloat)?;
    if value.is_finite() {
        Ok(value)
    } else {
        Err(DecodeError::OutOfRange)
    }
}

/// Decodes a delimited list of signed 32-bit integers
pub fn decode_int32_array(payload: &str) -> Result<Vec<i32>, DecodeError> {
    decode_array(payload, decode_int32)
}

/// Decodes a delimited list of 64-bit floats
pub fn decode_float64_array(payload: &str) -> Result<Vec<f64>, DecodeError> {
    decode_array(payload, decode_float64)
}

/// Removes optional wrapping brackets, returning the body and its byte offset
fn strip_brackets(payload: &str) -> Result<(&str, usize), DecodeError> {
    match (payload.starts_with('['), payload.ends_with(']')) {
        (true, true) if payload.len() >= 2 => Ok((&payload[1..payload.len() - 1], 1)),
        (false, false) => Ok((payload, 0)),
        _ => Err(DecodeError::MalformedBrackets),
    }
}

fn is_boundary(byte: u8) -> bool {
    byte == b',' || byte.is_ascii_whitespace()
}

fn skip_whitespace(bytes: &[u8], mut pos: usize) -> usize {
    while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
        pos += 1;
    }
    pos
}

/// Single left-to-right pass over the array body.
///
/// Elements are maximal runs of non-separator bytes; all boundary bytes are
/// ASCII, so every slice taken here lies on a char boundary.
fn decode_array<T, F>(payload: &str, element: F) -> Result<Vec<T>, DecodeError>
where
    F: Fn(&str) -> Result<T, DecodeError>,
{
    let (body, offset) = strip_brackets(payload)?;
    let bytes = body.as_bytes();

    let mut pos = skip_whitespace(bytes, 0);
    if pos == bytes.len() {
        return Err(DecodeError::EmptyArray);
    }

    let mut style: Option<Separator> = None;
    let mut values = Vec::new();

    loop {
        let start = pos;
        while pos < bytes.len() && !is_boundary(bytes[pos]) {
            pos += 1;
        }
        let token = &body[start..pos];
        let value = element(token).map_err(|_| DecodeError::InvalidElement {
            index: values.len(),
            element: token.to_string(),
        })?;
        values.push(value);

        if pos == bytes.len() {
            break;
        }

        let boundary = pos;
        let found = if bytes[pos] == b',' {
            pos = skip_whitespace(bytes, pos + 1);
            Separator::Comma
        } else {
            pos = skip_whitespace(bytes, pos);
            // whitespace then comma matches neither separator form
            if pos < bytes.len() && bytes[pos] == b',' {
                return Err(DecodeError::InconsistentSeparator {
                    position: offset + pos,
                });
            }
            Separator::Whitespace
        };

        match style {
            None => style = Some(found),
            Some(fixed) if fixed != found => {
                return Err(DecodeError::InconsistentSeparator {
                    position: offset + boundary,
                })
            }
            Some(_) => {}
        }

        if pos == bytes.len() {
            return Err(DecodeError::TrailingSeparator);
        }
    }

    Ok(values)
}
