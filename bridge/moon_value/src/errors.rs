//! Conversion errors between engine values and host types.

use thiserror::Error;

/// Failure to convert a [`Value`](crate::Value) into a host type, or an
/// engine value into a [`Value`](crate::Value).
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ConversionError {
    /// The value has the wrong shape for the requested type.
    #[error("expected {expected}, got {got}")]
    TypeMismatch {
        expected: &'static str,
        got: &'static str,
    },
    /// A number does not fit into the requested integer type.
    #[error("number {value} does not fit in {target}")]
    OutOfRange { value: String, target: &'static str },
    /// The engine value has no host representation (functions, threads, ...).
    #[error("unsupported type {type_name}")]
    Unsupported { type_name: &'static str },
    /// A table key is neither a sequence index nor a string.
    #[error("unsupported table key of type {type_name}")]
    UnsupportedKey { type_name: &'static str },
    /// Tables nest deeper than the marshaling limit (usually a cycle).
    #[error("table nesting exceeds {limit} levels")]
    TooDeep { limit: usize },
}

impl ConversionError {
    /// Shorthand for [`ConversionError::TypeMismatch`].
    pub fn mismatch(expected: &'static str, got: &'static str) -> Self {
        ConversionError::TypeMismatch { expected, got }
    }

    /// Shorthand for [`ConversionError::OutOfRange`].
    pub fn out_of_range(value: impl ToString, target: &'static str) -> Self {
        ConversionError::OutOfRange {
            value: value.to_string(),
            target,
        }
    }
}
