//! Error taxonomy of the bridge.
//!
//! - [`AllocationError`]: the engine could not be created at all.
//! - [`NamespaceError`]: a dotted registration path is invalid or collides.
//! - [`ScriptError`]: anything that failed while script code ran.
//! - [`HostError`]: a host function reports failure to its script caller.
//! - [`Error`]: union of the above for operations that can fail several ways.

use std::fmt;

use ffi::{LUA_ERRERR, LUA_ERRMEM, LUA_ERRSYNTAX};
use moon_value::ConversionError;
use thiserror::Error;

use crate::traceback::split_traceback;

/// `luaL_newstate` returned null.
///
/// The only failure that must be checked before any other engine operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
#[error("failed to allocate a Lua state")]
pub struct AllocationError;

/// `lua_checkstack` refused to grow the engine stack.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
#[error("Lua stack overflow: cannot reserve {needed} more slots")]
pub struct StackOverflow {
    pub needed: usize,
}

/// Registration-time namespace failures.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum NamespaceError {
    /// The path string itself is malformed.
    #[error("invalid namespace path '{path}': {reason}")]
    InvalidPath { path: String, reason: &'static str },
    /// A non-terminal segment holds something other than a table.
    #[error("namespace {path} is not a table (found {found})")]
    NotANamespace { path: String, found: &'static str },
    /// A read-only lookup hit an absent segment.
    #[error("{path} is not defined")]
    NotFound { path: String },
}

/// Category of a [`ScriptError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScriptErrorKind {
    /// Source text failed to compile.
    Syntax,
    /// A runtime error was raised (including host function failures).
    Runtime,
    /// The engine ran out of memory.
    Memory,
    /// The error handler itself failed.
    Handler,
    /// Results could not be converted into host values.
    Conversion,
}

impl ScriptErrorKind {
    /// Map a `lua_pcall`/`lua_load` status code.
    pub(crate) fn from_status(status: i32) -> Self {
        match status {
            LUA_ERRSYNTAX => ScriptErrorKind::Syntax,
            LUA_ERRMEM => ScriptErrorKind::Memory,
            LUA_ERRERR => ScriptErrorKind::Handler,
            _ => ScriptErrorKind::Runtime,
        }
    }
}

impl fmt::Display for ScriptErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScriptErrorKind::Syntax => "syntax error",
            ScriptErrorKind::Runtime => "runtime error",
            ScriptErrorKind::Memory => "memory error",
            ScriptErrorKind::Handler => "error handler failure",
            ScriptErrorKind::Conversion => "conversion error",
        };
        f.write_str(name)
    }
}

/// A failure surfaced from script evaluation.
///
/// `traceback` is best effort: empty for unprotected evaluation, syntax
/// errors, or when capture itself failed.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub struct ScriptError {
    pub kind: ScriptErrorKind,
    pub message: String,
    pub traceback: String,
}

impl ScriptError {
    /// Build from the raw error string left by a protected call.
    ///
    /// Splits off the traceback appended by the message handler, if any.
    pub(crate) fn from_raw(kind: ScriptErrorKind, raw: String) -> Self {
        let (message, traceback) = split_traceback(raw);
        ScriptError {
            kind,
            message,
            traceback,
        }
    }

    /// An error raised with no message handler installed; the text is kept
    /// whole.
    pub(crate) fn untraced(kind: ScriptErrorKind, message: String) -> Self {
        ScriptError {
            kind,
            message,
            traceback: String::new(),
        }
    }

    /// A runtime error raised from the host side (no traceback).
    pub fn runtime(message: impl Into<String>) -> Self {
        ScriptError {
            kind: ScriptErrorKind::Runtime,
            message: message.into(),
            traceback: String::new(),
        }
    }

    /// Returned values could not be marshaled back to the host.
    pub fn conversion(position: usize, source: &ConversionError) -> Self {
        ScriptError {
            kind: ScriptErrorKind::Conversion,
            message: format!("return value #{position}: {source}"),
            traceback: String::new(),
        }
    }
}

impl From<StackOverflow> for ScriptError {
    fn from(err: StackOverflow) -> Self {
        ScriptError::runtime(err.to_string())
    }
}

impl From<NamespaceError> for ScriptError {
    fn from(err: NamespaceError) -> Self {
        ScriptError::runtime(err.to_string())
    }
}

impl fmt::Display for ScriptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        if !self.traceback.is_empty() {
            write!(f, "\n{}", self.traceback)?;
        }
        Ok(())
    }
}

/// Failure reported by a host function.
///
/// The dispatcher prefixes the registered name and raises it as a script
/// error, so protected script callers observe it like any other error.
#[derive(Debug, Error)]
pub enum HostError {
    /// Free-form failure from host logic.
    #[error("{0}")]
    Failed(String),
    /// Wrong number of arguments for a typed registration.
    #[error("number of arguments not match (expected {expected}, got {got})")]
    Arity { expected: usize, got: usize },
    /// An argument could not be converted to the declared parameter type.
    #[error("bad argument #{position}: {source}")]
    Argument {
        position: usize,
        #[source]
        source: ConversionError,
    },
    /// A value could not be converted inside host logic.
    #[error(transparent)]
    Conversion(#[from] ConversionError),
    /// Results did not fit on the engine stack.
    #[error(transparent)]
    StackOverflow(#[from] StackOverflow),
    /// A nested call back into script failed.
    #[error("{}", .0.message)]
    Script(#[from] ScriptError),
    /// The host function panicked; the panic was contained at the boundary.
    #[error("host function panicked: {0}")]
    Panicked(String),
}

impl HostError {
    /// Free-form failure with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        HostError::Failed(message.into())
    }
}

impl From<String> for HostError {
    fn from(message: String) -> Self {
        HostError::Failed(message)
    }
}

impl From<&str> for HostError {
    fn from(message: &str) -> Self {
        HostError::Failed(message.to_string())
    }
}

/// Any failure of a bridge operation.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Allocation(#[from] AllocationError),
    #[error(transparent)]
    Namespace(#[from] NamespaceError),
    #[error(transparent)]
    Script(#[from] ScriptError),
    #[error(transparent)]
    Conversion(#[from] ConversionError),
    #[error(transparent)]
    StackOverflow(#[from] StackOverflow),
    /// The handle was issued by a different engine instance.
    #[error("host function handle #{0} was not issued by this engine")]
    ForeignHandle(usize),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_error_display_appends_traceback() {
        let err = ScriptError {
            kind: ScriptErrorKind::Runtime,
            message: "boom".to_string(),
            traceback: "stack traceback:\n\t[C]: in ?".to_string(),
        };
        assert_eq!(err.to_string(), "boom\nstack traceback:\n\t[C]: in ?");
        assert_eq!(ScriptError::runtime("boom").to_string(), "boom");
    }

    #[test]
    fn test_host_error_messages() {
        assert_eq!(HostError::new("nope").to_string(), "nope");
        assert_eq!(
            HostError::Arity {
                expected: 2,
                got: 1
            }
            .to_string(),
            "number of arguments not match (expected 2, got 1)"
        );
        let err = HostError::Argument {
            position: 2,
            source: ConversionError::mismatch("boolean", "number"),
        };
        assert_eq!(err.to_string(), "bad argument #2: expected boolean, got number");
    }

    #[test]
    fn test_nested_script_error_keeps_message_only() {
        let nested = ScriptError::from_raw(
            ScriptErrorKind::Runtime,
            "inner\nstack traceback:\n\t[C]: in ?".to_string(),
        );
        assert_eq!(HostError::from(nested).to_string(), "inner");
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(ScriptErrorKind::from_status(LUA_ERRSYNTAX), ScriptErrorKind::Syntax);
        assert_eq!(ScriptErrorKind::from_status(LUA_ERRMEM), ScriptErrorKind::Memory);
        assert_eq!(ScriptErrorKind::from_status(LUA_ERRERR), ScriptErrorKind::Handler);
        assert_eq!(ScriptErrorKind::from_status(ffi::LUA_ERRRUN), ScriptErrorKind::Runtime);
    }
}
