//! The `Value` enum shared by both sides of the bridge.

use std::collections::BTreeMap;
use std::ffi::c_void;
use std::fmt;

/// Maximum table nesting marshaled in either direction.
///
/// Self-referencing tables would otherwise recurse forever.
pub const MAX_TABLE_DEPTH: usize = 64;

/// A value that can cross the host/script boundary.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Value {
    /// `nil`.
    #[default]
    Nil,
    /// `true` / `false`.
    Boolean(bool),
    /// A number with the integer subtype.
    Integer(i64),
    /// A number with the float subtype.
    Number(f64),
    /// A string. Non-UTF-8 engine strings are converted lossily.
    String(String),
    /// An opaque host address carried by the engine without interpretation.
    LightUserData(*mut c_void),
    /// A table whose keys are exactly `1..=len`.
    List(Vec<Value>),
    /// A table keyed by strings.
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Create an integer value.
    #[inline]
    pub fn int(n: i64) -> Self {
        Value::Integer(n)
    }

    /// Create a float value.
    #[inline]
    pub fn float(n: f64) -> Self {
        Value::Number(n)
    }

    /// Create a string value.
    #[inline]
    pub fn string(s: impl Into<String>) -> Self {
        Value::String(s.into())
    }

    /// Create a list value.
    pub fn list(items: impl IntoIterator<Item = Value>) -> Self {
        Value::List(items.into_iter().collect())
    }

    /// The engine-side type name of this value.
    ///
    /// Matches what `type(v)` reports inside a script, so error messages read
    /// the same on both sides of the boundary.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Boolean(_) => "boolean",
            Value::Integer(_) | Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::LightUserData(_) => "userdata",
            Value::List(_) | Value::Map(_) => "table",
        }
    }

    #[inline]
    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// Integer view of this value.
    ///
    /// Floats with an exact integer representation convert, as they do in
    /// the engine's own arithmetic.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            Value::Number(f) => float_to_integer(*f),
            _ => None,
        }
    }

    /// Float view of this value (integers widen).
    #[expect(
        clippy::cast_precision_loss,
        reason = "the engine itself widens integers to floats the same way"
    )]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Integer(n) => Some(*n as f64),
            Value::Number(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }
}

/// Exact float → integer conversion, `None` when a fraction or range is lost.
#[expect(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    reason = "range is checked against the i64 bounds before the cast"
)]
pub(crate) fn float_to_integer(f: f64) -> Option<i64> {
    // 2^63 is exactly representable; i64::MAX is not.
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;
    if f.is_finite() && f.fract() == 0.0 && f >= -LIMIT && f < LIMIT {
        Some(f as i64)
    } else {
        None
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Integer(n) => write!(f, "{n}"),
            Value::Number(n) => write!(f, "{n:?}"),
            Value::String(s) => write!(f, "{s}"),
            Value::LightUserData(p) => write!(f, "userdata: {p:p}"),
            Value::List(items) => {
                write!(f, "{{")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "}}")
            }
            Value::Map(entries) => {
                write!(f, "{{")?;
                for (i, (key, item)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{key} = {item}")?;
                }
                write!(f, "}}")
            }
        }
    }
}

macro_rules! impl_from_for_value {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                #[inline]
                fn from(v: $ty) -> Self {
                    Value::$variant(v.into())
                }
            }
        )*
    };
}

impl_from_for_value! {
    bool => Boolean,
    i32 => Integer,
    i64 => Integer,
    f64 => Number,
    String => String,
    &str => String,
}
