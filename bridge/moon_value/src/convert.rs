//! Conversions between [`Value`] and host types.
//!
//! `FromValue` is fallible (scripts pass whatever they like); `IntoValue` is
//! not (every supported host type has an engine representation).

use std::collections::{BTreeMap, HashMap};
use std::ffi::c_void;
use std::hash::BuildHasher;

use crate::value::float_to_integer;
use crate::{ConversionError, Value};

/// Conversion from a bridge value into a host type.
pub trait FromValue: Sized {
    fn from_value(value: Value) -> Result<Self, ConversionError>;
}

/// Conversion from a host type into a bridge value.
pub trait IntoValue {
    fn into_value(self) -> Value;
}

impl FromValue for Value {
    #[inline]
    fn from_value(value: Value) -> Result<Self, ConversionError> {
        Ok(value)
    }
}

impl IntoValue for Value {
    #[inline]
    fn into_value(self) -> Value {
        self
    }
}

impl FromValue for bool {
    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::Boolean(b) => Ok(b),
            other => Err(ConversionError::mismatch("boolean", other.type_name())),
        }
    }
}

impl IntoValue for bool {
    #[inline]
    fn into_value(self) -> Value {
        Value::Boolean(self)
    }
}

/// Read any number as an `i64`, keeping the original for range errors.
fn integer_of(value: &Value, target: &'static str) -> Result<i64, ConversionError> {
    match value {
        Value::Integer(n) => Ok(*n),
        Value::Number(f) => float_to_integer(*f).ok_or_else(|| {
            if f.fract() == 0.0 {
                ConversionError::out_of_range(f, target)
            } else {
                ConversionError::mismatch("integer", "non-integral number")
            }
        }),
        other => Err(ConversionError::mismatch("integer", other.type_name())),
    }
}

macro_rules! impl_integer {
    ($($ty:ty),*) => {
        $(
            impl FromValue for $ty {
                fn from_value(value: Value) -> Result<Self, ConversionError> {
                    let n = integer_of(&value, stringify!($ty))?;
                    <$ty>::try_from(n)
                        .map_err(|_| ConversionError::out_of_range(n, stringify!($ty)))
                }
            }
        )*
    };
}

impl_integer!(i8, i16, i32, i64, isize, u8, u16, u32);

/// `2^63` and `2^64`, the float range wide unsigned values are stored in.
const WIDE_UNSIGNED_MIN: f64 = 9_223_372_036_854_775_808.0;
const WIDE_UNSIGNED_MAX: f64 = 18_446_744_073_709_551_616.0;

/// Read back a float produced by `IntoValue` for a `u64` above `i64::MAX`.
///
/// `2^64` is where `u64::MAX` rounds to, so it saturates back to `u64::MAX`.
#[expect(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    reason = "range checked first; 2^64 saturates to u64::MAX"
)]
fn wide_unsigned_of(value: &Value) -> Option<u64> {
    match *value {
        Value::Number(f)
            if f.fract() == 0.0 && (WIDE_UNSIGNED_MIN..=WIDE_UNSIGNED_MAX).contains(&f) =>
        {
            Some(f as u64)
        }
        _ => None,
    }
}

macro_rules! impl_wide_unsigned {
    ($($ty:ty),*) => {
        $(
            impl FromValue for $ty {
                fn from_value(value: Value) -> Result<Self, ConversionError> {
                    if let Some(n) = wide_unsigned_of(&value) {
                        return <$ty>::try_from(n)
                            .map_err(|_| ConversionError::out_of_range(n, stringify!($ty)));
                    }
                    let n = integer_of(&value, stringify!($ty))?;
                    <$ty>::try_from(n)
                        .map_err(|_| ConversionError::out_of_range(n, stringify!($ty)))
                }
            }
        )*
    };
}

impl_wide_unsigned!(u64, usize);

macro_rules! impl_into_integer_lossless {
    ($($ty:ty),*) => {
        $(
            impl IntoValue for $ty {
                #[inline]
                fn into_value(self) -> Value {
                    Value::Integer(i64::from(self))
                }
            }
        )*
    };
}

impl_into_integer_lossless!(i8, i16, i32, i64, u8, u16, u32);

// Wide unsigned values above i64::MAX only fit the float subtype.
macro_rules! impl_into_integer_wide {
    ($($ty:ty),*) => {
        $(
            impl IntoValue for $ty {
                #[expect(
                    clippy::cast_precision_loss,
                    reason = "values beyond i64 can only be represented as floats"
                )]
                fn into_value(self) -> Value {
                    match i64::try_from(self) {
                        Ok(n) => Value::Integer(n),
                        Err(_) => Value::Number(self as f64),
                    }
                }
            }
        )*
    };
}

impl_into_integer_wide!(isize, u64, usize);

impl FromValue for f64 {
    fn from_value(value: Value) -> Result<Self, ConversionError> {
        value
            .as_number()
            .ok_or_else(|| ConversionError::mismatch("number", value.type_name()))
    }
}

impl FromValue for f32 {
    #[expect(
        clippy::cast_possible_truncation,
        reason = "f32 parameters accept the usual precision loss"
    )]
    fn from_value(value: Value) -> Result<Self, ConversionError> {
        f64::from_value(value).map(|f| f as f32)
    }
}

impl IntoValue for f64 {
    #[inline]
    fn into_value(self) -> Value {
        Value::Number(self)
    }
}

impl IntoValue for f32 {
    #[inline]
    fn into_value(self) -> Value {
        Value::Number(f64::from(self))
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::String(s) => Ok(s),
            other => Err(ConversionError::mismatch("string", other.type_name())),
        }
    }
}

impl IntoValue for String {
    #[inline]
    fn into_value(self) -> Value {
        Value::String(self)
    }
}

impl IntoValue for &str {
    #[inline]
    fn into_value(self) -> Value {
        Value::String(self.to_owned())
    }
}

impl IntoValue for &String {
    #[inline]
    fn into_value(self) -> Value {
        Value::String(self.clone())
    }
}

impl FromValue for *mut c_void {
    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::LightUserData(p) => Ok(p),
            other => Err(ConversionError::mismatch("light userdata", other.type_name())),
        }
    }
}

impl IntoValue for *mut c_void {
    #[inline]
    fn into_value(self) -> Value {
        Value::LightUserData(self)
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::Nil => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl<T: IntoValue> IntoValue for Option<T> {
    fn into_value(self) -> Value {
        match self {
            Some(v) => v.into_value(),
            None => Value::Nil,
        }
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::List(items) => items.into_iter().map(T::from_value).collect(),
            // An empty table reads as an empty list; only reject filled maps.
            Value::Map(entries) if entries.is_empty() => Ok(Vec::new()),
            other => Err(ConversionError::mismatch("list", other.type_name())),
        }
    }
}

impl<T: IntoValue> IntoValue for Vec<T> {
    fn into_value(self) -> Value {
        Value::List(self.into_iter().map(IntoValue::into_value).collect())
    }
}

impl<T: IntoValue + Clone> IntoValue for &[T] {
    fn into_value(self) -> Value {
        Value::List(self.iter().cloned().map(IntoValue::into_value).collect())
    }
}

/// Entries of a map-shaped value, with empty lists accepted as empty maps.
fn map_entries(value: Value) -> Result<BTreeMap<String, Value>, ConversionError> {
    match value {
        Value::Map(entries) => Ok(entries),
        Value::List(items) if items.is_empty() => Ok(BTreeMap::new()),
        other => Err(ConversionError::mismatch("map", other.type_name())),
    }
}

impl<T: FromValue> FromValue for BTreeMap<String, T> {
    fn from_value(value: Value) -> Result<Self, ConversionError> {
        map_entries(value)?
            .into_iter()
            .map(|(k, v)| T::from_value(v).map(|v| (k, v)))
            .collect()
    }
}

impl<T: FromValue, S: BuildHasher + Default> FromValue for HashMap<String, T, S> {
    fn from_value(value: Value) -> Result<Self, ConversionError> {
        map_entries(value)?
            .into_iter()
            .map(|(k, v)| T::from_value(v).map(|v| (k, v)))
            .collect()
    }
}

impl<T: IntoValue> IntoValue for BTreeMap<String, T> {
    fn into_value(self) -> Value {
        Value::Map(self.into_iter().map(|(k, v)| (k, v.into_value())).collect())
    }
}

impl<T: IntoValue, S: BuildHasher> IntoValue for HashMap<String, T, S> {
    fn into_value(self) -> Value {
        Value::Map(self.into_iter().map(|(k, v)| (k, v.into_value())).collect())
    }
}
