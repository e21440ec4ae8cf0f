//! Moon Value - host-side value model for the moonbridge Lua bridge.
//!
//! Everything that crosses the host/script boundary is expressed as a
//! [`Value`]. The bridge never hands raw engine handles to host code: arguments
//! are read off the engine stack into `Value`s before a host function runs,
//! and results are pushed back from `Value`s after it returns.
//!
//! # Value Shapes
//!
//! Only the shapes the engine's calling convention carries directly are
//! modelled:
//!
//! - scalars: nil, booleans, integers, floats, strings
//! - light userdata (an opaque host address the engine carries untouched)
//! - tables that are either a sequence (`List`) or string-keyed (`Map`)
//!
//! Functions, full userdata and coroutines stay inside the engine.
//!
//! # Conversions
//!
//! [`FromValue`] and [`IntoValue`] convert between `Value` and ordinary Rust
//! types. They back the typed host-function registrations in `moon_bridge`,
//! where a `fn(i64, String) -> bool` is marshaled without the host writing
//! any conversion code.

mod convert;
mod errors;
mod multi;
mod value;

pub use convert::{FromValue, IntoValue};
pub use errors::ConversionError;
pub use multi::MultiValue;
pub use value::{Value, MAX_TABLE_DEPTH};
