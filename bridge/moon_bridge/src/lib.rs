//! Moon Bridge: host functions for an embedded Lua engine.
//!
//! Registers Rust closures as callable script values, dispatches script calls
//! to them through a single trampoline, binds them under dotted global paths,
//! and brings script failures back to the host with a traceback.
//!
//! # Components
//!
//! - **Value Stack Adapter** ([`stack`]): typed pushes and reads on the engine
//!   stack.
//! - **Native Closure Registry** ([`registry`]): arena of host functions and
//!   the closures that point into it.
//! - **Call Dispatcher** (`dispatch`): the trampoline every native closure
//!   runs.
//! - **Namespace Resolver** ([`namespace`]): `a.b.c` path walking.
//! - **Error/Traceback Capturer** ([`traceback`]): message handler for
//!   protected calls.
//! - **Engine Lifecycle Manager** ([`Engine`], [`EvaluationEnvironment`]).
//!
//! # Example
//!
//! ```no_run
//! use moon_bridge::Engine;
//! use moon_value::Value;
//!
//! # fn main() -> Result<(), moon_bridge::Error> {
//! let mut engine = Engine::new()?;
//! engine.register("math.add", |a: i64, b: i64| a + b)?;
//! let out = engine.eval("return math.add(2, 3)", true)?;
//! assert_eq!(out[0], Value::Integer(5));
//! # Ok(())
//! # }
//! ```
//!
//! # Safety
//!
//! All engine access goes through raw `lua_State` pointers owned by an
//! [`Engine`]. Engine errors raised inside host frames are never allowed to
//! unwind across Rust code that still owns values: the trampoline drops
//! everything before raising, and host-issued evaluations always run under
//! `lua_pcall`.

#![warn(clippy::allow_attributes_without_reason)]
#![allow(
    unsafe_code,
    reason = "the Lua C API is only reachable through raw pointers"
)]
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_possible_wrap,
    reason = "Lua stack indices are c_int while host counts are usize"
)]
#![allow(
    clippy::missing_safety_doc,
    reason = "unsafe items are crate-internal C entry points"
)]

mod config;
mod dispatch;
mod engine;
mod environment;
mod errors;
pub mod namespace;
mod native;
mod protected;
pub mod registry;
pub mod stack;
pub mod traceback;

pub use config::{ConfigError, EngineConfig, StdLib};
pub use dispatch::CallContext;
pub use engine::Engine;
pub use environment::EvaluationEnvironment;
pub use errors::{
    AllocationError, Error, HostError, NamespaceError, ScriptError, ScriptErrorKind,
    StackOverflow,
};
pub use namespace::NamespacePath;
pub use native::{IntoNative, IntoResults};
pub use registry::{HostFunctionHandle, NativeFn};

pub use moon_value::{ConversionError, FromValue, IntoValue, MultiValue, Value};
