//! Call Dispatcher: the single trampoline behind every native closure.
//!
//! The engine calls [`invoke_native`] with the script's arguments on a fresh
//! stack frame. The trampoline recovers the host function from upvalue 1,
//! reads the arguments, runs the host function, and either pushes its
//! results or raises its failure as a script error.
//!
//! # Unwinding
//!
//! Raising (`lua_error`) does not return. Host code never runs while a raise
//! is possible: panics are caught with `catch_unwind`, every owned value is
//! dropped, and only then is the error raised from a frame holding nothing
//! that needs dropping.

use std::any::Any;
use std::ffi::c_int;
use std::marker::PhantomData;
use std::panic::{self, AssertUnwindSafe};

use moon_value::{MultiValue, Value};

use crate::errors::{HostError, ScriptError};
use crate::protected::{self, Chunk};
use crate::registry::NativeFunction;
use crate::stack::StackAdapter;

/// Entry point shared by all native closures.
pub(crate) unsafe extern "C-unwind" fn invoke_native(state: *mut ffi::lua_State) -> c_int {
    let Some(stack) = (unsafe { StackAdapter::from_raw(state) }) else {
        return 0;
    };
    match dispatch(stack) {
        Ok(count) => count,
        Err(message) => unsafe { raise(stack, message) },
    }
}

/// Push `message` and raise it. Nothing owned survives into `lua_error`.
unsafe fn raise(stack: StackAdapter, message: String) -> c_int {
    // a failed reservation still leaves the slot lua_error needs
    let _ = stack.ensure_capacity(1);
    stack.push_str(&message);
    drop(message);
    unsafe { ffi::lua_error(stack.as_ptr()) }
}

fn dispatch(stack: StackAdapter) -> Result<c_int, String> {
    let function = stack.upvalue_userdata(1).cast::<NativeFunction>().cast_const();
    if function.is_null() {
        return Err("native closure has no host function".to_string());
    }
    // The registry arena outlives the engine state that calls us.
    let function = unsafe { &*function };
    tracing::trace!(name = function.name(), args = stack.top(), "dispatch");

    let prefixed = |err: HostError| format!("{}: {err}", function.name());

    let args = read_arguments(stack).map_err(prefixed)?;
    let mut ctx = CallContext::new(stack);
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| function.call(&mut ctx, args)));
    let results = match outcome {
        Ok(Ok(results)) => results,
        Ok(Err(err)) => return Err(prefixed(err)),
        Err(payload) => return Err(prefixed(HostError::Panicked(panic_message(&*payload)))),
    };

    push_results(stack, &results).map_err(prefixed)
}

fn read_arguments(stack: StackAdapter) -> Result<MultiValue, HostError> {
    let top = stack.top();
    let mut args = MultiValue::with_capacity(usize::try_from(top).unwrap_or(0));
    for (idx, position) in (1..=top).zip(1usize..) {
        let value = stack
            .to_value(idx)
            .map_err(|source| HostError::Argument { position, source })?;
        args.push(value);
    }
    Ok(args)
}

fn push_results(stack: StackAdapter, results: &MultiValue) -> Result<c_int, HostError> {
    stack.ensure_capacity(results.len())?;
    for value in results {
        stack.push_value(value)?;
    }
    Ok(c_int::try_from(results.len()).unwrap_or(c_int::MAX))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// What a host function may do with the engine while it runs.
///
/// Calls back into script always run protected, so a script failure comes
/// back as a `ScriptError` instead of unwinding through host frames.
pub struct CallContext<'a> {
    stack: StackAdapter,
    _frame: PhantomData<&'a mut ()>,
}

impl CallContext<'_> {
    pub(crate) fn new(stack: StackAdapter) -> Self {
        CallContext {
            stack,
            _frame: PhantomData,
        }
    }

    /// Call the script function bound at a dotted path.
    pub fn call(
        &mut self,
        path: &str,
        args: impl IntoIterator<Item = Value>,
    ) -> Result<MultiValue, ScriptError> {
        protected::call_path(self.stack, path, args.into_iter().collect(), true)
    }

    /// Evaluate a chunk against the shared globals.
    pub fn eval(&mut self, source: &str) -> Result<MultiValue, ScriptError> {
        protected::run_chunk(self.stack, &Chunk::new(source), true)
    }
}
