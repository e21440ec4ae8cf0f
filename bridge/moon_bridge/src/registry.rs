//! Native Closure Registry.
//!
//! Host functions live in an arena owned by the engine. Each entry is boxed,
//! so its address stays fixed while the arena grows; that address is the
//! identity stored as the single upvalue of every native closure.

use std::ffi::c_void;
use std::fmt;
use std::ptr;

use moon_value::MultiValue;
use rustc_hash::FxHashMap;

use crate::dispatch::{invoke_native, CallContext};
use crate::errors::{HostError, StackOverflow};
use crate::stack::StackAdapter;

/// Signature every registered host function is erased to.
pub type NativeFn = dyn Fn(&mut CallContext<'_>, MultiValue) -> Result<MultiValue, HostError>;

/// A host function together with the name used in its error messages.
pub struct NativeFunction {
    name: String,
    func: Box<NativeFn>,
}

impl NativeFunction {
    pub fn new(name: impl Into<String>, func: Box<NativeFn>) -> Self {
        NativeFunction {
            name: name.into(),
            func,
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub(crate) fn call(
        &self,
        ctx: &mut CallContext<'_>,
        args: MultiValue,
    ) -> Result<MultiValue, HostError> {
        (self.func)(ctx, args)
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFunction")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Opaque identity of a registered host function.
///
/// Valid for the lifetime of the engine that issued it. Bind it under any
/// number of paths with `Engine::register_native_function`.
///
/// The identity travels as a light-userdata upvalue that the trampoline
/// trusts. With the `debug` library open, `debug.setupvalue` can swap it for
/// a pointer the host never issued, so `StdLib::DEFAULT` leaves `debug` closed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct HostFunctionHandle {
    index: usize,
    ptr: *const NativeFunction,
    engine_id: u64,
}

impl HostFunctionHandle {
    /// Position in the issuing engine's arena.
    #[inline]
    pub fn index(self) -> usize {
        self.index
    }

    #[inline]
    fn as_upvalue(self) -> *mut c_void {
        self.ptr.cast_mut().cast()
    }
}

/// Arena of host functions for one engine.
pub struct ClosureRegistry {
    engine_id: u64,
    functions: Vec<Box<NativeFunction>>,
    by_name: FxHashMap<String, usize>,
}

impl ClosureRegistry {
    pub fn new(engine_id: u64) -> Self {
        ClosureRegistry {
            engine_id,
            functions: Vec::new(),
            by_name: FxHashMap::default(),
        }
    }

    /// Store `function` and return its stable identity.
    pub fn register(&mut self, function: NativeFunction) -> HostFunctionHandle {
        let index = self.functions.len();
        let boxed = Box::new(function);
        let ptr: *const NativeFunction = &*boxed;
        self.by_name.insert(boxed.name.clone(), index);
        self.functions.push(boxed);
        HostFunctionHandle {
            index,
            ptr,
            engine_id: self.engine_id,
        }
    }

    /// Whether `handle` was issued by this registry.
    pub fn contains(&self, handle: HostFunctionHandle) -> bool {
        handle.engine_id == self.engine_id
            && self
                .functions
                .get(handle.index)
                .is_some_and(|f| ptr::eq(&**f, handle.ptr))
    }

    /// Most recent function registered under `name`.
    pub fn lookup(&self, name: &str) -> Option<HostFunctionHandle> {
        let index = *self.by_name.get(name)?;
        let function = self.functions.get(index)?;
        Some(HostFunctionHandle {
            index,
            ptr: &**function,
            engine_id: self.engine_id,
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Push a closure of the shared trampoline carrying `handle` as its only
    /// upvalue.
    pub fn push_native_closure(
        &self,
        stack: StackAdapter,
        handle: HostFunctionHandle,
    ) -> Result<(), StackOverflow> {
        debug_assert!(self.contains(handle));
        stack.ensure_capacity(1)?;
        stack.push_light_userdata(handle.as_upvalue());
        unsafe { ffi::lua_pushcclosure(stack.as_ptr(), invoke_native, 1) };
        Ok(())
    }
}

impl fmt::Debug for ClosureRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClosureRegistry")
            .field("engine_id", &self.engine_id)
            .field("functions", &self.functions.len())
            .finish()
    }
}
