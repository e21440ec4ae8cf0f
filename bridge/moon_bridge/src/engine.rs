//! Engine Lifecycle Manager.
//!
//! An [`Engine`] owns one Lua state and the arena of host functions its
//! native closures point into. Dropping the engine closes the state first,
//! so no closure can outlive the functions it refers to.

use std::sync::atomic::{AtomicU64, Ordering};

use moon_value::{IntoValue, MultiValue, Value};

use crate::config::{open_libraries, EngineConfig};
use crate::dispatch::CallContext;
use crate::environment::EvaluationEnvironment;
use crate::errors::{AllocationError, Error, HostError, ScriptError};
use crate::namespace::{self, NamespacePath};
use crate::native::IntoNative;
use crate::protected::{self, Chunk};
use crate::registry::{ClosureRegistry, HostFunctionHandle, NativeFunction};
use crate::stack::{StackAdapter, StackGuard};

static NEXT_ENGINE_ID: AtomicU64 = AtomicU64::new(1);

/// An embedded Lua engine with host function support.
///
/// Not `Send`: the state must stay on the thread that created it. Hosts
/// that need several threads create one engine per thread.
pub struct Engine {
    stack: StackAdapter,
    registry: ClosureRegistry,
    config: EngineConfig,
}

impl Engine {
    /// Engine with every standard library and traceback capture enabled.
    pub fn new() -> Result<Self, AllocationError> {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Result<Self, AllocationError> {
        let state = unsafe { ffi::luaL_newstate() };
        let stack = unsafe { StackAdapter::from_raw(state) }.ok_or(AllocationError)?;

        // Opening libraries allocates; run it protected.
        let status = unsafe {
            ffi::lua_pushcfunction(state, open_libraries);
            ffi::lua_pushinteger(state, i64::from(config.stdlib.bits()));
            ffi::lua_pcall(state, 1, 0, 0)
        };
        if status != ffi::LUA_OK {
            unsafe { ffi::lua_close(state) };
            return Err(AllocationError);
        }

        let id = NEXT_ENGINE_ID.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(id, stdlib = ?config.stdlib, "engine created");
        Ok(Engine {
            stack,
            registry: ClosureRegistry::new(id),
            config,
        })
    }

    #[inline]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[inline]
    pub(crate) fn stack(&self) -> StackAdapter {
        self.stack
    }

    /// Current depth of the engine stack. Zero between host operations.
    pub fn stack_depth(&self) -> usize {
        usize::try_from(self.stack.top()).unwrap_or(0)
    }

    /// Number of host functions stored in this engine.
    pub fn function_count(&self) -> usize {
        self.registry.len()
    }

    /// Evaluate `source` against the shared globals.
    ///
    /// With `protected`, failures carry a traceback captured where the
    /// error was raised; without it `traceback` is empty.
    #[tracing::instrument(level = "debug", skip_all, fields(protected = protected))]
    pub fn eval(&mut self, source: &str, protected: bool) -> Result<MultiValue, ScriptError> {
        protected::run_chunk(self.stack, &Chunk::new(source), protected)
    }

    /// [`eval`](Self::eval) with traceback capture taken from the config.
    pub fn eval_default(&mut self, source: &str) -> Result<MultiValue, ScriptError> {
        self.eval(source, self.config.traceback)
    }

    /// Evaluate `source` with `name` in error positions (`name:line:`).
    #[tracing::instrument(level = "debug", skip_all, fields(name = name))]
    pub fn eval_named(
        &mut self,
        name: &str,
        source: &str,
        protected: bool,
    ) -> Result<MultiValue, ScriptError> {
        protected::run_chunk(self.stack, &Chunk::new(source).named(name), protected)
    }

    /// A private environment for the next evaluation issued through it.
    pub fn evaluation_environment(&mut self) -> EvaluationEnvironment<'_> {
        EvaluationEnvironment::new(self)
    }

    /// Call the script function bound at `path`, always protected.
    #[tracing::instrument(level = "debug", skip_all, fields(path = path))]
    pub fn call(
        &mut self,
        path: &str,
        args: impl IntoIterator<Item = Value>,
    ) -> Result<MultiValue, ScriptError> {
        protected::call_path(self.stack, path, args.into_iter().collect(), true)
    }

    /// Bind a plain value under a dotted path.
    pub fn set(&mut self, path: &str, value: impl IntoValue) -> Result<(), Error> {
        let path = NamespacePath::parse(path)?;
        tracing::debug!(path = path.as_str(), "set");
        let slot = namespace::resolve(path, self.stack)?;
        self.stack.push_value(&value.into_value())?;
        slot.assign();
        Ok(())
    }

    /// Read the value bound at a dotted path. Absent names read as `Nil`.
    pub fn get(&mut self, path: &str) -> Result<Value, Error> {
        let path = NamespacePath::parse(path)?;
        let _guard = StackGuard::new(self.stack);
        namespace::lookup(&path, self.stack)?;
        Ok(self.stack.to_value(-1)?)
    }

    /// Store a host function and return its identity without binding it.
    ///
    /// `name` prefixes every error the function raises.
    pub fn add_native<F>(&mut self, name: impl Into<String>, func: F) -> HostFunctionHandle
    where
        F: Fn(&mut CallContext<'_>, MultiValue) -> Result<MultiValue, HostError> + 'static,
    {
        self.registry
            .register(NativeFunction::new(name, Box::new(func)))
    }

    /// The most recent host function stored under `name`.
    ///
    /// Typed and raw registrations are stored under their dotted path.
    pub fn native_handle(&self, name: &str) -> Option<HostFunctionHandle> {
        self.registry.lookup(name)
    }

    /// Bind a previously added host function under a dotted path.
    ///
    /// Intermediate tables are created as needed. Fails with
    /// [`NamespaceError::NotANamespace`](crate::NamespaceError::NotANamespace)
    /// when an intermediate segment holds a non-table value; nothing is
    /// modified in that case.
    pub fn register_native_function(
        &mut self,
        path: &str,
        handle: HostFunctionHandle,
    ) -> Result<(), Error> {
        let path = NamespacePath::parse(path)?;
        self.bind_handle(path, handle)
    }

    /// Register a typed Rust closure under a dotted path.
    ///
    /// Arguments are converted with `FromValue`; a wrong argument count or
    /// type raises a script error naming the function.
    pub fn register<F, Marker>(&mut self, path: &str, func: F) -> Result<HostFunctionHandle, Error>
    where
        F: IntoNative<Marker>,
    {
        let path = NamespacePath::parse(path)?;
        let handle = self
            .registry
            .register(NativeFunction::new(path.as_str(), func.into_native()));
        self.bind_handle(path, handle)?;
        Ok(handle)
    }

    /// Register a closure that receives the raw argument list.
    pub fn register_raw<F>(&mut self, path: &str, func: F) -> Result<HostFunctionHandle, Error>
    where
        F: Fn(&mut CallContext<'_>, MultiValue) -> Result<MultiValue, HostError> + 'static,
    {
        let path = NamespacePath::parse(path)?;
        let handle = self.add_native(path.as_str(), func);
        self.bind_handle(path, handle)?;
        Ok(handle)
    }

    fn bind_handle(&mut self, path: NamespacePath, handle: HostFunctionHandle) -> Result<(), Error> {
        if !self.registry.contains(handle) {
            return Err(Error::ForeignHandle(handle.index()));
        }
        tracing::debug!(path = path.as_str(), index = handle.index(), "register");
        let slot = namespace::resolve(path, self.stack)?;
        self.registry.push_native_closure(self.stack, handle)?;
        slot.assign();
        Ok(())
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        tracing::debug!(functions = self.registry.len(), "engine closed");
        // the registry is dropped after this, once no closure can run
        unsafe { ffi::lua_close(self.stack.as_ptr()) };
    }
}
