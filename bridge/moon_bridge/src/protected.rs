//! Protected loading and calling.
//!
//! Every host-issued evaluation goes through `lua_pcall`. With `protected`
//! set, [`traceback_handler`] is installed below the callee so failures carry
//! a traceback; without it the call still runs under `lua_pcall` (an engine
//! raise must never cross host frames) but no traceback is captured.

use std::borrow::Cow;
use std::ffi::{c_int, CStr, CString};

use moon_value::{MultiValue, Value};

use crate::errors::{Error, ScriptError, ScriptErrorKind};
use crate::namespace::{self, NamespacePath};
use crate::stack::{StackAdapter, StackGuard, ValueType};
use crate::traceback::{error_text, traceback_handler};

/// A piece of source text queued for evaluation.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Chunk<'a> {
    source: &'a str,
    name: Option<&'a str>,
    bindings: Option<&'a [(String, Value)]>,
}

impl<'a> Chunk<'a> {
    pub(crate) fn new(source: &'a str) -> Self {
        Chunk {
            source,
            name: None,
            bindings: None,
        }
    }

    /// Name reported in error positions (`name:line:`).
    pub(crate) fn named(mut self, name: &'a str) -> Self {
        self.name = Some(name);
        self
    }

    /// Run in a fresh environment pre-populated with `bindings`.
    pub(crate) fn in_environment(mut self, bindings: &'a [(String, Value)]) -> Self {
        self.bindings = Some(bindings);
        self
    }

    /// Chunk name as the engine expects it.
    ///
    /// Unnamed chunks use their own source, so messages read
    /// `[string "..."]:1:` as they do for `load`.
    fn chunk_name(&self) -> Cow<'static, CStr> {
        let name = match self.name {
            Some(name) => CString::new(format!("={name}")),
            None => CString::new(self.source),
        };
        name.map_or(Cow::Borrowed(c"=(load)"), Cow::Owned)
    }
}

/// Load and run `chunk`, returning every value it returns.
pub(crate) fn run_chunk(
    stack: StackAdapter,
    chunk: &Chunk<'_>,
    protected: bool,
) -> Result<MultiValue, ScriptError> {
    let _guard = StackGuard::new(stack);
    stack.ensure_capacity(3)?;
    let handler = push_handler(stack, protected);

    load(stack, chunk)?;
    let func = stack.top();
    if let Some(bindings) = chunk.bindings {
        install_environment(stack, func, bindings)?;
    }
    call_at(stack, func, 0, handler)
}

/// Call the function bound at `path` with `args`.
pub(crate) fn call_path(
    stack: StackAdapter,
    path: &str,
    args: MultiValue,
    protected: bool,
) -> Result<MultiValue, ScriptError> {
    let _guard = StackGuard::new(stack);
    stack.ensure_capacity(2)?;
    let handler = push_handler(stack, protected);

    let path = NamespacePath::parse(path)?;
    let found = namespace::lookup(&path, stack).map_err(|err| match err {
        Error::Script(err) => err,
        other => ScriptError::runtime(other.to_string()),
    })?;
    if found != ValueType::Function {
        return Err(ScriptError::runtime(format!(
            "{path} is not a function (found {})",
            found.name()
        )));
    }

    let func = stack.top();
    stack.ensure_capacity(args.len())?;
    for arg in &args {
        stack.push_value(arg)?;
    }
    let nargs = c_int::try_from(args.len()).unwrap_or(c_int::MAX);
    call_at(stack, func, nargs, handler)
}

/// Push the message handler when `protected`; returns its index or 0.
fn push_handler(stack: StackAdapter, protected: bool) -> c_int {
    if !protected {
        return 0;
    }
    unsafe { ffi::lua_pushcfunction(stack.as_ptr(), traceback_handler) };
    stack.top()
}

fn load(stack: StackAdapter, chunk: &Chunk<'_>) -> Result<(), ScriptError> {
    let name = chunk.chunk_name();
    let status = unsafe {
        ffi::luaL_loadbufferx(
            stack.as_ptr(),
            chunk.source.as_ptr().cast(),
            chunk.source.len(),
            name.as_ptr(),
            c"t".as_ptr(),
        )
    };
    if status == ffi::LUA_OK {
        return Ok(());
    }
    let message = error_text(stack, -1);
    stack.pop(1);
    Err(ScriptError::untraced(ScriptErrorKind::from_status(status), message))
}

/// Replace the `_ENV` upvalue of the function at `func` with a fresh table
/// whose reads fall back to the globals.
fn install_environment(
    stack: StackAdapter,
    func: c_int,
    bindings: &[(String, Value)],
) -> Result<(), ScriptError> {
    stack.ensure_capacity(3)?;
    stack.new_table(0, bindings.len());
    for (name, value) in bindings {
        stack.push_value(value)?;
        stack.raw_set_field(-2, name);
    }

    stack.new_table(0, 1);
    stack.push_globals();
    stack.raw_set_field(-2, "__index");
    stack.set_metatable(-2);

    // A main chunk's only upvalue is `_ENV`.
    let bound = unsafe { ffi::lua_setupvalue(stack.as_ptr(), func, 1) };
    if bound.is_null() {
        stack.pop(1);
    }
    Ok(())
}

/// `lua_pcall` the function at `func` (arguments above it) and collect all
/// results.
fn call_at(
    stack: StackAdapter,
    func: c_int,
    nargs: c_int,
    handler: c_int,
) -> Result<MultiValue, ScriptError> {
    let status = unsafe { ffi::lua_pcall(stack.as_ptr(), nargs, ffi::LUA_MULTRET, handler) };
    if status != ffi::LUA_OK {
        let kind = ScriptErrorKind::from_status(status);
        let raw = error_text(stack, -1);
        if handler == 0 {
            return Err(ScriptError::untraced(kind, raw));
        }
        return Err(ScriptError::from_raw(kind, raw));
    }

    let top = stack.top();
    let mut results = MultiValue::with_capacity(usize::try_from(top - func + 1).unwrap_or(0));
    for (idx, position) in (func..=top).zip(1usize..) {
        let value = stack
            .to_value(idx)
            .map_err(|err| ScriptError::conversion(position, &err))?;
        results.push(value);
    }
    Ok(results)
}
