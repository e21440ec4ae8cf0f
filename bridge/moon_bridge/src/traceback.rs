//! Error/Traceback Capturer.
//!
//! [`traceback_handler`] is installed as the message handler of protected
//! calls. It runs at the raise point, before the engine unwinds the failing
//! frames, so the call stack it describes is the one that actually failed.
//! The host later separates the message from the appended traceback with
//! [`split_traceback`].

use std::ffi::c_int;

use crate::stack::{StackAdapter, ValueType};

/// Header line `luaL_traceback` writes before the frame list.
pub const TRACEBACK_MARKER: &str = "stack traceback:";

/// Message handler for `lua_pcall`.
///
/// Replaces the error value at index 1 with `message + "\n" + traceback`.
/// Never raises: if there is no room to build the traceback the original
/// value is returned untouched.
pub(crate) unsafe extern "C-unwind" fn traceback_handler(state: *mut ffi::lua_State) -> c_int {
    let Some(stack) = (unsafe { StackAdapter::from_raw(state) }) else {
        return 1;
    };
    // message copy + luaL_traceback's buffer
    if stack.ensure_capacity(4).is_err() {
        return 1;
    }

    let message = error_text(stack, 1);
    stack.push_str(&message);
    drop(message);
    unsafe {
        let msg = ffi::lua_tolstring(state, -1, std::ptr::null_mut());
        ffi::luaL_traceback(state, state, msg, 1);
    }
    1
}

/// Text of an error value.
///
/// Strings and numbers keep their text. Values with a `__tostring`
/// metamethod use its result; anything else is described by type.
pub(crate) fn error_text(stack: StackAdapter, idx: c_int) -> String {
    match stack.type_at(idx) {
        ValueType::String => stack.to_string_lossy(idx).unwrap_or_default(),
        ValueType::Number => match stack.to_value(idx) {
            Ok(value) => value.to_string(),
            Err(_) => String::new(),
        },
        other => tostring_metamethod(stack, idx)
            .unwrap_or_else(|| format!("(error object is a {} value)", other.name())),
    }
}

/// Run the `__tostring` metamethod of the value at `idx`, if it has one.
///
/// The metamethod runs under its own `lua_pcall`; a raise or a non-string
/// result yields `None`. Leaves the stack as it found it.
fn tostring_metamethod(stack: StackAdapter, idx: c_int) -> Option<String> {
    let idx = stack.abs_index(idx);
    stack.ensure_capacity(2).ok()?;
    let found = unsafe { ffi::luaL_getmetafield(stack.as_ptr(), idx, c"__tostring".as_ptr()) };
    if found == ffi::LUA_TNIL {
        return None;
    }
    stack.pop(1);

    unsafe { ffi::lua_pushcfunction(stack.as_ptr(), describe_value) };
    stack.push_copy(idx);
    let status = unsafe { ffi::lua_pcall(stack.as_ptr(), 1, 1, 0) };
    let text = if status == ffi::LUA_OK && stack.type_at(-1) == ValueType::String {
        stack.to_string_lossy(-1)
    } else {
        None
    };
    stack.pop(1);
    text
}

unsafe extern "C-unwind" fn describe_value(state: *mut ffi::lua_State) -> c_int {
    unsafe { ffi::luaL_tolstring(state, 1, std::ptr::null_mut()) };
    1
}

/// Separate a handler-produced error string into `(message, traceback)`.
///
/// The last marker wins, so a message that itself embeds an earlier
/// traceback (a nested failure re-raised by host code) stays intact.
pub fn split_traceback(raw: String) -> (String, String) {
    let marker = format!("\n{TRACEBACK_MARKER}");
    match raw.rfind(&marker) {
        Some(at) => {
            let traceback = raw[at + 1..].to_string();
            let mut message = raw;
            message.truncate(at);
            (message, traceback)
        }
        None if raw.starts_with(TRACEBACK_MARKER) => (String::new(), raw),
        None => (raw, String::new()),
    }
}
