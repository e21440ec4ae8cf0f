//! Value Stack Adapter: typed access to the engine's evaluation stack.
//!
//! Every other component talks to the engine through [`StackAdapter`]. It is
//! a thin, copyable wrapper around the raw `lua_State` pointer; it owns
//! nothing and performs no allocation beyond what marshaling an individual
//! value requires.
//!
//! # Stack Discipline
//!
//! The engine's calling convention is positional: a call consumes exactly the
//! values its protocol declares. Host-issued operations record the depth with
//! a [`StackGuard`] and restore it on exit, including early `?` returns, so a
//! failed marshal never leaves stray values behind.

use std::ffi::{c_int, c_void};
use std::ptr::{self, NonNull};

use moon_value::{ConversionError, Value, MAX_TABLE_DEPTH};

use crate::errors::StackOverflow;

/// Engine-side type tag of a stack slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValueType {
    /// The index does not refer to a valid slot.
    None,
    Nil,
    Boolean,
    LightUserData,
    Number,
    String,
    Table,
    Function,
    UserData,
    Thread,
}

impl ValueType {
    fn from_raw(tag: c_int) -> Self {
        match tag {
            ffi::LUA_TNIL => ValueType::Nil,
            ffi::LUA_TBOOLEAN => ValueType::Boolean,
            ffi::LUA_TLIGHTUSERDATA => ValueType::LightUserData,
            ffi::LUA_TNUMBER => ValueType::Number,
            ffi::LUA_TSTRING => ValueType::String,
            ffi::LUA_TTABLE => ValueType::Table,
            ffi::LUA_TFUNCTION => ValueType::Function,
            ffi::LUA_TUSERDATA => ValueType::UserData,
            ffi::LUA_TTHREAD => ValueType::Thread,
            _ => ValueType::None,
        }
    }

    /// Name as reported by `type()` inside scripts.
    pub fn name(self) -> &'static str {
        match self {
            ValueType::None => "no value",
            ValueType::Nil => "nil",
            ValueType::Boolean => "boolean",
            ValueType::LightUserData | ValueType::UserData => "userdata",
            ValueType::Number => "number",
            ValueType::String => "string",
            ValueType::Table => "table",
            ValueType::Function => "function",
            ValueType::Thread => "thread",
        }
    }
}

/// Non-owning handle to one engine's evaluation stack.
///
/// Not `Send`: a stack belongs to whichever thread holds the engine.
#[derive(Clone, Copy, Debug)]
pub struct StackAdapter {
    state: NonNull<ffi::lua_State>,
}

impl StackAdapter {
    /// Wrap a raw engine state.
    ///
    /// # Safety
    ///
    /// `state` must be a live Lua state that outlives every use of the
    /// returned adapter, and must not be used concurrently from another
    /// thread.
    pub unsafe fn from_raw(state: *mut ffi::lua_State) -> Option<Self> {
        NonNull::new(state).map(|state| StackAdapter { state })
    }

    #[inline]
    pub(crate) fn as_ptr(self) -> *mut ffi::lua_State {
        self.state.as_ptr()
    }

    /// Index of the top slot (equals the number of slots in the frame).
    #[inline]
    pub fn top(self) -> c_int {
        unsafe { ffi::lua_gettop(self.as_ptr()) }
    }

    /// Truncate (or nil-extend) the frame to `top` slots.
    #[inline]
    pub fn set_top(self, top: c_int) {
        unsafe { ffi::lua_settop(self.as_ptr(), top) }
    }

    /// Remove the top `n` values.
    #[inline]
    pub fn pop(self, n: c_int) {
        unsafe { ffi::lua_settop(self.as_ptr(), -n - 1) }
    }

    /// Convert a relative index into an absolute one.
    #[inline]
    pub fn abs_index(self, idx: c_int) -> c_int {
        unsafe { ffi::lua_absindex(self.as_ptr(), idx) }
    }

    /// Make room for `n` more values.
    pub fn ensure_capacity(self, n: usize) -> Result<(), StackOverflow> {
        let grown = c_int::try_from(n)
            .is_ok_and(|extra| unsafe { ffi::lua_checkstack(self.as_ptr(), extra) } != 0);
        if grown {
            Ok(())
        } else {
            Err(StackOverflow { needed: n })
        }
    }

    #[inline]
    pub fn type_at(self, idx: c_int) -> ValueType {
        ValueType::from_raw(unsafe { ffi::lua_type(self.as_ptr(), idx) })
    }

    // Pushes. Callers reserve capacity with `ensure_capacity` first.

    #[inline]
    pub fn push_nil(self) {
        unsafe { ffi::lua_pushnil(self.as_ptr()) }
    }

    #[inline]
    pub fn push_boolean(self, b: bool) {
        unsafe { ffi::lua_pushboolean(self.as_ptr(), c_int::from(b)) }
    }

    #[inline]
    pub fn push_integer(self, n: i64) {
        unsafe { ffi::lua_pushinteger(self.as_ptr(), n) }
    }

    #[inline]
    pub fn push_number(self, n: f64) {
        unsafe { ffi::lua_pushnumber(self.as_ptr(), n) }
    }

    /// Push a copy of `s` (the engine interns its own copy).
    #[inline]
    pub fn push_str(self, s: &str) {
        unsafe {
            ffi::lua_pushlstring(self.as_ptr(), s.as_ptr().cast(), s.len());
        }
    }

    #[inline]
    pub fn push_light_userdata(self, p: *mut c_void) {
        unsafe { ffi::lua_pushlightuserdata(self.as_ptr(), p) }
    }

    /// Push a copy of the value at `idx`.
    #[inline]
    pub fn push_copy(self, idx: c_int) {
        unsafe { ffi::lua_pushvalue(self.as_ptr(), idx) }
    }

    /// Push a new empty table with preallocated slots.
    pub fn new_table(self, narr: usize, nrec: usize) {
        let narr = c_int::try_from(narr).unwrap_or(0);
        let nrec = c_int::try_from(nrec).unwrap_or(0);
        unsafe { ffi::lua_createtable(self.as_ptr(), narr, nrec) }
    }

    /// Push the shared global table.
    pub fn push_globals(self) {
        unsafe {
            ffi::lua_rawgeti(self.as_ptr(), ffi::LUA_REGISTRYINDEX, ffi::LUA_RIDX_GLOBALS);
        }
    }

    /// Push `table[key]` without invoking metamethods and return its type.
    pub fn raw_get_field(self, table: c_int, key: &str) -> ValueType {
        let table = self.abs_index(table);
        self.push_str(key);
        ValueType::from_raw(unsafe { ffi::lua_rawget(self.as_ptr(), table) })
    }

    /// Pop the top value into `table[key]` without invoking metamethods.
    pub fn raw_set_field(self, table: c_int, key: &str) {
        let table = self.abs_index(table);
        self.push_str(key);
        unsafe {
            ffi::lua_rotate(self.as_ptr(), -2, 1);
            ffi::lua_rawset(self.as_ptr(), table);
        }
    }

    /// Pop the top value and make it the metatable of the value at `idx`.
    pub fn set_metatable(self, idx: c_int) {
        unsafe {
            ffi::lua_setmetatable(self.as_ptr(), idx);
        }
    }

    /// Read the light userdata stored in upvalue `n` of the running C closure.
    #[inline]
    pub(crate) fn upvalue_userdata(self, n: c_int) -> *mut c_void {
        unsafe { ffi::lua_touserdata(self.as_ptr(), ffi::lua_upvalueindex(n)) }
    }

    /// Copy the string at `idx`, if the slot holds one.
    ///
    /// Numbers are deliberately not coerced: `lua_tolstring` would rewrite
    /// the slot in place.
    pub fn to_string_lossy(self, idx: c_int) -> Option<String> {
        if self.type_at(idx) != ValueType::String {
            return None;
        }
        let mut len = 0usize;
        let data = unsafe { ffi::lua_tolstring(self.as_ptr(), idx, &mut len) };
        if data.is_null() {
            return None;
        }
        let bytes = unsafe { std::slice::from_raw_parts(data.cast::<u8>(), len) };
        Some(String::from_utf8_lossy(bytes).into_owned())
    }

    /// Read the value at `idx` without removing it.
    pub fn to_value(self, idx: c_int) -> Result<Value, ConversionError> {
        self.to_value_at(idx, 0)
    }

    fn to_value_at(self, idx: c_int, depth: usize) -> Result<Value, ConversionError> {
        let state = self.as_ptr();
        match self.type_at(idx) {
            ValueType::None | ValueType::Nil => Ok(Value::Nil),
            ValueType::Boolean => Ok(Value::Boolean(unsafe { ffi::lua_toboolean(state, idx) } != 0)),
            ValueType::Number => {
                if unsafe { ffi::lua_isinteger(state, idx) } != 0 {
                    Ok(Value::Integer(unsafe {
                        ffi::lua_tointegerx(state, idx, ptr::null_mut())
                    }))
                } else {
                    Ok(Value::Number(unsafe {
                        ffi::lua_tonumberx(state, idx, ptr::null_mut())
                    }))
                }
            }
            ValueType::String => Ok(Value::String(self.to_string_lossy(idx).unwrap_or_default())),
            ValueType::LightUserData => Ok(Value::LightUserData(unsafe {
                ffi::lua_touserdata(state, idx)
            })),
            ValueType::Table => self.table_to_value(idx, depth),
            other @ (ValueType::Function | ValueType::UserData | ValueType::Thread) => {
                Err(ConversionError::Unsupported {
                    type_name: other.name(),
                })
            }
        }
    }

    fn table_to_value(self, idx: c_int, depth: usize) -> Result<Value, ConversionError> {
        if depth >= MAX_TABLE_DEPTH {
            return Err(ConversionError::TooDeep {
                limit: MAX_TABLE_DEPTH,
            });
        }
        // key + value of the traversal
        self.ensure_capacity(2)
            .map_err(|_| ConversionError::TooDeep {
                limit: MAX_TABLE_DEPTH,
            })?;

        let table = self.abs_index(idx);
        let mut indexed = Vec::new();
        let mut named = std::collections::BTreeMap::new();

        self.push_nil();
        while unsafe { ffi::lua_next(self.as_ptr(), table) } != 0 {
            let entry = self.read_entry(depth);
            // drop the value, keep the key for the next step
            self.pop(1);
            match entry {
                Ok(TableKey::Index(i, value)) => indexed.push((i, value)),
                Ok(TableKey::Name(name, value)) => {
                    named.insert(name, value);
                }
                Err(err) => {
                    self.pop(1);
                    return Err(err);
                }
            }
        }

        if named.is_empty() {
            indexed.sort_unstable_by_key(|(i, _)| *i);
            let is_sequence = indexed
                .iter()
                .enumerate()
                .all(|(pos, (i, _))| usize::try_from(*i).is_ok_and(|i| i == pos + 1));
            if is_sequence {
                return Ok(Value::List(indexed.into_iter().map(|(_, v)| v).collect()));
            }
        }
        if indexed.is_empty() {
            return Ok(Value::Map(named));
        }
        Err(ConversionError::UnsupportedKey { type_name: "number" })
    }

    /// Read the key (at -2) and value (at -1) of a `lua_next` step.
    fn read_entry(self, depth: usize) -> Result<TableKey, ConversionError> {
        let value = self.to_value_at(-1, depth + 1)?;
        match self.type_at(-2) {
            ValueType::String => Ok(TableKey::Name(
                self.to_string_lossy(-2).unwrap_or_default(),
                value,
            )),
            ValueType::Number if unsafe { ffi::lua_isinteger(self.as_ptr(), -2) } != 0 => {
                let i = unsafe { ffi::lua_tointegerx(self.as_ptr(), -2, ptr::null_mut()) };
                Ok(TableKey::Index(i, value))
            }
            other => Err(ConversionError::UnsupportedKey {
                type_name: other.name(),
            }),
        }
    }

    /// Push a host value, building tables for lists and maps.
    pub fn push_value(self, value: &Value) -> Result<(), StackOverflow> {
        // the value itself plus a key slot while filling tables
        self.ensure_capacity(2)?;
        match value {
            Value::Nil => self.push_nil(),
            Value::Boolean(b) => self.push_boolean(*b),
            Value::Integer(n) => self.push_integer(*n),
            Value::Number(n) => self.push_number(*n),
            Value::String(s) => self.push_str(s),
            Value::LightUserData(p) => self.push_light_userdata(*p),
            Value::List(items) => {
                self.new_table(items.len(), 0);
                for (i, item) in (1..).zip(items) {
                    self.push_value(item)?;
                    unsafe { ffi::lua_rawseti(self.as_ptr(), -2, i) };
                }
            }
            Value::Map(entries) => {
                self.new_table(0, entries.len());
                for (key, item) in entries {
                    self.push_value(item)?;
                    self.raw_set_field(-2, key);
                }
            }
        }
        Ok(())
    }
}

enum TableKey {
    Index(i64, Value),
    Name(String, Value),
}

/// Restores the stack depth recorded at construction when dropped.
pub struct StackGuard {
    stack: StackAdapter,
    top: c_int,
}

impl StackGuard {
    pub fn new(stack: StackAdapter) -> Self {
        StackGuard {
            top: stack.top(),
            stack,
        }
    }
}

impl Drop for StackGuard {
    fn drop(&mut self) {
        self.stack.set_top(self.top);
    }
}
