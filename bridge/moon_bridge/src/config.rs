//! Engine configuration.
//!
//! Plain struct with builder methods, plus [`EngineConfig::from_env`] for
//! hosts that configure through the environment:
//!
//! - `MOON_STDLIB`: `all`, `none`, `safe`, or a comma list such as
//!   `base,string,math`
//! - `MOON_TRACEBACK`: `0`/`off`/`false` disables traceback capture for
//!   `Engine::eval_default`

use std::ffi::{c_int, CStr};

use bitflags::bitflags;
use thiserror::Error;

bitflags! {
    /// Standard libraries opened when an engine is created.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct StdLib: u32 {
        const BASE = 1;
        const COROUTINE = 1 << 1;
        const TABLE = 1 << 2;
        const IO = 1 << 3;
        const OS = 1 << 4;
        const STRING = 1 << 5;
        const UTF8 = 1 << 6;
        const MATH = 1 << 7;
        const DEBUG = 1 << 8;
        const PACKAGE = 1 << 9;

        /// Libraries without filesystem, process, or debug access.
        const SAFE = Self::BASE.bits()
            | Self::COROUTINE.bits()
            | Self::TABLE.bits()
            | Self::STRING.bits()
            | Self::UTF8.bits()
            | Self::MATH.bits();

        /// Everything but `debug`, which can rewrite a native closure's
        /// upvalue. Opt in with `all` or by listing it.
        const DEFAULT = Self::SAFE.bits()
            | Self::IO.bits()
            | Self::OS.bits()
            | Self::PACKAGE.bits();
    }
}

type Opener = unsafe extern "C-unwind" fn(*mut ffi::lua_State) -> c_int;

/// Library name, module name, and opener for each flag, in load order.
const LIBRARIES: [(&str, StdLib, &CStr, Opener); 10] = [
    ("base", StdLib::BASE, c"_G", ffi::luaopen_base),
    ("package", StdLib::PACKAGE, c"package", ffi::luaopen_package),
    ("coroutine", StdLib::COROUTINE, c"coroutine", ffi::luaopen_coroutine),
    ("table", StdLib::TABLE, c"table", ffi::luaopen_table),
    ("io", StdLib::IO, c"io", ffi::luaopen_io),
    ("os", StdLib::OS, c"os", ffi::luaopen_os),
    ("string", StdLib::STRING, c"string", ffi::luaopen_string),
    ("utf8", StdLib::UTF8, c"utf8", ffi::luaopen_utf8),
    ("math", StdLib::MATH, c"math", ffi::luaopen_math),
    ("debug", StdLib::DEBUG, c"debug", ffi::luaopen_debug),
];

impl StdLib {
    /// Parse `all`, `default`, `none`, `safe`, or a comma-separated list of
    /// names.
    pub fn parse(list: &str) -> Result<Self, ConfigError> {
        match list.trim() {
            "all" => return Ok(StdLib::all()),
            "default" => return Ok(StdLib::DEFAULT),
            "none" | "" => return Ok(StdLib::empty()),
            "safe" => return Ok(StdLib::SAFE),
            _ => {}
        }
        list.split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .try_fold(StdLib::empty(), |libs, name| {
                LIBRARIES
                    .iter()
                    .find(|(lib, ..)| *lib == name)
                    .map(|(_, flag, ..)| libs | *flag)
                    .ok_or_else(|| ConfigError::UnknownLibrary(name.to_string()))
            })
    }
}

/// Open every library in `libs` into the state's globals.
///
/// Runs inside a protected call: the first argument is the flag bits.
pub(crate) unsafe extern "C-unwind" fn open_libraries(state: *mut ffi::lua_State) -> c_int {
    let bits = unsafe { ffi::lua_tointegerx(state, 1, std::ptr::null_mut()) };
    let libs = StdLib::from_bits_truncate(u32::try_from(bits).unwrap_or(0));
    for (_, flag, module, open) in LIBRARIES {
        if libs.contains(flag) {
            unsafe {
                ffi::luaL_requiref(state, module.as_ptr(), open, 1);
                ffi::lua_settop(state, -2);
            }
        }
    }
    0
}

/// Invalid configuration input.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("unknown standard library '{0}'")]
    UnknownLibrary(String),
    #[error("invalid value '{value}' for {var}")]
    InvalidValue { var: &'static str, value: String },
}

/// Settings applied when an engine is created.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    /// Libraries opened at startup.
    pub stdlib: StdLib,
    /// Capture tracebacks in `Engine::eval_default`.
    pub traceback: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            stdlib: StdLib::DEFAULT,
            traceback: true,
        }
    }
}

impl EngineConfig {
    #[must_use]
    pub fn with_stdlib(mut self, stdlib: StdLib) -> Self {
        self.stdlib = stdlib;
        self
    }

    #[must_use]
    pub fn with_traceback(mut self, traceback: bool) -> Self {
        self.traceback = traceback;
        self
    }

    /// Defaults overridden by `MOON_STDLIB` and `MOON_TRACEBACK`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = EngineConfig::default();
        if let Some(libs) = var("MOON_STDLIB") {
            config.stdlib = StdLib::parse(&libs)?;
        }
        if let Some(flag) = var("MOON_TRACEBACK") {
            config.traceback = match flag.trim().to_ascii_lowercase().as_str() {
                "1" | "on" | "true" | "" => true,
                "0" | "off" | "false" => false,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        var: "MOON_TRACEBACK",
                        value: flag,
                    })
                }
            };
        }
        Ok(config)
    }
}
