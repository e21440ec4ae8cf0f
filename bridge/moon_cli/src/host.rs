//! The `host.*` namespace scripts see when run through `moon`.

use moon_bridge::{Engine, Error, HostError};

/// Register `host.version()` and `host.log(level, message)`.
pub fn install(engine: &mut Engine) -> Result<(), Error> {
    engine.register("host.version", || env!("CARGO_PKG_VERSION"))?;
    engine.register("host.log", log)?;
    Ok(())
}

fn log(level: String, message: String) -> Result<(), HostError> {
    match level.as_str() {
        "trace" => tracing::trace!(target: "script", "{message}"),
        "debug" => tracing::debug!(target: "script", "{message}"),
        "info" => tracing::info!(target: "script", "{message}"),
        "warn" => tracing::warn!(target: "script", "{message}"),
        "error" => tracing::error!(target: "script", "{message}"),
        other => return Err(HostError::new(format!("unknown log level '{other}'"))),
    }
    Ok(())
}
