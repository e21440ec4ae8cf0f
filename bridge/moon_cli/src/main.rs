//! Moon CLI
//!
//! Runs Lua scripts with the `host.*` namespace registered.

mod host;
mod options;

use std::sync::Once;

use moon_bridge::{Engine, EngineConfig, MultiValue, ScriptError};

use crate::options::{Options, Source};

static TRACING_INIT: Once = Once::new();

/// Install a hierarchical subscriber when `RUST_LOG` is set.
fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{prelude::*, EnvFilter};

        if std::env::var("RUST_LOG").is_ok() {
            let filter = EnvFilter::from_default_env();
            tracing_subscriber::registry()
                .with(tracing_tree::HierarchicalLayer::new(2).with_targets(true))
                .with(filter)
                .init();
        }
    });
}

fn main() {
    init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() {
        print_usage();
        return;
    }

    let options = match Options::parse(&args) {
        Ok(options) => options,
        Err(message) => {
            eprintln!("error: {message}");
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    };

    let config = match EngineConfig::from_env() {
        Ok(config) => options.engine_config(config),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(1);
        }
    };

    let mut engine = match Engine::with_config(config) {
        Ok(engine) => engine,
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(1);
        }
    };
    if let Err(err) = host::install(&mut engine) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }

    let traceback = config.traceback;
    let result = match &options.source {
        Source::File(path) => match std::fs::read_to_string(path) {
            Ok(source) => engine.eval_named(path, &source, traceback),
            Err(err) => {
                eprintln!("error: cannot read '{path}': {err}");
                std::process::exit(1);
            }
        },
        Source::Inline(chunk) => engine.eval(chunk, traceback),
    };

    match result {
        Ok(values) => print_values(&values),
        Err(err) => {
            report(&err);
            std::process::exit(1);
        }
    }
}

fn print_values(values: &MultiValue) {
    if values.is_empty() {
        return;
    }
    let line: Vec<String> = values.iter().map(ToString::to_string).collect();
    println!("{}", line.join("\t"));
}

fn report(err: &ScriptError) {
    eprintln!("{}: {}", err.kind, err.message);
    if !err.traceback.is_empty() {
        eprintln!("{}", err.traceback);
    }
}

fn print_usage() {
    eprintln!("Moon - run Lua with Rust host functions");
    eprintln!();
    eprintln!("Usage: moon <command> [options]");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  run <file.lua>     Run a script file");
    eprintln!("  eval '<chunk>'     Evaluate an inline chunk");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --sandbox          Open only libraries without io/os/debug access");
    eprintln!("  --no-traceback     Report errors without a stack traceback");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  MOON_STDLIB        all | default | none | safe | comma list (base,string,...)");
    eprintln!("  MOON_TRACEBACK     0/off disables tracebacks");
    eprintln!("  RUST_LOG           enable tracing output (e.g. moon_bridge=debug)");
}
