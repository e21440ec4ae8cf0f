//! Evaluation environments: a private global scope over the shared one.
//!
//! Reads fall through to the shared globals; assignments land in the
//! environment's own table and disappear with it.

use moon_value::{IntoValue, MultiValue, Value};

use crate::engine::Engine;
use crate::errors::ScriptError;
use crate::protected::{self, Chunk};

/// A fresh environment for the next evaluation issued through it.
///
/// Created by [`Engine::evaluation_environment`]. Consumed by `eval`, so
/// each environment serves exactly one evaluation.
pub struct EvaluationEnvironment<'e> {
    engine: &'e mut Engine,
    bindings: Vec<(String, Value)>,
    name: Option<String>,
}

impl<'e> EvaluationEnvironment<'e> {
    pub(crate) fn new(engine: &'e mut Engine) -> Self {
        EvaluationEnvironment {
            engine,
            bindings: Vec::new(),
            name: None,
        }
    }

    /// Make `value` visible to the chunk as the global `name`.
    #[must_use]
    pub fn bind(mut self, name: impl Into<String>, value: impl IntoValue) -> Self {
        self.bindings.push((name.into(), value.into_value()));
        self
    }

    /// Chunk name used in error positions.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Evaluate `source` in this environment.
    #[tracing::instrument(level = "debug", skip_all, fields(protected = protected, bindings = self.bindings.len()))]
    pub fn eval(self, source: &str, protected: bool) -> Result<MultiValue, ScriptError> {
        let mut chunk = Chunk::new(source).in_environment(&self.bindings);
        if let Some(name) = &self.name {
            chunk = chunk.named(name);
        }
        protected::run_chunk(self.engine.stack(), &chunk, protected)
    }
}
