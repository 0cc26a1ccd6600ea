// Parlance - Expression interfaces
//
// The engine never interprets expression strings itself. Authoring hands
// them to an ExpressionCompiler, and turns evaluate the compiled handles.
// Knowledge bases, ontologies, and other NLU/NLG resources are private
// concerns of compiler implementations.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::FlowResult;

/// Variable bindings shared by matching and generation within a flow
pub type Vars = HashMap<String, serde_json::Value>;

/// A successful user-input match: variable updates plus the span of input
/// the expression accounted for (used as a specificity signal when several
/// edges accept the same input).
#[derive(Debug, Clone, Default)]
pub struct MatchOutcome {
    pub bindings: Vars,
    pub captured: String,
}

impl MatchOutcome {
    /// Outcome covering `captured` with no variable updates
    pub fn new(captured: impl Into<String>) -> Self {
        Self {
            bindings: Vars::new(),
            captured: captured.into(),
        }
    }

    /// Add a variable binding
    pub fn with_binding(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.bindings.insert(key.into(), value);
        self
    }
}

/// Compiled user-side (NLU) expression
pub trait Matcher: Send + Sync {
    /// Test `input` under the current bindings. `None` rejects the input.
    fn evaluate(&self, input: &str, vars: &Vars) -> Option<MatchOutcome>;
}

/// Compiled system-side (NLG) expression
pub trait Generator: Send + Sync {
    /// Produce a response under the current bindings. `None` marks this
    /// candidate non-viable for the hop.
    fn evaluate(&self, vars: &Vars) -> Option<String>;
}

/// Compiles author-provided expression strings into evaluable handles.
/// A flow holds exactly one compiler; all its expressions share it.
pub trait ExpressionCompiler: Send + Sync {
    fn compile_matcher(&self, expression: &str) -> FlowResult<Arc<dyn Matcher>>;

    fn compile_generator(&self, expression: &str) -> FlowResult<Arc<dyn Generator>>;
}
