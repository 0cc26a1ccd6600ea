// Parlance - Error types
//
// One error enum for the whole engine. Edge-level evaluation failures are
// recovered inside a hop by excluding the candidate; only total exhaustion
// of a hop surfaces here.

use thiserror::Error;

/// Result alias used throughout the crate
pub type FlowResult<T> = Result<T, FlowError>;

/// Errors produced by dialogue flows and composites
#[derive(Debug, Error)]
pub enum FlowError {
    /// No user transition accepted the input and the state defines no
    /// error successor. Unrecoverable for the current turn.
    #[error("no user transition matched at state {state} for input {input:?}")]
    NoMatchingEdge { state: String, input: String },

    /// Every system transition failed to generate and the state defines no
    /// error successor. Unrecoverable for the current turn.
    #[error("no system transition could generate at state {state}")]
    NoViableGeneration { state: String },

    /// An authoring expression failed to compile.
    #[error("expression error: {0}")]
    Expression(String),

    /// An authoring call or handover referenced a namespace with no
    /// registered component.
    #[error("unknown namespace: {0}")]
    UnknownNamespace(String),

    /// Structural misuse, e.g. a namespaced target reached through a bare
    /// flow, or an invalid dialogue script.
    #[error("configuration error: {0}")]
    Config(String),
}

impl FlowError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an expression error
    pub fn expression(msg: impl Into<String>) -> Self {
        Self::Expression(msg.into())
    }
}
