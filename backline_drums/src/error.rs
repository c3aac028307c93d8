// Shared error type for the drum engine.
//
// Registry invariant violations and operator runtime failures are build/run
// defects, surfaced as values so the orchestrator decides disposition.
// Argument-contract violations (bar < 1, non-positive windows, tolerance out
// of range) panic at the call site instead, via the asserts in memory.rs
// and context.rs. There are no retries anywhere: generation is
// deterministic, so a failure signals a logic or data defect.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GrooveError {
    #[error("duplicate operator id '{id}'")]
    DuplicateOperator { id: String },

    #[error("cannot register '{id}': registry is frozen")]
    RegistryFrozen { id: String },

    #[error(
        "operator census mismatch: expected {expected} operators, found {actual} ({breakdown})"
    )]
    OperatorCensus {
        expected: usize,
        actual: usize,
        breakdown: String,
    },

    #[error("operator '{operator}' failed: {message}")]
    OperatorFailed { operator: String, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
