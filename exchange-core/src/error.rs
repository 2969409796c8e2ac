use thiserror::Error;

use crate::types::{AgentId, Position, Tick};

// === SCENARIO ERRORS ===

/// Raised while validating a scenario config, before the engine starts.
/// Each variant names the offending field so the message is actionable.
#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("field `{field}` is invalid: {reason}")]
    InvalidField { field: String, reason: String },

    #[error("agent ids must be unique and dense from 0: {reason}")]
    BadAgentIds { reason: String },

    #[error("agent {agent}: field `{field}` is invalid: {reason}")]
    InvalidAgent {
        agent: AgentId,
        field: String,
        reason: String,
    },

    #[error("resource at {pos}: {reason}")]
    InvalidResource { pos: Position, reason: String },
}

impl ScenarioError {
    pub fn field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

// === ENGINE ERRORS ===

/// Fatal runtime failures. Any of these implies a determinism or
/// conservation bug, so the run halts at the tick boundary.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invariant violation at tick {tick}: {detail}")]
    Invariant { tick: Tick, detail: String },
}

impl EngineError {
    pub fn invariant(tick: Tick, detail: impl Into<String>) -> Self {
        Self::Invariant {
            tick,
            detail: detail.into(),
        }
    }
}
