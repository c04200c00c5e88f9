//! Runtime error types.

use cellflow_core::BoxedError;
use thiserror::Error;

use crate::node::NodeId;

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// Errors raised while assembling or executing iteration steps.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Registry, table or storage error.
    #[error(transparent)]
    Core(#[from] cellflow_core::Error),

    /// More than one row of a slot matched a key in iterating mode.
    #[error("slot '{slot}' has {} rows matching {key} but the node iterates one row per step", rows.len())]
    AmbiguousMatch {
        /// Input slot name.
        slot: String,
        /// Serialized matching key.
        key: String,
        /// Indices of the matching rows.
        rows: Vec<usize>,
    },

    /// Contributing rows disagree on an exposed annotation.
    #[error("annotation '{name}' has conflicting values {values:?}")]
    AnnotationConflict {
        /// Annotation name.
        name: String,
        /// Distinct values in order of first appearance.
        values: Vec<String>,
    },

    /// A required slot has no row for a key and the policy is to fail.
    #[error("required slot '{slot}' has no data for {key}")]
    MissingRequiredInput {
        /// Input slot name.
        slot: String,
        /// Serialized matching key.
        key: String,
    },

    /// The missing-data generator could not produce a placeholder.
    #[error("could not generate data for slot '{slot}' at {key}")]
    Generation {
        /// Input slot name.
        slot: String,
        /// Serialized matching key.
        key: String,
        /// Underlying failure.
        #[source]
        source: BoxedError,
    },

    /// A slot name does not exist on the node.
    #[error("node '{node}' has no slot named '{slot}'")]
    UnknownSlot {
        /// Node name.
        node: String,
        /// Requested slot name.
        slot: String,
    },

    /// Node logic returned an error for a step.
    #[error("node {node_id} failed at step {step} ({key})")]
    NodeFailed {
        /// ID of the failed node.
        node_id: NodeId,
        /// Step index.
        step: usize,
        /// Serialized matching key.
        key: String,
        /// Underlying failure.
        #[source]
        source: BoxedError,
    },

    /// Node logic panicked during a step.
    #[error("node {node_id} panicked at step {step}: {message}")]
    StepPanicked {
        /// ID of the node.
        node_id: NodeId,
        /// Step index.
        step: usize,
        /// Panic payload, if it was a string.
        message: String,
    },

    /// Execution was cancelled.
    #[error("execution cancelled")]
    Cancelled,

    /// Pipeline or node definition is invalid.
    #[error("invalid pipeline definition: {0}")]
    InvalidDefinition(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl RuntimeError {
    /// Returns whether this error stems from configuration rather than data.
    ///
    /// Configuration errors abort the whole run and are never retried.
    pub fn is_configuration(&self) -> bool {
        match self {
            Self::Core(err) => err.is_structural(),
            Self::AmbiguousMatch { .. }
            | Self::MissingRequiredInput { .. }
            | Self::UnknownSlot { .. }
            | Self::InvalidDefinition(_) => true,
            _ => false,
        }
    }

    /// Returns whether this error is confined to a single step.
    pub fn is_step_failure(&self) -> bool {
        matches!(
            self,
            Self::Generation { .. }
                | Self::NodeFailed { .. }
                | Self::StepPanicked { .. }
                | Self::AnnotationConflict { .. }
        ) || matches!(self, Self::Core(err) if !err.is_structural())
    }
}
