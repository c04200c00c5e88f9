//! Prelude module for convenient imports.
//!
//! ```rust
//! use cellflow_runtime::prelude::*;
//! ```

pub use crate::batch::{
    AnnotationMergeMode, BatchAssembler, BatchPlan, BatchingConfig, ColumnMatching, IterationMode,
    IterationStep, MatchingKey, MergedAnnotations, MissingDataPolicy, StepOutcome,
};
pub use crate::engine::{ExecutionDriver, NodeInputs, NodeRun, RunSettings, StepErrorPolicy};
pub use crate::error::{RuntimeError, RuntimeResult};
pub use crate::graph::{Pipeline, PipelineRun};
pub use crate::node::{MissingDataGenerator, Node, NodeBody, NodeId, OutputItem, StepInputs, StepOutputs};
