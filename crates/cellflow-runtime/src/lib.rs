#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

pub mod batch;
pub mod engine;
mod error;
pub mod graph;
pub mod node;

#[doc(hidden)]
pub mod prelude;

pub use error::{RuntimeError, RuntimeResult};

/// Tracing target for batch assembly.
pub const TRACING_TARGET_BATCH: &str = "cellflow_runtime::batch";

/// Tracing target for step execution.
pub const TRACING_TARGET_ENGINE: &str = "cellflow_runtime::engine";

/// Tracing target for pipeline scheduling.
pub const TRACING_TARGET_GRAPH: &str = "cellflow_runtime::graph";
