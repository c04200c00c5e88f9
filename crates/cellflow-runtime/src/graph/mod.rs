//! Pipeline graphs: nodes wired output slot to input slot.
//!
//! - [`Pipeline`]: the graph, its validation and scheduling
//! - [`Connection`]: data stored on each edge
//! - [`PipelineRun`]: outputs of every node after a run

mod edge;
mod pipeline;

pub use edge::Connection;
pub use pipeline::{Pipeline, PipelineRun};
