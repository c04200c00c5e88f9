//! Step execution engine.
//!
//! - [`ExecutionDriver`]: runs one node's iteration steps
//! - [`RunSettings`]: run-wide options
//! - [`StepCache`]: fingerprint-keyed memo of step outputs

mod cache;
mod config;
mod driver;
mod receive;

pub use cache::{Fingerprint, InMemoryStepCache, StepCache};
pub use config::{RunSettings, RunSettingsBuilder, RunSettingsBuilderError, StepErrorPolicy};
pub use driver::{ExecutionDriver, NodeInputs, NodeRun, RunReport, StepFailure};
pub use receive::SlotReceiver;
