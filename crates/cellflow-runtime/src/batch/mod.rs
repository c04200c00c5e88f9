//! Batch assembly: grouping annotated input rows into iteration steps.
//!
//! A node declares input slots, each bound to one upstream table. The
//! [`BatchAssembler`] picks the matching columns, joins rows across slots on
//! their [`MatchingKey`], applies the [`MissingDataPolicy`] to gaps and merges
//! the remaining annotations of every contributing row.

mod assembler;
mod config;
mod key;
mod merge;
mod missing;
mod step;

pub use assembler::BatchAssembler;
pub use config::{
    BatchingConfig, BatchingConfigBuilder, BatchingConfigBuilderError, ColumnMatching,
    HASH_PREFIX, IterationMode,
};
pub use key::{MatchingKey, ROW_IDENTITY_KEY};
pub use merge::{AnnotationMergeMode, MergedAnnotations};
pub use missing::{GENERATED_ORIGIN, MissingDataGenerator, MissingDataPolicy, PresentRows};
pub use step::{BatchPlan, FailedStep, IterationStep, SkippedStep, SlotSelection, StepOutcome};
