#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

/// Tracing target for data type registry operations.
pub const TRACING_TARGET_REGISTRY: &str = "cellflow_core::registry";

/// Tracing target for progress messages.
pub const TRACING_TARGET_PROGRESS: &str = "cellflow_core::progress";

mod annotation;
mod error;
mod progress;
mod row;
mod table;
mod value;

pub mod registry;

#[doc(hidden)]
pub mod prelude;

pub use annotation::{
    Annotation, AnnotationSet, RESERVED_PREFIX, SLOT_LOCATION_KEY, is_reserved,
};
pub use error::{BoxedError, Error, ErrorKind, Result};
pub use progress::ProgressInfo;
pub use registry::{
    ConversionKind, DataConverter, DataTypeDescriptor, DataTypeRegistry, RegistryEvent,
};
pub use row::{DataRow, SourceContext};
pub use table::{DataTable, RunId, SlotInfo, SlotRole};
pub use value::{Data, DataTypeId, DataValue};
