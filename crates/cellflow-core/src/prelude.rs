//! Prelude module for convenient imports.
//!
//! ```rust
//! use cellflow_core::prelude::*;
//! ```

pub use crate::annotation::{Annotation, AnnotationSet};
pub use crate::error::{Error, Result};
pub use crate::progress::ProgressInfo;
pub use crate::registry::{DataTypeDescriptor, DataTypeRegistry};
pub use crate::row::{DataRow, SourceContext};
pub use crate::table::{DataTable, RunId, SlotInfo};
pub use crate::value::{DataTypeId, DataValue};
