//! Data rows and their provenance.

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use crate::annotation::AnnotationSet;
use crate::value::{DataTypeId, DataValue};

/// Provenance of a data row, kept for diagnostics only.
///
/// Never consulted when matching rows into iteration steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceContext {
    /// Node that produced the row.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<String>,
    /// Iteration step of the producing node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<usize>,
    /// Free-form origin, e.g. an import path or `"generated"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    /// When the row was created.
    pub created_at: Timestamp,
}

impl SourceContext {
    /// Creates an empty context stamped with the current time.
    pub fn new() -> Self {
        Self {
            node: None,
            step: None,
            origin: None,
            created_at: Timestamp::now(),
        }
    }

    /// Context for a row produced by a node during one of its steps.
    pub fn produced_by(node: impl ToString, step: usize) -> Self {
        Self {
            node: Some(node.to_string()),
            step: Some(step),
            ..Self::new()
        }
    }

    /// Context for a row with a free-form origin.
    pub fn from_origin(origin: impl Into<String>) -> Self {
        Self {
            origin: Some(origin.into()),
            ..Self::new()
        }
    }
}

impl Default for SourceContext {
    fn default() -> Self {
        Self::new()
    }
}

/// An immutable `(payload, annotations, provenance)` triple.
///
/// Transformations never mutate a row; they produce a new one.
#[derive(Debug, Clone, PartialEq)]
pub struct DataRow {
    value: DataValue,
    annotations: AnnotationSet,
    context: SourceContext,
}

impl DataRow {
    /// Creates a new row.
    pub fn new(value: DataValue, annotations: AnnotationSet, context: SourceContext) -> Self {
        Self {
            value,
            annotations,
            context,
        }
    }

    /// Returns the payload.
    pub fn value(&self) -> &DataValue {
        &self.value
    }

    /// Returns the payload's data type.
    pub fn data_type(&self) -> &DataTypeId {
        self.value.data_type()
    }

    /// Returns the row annotations.
    pub fn annotations(&self) -> &AnnotationSet {
        &self.annotations
    }

    /// Returns the provenance of the row.
    pub fn context(&self) -> &SourceContext {
        &self.context
    }

    /// Returns a new row with a different payload.
    pub fn with_value(&self, value: DataValue) -> Self {
        Self {
            value,
            annotations: self.annotations.clone(),
            context: self.context.clone(),
        }
    }

    /// Returns a new row with different annotations.
    pub fn with_annotations(&self, annotations: AnnotationSet) -> Self {
        Self {
            value: self.value.clone(),
            annotations,
            context: self.context.clone(),
        }
    }

    /// Splits the row into its parts.
    pub fn into_parts(self) -> (DataValue, AnnotationSet, SourceContext) {
        (self.value, self.annotations, self.context)
    }
}
