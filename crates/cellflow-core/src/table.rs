//! Slot-bound data tables.

use std::collections::BTreeSet;
use std::sync::Arc;

use derive_more::{Display, From, Into};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::annotation::AnnotationSet;
use crate::error::{Error, Result};
use crate::row::{DataRow, SourceContext};
use crate::value::{DataTypeId, DataValue};

/// Unique identifier of one pipeline run.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(derive_more::Debug, Display, From, Into)]
#[debug("{_0}")]
#[display("{_0}")]
#[serde(transparent)]
pub struct RunId(Uuid);

impl RunId {
    /// Creates a new run id.
    #[inline]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Returns the underlying UUID.
    #[inline]
    pub const fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether a slot receives or emits data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotRole {
    /// Input connection point.
    Input,
    /// Output connection point.
    Output,
}

/// Static description of a slot, fixed when the pipeline is built.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SlotInfo {
    name: String,
    data_type: DataTypeId,
    role: SlotRole,
    #[serde(default)]
    optional: bool,
}

impl SlotInfo {
    /// Describes a required input slot.
    pub fn input(name: impl Into<String>, data_type: impl Into<DataTypeId>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            role: SlotRole::Input,
            optional: false,
        }
    }

    /// Describes an output slot.
    pub fn output(name: impl Into<String>, data_type: impl Into<DataTypeId>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            role: SlotRole::Output,
            optional: false,
        }
    }

    /// Marks the slot as optional.
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Returns the slot name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the data type the slot accepts.
    pub fn data_type(&self) -> &DataTypeId {
        &self.data_type
    }

    /// Returns the slot role.
    pub fn role(&self) -> SlotRole {
        self.role
    }

    /// Returns whether the slot may stay empty.
    pub fn is_optional(&self) -> bool {
        self.optional
    }
}

/// An ordered sequence of rows bound to one slot of one run.
///
/// Row indices are assigned on insertion and increase monotonically from
/// zero; rows are never removed or modified in place.
#[derive(Debug, Clone, PartialEq)]
pub struct DataTable {
    slot: Arc<SlotInfo>,
    run_id: RunId,
    rows: Vec<DataRow>,
}

impl DataTable {
    /// Creates an empty table.
    pub fn new(slot: impl Into<Arc<SlotInfo>>, run_id: RunId) -> Self {
        Self {
            slot: slot.into(),
            run_id,
            rows: Vec::new(),
        }
    }

    /// Creates a table from existing rows.
    pub fn from_rows(slot: impl Into<Arc<SlotInfo>>, run_id: RunId, rows: Vec<DataRow>) -> Self {
        Self {
            slot: slot.into(),
            run_id,
            rows,
        }
    }

    /// Returns the slot this table belongs to.
    pub fn slot(&self) -> &SlotInfo {
        &self.slot
    }

    /// Returns the shared slot description.
    pub fn slot_arc(&self) -> &Arc<SlotInfo> {
        &self.slot
    }

    /// Returns the run this table belongs to.
    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    /// Appends a row and returns its index.
    pub fn add_row(
        &mut self,
        value: DataValue,
        annotations: AnnotationSet,
        context: SourceContext,
    ) -> usize {
        self.push_row(DataRow::new(value, annotations, context))
    }

    /// Appends an existing row and returns its index.
    pub fn push_row(&mut self, row: DataRow) -> usize {
        self.rows.push(row);
        self.rows.len() - 1
    }

    /// Returns a row by index.
    pub fn get_row(&self, index: usize) -> Result<&DataRow> {
        self.rows.get(index).ok_or_else(|| Error::RowOutOfRange {
            slot: self.slot.name().to_owned(),
            index,
            row_count: self.rows.len(),
        })
    }

    /// Returns the number of rows.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Returns whether the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Returns all rows in insertion order.
    pub fn rows(&self) -> &[DataRow] {
        &self.rows
    }

    /// Iterates over `(index, row)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &DataRow)> {
        self.rows.iter().enumerate()
    }

    /// Returns the indices of all rows.
    pub fn all_indices(&self) -> BTreeSet<usize> {
        (0..self.rows.len()).collect()
    }

    /// Returns a new table with only the selected rows.
    ///
    /// Rows keep their relative order and annotations; payloads are shared
    /// with this table.
    pub fn slice(&self, indices: &BTreeSet<usize>) -> Result<DataTable> {
        let rows = indices
            .iter()
            .map(|&index| self.get_row(index).cloned())
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            slot: self.slot.clone(),
            run_id: self.run_id,
            rows,
        })
    }

    /// Returns the union of annotation names over all rows.
    pub fn annotation_names(&self) -> BTreeSet<String> {
        self.rows
            .iter()
            .flat_map(|row| row.annotations().names().map(str::to_owned))
            .collect()
    }

    /// Consumes the table and returns its rows.
    pub fn into_rows(self) -> Vec<DataRow> {
        self.rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> DataTable {
        let mut table = DataTable::new(SlotInfo::input("image", "data"), RunId::new());
        for (i, value) in ["a", "b", "c", "d"].iter().enumerate() {
            let index = table.add_row(
                DataValue::new("string", value.to_string()),
                AnnotationSet::new().with("X", *value),
                SourceContext::from_origin("test"),
            );
            assert_eq!(index, i);
        }
        table
    }

    #[test]
    fn test_add_row_assigns_monotonic_indices() {
        let table = table();

        assert_eq!(table.row_count(), 4);
        assert_eq!(table.get_row(2).unwrap().annotations().get("X"), Some("c"));
    }

    #[test]
    fn test_get_row_out_of_range() {
        let table = table();
        let error = table.get_row(9).unwrap_err();

        assert!(matches!(error, Error::RowOutOfRange { index: 9, row_count: 4, .. }));
    }

    #[test]
    fn test_slice_preserves_order_and_shares_payload() {
        let table = table();
        let slice = table.slice(&BTreeSet::from([3, 1])).unwrap();

        assert_eq!(slice.row_count(), 2);
        assert_eq!(slice.get_row(0).unwrap().annotations().get("X"), Some("b"));
        assert_eq!(slice.get_row(1).unwrap().annotations().get("X"), Some("d"));
        assert!(
            slice
                .get_row(0)
                .unwrap()
                .value()
                .shares_payload(table.get_row(1).unwrap().value())
        );
    }

    #[test]
    fn test_slice_idempotence() {
        let table = table();
        let slice = table.slice(&BTreeSet::from([0, 2, 3])).unwrap();

        assert_eq!(slice.slice(&slice.all_indices()).unwrap(), slice);
    }

    #[test]
    fn test_slice_rejects_unknown_index() {
        let table = table();

        assert!(table.slice(&BTreeSet::from([0, 7])).is_err());
    }

    #[test]
    fn test_annotation_names() {
        let mut table = table();
        table.add_row(
            DataValue::new("string", String::new()),
            AnnotationSet::new().with("Y", "1"),
            SourceContext::new(),
        );

        assert_eq!(
            table.annotation_names(),
            BTreeSet::from(["X".to_owned(), "Y".to_owned()])
        );
    }
}
