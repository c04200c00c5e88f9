//! Serialized form of a data table.

use cellflow_core::{
    AnnotationSet, DataRow, DataTable, DataTypeId, DataTypeRegistry, Error, Result, RunId,
    SLOT_LOCATION_KEY, SlotInfo, SourceContext,
};
use serde::{Deserialize, Serialize};

/// Persisted table: slot description, location metadata and rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableManifest {
    /// Reserved location metadata, e.g. `cellflow:slot`.
    #[serde(default)]
    pub metadata: AnnotationSet,
    /// Slot the table belongs to.
    pub slot: SlotInfo,
    /// Run that produced the table.
    pub run_id: RunId,
    /// Rows in insertion order.
    pub rows: Vec<RowRecord>,
}

/// One persisted row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowRecord {
    /// Index of the row in its table.
    pub index: usize,
    /// Data type of the payload.
    pub data_type: DataTypeId,
    /// Row annotations.
    #[serde(default)]
    pub annotations: AnnotationSet,
    /// Row provenance.
    pub context: SourceContext,
    /// Serialized payload.
    pub payload: serde_json::Value,
}

impl TableManifest {
    /// Serializes every row of a table.
    ///
    /// Fails without producing a partial manifest if any payload cannot be
    /// serialized.
    pub fn from_table(table: &DataTable) -> Result<Self> {
        let rows = table
            .iter()
            .map(|(index, row)| -> Result<RowRecord> {
                Ok(RowRecord {
                    index,
                    data_type: row.data_type().clone(),
                    annotations: row.annotations().without_reserved(),
                    context: row.context().clone(),
                    payload: row.value().to_json()?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            metadata: AnnotationSet::new().with(SLOT_LOCATION_KEY, table.slot().name()),
            slot: table.slot().clone(),
            run_id: table.run_id(),
            rows,
        })
    }

    /// Returns the slot name stored in the location metadata.
    pub fn slot_location(&self) -> Option<&str> {
        self.metadata.get(SLOT_LOCATION_KEY)
    }

    /// Restores the table, decoding every payload through the registry.
    pub fn into_table(self, registry: &DataTypeRegistry, location: &str) -> Result<DataTable> {
        if let Some(slot) = self.slot_location() {
            if slot != self.slot.name() {
                return Err(Error::storage(
                    location,
                    format!(
                        "location metadata names slot '{slot}' but the table belongs to '{}'",
                        self.slot.name()
                    ),
                ));
            }
        }

        let mut rows = Vec::with_capacity(self.rows.len());
        for (expected, record) in self.rows.into_iter().enumerate() {
            if record.index != expected {
                return Err(Error::storage(
                    location,
                    format!("row {} found at position {expected}", record.index),
                ));
            }
            let value = registry
                .decode(&record.data_type, record.payload)
                .map_err(|err| {
                    Error::storage_with_source(
                        location,
                        format!("row {expected} could not be decoded"),
                        err,
                    )
                })?;
            rows.push(DataRow::new(
                value,
                record.annotations.without_reserved(),
                record.context,
            ));
        }

        Ok(DataTable::from_rows(self.slot, self.run_id, rows))
    }
}
