//! Conversion of upstream rows into the data type of an input slot.

use std::collections::HashMap;
use std::sync::Arc;

use cellflow_core::{ConversionKind, DataTable, DataTypeId, DataTypeRegistry, Error, RunId, SlotInfo};

use crate::TRACING_TARGET_ENGINE;
use crate::error::RuntimeResult;

/// Receives rows for one input slot during one run.
///
/// The conversion chosen for a source type is resolved once and reused for
/// every later row of that type, so all rows of a type are received the same
/// way for the whole run.
pub struct SlotReceiver<'a> {
    registry: &'a DataTypeRegistry,
    slot: Arc<SlotInfo>,
    kinds: HashMap<DataTypeId, ConversionKind>,
}

impl<'a> SlotReceiver<'a> {
    /// Creates a receiver for an input slot.
    pub fn new(registry: &'a DataTypeRegistry, slot: Arc<SlotInfo>) -> Self {
        Self {
            registry,
            slot,
            kinds: HashMap::new(),
        }
    }

    /// Returns how rows of `from` are received.
    pub fn conversion(&mut self, from: &DataTypeId) -> RuntimeResult<ConversionKind> {
        if let Some(kind) = self.kinds.get(from) {
            return Ok(*kind);
        }

        let to = self.slot.data_type();
        let kind = self
            .registry
            .conversion_kind(from, to)
            .ok_or_else(|| Error::NoConversionPath {
                from: from.clone(),
                to: to.clone(),
            })?;

        tracing::trace!(
            target: TRACING_TARGET_ENGINE,
            slot = self.slot.name(),
            from = %from,
            to = %to,
            kind = ?kind,
            "Conversion resolved"
        );
        self.kinds.insert(from.clone(), kind);
        Ok(kind)
    }

    /// Builds the slot's table from the upstream tables, in order.
    pub fn receive(&mut self, upstream: &[DataTable], run_id: RunId) -> RuntimeResult<DataTable> {
        let mut table = DataTable::new(self.slot.clone(), run_id);

        for source in upstream {
            for row in source.rows() {
                let row = match self.conversion(row.data_type())? {
                    ConversionKind::Trivial => row.clone(),
                    ConversionKind::Explicit => self.registry.convert(row, self.slot.data_type())?,
                };
                table.push_row(row);
            }
        }

        Ok(table)
    }
}
