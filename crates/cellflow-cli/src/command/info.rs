//! `cellflow info`: summary of a stored table.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use anyhow::Context;
use cellflow_core::{DataTable, DataTypeRegistry, RunId};
use cellflow_data::{FsStorage, Storage};
use serde::Serialize;

use crate::TRACING_TARGET_COMMAND;
use crate::config::InfoArgs;

/// Summary of a stored table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableSummary {
    pub slot: String,
    pub data_type: String,
    pub optional: bool,
    pub run_id: RunId,
    pub rows: usize,
    /// Row count per payload data type.
    pub data_types: BTreeMap<String, usize>,
    pub annotation_names: BTreeSet<String>,
}

impl TableSummary {
    pub fn new(table: &DataTable) -> Self {
        let mut data_types = BTreeMap::new();
        for row in table.rows() {
            *data_types.entry(row.data_type().to_string()).or_insert(0) += 1;
        }

        Self {
            slot: table.slot().name().to_owned(),
            data_type: table.slot().data_type().to_string(),
            optional: table.slot().is_optional(),
            run_id: table.run_id(),
            rows: table.row_count(),
            data_types,
            annotation_names: table.annotation_names(),
        }
    }
}

pub async fn execute(args: &InfoArgs, registry: Arc<DataTypeRegistry>) -> anyhow::Result<TableSummary> {
    let table = FsStorage::new(registry)
        .read(&args.table)
        .await
        .with_context(|| format!("failed to read table at {}", args.table.display()))?;

    tracing::info!(
        target: TRACING_TARGET_COMMAND,
        path = %args.table.display(),
        rows = table.row_count(),
        "table loaded"
    );
    Ok(TableSummary::new(&table))
}
