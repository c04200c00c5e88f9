//! `cellflow plan`: iteration steps a node would execute over stored tables.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use anyhow::{Context, bail};
use cellflow_core::{DataTable, DataTypeRegistry, ProgressInfo, RunId, SlotInfo};
use cellflow_data::{FsStorage, Storage};
use cellflow_runtime::batch::{BatchAssembler, BatchPlan, MatchingKey, MergedAnnotations};
use serde::Serialize;

use crate::TRACING_TARGET_COMMAND;
use crate::config::PlanArgs;

/// Printed form of a batch plan.
#[derive(Debug, Clone, Serialize)]
pub struct PlanSummary {
    pub columns: BTreeSet<String>,
    pub steps: Vec<StepSummary>,
    pub skipped: Vec<SkippedSummary>,
    pub failed: Vec<FailedSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StepSummary {
    pub index: usize,
    pub key: MatchingKey,
    pub annotations: MergedAnnotations,
    /// Selected row indices per slot.
    pub rows: BTreeMap<String, Vec<usize>>,
    /// Number of generated placeholder rows per slot.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub generated: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SkippedSummary {
    pub key: MatchingKey,
    pub slot: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailedSummary {
    pub key: MatchingKey,
    pub error: String,
}

impl PlanSummary {
    pub fn new(plan: &BatchPlan) -> Self {
        let steps = plan
            .steps()
            .map(|step| StepSummary {
                index: step.index(),
                key: step.key().clone(),
                annotations: step.annotations().clone(),
                rows: step
                    .selections()
                    .iter()
                    .map(|(slot, selection)| (slot.clone(), selection.rows().iter().copied().collect()))
                    .collect(),
                generated: step
                    .selections()
                    .iter()
                    .filter(|(_, selection)| !selection.generated().is_empty())
                    .map(|(slot, selection)| (slot.clone(), selection.generated().len()))
                    .collect(),
            })
            .collect();

        Self {
            columns: plan.columns().clone(),
            steps,
            skipped: plan
                .skipped()
                .map(|skipped| SkippedSummary {
                    key: skipped.key.clone(),
                    slot: skipped.slot.clone(),
                })
                .collect(),
            failed: plan
                .failed()
                .map(|failed| FailedSummary {
                    key: failed.key.clone(),
                    error: failed.error.to_string(),
                })
                .collect(),
        }
    }
}

pub async fn execute(args: &PlanArgs, registry: Arc<DataTypeRegistry>) -> anyhow::Result<PlanSummary> {
    let config = args.batching.to_config()?;
    for name in &args.optional {
        if !args.inputs.iter().any(|source| source.slot == *name) {
            bail!("optional slot '{name}' is not one of the inputs");
        }
    }

    let storage = FsStorage::new(registry.clone());
    let run_id = RunId::new();
    let mut tables = Vec::with_capacity(args.inputs.len());
    for source in &args.inputs {
        let stored = storage
            .read(&source.path)
            .await
            .with_context(|| format!("failed to read table at {}", source.path.display()))?;

        let mut slot = SlotInfo::input(&source.slot, stored.slot().data_type().clone());
        if args.optional.contains(&source.slot) {
            slot = slot.optional();
        }
        tracing::debug!(
            target: TRACING_TARGET_COMMAND,
            slot = %source.slot,
            rows = stored.row_count(),
            "input loaded"
        );
        tables.push(DataTable::from_rows(slot, run_id, stored.into_rows()));
    }

    let tables: Vec<&DataTable> = tables.iter().collect();
    let plan = BatchAssembler::new(&registry, &config)
        .assemble(&tables, &ProgressInfo::new().resolve("plan"))
        .context("failed to assemble iteration steps")?;

    tracing::info!(
        target: TRACING_TARGET_COMMAND,
        steps = plan.steps().count(),
        skipped = plan.skipped().count(),
        failed = plan.failed().count(),
        "plan assembled"
    );
    Ok(PlanSummary::new(&plan))
}
