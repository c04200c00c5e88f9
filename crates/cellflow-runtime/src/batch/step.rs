//! Iteration steps and assembly outcomes.

use std::collections::{BTreeMap, BTreeSet};

use cellflow_core::{DataRow, DataTable};

use super::key::MatchingKey;
use super::merge::MergedAnnotations;
use crate::error::{RuntimeError, RuntimeResult};

/// Rows one slot contributes to a step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SlotSelection {
    rows: BTreeSet<usize>,
    generated: Vec<DataRow>,
}

impl SlotSelection {
    pub(crate) fn from_rows(rows: BTreeSet<usize>) -> Self {
        Self {
            rows,
            generated: Vec::new(),
        }
    }

    pub(crate) fn from_generated(row: DataRow) -> Self {
        Self {
            rows: BTreeSet::new(),
            generated: vec![row],
        }
    }

    /// Returns the selected row indices of the input table.
    pub fn rows(&self) -> &BTreeSet<usize> {
        &self.rows
    }

    /// Returns placeholder rows produced by the missing-data generator.
    pub fn generated(&self) -> &[DataRow] {
        &self.generated
    }

    /// Returns the number of rows the slot receives.
    pub fn len(&self) -> usize {
        self.rows.len() + self.generated.len()
    }

    /// Returns whether the slot receives no rows.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One unit of execution: the rows each slot receives and their annotations.
#[derive(Debug, Clone)]
pub struct IterationStep {
    index: usize,
    key: MatchingKey,
    selections: BTreeMap<String, SlotSelection>,
    annotations: MergedAnnotations,
}

impl IterationStep {
    pub(crate) fn new(
        index: usize,
        key: MatchingKey,
        selections: BTreeMap<String, SlotSelection>,
        annotations: MergedAnnotations,
    ) -> Self {
        Self {
            index,
            key,
            selections,
            annotations,
        }
    }

    /// Returns the position of the step in emission order.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Returns the matching key of the step.
    pub fn key(&self) -> &MatchingKey {
        &self.key
    }

    /// Returns the selection for one slot, if the slot receives data.
    pub fn selection(&self, slot: &str) -> Option<&SlotSelection> {
        self.selections.get(slot)
    }

    /// Returns every non-empty slot selection, by slot name.
    pub fn selections(&self) -> &BTreeMap<String, SlotSelection> {
        &self.selections
    }

    /// Returns the merged annotations of the step.
    pub fn annotations(&self) -> &MergedAnnotations {
        &self.annotations
    }

    /// Builds the per-slot tables the node body receives.
    ///
    /// Every input table yields one table bound to the same slot; slots
    /// without a selection yield an empty table.
    pub fn materialize(&self, tables: &[&DataTable]) -> RuntimeResult<BTreeMap<String, DataTable>> {
        tables
            .iter()
            .map(|table| -> RuntimeResult<(String, DataTable)> {
                let name = table.slot().name();
                let sliced = match self.selections.get(name) {
                    Some(selection) => {
                        let mut sliced = table.slice(selection.rows())?;
                        for row in selection.generated() {
                            sliced.push_row(row.clone());
                        }
                        sliced
                    }
                    None => DataTable::new(table.slot_arc().clone(), table.run_id()),
                };
                Ok((name.to_owned(), sliced))
            })
            .collect()
    }
}

/// A candidate key dropped by the missing-data policy.
#[derive(Debug, Clone)]
pub struct SkippedStep {
    /// Candidate key.
    pub key: MatchingKey,
    /// Required slot that had no data.
    pub slot: String,
}

/// A candidate key whose step could not be assembled.
#[derive(Debug)]
pub struct FailedStep {
    /// Candidate key.
    pub key: MatchingKey,
    /// Step-level failure, e.g. a generation error.
    pub error: RuntimeError,
}

/// Result of assembling one candidate key.
#[derive(Debug)]
pub enum StepOutcome {
    /// The step is ready to execute.
    Step(IterationStep),
    /// The step was dropped.
    Skipped(SkippedStep),
    /// The step failed on its own; other steps are unaffected.
    Failed(FailedStep),
}

impl StepOutcome {
    /// Returns the candidate key of the outcome.
    pub fn key(&self) -> &MatchingKey {
        match self {
            Self::Step(step) => step.key(),
            Self::Skipped(skipped) => &skipped.key,
            Self::Failed(failed) => &failed.key,
        }
    }
}

/// Every outcome of one assembly, in emission order.
#[derive(Debug, Default)]
pub struct BatchPlan {
    columns: BTreeSet<String>,
    outcomes: Vec<StepOutcome>,
}

impl BatchPlan {
    pub(crate) fn new(columns: BTreeSet<String>, outcomes: Vec<StepOutcome>) -> Self {
        Self { columns, outcomes }
    }

    /// Returns the matching columns used.
    pub fn columns(&self) -> &BTreeSet<String> {
        &self.columns
    }

    /// Returns all outcomes in emission order.
    pub fn outcomes(&self) -> &[StepOutcome] {
        &self.outcomes
    }

    /// Returns the executable steps in emission order.
    pub fn steps(&self) -> impl Iterator<Item = &IterationStep> {
        self.outcomes.iter().filter_map(|outcome| match outcome {
            StepOutcome::Step(step) => Some(step),
            _ => None,
        })
    }

    /// Returns the skipped candidates.
    pub fn skipped(&self) -> impl Iterator<Item = &SkippedStep> {
        self.outcomes.iter().filter_map(|outcome| match outcome {
            StepOutcome::Skipped(skipped) => Some(skipped),
            _ => None,
        })
    }

    /// Returns the failed candidates.
    pub fn failed(&self) -> impl Iterator<Item = &FailedStep> {
        self.outcomes.iter().filter_map(|outcome| match outcome {
            StepOutcome::Failed(failed) => Some(failed),
            _ => None,
        })
    }

    /// Returns the number of outcomes.
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    /// Returns whether there are no outcomes.
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Consumes the plan, returning its outcomes.
    pub fn into_outcomes(self) -> Vec<StepOutcome> {
        self.outcomes
    }
}
