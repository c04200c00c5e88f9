//! Partitioning of input rows into iteration steps.

use std::collections::{BTreeMap, BTreeSet};

use cellflow_core::{AnnotationSet, DataTable, DataTypeRegistry, ProgressInfo};

use super::config::{BatchingConfig, ColumnMatching, IterationMode};
use super::key::MatchingKey;
use super::merge::MergedAnnotations;
use super::missing::{MissingDataGenerator, MissingDataResolver, PresentRows, Resolution};
use super::step::{BatchPlan, FailedStep, IterationStep, SkippedStep, SlotSelection, StepOutcome};
use crate::TRACING_TARGET_BATCH;
use crate::error::{RuntimeError, RuntimeResult};

/// Rows of one input table grouped by matching key.
struct SlotIndex<'t> {
    table: &'t DataTable,
    groups: BTreeMap<MatchingKey, BTreeSet<usize>>,
}

impl<'t> SlotIndex<'t> {
    fn build(table: &'t DataTable, columns: &BTreeSet<String>) -> Self {
        let mut groups: BTreeMap<MatchingKey, BTreeSet<usize>> = BTreeMap::new();
        for (index, row) in table.iter() {
            groups
                .entry(MatchingKey::project(row.annotations(), columns))
                .or_default()
                .insert(index);
        }
        Self { table, groups }
    }

    /// Gives every row its own key, made of the slot name and row index.
    fn build_split(table: &'t DataTable) -> Self {
        let slot = table.slot().name();
        let groups = table
            .iter()
            .map(|(index, _)| (MatchingKey::row_identity(slot, index), BTreeSet::from([index])))
            .collect();
        Self { table, groups }
    }

    fn is_required(&self) -> bool {
        !self.table.slot().is_optional()
    }

    /// Rows matching `key`.
    ///
    /// With `most_specific`, only rows of the longest matching keys are kept.
    fn matching(&self, key: &MatchingKey, most_specific: bool) -> BTreeSet<usize> {
        let mut best = 0;
        let mut rows = BTreeSet::new();
        for (candidate, indices) in &self.groups {
            if !candidate.matches(key) {
                continue;
            }
            if !most_specific {
                rows.extend(indices.iter().copied());
            } else if rows.is_empty() || candidate.len() > best {
                best = candidate.len();
                rows = indices.clone();
            } else if candidate.len() == best {
                rows.extend(indices.iter().copied());
            }
        }
        rows
    }
}

/// Groups the rows of a node's input tables into iteration steps.
///
/// Candidate keys are the full outer join of the distinct keys of all required
/// slots: compatible keys from different slots combine into one, and a key
/// without a compatible partner is kept on its own. A candidate that joins
/// several keys of a slot keeps only its most specific joins. In iterating
/// mode the most specific matching keys of a slot win, so rows that lack a
/// column only fill gaps; in merging mode every matching row is taken.
pub struct BatchAssembler<'a> {
    registry: &'a DataTypeRegistry,
    config: &'a BatchingConfig,
    generator: Option<&'a dyn MissingDataGenerator>,
}

impl<'a> BatchAssembler<'a> {
    /// Creates an assembler for a batching configuration.
    pub fn new(registry: &'a DataTypeRegistry, config: &'a BatchingConfig) -> Self {
        Self {
            registry,
            config,
            generator: None,
        }
    }

    /// Sets the generator used under [`MissingDataPolicy::Generate`](super::MissingDataPolicy::Generate).
    pub fn with_generator(mut self, generator: Option<&'a dyn MissingDataGenerator>) -> Self {
        self.generator = generator;
        self
    }

    /// Assembles the steps for one input table per slot, in slot order.
    ///
    /// Configuration errors (`AmbiguousMatch`, `MissingRequiredInput`) fail
    /// the whole assembly. Generation failures only fail their own step.
    pub fn assemble(
        &self,
        tables: &[&DataTable],
        progress: &ProgressInfo,
    ) -> RuntimeResult<BatchPlan> {
        let mut names = BTreeSet::new();
        if let Some(duplicate) = tables.iter().find(|table| !names.insert(table.slot().name())) {
            return Err(RuntimeError::InvalidDefinition(format!(
                "input slot '{}' appears more than once",
                duplicate.slot().name()
            )));
        }

        let columns = self.config.matching_columns(tables);
        let split = self.config.column_matching == ColumnMatching::SplitAll;
        let indexes: Vec<SlotIndex<'_>> = tables
            .iter()
            .map(|table| {
                if split {
                    SlotIndex::build_split(table)
                } else {
                    SlotIndex::build(table, &columns)
                }
            })
            .collect();
        let required: Vec<&SlotIndex<'_>> = indexes.iter().filter(|index| index.is_required()).collect();

        let candidates = if required.is_empty() {
            vec![MatchingKey::empty()]
        } else {
            join(&required)
        };

        tracing::debug!(
            target: TRACING_TARGET_BATCH,
            columns = ?columns,
            slots = tables.len(),
            candidates = candidates.len(),
            "Assembling iteration steps"
        );

        let resolver = MissingDataResolver::new(self.config.missing_data, self.generator, self.registry);
        let mut outcomes = Vec::with_capacity(candidates.len());
        let mut next_index = 0;

        for key in candidates {
            let outcome = self.assemble_step(
                next_index,
                key,
                &indexes,
                required.is_empty(),
                &resolver,
            )?;

            match &outcome {
                StepOutcome::Step(step) => {
                    next_index += 1;
                    if !self.config.allows_step(step.index()) {
                        tracing::debug!(
                            target: TRACING_TARGET_BATCH,
                            step = step.index(),
                            key = %step.key(),
                            "Step outside the configured limit"
                        );
                        continue;
                    }
                }
                StepOutcome::Skipped(skipped) => {
                    tracing::warn!(
                        target: TRACING_TARGET_BATCH,
                        key = %skipped.key,
                        slot = %skipped.slot,
                        "Skipping step without required input"
                    );
                    progress.log(format!(
                        "Skipped {}: slot '{}' has no data",
                        skipped.key, skipped.slot
                    ));
                }
                StepOutcome::Failed(failed) => {
                    tracing::warn!(
                        target: TRACING_TARGET_BATCH,
                        key = %failed.key,
                        error = %failed.error,
                        "Step could not be assembled"
                    );
                }
            }
            outcomes.push(outcome);
        }

        Ok(BatchPlan::new(columns, outcomes))
    }

    fn assemble_step(
        &self,
        index: usize,
        key: MatchingKey,
        indexes: &[SlotIndex<'_>],
        takes_all_rows: bool,
        resolver: &MissingDataResolver<'_>,
    ) -> RuntimeResult<StepOutcome> {
        let mut selections = BTreeMap::new();
        let mut missing = Vec::new();

        for slot in indexes {
            let rows = if takes_all_rows {
                slot.table.all_indices()
            } else {
                slot.matching(&key, self.config.mode == IterationMode::Iterating)
            };

            if rows.is_empty() {
                missing.push(slot);
                continue;
            }
            if self.config.mode == IterationMode::Iterating && rows.len() > 1 {
                return Err(RuntimeError::AmbiguousMatch {
                    slot: slot.table.slot().name().to_owned(),
                    key: key.serialized(),
                    rows: rows.into_iter().collect(),
                });
            }
            selections.insert(slot.table.slot().name().to_owned(), SlotSelection::from_rows(rows));
        }

        let mut generated = Vec::new();
        {
            let mut present = PresentRows::new();
            for slot in indexes {
                if let Some(selection) = selections.get(slot.table.slot().name()) {
                    let rows = selection
                        .rows()
                        .iter()
                        .map(|&row| slot.table.get_row(row))
                        .collect::<cellflow_core::Result<Vec<_>>>()?;
                    present.insert(slot.table.slot().name(), rows);
                }
            }

            for slot in missing {
                match resolver.resolve(slot.table.slot(), &key, &present) {
                    Ok(Resolution::Skip) => {
                        return Ok(StepOutcome::Skipped(SkippedStep {
                            key,
                            slot: slot.table.slot().name().to_owned(),
                        }));
                    }
                    Ok(Resolution::Empty) => {}
                    Ok(Resolution::Generated(row)) => {
                        generated.push((slot.table.slot().name().to_owned(), row));
                    }
                    Err(error) if error.is_step_failure() => {
                        return Ok(StepOutcome::Failed(FailedStep { key, error }));
                    }
                    Err(error) => return Err(error),
                }
            }
        }

        let mut contributing: Vec<&AnnotationSet> = Vec::new();
        for slot in indexes {
            if let Some(selection) = selections.get(slot.table.slot().name()) {
                for &row in selection.rows() {
                    contributing.push(slot.table.get_row(row)?.annotations());
                }
            }
        }
        for (_, row) in &generated {
            contributing.push(row.annotations());
        }
        let annotations = MergedAnnotations::merge(&key, self.config.merge_mode, contributing);

        for (slot, row) in generated {
            selections.insert(slot, SlotSelection::from_generated(row));
        }

        Ok(StepOutcome::Step(IterationStep::new(
            index,
            key,
            selections,
            annotations,
        )))
    }
}

/// Joins the distinct keys of the required slots into candidate keys.
///
/// Candidates are returned in the lexicographic order of their serialized
/// form.
fn join(required: &[&SlotIndex<'_>]) -> Vec<MatchingKey> {
    let mut candidates: Vec<MatchingKey> = Vec::new();

    for slot in required {
        let mut next = BTreeSet::new();

        for candidate in &candidates {
            let joins: Vec<MatchingKey> = slot
                .groups
                .keys()
                .filter(|key| candidate.is_compatible(key))
                .map(|key| candidate.join(key))
                .collect();
            if joins.is_empty() {
                next.insert(candidate.clone());
                continue;
            }
            // A join contained in a more specific join of the same candidate
            // would select the same rows twice.
            for joined in &joins {
                if !joins.iter().any(|other| other != joined && joined.matches(other)) {
                    next.insert(joined.clone());
                }
            }
        }

        for key in slot.groups.keys() {
            if !candidates.iter().any(|candidate| candidate.is_compatible(key)) {
                next.insert(key.clone());
            }
        }

        candidates = next.into_iter().collect();
    }

    candidates.sort_by_cached_key(MatchingKey::serialized);
    candidates
}

#[cfg(test)]
mod tests {
    use cellflow_core::{BoxedError, DataValue, RunId, SlotInfo, SourceContext};

    use super::*;
    use crate::batch::{AnnotationMergeMode, MissingDataPolicy, ROW_IDENTITY_KEY};

    fn table(slot: SlotInfo, rows: &[(&str, &[(&str, &str)])]) -> DataTable {
        let mut table = DataTable::new(slot, RunId::new());
        for (payload, annotations) in rows {
            table.add_row(
                DataValue::new("string", payload.to_string()),
                annotations.iter().copied().collect::<AnnotationSet>(),
                SourceContext::new(),
            );
        }
        table
    }

    fn config(mode: IterationMode, missing_data: MissingDataPolicy) -> BatchingConfig {
        BatchingConfig {
            mode,
            missing_data,
            ..BatchingConfig::default()
        }
    }

    fn registry() -> DataTypeRegistry {
        DataTypeRegistry::with_builtins().unwrap()
    }

    fn key_of(step: &IterationStep) -> String {
        step.key().to_string()
    }

    struct Placeholder;

    impl MissingDataGenerator for Placeholder {
        fn generate(
            &self,
            slot: &SlotInfo,
            key: &MatchingKey,
            present: &PresentRows<'_>,
        ) -> Result<DataValue, BoxedError> {
            let reference = present
                .get("Slot1")
                .and_then(|rows| rows.first())
                .ok_or("no reference row")?;
            Ok(DataValue::new(
                "string",
                format!(
                    "placeholder for {} at {key} like {:?}",
                    slot.name(),
                    reference.value().downcast_ref::<String>()
                ),
            ))
        }
    }

    fn scenario_tables(slot2: SlotInfo) -> (DataTable, DataTable) {
        let slot1 = table(
            SlotInfo::input("Slot1", "string"),
            &[("a1", &[("X", "a")]), ("b1", &[("X", "b")])],
        );
        let slot2 = table(slot2, &[("a2", &[("X", "a")])]);
        (slot1, slot2)
    }

    #[test]
    fn test_optional_slot_with_generated_placeholder() {
        let registry = registry();
        let (slot1, slot2) = scenario_tables(SlotInfo::input("Slot2", "string").optional());
        let config = config(IterationMode::Iterating, MissingDataPolicy::Generate);

        let plan = BatchAssembler::new(&registry, &config)
            .with_generator(Some(&Placeholder))
            .assemble(&[&slot1, &slot2], &ProgressInfo::new())
            .unwrap();
        let steps: Vec<_> = plan.steps().collect();

        assert_eq!(steps.len(), 2);
        assert_eq!(key_of(steps[0]), "{X=a}");
        assert_eq!(key_of(steps[1]), "{X=b}");
        assert_eq!(steps[0].selection("Slot2").unwrap().rows(), &BTreeSet::from([0]));

        let placeholder = steps[1].selection("Slot2").unwrap();
        assert!(placeholder.rows().is_empty());
        assert_eq!(placeholder.generated().len(), 1);
        assert_eq!(
            placeholder.generated()[0].value().downcast_ref::<String>().map(String::as_str),
            Some("placeholder for Slot2 at {X=b} like Some(\"b1\")")
        );
    }

    #[test]
    fn test_required_slot_with_skip() {
        let registry = registry();
        let (slot1, slot2) = scenario_tables(SlotInfo::input("Slot2", "string"));
        let config = config(IterationMode::Iterating, MissingDataPolicy::Skip);
        let progress = ProgressInfo::new().recording();

        let plan = BatchAssembler::new(&registry, &config)
            .assemble(&[&slot1, &slot2], &progress)
            .unwrap();

        assert_eq!(plan.steps().count(), 1);
        assert_eq!(key_of(plan.steps().next().unwrap()), "{X=a}");
        let skipped: Vec<_> = plan.skipped().collect();
        assert_eq!(skipped.len(), 1);
        assert_eq!(skipped[0].slot, "Slot2");
        assert_eq!(progress.messages().len(), 1);
    }

    #[test]
    fn test_required_slot_with_fail() {
        let registry = registry();
        let (slot1, slot2) = scenario_tables(SlotInfo::input("Slot2", "string"));
        let config = config(IterationMode::Iterating, MissingDataPolicy::Fail);

        let error = BatchAssembler::new(&registry, &config)
            .assemble(&[&slot1, &slot2], &ProgressInfo::new())
            .unwrap_err();

        assert!(matches!(
            error,
            RuntimeError::MissingRequiredInput { ref slot, ref key } if slot == "Slot2" && key == r#"{"X":"b"}"#
        ));
    }

    #[test]
    fn test_generation_failure_fails_only_its_step() {
        let registry = registry();
        let slot1 = table(SlotInfo::input("Slot1", "string"), &[("a1", &[("X", "a")])]);
        let slot2 = table(
            SlotInfo::input("Slot2", "string"),
            &[("a2", &[("X", "a")]), ("b2", &[("X", "b")])],
        );
        let config = config(IterationMode::Iterating, MissingDataPolicy::Generate);

        // The generator needs a Slot1 row, which the X=b step lacks.
        let plan = BatchAssembler::new(&registry, &config)
            .with_generator(Some(&Placeholder))
            .assemble(&[&slot1, &slot2], &ProgressInfo::new())
            .unwrap();

        assert_eq!(plan.len(), 2);
        assert_eq!(plan.steps().count(), 1);
        let failed: Vec<_> = plan.failed().collect();
        assert_eq!(failed.len(), 1);
        assert!(matches!(failed[0].error, RuntimeError::Generation { .. }));
    }

    #[test]
    fn test_global_rows_fill_every_step() {
        let registry = registry();
        let images = table(
            SlotInfo::input("Image", "string"),
            &[("i1", &[("X", "a")]), ("i2", &[("X", "b")])],
        );
        let settings = table(SlotInfo::input("Settings", "string"), &[("s", &[])]);
        let config = config(IterationMode::Iterating, MissingDataPolicy::Fail);

        let plan = BatchAssembler::new(&registry, &config)
            .assemble(&[&images, &settings], &ProgressInfo::new())
            .unwrap();
        let steps: Vec<_> = plan.steps().collect();

        assert_eq!(steps.len(), 2);
        for step in steps {
            assert_eq!(step.selection("Settings").unwrap().rows(), &BTreeSet::from([0]));
        }
    }

    #[test]
    fn test_specific_rows_win_over_global_rows() {
        let registry = registry();
        let slot1 = table(
            SlotInfo::input("Slot1", "string"),
            &[("a1", &[("X", "a")]), ("b1", &[("X", "b")])],
        );
        let slot2 = table(
            SlotInfo::input("Slot2", "string"),
            &[("a2", &[("X", "a")]), ("any", &[])],
        );
        let config = config(IterationMode::Iterating, MissingDataPolicy::Fail);

        let plan = BatchAssembler::new(&registry, &config)
            .assemble(&[&slot1, &slot2], &ProgressInfo::new())
            .unwrap();
        let steps: Vec<_> = plan.steps().collect();

        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].selection("Slot2").unwrap().rows(), &BTreeSet::from([0]));
        assert_eq!(steps[1].selection("Slot2").unwrap().rows(), &BTreeSet::from([1]));
    }

    #[test]
    fn test_global_row_in_later_slot_joins_once() {
        let registry = registry();
        let slot1 = table(SlotInfo::input("Slot1", "string"), &[("1", &[("Y", "1")])]);
        let slot2 = table(
            SlotInfo::input("Slot2", "string"),
            &[("a2", &[("X", "a")]), ("any", &[])],
        );
        let config = config(IterationMode::Iterating, MissingDataPolicy::Fail);

        let plan = BatchAssembler::new(&registry, &config)
            .assemble(&[&slot1, &slot2], &ProgressInfo::new())
            .unwrap();
        let steps: Vec<_> = plan.steps().collect();

        assert_eq!(plan.len(), 1);
        assert_eq!(key_of(steps[0]), "{X=a, Y=1}");
        assert_eq!(steps[0].selection("Slot1").unwrap().rows(), &BTreeSet::from([0]));
        assert_eq!(steps[0].selection("Slot2").unwrap().rows(), &BTreeSet::from([0]));
    }

    #[test]
    fn test_merging_takes_specific_and_global_rows() {
        let registry = registry();
        let slot1 = table(
            SlotInfo::input("Slot1", "string"),
            &[("a1", &[("X", "a")]), ("b1", &[("X", "b")])],
        );
        let slot2 = table(
            SlotInfo::input("Slot2", "string"),
            &[("a2", &[("X", "a")]), ("any", &[])],
        );
        let config = config(IterationMode::Merging, MissingDataPolicy::Fail);

        let plan = BatchAssembler::new(&registry, &config)
            .assemble(&[&slot1, &slot2], &ProgressInfo::new())
            .unwrap();
        let steps: Vec<_> = plan.steps().collect();

        assert_eq!(steps.len(), 2);
        assert_eq!(key_of(steps[0]), "{X=a}");
        assert_eq!(steps[0].selection("Slot2").unwrap().rows(), &BTreeSet::from([0, 1]));
        assert_eq!(key_of(steps[1]), "{X=b}");
        assert_eq!(steps[1].selection("Slot2").unwrap().rows(), &BTreeSet::from([1]));
    }

    #[test]
    fn test_split_all_runs_every_row_alone() {
        let registry = registry();
        let images = table(
            SlotInfo::input("Image", "string"),
            &[("i1", &[("X", "a")]), ("i2", &[("X", "a"), ("Note", "n")])],
        );
        let extra = table(
            SlotInfo::input("Extra", "string").optional(),
            &[("e", &[("X", "a")])],
        );
        let config = BatchingConfig {
            column_matching: ColumnMatching::SplitAll,
            ..BatchingConfig::default()
        };

        let plan = BatchAssembler::new(&registry, &config)
            .assemble(&[&images, &extra], &ProgressInfo::new())
            .unwrap();
        let steps: Vec<_> = plan.steps().collect();

        assert!(plan.columns().is_empty());
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].key().get(ROW_IDENTITY_KEY), Some("Image/0"));
        assert_eq!(steps[1].key().get(ROW_IDENTITY_KEY), Some("Image/1"));
        assert_eq!(steps[1].selection("Image").unwrap().rows(), &BTreeSet::from([1]));
        assert!(steps[0].selection("Extra").is_none());

        let annotations = steps[1].annotations();
        assert_eq!(annotations.get("Note").unwrap(), Some("n"));
        assert!(annotations.get(ROW_IDENTITY_KEY).unwrap().is_none());
    }

    #[test]
    fn test_split_all_across_required_slots() {
        let registry = registry();
        let slot1 = table(SlotInfo::input("Slot1", "string"), &[("a1", &[("X", "a")])]);
        let slot2 = table(
            SlotInfo::input("Slot2", "string"),
            &[("a2", &[("X", "a")]), ("b2", &[("X", "b")])],
        );
        let config = BatchingConfig {
            column_matching: ColumnMatching::SplitAll,
            missing_data: MissingDataPolicy::Generate,
            ..BatchingConfig::default()
        };

        let plan = BatchAssembler::new(&registry, &config)
            .with_generator(Some(&Placeholder))
            .assemble(&[&slot1, &slot2], &ProgressInfo::new())
            .unwrap();
        let keys: Vec<_> = plan
            .outcomes()
            .iter()
            .map(|outcome| outcome.key().get(ROW_IDENTITY_KEY).unwrap_or_default().to_owned())
            .collect();

        assert_eq!(keys, vec!["Slot1/0", "Slot2/0", "Slot2/1"]);
        let steps: Vec<_> = plan.steps().collect();
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].selection("Slot1").unwrap().rows(), &BTreeSet::from([0]));
        assert_eq!(steps[0].selection("Slot2").unwrap().generated().len(), 1);
        assert_eq!(plan.failed().count(), 2);
    }

    #[test]
    fn test_limit_drops_steps_outside_range() {
        let registry = registry();
        let slot = table(
            SlotInfo::input("In", "string"),
            &[("c", &[("X", "c")]), ("a", &[("X", "a")]), ("b", &[("X", "b")])],
        );
        let config = BatchingConfig {
            limit: Some(1..2),
            ..BatchingConfig::default()
        };

        let plan = BatchAssembler::new(&registry, &config)
            .assemble(&[&slot], &ProgressInfo::new())
            .unwrap();
        let steps: Vec<_> = plan.steps().collect();

        assert_eq!(plan.len(), 1);
        assert_eq!(steps[0].index(), 1);
        assert_eq!(key_of(steps[0]), "{X=b}");
        assert_eq!(steps[0].selection("In").unwrap().rows(), &BTreeSet::from([2]));
    }

    #[test]
    fn test_single_slot_keeps_unannotated_rows() {
        let registry = registry();
        let slot = table(
            SlotInfo::input("In", "string"),
            &[("a", &[("X", "a")]), ("none", &[]), ("b", &[("X", "b")])],
        );
        let config = config(IterationMode::Iterating, MissingDataPolicy::Skip);

        let plan = BatchAssembler::new(&registry, &config)
            .assemble(&[&slot], &ProgressInfo::new())
            .unwrap();
        let keys: Vec<_> = plan.steps().map(key_of).collect();

        assert_eq!(keys, vec!["{X=a}", "{X=b}", "{}"]);
    }

    #[test]
    fn test_keys_on_different_columns_are_joined() {
        let registry = registry();
        let slot1 = table(
            SlotInfo::input("Slot1", "string"),
            &[("a", &[("X", "a")]), ("b", &[("X", "b")])],
        );
        let slot2 = table(
            SlotInfo::input("Slot2", "string"),
            &[("1", &[("Y", "1")]), ("2", &[("Y", "2")])],
        );
        let config = config(IterationMode::Iterating, MissingDataPolicy::Fail);

        let plan = BatchAssembler::new(&registry, &config)
            .assemble(&[&slot1, &slot2], &ProgressInfo::new())
            .unwrap();
        let keys: Vec<_> = plan.steps().map(key_of).collect();

        assert_eq!(
            keys,
            vec!["{X=a, Y=1}", "{X=a, Y=2}", "{X=b, Y=1}", "{X=b, Y=2}"]
        );
    }

    #[test]
    fn test_ambiguous_match_in_iterating_mode() {
        let registry = registry();
        let slot = table(
            SlotInfo::input("In", "string"),
            &[("a1", &[("X", "a"), ("Note", "1")]), ("a2", &[("X", "a"), ("Note", "2")])],
        );
        let iterating = BatchingConfig {
            column_matching: ColumnMatching::Custom(BTreeSet::from(["X".to_owned()])),
            ..BatchingConfig::default()
        };

        let error = BatchAssembler::new(&registry, &iterating)
            .assemble(&[&slot], &ProgressInfo::new())
            .unwrap_err();
        assert!(matches!(error, RuntimeError::AmbiguousMatch { ref rows, .. } if rows == &vec![0, 1]));

        let merging = BatchingConfig {
            mode: IterationMode::Merging,
            ..iterating
        };
        let plan = BatchAssembler::new(&registry, &merging)
            .assemble(&[&slot], &ProgressInfo::new())
            .unwrap();
        let step = plan.steps().next().unwrap();

        assert_eq!(step.selection("In").unwrap().rows(), &BTreeSet::from([0, 1]));
        assert_eq!(step.annotations().get("Note").unwrap(), Some(r#"["1","2"]"#));
    }

    #[test]
    fn test_merge_conflict_is_recorded() {
        let registry = registry();
        let slot = table(
            SlotInfo::input("In", "string"),
            &[("a1", &[("X", "a"), ("Note", "1")]), ("a2", &[("X", "a"), ("Note", "2")])],
        );
        let config = BatchingConfig {
            mode: IterationMode::Merging,
            column_matching: ColumnMatching::Custom(BTreeSet::from(["X".to_owned()])),
            merge_mode: AnnotationMergeMode::ErrorOnConflict,
            ..BatchingConfig::default()
        };

        let plan = BatchAssembler::new(&registry, &config)
            .assemble(&[&slot], &ProgressInfo::new())
            .unwrap();
        let step = plan.steps().next().unwrap();

        assert_eq!(step.annotations().get("X").unwrap(), Some("a"));
        assert!(step.annotations().get("Note").is_err());
    }

    #[test]
    fn test_no_required_slots_runs_once() {
        let registry = registry();
        let optional = table(
            SlotInfo::input("Extra", "string").optional(),
            &[("a", &[("X", "a")]), ("b", &[("X", "b")])],
        );
        let config = BatchingConfig {
            mode: IterationMode::Merging,
            ..BatchingConfig::default()
        };

        let none = BatchAssembler::new(&registry, &config)
            .assemble(&[], &ProgressInfo::new())
            .unwrap();
        assert_eq!(none.steps().count(), 1);
        assert!(none.steps().next().unwrap().key().is_empty());

        let plan = BatchAssembler::new(&registry, &config)
            .assemble(&[&optional], &ProgressInfo::new())
            .unwrap();
        let steps: Vec<_> = plan.steps().collect();
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].selection("Extra").unwrap().len(), 2);
    }

    #[test]
    fn test_empty_required_slot_yields_no_steps() {
        let registry = registry();
        let empty = table(SlotInfo::input("In", "string"), &[]);
        let config = BatchingConfig::default();

        let plan = BatchAssembler::new(&registry, &config)
            .assemble(&[&empty], &ProgressInfo::new())
            .unwrap();

        assert!(plan.is_empty());
    }

    #[test]
    fn test_assembly_is_deterministic() {
        let registry = registry();
        let slot1 = table(
            SlotInfo::input("Slot1", "string"),
            &[("c", &[("X", "c")]), ("a", &[("X", "a")]), ("b", &[("X", "b")])],
        );
        let slot2 = table(
            SlotInfo::input("Slot2", "string"),
            &[("b", &[("X", "b"), ("Note", "n")]), ("a", &[("X", "a")]), ("c", &[("X", "c")])],
        );
        let config = BatchingConfig {
            column_matching: ColumnMatching::Custom(BTreeSet::from(["X".to_owned()])),
            ..BatchingConfig::default()
        };
        let assemble = || {
            BatchAssembler::new(&registry, &config)
                .assemble(&[&slot1, &slot2], &ProgressInfo::new())
                .unwrap()
                .steps()
                .map(|step| (step.index(), key_of(step), step.annotations().clone()))
                .collect::<Vec<_>>()
        };

        let first = assemble();
        assert_eq!(first, assemble());
        let keys: Vec<_> = first.iter().map(|(_, key, _)| key.as_str()).collect();
        assert_eq!(keys, vec!["{X=a}", "{X=b}", "{X=c}"]);
        assert_eq!(first[1].2.get("Note").unwrap(), Some("n"));
    }

    #[test]
    fn test_duplicate_slot_names_rejected() {
        let registry = registry();
        let a = table(SlotInfo::input("In", "string"), &[]);
        let b = table(SlotInfo::input("In", "string"), &[]);
        let config = BatchingConfig::default();

        let error = BatchAssembler::new(&registry, &config)
            .assemble(&[&a, &b], &ProgressInfo::new())
            .unwrap_err();
        assert!(matches!(error, RuntimeError::InvalidDefinition(_)));
    }
}
