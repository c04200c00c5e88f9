//! Per-node batching configuration.

use std::collections::BTreeSet;
use std::ops::Range;

use cellflow_core::{DataTable, is_reserved};
use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

use super::merge::AnnotationMergeMode;
use super::missing::MissingDataPolicy;

/// Prefix of annotation names considered by the `PrefixHash*` strategies.
pub const HASH_PREFIX: char = '#';

/// How many rows of a slot a single step receives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[derive(Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum IterationMode {
    /// Exactly one row per slot and step.
    #[default]
    Iterating,
    /// Every matching row of a slot goes into the same step.
    Merging,
}

/// Which annotation names form the matching key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "strategy", content = "columns", rename_all = "snake_case")]
pub enum ColumnMatching {
    /// Every annotation name present on any input row.
    #[default]
    Union,
    /// Annotation names present in every non-empty input table.
    Intersection,
    /// Like [`Union`](Self::Union), restricted to names starting with `#`.
    PrefixHashUnion,
    /// Like [`Intersection`](Self::Intersection), restricted to names starting with `#`.
    PrefixHashIntersection,
    /// An explicit set of names.
    Custom(BTreeSet<String>),
    /// No matching columns: every row shares the empty key.
    None,
    /// Every input row is a step of its own, keyed by slot and row index.
    ///
    /// Other slots contribute nothing to such a step and go through the
    /// missing-data policy.
    SplitAll,
}

impl ColumnMatching {
    /// Picks the matching column names for a set of input tables.
    pub fn columns(&self, tables: &[&DataTable]) -> BTreeSet<String> {
        let per_table = || {
            tables
                .iter()
                .filter(|table| !table.is_empty())
                .map(|table| table.annotation_names())
        };

        let names = match self {
            Self::Union | Self::PrefixHashUnion => per_table().flatten().collect(),
            Self::Intersection | Self::PrefixHashIntersection => per_table()
                .reduce(|acc, names| acc.intersection(&names).cloned().collect())
                .unwrap_or_default(),
            Self::Custom(names) => names.clone(),
            Self::None | Self::SplitAll => BTreeSet::new(),
        };

        let hash_only = matches!(self, Self::PrefixHashUnion | Self::PrefixHashIntersection);
        names
            .into_iter()
            .filter(|name| !is_reserved(name))
            .filter(|name| !hash_only || name.starts_with(HASH_PREFIX))
            .collect()
    }
}

/// Batching behavior of one node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Builder, Serialize, Deserialize)]
#[builder(setter(into), default)]
#[serde(default)]
pub struct BatchingConfig {
    /// One row or all matching rows per slot and step.
    pub mode: IterationMode,
    /// Strategy choosing the matching columns.
    pub column_matching: ColumnMatching,
    /// Names removed from the matching columns after the strategy ran.
    pub ignored_columns: BTreeSet<String>,
    /// How non-key annotations of contributing rows are combined.
    pub merge_mode: AnnotationMergeMode,
    /// What happens when a slot has no row for a key.
    pub missing_data: MissingDataPolicy,
    /// Step indices to execute; steps outside the range are dropped.
    pub limit: Option<Range<usize>>,
}

impl BatchingConfig {
    /// Returns a builder for a batching configuration.
    pub fn builder() -> BatchingConfigBuilder {
        BatchingConfigBuilder::default()
    }

    /// Returns the matching columns for a set of input tables.
    pub fn matching_columns(&self, tables: &[&DataTable]) -> BTreeSet<String> {
        let mut columns = self.column_matching.columns(tables);
        columns.retain(|name| !self.ignored_columns.contains(name));
        columns
    }

    /// Returns whether the step with the given emission index may run.
    pub fn allows_step(&self, index: usize) -> bool {
        self.limit.as_ref().is_none_or(|limit| limit.contains(&index))
    }
}

#[cfg(test)]
mod tests {
    use cellflow_core::{AnnotationSet, DataValue, RunId, SlotInfo, SourceContext};

    use super::*;

    fn table(name: &str, rows: &[&[(&str, &str)]]) -> DataTable {
        let mut table = DataTable::new(SlotInfo::input(name, "string"), RunId::new());
        for annotations in rows {
            table.add_row(
                DataValue::new("string", String::new()),
                annotations.iter().copied().collect::<AnnotationSet>(),
                SourceContext::new(),
            );
        }
        table
    }

    fn names(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_union_and_intersection() {
        let a = table("A", &[&[("X", "1"), ("#D", "d")]]);
        let b = table("B", &[&[("X", "1"), ("Y", "2")], &[("#D", "d")]]);
        let empty = table("C", &[]);
        let tables = [&a, &b, &empty];

        assert_eq!(ColumnMatching::Union.columns(&tables), names(&["#D", "X", "Y"]));
        assert_eq!(ColumnMatching::Intersection.columns(&tables), names(&["#D", "X"]));
        assert_eq!(ColumnMatching::PrefixHashUnion.columns(&tables), names(&["#D"]));
        assert_eq!(
            ColumnMatching::PrefixHashIntersection.columns(&tables),
            names(&["#D"])
        );
        assert!(ColumnMatching::None.columns(&tables).is_empty());
        assert!(ColumnMatching::SplitAll.columns(&tables).is_empty());
    }

    #[test]
    fn test_step_limit() {
        let unlimited = BatchingConfig::default();
        assert!(unlimited.allows_step(0));
        assert!(unlimited.allows_step(usize::MAX));

        let limited = BatchingConfig::builder().limit(1..3).build().unwrap();
        assert!(!limited.allows_step(0));
        assert!(limited.allows_step(1));
        assert!(limited.allows_step(2));
        assert!(!limited.allows_step(3));
    }

    #[test]
    fn test_ignored_columns_are_removed() {
        let a = table("A", &[&[("X", "1"), ("Y", "2")]]);
        let config = BatchingConfig::builder()
            .ignored_columns(names(&["Y"]))
            .build()
            .unwrap();

        assert_eq!(config.matching_columns(&[&a]), names(&["X"]));
        assert_eq!(config.merge_mode, AnnotationMergeMode::Merge);
        assert_eq!(config.missing_data, MissingDataPolicy::Skip);
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let config: BatchingConfig = serde_json::from_value(serde_json::json!({
            "mode": "merging",
            "column_matching": { "strategy": "custom", "columns": ["X"] }
        }))
        .unwrap();

        assert_eq!(config.mode, IterationMode::Merging);
        assert_eq!(config.column_matching, ColumnMatching::Custom(names(&["X"])));
        assert_eq!(config.missing_data, MissingDataPolicy::Skip);
        assert_eq!(config.limit, None);

        let config: BatchingConfig = serde_json::from_value(serde_json::json!({
            "column_matching": { "strategy": "split_all" },
            "limit": { "start": 0, "end": 10 }
        }))
        .unwrap();

        assert_eq!(config.column_matching, ColumnMatching::SplitAll);
        assert_eq!(config.limit, Some(0..10));
    }
}
