//! Merging of non-key annotations across the rows of a step.

use std::collections::{BTreeMap, BTreeSet};

use cellflow_core::{AnnotationSet, is_reserved};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

use super::key::MatchingKey;
use crate::error::{RuntimeError, RuntimeResult};

/// How contributing rows that disagree on a non-key annotation are combined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[derive(Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AnnotationMergeMode {
    /// Keeps every distinct value in order of first appearance.
    ///
    /// A single value is stored as is; several values are stored as a JSON
    /// array of strings. Values that already hold such an array of two or more
    /// items are flattened.
    #[default]
    Merge,
    /// The row discovered last wins.
    OverwriteLastWins,
    /// The row discovered first wins.
    KeepFirst,
    /// Non-key annotations are dropped.
    Discard,
    /// Disagreement is recorded and raised once the annotation is exposed.
    ErrorOnConflict,
}

/// Annotations visible to one iteration step.
///
/// Always contains the step's matching key. Names on which contributing rows
/// disagree under [`AnnotationMergeMode::ErrorOnConflict`] are held back and
/// only raise [`RuntimeError::AnnotationConflict`] when read or propagated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergedAnnotations {
    values: AnnotationSet,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    conflicts: BTreeMap<String, Vec<String>>,
}

impl MergedAnnotations {
    /// Combines the annotations of contributing rows, in discovery order.
    pub fn merge<'a>(
        key: &MatchingKey,
        mode: AnnotationMergeMode,
        rows: impl IntoIterator<Item = &'a AnnotationSet>,
    ) -> Self {
        let mut observed: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for annotations in rows {
            for (name, value) in annotations.iter() {
                if key.contains(name) || is_reserved(name) {
                    continue;
                }
                observed.entry(name).or_default().push(value);
            }
        }

        let mut values = key.annotations().without_reserved();
        let mut conflicts = BTreeMap::new();

        for (name, seen) in observed {
            match mode {
                AnnotationMergeMode::Discard => {}
                AnnotationMergeMode::KeepFirst => {
                    if let Some(first) = seen.first() {
                        values.insert(name, *first);
                    }
                }
                AnnotationMergeMode::OverwriteLastWins => {
                    if let Some(last) = seen.last() {
                        values.insert(name, *last);
                    }
                }
                AnnotationMergeMode::Merge => {
                    let distinct = distinct(seen.iter().flat_map(|value| flatten(value)));
                    values.insert(name, encode(distinct));
                }
                AnnotationMergeMode::ErrorOnConflict => {
                    let mut distinct = distinct(seen.iter().map(|value| value.to_string()));
                    if distinct.len() == 1 {
                        values.insert(name, distinct.remove(0));
                    } else {
                        conflicts.insert(name.to_owned(), distinct);
                    }
                }
            }
        }

        Self { values, conflicts }
    }

    /// Returns the value of an annotation.
    ///
    /// Fails if contributing rows disagreed on it under `ErrorOnConflict`.
    pub fn get(&self, name: &str) -> RuntimeResult<Option<&str>> {
        if let Some(values) = self.conflicts.get(name) {
            return Err(RuntimeError::AnnotationConflict {
                name: name.to_owned(),
                values: values.clone(),
            });
        }
        Ok(self.values.get(name))
    }

    /// Returns every annotation without a pending conflict.
    pub fn resolved(&self) -> &AnnotationSet {
        &self.values
    }

    /// Returns the pending conflicts, by name.
    pub fn conflicts(&self) -> &BTreeMap<String, Vec<String>> {
        &self.conflicts
    }

    /// Returns whether any name has a pending conflict.
    pub fn has_conflicts(&self) -> bool {
        !self.conflicts.is_empty()
    }

    /// Returns the annotations of an output row produced by the step.
    ///
    /// `removed` names are dropped, then `added` annotations are applied on
    /// top. A pending conflict that is neither removed nor overridden fails.
    pub fn for_output(
        &self,
        added: &AnnotationSet,
        removed: &BTreeSet<String>,
    ) -> RuntimeResult<AnnotationSet> {
        if let Some((name, values)) = self
            .conflicts
            .iter()
            .find(|(name, _)| !removed.contains(*name) && !added.contains(name))
        {
            return Err(RuntimeError::AnnotationConflict {
                name: name.clone(),
                values: values.clone(),
            });
        }

        let mut annotations = self.values.clone();
        for name in removed {
            annotations.remove(name);
        }
        for (name, value) in added.iter() {
            annotations.insert(name, value);
        }
        Ok(annotations)
    }
}

/// Splits a value produced by an earlier merge back into its items.
///
/// Merging never stores fewer than two items as an array, so any other value,
/// including a one-item array, is taken literally.
fn flatten(value: &str) -> Vec<String> {
    if value.starts_with('[') {
        if let Ok(items) = serde_json::from_str::<Vec<String>>(value) {
            if items.len() > 1 {
                return items;
            }
        }
    }
    vec![value.to_owned()]
}

fn distinct(values: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = BTreeSet::new();
    values
        .into_iter()
        .filter(|value| seen.insert(value.clone()))
        .collect()
}

fn encode(mut values: Vec<String>) -> String {
    if values.len() == 1 {
        return values.remove(0);
    }
    // A list of strings always serializes.
    serde_json::to_string(&values).unwrap_or_default()
}
