//! Matching keys.

use std::collections::BTreeSet;
use std::fmt;

use cellflow_core::AnnotationSet;
use serde::{Deserialize, Serialize};

/// Key column holding `slot/row` when every row is its own step.
pub const ROW_IDENTITY_KEY: &str = "cellflow:row";

/// Annotations of a row restricted to the matching columns.
///
/// A key that lacks a matching column acts as a wildcard for it.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[derive(Serialize, Deserialize)]
#[serde(transparent)]
pub struct MatchingKey(AnnotationSet);

impl MatchingKey {
    /// Creates a key from an annotation set.
    pub fn new(annotations: AnnotationSet) -> Self {
        Self(annotations)
    }

    /// Returns the empty key.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Returns the key identifying a single row of a slot.
    pub fn row_identity(slot: &str, row: usize) -> Self {
        Self(AnnotationSet::new().with(ROW_IDENTITY_KEY, format!("{slot}/{row}")))
    }

    /// Returns the key of a row with the given annotations.
    pub fn project(annotations: &AnnotationSet, columns: &BTreeSet<String>) -> Self {
        Self(annotations.project(columns))
    }

    /// Returns the annotations of this key.
    pub fn annotations(&self) -> &AnnotationSet {
        &self.0
    }

    /// Returns the value of one column, if the key defines it.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name)
    }

    /// Returns whether the key defines a column.
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains(name)
    }

    /// Returns the number of columns the key defines.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns whether the key defines no column.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns whether both keys agree on every column they share.
    pub fn is_compatible(&self, other: &MatchingKey) -> bool {
        self.0.is_compatible(&other.0)
    }

    /// Returns whether a row with this key matches the step `other`.
    ///
    /// Every column of `self` must be defined by `other` with the same value.
    pub fn matches(&self, other: &MatchingKey) -> bool {
        self.0.is_subset_of(&other.0)
    }

    /// Combines two compatible keys.
    pub fn join(&self, other: &MatchingKey) -> MatchingKey {
        Self(self.0.union(&other.0))
    }

    /// Returns the canonical JSON form used for ordering and fingerprints.
    pub fn serialized(&self) -> String {
        // A map of strings always serializes.
        serde_json::to_string(self.0.as_map()).unwrap_or_default()
    }
}

impl fmt::Display for MatchingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl From<AnnotationSet> for MatchingKey {
    fn from(annotations: AnnotationSet) -> Self {
        Self(annotations)
    }
}
