//! Text annotations attached to data rows.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

/// Prefix of annotation names reserved for storage location metadata.
pub const RESERVED_PREFIX: &str = "cellflow:";

/// Reserved annotation name carrying the slot a persisted table belongs to.
pub const SLOT_LOCATION_KEY: &str = "cellflow:slot";

/// An immutable name/value text pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Annotation {
    name: String,
    value: String,
}

impl Annotation {
    /// Creates a new annotation.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Returns the annotation name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the annotation value.
    pub fn value(&self) -> &str {
        &self.value
    }
}

impl fmt::Display for Annotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, self.value)
    }
}

/// Returns whether an annotation name is reserved for storage metadata.
pub fn is_reserved(name: &str) -> bool {
    name.starts_with(RESERVED_PREFIX)
}

/// Annotations of one row, unique by name and ordered by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnnotationSet(BTreeMap<String, String>);

impl AnnotationSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an annotation, returning the set for chaining.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    /// Inserts an annotation, returning the value it replaced.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(name.into(), value.into())
    }

    /// Removes an annotation by name.
    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.0.remove(name)
    }

    /// Returns the value of an annotation.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// Returns whether an annotation with this name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Returns the number of annotations.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over `(name, value)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Iterates over annotation names in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Returns the annotations as owned [`Annotation`] values.
    pub fn to_annotations(&self) -> Vec<Annotation> {
        self.iter().map(|(k, v)| Annotation::new(k, v)).collect()
    }

    /// Restricts the set to the given names.
    pub fn project(&self, names: &BTreeSet<String>) -> AnnotationSet {
        self.0
            .iter()
            .filter(|(k, _)| names.contains(*k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Returns a copy without reserved storage annotations.
    pub fn without_reserved(&self) -> AnnotationSet {
        self.0
            .iter()
            .filter(|(k, _)| !is_reserved(k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Returns whether two sets agree on every name they share.
    ///
    /// Names present in only one of the sets act as wildcards.
    pub fn is_compatible(&self, other: &AnnotationSet) -> bool {
        let (small, large) = if self.len() <= other.len() {
            (self, other)
        } else {
            (other, self)
        };
        small
            .0
            .iter()
            .all(|(k, v)| large.0.get(k).is_none_or(|other| other == v))
    }

    /// Returns whether every annotation of `self` is also present in `other`.
    pub fn is_subset_of(&self, other: &AnnotationSet) -> bool {
        self.len() <= other.len()
            && self
                .0
                .iter()
                .all(|(k, v)| other.0.get(k).is_some_and(|other| other == v))
    }

    /// Returns the union of two compatible sets; `other` wins on disagreement.
    pub fn union(&self, other: &AnnotationSet) -> AnnotationSet {
        let mut merged = self.clone();
        for (k, v) in &other.0 {
            merged.0.insert(k.clone(), v.clone());
        }
        merged
    }

    /// Returns the underlying map.
    pub fn as_map(&self) -> &BTreeMap<String, String> {
        &self.0
    }
}

impl fmt::Display for AnnotationSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (k, v)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{k}={v}")?;
        }
        f.write_str("}")
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for AnnotationSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl FromIterator<Annotation> for AnnotationSet {
    fn from_iter<I: IntoIterator<Item = Annotation>>(iter: I) -> Self {
        Self(iter.into_iter().map(|a| (a.name, a.value)).collect())
    }
}

impl From<BTreeMap<String, String>> for AnnotationSet {
    fn from(map: BTreeMap<String, String>) -> Self {
        Self(map)
    }
}

impl IntoIterator for AnnotationSet {
    type IntoIter = std::collections::btree_map::IntoIter<String, String>;
    type Item = (String, String);

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}
