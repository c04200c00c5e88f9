//! What a node body receives and returns for one step.

use std::any::Any;
use std::collections::{BTreeMap, BTreeSet};

use cellflow_core::{AnnotationSet, DataRow, DataTable, DataValue};

use crate::batch::MatchingKey;

/// Per-slot input tables of one step.
#[derive(Debug, Clone)]
pub struct StepInputs {
    index: usize,
    key: MatchingKey,
    tables: BTreeMap<String, DataTable>,
}

impl StepInputs {
    /// Creates the inputs of step `index`.
    pub fn new(index: usize, key: MatchingKey, tables: BTreeMap<String, DataTable>) -> Self {
        Self { index, key, tables }
    }

    /// Returns the step index.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Returns the matching key of the step.
    pub fn key(&self) -> &MatchingKey {
        &self.key
    }

    /// Returns the table of an input slot.
    pub fn table(&self, slot: &str) -> Option<&DataTable> {
        self.tables.get(slot)
    }

    /// Returns the rows of an input slot; empty if the slot has no data.
    pub fn rows(&self, slot: &str) -> &[DataRow] {
        self.tables.get(slot).map(DataTable::rows).unwrap_or_default()
    }

    /// Returns the first row of an input slot.
    pub fn first(&self, slot: &str) -> Option<&DataRow> {
        self.rows(slot).first()
    }

    /// Returns the payload of the first row of a slot, if it has type `T`.
    pub fn value<T: Any>(&self, slot: &str) -> Option<&T> {
        self.first(slot)?.value().downcast_ref()
    }

    /// Returns the names of all input slots.
    pub fn slots(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }
}

/// One value a step adds to an output slot.
///
/// The output row inherits the step's merged annotations; `removed` names are
/// dropped and `added` annotations override on top.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputItem {
    value: DataValue,
    added: AnnotationSet,
    removed: BTreeSet<String>,
}

impl OutputItem {
    /// Creates an item inheriting the step annotations unchanged.
    pub fn new(value: DataValue) -> Self {
        Self {
            value,
            added: AnnotationSet::new(),
            removed: BTreeSet::new(),
        }
    }

    /// Adds or overrides an annotation.
    pub fn with_annotation(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        self.removed.remove(&name);
        self.added.insert(name, value);
        self
    }

    /// Drops an inherited annotation.
    pub fn without_annotation(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.added.remove(&name);
        self.removed.insert(name);
        self
    }

    /// Returns the produced value.
    pub fn value(&self) -> &DataValue {
        &self.value
    }

    /// Returns annotations added on top of the step annotations.
    pub fn added(&self) -> &AnnotationSet {
        &self.added
    }

    /// Returns inherited annotation names that are dropped.
    pub fn removed(&self) -> &BTreeSet<String> {
        &self.removed
    }
}

impl From<DataValue> for OutputItem {
    fn from(value: DataValue) -> Self {
        Self::new(value)
    }
}

/// Values produced by one step, by output slot, in production order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepOutputs {
    items: Vec<(String, OutputItem)>,
}

impl StepOutputs {
    /// Creates an empty set of outputs.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an item to an output slot.
    pub fn push(&mut self, slot: impl Into<String>, item: impl Into<OutputItem>) {
        self.items.push((slot.into(), item.into()));
    }

    /// Appends an item to an output slot, builder style.
    pub fn with(mut self, slot: impl Into<String>, item: impl Into<OutputItem>) -> Self {
        self.push(slot, item);
        self
    }

    /// Returns the items in production order.
    pub fn items(&self) -> &[(String, OutputItem)] {
        &self.items
    }

    /// Returns the number of items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns whether nothing was produced.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
