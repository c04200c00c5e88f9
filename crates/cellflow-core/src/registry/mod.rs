//! Data type registry and single-hop conversion graph.
//!
//! The registry is built once at startup and then shared read-only:
//! registration takes `&mut self`, every lookup takes `&self`.

mod builtin;
mod converter;
mod descriptor;

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

pub use builtin::{DATA, JSON, NUMBER, STRING};
pub use converter::{ConversionKind, DataConverter};
pub use descriptor::{DataTypeDescriptor, Decoder};

use crate::TRACING_TARGET_REGISTRY;
use crate::error::{Error, Result};
use crate::row::DataRow;
use crate::value::{DataTypeId, DataValue};

/// Notification sent to registry observers after a successful registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryEvent {
    /// A data type was registered.
    TypeRegistered(DataTypeId),
    /// A converter was registered.
    ConverterRegistered {
        /// Source type.
        from: DataTypeId,
        /// Target type.
        to: DataTypeId,
    },
}

/// Callback invoked for every [`RegistryEvent`].
pub type RegistryObserver = Box<dyn Fn(&RegistryEvent) + Send + Sync>;

/// A registered type with its precomputed ancestor set.
#[derive(Debug, Clone)]
struct DataTypeEntry {
    descriptor: DataTypeDescriptor,
    ancestors: BTreeSet<DataTypeId>,
}

/// Registry of data types and the conversions between them.
#[derive(Default)]
pub struct DataTypeRegistry {
    types: HashMap<DataTypeId, DataTypeEntry>,
    converters: HashMap<(DataTypeId, DataTypeId), Arc<dyn DataConverter>>,
    observers: Vec<RegistryObserver>,
}

impl DataTypeRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with the built-in types and converters.
    pub fn with_builtins() -> Result<Self> {
        let mut registry = Self::new();
        builtin::register_builtins(&mut registry)?;
        Ok(registry)
    }

    /// Adds an observer notified after each successful registration.
    pub fn observe(&mut self, observer: impl Fn(&RegistryEvent) + Send + Sync + 'static) {
        self.observers.push(Box::new(observer));
    }

    /// Registers a data type.
    ///
    /// All declared supertypes must already be registered, which keeps the
    /// hierarchy acyclic.
    pub fn register(
        &mut self,
        type_id: impl Into<DataTypeId>,
        descriptor: DataTypeDescriptor,
    ) -> Result<()> {
        let type_id = type_id.into();
        if self.types.contains_key(&type_id) {
            return Err(Error::DuplicateType { type_id });
        }

        let mut ancestors = BTreeSet::new();
        for supertype in descriptor.supertypes() {
            let entry = self
                .types
                .get(supertype)
                .ok_or_else(|| Error::UnknownType {
                    type_id: supertype.clone(),
                })?;
            ancestors.insert(supertype.clone());
            ancestors.extend(entry.ancestors.iter().cloned());
        }

        tracing::debug!(
            target: TRACING_TARGET_REGISTRY,
            type_id = %type_id,
            name = descriptor.name(),
            ancestors = ancestors.len(),
            "Data type registered"
        );

        self.types.insert(
            type_id.clone(),
            DataTypeEntry {
                descriptor,
                ancestors,
            },
        );
        self.notify(&RegistryEvent::TypeRegistered(type_id));
        Ok(())
    }

    /// Registers an explicit converter for an ordered type pair.
    ///
    /// Fails if a converter for the pair already exists; the first one is
    /// kept.
    pub fn register_conversion(
        &mut self,
        from: impl Into<DataTypeId>,
        to: impl Into<DataTypeId>,
        converter: impl DataConverter + 'static,
    ) -> Result<()> {
        let from = from.into();
        let to = to.into();
        self.require(&from)?;
        self.require(&to)?;

        let key = (from.clone(), to.clone());
        if self.converters.contains_key(&key) {
            return Err(Error::DuplicateConverter { from, to });
        }
        self.converters.insert(key, Arc::new(converter));

        tracing::debug!(
            target: TRACING_TARGET_REGISTRY,
            from = %from,
            to = %to,
            "Converter registered"
        );

        self.notify(&RegistryEvent::ConverterRegistered { from, to });
        Ok(())
    }

    /// Returns whether a type id is registered.
    pub fn contains(&self, type_id: &DataTypeId) -> bool {
        self.types.contains_key(type_id)
    }

    /// Returns the descriptor of a registered type.
    pub fn descriptor(&self, type_id: &DataTypeId) -> Result<&DataTypeDescriptor> {
        self.types
            .get(type_id)
            .map(|entry| &entry.descriptor)
            .ok_or_else(|| Error::UnknownType {
                type_id: type_id.clone(),
            })
    }

    /// Returns all transitive supertypes of a registered type.
    pub fn ancestors(&self, type_id: &DataTypeId) -> Option<&BTreeSet<DataTypeId>> {
        self.types.get(type_id).map(|entry| &entry.ancestors)
    }

    /// Returns the ids of all types that are not hidden, sorted.
    pub fn visible_types(&self) -> Vec<&DataTypeId> {
        let mut types: Vec<_> = self
            .types
            .iter()
            .filter(|(_, entry)| !entry.descriptor.is_hidden())
            .map(|(id, _)| id)
            .collect();
        types.sort();
        types
    }

    /// Returns the number of registered types.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Returns whether no types are registered.
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Returns whether `from` is `to` or one of its subtypes.
    pub fn is_trivially_convertible(&self, from: &DataTypeId, to: &DataTypeId) -> bool {
        from == to
            || self
                .types
                .get(from)
                .is_some_and(|entry| entry.ancestors.contains(to))
    }

    /// Returns how a value of type `from` reaches `to`, if it can.
    ///
    /// Only a single explicit converter is ever considered; converters are
    /// never chained.
    pub fn conversion_kind(&self, from: &DataTypeId, to: &DataTypeId) -> Option<ConversionKind> {
        if self.is_trivially_convertible(from, to) {
            Some(ConversionKind::Trivial)
        } else if self.converters.contains_key(&(from.clone(), to.clone())) {
            Some(ConversionKind::Explicit)
        } else {
            None
        }
    }

    /// Returns whether a value of type `from` can be converted to `to`.
    pub fn is_convertible(&self, from: &DataTypeId, to: &DataTypeId) -> bool {
        self.conversion_kind(from, to).is_some()
    }

    /// Converts a value to the target type.
    pub fn convert_value(&self, value: &DataValue, to: &DataTypeId) -> Result<DataValue> {
        let from = value.data_type();
        if self.is_trivially_convertible(from, to) {
            return Ok(value.clone());
        }

        let converter = self
            .converters
            .get(&(from.clone(), to.clone()))
            .ok_or_else(|| Error::NoConversionPath {
                from: from.clone(),
                to: to.clone(),
            })?;

        let converted = converter
            .convert(value)
            .map_err(|source| Error::ConverterFailed {
                from: from.clone(),
                to: to.clone(),
                source,
            })?;

        if converted.data_type() != to {
            return Err(Error::ConverterOutputMismatch {
                from: from.clone(),
                to: to.clone(),
                actual: converted.data_type().clone(),
            });
        }

        tracing::trace!(
            target: TRACING_TARGET_REGISTRY,
            from = %from,
            to = %to,
            "Value converted"
        );

        Ok(converted)
    }

    /// Converts a row to the target type.
    ///
    /// Trivially convertible rows are returned unchanged; otherwise a new row
    /// with the converted payload and the same annotations is returned.
    pub fn convert(&self, row: &DataRow, to: &DataTypeId) -> Result<DataRow> {
        if self.is_trivially_convertible(row.data_type(), to) {
            return Ok(row.clone());
        }
        let value = self.convert_value(row.value(), to)?;
        Ok(row.with_value(value))
    }

    /// Restores a persisted payload of a registered type.
    pub fn decode(&self, type_id: &DataTypeId, json: serde_json::Value) -> Result<DataValue> {
        let descriptor = self.descriptor(type_id)?;
        let decoder = descriptor.decoder().ok_or_else(|| {
            Error::storage(
                type_id.as_str(),
                format!("data type '{type_id}' cannot be restored from storage"),
            )
        })?;
        let payload = (**decoder)(json)?;
        Ok(DataValue::from_arc(type_id.clone(), payload))
    }

    fn require(&self, type_id: &DataTypeId) -> Result<()> {
        if self.types.contains_key(type_id) {
            Ok(())
        } else {
            Err(Error::UnknownType {
                type_id: type_id.clone(),
            })
        }
    }

    fn notify(&self, event: &RegistryEvent) {
        for observer in &self.observers {
            observer(event);
        }
    }
}

impl fmt::Debug for DataTypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataTypeRegistry")
            .field("types", &self.types.len())
            .field("converters", &self.converters.len())
            .field("observers", &self.observers.len())
            .finish()
    }
}
