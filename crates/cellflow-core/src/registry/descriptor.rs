//! Data type descriptors.

use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::value::{Data, DataTypeId};

/// Restores a payload from its persisted JSON form.
pub type Decoder = Arc<dyn Fn(serde_json::Value) -> serde_json::Result<Arc<dyn Data>> + Send + Sync>;

/// Describes the implementation behind a data type id.
#[derive(Clone)]
pub struct DataTypeDescriptor {
    name: String,
    description: Option<String>,
    supertypes: Vec<DataTypeId>,
    hidden: bool,
    decoder: Option<Decoder>,
}

impl DataTypeDescriptor {
    /// Describes a type implemented by `T`.
    ///
    /// Values of the type can be restored from storage.
    pub fn of<T>(name: impl Into<String>) -> Self
    where
        T: Data + DeserializeOwned,
    {
        let decoder: Decoder = Arc::new(|json| {
            let payload: T = serde_json::from_value(json)?;
            Ok(Arc::new(payload) as Arc<dyn Data>)
        });

        Self {
            decoder: Some(decoder),
            ..Self::opaque(name)
        }
    }

    /// Describes a type without a storage decoder, e.g. an abstract base type.
    pub fn opaque(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            supertypes: Vec::new(),
            hidden: false,
            decoder: None,
        }
    }

    /// Declares a direct supertype.
    pub fn with_supertype(mut self, supertype: impl Into<DataTypeId>) -> Self {
        self.supertypes.push(supertype.into());
        self
    }

    /// Sets a description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Hides the type from user-facing listings.
    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    /// Returns the display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the description, if any.
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Returns the declared direct supertypes.
    pub fn supertypes(&self) -> &[DataTypeId] {
        &self.supertypes
    }

    /// Returns whether the type is hidden.
    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    /// Returns the storage decoder, if any.
    pub fn decoder(&self) -> Option<&Decoder> {
        self.decoder.as_ref()
    }
}

impl fmt::Debug for DataTypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataTypeDescriptor")
            .field("name", &self.name)
            .field("supertypes", &self.supertypes)
            .field("hidden", &self.hidden)
            .field("decodable", &self.decoder.is_some())
            .finish()
    }
}
