//! Type-tagged payloads.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use derive_more::{Display, From, Into};
use serde::{Deserialize, Serialize};

/// Identifier of a registered data type, e.g. `"imagej-imgplus-2d"`.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[derive(Display, From, Into)]
#[display("{_0}")]
#[serde(transparent)]
pub struct DataTypeId(String);

impl DataTypeId {
    /// Creates a new type id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for DataTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

impl From<&str> for DataTypeId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl AsRef<str> for DataTypeId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Payload carried by a data row.
///
/// Implemented for every serializable type, so node implementations can use
/// their own structs as payloads. The JSON form is only used by storage
/// backends.
pub trait Data: Any + fmt::Debug + Send + Sync {
    /// Returns the payload as [`Any`] for downcasting.
    fn as_any(&self) -> &dyn Any;

    /// Serializes the payload for persistence.
    fn to_json(&self) -> serde_json::Result<serde_json::Value>;
}

impl<T> Data for T
where
    T: Serialize + fmt::Debug + Send + Sync + 'static,
{
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn to_json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }
}

/// A payload tagged with the id of its data type.
///
/// Cloning is cheap: the payload is reference counted and never deep-copied.
#[derive(Clone)]
pub struct DataValue {
    data_type: DataTypeId,
    payload: Arc<dyn Data>,
}

impl DataValue {
    /// Wraps a payload of the given type.
    pub fn new(data_type: impl Into<DataTypeId>, payload: impl Data) -> Self {
        Self {
            data_type: data_type.into(),
            payload: Arc::new(payload),
        }
    }

    /// Wraps an already shared payload.
    pub fn from_arc(data_type: impl Into<DataTypeId>, payload: Arc<dyn Data>) -> Self {
        Self {
            data_type: data_type.into(),
            payload,
        }
    }

    /// Returns the id of the payload's data type.
    pub fn data_type(&self) -> &DataTypeId {
        &self.data_type
    }

    /// Returns the shared payload.
    pub fn payload(&self) -> &Arc<dyn Data> {
        &self.payload
    }

    /// Downcasts the payload to a concrete type.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.payload.as_any().downcast_ref::<T>()
    }

    /// Returns whether both values point at the same payload allocation.
    pub fn shares_payload(&self, other: &DataValue) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.payload), Arc::as_ptr(&other.payload))
    }

    /// Serializes the payload for persistence.
    pub fn to_json(&self) -> serde_json::Result<serde_json::Value> {
        self.payload.to_json()
    }
}

impl PartialEq for DataValue {
    fn eq(&self, other: &Self) -> bool {
        self.data_type == other.data_type && self.shares_payload(other)
    }
}

impl fmt::Debug for DataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataValue")
            .field("data_type", &self.data_type)
            .field("payload", &self.payload)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_downcast_payload() {
        let value = DataValue::new("number", 42.5_f64);

        assert_eq!(value.data_type().as_str(), "number");
        assert_eq!(value.downcast_ref::<f64>(), Some(&42.5));
        assert!(value.downcast_ref::<String>().is_none());
    }

    #[test]
    fn test_clone_shares_payload() {
        let value = DataValue::new("string", String::from("roi"));
        let copy = value.clone();
        let other = DataValue::new("string", String::from("roi"));

        assert!(value.shares_payload(&copy));
        assert_eq!(value, copy);
        assert_ne!(value, other);
    }

    #[test]
    fn test_payload_to_json() {
        let value = DataValue::new("json", serde_json::json!({ "width": 512 }));

        assert_eq!(value.to_json().unwrap()["width"], 512);
    }
}
