//! Built-in data types available to every pipeline.

use super::{DataTypeDescriptor, DataTypeRegistry};
use crate::error::{BoxedError, Result};
use crate::value::DataValue;

/// Root type every other built-in type derives from.
pub const DATA: &str = "data";

/// Arbitrary JSON documents.
pub const JSON: &str = "json";

/// Plain text.
pub const STRING: &str = "string";

/// Floating point numbers.
pub const NUMBER: &str = "number";

pub(super) fn register_builtins(registry: &mut DataTypeRegistry) -> Result<()> {
    registry.register(
        DATA,
        DataTypeDescriptor::opaque("Data").with_description("Any data"),
    )?;
    registry.register(
        JSON,
        DataTypeDescriptor::of::<serde_json::Value>("JSON").with_supertype(DATA),
    )?;
    registry.register(
        STRING,
        DataTypeDescriptor::of::<String>("String").with_supertype(DATA),
    )?;
    registry.register(
        NUMBER,
        DataTypeDescriptor::of::<f64>("Number").with_supertype(DATA),
    )?;

    registry.register_conversion(NUMBER, STRING, number_to_string)?;
    Ok(())
}

fn number_to_string(value: &DataValue) -> std::result::Result<DataValue, BoxedError> {
    let number = value
        .downcast_ref::<f64>()
        .ok_or("number payload is not an f64")?;
    Ok(DataValue::new(STRING, number.to_string()))
}
