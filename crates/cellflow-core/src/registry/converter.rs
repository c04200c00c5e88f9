//! Explicit conversions between data types.

use crate::error::BoxedError;
use crate::value::DataValue;

/// Converts a value of one data type into a value of another.
///
/// The returned value must be tagged with exactly the converter's target
/// type; the registry rejects anything else.
pub trait DataConverter: Send + Sync {
    /// Converts a single value.
    fn convert(&self, value: &DataValue) -> Result<DataValue, BoxedError>;
}

impl<F> DataConverter for F
where
    F: Fn(&DataValue) -> Result<DataValue, BoxedError> + Send + Sync,
{
    fn convert(&self, value: &DataValue) -> Result<DataValue, BoxedError> {
        self(value)
    }
}

/// How a value reaches a target type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConversionKind {
    /// The target is the value's own type or one of its supertypes.
    Trivial,
    /// A registered converter is applied.
    Explicit,
}
