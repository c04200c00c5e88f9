//! Common error type definitions.

use strum::{AsRefStr, IntoStaticStr};
use thiserror::Error;

use crate::value::DataTypeId;

/// Type alias for boxed dynamic errors that can be sent across threads.
///
/// Used as the source of converter, generator and node-body failures, which
/// are implemented outside of this crate.
pub type BoxedError = Box<dyn std::error::Error + Send + Sync>;

/// Type alias for Results with our custom Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Categories of errors that can occur in cellflow-core operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    /// A data type was registered twice.
    DuplicateType,
    /// A converter was registered twice for the same type pair.
    DuplicateConverter,
    /// A data type id is not registered.
    UnknownType,
    /// No single-step conversion exists between two types.
    NoConversionPath,
    /// A registered converter failed or broke its contract.
    Conversion,
    /// A row index is outside of a table.
    RowOutOfRange,
    /// Table persistence failed.
    StorageIo,
    /// Serialization/deserialization error.
    Serialization,
}

/// Errors raised by the data model, the type registry and table storage.
#[derive(Debug, Error)]
pub enum Error {
    /// A data type id was registered twice.
    #[error("data type '{type_id}' is already registered")]
    DuplicateType {
        /// The offending type id.
        type_id: DataTypeId,
    },

    /// An explicit converter already exists for the ordered type pair.
    #[error("a converter from '{from}' to '{to}' is already registered")]
    DuplicateConverter {
        /// Source type of the converter.
        from: DataTypeId,
        /// Target type of the converter.
        to: DataTypeId,
    },

    /// A data type id is not known to the registry.
    #[error("data type '{type_id}' is not registered")]
    UnknownType {
        /// The unknown type id.
        type_id: DataTypeId,
    },

    /// Neither subtyping nor a direct converter connects the two types.
    #[error("no conversion from '{from}' to '{to}'")]
    NoConversionPath {
        /// Type of the value being converted.
        from: DataTypeId,
        /// Requested target type.
        to: DataTypeId,
    },

    /// A registered converter returned an error.
    #[error("converter from '{from}' to '{to}' failed")]
    ConverterFailed {
        /// Source type of the converter.
        from: DataTypeId,
        /// Target type of the converter.
        to: DataTypeId,
        /// Converter error.
        #[source]
        source: BoxedError,
    },

    /// A registered converter produced a value of the wrong type.
    #[error("converter from '{from}' to '{to}' produced a value of type '{actual}'")]
    ConverterOutputMismatch {
        /// Source type of the converter.
        from: DataTypeId,
        /// Requested target type.
        to: DataTypeId,
        /// Type the converter actually returned.
        actual: DataTypeId,
    },

    /// A row index is not present in a table.
    #[error("row {index} is out of range for slot '{slot}' with {row_count} rows")]
    RowOutOfRange {
        /// Slot the table belongs to.
        slot: String,
        /// Requested index.
        index: usize,
        /// Number of rows in the table.
        row_count: usize,
    },

    /// Persisting or restoring a table failed; nothing was written or read.
    #[error("storage error at '{location}': {message}")]
    StorageIo {
        /// Storage location involved.
        location: String,
        /// Human-readable summary.
        message: String,
        /// Underlying failure, if any.
        #[source]
        source: Option<BoxedError>,
    },

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Creates a storage error without an underlying source.
    pub fn storage(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self::StorageIo {
            location: location.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Creates a storage error wrapping an underlying failure.
    pub fn storage_with_source(
        location: impl Into<String>,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::StorageIo {
            location: location.into(),
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Returns the error kind.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::DuplicateType { .. } => ErrorKind::DuplicateType,
            Self::DuplicateConverter { .. } => ErrorKind::DuplicateConverter,
            Self::UnknownType { .. } => ErrorKind::UnknownType,
            Self::NoConversionPath { .. } => ErrorKind::NoConversionPath,
            Self::ConverterFailed { .. } | Self::ConverterOutputMismatch { .. } => {
                ErrorKind::Conversion
            }
            Self::RowOutOfRange { .. } => ErrorKind::RowOutOfRange,
            Self::StorageIo { .. } => ErrorKind::StorageIo,
            Self::Serialization(_) => ErrorKind::Serialization,
        }
    }

    /// Returns the error kind as a string.
    pub fn kind_str(&self) -> &'static str {
        self.kind().into()
    }

    /// Returns whether this is a structural mistake in the pipeline definition.
    ///
    /// Structural errors are never retried and should be surfaced to whoever
    /// authored the pipeline.
    pub fn is_structural(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::DuplicateType
                | ErrorKind::DuplicateConverter
                | ErrorKind::UnknownType
                | ErrorKind::NoConversionPath
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_carry_identifiers() {
        let error = Error::NoConversionPath {
            from: "image".into(),
            to: "table".into(),
        };

        assert_eq!(error.to_string(), "no conversion from 'image' to 'table'");
        assert_eq!(error.kind_str(), "no_conversion_path");
        assert!(error.is_structural());
    }

    #[test]
    fn test_storage_error_is_not_structural() {
        let error = Error::storage("/tmp/out", "manifest missing");

        assert_eq!(error.kind(), ErrorKind::StorageIo);
        assert!(!error.is_structural());
    }
}
