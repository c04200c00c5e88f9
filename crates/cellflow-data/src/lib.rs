#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod fs;
mod manifest;
mod storage;

pub use fs::{FsStorage, MANIFEST_FILE_NAME};
pub use manifest::{RowRecord, TableManifest};
pub use storage::Storage;

/// Tracing target for storage operations.
pub const TRACING_TARGET: &str = "cellflow_data";
