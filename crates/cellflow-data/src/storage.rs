//! Storage trait for table persistence.

use std::path::Path;

use async_trait::async_trait;
use cellflow_core::{DataTable, ProgressInfo, Result};

/// Persists and restores whole data tables.
///
/// Implementations must preserve row order and per-row annotations, and must
/// be atomic: a failed call leaves no partially written or partially read
/// table behind.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Writes a table to the destination.
    async fn write(
        &self,
        table: &DataTable,
        destination: &Path,
        progress: &ProgressInfo,
    ) -> Result<()>;

    /// Reads a table from the source.
    async fn read(&self, source: &Path) -> Result<DataTable>;
}
