//! Filesystem storage backend.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use cellflow_core::{DataTable, DataTypeRegistry, Error, ProgressInfo, Result};
use uuid::Uuid;

use crate::TRACING_TARGET;
use crate::manifest::TableManifest;
use crate::storage::Storage;

/// Name of the manifest file inside a table directory.
pub const MANIFEST_FILE_NAME: &str = "data-table.json";

/// Stores each table as a directory holding a JSON manifest.
///
/// Writes go to a hidden staging directory next to the destination and are
/// moved into place with a rename, so readers never observe a partial table.
#[derive(Debug, Clone)]
pub struct FsStorage {
    registry: Arc<DataTypeRegistry>,
}

impl FsStorage {
    /// Creates a storage backend decoding payloads through the registry.
    pub fn new(registry: Arc<DataTypeRegistry>) -> Self {
        Self { registry }
    }

    /// Returns the directory a table for `slot` uses below `root`.
    pub fn location_for(root: &Path, slot: &str) -> PathBuf {
        root.join(sanitize(slot))
    }

    fn sibling(destination: &Path, tag: &str) -> Result<PathBuf> {
        let name = destination
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| {
                Error::storage(
                    destination.display().to_string(),
                    "destination has no directory name",
                )
            })?;
        Ok(destination.with_file_name(format!(".{name}.{tag}-{}", Uuid::new_v4())))
    }

    async fn replace(destination: &Path, staging: &Path) -> Result<()> {
        let location = destination.display().to_string();

        if !tokio::fs::try_exists(destination).await.unwrap_or(false) {
            return tokio::fs::rename(staging, destination)
                .await
                .map_err(|err| Error::storage_with_source(&location, "failed to publish table", err));
        }

        let backup = Self::sibling(destination, "old")?;
        tokio::fs::rename(destination, &backup)
            .await
            .map_err(|err| {
                Error::storage_with_source(&location, "failed to move previous table aside", err)
            })?;

        if let Err(err) = tokio::fs::rename(staging, destination).await {
            // Put the previous table back so the destination is unchanged.
            if let Err(restore) = tokio::fs::rename(&backup, destination).await {
                tracing::warn!(
                    target: TRACING_TARGET,
                    path = %backup.display(),
                    error = %restore,
                    "Failed to restore previous table copy"
                );
            }
            return Err(Error::storage_with_source(
                &location,
                "failed to publish table",
                err,
            ));
        }

        if let Err(err) = tokio::fs::remove_dir_all(&backup).await {
            tracing::warn!(
                target: TRACING_TARGET,
                path = %backup.display(),
                error = %err,
                "Failed to remove previous table copy"
            );
        }
        Ok(())
    }
}

#[async_trait]
impl Storage for FsStorage {
    async fn write(
        &self,
        table: &DataTable,
        destination: &Path,
        progress: &ProgressInfo,
    ) -> Result<()> {
        let location = destination.display().to_string();
        let progress = progress.resolve(format!("Export '{}'", table.slot().name()));

        let manifest = TableManifest::from_table(table)?;
        let bytes = serde_json::to_vec_pretty(&manifest)?;
        progress.log(format!("Serialized {} rows", manifest.rows.len()));

        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|err| {
                Error::storage_with_source(&location, "failed to create parent directory", err)
            })?;
        }

        let staging = Self::sibling(destination, "partial")?;
        let staged = async {
            tokio::fs::create_dir_all(&staging).await?;
            tokio::fs::write(staging.join(MANIFEST_FILE_NAME), &bytes).await
        }
        .await;

        if let Err(err) = staged {
            let _ = tokio::fs::remove_dir_all(&staging).await;
            return Err(Error::storage_with_source(
                &location,
                "failed to stage table",
                err,
            ));
        }

        if let Err(err) = Self::replace(destination, &staging).await {
            let _ = tokio::fs::remove_dir_all(&staging).await;
            return Err(err);
        }

        tracing::debug!(
            target: TRACING_TARGET,
            path = %location,
            slot = table.slot().name(),
            rows = table.row_count(),
            "Table written"
        );
        progress.log(format!("Wrote {location}"));
        Ok(())
    }

    async fn read(&self, source: &Path) -> Result<DataTable> {
        let location = source.display().to_string();
        let bytes = tokio::fs::read(source.join(MANIFEST_FILE_NAME))
            .await
            .map_err(|err| Error::storage_with_source(&location, "failed to read manifest", err))?;

        let manifest: TableManifest = serde_json::from_slice(&bytes)
            .map_err(|err| Error::storage_with_source(&location, "malformed manifest", err))?;
        let table = manifest.into_table(&self.registry, &location)?;

        tracing::debug!(
            target: TRACING_TARGET,
            path = %location,
            slot = table.slot().name(),
            rows = table.row_count(),
            "Table read"
        );
        Ok(table)
    }
}

/// Replaces path separators and other unsafe characters in a directory name.
fn sanitize(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    match cleaned.trim() {
        "" | "." | ".." => "_".to_owned(),
        trimmed => trimmed.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use cellflow_core::{
        AnnotationSet, DataTypeDescriptor, DataValue, RunId, SlotInfo, SourceContext,
    };

    use super::*;

    fn registry() -> Arc<DataTypeRegistry> {
        Arc::new(DataTypeRegistry::with_builtins().unwrap())
    }

    fn table() -> DataTable {
        let mut table = DataTable::new(SlotInfo::output("Measurements", "string"), RunId::new());
        table.add_row(
            DataValue::new("string", String::from("first")),
            AnnotationSet::new().with("Sample", "s1"),
            SourceContext::from_origin("test"),
        );
        table.add_row(
            DataValue::new("number", 4.0_f64),
            AnnotationSet::new().with("Sample", "s2").with("#Dataset", "d"),
            SourceContext::from_origin("test"),
        );
        table
    }

    #[tokio::test]
    async fn test_write_then_read_preserves_rows() {
        let temp = tempfile::TempDir::new().unwrap();
        let storage = FsStorage::new(registry());
        let destination = FsStorage::location_for(temp.path(), "Measurements");
        let original = table();

        storage
            .write(&original, &destination, &ProgressInfo::new())
            .await
            .unwrap();
        let restored = storage.read(&destination).await.unwrap();

        assert_eq!(restored.slot(), original.slot());
        assert_eq!(restored.run_id(), original.run_id());
        assert_eq!(restored.row_count(), 2);
        for ((_, a), (_, b)) in original.iter().zip(restored.iter()) {
            assert_eq!(a.annotations(), b.annotations());
            assert_eq!(a.data_type(), b.data_type());
        }
        assert_eq!(
            restored.get_row(1).unwrap().value().downcast_ref::<f64>(),
            Some(&4.0)
        );
    }

    #[tokio::test]
    async fn test_write_replaces_existing_table() {
        let temp = tempfile::TempDir::new().unwrap();
        let storage = FsStorage::new(registry());
        let destination = temp.path().join("out");

        storage
            .write(&table(), &destination, &ProgressInfo::new())
            .await
            .unwrap();
        let smaller = table().slice(&[0].into()).unwrap();
        storage
            .write(&smaller, &destination, &ProgressInfo::new())
            .await
            .unwrap();

        let restored = storage.read(&destination).await.unwrap();
        assert_eq!(restored.row_count(), 1);

        let leftovers: Vec<_> = std::fs::read_dir(temp.path())
            .unwrap()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_name().to_string_lossy().starts_with('.'))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn test_failed_publish_restores_previous_table() {
        let temp = tempfile::TempDir::new().unwrap();
        let storage = FsStorage::new(registry());
        let destination = temp.path().join("out");

        storage
            .write(&table(), &destination, &ProgressInfo::new())
            .await
            .unwrap();

        let missing_staging = temp.path().join("never-staged");
        let error = FsStorage::replace(&destination, &missing_staging)
            .await
            .unwrap_err();
        assert!(matches!(error, Error::StorageIo { .. }));

        let restored = storage.read(&destination).await.unwrap();
        assert_eq!(restored.row_count(), 2);
        assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_unserializable_table_writes_nothing() {
        #[derive(Debug)]
        struct Opaque;

        impl serde::Serialize for Opaque {
            fn serialize<S: serde::Serializer>(&self, _: S) -> std::result::Result<S::Ok, S::Error> {
                Err(serde::ser::Error::custom("opaque payload"))
            }
        }

        let temp = tempfile::TempDir::new().unwrap();
        let storage = FsStorage::new(registry());
        let destination = temp.path().join("out");

        let mut table = table();
        table.add_row(
            DataValue::new("data", Opaque),
            AnnotationSet::new(),
            SourceContext::new(),
        );

        assert!(
            storage
                .write(&table, &destination, &ProgressInfo::new())
                .await
                .is_err()
        );
        assert!(!destination.exists());
        assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_read_fails_for_undecodable_row() {
        let temp = tempfile::TempDir::new().unwrap();
        let destination = temp.path().join("out");

        let mut registry = DataTypeRegistry::with_builtins().unwrap();
        registry
            .register("opaque", DataTypeDescriptor::opaque("Opaque"))
            .unwrap();
        let storage = FsStorage::new(Arc::new(registry));

        let mut table = table();
        table.add_row(
            DataValue::new("opaque", String::from("x")),
            AnnotationSet::new(),
            SourceContext::new(),
        );
        storage
            .write(&table, &destination, &ProgressInfo::new())
            .await
            .unwrap();

        let error = storage.read(&destination).await.unwrap_err();
        assert!(matches!(error, Error::StorageIo { .. }));
    }

    #[tokio::test]
    async fn test_read_missing_table() {
        let temp = tempfile::TempDir::new().unwrap();
        let storage = FsStorage::new(registry());

        let error = storage.read(&temp.path().join("nothing")).await.unwrap_err();
        assert!(matches!(error, Error::StorageIo { .. }));
    }

    #[test]
    fn test_location_for_sanitizes_slot_names() {
        let root = Path::new("/runs/1");

        assert_eq!(FsStorage::location_for(root, "Input/Raw"), root.join("Input_Raw"));
        assert_eq!(FsStorage::location_for(root, ".."), root.join("_"));
    }
}
