// # Storage Backend Trait
//
// Defines the interface for durably persisting downloaded publications.
//
// ## Implementations
//
// - Google Drive: `pubwatch-storage-gdrive` crate
//
// ## Session Handling
//
// Authentication is the backend's own business. A backend may perform a
// one-time interactive authorization while it is being constructed and
// cache a reusable credential on disk; the orchestrator never sees it.

use async_trait::async_trait;
use std::path::Path;

use crate::publication::RemoteFile;

/// Trait for remote storage implementations
///
/// Like monitors, storage backends convert their own failures into outcome
/// values: `None` for a failed upload, an empty list for a failed listing.
/// Both are logged by the backend before returning.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Upload a local file under `remote_name` into the configured folder
    ///
    /// # Returns
    ///
    /// - `Some(id)`: the backend's identifier for the new file
    /// - `None`: the upload did not happen
    async fn upload_file(&self, local_path: &Path, remote_name: &str) -> Option<String>;

    /// List the files already present in the configured folder
    ///
    /// Returns an empty list on failure.
    async fn list_files(&self) -> Vec<RemoteFile>;

    /// Get the backend name (for logging/debugging)
    fn backend_name(&self) -> &'static str;
}

/// Helper trait for constructing storage backends from configuration
///
/// Creation is async because backends typically establish their session
/// (token refresh, interactive authorization) up front.
#[async_trait]
pub trait StorageFactory: Send + Sync {
    /// Create a StorageBackend instance from configuration
    async fn create(
        &self,
        config: &crate::config::StorageConfig,
    ) -> Result<Box<dyn StorageBackend>, crate::Error>;
}
