// # Monitor Trait
//
// Defines the interface for discovering and fetching publications from one
// source type.
//
// ## Implementations
//
// - Issuu feed monitor: `pubwatch-monitor-issuu` crate
//
// ## Usage
//
// ```rust,ignore
// use pubwatch_core::Monitor;
//
// let monitor = /* Monitor implementation */;
//
// for publication in monitor.check_new_publications().await {
//     let path = workdir.join(publication.local_file_name());
//     if monitor.download_publication(&publication, &path).await {
//         println!("downloaded {}", publication.title);
//     }
// }
// ```

use async_trait::async_trait;
use std::path::Path;

use crate::publication::Publication;

/// Trait for publication source implementations
///
/// # Failure Containment
///
/// Monitors never fail a whole call for an ordinary fetch problem:
///
/// - `check_new_publications` catches and logs per-publisher failures and
///   returns whatever the remaining publishers produced.
/// - `download_publication` logs the failure (with the publication title)
///   and returns `false`.
///
/// ## Forbidden Capabilities
/// - ❌ Retry or back off (a failed item is simply rediscovered next run)
/// - ❌ Upload or notify (owned by the `Orchestrator`)
/// - ❌ Download records produced by a different monitor
#[async_trait]
pub trait Monitor: Send + Sync {
    /// Discover publications newer than this monitor's cutoff
    ///
    /// Results keep the monitor's internal order (publisher order, then the
    /// order the source lists items in).
    async fn check_new_publications(&self) -> Vec<Publication>;

    /// Download a publication this monitor produced into `output_path`
    ///
    /// The parent directory of `output_path` is created if needed.
    ///
    /// # Returns
    ///
    /// `true` if the file was written, `false` on any failure
    async fn download_publication(&self, publication: &Publication, output_path: &Path) -> bool;

    /// Get the monitor name (for logging/debugging)
    fn monitor_name(&self) -> &'static str;
}

/// Helper trait for constructing monitors from configuration
pub trait MonitorFactory: Send + Sync {
    /// Create a Monitor instance from configuration
    fn create(
        &self,
        config: &crate::config::MonitorConfig,
    ) -> Result<Box<dyn Monitor>, crate::Error>;
}
