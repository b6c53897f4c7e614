//! Run orchestration
//!
//! The Orchestrator drives exactly one discovery → download → upload →
//! notify cycle:
//!
//! ```text
//! ┌───────────┐  ┌───────────┐
//! │ Monitor 0 │  │ Monitor 1 │ ... check_new_publications()
//! └─────┬─────┘  └─────┬─────┘
//!       └──────┬───────┘
//!              ▼
//!      ┌──────────────┐   download_publication() via owning monitor
//!      │ Orchestrator │── upload_file() ──▶ StorageBackend
//!      └──────┬───────┘
//!             ▼
//!   Notifier::notify(successes)
//! ```
//!
//! ## Failure Containment
//!
//! - A failed download or upload drops that item and the loop continues
//! - A failed notifier does not stop the others
//! - Only unexpected errors (e.g. the temporary directory cannot be
//!   created) are returned from [`Orchestrator::run`]

use crate::config::RunConfig;
use crate::error::{Error, Result};
use crate::publication::Publication;
use crate::registry::Components;
use crate::traits::{Monitor, Notifier, StorageBackend};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, error, info, warn};

/// Index of a monitor within the run's active monitor list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MonitorId(pub usize);

/// A discovered publication tagged with the monitor that produced it
#[derive(Debug, Clone)]
struct Discovered {
    owner: MonitorId,
    publication: Publication,
}

/// Stage at which an item was dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStage {
    /// The owning monitor could not download the item
    Download,
    /// The storage backend did not return an identifier
    Upload,
}

/// A publication that did not make it into the success set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemFailure {
    /// The publication as discovered
    pub publication: Publication,
    /// Where it failed
    pub stage: FailureStage,
}

/// Delivery result for one notifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationOutcome {
    /// Notifier name
    pub notifier: &'static str,
    /// Whether the notifier reported success
    pub delivered: bool,
}

/// Summary of one run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Number of publications returned by discovery
    pub discovered: usize,

    /// Publications that were downloaded and uploaded, with `remote_id` set
    pub uploaded: Vec<Publication>,

    /// Publications dropped during download or upload
    pub failures: Vec<ItemFailure>,

    /// Publications skipped because they already exist in storage
    pub skipped: usize,

    /// One entry per notifier invoked
    pub notifications: Vec<NotificationOutcome>,
}

impl RunReport {
    /// Whether every discovered item was uploaded and every notifier delivered
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.notifications.iter().all(|n| n.delivered)
    }
}

/// Drives one end-to-end pipeline cycle
///
/// ## Lifecycle
///
/// 1. Create with [`Orchestrator::new()`] or [`Orchestrator::from_components()`]
/// 2. Call [`Orchestrator::run()`] once per process invocation
///
/// ## Threading
///
/// Every collaborator call is awaited before the next one starts; there is
/// no overlap between discovery, downloads, uploads and notifications.
pub struct Orchestrator {
    /// Active monitors, indexed by [`MonitorId`]
    monitors: Vec<Box<dyn Monitor>>,

    /// Destination for downloaded files
    storage: Option<Box<dyn StorageBackend>>,

    /// Channels receiving the success summary
    notifiers: Vec<Box<dyn Notifier>>,

    /// Run behaviour
    settings: RunConfig,
}

impl Orchestrator {
    /// Create a new orchestrator
    ///
    /// # Errors
    ///
    /// Returns a configuration error if monitors are supplied without a
    /// storage backend, unless the run is a dry run.
    pub fn new(
        monitors: Vec<Box<dyn Monitor>>,
        storage: Option<Box<dyn StorageBackend>>,
        notifiers: Vec<Box<dyn Notifier>>,
        settings: RunConfig,
    ) -> Result<Self> {
        if !monitors.is_empty() && storage.is_none() && !settings.dry_run {
            return Err(Error::config(
                "Monitors are active but no storage backend is available",
            ));
        }

        Ok(Self {
            monitors,
            storage,
            notifiers,
            settings,
        })
    }

    /// Create an orchestrator from registry-built components
    pub fn from_components(components: Components, settings: RunConfig) -> Result<Self> {
        Self::new(
            components.monitors,
            components.storage,
            components.notifiers,
            settings,
        )
    }

    /// Run one cycle
    ///
    /// # Returns
    ///
    /// - `Ok(RunReport)`: The cycle completed (individual items or notifiers
    ///   may still have failed; see the report)
    /// - `Err(Error)`: An unexpected error aborted the cycle; logging it is
    ///   left to the caller
    pub async fn run(&self) -> Result<RunReport> {
        let mut report = RunReport::default();

        if self.monitors.is_empty() {
            info!("No active monitors, nothing to do");
            return Ok(report);
        }

        let discovered = self.discover().await;
        report.discovered = discovered.len();

        if discovered.is_empty() {
            info!("No new publications found");
            return Ok(report);
        }

        info!("Found {} new publications", discovered.len());

        if self.settings.dry_run {
            for item in &discovered {
                info!(
                    "[DRY-RUN] Would download '{}' via {} and upload as '{}'",
                    item.publication.title,
                    self.monitor(item.owner).monitor_name(),
                    item.publication.remote_name()
                );
            }
            return Ok(report);
        }

        let storage = self.storage.as_deref().ok_or_else(|| {
            Error::config("Monitors are active but no storage backend is available")
        })?;

        let pending = self
            .filter_existing(storage, discovered, &mut report)
            .await;

        if pending.is_empty() {
            info!("All new publications already exist in storage");
            return Ok(report);
        }

        // Released when this guard drops, on every exit path below
        let workdir = self.create_workdir()?;
        debug!("Working directory: {}", workdir.path().display());

        for item in pending {
            self.process_item(storage, workdir.path(), item, &mut report)
                .await;
        }

        drop(workdir);

        if report.uploaded.is_empty() {
            warn!("No publications were uploaded, skipping notifications");
        } else {
            report.notifications = self.notify_all(&report.uploaded).await;
        }

        info!(
            "Run complete: {} discovered, {} uploaded, {} failed, {} skipped",
            report.discovered,
            report.uploaded.len(),
            report.failures.len(),
            report.skipped
        );

        Ok(report)
    }

    /// Gather publications from every monitor, in monitor order
    async fn discover(&self) -> Vec<Discovered> {
        let mut discovered = Vec::new();

        for (index, monitor) in self.monitors.iter().enumerate() {
            let owner = MonitorId(index);
            let publications = monitor.check_new_publications().await;
            debug!(
                "Monitor {} ({}) reported {} publication(s)",
                index,
                monitor.monitor_name(),
                publications.len()
            );

            discovered.extend(
                publications
                    .into_iter()
                    .map(|publication| Discovered { owner, publication }),
            );
        }

        discovered
    }

    /// Drop publications whose remote name already exists (if enabled)
    async fn filter_existing(
        &self,
        storage: &dyn StorageBackend,
        discovered: Vec<Discovered>,
        report: &mut RunReport,
    ) -> Vec<Discovered> {
        if !self.settings.skip_existing {
            return discovered;
        }

        let existing: HashSet<String> = storage
            .list_files()
            .await
            .into_iter()
            .map(|file| file.name)
            .collect();

        let mut pending = Vec::with_capacity(discovered.len());
        for item in discovered {
            if existing.contains(&item.publication.remote_name()) {
                info!(
                    "Skipping {}: already present in {}",
                    item.publication.title,
                    storage.backend_name()
                );
                report.skipped += 1;
            } else {
                pending.push(item);
            }
        }
        pending
    }

    /// Download then upload one publication, recording the outcome
    async fn process_item(
        &self,
        storage: &dyn StorageBackend,
        workdir: &Path,
        item: Discovered,
        report: &mut RunReport,
    ) {
        let Discovered {
            owner,
            mut publication,
        } = item;
        let monitor = self.monitor(owner);
        let local_path = Self::local_path(workdir, owner, monitor, &publication);

        if !monitor.download_publication(&publication, &local_path).await {
            error!("Failed to download {}", publication.title);
            report.failures.push(ItemFailure {
                publication,
                stage: FailureStage::Download,
            });
            return;
        }

        match storage
            .upload_file(&local_path, &publication.remote_name())
            .await
        {
            Some(remote_id) => {
                info!("Uploaded {} ({})", publication.title, remote_id);
                publication.remote_id = Some(remote_id);
                report.uploaded.push(publication);
            }
            None => {
                error!("Failed to upload {} to storage", publication.title);
                report.failures.push(ItemFailure {
                    publication,
                    stage: FailureStage::Upload,
                });
            }
        }
    }

    /// Send the success set to every notifier; each failure is independent
    async fn notify_all(&self, uploaded: &[Publication]) -> Vec<NotificationOutcome> {
        let mut outcomes = Vec::with_capacity(self.notifiers.len());

        for notifier in &self.notifiers {
            let delivered = notifier.notify(uploaded).await;
            if delivered {
                info!("Notification sent via {}", notifier.notifier_name());
            } else {
                warn!("Notifier {} failed", notifier.notifier_name());
            }
            outcomes.push(NotificationOutcome {
                notifier: notifier.notifier_name(),
                delivered,
            });
        }

        outcomes
    }

    /// Run-scoped directory under `workdir_root`, or the system temp dir
    fn create_workdir(&self) -> Result<TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("pubwatch-");

        let workdir = match &self.settings.workdir_root {
            Some(root) => builder.tempdir_in(root)?,
            None => builder.tempdir()?,
        };
        Ok(workdir)
    }

    fn monitor(&self, id: MonitorId) -> &dyn Monitor {
        // Ids are only minted by `discover` from this same list
        self.monitors[id.0].as_ref()
    }

    /// `{workdir}/{index}-{monitor}/{publication_id}.pdf`
    ///
    /// The per-monitor subdirectory keeps ids from different sources apart.
    fn local_path(
        workdir: &Path,
        owner: MonitorId,
        monitor: &dyn Monitor,
        publication: &Publication,
    ) -> PathBuf {
        workdir
            .join(format!("{}-{}", owner.0, monitor.monitor_name()))
            .join(publication.local_file_name())
    }
}
