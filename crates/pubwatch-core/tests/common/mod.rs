//! Test doubles and common utilities for orchestrator contract tests
//!
//! Every double records what it was asked to do through a cloneable probe,
//! so a test can hand the double to the orchestrator and still inspect the
//! calls afterwards.

#![allow(dead_code)]

use async_trait::async_trait;
use pubwatch_core::config::{MonitorConfig, NotifierConfig, StorageConfig};
use pubwatch_core::traits::{MonitorFactory, NotifierFactory, StorageFactory};
use pubwatch_core::{Monitor, Notifier, Publication, RemoteFile, StorageBackend, parse_date};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};

static INIT: Once = Once::new();

/// Install a test subscriber once so failures show the pipeline's logs
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// Build a publication dated `date` (YYYY-MM-DD)
pub fn publication(title: &str, publisher: &str, publication_id: &str, date: &str) -> Publication {
    Publication::new(
        title,
        publisher,
        format!("https://issuu.com/{}/docs/{}", publisher, publication_id),
        parse_date(date).expect("valid test date"),
        publication_id,
        12,
    )
}

/// One recorded download request
#[derive(Debug, Clone)]
pub struct DownloadCall {
    pub title: String,
    pub publication_id: String,
    pub path: PathBuf,
}

/// Shared view of a [`ScriptedMonitor`]'s calls
#[derive(Clone, Default)]
pub struct MonitorProbe {
    check_calls: Arc<AtomicUsize>,
    downloads: Arc<Mutex<Vec<DownloadCall>>>,
}

impl MonitorProbe {
    /// Number of times check_new_publications() was called
    pub fn check_calls(&self) -> usize {
        self.check_calls.load(Ordering::SeqCst)
    }

    /// Every download request, in order
    pub fn downloads(&self) -> Vec<DownloadCall> {
        self.downloads.lock().unwrap().clone()
    }

    /// Titles of the downloaded publications, in order
    pub fn downloaded_titles(&self) -> Vec<String> {
        self.downloads().into_iter().map(|d| d.title).collect()
    }
}

/// A monitor that returns a fixed list and "downloads" by writing a file
pub struct ScriptedMonitor {
    name: &'static str,
    publications: Vec<Publication>,
    failing_downloads: HashSet<String>,
    probe: MonitorProbe,
}

impl ScriptedMonitor {
    pub fn new(name: &'static str, publications: Vec<Publication>) -> Self {
        Self {
            name,
            publications,
            failing_downloads: HashSet::new(),
            probe: MonitorProbe::default(),
        }
    }

    /// Make downloads of the given publication id fail
    pub fn failing_download(mut self, publication_id: &str) -> Self {
        self.failing_downloads.insert(publication_id.to_string());
        self
    }

    pub fn probe(&self) -> MonitorProbe {
        self.probe.clone()
    }
}

#[async_trait]
impl Monitor for ScriptedMonitor {
    async fn check_new_publications(&self) -> Vec<Publication> {
        self.probe.check_calls.fetch_add(1, Ordering::SeqCst);
        self.publications.clone()
    }

    async fn download_publication(&self, publication: &Publication, output_path: &Path) -> bool {
        self.probe.downloads.lock().unwrap().push(DownloadCall {
            title: publication.title.clone(),
            publication_id: publication.publication_id.clone(),
            path: output_path.to_path_buf(),
        });

        if self.failing_downloads.contains(&publication.publication_id) {
            return false;
        }

        if let Some(parent) = output_path.parent() {
            if tokio::fs::create_dir_all(parent).await.is_err() {
                return false;
            }
        }

        tokio::fs::write(output_path, b"%PDF-1.4 test").await.is_ok()
    }

    fn monitor_name(&self) -> &'static str {
        self.name
    }
}

/// One recorded upload request
#[derive(Debug, Clone)]
pub struct UploadCall {
    pub local_path: PathBuf,
    pub remote_name: String,
    /// Whether the local file existed when the upload was requested
    pub file_present: bool,
}

/// Shared view of a [`RecordingStorage`]'s calls
#[derive(Clone, Default)]
pub struct StorageProbe {
    uploads: Arc<Mutex<Vec<UploadCall>>>,
    list_calls: Arc<AtomicUsize>,
}

impl StorageProbe {
    pub fn uploads(&self) -> Vec<UploadCall> {
        self.uploads.lock().unwrap().clone()
    }

    pub fn upload_count(&self) -> usize {
        self.uploads.lock().unwrap().len()
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }
}

/// A storage backend that records uploads and can be told to fail some
pub struct RecordingStorage {
    failing_calls: HashSet<usize>,
    existing: Vec<RemoteFile>,
    probe: StorageProbe,
}

impl RecordingStorage {
    pub fn new() -> Self {
        Self {
            failing_calls: HashSet::new(),
            existing: Vec::new(),
            probe: StorageProbe::default(),
        }
    }

    /// Make the n-th upload call (1-based) fail
    pub fn failing_call(mut self, call: usize) -> Self {
        self.failing_calls.insert(call);
        self
    }

    /// Files reported by list_files()
    pub fn with_existing(mut self, names: &[&str]) -> Self {
        self.existing = names
            .iter()
            .enumerate()
            .map(|(i, name)| RemoteFile {
                id: format!("existing-{}", i),
                name: name.to_string(),
                created_time: None,
            })
            .collect();
        self
    }

    pub fn probe(&self) -> StorageProbe {
        self.probe.clone()
    }
}

#[async_trait]
impl StorageBackend for RecordingStorage {
    async fn upload_file(&self, local_path: &Path, remote_name: &str) -> Option<String> {
        let call = {
            let mut uploads = self.probe.uploads.lock().unwrap();
            uploads.push(UploadCall {
                local_path: local_path.to_path_buf(),
                remote_name: remote_name.to_string(),
                file_present: local_path.exists(),
            });
            uploads.len()
        };

        if self.failing_calls.contains(&call) {
            None
        } else {
            Some(format!("remote-{}", call))
        }
    }

    async fn list_files(&self) -> Vec<RemoteFile> {
        self.probe.list_calls.fetch_add(1, Ordering::SeqCst);
        self.existing.clone()
    }

    fn backend_name(&self) -> &'static str {
        "recording"
    }
}

/// Shared view of a [`RecordingNotifier`]'s calls
#[derive(Clone, Default)]
pub struct NotifierProbe {
    calls: Arc<Mutex<Vec<Vec<Publication>>>>,
}

impl NotifierProbe {
    /// The publication lists passed to notify(), one entry per call
    pub fn calls(&self) -> Vec<Vec<Publication>> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

/// A notifier that records each summary and reports a fixed result
pub struct RecordingNotifier {
    name: &'static str,
    succeed: bool,
    probe: NotifierProbe,
}

impl RecordingNotifier {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            succeed: true,
            probe: NotifierProbe::default(),
        }
    }

    pub fn failing(name: &'static str) -> Self {
        Self {
            succeed: false,
            ..Self::new(name)
        }
    }

    pub fn probe(&self) -> NotifierProbe {
        self.probe.clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, publications: &[Publication]) -> bool {
        if publications.is_empty() {
            return true;
        }
        self.probe.calls.lock().unwrap().push(publications.to_vec());
        self.succeed
    }

    fn notifier_name(&self) -> &'static str {
        self.name
    }
}

/// Factory handing out [`ScriptedMonitor`]s that share one probe
pub struct ScriptedMonitorFactory {
    pub publications: Vec<Publication>,
    pub probe: MonitorProbe,
    pub created: Arc<AtomicUsize>,
}

impl MonitorFactory for ScriptedMonitorFactory {
    fn create(&self, _config: &MonitorConfig) -> pubwatch_core::Result<Box<dyn Monitor>> {
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedMonitor {
            name: "scripted",
            publications: self.publications.clone(),
            failing_downloads: HashSet::new(),
            probe: self.probe.clone(),
        }))
    }
}

/// Factory handing out [`RecordingStorage`]s that share one probe
pub struct RecordingStorageFactory {
    pub probe: StorageProbe,
    pub created: Arc<AtomicUsize>,
}

#[async_trait]
impl StorageFactory for RecordingStorageFactory {
    async fn create(
        &self,
        _config: &StorageConfig,
    ) -> pubwatch_core::Result<Box<dyn StorageBackend>> {
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(RecordingStorage {
            failing_calls: HashSet::new(),
            existing: Vec::new(),
            probe: self.probe.clone(),
        }))
    }
}

/// Factory handing out [`RecordingNotifier`]s that share one probe
pub struct RecordingNotifierFactory {
    pub probe: NotifierProbe,
    pub created: Arc<AtomicUsize>,
}

impl NotifierFactory for RecordingNotifierFactory {
    fn create(&self, _config: &NotifierConfig) -> pubwatch_core::Result<Box<dyn Notifier>> {
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(RecordingNotifier {
            name: "recording",
            succeed: true,
            probe: self.probe.clone(),
        }))
    }
}
