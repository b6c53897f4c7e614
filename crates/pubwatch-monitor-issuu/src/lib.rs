// # Issuu Monitor
//
// Discovers new documents on Issuu publisher accounts and downloads them as
// PDF files.
//
// ## Discovery Rules
//
// - Each publisher's `lookback` most recent feed entries are inspected
// - A document is reported only when its publish day is strictly after
//   `min_date`
// - Entries without metadata are skipped
// - Any other error aborts that publisher only; the remaining publishers
//   are still checked
//
// ## Download
//
// The document URL is re-resolved at download time, so a record's `url` is
// all the monitor needs to fetch it again.

pub mod client;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use pubwatch_core::config::MonitorConfig;
use pubwatch_core::traits::{Monitor, MonitorFactory};
use pubwatch_core::{Error, IssuuSettings, ProviderRegistry, Publication, Result};
use std::path::Path;

pub use client::{DocumentData, HttpIssuuClient, IssuuApi};

/// Monitor for one or more Issuu publishers
pub struct IssuuMonitor {
    /// Publisher account names, checked in order
    publishers: Vec<String>,

    /// Publications must be strictly newer than this
    cutoff: NaiveDateTime,

    /// Feed entries inspected per publisher
    lookback: usize,

    api: Box<dyn IssuuApi>,
}

impl std::fmt::Debug for IssuuMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssuuMonitor")
            .field("publishers", &self.publishers)
            .field("cutoff", &self.cutoff)
            .field("lookback", &self.lookback)
            .finish_non_exhaustive()
    }
}

impl IssuuMonitor {
    /// Create a monitor backed by issuu.com
    pub fn new(settings: &IssuuSettings) -> Result<Self> {
        let api = HttpIssuuClient::new(
            settings.feed_url_template.clone(),
            settings.document_url_template.clone(),
        )?;

        Ok(Self::with_api(
            settings.publishers.clone(),
            settings.cutoff()?,
            settings.lookback,
            Box::new(api),
        ))
    }

    /// Create a monitor over any [`IssuuApi`]
    pub fn with_api(
        publishers: Vec<String>,
        cutoff: NaiveDateTime,
        lookback: usize,
        api: Box<dyn IssuuApi>,
    ) -> Self {
        Self {
            publishers,
            cutoff,
            lookback,
            api,
        }
    }

    async fn check_publisher(&self, publisher: &str) -> Result<Vec<Publication>> {
        let urls = self.api.list_documents(publisher, self.lookback).await?;
        tracing::debug!("{}: inspecting {} document(s)", publisher, urls.len());

        let mut found = Vec::new();
        for url in urls {
            let Some(data) = self.api.document_data(publisher, &url).await? else {
                tracing::debug!("{}: no metadata for {}, skipping", publisher, url);
                continue;
            };

            let date = publish_day(&data.original_publish_date)?;
            if date <= self.cutoff {
                continue;
            }

            found.push(Publication::new(
                data.title,
                publisher,
                url,
                date,
                data.publication_id,
                data.page_count,
            ));
        }

        Ok(found)
    }
}

/// The calendar day of an Issuu ISO timestamp, as midnight
///
/// Only the part before `T` is used.
pub fn publish_day(iso: &str) -> Result<NaiveDateTime> {
    let day = iso.split('T').next().unwrap_or_default();
    NaiveDate::parse_from_str(day, "%Y-%m-%d")
        .map(|d| d.and_time(NaiveTime::MIN))
        .map_err(|e| Error::monitor(format!("Invalid publish date '{}': {}", iso, e)))
}

#[async_trait]
impl Monitor for IssuuMonitor {
    async fn check_new_publications(&self) -> Vec<Publication> {
        let mut publications = Vec::new();

        for publisher in &self.publishers {
            match self.check_publisher(publisher).await {
                Ok(found) => {
                    if !found.is_empty() {
                        tracing::info!("{}: {} new publication(s)", publisher, found.len());
                    }
                    publications.extend(found);
                }
                Err(e) => {
                    tracing::error!("Error checking publications for {}: {}", publisher, e);
                }
            }
        }

        publications
    }

    async fn download_publication(&self, publication: &Publication, output_path: &Path) -> bool {
        let result: Result<()> = async {
            if let Some(parent) = output_path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            self.api
                .fetch_document(&publication.publisher, &publication.url, output_path)
                .await
        }
        .await;

        match result {
            Ok(()) => {
                tracing::debug!("Downloaded {} to {}", publication.title, output_path.display());
                true
            }
            Err(e) => {
                tracing::error!("Error downloading publication {}: {}", publication.title, e);
                false
            }
        }
    }

    fn monitor_name(&self) -> &'static str {
        "issuu"
    }
}

/// Factory for creating Issuu monitors
pub struct IssuuFactory;

impl MonitorFactory for IssuuFactory {
    fn create(&self, config: &MonitorConfig) -> Result<Box<dyn Monitor>> {
        match config {
            MonitorConfig::Issuu(settings) => {
                if settings.publishers.is_empty() {
                    tracing::warn!("Issuu monitor has no publishers configured");
                }
                Ok(Box::new(IssuuMonitor::new(settings)?))
            }
            _ => Err(Error::config("Invalid config for Issuu monitor")),
        }
    }
}

/// Register the Issuu monitor with a registry
///
/// # Example
///
/// ```rust
/// use pubwatch_core::ProviderRegistry;
///
/// let registry = ProviderRegistry::new();
/// pubwatch_monitor_issuu::register(&registry);
/// assert!(registry.has_monitor("issuu"));
/// ```
pub fn register(registry: &ProviderRegistry) {
    registry.register_monitor("issuu", Box::new(IssuuFactory));
}

#[cfg(test)]
mod tests {
    use super::*;
    use pubwatch_core::parse_date;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    /// In-memory Issuu with per-publisher feeds and per-URL metadata
    #[derive(Default)]
    struct FakeApi {
        feeds: HashMap<String, Vec<String>>,
        failing_feeds: Vec<String>,
        metadata: HashMap<String, DocumentData>,
        requested_limits: Arc<Mutex<Vec<usize>>>,
        fail_fetch: bool,
    }

    impl FakeApi {
        fn publish(&mut self, publisher: &str, slug: &str, title: &str, iso: &str) -> String {
            let url = format!("https://issuu.com/{}/docs/{}", publisher, slug);
            self.feeds
                .entry(publisher.to_string())
                .or_default()
                .push(url.clone());
            self.metadata.insert(
                url.clone(),
                DocumentData {
                    title: title.to_string(),
                    publication_id: format!("{}-{}", publisher, slug),
                    page_count: 24,
                    original_publish_date: iso.to_string(),
                    download_url: Some(format!("https://cdn.example/{}.pdf", slug)),
                },
            );
            url
        }
    }

    #[async_trait]
    impl IssuuApi for FakeApi {
        async fn list_documents(&self, publisher: &str, limit: usize) -> Result<Vec<String>> {
            self.requested_limits.lock().unwrap().push(limit);
            if self.failing_feeds.iter().any(|p| p == publisher) {
                return Err(Error::from_status("issuu", 503, "unavailable"));
            }
            Ok(self
                .feeds
                .get(publisher)
                .map(|urls| urls.iter().take(limit).cloned().collect())
                .unwrap_or_default())
        }

        async fn document_data(&self, _publisher: &str, url: &str) -> Result<Option<DocumentData>> {
            Ok(self.metadata.get(url).cloned())
        }

        async fn fetch_document(&self, _publisher: &str, _url: &str, path: &Path) -> Result<()> {
            if self.fail_fetch {
                return Err(Error::http("connection reset"));
            }
            tokio::fs::write(path, b"%PDF-1.4").await?;
            Ok(())
        }
    }

    fn monitor(publishers: &[&str], min_date: &str, api: FakeApi) -> IssuuMonitor {
        IssuuMonitor::with_api(
            publishers.iter().map(|p| p.to_string()).collect(),
            parse_date(min_date).unwrap(),
            10,
            Box::new(api),
        )
    }

    #[test]
    fn publish_day_truncates_time() {
        let day = publish_day("2024-05-01T23:59:59.000Z").unwrap();
        assert_eq!(day, parse_date("2024-05-01").unwrap());
        assert!(publish_day("").is_err());
        assert!(publish_day("May 1st").is_err());
    }

    #[tokio::test]
    async fn record_dated_at_cutoff_is_excluded() {
        let mut api = FakeApi::default();
        api.publish("acme", "same-day", "Same Day", "2024-05-01T10:00:00.000Z");
        api.publish("acme", "next-day", "Next Day", "2024-05-02T00:00:00.000Z");
        api.publish("acme", "before", "Before", "2024-04-30T12:00:00.000Z");

        let found = monitor(&["acme"], "2024-05-01", api)
            .check_new_publications()
            .await;

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].title, "Next Day");
        assert_eq!(found[0].publisher, "acme");
        assert_eq!(found[0].publication_id, "acme-next-day");
        assert_eq!(found[0].page_count, 24);
        assert_eq!(found[0].date_iso(), "2024-05-02T00:00:00");
        assert!(found[0].remote_id.is_none());
    }

    #[tokio::test]
    async fn failing_publisher_does_not_block_others() {
        let mut api = FakeApi::default();
        api.publish("broken", "a", "A", "2024-06-01T00:00:00.000Z");
        api.publish("acme", "b", "B", "2024-06-01T00:00:00.000Z");
        api.failing_feeds.push("broken".to_string());

        let found = monitor(&["broken", "acme"], "2024-01-01", api)
            .check_new_publications()
            .await;

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].publisher, "acme");
    }

    #[tokio::test]
    async fn unparseable_date_aborts_only_that_publisher() {
        let mut api = FakeApi::default();
        api.publish("acme", "good", "Good", "2024-06-01T00:00:00.000Z");
        api.publish("acme", "bad", "Bad", "");
        api.publish("acme", "later", "Later", "2024-06-03T00:00:00.000Z");
        api.publish("globex", "ok", "Ok", "2024-06-02T00:00:00.000Z");

        let found = monitor(&["acme", "globex"], "2024-01-01", api)
            .check_new_publications()
            .await;

        let titles: Vec<_> = found.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["Ok"]);
    }

    #[tokio::test]
    async fn entries_without_metadata_are_skipped() {
        let mut api = FakeApi::default();
        api.feeds
            .entry("acme".to_string())
            .or_default()
            .push("https://issuu.com/acme/docs/ghost".to_string());
        api.publish("acme", "real", "Real", "2024-06-01T00:00:00.000Z");

        let found = monitor(&["acme"], "2024-01-01", api)
            .check_new_publications()
            .await;

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].title, "Real");
    }

    #[tokio::test]
    async fn lookback_is_passed_to_the_feed() {
        let api = FakeApi::default();
        let limits = Arc::clone(&api.requested_limits);

        let monitor = IssuuMonitor::with_api(
            vec!["acme".to_string(), "globex".to_string()],
            parse_date("2024-01-01").unwrap(),
            3,
            Box::new(api),
        );
        monitor.check_new_publications().await;

        assert_eq!(*limits.lock().unwrap(), vec![3, 3]);
    }

    #[tokio::test]
    async fn download_creates_parent_directory() {
        let mut api = FakeApi::default();
        api.publish("acme", "doc", "Doc", "2024-06-01T00:00:00.000Z");
        let monitor = monitor(&["acme"], "2024-01-01", api);
        let publication = monitor.check_new_publications().await.remove(0);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("0-issuu").join(publication.local_file_name());

        assert!(monitor.download_publication(&publication, &path).await);
        assert!(path.exists());
    }

    #[tokio::test]
    async fn failed_download_returns_false() {
        let mut api = FakeApi::default();
        api.publish("acme", "doc", "Doc", "2024-06-01T00:00:00.000Z");
        api.fail_fetch = true;
        let monitor = monitor(&["acme"], "2024-01-01", api);
        let publication = monitor.check_new_publications().await.remove(0);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(publication.local_file_name());

        assert!(!monitor.download_publication(&publication, &path).await);
        assert!(!path.exists());
    }

    #[test]
    fn factory_creates_from_issuu_settings() {
        let config = MonitorConfig::Issuu(IssuuSettings::new(
            vec!["acme".to_string()],
            "2024-01-01",
        ));
        let monitor = IssuuFactory.create(&config).unwrap();
        assert_eq!(monitor.monitor_name(), "issuu");
    }

    #[test]
    fn factory_rejects_invalid_cutoff() {
        let config = MonitorConfig::Issuu(IssuuSettings::new(vec![], "not a date"));
        assert!(IssuuFactory.create(&config).is_err());
    }

    #[test]
    fn factory_rejects_other_config() {
        let config = MonitorConfig::Custom {
            factory: "other".to_string(),
            config: serde_json::Value::Null,
        };
        let err = IssuuFactory.create(&config).err().unwrap();
        assert!(err.is_config());
    }

    #[test]
    fn register_adds_issuu() {
        let registry = ProviderRegistry::new();
        register(&registry);
        assert!(registry.has_monitor("issuu"));
    }
}
