// # Issuu HTTP Access
//
// Everything that talks to issuu.com lives behind the `IssuuApi` trait so the
// monitor's discovery rules can be exercised without a network.
//
// ## Endpoints
//
// - Publisher feed: `https://issuu.com/{publisher}/rss` (RSS/Atom, most
//   recent first)
// - Document metadata: `https://issuu.com/call/backend-reader3/dynamic/{publisher}/{document}`
//   where `{document}` is the last path segment of the document URL
//
// Both templates can be overridden from configuration.

use async_trait::async_trait;
use pubwatch_core::{Error, Result};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;

/// Default publisher feed template
pub const DEFAULT_FEED_URL_TEMPLATE: &str = "https://issuu.com/{publisher}/rss";

/// Default document metadata template
pub const DEFAULT_DOCUMENT_URL_TEMPLATE: &str =
    "https://issuu.com/call/backend-reader3/dynamic/{publisher}/{document}";

/// Default HTTP timeout for Issuu requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

const PROVIDER: &str = "issuu";

/// Metadata for one Issuu document
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DocumentData {
    /// Display title
    pub title: String,

    /// Issuu's publication identifier
    #[serde(alias = "publicationId", deserialize_with = "string_or_number")]
    pub publication_id: String,

    /// Number of pages
    #[serde(default, alias = "pageCount")]
    pub page_count: u32,

    /// Original publish timestamp, e.g. `2024-05-01T08:30:00.000Z`
    #[serde(default, rename = "originalPublishDateInISOString")]
    pub original_publish_date: String,

    /// Direct PDF location, when the document allows downloads
    #[serde(default, alias = "downloadUrl")]
    pub download_url: Option<String>,
}

fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, got {}",
            other
        ))),
    }
}

/// Access to Issuu feeds, metadata and files
#[async_trait]
pub trait IssuuApi: Send + Sync {
    /// URLs of the publisher's most recent documents, newest first, at most `limit`
    async fn list_documents(&self, publisher: &str, limit: usize) -> Result<Vec<String>>;

    /// Metadata for one document, or `None` if Issuu has none for it
    async fn document_data(&self, publisher: &str, url: &str) -> Result<Option<DocumentData>>;

    /// Fetch the document's PDF into `output_path`
    async fn fetch_document(&self, publisher: &str, url: &str, output_path: &Path) -> Result<()>;
}

/// reqwest-backed [`IssuuApi`]
#[derive(Debug, Clone)]
pub struct HttpIssuuClient {
    client: reqwest::Client,
    feed_url_template: String,
    document_url_template: String,
}

impl HttpIssuuClient {
    /// Create a client, falling back to the default templates
    pub fn new(
        feed_url_template: Option<String>,
        document_url_template: Option<String>,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .user_agent(concat!("pubwatch/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            feed_url_template: feed_url_template
                .unwrap_or_else(|| DEFAULT_FEED_URL_TEMPLATE.to_string()),
            document_url_template: document_url_template
                .unwrap_or_else(|| DEFAULT_DOCUMENT_URL_TEMPLATE.to_string()),
        })
    }

    fn feed_url(&self, publisher: &str) -> String {
        self.feed_url_template.replace("{publisher}", publisher)
    }

    fn document_url(&self, publisher: &str, url: &str) -> Result<String> {
        let document = document_slug(url)?;
        Ok(self
            .document_url_template
            .replace("{publisher}", publisher)
            .replace("{document}", &document))
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response> {
        self.client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::http(format!("Request to {} failed: {}", url, e)))
    }
}

#[async_trait]
impl IssuuApi for HttpIssuuClient {
    async fn list_documents(&self, publisher: &str, limit: usize) -> Result<Vec<String>> {
        let url = self.feed_url(publisher);
        tracing::debug!("Fetching feed for {}: {}", publisher, url);

        let response = self.get(&url).await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::from_status(PROVIDER, status.as_u16(), &body));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::http(format!("Failed to read feed body: {}", e)))?;

        feed_links(&bytes, limit)
    }

    async fn document_data(&self, publisher: &str, url: &str) -> Result<Option<DocumentData>> {
        let endpoint = self.document_url(publisher, url)?;

        let response = self.get(&endpoint).await?;
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            tracing::debug!("No metadata for {}", url);
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::from_status(PROVIDER, status.as_u16(), &body));
        }

        let json: Value = response
            .json()
            .await
            .map_err(|e| Error::provider(PROVIDER, format!("Failed to parse metadata: {}", e)))?;

        parse_document_data(json)
    }

    async fn fetch_document(&self, publisher: &str, url: &str, output_path: &Path) -> Result<()> {
        let data = self
            .document_data(publisher, url)
            .await?
            .ok_or_else(|| Error::not_found(format!("No metadata for {}", url)))?;

        let download_url = data.download_url.ok_or_else(|| {
            Error::provider(PROVIDER, format!("'{}' is not available for download", data.title))
        })?;

        let mut response = self.get(&download_url).await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::from_status(PROVIDER, status.as_u16(), &body));
        }

        let mut file = tokio::fs::File::create(output_path).await?;
        let mut written = 0usize;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| Error::http(format!("Download of {} interrupted: {}", url, e)))?
        {
            file.write_all(&chunk).await?;
            written += chunk.len();
        }
        file.flush().await?;

        tracing::debug!("Wrote {} bytes to {}", written, output_path.display());
        Ok(())
    }
}

/// Extract up to `limit` entry links from an RSS/Atom document
pub fn feed_links(bytes: &[u8], limit: usize) -> Result<Vec<String>> {
    let feed = feed_rs::parser::parse(bytes)
        .map_err(|e| Error::provider(PROVIDER, format!("Failed to parse feed: {}", e)))?;

    Ok(feed
        .entries
        .into_iter()
        .filter_map(|entry| entry.links.first().map(|l| l.href.clone()))
        .take(limit)
        .collect())
}

/// Parse a metadata response, which may wrap the fields in `metadata`
pub fn parse_document_data(json: Value) -> Result<Option<DocumentData>> {
    let fields = match json {
        Value::Null => return Ok(None),
        Value::Object(mut map) => match map.remove("metadata") {
            Some(Value::Null) => return Ok(None),
            Some(inner @ Value::Object(_)) => inner,
            Some(_) | None => Value::Object(map),
        },
        other => {
            return Err(Error::provider(
                PROVIDER,
                format!("Unexpected metadata shape: {}", other),
            ));
        }
    };

    serde_json::from_value(fields)
        .map(Some)
        .map_err(|e| Error::provider(PROVIDER, format!("Incomplete metadata: {}", e)))
}

/// Last non-empty path segment of a document URL
fn document_slug(url: &str) -> Result<String> {
    let parsed = url::Url::parse(url)
        .map_err(|e| Error::invalid_input(format!("Invalid document URL '{}': {}", url, e)))?;

    parsed
        .path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).next_back())
        .map(str::to_string)
        .ok_or_else(|| Error::invalid_input(format!("Document URL has no path: {}", url)))
}
