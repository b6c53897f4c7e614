// # Google Drive Storage Backend
//
// Uploads downloaded publications into one Drive folder and lists that
// folder's contents.
//
// ## Session
//
// The OAuth token is resolved once when the backend is created (see
// [`auth`]). A run is short enough that the token is not refreshed again.
//
// ## API Reference
//
// - Resumable upload: POST `/upload/drive/v3/files?uploadType=resumable`,
//   then PUT the file body to the returned session URI
// - List files: GET `/drive/v3/files?q='<folder>' in parents and trashed = false`
//
// ## Security Requirements
//
// - Access tokens and client secrets NEVER appear in logs

pub mod auth;

use async_trait::async_trait;
use pubwatch_core::config::StorageConfig;
use pubwatch_core::traits::{StorageBackend, StorageFactory};
use pubwatch_core::{Error, GoogleDriveSettings, ProviderRegistry, RemoteFile, Result};
use reqwest::header::{CONTENT_TYPE, LOCATION};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::auth::{Authenticator, ClientSecrets};

const UPLOAD_ENDPOINT: &str = "https://www.googleapis.com/upload/drive/v3/files";
const FILES_ENDPOINT: &str = "https://www.googleapis.com/drive/v3/files";

const PDF_MIME_TYPE: &str = "application/pdf";
const LIST_FIELDS: &str = "nextPageToken, files(id, name, createdTime)";
const LIST_PAGE_SIZE: &str = "100";

/// Default HTTP timeout for Drive requests; uploads may take longer
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);
const UPLOAD_TIMEOUT: Duration = Duration::from_secs(300);

const PROVIDER: &str = "google_drive";

#[derive(Deserialize)]
struct CreatedFile {
    id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileList {
    #[serde(default)]
    files: Vec<RemoteFile>,
    #[serde(default)]
    next_page_token: Option<String>,
}

/// Google Drive folder backend
pub struct GoogleDriveStorage {
    client: reqwest::Client,

    /// Destination folder ID
    folder_id: String,

    /// OAuth access token
    /// ⚠️ NEVER log this value
    access_token: String,
}

impl std::fmt::Debug for GoogleDriveStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleDriveStorage")
            .field("folder_id", &self.folder_id)
            .field("access_token", &"<REDACTED>")
            .finish()
    }
}

impl GoogleDriveStorage {
    /// Authenticate and create a backend for the configured folder
    ///
    /// May block on an interactive authorization if no usable token is
    /// cached.
    pub async fn connect(settings: &GoogleDriveSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        let secrets = ClientSecrets::load(&settings.credentials_path).await?;
        let authenticator = Authenticator::new(client.clone(), secrets, settings.token_path());
        let token = authenticator.access_token().await?;

        Ok(Self::with_token(
            client,
            settings.folder_id.clone(),
            token.access_token,
        ))
    }

    /// Create a backend from an already obtained access token
    pub fn with_token(
        client: reqwest::Client,
        folder_id: impl Into<String>,
        access_token: impl Into<String>,
    ) -> Self {
        Self {
            client,
            folder_id: folder_id.into(),
            access_token: access_token.into(),
        }
    }

    async fn try_upload(&self, local_path: &Path, remote_name: &str) -> Result<String> {
        let body = tokio::fs::read(local_path).await?;
        let metadata = serde_json::json!({
            "name": remote_name,
            "parents": [self.folder_id],
            "mimeType": PDF_MIME_TYPE,
        });

        // Step 1: open an upload session
        let response = self
            .client
            .post(UPLOAD_ENDPOINT)
            .query(&[("uploadType", "resumable"), ("fields", "id")])
            .bearer_auth(&self.access_token)
            .header("X-Upload-Content-Type", PDF_MIME_TYPE)
            .header("X-Upload-Content-Length", body.len())
            .json(&metadata)
            .send()
            .await
            .map_err(|e| Error::http(format!("Upload session request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::from_status(PROVIDER, status.as_u16(), &text));
        }

        let session_uri = response
            .headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| Error::provider(PROVIDER, "Upload session has no Location header"))?
            .to_string();

        // Step 2: send the file body in one request
        let response = self
            .client
            .put(&session_uri)
            .timeout(UPLOAD_TIMEOUT)
            .header(CONTENT_TYPE, PDF_MIME_TYPE)
            .body(body)
            .send()
            .await
            .map_err(|e| Error::http(format!("Upload of {} failed: {}", remote_name, e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::from_status(PROVIDER, status.as_u16(), &text));
        }

        let created: CreatedFile = response
            .json()
            .await
            .map_err(|e| Error::provider(PROVIDER, format!("Invalid upload response: {}", e)))?;

        Ok(created.id)
    }

    async fn try_list(&self) -> Result<Vec<RemoteFile>> {
        let query = folder_query(&self.folder_id);
        let mut files = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut params = vec![
                ("q", query.as_str()),
                ("fields", LIST_FIELDS),
                ("pageSize", LIST_PAGE_SIZE),
            ];
            if let Some(token) = page_token.as_deref() {
                params.push(("pageToken", token));
            }

            let response = self
                .client
                .get(FILES_ENDPOINT)
                .query(&params)
                .bearer_auth(&self.access_token)
                .send()
                .await
                .map_err(|e| Error::http(format!("List request failed: {}", e)))?;

            let status = response.status();
            if !status.is_success() {
                let text = response.text().await.unwrap_or_default();
                return Err(Error::from_status(PROVIDER, status.as_u16(), &text));
            }

            let page: FileList = response
                .json()
                .await
                .map_err(|e| Error::provider(PROVIDER, format!("Invalid list response: {}", e)))?;

            files.extend(page.files);
            match page.next_page_token {
                Some(next) => page_token = Some(next),
                None => break,
            }
        }

        Ok(files)
    }
}

/// Drive search query for the non-trashed children of `folder_id`
fn folder_query(folder_id: &str) -> String {
    let escaped = folder_id.replace('\\', "\\\\").replace('\'', "\\'");
    format!("'{}' in parents and trashed = false", escaped)
}

#[async_trait]
impl StorageBackend for GoogleDriveStorage {
    async fn upload_file(&self, local_path: &Path, remote_name: &str) -> Option<String> {
        match self.try_upload(local_path, remote_name).await {
            Ok(id) => {
                tracing::debug!("Uploaded {} as Drive file {}", remote_name, id);
                Some(id)
            }
            Err(e) => {
                tracing::error!("Error uploading file to Google Drive: {}", e);
                None
            }
        }
    }

    async fn list_files(&self) -> Vec<RemoteFile> {
        match self.try_list().await {
            Ok(files) => files,
            Err(e) => {
                tracing::error!("Error listing files from Google Drive: {}", e);
                Vec::new()
            }
        }
    }

    fn backend_name(&self) -> &'static str {
        "google_drive"
    }
}

/// Factory for creating Google Drive backends
pub struct GoogleDriveFactory;

#[async_trait]
impl StorageFactory for GoogleDriveFactory {
    async fn create(&self, config: &StorageConfig) -> Result<Box<dyn StorageBackend>> {
        match config {
            StorageConfig::GoogleDrive(settings) => {
                Ok(Box::new(GoogleDriveStorage::connect(settings).await?))
            }
            _ => Err(Error::config("Invalid config for Google Drive storage")),
        }
    }
}

/// Register the Google Drive backend with a registry
///
/// # Example
///
/// ```rust
/// use pubwatch_core::ProviderRegistry;
///
/// let registry = ProviderRegistry::new();
/// pubwatch_storage_gdrive::register(&registry);
/// assert!(registry.has_storage("google_drive"));
/// ```
pub fn register(registry: &ProviderRegistry) {
    registry.register_storage("google_drive", Box::new(GoogleDriveFactory));
}
