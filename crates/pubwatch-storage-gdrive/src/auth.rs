//! OAuth 2.0 for installed applications
//!
//! Obtains a Drive access token for the `drive.file` scope:
//!
//! 1. Reuse the cached token if it is valid for at least another minute
//! 2. Otherwise refresh it with the cached refresh token
//! 3. Otherwise run the loopback flow: log the consent URL, wait on
//!    `127.0.0.1:<ephemeral port>` for the redirect carrying our `state`
//!    and exchange the code
//!
//! A new or refreshed token is written back to the cache atomically.

use chrono::{DateTime, Duration, Utc};
use pubwatch_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::time::timeout;

/// Scope limited to files created by this application
pub const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive.file";

const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Tokens closer than this many seconds to expiry are refreshed
const EXPIRY_MARGIN_SECS: i64 = 60;

/// How long a loopback connection may stay silent before it is dropped
const REDIRECT_READ_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);

const PROVIDER: &str = "google_drive";

#[derive(Deserialize)]
struct ClientSecretsFile {
    installed: Option<ClientSecrets>,
    web: Option<ClientSecrets>,
}

/// OAuth client credentials from the Google Cloud console
#[derive(Clone, Deserialize)]
pub struct ClientSecrets {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_auth_uri() -> String {
    DEFAULT_AUTH_URI.to_string()
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl std::fmt::Debug for ClientSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSecrets")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<REDACTED>")
            .field("auth_uri", &self.auth_uri)
            .field("token_uri", &self.token_uri)
            .finish()
    }
}

impl ClientSecrets {
    /// Parse a client secrets document (`installed` or `web` application)
    pub fn from_json(content: &str) -> Result<Self> {
        let file: ClientSecretsFile = serde_json::from_str(content)
            .map_err(|e| Error::config(format!("Invalid client secrets: {}", e)))?;

        file.installed.or(file.web).ok_or_else(|| {
            Error::config("Client secrets must contain an 'installed' or 'web' section")
        })
    }

    /// Read and parse a client secrets file
    pub async fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).await.map_err(|e| {
            Error::config(format!(
                "Failed to read credentials file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_json(&content)
    }
}

/// Cached OAuth token
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredToken {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

impl std::fmt::Debug for StoredToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredToken")
            .field("access_token", &"<REDACTED>")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "<REDACTED>"),
            )
            .field("expires_at", &self.expires_at)
            .field("scope", &self.scope)
            .finish()
    }
}

impl StoredToken {
    /// Whether the token expires within the refresh margin of `now`
    ///
    /// Tokens without an expiry are treated as valid.
    pub fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at
            .is_some_and(|expires_at| expires_at - Duration::seconds(EXPIRY_MARGIN_SECS) <= now)
    }
}

/// Token endpoint response
#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    scope: Option<String>,
}

impl TokenResponse {
    /// Refresh responses omit the refresh token; keep the previous one
    fn into_token(self, previous_refresh: Option<String>, now: DateTime<Utc>) -> StoredToken {
        StoredToken {
            access_token: self.access_token,
            refresh_token: self.refresh_token.or(previous_refresh),
            expires_at: self.expires_in.map(|secs| now + Duration::seconds(secs)),
            scope: self.scope,
        }
    }
}

/// Produces access tokens for the Drive API
pub struct Authenticator {
    client: reqwest::Client,
    secrets: ClientSecrets,
    token_path: PathBuf,
}

impl Authenticator {
    /// Create an authenticator caching its token at `token_path`
    pub fn new(client: reqwest::Client, secrets: ClientSecrets, token_path: PathBuf) -> Self {
        Self {
            client,
            secrets,
            token_path,
        }
    }

    /// A token valid for at least the refresh margin
    pub async fn access_token(&self) -> Result<StoredToken> {
        if let Some(token) = load_token(&self.token_path).await {
            if !token.needs_refresh(Utc::now()) {
                tracing::debug!("Using cached Google Drive token");
                return Ok(token);
            }

            if let Some(refresh_token) = token.refresh_token.clone() {
                match self.refresh(refresh_token).await {
                    Ok(refreshed) => {
                        save_token(&self.token_path, &refreshed).await?;
                        tracing::debug!("Refreshed Google Drive token");
                        return Ok(refreshed);
                    }
                    Err(e) => tracing::warn!("Token refresh failed, re-authorizing: {}", e),
                }
            }
        }

        let token = self.authorize().await?;
        save_token(&self.token_path, &token).await?;
        tracing::info!("Saved Google Drive token to {}", self.token_path.display());
        Ok(token)
    }

    async fn refresh(&self, refresh_token: String) -> Result<StoredToken> {
        let response = self
            .token_request(&[
                ("client_id", self.secrets.client_id.as_str()),
                ("client_secret", self.secrets.client_secret.as_str()),
                ("refresh_token", refresh_token.as_str()),
                ("grant_type", "refresh_token"),
            ])
            .await?;

        Ok(response.into_token(Some(refresh_token), Utc::now()))
    }

    /// Loopback-redirect authorization; blocks until the browser redirects
    async fn authorize(&self) -> Result<StoredToken> {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await?;
        let redirect_uri = format!("http://127.0.0.1:{}/", listener.local_addr()?.port());
        let state = uuid::Uuid::new_v4().to_string();

        let consent = consent_url(&self.secrets, &redirect_uri, &state)?;
        tracing::info!(
            "Authorize Google Drive access by visiting this URL in a browser:\n{}",
            consent
        );

        let code = await_redirect(&listener, &state).await?;
        let response = self
            .token_request(&[
                ("code", code.as_str()),
                ("client_id", self.secrets.client_id.as_str()),
                ("client_secret", self.secrets.client_secret.as_str()),
                ("redirect_uri", redirect_uri.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .await?;

        Ok(response.into_token(None, Utc::now()))
    }

    async fn token_request(&self, form: &[(&str, &str)]) -> Result<TokenResponse> {
        let response = self
            .client
            .post(&self.secrets.token_uri)
            .form(form)
            .send()
            .await
            .map_err(|e| Error::http(format!("Token request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::from_status(PROVIDER, status.as_u16(), &body));
        }

        response
            .json()
            .await
            .map_err(|e| Error::provider(PROVIDER, format!("Invalid token response: {}", e)))
    }
}

/// Accept loopback connections until the authorization redirect arrives
///
/// Requests without the expected `state` (browser preconnects, favicon
/// fetches, stray clients) are answered with 404 and ignored.
pub async fn await_redirect(listener: &TcpListener, state: &str) -> Result<String> {
    loop {
        let (stream, peer) = listener.accept().await?;

        let mut reader = BufReader::new(stream);
        let mut request_line = String::new();
        match timeout(REDIRECT_READ_TIMEOUT, reader.read_line(&mut request_line)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => {
                tracing::debug!("Unreadable loopback request from {}: {}", peer, e);
                continue;
            }
            Err(_) => {
                tracing::debug!("Idle loopback connection from {} dropped", peer);
                continue;
            }
        }

        let outcome = parse_redirect(&request_line, state);
        let reply = match &outcome {
            None => "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
            Some(Ok(_)) => "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nConnection: close\r\n\r\n\
                            Authorization complete. You can close this window.\n",
            Some(Err(_)) => "HTTP/1.1 400 Bad Request\r\nContent-Type: text/plain\r\nConnection: close\r\n\r\n\
                             Authorization failed. Check the pubwatch log.\n",
        };

        let mut stream = reader.into_inner();
        if let Err(e) = stream.write_all(reply.as_bytes()).await {
            tracing::debug!("Could not answer loopback request from {}: {}", peer, e);
        }
        if let Err(e) = stream.shutdown().await {
            tracing::debug!("Could not close loopback connection from {}: {}", peer, e);
        }

        match outcome {
            Some(result) => {
                tracing::debug!("Authorization redirect from {}", peer);
                return result;
            }
            None => tracing::debug!("Ignoring unrelated loopback request from {}", peer),
        }
    }
}

/// Consent page URL for the loopback flow
pub fn consent_url(secrets: &ClientSecrets, redirect_uri: &str, state: &str) -> Result<url::Url> {
    url::Url::parse_with_params(
        &secrets.auth_uri,
        &[
            ("client_id", secrets.client_id.as_str()),
            ("redirect_uri", redirect_uri),
            ("response_type", "code"),
            ("scope", DRIVE_SCOPE),
            ("access_type", "offline"),
            ("prompt", "consent"),
            ("state", state),
        ],
    )
    .map_err(|e| Error::config(format!("Invalid auth_uri '{}': {}", secrets.auth_uri, e)))
}

/// Extract the authorization code from the redirect's request line
///
/// e.g. `GET /?state=...&code=...&scope=... HTTP/1.1`
///
/// Returns `None` when the request is not the redirect for `expected_state`.
pub fn parse_redirect(request_line: &str, expected_state: &str) -> Option<Result<String>> {
    let target = request_line.split_whitespace().nth(1)?;
    let url = url::Url::parse("http://127.0.0.1")
        .and_then(|base| base.join(target))
        .ok()?;

    let mut code = None;
    let mut state = None;
    let mut denial = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "error" => denial = Some(value.into_owned()),
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            _ => {}
        }
    }

    if state.as_deref() != Some(expected_state) {
        return None;
    }

    if let Some(reason) = denial {
        return Some(Err(Error::auth(format!("Authorization denied: {}", reason))));
    }

    Some(code.ok_or_else(|| Error::auth("Authorization redirect carried no code")))
}

/// Read the cached token; a missing or unreadable cache yields `None`
pub async fn load_token(path: &Path) -> Option<StoredToken> {
    let content = match fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
        Err(e) => {
            tracing::warn!("Cannot read token cache {}: {}", path.display(), e);
            return None;
        }
    };

    match serde_json::from_str(&content) {
        Ok(token) => Some(token),
        Err(e) => {
            tracing::warn!(
                "Token cache {} is corrupted, re-authorizing: {}",
                path.display(),
                e
            );
            None
        }
    }
}

/// Write the token cache atomically
pub async fn save_token(path: &Path, token: &StoredToken) -> Result<()> {
    let json = serde_json::to_string_pretty(token)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }

    let mut temp_path = path.to_path_buf();
    temp_path.set_extension("tmp");
    {
        let mut file = fs::File::create(&temp_path).await.map_err(|e| {
            Error::storage(format!(
                "Failed to create temp file {}: {}",
                temp_path.display(),
                e
            ))
        })?;
        file.write_all(json.as_bytes()).await?;
        file.flush().await?;
    }

    fs::rename(&temp_path, path).await.map_err(|e| {
        Error::storage(format!(
            "Failed to rename {} to {}: {}",
            temp_path.display(),
            path.display(),
            e
        ))
    })?;

    Ok(())
}
