//! Configuration types for the pubwatch pipeline
//!
//! The configuration file is JSON with three provider sections plus optional
//! run settings:
//!
//! ```json
//! {
//!   "monitors": [
//!     { "type": "issuu", "enabled": true,
//!       "publishers": ["acme"], "min_date": "2024-01-01" }
//!   ],
//!   "storage": { "type": "google_drive", "folder_id": "abc",
//!                "credentials_path": "secrets/credentials.json" },
//!   "notifications": [
//!     { "type": "email", "smtp_server": "smtp.example.com",
//!       "sender_email": "bot@example.com", "recipients": ["a@example.com"] }
//!   ]
//! }
//! ```

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Main pubwatch configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PubwatchConfig {
    /// Publication sources, in the order their results are processed
    #[serde(default)]
    pub monitors: Vec<ProviderEntry<MonitorConfig>>,

    /// Destination for downloaded publications
    #[serde(default)]
    pub storage: Option<ProviderEntry<StorageConfig>>,

    /// Channels that receive the run summary
    #[serde(default)]
    pub notifications: Vec<ProviderEntry<NotifierConfig>>,

    /// Run behaviour
    #[serde(default)]
    pub run: RunConfig,
}

impl PubwatchConfig {
    /// Create an empty configuration (nothing enabled)
    pub fn new() -> Self {
        Self::default()
    }

    /// Load and validate a configuration file
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            Error::config(format!(
                "Failed to read configuration file {}: {}",
                path.display(),
                e
            ))
        })?;

        let config = Self::from_json(&content).map_err(|e| match e {
            Error::Config(msg) => Error::config(format!("{}: {}", path.display(), msg)),
            other => other,
        })?;

        tracing::debug!(
            "Loaded configuration from {}: {} monitor(s), {} notifier(s)",
            path.display(),
            config.monitors.len(),
            config.notifications.len()
        );
        Ok(config)
    }

    /// Parse and validate a configuration document
    pub fn from_json(content: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(content)
            .map_err(|e| Error::config(format!("Invalid configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    ///
    /// Disabled entries are not validated.
    pub fn validate(&self) -> Result<()> {
        for monitor in self.active_monitors() {
            monitor.validate()?;
        }

        if let Some(storage) = self.active_storage() {
            storage.validate()?;
        }

        for notifier in self.active_notifiers() {
            notifier.validate()?;
        }

        if self.active_monitors().next().is_some() && self.active_storage().is_none() {
            return Err(Error::config(
                "At least one monitor is enabled but no storage backend is enabled",
            ));
        }

        Ok(())
    }

    /// Enabled monitor configurations, in declaration order
    pub fn active_monitors(&self) -> impl Iterator<Item = &MonitorConfig> {
        self.monitors
            .iter()
            .filter(|entry| entry.enabled)
            .map(|entry| &entry.settings)
    }

    /// The storage configuration, if present and enabled
    pub fn active_storage(&self) -> Option<&StorageConfig> {
        self.storage
            .as_ref()
            .filter(|entry| entry.enabled)
            .map(|entry| &entry.settings)
    }

    /// Enabled notifier configurations, in declaration order
    pub fn active_notifiers(&self) -> impl Iterator<Item = &NotifierConfig> {
        self.notifications
            .iter()
            .filter(|entry| entry.enabled)
            .map(|entry| &entry.settings)
    }
}

/// A provider section: an `enabled` flag plus the provider's own settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderEntry<T> {
    /// Whether this provider takes part in the run
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Provider-specific settings (tagged by `type`)
    #[serde(flatten)]
    pub settings: T,
}

impl<T> ProviderEntry<T> {
    /// Create an enabled entry
    pub fn enabled(settings: T) -> Self {
        Self {
            enabled: true,
            settings,
        }
    }

    /// Create a disabled entry
    pub fn disabled(settings: T) -> Self {
        Self {
            enabled: false,
            settings,
        }
    }
}

fn default_enabled() -> bool {
    true
}

/// Monitor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MonitorConfig {
    /// Issuu publisher feed monitor
    Issuu(IssuuSettings),

    /// Custom monitor
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        #[serde(default)]
        config: serde_json::Value,
    },
}

impl MonitorConfig {
    /// Validate the monitor configuration
    pub fn validate(&self) -> Result<()> {
        match self {
            MonitorConfig::Issuu(settings) => settings.validate(),
            MonitorConfig::Custom { factory, .. } => {
                if factory.is_empty() {
                    return Err(Error::config("Custom monitor factory cannot be empty"));
                }
                Ok(())
            }
        }
    }

    /// Get the monitor type name
    pub fn type_name(&self) -> &str {
        match self {
            MonitorConfig::Issuu(_) => "issuu",
            MonitorConfig::Custom { factory, .. } => factory,
        }
    }
}

/// Settings for the Issuu feed monitor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuuSettings {
    /// Publisher account names to check
    pub publishers: Vec<String>,

    /// Only publications strictly after this date are reported
    pub min_date: String,

    /// How many of each publisher's most recent documents to inspect
    #[serde(default = "default_lookback")]
    pub lookback: usize,

    /// Publisher feed URL, with `{publisher}` substituted
    #[serde(default)]
    pub feed_url_template: Option<String>,

    /// Document metadata URL, with `{publisher}` and `{document}` substituted
    #[serde(default)]
    pub document_url_template: Option<String>,
}

impl IssuuSettings {
    /// Create settings with default look-back and endpoints
    pub fn new(publishers: Vec<String>, min_date: impl Into<String>) -> Self {
        Self {
            publishers,
            min_date: min_date.into(),
            lookback: default_lookback(),
            feed_url_template: None,
            document_url_template: None,
        }
    }

    /// The parsed `min_date` cutoff
    pub fn cutoff(&self) -> Result<NaiveDateTime> {
        crate::publication::parse_date(&self.min_date)
            .map_err(|e| Error::config(format!("Invalid Issuu min_date: {}", e)))
    }

    fn validate(&self) -> Result<()> {
        self.cutoff()?;

        if self.lookback == 0 {
            return Err(Error::config("Issuu lookback must be > 0"));
        }

        if self.publishers.iter().any(|p| p.trim().is_empty()) {
            return Err(Error::config("Issuu publisher names cannot be empty"));
        }

        Ok(())
    }
}

fn default_lookback() -> usize {
    10
}

/// Storage backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StorageConfig {
    /// Google Drive folder
    #[serde(alias = "gdrive")]
    GoogleDrive(GoogleDriveSettings),

    /// Custom storage backend
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        #[serde(default)]
        config: serde_json::Value,
    },
}

impl StorageConfig {
    /// Validate the storage configuration
    pub fn validate(&self) -> Result<()> {
        match self {
            StorageConfig::GoogleDrive(settings) => {
                if settings.folder_id.is_empty() {
                    return Err(Error::config("Google Drive folder_id cannot be empty"));
                }
                if settings.credentials_path.as_os_str().is_empty() {
                    return Err(Error::config(
                        "Google Drive credentials_path cannot be empty",
                    ));
                }
                Ok(())
            }
            StorageConfig::Custom { factory, .. } => {
                if factory.is_empty() {
                    return Err(Error::config("Custom storage factory cannot be empty"));
                }
                Ok(())
            }
        }
    }

    /// Get the storage type name
    pub fn type_name(&self) -> &str {
        match self {
            StorageConfig::GoogleDrive(_) => "google_drive",
            StorageConfig::Custom { factory, .. } => factory,
        }
    }
}

/// Settings for the Google Drive backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleDriveSettings {
    /// Destination folder ID
    pub folder_id: String,

    /// OAuth client secrets file (downloaded from the Google Cloud console)
    pub credentials_path: PathBuf,

    /// Where the reusable token is cached (default: `token.json` beside the
    /// credentials file)
    #[serde(default)]
    pub token_path: Option<PathBuf>,
}

impl GoogleDriveSettings {
    /// Resolved token cache path
    pub fn token_path(&self) -> PathBuf {
        match &self.token_path {
            Some(path) => path.clone(),
            None => self
                .credentials_path
                .parent()
                .map(|dir| dir.join("token.json"))
                .unwrap_or_else(|| PathBuf::from("token.json")),
        }
    }
}

/// Notifier configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotifierConfig {
    /// SMTP email
    Email(EmailSettings),

    /// Custom notifier
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        #[serde(default)]
        config: serde_json::Value,
    },
}

impl NotifierConfig {
    /// Validate the notifier configuration
    pub fn validate(&self) -> Result<()> {
        match self {
            NotifierConfig::Email(settings) => {
                if settings.smtp_server.is_empty() {
                    return Err(Error::config("Email smtp_server cannot be empty"));
                }
                if settings.smtp_port == 0 {
                    return Err(Error::config("Email smtp_port must be > 0"));
                }
                if settings.sender_email.is_empty() {
                    return Err(Error::config("Email sender_email cannot be empty"));
                }
                if settings.recipients.is_empty() {
                    return Err(Error::config("Email recipients cannot be empty"));
                }
                Ok(())
            }
            NotifierConfig::Custom { factory, .. } => {
                if factory.is_empty() {
                    return Err(Error::config("Custom notifier factory cannot be empty"));
                }
                Ok(())
            }
        }
    }

    /// Get the notifier type name
    pub fn type_name(&self) -> &str {
        match self {
            NotifierConfig::Email(_) => "email",
            NotifierConfig::Custom { factory, .. } => factory,
        }
    }
}

/// Settings for the SMTP email notifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailSettings {
    /// SMTP relay host
    pub smtp_server: String,

    /// SMTP port (STARTTLS)
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,

    /// Sender address, also used as the SMTP login
    pub sender_email: String,

    /// Recipients of the summary message
    pub recipients: Vec<String>,

    /// Environment variable holding the SMTP password
    #[serde(default = "default_password_env")]
    pub password_env: String,
}

fn default_smtp_port() -> u16 {
    587
}

fn default_password_env() -> String {
    "EMAIL_PASSWORD".to_string()
}

/// Run behaviour
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Discover and log planned uploads without downloading, uploading or
    /// notifying
    #[serde(default)]
    pub dry_run: bool,

    /// Skip publications whose remote name already exists in storage
    #[serde(default)]
    pub skip_existing: bool,

    /// Directory under which the run's working directory is created
    /// (default: the system temporary directory)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workdir_root: Option<PathBuf>,
}
