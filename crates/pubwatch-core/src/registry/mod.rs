//! Provider registry
//!
//! Maps provider type names to factories so the binary can turn the
//! configuration's tagged entries into the run's fixed lists of active
//! monitors, storage backend and notifiers. Registration happens once at
//! startup; there is no runtime plugin discovery.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use pubwatch_core::ProviderRegistry;
//!
//! let registry = ProviderRegistry::new();
//! pubwatch_monitor_issuu::register(&registry);
//! pubwatch_storage_gdrive::register(&registry);
//! pubwatch_notifier_email::register(&registry);
//!
//! let components = registry.build(&config).await?;
//! ```

use crate::config::{MonitorConfig, NotifierConfig, PubwatchConfig, StorageConfig};
use crate::error::{Error, Result};
use crate::traits::{Monitor, Notifier, StorageBackend};
use crate::traits::{MonitorFactory, NotifierFactory, StorageFactory};
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info};

/// The instances taking part in one run
#[derive(Default)]
pub struct Components {
    /// Active monitors, in configuration order
    pub monitors: Vec<Box<dyn Monitor>>,

    /// Active storage backend (absent when storage is disabled or no
    /// monitor is active)
    pub storage: Option<Box<dyn StorageBackend>>,

    /// Active notifiers, in configuration order
    pub notifiers: Vec<Box<dyn Notifier>>,
}

/// Provider registry for configuration-driven component creation
///
/// ## Thread Safety
///
/// The registry uses interior mutability with RwLock, allowing concurrent
/// reads and exclusive writes.
#[derive(Default)]
pub struct ProviderRegistry {
    /// Registered monitor factories
    monitors: RwLock<HashMap<String, Box<dyn MonitorFactory>>>,

    /// Registered storage factories
    storage: RwLock<HashMap<String, Arc<dyn StorageFactory>>>,

    /// Registered notifier factories
    notifiers: RwLock<HashMap<String, Box<dyn NotifierFactory>>>,
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl ProviderRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a monitor factory
    ///
    /// # Parameters
    ///
    /// - `name`: Monitor type name (e.g., "issuu")
    /// - `factory`: Factory object for creating monitor instances
    pub fn register_monitor(&self, name: impl Into<String>, factory: Box<dyn MonitorFactory>) {
        write(&self.monitors).insert(name.into(), factory);
    }

    /// Register a storage factory
    ///
    /// # Parameters
    ///
    /// - `name`: Storage type name (e.g., "google_drive")
    /// - `factory`: Factory object for creating storage instances
    pub fn register_storage(&self, name: impl Into<String>, factory: Box<dyn StorageFactory>) {
        write(&self.storage).insert(name.into(), Arc::from(factory));
    }

    /// Register a notifier factory
    ///
    /// # Parameters
    ///
    /// - `name`: Notifier type name (e.g., "email")
    /// - `factory`: Factory object for creating notifier instances
    pub fn register_notifier(&self, name: impl Into<String>, factory: Box<dyn NotifierFactory>) {
        write(&self.notifiers).insert(name.into(), factory);
    }

    /// Create a monitor from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Box<dyn Monitor>)`: Created monitor instance
    /// - `Err(Error)`: If the monitor type is not registered or creation fails
    pub fn create_monitor(&self, config: &MonitorConfig) -> Result<Box<dyn Monitor>> {
        let monitor_type = config.type_name();
        let monitors = read(&self.monitors);

        let factory = monitors
            .get(monitor_type)
            .ok_or_else(|| Error::config(format!("Unknown monitor type: {}", monitor_type)))?;

        factory.create(config)
    }

    /// Create a storage backend from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Box<dyn StorageBackend>)`: Created backend instance
    /// - `Err(Error)`: If the storage type is not registered or creation fails
    pub async fn create_storage(&self, config: &StorageConfig) -> Result<Box<dyn StorageBackend>> {
        let storage_type = config.type_name();

        let factory = read(&self.storage)
            .get(storage_type)
            .cloned()
            .ok_or_else(|| Error::config(format!("Unknown storage type: {}", storage_type)))?;

        // The read guard is released above; creation may await on I/O
        factory.create(config).await
    }

    /// Create a notifier from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Box<dyn Notifier>)`: Created notifier instance
    /// - `Err(Error)`: If the notifier type is not registered or creation fails
    pub fn create_notifier(&self, config: &NotifierConfig) -> Result<Box<dyn Notifier>> {
        let notifier_type = config.type_name();
        let notifiers = read(&self.notifiers);

        let factory = notifiers
            .get(notifier_type)
            .ok_or_else(|| Error::config(format!("Unknown notifier type: {}", notifier_type)))?;

        factory.create(config)
    }

    /// Build the active components for a run
    ///
    /// Only enabled entries are instantiated. The storage backend is only
    /// created when at least one monitor is active and the run is not a
    /// dry run, so neither an idle run nor a dry run ever establishes a
    /// storage session (or triggers an interactive authorization).
    pub async fn build(&self, config: &PubwatchConfig) -> Result<Components> {
        let mut components = Components::default();

        for monitor_config in config.active_monitors() {
            let monitor = self.create_monitor(monitor_config)?;
            info!("Monitor enabled: {}", monitor.monitor_name());
            components.monitors.push(monitor);
        }

        match config.active_storage() {
            Some(_) if components.monitors.is_empty() => {
                debug!("No active monitors, storage backend not created")
            }
            Some(_) if config.run.dry_run => {
                info!("Dry run, storage backend not created")
            }
            Some(storage_config) => {
                let storage = self.create_storage(storage_config).await?;
                info!("Storage enabled: {}", storage.backend_name());
                components.storage = Some(storage);
            }
            None => debug!("Storage disabled"),
        }

        for notifier_config in config.active_notifiers() {
            let notifier = self.create_notifier(notifier_config)?;
            info!("Notifier enabled: {}", notifier.notifier_name());
            components.notifiers.push(notifier);
        }

        Ok(components)
    }

    /// List all registered monitor types
    pub fn list_monitors(&self) -> Vec<String> {
        read(&self.monitors).keys().cloned().collect()
    }

    /// List all registered storage types
    pub fn list_storage(&self) -> Vec<String> {
        read(&self.storage).keys().cloned().collect()
    }

    /// List all registered notifier types
    pub fn list_notifiers(&self) -> Vec<String> {
        read(&self.notifiers).keys().cloned().collect()
    }

    /// Check if a monitor type is registered
    pub fn has_monitor(&self, name: &str) -> bool {
        read(&self.monitors).contains_key(name)
    }

    /// Check if a storage type is registered
    pub fn has_storage(&self, name: &str) -> bool {
        read(&self.storage).contains_key(name)
    }

    /// Check if a notifier type is registered
    pub fn has_notifier(&self, name: &str) -> bool {
        read(&self.notifiers).contains_key(name)
    }
}
