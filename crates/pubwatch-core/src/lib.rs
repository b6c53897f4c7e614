// # pubwatch-core
//
// Core library for the pubwatch publication pipeline.
//
// ## Architecture Overview
//
// One run checks configured publishers for new documents, downloads them,
// uploads them to remote storage and emails a summary:
// - **Monitor**: Trait for discovering and downloading publications
// - **StorageBackend**: Trait for uploading files to remote storage
// - **Notifier**: Trait for delivering the run summary
// - **Orchestrator**: Drives one discovery → download → upload → notify cycle
// - **ProviderRegistry**: Turns configuration entries into active instances
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Orchestration is separate from provider APIs
// 2. **Contained Failures**: Per-publisher, per-item and per-notifier failures
//    never abort sibling work
// 3. **Explicit Ownership**: Every discovered record carries the id of the
//    monitor that produced it
// 4. **Library-First**: The binary is a thin wrapper around this crate

pub mod config;
pub mod engine;
pub mod error;
pub mod publication;
pub mod registry;
pub mod traits;

// Re-export core types for convenience
pub use config::{
    EmailSettings, GoogleDriveSettings, IssuuSettings, MonitorConfig, NotifierConfig,
    ProviderEntry, PubwatchConfig, RunConfig, StorageConfig,
};
pub use engine::{FailureStage, ItemFailure, MonitorId, NotificationOutcome, Orchestrator, RunReport};
pub use error::{Error, Result};
pub use publication::{Publication, RemoteFile, parse_date};
pub use registry::{Components, ProviderRegistry};
pub use traits::{Monitor, Notifier, StorageBackend};
