//! Core traits for the pubwatch pipeline
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`Monitor`]: Discover and download publications
//! - [`StorageBackend`]: Upload downloaded files to remote storage
//! - [`Notifier`]: Deliver a summary of uploaded publications

pub mod monitor;
pub mod notifier;
pub mod storage;

pub use monitor::{Monitor, MonitorFactory};
pub use notifier::{Notifier, NotifierFactory};
pub use storage::{StorageBackend, StorageFactory};
