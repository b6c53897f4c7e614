// # Notifier Trait
//
// Defines the interface for delivering a run summary over one channel.
//
// ## Implementations
//
// - Email (SMTP): `pubwatch-notifier-email` crate

use async_trait::async_trait;

use crate::publication::Publication;

/// Trait for notification channel implementations
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send one summary message covering `publications`
    ///
    /// An empty slice is a no-op that returns `true` without sending.
    /// Transport failures are logged and reported as `false`.
    async fn notify(&self, publications: &[Publication]) -> bool;

    /// Get the notifier name (for logging/debugging)
    fn notifier_name(&self) -> &'static str;
}

/// Helper trait for constructing notifiers from configuration
pub trait NotifierFactory: Send + Sync {
    /// Create a Notifier instance from configuration
    fn create(
        &self,
        config: &crate::config::NotifierConfig,
    ) -> Result<Box<dyn Notifier>, crate::Error>;
}
