//! Profile Probe Port - Public Ban Status of the Watched Account

use async_trait::async_trait;

use crate::domain::ban::BanStatus;

/// Trait for reading the watched profile's ban status.
#[async_trait]
pub trait ProfileProbe: Send + Sync + 'static {
  /// Fetch and classify the profile once.
  ///
  /// # Errors
  /// Returns error if the page cannot be fetched.
  async fn check(&self) -> anyhow::Result<BanStatus>;
}
