//! Notifier Port - Operator-facing Alerts and Status Reports

use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Something an operator has to look at.
#[derive(Debug, Clone)]
pub struct Alert {
  /// Short reason, shown prominently.
  pub reason: String,
  /// Offer the alert is about.
  pub offer_id: Option<String>,
  /// When the alert was raised.
  pub raised_at: DateTime<Utc>,
}

impl Alert {
  /// Raise an alert now.
  pub fn new(reason: impl Into<String>, offer_id: Option<String>) -> Self {
    Self {
      reason: reason.into(),
      offer_id,
      raised_at: Utc::now(),
    }
  }
}

/// Trait for alert and status sinks.
#[async_trait]
pub trait Notifier: Send + Sync + 'static {
  /// Deliver a blocking, operator-visible alert.
  async fn alert(&self, alert: &Alert) -> anyhow::Result<()>;

  /// Deliver a routine status line.
  async fn report(&self, message: &str) -> anyhow::Result<()>;
}
