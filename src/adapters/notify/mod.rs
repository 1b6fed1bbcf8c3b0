//! Notification Adapters
//!
//! Console banner and Telegram chat. `NotifierSet` fans one alert out to
//! every configured sink; a failing sink is logged and never stops the
//! caller.

pub mod console;
pub mod telegram;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tracing::warn;

use crate::ports::notifier::{Alert, Notifier};

pub use console::ConsoleAlert;
pub use telegram::TelegramNotifier;

/// Fan-out over several notifiers.
#[derive(Clone, Default)]
pub struct NotifierSet {
    sinks: Vec<Arc<dyn Notifier>>,
}

impl NotifierSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sink.
    #[must_use]
    pub fn with(mut self, sink: Arc<dyn Notifier>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

#[async_trait]
impl Notifier for NotifierSet {
    async fn alert(&self, alert: &Alert) -> Result<()> {
        for sink in &self.sinks {
            if let Err(e) = sink.alert(alert).await {
                warn!(error = %e, "Notifier failed to deliver alert");
            }
        }
        Ok(())
    }

    async fn report(&self, message: &str) -> Result<()> {
        for sink in &self.sinks {
            if let Err(e) = sink.report(message).await {
                warn!(error = %e, "Notifier failed to deliver report");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Failing;

    #[async_trait]
    impl Notifier for Failing {
        async fn alert(&self, _alert: &Alert) -> Result<()> {
            anyhow::bail!("down")
        }

        async fn report(&self, _message: &str) -> Result<()> {
            anyhow::bail!("down")
        }
    }

    #[tokio::test]
    async fn test_failing_sink_is_not_fatal() {
        let set = NotifierSet::new().with(Arc::new(Failing)).with(Arc::new(Failing));
        assert_eq!(set.len(), 2);
        tokio_test::assert_ok!(set.alert(&Alert::new("x", None)).await);
        tokio_test::assert_ok!(set.report("status").await);
    }
}
