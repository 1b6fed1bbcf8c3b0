//! Use Cases Layer - The Four Roles
//!
//! Orchestrates domain logic with port interfaces. Each role runs as
//! its own process and talks to the others only through launches and
//! the platform's offer records.
//!
//! Use cases:
//! - `Supervisor`: Watches the receiving account and escalates
//! - `Sender`: Builds, submits and confirms the transfer offer
//! - `ReceiverMatcher`: Accepts the one offer carrying the trade key
//! - `BanMonitor`: Watches the sender's profile and starts the handoff

pub mod error;
pub mod monitor;
pub mod receiver;
pub mod sender;
pub mod supervisor;

use std::future::Future;
use std::time::Duration;

pub use error::RoleError;
pub use monitor::{BanMonitor, MonitorOutcome};
pub use receiver::ReceiverMatcher;
pub use sender::{SendOutcome, Sender};
pub use supervisor::Supervisor;

/// Run a port call with an upper bound; a timeout is a transient error.
pub(crate) async fn with_timeout<T, F>(limit: Duration, call: F) -> anyhow::Result<T>
where
  F: Future<Output = anyhow::Result<T>>,
{
  tokio::time::timeout(limit, call)
    .await
    .unwrap_or_else(|_| Err(anyhow::anyhow!("call timed out after {}s", limit.as_secs())))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test(start_paused = true)]
  async fn test_hung_call_times_out() {
    let result: anyhow::Result<()> = with_timeout(Duration::from_secs(30), async {
      tokio::time::sleep(Duration::from_secs(3600)).await;
      Ok(())
    })
    .await;
    assert!(result.unwrap_err().to_string().contains("timed out after 30s"));
  }

  #[tokio::test]
  async fn test_fast_call_passes_through() {
    let result = with_timeout(Duration::from_secs(1), async { Ok(7) }).await;
    assert_eq!(result.unwrap(), 7);
  }
}
