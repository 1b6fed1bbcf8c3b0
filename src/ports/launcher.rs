//! Worker Launcher Port - Hand-off Between Roles
//!
//! Roles never share memory. A role starts another one through this
//! port, passing the trade key as a typed value; only the adapter
//! decides how the key crosses the process boundary.

use async_trait::async_trait;

use crate::domain::trade_key::TradeKey;

/// A role to start, with everything it needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerLaunch {
  /// Build and send the offer tagged with `key`.
  Sender {
    /// Key to embed in the offer.
    key: TradeKey,
    /// Only list what would be sent.
    simulate: bool,
  },
  /// Accept the offer tagged with `key`.
  Receiver {
    /// Key the offer must carry.
    key: TradeKey,
  },
  /// Watch the receiving account until the transfer settles.
  Supervisor {
    /// Key of the offer already in flight, if any.
    key: Option<TradeKey>,
  },
}

impl WorkerLaunch {
  /// CLI subcommand of the role.
  pub const fn subcommand(&self) -> &'static str {
    match self {
      Self::Sender { .. } => "send",
      Self::Receiver { .. } => "accept",
      Self::Supervisor { .. } => "supervise",
    }
  }

  /// Key carried by the launch, if any.
  pub const fn key(&self) -> Option<&TradeKey> {
    match self {
      Self::Sender { key, .. } | Self::Receiver { key } => Some(key),
      Self::Supervisor { key } => key.as_ref(),
    }
  }
}

/// Trait for starting roles.
#[async_trait]
pub trait WorkerLauncher: Send + Sync + 'static {
  /// Start a role and return immediately (fire-and-forget).
  async fn launch_detached(&self, launch: &WorkerLaunch) -> anyhow::Result<()>;

  /// Start a role and wait for it; returns its exit code.
  async fn run_to_completion(&self, launch: &WorkerLaunch) -> anyhow::Result<i32>;
}
