//! Telemetry Port - Counters for Polls, Escalations, Ban Checks and Alerts
//!
//! Every hook has a no-op default so roles can run without a metrics
//! backend (tests, one-shot runs).

use crate::domain::ban::BanStatus;
use crate::domain::watch::{Escalation, Phase};

/// Trait for settlement telemetry sinks.
pub trait Telemetry: Send + Sync + 'static {
  /// One platform poll by `role` finished.
  fn poll(&self, _role: &'static str, _ok: bool) {}

  /// The supervisor escalated.
  fn escalation(&self, _kind: Escalation) {}

  /// The supervisor entered `phase`.
  fn phase(&self, _phase: Phase) {}

  /// An offer was submitted.
  fn offer_sent(&self) {}

  /// An accept call finished.
  fn accept_attempt(&self, _ok: bool) {}

  /// A confirmation call finished.
  fn confirmation_attempt(&self, _ok: bool) {}

  /// An operator alert was raised.
  fn alert(&self) {}

  /// A profile check finished; `None` when the page could not be read.
  fn ban_check(&self, _status: Option<&BanStatus>) {}
}

/// Telemetry sink that drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTelemetry;

impl Telemetry for NoopTelemetry {}
