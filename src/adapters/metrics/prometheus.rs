//! Prometheus Metrics Registry - Settlement Observability
//!
//! Counters for polls, escalations, submissions, accepts, confirmations,
//! profile checks and alerts, plus a gauge holding the supervisor phase. All metrics
//! follow the naming convention `banshield_*`.

use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

use crate::domain::ban::BanStatus;
use crate::domain::watch::{Escalation, Phase};
use crate::ports::telemetry::Telemetry;

/// Centralized Prometheus metrics for every role.
pub struct SettlementMetrics {
    /// Prometheus registry.
    registry: Registry,
    /// Platform polls by role and outcome.
    pub polls: IntCounterVec,
    /// Supervisor escalations by launched role.
    pub escalations: IntCounterVec,
    /// Offers submitted.
    pub offers_sent: IntCounter,
    /// Accept calls by outcome.
    pub accept_attempts: IntCounterVec,
    /// Confirmation calls by outcome.
    pub confirmation_attempts: IntCounterVec,
    /// Operator alerts raised.
    pub alerts: IntCounter,
    /// Monitor profile checks by result.
    pub ban_checks: IntCounterVec,
    /// Supervisor phase (0 awaiting offer .. 3 failed).
    pub phase: IntGauge,
}

impl SettlementMetrics {
    /// Create and register all Prometheus metrics.
    ///
    /// # Errors
    /// Returns error if a metric name is registered twice.
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let polls = IntCounterVec::new(
            Opts::new("banshield_polls_total", "Platform polls"),
            &["role", "outcome"],
        )?;

        let escalations = IntCounterVec::new(
            Opts::new("banshield_escalations_total", "Supervisor escalations"),
            &["launch"],
        )?;

        let offers_sent = IntCounter::new("banshield_offers_sent_total", "Offers submitted")?;

        let accept_attempts = IntCounterVec::new(
            Opts::new("banshield_accept_attempts_total", "Accept calls"),
            &["outcome"],
        )?;

        let confirmation_attempts = IntCounterVec::new(
            Opts::new("banshield_confirmation_attempts_total", "Confirmation calls"),
            &["outcome"],
        )?;

        let alerts = IntCounter::new("banshield_alerts_total", "Operator alerts raised")?;

        let ban_checks = IntCounterVec::new(
            Opts::new("banshield_ban_checks_total", "Monitor profile checks"),
            &["result"],
        )?;

        let phase = IntGauge::new(
            "banshield_supervisor_phase",
            "Supervisor phase (0=awaiting offer, 1=awaiting acceptance, 2=settled, 3=failed)",
        )?;

        registry.register(Box::new(polls.clone()))?;
        registry.register(Box::new(escalations.clone()))?;
        registry.register(Box::new(offers_sent.clone()))?;
        registry.register(Box::new(accept_attempts.clone()))?;
        registry.register(Box::new(confirmation_attempts.clone()))?;
        registry.register(Box::new(alerts.clone()))?;
        registry.register(Box::new(ban_checks.clone()))?;
        registry.register(Box::new(phase.clone()))?;

        Ok(Self {
            registry,
            polls,
            escalations,
            offers_sent,
            accept_attempts,
            confirmation_attempts,
            alerts,
            ban_checks,
            phase,
        })
    }

    /// Text exposition of every registered metric.
    pub fn render(&self) -> String {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        if encoder.encode(&self.registry.gather(), &mut buffer).is_err() {
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

const fn outcome(ok: bool) -> &'static str {
    if ok { "ok" } else { "error" }
}

impl Telemetry for SettlementMetrics {
    fn poll(&self, role: &'static str, ok: bool) {
        self.polls.with_label_values(&[role, outcome(ok)]).inc();
    }

    fn escalation(&self, kind: Escalation) {
        let launch = match kind {
            Escalation::LaunchSender => "sender",
            Escalation::LaunchReceiver => "receiver",
        };
        self.escalations.with_label_values(&[launch]).inc();
    }

    fn phase(&self, phase: Phase) {
        self.phase.set(phase.code());
    }

    fn offer_sent(&self) {
        self.offers_sent.inc();
    }

    fn accept_attempt(&self, ok: bool) {
        self.accept_attempts.with_label_values(&[outcome(ok)]).inc();
    }

    fn confirmation_attempt(&self, ok: bool) {
        self.confirmation_attempts.with_label_values(&[outcome(ok)]).inc();
    }

    fn alert(&self) {
        self.alerts.inc();
    }

    fn ban_check(&self, status: Option<&BanStatus>) {
        let result = match status {
            Some(BanStatus::Clean) => "clean",
            Some(BanStatus::OldBan(_)) => "old_ban",
            Some(BanStatus::FreshBan(_)) => "fresh_ban",
            None => "error",
        };
        self.ban_checks.with_label_values(&[result]).inc();
    }
}
