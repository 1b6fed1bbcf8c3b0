//! Watch state - the Supervisor's explicit state machine.
//!
//! One value owned by the supervisor loop and advanced only through the
//! methods below. Phases:
//!
//! ```text
//! AwaitingOffer ──offer seen──▶ AwaitingAcceptance ──Accepted──▶ Settled
//!   │    ▲                            │
//!   │    └──cooldown, reset deadline  ├──Declined/Canceled──▶ Failed
//!   └──deadline: escalate─┘           └──deadline──────────▶ Failed
//! ```
//!
//! Time is passed in explicitly so transitions are deterministic.

use std::time::Duration;

use tokio::time::Instant;

use super::offer::{OfferId, OfferState};

/// Supervisor phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    AwaitingOffer,
    AwaitingAcceptance,
    Settled,
    Failed,
}

impl Phase {
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Settled | Self::Failed)
    }

    /// Numeric code for the phase gauge.
    pub const fn code(self) -> i64 {
        match self {
            Self::AwaitingOffer => 0,
            Self::AwaitingAcceptance => 1,
            Self::Settled => 2,
            Self::Failed => 3,
        }
    }
}

/// Worker role to launch when the offer deadline passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Escalation {
    /// First escalation: build and send the offer.
    LaunchSender,
    /// Later escalations: an offer should exist, only accept it.
    LaunchReceiver,
}

/// Why a watch ended in `Failed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// The tracked offer was declined or canceled.
    Closed { offer_id: OfferId, state: OfferState },
    /// The tracked offer was not accepted before the deadline.
    AcceptanceTimeout { offer_id: OfferId },
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed { offer_id, state } => {
                write!(f, "offer {offer_id} was {}", state.name())
            }
            Self::AcceptanceTimeout { offer_id } => {
                write!(f, "offer {offer_id} was not accepted in time")
            }
        }
    }
}

/// Supervisor watch state.
#[derive(Debug, Clone)]
pub struct WatchState {
    phase: Phase,
    deadline_at: Instant,
    attempt_count: u32,
    tracked_offer_id: Option<OfferId>,
    window: Duration,
    failure: Option<FailureReason>,
}

impl WatchState {
    /// Start a watch cycle awaiting an offer.
    pub fn new(now: Instant, window: Duration) -> Self {
        Self {
            phase: Phase::AwaitingOffer,
            deadline_at: now + window,
            attempt_count: 0,
            tracked_offer_id: None,
            window,
            failure: None,
        }
    }

    pub const fn phase(&self) -> Phase {
        self.phase
    }

    pub const fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    pub const fn deadline_at(&self) -> Instant {
        self.deadline_at
    }

    pub fn tracked_offer_id(&self) -> Option<&str> {
        self.tracked_offer_id.as_deref()
    }

    pub const fn failure(&self) -> Option<&FailureReason> {
        self.failure.as_ref()
    }

    /// Whether the current deadline has elapsed.
    pub fn deadline_passed(&self, now: Instant) -> bool {
        now >= self.deadline_at
    }

    /// Count an escalation and pick the role to launch.
    ///
    /// Only meaningful while awaiting an offer; returns `None` otherwise.
    pub fn escalate(&mut self) -> Option<Escalation> {
        if self.phase != Phase::AwaitingOffer {
            return None;
        }
        self.attempt_count += 1;
        Some(if self.attempt_count == 1 {
            Escalation::LaunchSender
        } else {
            Escalation::LaunchReceiver
        })
    }

    /// Re-enter `AwaitingOffer` with a fresh deadline after a cooldown.
    pub fn restart_watch(&mut self, now: Instant) {
        if self.phase.is_terminal() {
            return;
        }
        self.phase = Phase::AwaitingOffer;
        self.tracked_offer_id = None;
        self.deadline_at = now + self.window;
    }

    /// An active incoming offer appeared; start tracking it.
    pub fn offer_detected(&mut self, offer_id: OfferId, now: Instant) {
        if self.phase != Phase::AwaitingOffer {
            return;
        }
        self.phase = Phase::AwaitingAcceptance;
        self.tracked_offer_id = Some(offer_id);
        self.deadline_at = now + self.window;
    }

    /// Apply the tracked offer's latest state. Returns the new phase.
    pub fn observe_state(&mut self, state: OfferState) -> Phase {
        if self.phase != Phase::AwaitingAcceptance {
            return self.phase;
        }
        if state == OfferState::Accepted {
            self.phase = Phase::Settled;
        } else if state.is_closed_negative() {
            let offer_id = self.tracked_offer_id.clone().unwrap_or_default();
            self.fail(FailureReason::Closed { offer_id, state });
        }
        self.phase
    }

    /// Acceptance deadline elapsed without a terminal state.
    pub fn acceptance_timed_out(&mut self) {
        if self.phase != Phase::AwaitingAcceptance {
            return;
        }
        let offer_id = self.tracked_offer_id.clone().unwrap_or_default();
        self.fail(FailureReason::AcceptanceTimeout { offer_id });
    }

    fn fail(&mut self, reason: FailureReason) {
        self.phase = Phase::Failed;
        self.failure = Some(reason);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_secs(300);

    #[test]
    fn test_first_escalation_sender_then_receiver() {
        let start = Instant::now();
        let mut watch = WatchState::new(start, WINDOW);
        assert_eq!(watch.attempt_count(), 0);

        assert!(watch.deadline_passed(start + WINDOW));
        assert_eq!(watch.escalate(), Some(Escalation::LaunchSender));
        assert_eq!(watch.attempt_count(), 1);

        watch.restart_watch(start + WINDOW);
        assert!(!watch.deadline_passed(start + WINDOW));
        assert_eq!(watch.escalate(), Some(Escalation::LaunchReceiver));
        assert_eq!(watch.escalate(), Some(Escalation::LaunchReceiver));
        assert_eq!(watch.attempt_count(), 3);
    }

    #[test]
    fn test_offer_detection_resets_deadline() {
        let start = Instant::now();
        let mut watch = WatchState::new(start, WINDOW);
        let later = start + Duration::from_secs(200);

        watch.offer_detected("42".to_string(), later);
        assert_eq!(watch.phase(), Phase::AwaitingAcceptance);
        assert_eq!(watch.tracked_offer_id(), Some("42"));
        assert_eq!(watch.deadline_at(), later + WINDOW);
        assert_eq!(watch.escalate(), None);
    }

    #[test]
    fn test_accepted_settles() {
        let mut watch = WatchState::new(Instant::now(), WINDOW);
        watch.offer_detected("42".to_string(), Instant::now());
        assert_eq!(watch.observe_state(OfferState::Active), Phase::AwaitingAcceptance);
        assert_eq!(watch.observe_state(OfferState::InEscrow), Phase::AwaitingAcceptance);
        assert_eq!(watch.observe_state(OfferState::Accepted), Phase::Settled);
        // Terminal phases are final.
        assert_eq!(watch.observe_state(OfferState::Declined), Phase::Settled);
        watch.restart_watch(Instant::now());
        assert_eq!(watch.phase(), Phase::Settled);
    }

    #[test]
    fn test_declined_fails_with_reason() {
        let mut watch = WatchState::new(Instant::now(), WINDOW);
        watch.offer_detected("42".to_string(), Instant::now());
        assert_eq!(watch.observe_state(OfferState::Declined), Phase::Failed);
        assert_eq!(
            watch.failure(),
            Some(&FailureReason::Closed {
                offer_id: "42".to_string(),
                state: OfferState::Declined,
            })
        );
    }

    #[test]
    fn test_acceptance_timeout_fails() {
        let mut watch = WatchState::new(Instant::now(), WINDOW);
        watch.acceptance_timed_out();
        assert_eq!(watch.phase(), Phase::AwaitingOffer);

        watch.offer_detected("7".to_string(), Instant::now());
        watch.acceptance_timed_out();
        assert_eq!(watch.phase(), Phase::Failed);
        assert_eq!(
            watch.failure().map(ToString::to_string).as_deref(),
            Some("offer 7 was not accepted in time")
        );
    }
}
