//! Offer matcher - the receiver's security predicate.
//!
//! An incoming offer is accepted only if every rule holds:
//! 1. the receiver gives nothing away
//! 2. the receiver gets at least one item
//! 3. the message equals the expected trade key exactly
//! 4. the offer is Active
//! 5. the counterparty equals the expected sender, when one is configured
//!
//! Evaluation never panics and never errors: an unresolvable counterparty
//! is simply a non-match.

use super::offer::{OfferState, SteamId, TradeOffer};
use super::trade_key::TradeKey;

/// First rule an offer failed, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// The offer asks the receiver to give items.
    GivesItems,
    /// The offer transfers nothing to the receiver.
    ReceivesNothing,
    /// Message does not equal the trade key.
    KeyMismatch,
    /// Offer is not in the Active state.
    NotActive(OfferState),
    /// Counterparty differs from the configured sender.
    UnexpectedCounterparty,
    /// Counterparty could not be resolved while one is expected.
    UnresolvedCounterparty,
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::GivesItems => write!(f, "offer asks us to give items"),
            Self::ReceivesNothing => write!(f, "offer contains nothing to receive"),
            Self::KeyMismatch => write!(f, "message does not carry the trade key"),
            Self::NotActive(state) => write!(f, "offer is {state}, not Active"),
            Self::UnexpectedCounterparty => write!(f, "unexpected counterparty"),
            Self::UnresolvedCounterparty => write!(f, "counterparty could not be resolved"),
        }
    }
}

/// Security predicate bound to one trade key.
#[derive(Debug, Clone)]
pub struct OfferMatcher {
    key: TradeKey,
    expected_counterparty: Option<SteamId>,
}

impl OfferMatcher {
    /// Create a matcher for `key`, optionally pinned to one sender.
    pub const fn new(key: TradeKey, expected_counterparty: Option<SteamId>) -> Self {
        Self {
            key,
            expected_counterparty,
        }
    }

    /// The key this matcher looks for.
    pub const fn key(&self) -> &TradeKey {
        &self.key
    }

    /// Check every rule, returning the first one that fails.
    ///
    /// # Errors
    /// Returns the `Rejection` describing the first failed rule.
    pub fn evaluate(&self, offer: &TradeOffer) -> Result<(), Rejection> {
        if !offer.items_to_give.is_empty() {
            return Err(Rejection::GivesItems);
        }
        if offer.items_to_receive.is_empty() {
            return Err(Rejection::ReceivesNothing);
        }
        if !self.key.matches(&offer.message) {
            return Err(Rejection::KeyMismatch);
        }
        if offer.state != OfferState::Active {
            return Err(Rejection::NotActive(offer.state));
        }
        if let Some(expected) = self.expected_counterparty {
            match offer.counterparty() {
                Ok(actual) if actual == expected => {}
                Ok(_) => return Err(Rejection::UnexpectedCounterparty),
                Err(_) => return Err(Rejection::UnresolvedCounterparty),
            }
        }
        Ok(())
    }

    /// First matching offer in listing order.
    ///
    /// `rejected` sees each offer passed over before the match, with
    /// the rule it failed.
    pub fn first_match<'a, F>(&self, offers: &'a [TradeOffer], mut rejected: F) -> Option<&'a TradeOffer>
    where
        F: FnMut(&TradeOffer, Rejection),
    {
        offers.iter().find(|offer| match self.evaluate(offer) {
            Ok(()) => true,
            Err(rejection) => {
                rejected(offer, rejection);
                false
            }
        })
    }
}
