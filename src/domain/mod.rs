//! Domain layer - Core settlement logic and models.
//!
//! Pure types and state machines for the handoff: offers, trade keys,
//! inventory partitions, the receiver's security predicate, the
//! supervisor's watch state, retry schedules and ban classification.
//! No I/O here (hexagonal architecture inner ring).

pub mod ban;
pub mod matcher;
pub mod offer;
pub mod partition;
pub mod retry;
pub mod trade_key;
pub mod watch;

// Re-export core types for convenience
pub use ban::{BanStatus, CheckTally};
pub use matcher::{OfferMatcher, Rejection};
pub use offer::{Asset, OfferId, OfferState, SteamId, TradeOffer};
pub use partition::InventoryPartition;
pub use retry::RetryPolicy;
pub use trade_key::TradeKey;
pub use watch::{Escalation, FailureReason, Phase, WatchState};
