//! Typed role failures.
//!
//! Every variant ends the process with exit code 1; the variant only
//! decides what gets logged and alerted.

use thiserror::Error;

/// Why a role gave up.
#[derive(Debug, Error)]
pub enum RoleError {
  /// Missing or invalid configuration (key, credentials, trade URL).
  #[error("configuration error: {0}")]
  Config(String),

  /// The offer could not be submitted.
  #[error("offer submission failed: {0}")]
  Submission(String),

  /// The out-of-band confirmation never went through.
  #[error("confirmation of offer {offer_id} failed after {attempts} attempts: {last_error}")]
  ConfirmationExhausted {
    /// Offer left unconfirmed.
    offer_id: String,
    /// Attempts made.
    attempts: u32,
    /// Error of the final attempt.
    last_error: String,
  },

  /// The supervisor ended in `Failed`.
  #[error("settlement failed: {0}")]
  SettlementFailed(String),
}

impl RoleError {
  /// Process exit code for this failure.
  pub const fn exit_code(&self) -> i32 {
    1
  }
}
