//! Auction module error types.

use auction_coprocessor::CoprocessorError;
use auction_types::{AuctionId, RequestId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur in the auction module.
///
/// Every variant is detected before the handler writes anything, so a failed
/// call leaves the module state exactly as it was.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum AuctionError {
    #[error("Auction not found: {0}")]
    AuctionNotFound(AuctionId),

    #[error("Deadline must be in the future")]
    InvalidDeadline,

    #[error("Not authorized")]
    Unauthorized,

    #[error("Auction is closed for bidding")]
    AuctionClosed,

    #[error("Auction already closed")]
    AlreadyClosed,

    #[error("Auction already finalized")]
    AlreadyFinalized,

    #[error("Auction is still open")]
    AuctionStillOpen,

    #[error("Decryption already pending")]
    DecryptionAlreadyPending,

    #[error("Auction not finalized")]
    NotFinalized,

    #[error("Unknown decryption request: {0}")]
    UnknownRequest(RequestId),

    #[error("No pending decryption")]
    NoPendingDecryption,

    #[error("Invalid decryption proof")]
    ProofInvalid,

    #[error("Plaintext count mismatch: expected {expected}, got {got}")]
    PlaintextCountMismatch { expected: u32, got: usize },

    #[error("Decryption request id {0} is already in flight")]
    RequestIdReused(RequestId),

    #[error("Invalid encrypted input")]
    InvalidInput,

    #[error("Bid limit reached")]
    TooManyBids,

    #[error("Decryption request not expired until {expires_at}")]
    DecryptionNotExpired { expires_at: u64 },

    #[error("Decryption timeout not configured")]
    TimeoutDisabled,

    #[error("Coprocessor error: {0}")]
    Coprocessor(String),
}

impl From<CoprocessorError> for AuctionError {
    fn from(e: CoprocessorError) -> Self {
        match e {
            CoprocessorError::InvalidInputProof => AuctionError::InvalidInput,
            other => AuctionError::Coprocessor(other.to_string()),
        }
    }
}
