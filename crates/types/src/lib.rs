//! Core type definitions for confidential sealed-bid auctions.
//!
//! This crate provides the shared data structures used across the auction system:
//! opaque ciphertext handles and proofs, the auction and bid records kept by the
//! module, revealed statistics, and the events emitted on every transition.

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};
use serde_with::serde_as;
use std::fmt;

pub mod rpc;

// =========================
// IDENTIFIERS
// =========================

/// Generic address type (32 bytes)
pub type Address = [u8; 32];

/// Auction identifier, assigned from a monotonic counter.
pub type AuctionId = u64;

/// Decryption request identifier, issued by the oracle.
pub type RequestId = u64;

// =========================
// CIPHERTEXTS AND PROOFS
// =========================

/// Opaque reference to an encrypted 64-bit value held by the coprocessor.
#[serde_as]
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    BorshSerialize,
    BorshDeserialize,
    Serialize,
    Deserialize,
)]
pub struct CiphertextHandle(#[serde_as(as = "[_; 32]")] pub [u8; 32]);

impl CiphertextHandle {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for CiphertextHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

/// Opaque reference to an encrypted boolean (result of an encrypted comparison).
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, BorshSerialize, BorshDeserialize, Serialize, Deserialize,
)]
pub struct EncryptedBool(pub CiphertextHandle);

/// Proof that an encrypted input was produced for a given owner.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct InputProof(#[serde_as(as = "[_; 32]")] pub [u8; 32]);

/// An encrypted bid amount as submitted by a bidder.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct EncryptedInput {
    pub handle: CiphertextHandle,
    pub proof: InputProof,
}

/// Authenticity proof attached to a decryption response. Opaque bytes whose
/// format is defined by the oracle.
#[derive(Clone, Debug, Default, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct DecryptionProof(pub Vec<u8>);

/// Oracle response to a batch decryption request.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct DecryptionResponse {
    pub request_id: RequestId,
    /// Plaintexts in the order the handles were submitted
    pub plaintexts: Vec<u64>,
    pub proof: DecryptionProof,
}

/// Encrypted running statistics of an auction.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct EncryptedAggregates {
    pub high: CiphertextHandle,
    pub low: CiphertextHandle,
    pub sum: CiphertextHandle,
}

// =========================
// AUCTION TYPES
// =========================

/// Descriptive metadata for the auctioned item.
#[derive(Clone, Debug, Default, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct AuctionMetadata {
    pub name: String,
    pub description: Option<String>,
}

/// Auction lifecycle phase, derived from the record flags and the current time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub enum AuctionPhase {
    /// Accepting bids
    Open,
    /// No longer accepting bids, finalization not yet requested
    Closed,
    /// Waiting for the oracle callback
    DecryptionPending,
    /// Winner and statistics revealed
    Finalized,
}

/// Auction record.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct Auction {
    pub auction_id: AuctionId,
    pub creator: Address,
    pub metadata: AuctionMetadata,

    // Timing
    pub created_at: u64,
    pub deadline: u64,

    // Lifecycle
    pub closed: bool,
    pub pending_request: Option<RequestId>,
    pub requested_at: Option<u64>,
    pub finalized: bool,

    // Encrypted running statistics
    pub bid_count: u32,
    pub aggregates: EncryptedAggregates,

    /// Revealed statistics, present iff finalized
    pub result: Option<AuctionStats>,
}

impl Auction {
    /// Whether a decryption request is in flight for this auction.
    pub fn decryption_pending(&self) -> bool {
        self.pending_request.is_some()
    }

    /// Whether bids may still be placed at `now`.
    pub fn accepts_bids(&self, now: u64) -> bool {
        !self.closed && !self.finalized && now < self.deadline
    }

    /// Lifecycle phase at `now`.
    pub fn phase(&self, now: u64) -> AuctionPhase {
        if self.finalized {
            AuctionPhase::Finalized
        } else if self.decryption_pending() {
            AuctionPhase::DecryptionPending
        } else if self.closed || now >= self.deadline {
            AuctionPhase::Closed
        } else {
            AuctionPhase::Open
        }
    }
}

/// A submitted encrypted bid. Its position in the auction's bid list is its
/// only durable reference.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct Bid {
    pub bidder: Address,
    pub amount: CiphertextHandle,
    pub submitted_at: u64,
}

/// Revealed auction statistics.
#[derive(Clone, Debug, Default, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct AuctionStats {
    pub bid_count: u32,
    pub average: u64,
    pub high: u64,
    pub low: u64,
    pub sum: u128,
    pub winner: Option<Address>,
    pub winner_index: Option<u32>,
}

impl AuctionStats {
    /// Statistics of an auction that closed without bids.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn winner_info(&self) -> WinnerInfo {
        WinnerInfo {
            winner: self.winner,
            winning_bid: self.high,
            winner_index: self.winner_index,
        }
    }
}

/// Winner lookup result.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct WinnerInfo {
    pub winner: Option<Address>,
    pub winning_bid: u64,
    pub winner_index: Option<u32>,
}

// =========================
// EVENTS
// =========================

/// Notifications emitted by the auction module.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub enum AuctionEvent {
    Created {
        auction_id: AuctionId,
        creator: Address,
        deadline: u64,
    },
    BidPlaced {
        auction_id: AuctionId,
        bidder: Address,
        bid_index: u32,
    },
    Closed {
        auction_id: AuctionId,
    },
    DecryptionRequested {
        auction_id: AuctionId,
        request_id: RequestId,
        bid_count: u32,
    },
    Finalized {
        auction_id: AuctionId,
        stats: AuctionStats,
    },
    DecryptionExpired {
        auction_id: AuctionId,
        request_id: RequestId,
    },
}

impl AuctionEvent {
    pub fn auction_id(&self) -> AuctionId {
        match self {
            AuctionEvent::Created { auction_id, .. }
            | AuctionEvent::BidPlaced { auction_id, .. }
            | AuctionEvent::Closed { auction_id }
            | AuctionEvent::DecryptionRequested { auction_id, .. }
            | AuctionEvent::Finalized { auction_id, .. }
            | AuctionEvent::DecryptionExpired { auction_id, .. } => *auction_id,
        }
    }
}

/// An event together with its position in the module's event log.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct EventRecord {
    pub sequence: u64,
    pub timestamp: u64,
    pub event: AuctionEvent,
}
