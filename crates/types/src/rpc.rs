//! JSON-RPC wire types shared by the mock chain and the client.
//!
//! Binary values (addresses, handles, proofs) travel hex-encoded.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    Address, Auction, AuctionEvent, AuctionStats, Bid, CiphertextHandle, EncryptedInput,
    EventRecord, InputProof, WinnerInfo,
};

/// Errors decoding hex-encoded RPC fields.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HexDecodeError {
    #[error("Invalid hex in {field}: {reason}")]
    InvalidHex { field: &'static str, reason: String },

    #[error("{field} must be {expected} bytes, got {got}")]
    InvalidLength {
        field: &'static str,
        expected: usize,
        got: usize,
    },
}

/// Decode a hex string (optionally `0x`-prefixed) into exactly 32 bytes.
pub fn decode_hex32(field: &'static str, s: &str) -> Result<[u8; 32], HexDecodeError> {
    let bytes = hex::decode(s.trim_start_matches("0x")).map_err(|e| HexDecodeError::InvalidHex {
        field,
        reason: e.to_string(),
    })?;
    let got = bytes.len();
    bytes.try_into().map_err(|_| HexDecodeError::InvalidLength {
        field,
        expected: 32,
        got,
    })
}

/// Decode a hex-encoded address.
pub fn parse_address(s: &str) -> Result<Address, HexDecodeError> {
    decode_hex32("address", s)
}

/// Hex-encode an address.
pub fn format_address(address: &Address) -> String {
    hex::encode(address)
}

/// Genesis configuration for RPC.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenesisConfigRpc {
    pub decryption_timeout: Option<u64>,
    pub max_bids_per_auction: Option<u32>,
    pub initial_timestamp: Option<u64>,
}

/// Block info response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockInfo {
    pub height: u64,
    pub timestamp: u64,
}

/// Parameters for encrypting a bid amount through the coprocessor gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptInputParams {
    pub sender: String,
    pub amount: u64,
}

/// Encrypted input for RPC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedInputRpc {
    /// Hex-encoded handle (32 bytes)
    pub handle: String,
    /// Hex-encoded input proof (32 bytes)
    pub proof: String,
}

impl From<&EncryptedInput> for EncryptedInputRpc {
    fn from(input: &EncryptedInput) -> Self {
        Self {
            handle: hex::encode(input.handle.0),
            proof: hex::encode(input.proof.0),
        }
    }
}

impl TryFrom<&EncryptedInputRpc> for EncryptedInput {
    type Error = HexDecodeError;

    fn try_from(rpc: &EncryptedInputRpc) -> Result<Self, Self::Error> {
        Ok(Self {
            handle: CiphertextHandle(decode_hex32("handle", &rpc.handle)?),
            proof: InputProof(decode_hex32("proof", &rpc.proof)?),
        })
    }
}

/// Parameters for creating an auction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAuctionParams {
    pub sender: String,
    pub name: String,
    pub description: Option<String>,
    pub deadline: u64,
}

/// Parameters for placing a bid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaceBidParams {
    pub sender: String,
    pub auction_id: u64,
    pub input: EncryptedInputRpc,
}

/// Result of a finalization request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalizeOutcomeRpc {
    /// Set when the auction finalized without an oracle round trip
    pub stats: Option<AuctionStatsRpc>,
    /// Set when a decryption request was issued
    pub request_id: Option<u64>,
}

/// Auction record for RPC responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuctionRpc {
    pub auction_id: u64,
    pub creator: String,
    pub name: String,
    pub description: Option<String>,
    pub phase: String,
    pub created_at: u64,
    pub deadline: u64,
    pub closed: bool,
    pub finalized: bool,
    pub pending_request: Option<u64>,
    pub bid_count: u32,
}

impl AuctionRpc {
    /// Render an auction as seen at `now`.
    pub fn new(a: &Auction, now: u64) -> Self {
        Self {
            auction_id: a.auction_id,
            creator: hex::encode(a.creator),
            name: a.metadata.name.clone(),
            description: a.metadata.description.clone(),
            phase: format!("{:?}", a.phase(now)),
            created_at: a.created_at,
            deadline: a.deadline,
            closed: a.closed,
            finalized: a.finalized,
            pending_request: a.pending_request,
            bid_count: a.bid_count,
        }
    }
}

/// Auction listing entry for RPC responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuctionSummaryRpc {
    pub auction_id: u64,
    pub creator: String,
    pub name: String,
    pub phase: String,
    pub deadline: u64,
    pub bid_count: u32,
}

/// Bid for RPC responses. The amount stays an opaque handle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BidRpc {
    pub index: u32,
    pub bidder: String,
    pub amount: String,
    pub submitted_at: u64,
}

impl BidRpc {
    pub fn new(index: u32, b: &Bid) -> Self {
        Self {
            index,
            bidder: hex::encode(b.bidder),
            amount: hex::encode(b.amount.0),
            submitted_at: b.submitted_at,
        }
    }
}

/// Revealed statistics for RPC responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuctionStatsRpc {
    pub bid_count: u32,
    pub average: u64,
    pub high: u64,
    pub low: u64,
    /// Decimal string, the sum may exceed 64 bits
    pub sum: String,
    pub winner: Option<String>,
    pub winner_index: Option<u32>,
}

impl From<&AuctionStats> for AuctionStatsRpc {
    fn from(s: &AuctionStats) -> Self {
        Self {
            bid_count: s.bid_count,
            average: s.average,
            high: s.high,
            low: s.low,
            sum: s.sum.to_string(),
            winner: s.winner.map(hex::encode),
            winner_index: s.winner_index,
        }
    }
}

/// Winner lookup for RPC responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WinnerInfoRpc {
    pub winner: Option<String>,
    pub winning_bid: u64,
    pub winner_index: Option<u32>,
}

impl From<&WinnerInfo> for WinnerInfoRpc {
    fn from(w: &WinnerInfo) -> Self {
        Self {
            winner: w.winner.map(hex::encode),
            winning_bid: w.winning_bid,
            winner_index: w.winner_index,
        }
    }
}

/// Event log entry for RPC responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRpc {
    pub sequence: u64,
    pub timestamp: u64,
    pub auction_id: u64,
    pub kind: String,
    pub detail: String,
}

impl From<&EventRecord> for EventRpc {
    fn from(r: &EventRecord) -> Self {
        let (kind, detail) = match &r.event {
            AuctionEvent::Created {
                creator, deadline, ..
            } => (
                "created",
                format!("creator={} deadline={}", hex::encode(creator), deadline),
            ),
            AuctionEvent::BidPlaced {
                bidder, bid_index, ..
            } => (
                "bid_placed",
                format!("bidder={} index={}", hex::encode(bidder), bid_index),
            ),
            AuctionEvent::Closed { .. } => ("closed", String::new()),
            AuctionEvent::DecryptionRequested {
                request_id,
                bid_count,
                ..
            } => (
                "decryption_requested",
                format!("request={} bids={}", request_id, bid_count),
            ),
            AuctionEvent::Finalized { stats, .. } => (
                "finalized",
                format!(
                    "bids={} high={} low={} average={} winner={}",
                    stats.bid_count,
                    stats.high,
                    stats.low,
                    stats.average,
                    stats.winner.map(hex::encode).unwrap_or_else(|| "none".into())
                ),
            ),
            AuctionEvent::DecryptionExpired { request_id, .. } => {
                ("decryption_expired", format!("request={}", request_id))
            }
        };
        Self {
            sequence: r.sequence,
            timestamp: r.timestamp,
            auction_id: r.event.auction_id(),
            kind: kind.to_string(),
            detail,
        }
    }
}

/// In-flight decryption request for RPC responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingDecryptionRpc {
    pub request_id: u64,
    pub auction_id: u64,
    pub requested_at: u64,
    pub handle_count: u32,
    pub expires_at: Option<u64>,
    pub expired: bool,
}

/// Outcome of one relay pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelayReportRpc {
    pub delivered: Vec<u64>,
    pub rejected: Vec<(u64, String)>,
}
