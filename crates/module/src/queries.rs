//! Query handlers for the auction module.
//!
//! These functions provide read-only access to auction state. Encrypted
//! aggregates are never returned; revealed statistics exist only after
//! finalization.

use auction_types::{
    Address, Auction, AuctionId, AuctionPhase, AuctionStats, Bid, EventRecord, RequestId,
    WinnerInfo,
};
use serde::{Deserialize, Serialize};

use crate::error::AuctionError;
use crate::events::events_since;
use crate::state::AuctionState as ModuleState;

/// Query request types.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum AuctionQuery {
    /// Get auction details by ID.
    GetAuction { auction_id: AuctionId },

    /// Get auctions ordered by ID (paginated).
    ListAuctions { offset: u64, limit: u64 },

    /// Get all bids for an auction.
    GetAuctionBids { auction_id: AuctionId },

    /// Get revealed statistics.
    GetStats { auction_id: AuctionId },

    /// Get the winner of a finalized auction.
    GetWinnerInfo { auction_id: AuctionId },

    /// Get outstanding decryption requests.
    GetPendingDecryptions,

    /// Get events starting at a sequence number.
    GetEvents { since: u64, limit: u64 },
}

/// Query response types.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum AuctionQueryResponse {
    /// Auction details.
    Auction(Option<Auction>),

    /// List of auctions.
    AuctionList(Vec<AuctionSummary>),

    /// Bids for an auction.
    Bids(Result<Vec<Bid>, AuctionError>),

    /// Revealed statistics.
    Stats(Result<AuctionStats, AuctionError>),

    /// Winner details.
    Winner(Result<WinnerInfo, AuctionError>),

    /// In-flight decryption requests.
    PendingDecryptions(Vec<PendingDecryptionInfo>),

    /// Event log page.
    Events(Vec<EventRecord>),
}

/// Handle a query at time `now`.
pub fn handle_query(state: &ModuleState, now: u64, query: AuctionQuery) -> AuctionQueryResponse {
    match query {
        AuctionQuery::GetAuction { auction_id } => {
            AuctionQueryResponse::Auction(state.get_auction(auction_id).cloned())
        }

        AuctionQuery::ListAuctions { offset, limit } => AuctionQueryResponse::AuctionList(
            get_auction_summaries(state, now, offset as usize, limit as usize),
        ),

        AuctionQuery::GetAuctionBids { auction_id } => {
            AuctionQueryResponse::Bids(get_auction_bids(state, auction_id).map(<[Bid]>::to_vec))
        }

        AuctionQuery::GetStats { auction_id } => {
            AuctionQueryResponse::Stats(get_stats(state, auction_id).cloned())
        }

        AuctionQuery::GetWinnerInfo { auction_id } => {
            AuctionQueryResponse::Winner(get_winner_info(state, auction_id))
        }

        AuctionQuery::GetPendingDecryptions => {
            AuctionQueryResponse::PendingDecryptions(get_pending_decryptions(state, now))
        }

        AuctionQuery::GetEvents { since, limit } => AuctionQueryResponse::Events(
            events_since(state, since, limit as usize).to_vec(),
        ),
    }
}

/// Bids of an existing auction, in index order.
pub fn get_auction_bids(state: &ModuleState, auction_id: AuctionId) -> Result<&[Bid], AuctionError> {
    state
        .get_auction(auction_id)
        .ok_or(AuctionError::AuctionNotFound(auction_id))?;
    Ok(state.get_auction_bids(auction_id))
}

/// Revealed statistics of a finalized auction.
pub fn get_stats(state: &ModuleState, auction_id: AuctionId) -> Result<&AuctionStats, AuctionError> {
    let auction = state
        .get_auction(auction_id)
        .ok_or(AuctionError::AuctionNotFound(auction_id))?;
    auction.result.as_ref().ok_or(AuctionError::NotFinalized)
}

/// Winner, winning bid and winning index of a finalized auction.
pub fn get_winner_info(state: &ModuleState, auction_id: AuctionId) -> Result<WinnerInfo, AuctionError> {
    get_stats(state, auction_id).map(AuctionStats::winner_info)
}

/// Summary of an auction for listing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuctionSummary {
    pub auction_id: AuctionId,
    pub creator: Address,
    pub name: String,
    pub phase: AuctionPhase,
    pub deadline: u64,
    pub bid_count: u32,
}

impl AuctionSummary {
    /// Create summary from an auction record.
    pub fn from_auction(auction: &Auction, now: u64) -> Self {
        Self {
            auction_id: auction.auction_id,
            creator: auction.creator,
            name: auction.metadata.name.clone(),
            phase: auction.phase(now),
            deadline: auction.deadline,
            bid_count: auction.bid_count,
        }
    }
}

/// Get auction summaries for listing.
pub fn get_auction_summaries(
    state: &ModuleState,
    now: u64,
    offset: usize,
    limit: usize,
) -> Vec<AuctionSummary> {
    state
        .auctions
        .values()
        .skip(offset)
        .take(limit)
        .map(|auction| AuctionSummary::from_auction(auction, now))
        .collect()
}

/// An outstanding decryption request as seen from outside.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingDecryptionInfo {
    pub request_id: RequestId,
    pub auction_id: AuctionId,
    pub requested_at: u64,
    pub handle_count: u32,
    /// When the request becomes expirable; `None` without a configured timeout
    pub expires_at: Option<u64>,
    pub expired: bool,
}

/// Get in-flight decryption requests, ordered by request ID.
pub fn get_pending_decryptions(state: &ModuleState, now: u64) -> Vec<PendingDecryptionInfo> {
    let mut pending: Vec<PendingDecryptionInfo> = state
        .pending_decryptions
        .iter()
        .map(|(&request_id, record)| {
            let expires_at = state
                .config
                .decryption_timeout
                .map(|timeout| record.requested_at.saturating_add(timeout));
            PendingDecryptionInfo {
                request_id,
                auction_id: record.auction_id,
                requested_at: record.requested_at,
                handle_count: record.handle_count,
                expires_at,
                expired: expires_at.is_some_and(|at| now >= at),
            }
        })
        .collect();
    pending.sort_by_key(|info| info.request_id);
    pending
}
