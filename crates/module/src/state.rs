//! On-chain state structures for the auction module.

use auction_types::{Auction, AuctionEvent, AuctionId, Bid, EventRecord, RequestId};
use std::collections::{BTreeMap, HashMap};

use crate::genesis::{AuctionGenesisConfig, GenesisValidationError};

/// Correlation record for an in-flight decryption request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PendingDecryption {
    pub auction_id: AuctionId,
    pub requested_at: u64,
    /// Number of handles submitted, in bid index order
    pub handle_count: u32,
}

/// Auction module state.
///
/// In a real rollup these would be StateMap/StateValue types. This is the
/// in-memory representation used by the mock chain and tests.
#[derive(Debug, Default)]
pub struct AuctionState {
    /// Module configuration
    pub config: AuctionGenesisConfig,

    /// Next auction ID to assign
    pub next_auction_id: AuctionId,

    /// All auctions by ID
    pub auctions: BTreeMap<AuctionId, Auction>,

    /// Append-only bid lists per auction
    pub bids: HashMap<AuctionId, Vec<Bid>>,

    /// Outstanding decryption requests: request_id -> correlation record
    pub pending_decryptions: HashMap<RequestId, PendingDecryption>,

    /// Ordered event log
    pub events: Vec<EventRecord>,
}

impl AuctionState {
    /// Create a new auction state with the default configuration.
    pub fn new() -> Self {
        Self {
            next_auction_id: 1,
            ..Default::default()
        }
    }

    /// Create a state from a validated genesis configuration.
    pub fn from_genesis(config: AuctionGenesisConfig) -> Result<Self, GenesisValidationError> {
        config.validate()?;
        Ok(Self {
            config,
            ..Self::new()
        })
    }

    /// Get the next auction ID and increment.
    pub fn allocate_auction_id(&mut self) -> AuctionId {
        let id = self.next_auction_id;
        self.next_auction_id += 1;
        id
    }

    /// Get auction by ID.
    pub fn get_auction(&self, auction_id: AuctionId) -> Option<&Auction> {
        self.auctions.get(&auction_id)
    }

    /// Get mutable auction by ID.
    pub fn get_auction_mut(&mut self, auction_id: AuctionId) -> Option<&mut Auction> {
        self.auctions.get_mut(&auction_id)
    }

    /// Get all bids for an auction, in submission order.
    pub fn get_auction_bids(&self, auction_id: AuctionId) -> &[Bid] {
        self.bids
            .get(&auction_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Append an event to the log and return its sequence number.
    pub fn emit(&mut self, timestamp: u64, event: AuctionEvent) -> u64 {
        let sequence = self.events.len() as u64;
        self.events.push(EventRecord {
            sequence,
            timestamp,
            event,
        });
        sequence
    }

    /// Check the cross-record invariants, reporting the first violation found.
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        for (&auction_id, auction) in &self.auctions {
            let stored = self.get_auction_bids(auction_id).len();
            if auction.bid_count as usize != stored {
                return Err(InvariantViolation::BidCountMismatch {
                    auction_id,
                    bid_count: auction.bid_count,
                    stored,
                });
            }
            if auction.finalized && auction.decryption_pending() {
                return Err(InvariantViolation::FinalizedWhilePending(auction_id));
            }
            if auction.finalized != auction.result.is_some() {
                return Err(InvariantViolation::ResultMismatch(auction_id));
            }
            if let Some(request_id) = auction.pending_request {
                match self.pending_decryptions.get(&request_id) {
                    Some(record) if record.auction_id == auction_id => {}
                    _ => {
                        return Err(InvariantViolation::MissingCorrelation {
                            auction_id,
                            request_id,
                        })
                    }
                }
            }
        }
        for (&request_id, record) in &self.pending_decryptions {
            let owner = self
                .get_auction(record.auction_id)
                .and_then(|a| a.pending_request);
            if owner != Some(request_id) {
                return Err(InvariantViolation::OrphanCorrelation(request_id));
            }
        }
        Ok(())
    }
}

/// Inconsistencies between auction records, bid lists and correlation records.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvariantViolation {
    #[error("Auction {auction_id}: bid_count {bid_count} but {stored} bids stored")]
    BidCountMismatch {
        auction_id: AuctionId,
        bid_count: u32,
        stored: usize,
    },

    #[error("Auction {0}: finalized with decryption pending")]
    FinalizedWhilePending(AuctionId),

    #[error("Auction {0}: result must be present exactly when finalized")]
    ResultMismatch(AuctionId),

    #[error("Auction {auction_id}: pending request {request_id} has no correlation record")]
    MissingCorrelation {
        auction_id: AuctionId,
        request_id: RequestId,
    },

    #[error("Request {0}: correlation record without a pending auction")]
    OrphanCorrelation(RequestId),
}

#[cfg(test)]
mod tests {
    use super::*;
    use auction_types::{CiphertextHandle, EncryptedAggregates};

    #[test]
    fn test_allocate_auction_id() {
        let mut state = AuctionState::new();
        assert_eq!(state.allocate_auction_id(), 1);
        assert_eq!(state.allocate_auction_id(), 2);
        assert_eq!(state.allocate_auction_id(), 3);
    }

    #[test]
    fn test_emit_assigns_sequence() {
        let mut state = AuctionState::new();
        assert_eq!(state.emit(10, AuctionEvent::Closed { auction_id: 1 }), 0);
        assert_eq!(state.emit(11, AuctionEvent::Closed { auction_id: 2 }), 1);
        assert_eq!(state.events[1].timestamp, 11);
    }

    #[test]
    fn test_bids_of_unknown_auction_empty() {
        let state = AuctionState::new();
        assert!(state.get_auction_bids(42).is_empty());
    }

    #[test]
    fn test_orphan_correlation_record_detected() {
        let mut state = AuctionState::new();
        state.pending_decryptions.insert(
            5,
            PendingDecryption {
                auction_id: 1,
                requested_at: 0,
                handle_count: 1,
            },
        );
        assert_eq!(
            state.check_invariants(),
            Err(InvariantViolation::OrphanCorrelation(5))
        );
    }

    #[test]
    fn test_bid_count_mismatch_detected() {
        let mut state = AuctionState::new();
        state.auctions.insert(
            1,
            Auction {
                auction_id: 1,
                creator: [1u8; 32],
                metadata: Default::default(),
                created_at: 0,
                deadline: 10,
                closed: false,
                pending_request: None,
                requested_at: None,
                finalized: false,
                bid_count: 2,
                aggregates: EncryptedAggregates {
                    high: CiphertextHandle::default(),
                    low: CiphertextHandle::default(),
                    sum: CiphertextHandle::default(),
                },
                result: None,
            },
        );
        assert_eq!(
            state.check_invariants(),
            Err(InvariantViolation::BidCountMismatch {
                auction_id: 1,
                bid_count: 2,
                stored: 0,
            })
        );
    }

    #[test]
    fn test_from_genesis_validates() {
        let config = AuctionGenesisConfig {
            max_bids_per_auction: 0,
            ..Default::default()
        };
        assert!(AuctionState::from_genesis(config).is_err());
        let state = AuctionState::from_genesis(AuctionGenesisConfig::default()).unwrap();
        assert_eq!(state.next_auction_id, 1);
    }
}
