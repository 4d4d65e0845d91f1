//! Call handlers for the auction module.
//!
//! These functions implement the lifecycle state machine and the decryption
//! correlation protocol. Each handler checks every precondition and computes
//! every derived value before its first write, so a returned error means the
//! state is unchanged.

use auction_coprocessor::{DecryptionOracle, HomomorphicOps};
use auction_types::{
    Address, Auction, AuctionEvent, AuctionId, AuctionMetadata, AuctionStats, Bid,
    DecryptionResponse, EncryptedInput, RequestId,
};
use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::call::AuctionCall;
use crate::engine;
use crate::error::AuctionError;
use crate::state::{AuctionState as ModuleState, PendingDecryption};

/// Context provided by the runtime for each call.
pub struct CallContext {
    /// Sender of the transaction
    pub sender: Address,
    /// Current block height
    pub block_height: u64,
    /// Current timestamp
    pub timestamp: u64,
}

/// Result type for handlers.
pub type HandlerResult<T> = Result<T, AuctionError>;

/// What a finalization request did.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub enum FinalizeOutcome {
    /// The auction had no bids and finalized immediately.
    Finalized(AuctionStats),
    /// A decryption request was sent to the oracle.
    DecryptionRequested(RequestId),
}

/// Result of dispatching an [`AuctionCall`].
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub enum CallOutcome {
    AuctionCreated(AuctionId),
    BidPlaced { bid_index: u32 },
    Closed,
    Finalize(FinalizeOutcome),
    Finalized(AuctionStats),
    DecryptionExpired(RequestId),
}

fn auction_ref(state: &ModuleState, auction_id: AuctionId) -> HandlerResult<&Auction> {
    state
        .get_auction(auction_id)
        .ok_or(AuctionError::AuctionNotFound(auction_id))
}

fn auction_mut(state: &mut ModuleState, auction_id: AuctionId) -> HandlerResult<&mut Auction> {
    state
        .get_auction_mut(auction_id)
        .ok_or(AuctionError::AuctionNotFound(auction_id))
}

/// Dispatch a call message to its handler.
pub fn handle_call<C>(
    state: &mut ModuleState,
    coprocessor: &C,
    ctx: &CallContext,
    call: AuctionCall,
) -> HandlerResult<CallOutcome>
where
    C: HomomorphicOps + DecryptionOracle + ?Sized,
{
    match call {
        AuctionCall::CreateAuction { metadata, deadline } => {
            handle_create_auction(state, coprocessor, ctx, metadata, deadline)
                .map(CallOutcome::AuctionCreated)
        }
        AuctionCall::PlaceBid { auction_id, input } => {
            handle_place_bid(state, coprocessor, ctx, auction_id, &input)
                .map(|bid_index| CallOutcome::BidPlaced { bid_index })
        }
        AuctionCall::CloseAuction { auction_id } => {
            handle_close_auction(state, ctx, auction_id).map(|()| CallOutcome::Closed)
        }
        AuctionCall::RequestFinalize { auction_id } => {
            handle_request_finalize(state, coprocessor, ctx, auction_id).map(CallOutcome::Finalize)
        }
        AuctionCall::DecryptionCallback { response } => {
            handle_decryption_callback(state, coprocessor, ctx, response)
                .map(CallOutcome::Finalized)
        }
        AuctionCall::ExpireDecryption { auction_id } => {
            handle_expire_decryption(state, ctx, auction_id).map(CallOutcome::DecryptionExpired)
        }
    }
}

/// Handle CreateAuction call.
pub fn handle_create_auction<C>(
    state: &mut ModuleState,
    ops: &C,
    ctx: &CallContext,
    metadata: AuctionMetadata,
    deadline: u64,
) -> HandlerResult<AuctionId>
where
    C: HomomorphicOps + ?Sized,
{
    if deadline <= ctx.timestamp {
        return Err(AuctionError::InvalidDeadline);
    }

    let aggregates = engine::initial_aggregates(ops)?;

    let auction_id = state.allocate_auction_id();
    let auction = Auction {
        auction_id,
        creator: ctx.sender,
        metadata,
        created_at: ctx.timestamp,
        deadline,
        closed: false,
        pending_request: None,
        requested_at: None,
        finalized: false,
        bid_count: 0,
        aggregates,
        result: None,
    };

    state.auctions.insert(auction_id, auction);
    state.bids.insert(auction_id, Vec::new());
    state.emit(
        ctx.timestamp,
        AuctionEvent::Created {
            auction_id,
            creator: ctx.sender,
            deadline,
        },
    );

    info!(auction_id, deadline, "Auction created");
    Ok(auction_id)
}

/// Handle PlaceBid call. Returns the index of the new bid.
pub fn handle_place_bid<C>(
    state: &mut ModuleState,
    ops: &C,
    ctx: &CallContext,
    auction_id: AuctionId,
    input: &EncryptedInput,
) -> HandlerResult<u32>
where
    C: HomomorphicOps + ?Sized,
{
    let auction = auction_ref(state, auction_id)?;

    if auction.finalized {
        return Err(AuctionError::AlreadyFinalized);
    }
    if !auction.accepts_bids(ctx.timestamp) {
        return Err(AuctionError::AuctionClosed);
    }
    if auction.bid_count >= state.config.max_bids_per_auction {
        return Err(AuctionError::TooManyBids);
    }

    let amount = ops.verify_input(input, &ctx.sender)?;
    let aggregates = engine::fold_bid(ops, &auction.aggregates, &amount)?;
    let bid_index = auction.bid_count;

    state.bids.entry(auction_id).or_default().push(Bid {
        bidder: ctx.sender,
        amount,
        submitted_at: ctx.timestamp,
    });
    let auction = auction_mut(state, auction_id)?;
    auction.bid_count += 1;
    auction.aggregates = aggregates;

    state.emit(
        ctx.timestamp,
        AuctionEvent::BidPlaced {
            auction_id,
            bidder: ctx.sender,
            bid_index,
        },
    );

    debug!(auction_id, bid_index, "Bid folded into encrypted aggregates");
    Ok(bid_index)
}

/// Handle CloseAuction call. Only the creator may close early.
pub fn handle_close_auction(
    state: &mut ModuleState,
    ctx: &CallContext,
    auction_id: AuctionId,
) -> HandlerResult<()> {
    let auction = auction_mut(state, auction_id)?;

    if ctx.sender != auction.creator {
        return Err(AuctionError::Unauthorized);
    }
    if auction.finalized {
        return Err(AuctionError::AlreadyFinalized);
    }
    if auction.closed || ctx.timestamp >= auction.deadline {
        return Err(AuctionError::AlreadyClosed);
    }

    auction.closed = true;
    state.emit(ctx.timestamp, AuctionEvent::Closed { auction_id });

    info!(auction_id, "Auction closed by creator");
    Ok(())
}

/// Handle RequestFinalize call (permissionless).
///
/// Auctions without bids finalize immediately. Otherwise every bid handle, in
/// index order, goes to the oracle as one batch and the auction waits for the
/// callback.
pub fn handle_request_finalize<O>(
    state: &mut ModuleState,
    oracle: &O,
    ctx: &CallContext,
    auction_id: AuctionId,
) -> HandlerResult<FinalizeOutcome>
where
    O: DecryptionOracle + ?Sized,
{
    let auction = auction_ref(state, auction_id)?;

    if auction.finalized {
        return Err(AuctionError::AlreadyFinalized);
    }
    if auction.decryption_pending() {
        return Err(AuctionError::DecryptionAlreadyPending);
    }
    if !auction.closed && ctx.timestamp < auction.deadline {
        return Err(AuctionError::AuctionStillOpen);
    }

    if auction.bid_count == 0 {
        let stats = AuctionStats::empty();
        let auction = auction_mut(state, auction_id)?;
        auction.closed = true;
        auction.finalized = true;
        auction.result = Some(stats.clone());
        state.emit(
            ctx.timestamp,
            AuctionEvent::Finalized {
                auction_id,
                stats: stats.clone(),
            },
        );

        info!(auction_id, "Auction finalized without bids");
        return Ok(FinalizeOutcome::Finalized(stats));
    }

    let handles: Vec<_> = state
        .get_auction_bids(auction_id)
        .iter()
        .map(|bid| bid.amount)
        .collect();
    let handle_count = handles.len() as u32;

    // Oracles issue fresh ids; a collision means the oracle broke that contract.
    let request_id = oracle.request_decryption(&handles)?;
    if state.pending_decryptions.contains_key(&request_id) {
        return Err(AuctionError::RequestIdReused(request_id));
    }

    state.pending_decryptions.insert(
        request_id,
        PendingDecryption {
            auction_id,
            requested_at: ctx.timestamp,
            handle_count,
        },
    );
    let auction = auction_mut(state, auction_id)?;
    auction.closed = true;
    auction.pending_request = Some(request_id);
    auction.requested_at = Some(ctx.timestamp);
    state.emit(
        ctx.timestamp,
        AuctionEvent::DecryptionRequested {
            auction_id,
            request_id,
            bid_count: handle_count,
        },
    );

    info!(auction_id, request_id, bids = handle_count, "Decryption requested");
    Ok(FinalizeOutcome::DecryptionRequested(request_id))
}

/// Handle the oracle callback carrying the revealed bid amounts.
///
/// The correlation record is consumed here, so each request finalizes its
/// auction at most once; replays fail with `UnknownRequest`.
pub fn handle_decryption_callback<O>(
    state: &mut ModuleState,
    oracle: &O,
    ctx: &CallContext,
    response: DecryptionResponse,
) -> HandlerResult<AuctionStats>
where
    O: DecryptionOracle + ?Sized,
{
    let DecryptionResponse {
        request_id,
        plaintexts,
        proof,
    } = response;

    let Some(record) = state.pending_decryptions.get(&request_id).copied() else {
        warn!(request_id, "Callback for unknown decryption request");
        return Err(AuctionError::UnknownRequest(request_id));
    };

    if !oracle.verify_decryption_proof(request_id, &plaintexts, &proof) {
        warn!(request_id, auction_id = record.auction_id, "Decryption proof rejected");
        return Err(AuctionError::ProofInvalid);
    }

    let auction_id = record.auction_id;
    let auction = auction_ref(state, auction_id)?;
    if auction.pending_request != Some(request_id) {
        return Err(AuctionError::NoPendingDecryption);
    }

    let bidders: Vec<Address> = state
        .get_auction_bids(auction_id)
        .iter()
        .map(|bid| bid.bidder)
        .collect();
    if plaintexts.len() != record.handle_count as usize || plaintexts.len() != bidders.len() {
        return Err(AuctionError::PlaintextCountMismatch {
            expected: record.handle_count,
            got: plaintexts.len(),
        });
    }

    let stats = engine::tally(&bidders, &plaintexts);

    state.pending_decryptions.remove(&request_id);
    let auction = auction_mut(state, auction_id)?;
    auction.pending_request = None;
    auction.requested_at = None;
    auction.finalized = true;
    auction.result = Some(stats.clone());
    state.emit(
        ctx.timestamp,
        AuctionEvent::Finalized {
            auction_id,
            stats: stats.clone(),
        },
    );

    info!(
        auction_id,
        request_id,
        high = stats.high,
        winner_index = ?stats.winner_index,
        "Auction finalized"
    );
    Ok(stats)
}

/// Handle ExpireDecryption call (permissionless).
///
/// Drops a decryption request that has gone unanswered for longer than the
/// configured timeout. The auction stays closed and finalization may be
/// requested again.
pub fn handle_expire_decryption(
    state: &mut ModuleState,
    ctx: &CallContext,
    auction_id: AuctionId,
) -> HandlerResult<RequestId> {
    let timeout = state.config.decryption_timeout;
    let auction = auction_ref(state, auction_id)?;

    if auction.finalized {
        return Err(AuctionError::AlreadyFinalized);
    }
    let request_id = auction
        .pending_request
        .ok_or(AuctionError::NoPendingDecryption)?;
    let timeout = timeout.ok_or(AuctionError::TimeoutDisabled)?;

    let requested_at = auction.requested_at.unwrap_or(auction.created_at);
    let expires_at = requested_at.saturating_add(timeout);
    if ctx.timestamp < expires_at {
        return Err(AuctionError::DecryptionNotExpired { expires_at });
    }

    state.pending_decryptions.remove(&request_id);
    let auction = auction_mut(state, auction_id)?;
    auction.pending_request = None;
    auction.requested_at = None;
    state.emit(
        ctx.timestamp,
        AuctionEvent::DecryptionExpired {
            auction_id,
            request_id,
        },
    );

    warn!(auction_id, request_id, "Decryption request expired");
    Ok(request_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genesis::AuctionGenesisConfig;
    use auction_coprocessor::{CoprocessorError, DecryptionFulfiller, LocalCoprocessor};
    use auction_types::{AuctionPhase, CiphertextHandle, DecryptionProof};

    const CREATOR: Address = [1u8; 32];
    const ALICE: Address = [2u8; 32];
    const BOB: Address = [3u8; 32];
    const CAROL: Address = [4u8; 32];

    fn test_context(sender: Address, timestamp: u64) -> CallContext {
        CallContext {
            sender,
            block_height: 100,
            timestamp,
        }
    }

    fn setup() -> (ModuleState, LocalCoprocessor, AuctionId) {
        let mut state = ModuleState::new();
        let cp = LocalCoprocessor::from_key([7u8; 32]);
        let auction_id = handle_create_auction(
            &mut state,
            &cp,
            &test_context(CREATOR, 100),
            AuctionMetadata {
                name: "Lot 1".into(),
                description: None,
            },
            1000,
        )
        .unwrap();
        (state, cp, auction_id)
    }

    fn bid(
        state: &mut ModuleState,
        cp: &LocalCoprocessor,
        auction_id: AuctionId,
        bidder: Address,
        amount: u64,
        timestamp: u64,
    ) -> HandlerResult<u32> {
        let input = cp.encrypt_input(amount, &bidder);
        handle_place_bid(state, cp, &test_context(bidder, timestamp), auction_id, &input)
    }

    fn request_finalize(
        state: &mut ModuleState,
        cp: &LocalCoprocessor,
        auction_id: AuctionId,
        timestamp: u64,
    ) -> HandlerResult<FinalizeOutcome> {
        handle_request_finalize(state, cp, &test_context(CAROL, timestamp), auction_id)
    }

    fn deliver(
        state: &mut ModuleState,
        cp: &LocalCoprocessor,
        response: DecryptionResponse,
    ) -> HandlerResult<AuctionStats> {
        handle_decryption_callback(state, cp, &test_context(CAROL, 2000), response)
    }

    /// Oracle that always hands out the same request id and accepts any proof.
    struct FixedIdOracle(RequestId);

    impl DecryptionOracle for FixedIdOracle {
        fn request_decryption(
            &self,
            _handles: &[CiphertextHandle],
        ) -> Result<RequestId, CoprocessorError> {
            Ok(self.0)
        }

        fn verify_decryption_proof(
            &self,
            _request_id: RequestId,
            _plaintexts: &[u64],
            _proof: &DecryptionProof,
        ) -> bool {
            true
        }
    }

    #[test]
    fn test_create_auction() {
        let (state, cp, auction_id) = setup();
        assert_eq!(auction_id, 1);

        let auction = state.get_auction(auction_id).unwrap();
        assert_eq!(auction.creator, CREATOR);
        assert_eq!(auction.phase(100), AuctionPhase::Open);
        assert_eq!(cp.decrypt_handle(&auction.aggregates.high).unwrap(), 0);
        assert_eq!(cp.decrypt_handle(&auction.aggregates.low).unwrap(), u64::MAX);
        assert_eq!(cp.decrypt_handle(&auction.aggregates.sum).unwrap(), 0);
        assert!(matches!(
            state.events[0].event,
            AuctionEvent::Created { auction_id: 1, .. }
        ));
    }

    #[test]
    fn test_create_auction_invalid_deadline() {
        let mut state = ModuleState::new();
        let cp = LocalCoprocessor::from_key([7u8; 32]);

        for deadline in [50, 100] {
            let result = handle_create_auction(
                &mut state,
                &cp,
                &test_context(CREATOR, 100),
                AuctionMetadata::default(),
                deadline,
            );
            assert_eq!(result, Err(AuctionError::InvalidDeadline));
        }
        assert!(state.auctions.is_empty());
        assert_eq!(state.next_auction_id, 1);
    }

    #[test]
    fn test_place_bid_success() {
        let (mut state, cp, auction_id) = setup();

        assert_eq!(bid(&mut state, &cp, auction_id, ALICE, 40, 200), Ok(0));
        assert_eq!(bid(&mut state, &cp, auction_id, BOB, 25, 210), Ok(1));

        let auction = state.get_auction(auction_id).unwrap();
        assert_eq!(auction.bid_count, 2);
        assert_eq!(cp.decrypt_handle(&auction.aggregates.high).unwrap(), 40);
        assert_eq!(cp.decrypt_handle(&auction.aggregates.low).unwrap(), 25);
        assert_eq!(cp.decrypt_handle(&auction.aggregates.sum).unwrap(), 65);
        assert_eq!(state.get_auction_bids(auction_id)[1].bidder, BOB);
        state.check_invariants().unwrap();
    }

    #[test]
    fn test_place_bid_at_deadline_rejected() {
        let (mut state, cp, auction_id) = setup();
        assert_eq!(
            bid(&mut state, &cp, auction_id, ALICE, 40, 1000),
            Err(AuctionError::AuctionClosed)
        );
        assert_eq!(state.get_auction(auction_id).unwrap().bid_count, 0);
    }

    #[test]
    fn test_place_bid_after_close_rejected_even_for_creator() {
        let (mut state, cp, auction_id) = setup();
        handle_close_auction(&mut state, &test_context(CREATOR, 300), auction_id).unwrap();

        assert_eq!(
            bid(&mut state, &cp, auction_id, CREATOR, 40, 301),
            Err(AuctionError::AuctionClosed)
        );
        assert_eq!(
            bid(&mut state, &cp, auction_id, ALICE, 40, 301),
            Err(AuctionError::AuctionClosed)
        );
    }

    #[test]
    fn test_place_bid_on_finalized_auction() {
        let (mut state, cp, auction_id) = setup();
        request_finalize(&mut state, &cp, auction_id, 1000).unwrap();
        let events = state.events.len();

        assert_eq!(
            bid(&mut state, &cp, auction_id, ALICE, 40, 1001),
            Err(AuctionError::AlreadyFinalized)
        );
        assert_eq!(state.get_auction(auction_id).unwrap().bid_count, 0);
        assert!(state.get_auction_bids(auction_id).is_empty());
        assert_eq!(state.events.len(), events);
    }

    #[test]
    fn test_place_bid_with_foreign_input_rejected() {
        let (mut state, cp, auction_id) = setup();
        let input = cp.encrypt_input(40, &ALICE);
        let events_before = state.events.len();

        let result =
            handle_place_bid(&mut state, &cp, &test_context(BOB, 200), auction_id, &input);
        assert_eq!(result, Err(AuctionError::InvalidInput));
        assert_eq!(state.get_auction(auction_id).unwrap().bid_count, 0);
        assert!(state.get_auction_bids(auction_id).is_empty());
        assert_eq!(state.events.len(), events_before);
    }

    #[test]
    fn test_place_bid_limit() {
        let mut state = ModuleState::from_genesis(AuctionGenesisConfig {
            max_bids_per_auction: 1,
            ..Default::default()
        })
        .unwrap();
        let cp = LocalCoprocessor::from_key([7u8; 32]);
        let auction_id = handle_create_auction(
            &mut state,
            &cp,
            &test_context(CREATOR, 100),
            AuctionMetadata::default(),
            1000,
        )
        .unwrap();

        assert_eq!(bid(&mut state, &cp, auction_id, ALICE, 1, 200), Ok(0));
        assert_eq!(
            bid(&mut state, &cp, auction_id, BOB, 2, 200),
            Err(AuctionError::TooManyBids)
        );
    }

    #[test]
    fn test_place_bid_unknown_auction() {
        let (mut state, cp, _) = setup();
        assert_eq!(
            bid(&mut state, &cp, 99, ALICE, 1, 200),
            Err(AuctionError::AuctionNotFound(99))
        );
    }

    #[test]
    fn test_close_auction_rules() {
        let (mut state, _cp, auction_id) = setup();

        assert_eq!(
            handle_close_auction(&mut state, &test_context(ALICE, 200), auction_id),
            Err(AuctionError::Unauthorized)
        );
        handle_close_auction(&mut state, &test_context(CREATOR, 200), auction_id).unwrap();
        assert_eq!(
            handle_close_auction(&mut state, &test_context(CREATOR, 201), auction_id),
            Err(AuctionError::AlreadyClosed)
        );
        assert!(state.get_auction(auction_id).unwrap().closed);
    }

    #[test]
    fn test_close_after_deadline_rejected() {
        let (mut state, _cp, auction_id) = setup();
        let events = state.events.len();

        for timestamp in [1000, 1500] {
            assert_eq!(
                handle_close_auction(&mut state, &test_context(CREATOR, timestamp), auction_id),
                Err(AuctionError::AlreadyClosed)
            );
        }
        assert_eq!(
            handle_close_auction(&mut state, &test_context(ALICE, 1500), auction_id),
            Err(AuctionError::Unauthorized)
        );
        assert!(!state.get_auction(auction_id).unwrap().closed);
        assert_eq!(state.events.len(), events);
    }

    #[test]
    fn test_close_after_finalize() {
        let (mut state, cp, auction_id) = setup();
        request_finalize(&mut state, &cp, auction_id, 1000).unwrap();
        assert_eq!(
            handle_close_auction(&mut state, &test_context(CREATOR, 1001), auction_id),
            Err(AuctionError::AlreadyFinalized)
        );
    }

    #[test]
    fn test_request_finalize_while_open() {
        let (mut state, cp, auction_id) = setup();
        bid(&mut state, &cp, auction_id, ALICE, 10, 200).unwrap();
        assert_eq!(
            request_finalize(&mut state, &cp, auction_id, 999),
            Err(AuctionError::AuctionStillOpen)
        );
        assert!(cp.outstanding().is_empty());
    }

    #[test]
    fn test_zero_bid_auction_finalizes_immediately() {
        let (mut state, cp, auction_id) = setup();

        let outcome = request_finalize(&mut state, &cp, auction_id, 1000).unwrap();
        assert_eq!(outcome, FinalizeOutcome::Finalized(AuctionStats::empty()));
        assert!(cp.outstanding().is_empty());

        let auction = state.get_auction(auction_id).unwrap();
        assert!(auction.finalized);
        assert!(auction.closed);
        assert!(!auction.decryption_pending());
        state.check_invariants().unwrap();
    }

    #[test]
    fn test_full_decryption_round_trip() {
        let (mut state, cp, auction_id) = setup();
        for (bidder, amount) in [(ALICE, 10), (BOB, 30), (CAROL, 30), (CREATOR, 5)] {
            bid(&mut state, &cp, auction_id, bidder, amount, 200).unwrap();
        }
        handle_close_auction(&mut state, &test_context(CREATOR, 300), auction_id).unwrap();

        let FinalizeOutcome::DecryptionRequested(request_id) =
            request_finalize(&mut state, &cp, auction_id, 301).unwrap()
        else {
            panic!("expected a decryption request");
        };
        assert_eq!(
            state.get_auction(auction_id).unwrap().phase(301),
            AuctionPhase::DecryptionPending
        );
        state.check_invariants().unwrap();

        let stats = deliver(&mut state, &cp, cp.fulfill(request_id).unwrap()).unwrap();
        assert_eq!(stats.winner, Some(BOB));
        assert_eq!(stats.winner_index, Some(1));
        assert_eq!(stats.high, 30);
        assert_eq!(stats.low, 5);
        assert_eq!(stats.average, 18);
        assert_eq!(stats.bid_count, 4);

        let auction = state.get_auction(auction_id).unwrap();
        assert!(auction.finalized);
        assert_eq!(auction.result.as_ref(), Some(&stats));
        assert!(state.pending_decryptions.is_empty());
        state.check_invariants().unwrap();
    }

    #[test]
    fn test_request_finalize_twice() {
        let (mut state, cp, auction_id) = setup();
        bid(&mut state, &cp, auction_id, ALICE, 10, 200).unwrap();

        let outcome = request_finalize(&mut state, &cp, auction_id, 1000).unwrap();
        let FinalizeOutcome::DecryptionRequested(request_id) = outcome else {
            panic!("expected a decryption request");
        };
        assert_eq!(
            request_finalize(&mut state, &cp, auction_id, 1001),
            Err(AuctionError::DecryptionAlreadyPending)
        );

        deliver(&mut state, &cp, cp.fulfill(request_id).unwrap()).unwrap();
        assert_eq!(
            request_finalize(&mut state, &cp, auction_id, 1002),
            Err(AuctionError::AlreadyFinalized)
        );
    }

    #[test]
    fn test_replayed_callback_rejected() {
        let (mut state, cp, auction_id) = setup();
        bid(&mut state, &cp, auction_id, ALICE, 10, 200).unwrap();
        let FinalizeOutcome::DecryptionRequested(request_id) =
            request_finalize(&mut state, &cp, auction_id, 1000).unwrap()
        else {
            panic!("expected a decryption request");
        };

        let response = cp.fulfill(request_id).unwrap();
        deliver(&mut state, &cp, response.clone()).unwrap();
        let events = state.events.len();

        assert_eq!(
            deliver(&mut state, &cp, response),
            Err(AuctionError::UnknownRequest(request_id))
        );
        assert_eq!(state.events.len(), events);
    }

    #[test]
    fn test_forged_proof_rejected() {
        let (mut state, cp, auction_id) = setup();
        bid(&mut state, &cp, auction_id, ALICE, 10, 200).unwrap();
        bid(&mut state, &cp, auction_id, BOB, 20, 200).unwrap();
        let FinalizeOutcome::DecryptionRequested(request_id) =
            request_finalize(&mut state, &cp, auction_id, 1000).unwrap()
        else {
            panic!("expected a decryption request");
        };

        let mut response = cp.fulfill(request_id).unwrap();
        response.plaintexts = vec![99, 20];
        assert_eq!(
            deliver(&mut state, &cp, response.clone()),
            Err(AuctionError::ProofInvalid)
        );

        response.plaintexts = vec![10, 20];
        response.proof = DecryptionProof(vec![0u8; 32]);
        assert_eq!(
            deliver(&mut state, &cp, response),
            Err(AuctionError::ProofInvalid)
        );

        let auction = state.get_auction(auction_id).unwrap();
        assert!(!auction.finalized);
        assert_eq!(auction.pending_request, Some(request_id));
        state.check_invariants().unwrap();
    }

    #[test]
    fn test_plaintext_count_mismatch() {
        let (mut state, cp, auction_id) = setup();
        bid(&mut state, &cp, auction_id, ALICE, 10, 200).unwrap();
        bid(&mut state, &cp, auction_id, BOB, 20, 200).unwrap();

        let oracle = FixedIdOracle(9);
        handle_request_finalize(&mut state, &oracle, &test_context(CAROL, 1000), auction_id)
            .unwrap();
        let events = state.events.len();

        for plaintexts in [vec![10], vec![10, 20, 30]] {
            let got = plaintexts.len();
            let response = DecryptionResponse {
                request_id: 9,
                plaintexts,
                proof: DecryptionProof::default(),
            };
            assert_eq!(
                handle_decryption_callback(&mut state, &oracle, &test_context(CAROL, 1001), response),
                Err(AuctionError::PlaintextCountMismatch { expected: 2, got })
            );
        }

        let auction = state.get_auction(auction_id).unwrap();
        assert!(!auction.finalized);
        assert!(auction.result.is_none());
        assert_eq!(auction.pending_request, Some(9));
        assert!(state.pending_decryptions.contains_key(&9));
        assert_eq!(state.events.len(), events);
        state.check_invariants().unwrap();
    }

    #[test]
    fn test_request_id_reused() {
        let (mut state, cp, first) = setup();
        let second = handle_create_auction(
            &mut state,
            &cp,
            &test_context(CREATOR, 100),
            AuctionMetadata::default(),
            1000,
        )
        .unwrap();
        bid(&mut state, &cp, first, ALICE, 10, 200).unwrap();
        bid(&mut state, &cp, second, BOB, 20, 200).unwrap();

        let oracle = FixedIdOracle(4);
        assert_eq!(
            handle_request_finalize(&mut state, &oracle, &test_context(CAROL, 1000), first),
            Ok(FinalizeOutcome::DecryptionRequested(4))
        );
        let events = state.events.len();

        assert_eq!(
            handle_request_finalize(&mut state, &oracle, &test_context(CAROL, 1000), second),
            Err(AuctionError::RequestIdReused(4))
        );

        let auction = state.get_auction(second).unwrap();
        assert!(!auction.closed);
        assert_eq!(auction.pending_request, None);
        assert_eq!(auction.requested_at, None);
        assert_eq!(state.pending_decryptions.len(), 1);
        assert_eq!(state.pending_decryptions[&4].auction_id, first);
        assert_eq!(state.events.len(), events);
        state.check_invariants().unwrap();
    }

    #[test]
    fn test_unknown_request_rejected() {
        let (mut state, cp, _) = setup();
        let response = DecryptionResponse {
            request_id: 77,
            plaintexts: vec![1],
            proof: DecryptionProof::default(),
        };
        assert_eq!(
            deliver(&mut state, &cp, response),
            Err(AuctionError::UnknownRequest(77))
        );
    }

    #[test]
    fn test_callback_without_pending_flag() {
        let (mut state, cp, auction_id) = setup();
        bid(&mut state, &cp, auction_id, ALICE, 10, 200).unwrap();
        let FinalizeOutcome::DecryptionRequested(request_id) =
            request_finalize(&mut state, &cp, auction_id, 1000).unwrap()
        else {
            panic!("expected a decryption request");
        };

        // Corrupt the auction side of the correlation on purpose.
        state.get_auction_mut(auction_id).unwrap().pending_request = None;

        let response = cp.fulfill(request_id).unwrap();
        assert_eq!(
            deliver(&mut state, &cp, response),
            Err(AuctionError::NoPendingDecryption)
        );
        assert!(state.pending_decryptions.contains_key(&request_id));
    }

    #[test]
    fn test_expire_decryption() {
        let mut state = ModuleState::from_genesis(
            AuctionGenesisConfig::default().with_decryption_timeout(600),
        )
        .unwrap();
        let cp = LocalCoprocessor::from_key([7u8; 32]);
        let auction_id = handle_create_auction(
            &mut state,
            &cp,
            &test_context(CREATOR, 100),
            AuctionMetadata::default(),
            1000,
        )
        .unwrap();
        bid(&mut state, &cp, auction_id, ALICE, 10, 200).unwrap();

        let FinalizeOutcome::DecryptionRequested(stale) =
            request_finalize(&mut state, &cp, auction_id, 1000).unwrap()
        else {
            panic!("expected a decryption request");
        };

        assert_eq!(
            handle_expire_decryption(&mut state, &test_context(BOB, 1599), auction_id),
            Err(AuctionError::DecryptionNotExpired { expires_at: 1600 })
        );
        assert_eq!(
            handle_expire_decryption(&mut state, &test_context(BOB, 1600), auction_id),
            Ok(stale)
        );
        let auction = state.get_auction(auction_id).unwrap();
        assert!(auction.closed);
        assert_eq!(auction.phase(1600), AuctionPhase::Closed);
        state.check_invariants().unwrap();

        // Late answer to the expired request is refused.
        let late = cp.fulfill(stale).unwrap();
        assert_eq!(
            deliver(&mut state, &cp, late),
            Err(AuctionError::UnknownRequest(stale))
        );

        // A fresh request finalizes normally.
        let FinalizeOutcome::DecryptionRequested(fresh) =
            request_finalize(&mut state, &cp, auction_id, 1700).unwrap()
        else {
            panic!("expected a decryption request");
        };
        assert_ne!(fresh, stale);
        let stats = deliver(&mut state, &cp, cp.fulfill(fresh).unwrap()).unwrap();
        assert_eq!(stats.winner, Some(ALICE));
    }

    #[test]
    fn test_expire_without_timeout_configured() {
        let (mut state, cp, auction_id) = setup();
        bid(&mut state, &cp, auction_id, ALICE, 10, 200).unwrap();
        assert_eq!(
            handle_expire_decryption(&mut state, &test_context(BOB, 5000), auction_id),
            Err(AuctionError::NoPendingDecryption)
        );
        request_finalize(&mut state, &cp, auction_id, 1000).unwrap();
        assert_eq!(
            handle_expire_decryption(&mut state, &test_context(BOB, 99_999), auction_id),
            Err(AuctionError::TimeoutDisabled)
        );
    }

    #[test]
    fn test_handle_call_dispatch() {
        let mut state = ModuleState::new();
        let cp = LocalCoprocessor::from_key([7u8; 32]);

        let outcome = handle_call(
            &mut state,
            &cp,
            &test_context(CREATOR, 100),
            AuctionCall::CreateAuction {
                metadata: AuctionMetadata::default(),
                deadline: 500,
            },
        )
        .unwrap();
        assert_eq!(outcome, CallOutcome::AuctionCreated(1));

        let input = cp.encrypt_input(12, &ALICE);
        let outcome = handle_call(
            &mut state,
            &cp,
            &test_context(ALICE, 200),
            AuctionCall::PlaceBid {
                auction_id: 1,
                input,
            },
        )
        .unwrap();
        assert_eq!(outcome, CallOutcome::BidPlaced { bid_index: 0 });

        let outcome = handle_call(
            &mut state,
            &cp,
            &test_context(ALICE, 500),
            AuctionCall::RequestFinalize { auction_id: 1 },
        )
        .unwrap();
        let CallOutcome::Finalize(FinalizeOutcome::DecryptionRequested(request_id)) = outcome
        else {
            panic!("expected a decryption request");
        };

        let outcome = handle_call(
            &mut state,
            &cp,
            &test_context(BOB, 501),
            AuctionCall::DecryptionCallback {
                response: cp.fulfill(request_id).unwrap(),
            },
        )
        .unwrap();
        assert!(matches!(
            outcome,
            CallOutcome::Finalized(AuctionStats { high: 12, .. })
        ));
    }
}
