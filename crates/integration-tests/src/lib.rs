//! End-to-end integration tests for the confidential auction system.
//!
//! These tests exercise the full auction lifecycle:
//! 1. Auction creation
//! 2. Bid encryption and oblivious aggregation
//! 3. Closing and the decryption request
//! 4. Oracle fulfillment and relay
//! 5. Finalization and queries

use auction_coprocessor::{DecryptionFulfiller, LocalCoprocessor};
use auction_module::{
    events::events_for_auction,
    handlers::{
        handle_call, handle_close_auction, handle_create_auction, handle_decryption_callback,
        handle_expire_decryption, handle_place_bid, handle_request_finalize, CallContext,
    },
    queries::{get_pending_decryptions, get_stats, get_winner_info},
    AuctionCall, AuctionError, AuctionGenesisConfig, AuctionState, CallOutcome, FinalizeOutcome,
};
use auction_relayer::{DecryptionRelayer, RelayState};
use auction_types::{
    Address, AuctionEvent, AuctionId, AuctionMetadata, AuctionPhase, AuctionStats,
    DecryptionProof, DecryptionResponse, RequestId,
};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

const CREATOR: Address = [0xc0; 32];
const RELAYER: Address = [0xee; 32];

/// Module, coprocessor and relayer wired together the way the mock chain
/// wires them, with a manually driven clock.
struct Harness {
    state: AuctionState,
    coprocessor: LocalCoprocessor,
    relayer: DecryptionRelayer,
    now: u64,
}

impl Harness {
    fn new() -> Self {
        Self::with_config(AuctionGenesisConfig::default())
    }

    fn with_config(config: AuctionGenesisConfig) -> Self {
        Self {
            state: AuctionState::from_genesis(config).unwrap(),
            coprocessor: LocalCoprocessor::from_key([0x42; 32]),
            relayer: DecryptionRelayer::new(),
            now: 1_000,
        }
    }

    fn ctx(&self, sender: Address) -> CallContext {
        CallContext {
            sender,
            block_height: self.now / 12,
            timestamp: self.now,
        }
    }

    fn create(&mut self, deadline_in: u64) -> AuctionId {
        let ctx = self.ctx(CREATOR);
        handle_create_auction(
            &mut self.state,
            &self.coprocessor,
            &ctx,
            AuctionMetadata {
                name: "Integration lot".into(),
                description: Some("sealed-bid".into()),
            },
            self.now + deadline_in,
        )
        .unwrap()
    }

    fn bid(&mut self, auction_id: AuctionId, bidder: Address, amount: u64) -> Result<u32, AuctionError> {
        let input = self.coprocessor.encrypt_input(amount, &bidder);
        let ctx = self.ctx(bidder);
        handle_place_bid(&mut self.state, &self.coprocessor, &ctx, auction_id, &input)
    }

    fn close(&mut self, auction_id: AuctionId) -> Result<(), AuctionError> {
        let ctx = self.ctx(CREATOR);
        handle_close_auction(&mut self.state, &ctx, auction_id)
    }

    fn finalize(&mut self, auction_id: AuctionId) -> Result<FinalizeOutcome, AuctionError> {
        let ctx = self.ctx(RELAYER);
        handle_request_finalize(&mut self.state, &self.coprocessor, &ctx, auction_id)
    }

    fn request(&mut self, auction_id: AuctionId) -> RequestId {
        match self.finalize(auction_id).unwrap() {
            FinalizeOutcome::DecryptionRequested(request_id) => request_id,
            other => panic!("expected a decryption request, got {:?}", other),
        }
    }

    fn callback(&mut self, response: DecryptionResponse) -> Result<AuctionStats, AuctionError> {
        let ctx = self.ctx(RELAYER);
        handle_decryption_callback(&mut self.state, &self.coprocessor, &ctx, response)
    }

    fn expire(&mut self, auction_id: AuctionId) -> Result<RequestId, AuctionError> {
        let ctx = self.ctx(RELAYER);
        handle_expire_decryption(&mut self.state, &ctx, auction_id)
    }

    /// One relay pass delivering into the module.
    fn relay(&mut self) -> auction_relayer::RelayReport {
        let ctx = self.ctx(RELAYER);
        let Harness {
            state,
            coprocessor,
            relayer,
            ..
        } = self;
        let coprocessor: &LocalCoprocessor = coprocessor;
        let mut sink = |response: DecryptionResponse| {
            handle_decryption_callback(state, coprocessor, &ctx, response).map(|_| ())
        };
        relayer.relay_once(coprocessor, &mut sink)
    }

    fn phase(&self, auction_id: AuctionId) -> AuctionPhase {
        self.state.get_auction(auction_id).unwrap().phase(self.now)
    }
}

fn bidder(n: u8) -> Address {
    [n; 32]
}

/// Test the complete auction flow with the relayer in the loop.
#[test]
fn test_full_auction_flow() {
    let mut h = Harness::new();

    // ========================================
    // Phase 1: Create auction
    // ========================================

    let auction_id = h.create(600);
    assert_eq!(h.phase(auction_id), AuctionPhase::Open);
    println!("Auction {} created", auction_id);

    // ========================================
    // Phase 2: Bidders submit encrypted bids
    // ========================================

    let bids = [(bidder(1), 120u64), (bidder(2), 340), (bidder(3), 95)];
    for (i, (who, amount)) in bids.iter().enumerate() {
        h.now += 10;
        assert_eq!(h.bid(auction_id, *who, *amount), Ok(i as u32));
    }

    let auction = h.state.get_auction(auction_id).unwrap();
    assert_eq!(h.coprocessor.decrypt_handle(&auction.aggregates.high).unwrap(), 340);
    assert_eq!(h.coprocessor.decrypt_handle(&auction.aggregates.low).unwrap(), 95);
    assert_eq!(h.coprocessor.decrypt_handle(&auction.aggregates.sum).unwrap(), 555);
    println!("{} bids aggregated under encryption", bids.len());

    // ========================================
    // Phase 3: Deadline passes, finalization requested
    // ========================================

    h.now = h.state.get_auction(auction_id).unwrap().deadline;
    assert_eq!(h.phase(auction_id), AuctionPhase::Closed);
    assert_eq!(
        h.bid(auction_id, bidder(4), 999),
        Err(AuctionError::AuctionClosed)
    );

    let request_id = h.request(auction_id);
    assert_eq!(h.phase(auction_id), AuctionPhase::DecryptionPending);
    assert_eq!(h.coprocessor.outstanding(), vec![request_id]);
    assert_eq!(get_stats(&h.state, auction_id), Err(AuctionError::NotFinalized));
    println!("Decryption request {} issued", request_id);

    // ========================================
    // Phase 4: Relayer delivers the oracle answer
    // ========================================

    h.now += 5;
    let report = h.relay();
    assert_eq!(report.delivered, vec![request_id]);
    assert_eq!(h.relayer.get_state(request_id), Some(RelayState::Delivered));

    // ========================================
    // Phase 5: Revealed statistics
    // ========================================

    assert_eq!(h.phase(auction_id), AuctionPhase::Finalized);
    let stats = get_stats(&h.state, auction_id).unwrap();
    assert_eq!(stats.bid_count, 3);
    assert_eq!(stats.high, 340);
    assert_eq!(stats.low, 95);
    assert_eq!(stats.sum, 555);
    assert_eq!(stats.average, 185);
    assert_eq!(stats.winner, Some(bidder(2)));

    let winner = get_winner_info(&h.state, auction_id).unwrap();
    assert_eq!(winner.winning_bid, 340);
    assert_eq!(winner.winner_index, Some(1));

    // Created, three bids, decryption requested, finalized
    let events = events_for_auction(&h.state, auction_id);
    assert_eq!(events.len(), 6);
    assert!(matches!(events[4].event, AuctionEvent::DecryptionRequested { .. }));
    h.state.check_invariants().unwrap();

    println!("Auction finalized: winner bid {}", winner.winning_bid);
}

/// Encrypted aggregates match the plaintext statistics whatever the bid order.
#[test]
fn test_aggregates_independent_of_bid_order() {
    let amounts: Vec<u64> = vec![17, 4_000, 0, 999, 4_000, 23, 650, 1, 77, 3_999];
    let expected_sum: u64 = amounts.iter().sum();
    let mut rng = StdRng::seed_from_u64(7);

    for round in 0..8 {
        let mut order: Vec<usize> = (0..amounts.len()).collect();
        order.shuffle(&mut rng);

        let mut h = Harness::new();
        let auction_id = h.create(1_000);
        for &i in &order {
            h.bid(auction_id, bidder(i as u8 + 1), amounts[i]).unwrap();
        }

        let auction = h.state.get_auction(auction_id).unwrap();
        let cp = &h.coprocessor;
        assert_eq!(cp.decrypt_handle(&auction.aggregates.high).unwrap(), 4_000);
        assert_eq!(cp.decrypt_handle(&auction.aggregates.low).unwrap(), 0);
        assert_eq!(cp.decrypt_handle(&auction.aggregates.sum).unwrap(), expected_sum);

        h.close(auction_id).unwrap();
        let request_id = h.request(auction_id);
        let response = h.coprocessor.fulfill(request_id).unwrap();
        let stats = h.callback(response).unwrap();

        assert_eq!(stats.high, 4_000);
        assert_eq!(stats.low, 0);
        assert_eq!(stats.sum, expected_sum as u128);
        assert_eq!(stats.average, expected_sum / amounts.len() as u64);

        // First occurrence of the maximum in submission order wins.
        let first_max = order.iter().position(|&i| amounts[i] == 4_000).unwrap();
        assert_eq!(stats.winner_index, Some(first_max as u32), "round {}", round);
        assert_eq!(stats.winner, Some(bidder(order[first_max] as u8 + 1)));
    }
}

/// Equal maximum bids resolve to the earliest.
#[test]
fn test_tie_break_lowest_index() {
    let mut h = Harness::new();
    let auction_id = h.create(100);
    for (who, amount) in [(1, 10), (2, 30), (3, 30), (4, 5)] {
        h.bid(auction_id, bidder(who), amount).unwrap();
    }
    h.close(auction_id).unwrap();

    let request_id = h.request(auction_id);
    let stats = h.callback(h.coprocessor.fulfill(request_id).unwrap()).unwrap();

    assert_eq!(stats.winner_index, Some(1));
    assert_eq!(stats.winner, Some(bidder(2)));
    assert_eq!(stats.average, 18);
}

/// An auction without bids finalizes without talking to the oracle.
#[test]
fn test_zero_bid_auction() {
    let mut h = Harness::new();
    let auction_id = h.create(100);
    h.now += 100;

    let outcome = h.finalize(auction_id).unwrap();
    assert_eq!(outcome, FinalizeOutcome::Finalized(AuctionStats::empty()));
    assert!(h.coprocessor.outstanding().is_empty());
    assert!(h.relay().is_empty());

    let stats = get_stats(&h.state, auction_id).unwrap();
    assert_eq!((stats.bid_count, stats.high, stats.low, stats.average), (0, 0, 0, 0));
    assert_eq!(stats.winner, None);
    assert_eq!(get_winner_info(&h.state, auction_id).unwrap().winner_index, None);

    let last = h.state.events.last().unwrap();
    assert!(matches!(last.event, AuctionEvent::Finalized { .. }));
}

/// A response is accepted at most once.
#[test]
fn test_replayed_callback_rejected() {
    let mut h = Harness::new();
    let auction_id = h.create(100);
    h.bid(auction_id, bidder(1), 50).unwrap();
    h.close(auction_id).unwrap();

    let request_id = h.request(auction_id);
    let response = h.coprocessor.fulfill(request_id).unwrap();

    let first = h.callback(response.clone()).unwrap();
    let events = h.state.events.len();
    assert_eq!(
        h.callback(response),
        Err(AuctionError::UnknownRequest(request_id))
    );

    assert_eq!(h.state.events.len(), events);
    assert_eq!(get_stats(&h.state, auction_id).unwrap(), &first);
}

/// A forged response leaves the auction waiting for the genuine one.
#[test]
fn test_forged_response_rejected() {
    let mut h = Harness::new();
    let auction_id = h.create(100);
    h.bid(auction_id, bidder(1), 50).unwrap();
    h.bid(auction_id, bidder(2), 80).unwrap();
    h.close(auction_id).unwrap();
    let request_id = h.request(auction_id);

    let forged = DecryptionResponse {
        request_id,
        plaintexts: vec![500, 80],
        proof: DecryptionProof(vec![0xab; 32]),
    };
    assert_eq!(h.callback(forged), Err(AuctionError::ProofInvalid));
    assert_eq!(h.phase(auction_id), AuctionPhase::DecryptionPending);
    assert!(h.state.pending_decryptions.contains_key(&request_id));

    // A proof made under a different oracle key is just as invalid.
    let genuine = h.coprocessor.fulfill(request_id).unwrap();
    let mut wrong_key = genuine.clone();
    wrong_key.proof =
        auction_coprocessor::proof::decryption_proof(&[0x99; 32], request_id, &genuine.plaintexts);
    assert_eq!(h.callback(wrong_key), Err(AuctionError::ProofInvalid));

    let stats = h.callback(genuine).unwrap();
    assert_eq!(stats.high, 80);
    h.state.check_invariants().unwrap();
}

/// Nobody bids after close or at the deadline, the creator included.
#[test]
fn test_bids_rejected_after_close_and_deadline() {
    let mut h = Harness::new();

    let closed = h.create(100);
    h.close(closed).unwrap();
    assert_eq!(h.bid(closed, CREATOR, 10), Err(AuctionError::AuctionClosed));
    assert_eq!(h.bid(closed, bidder(1), 10), Err(AuctionError::AuctionClosed));

    let expired = h.create(100);
    h.now += 100;
    assert_eq!(h.bid(expired, CREATOR, 10), Err(AuctionError::AuctionClosed));
    assert_eq!(h.bid(expired, bidder(1), 10), Err(AuctionError::AuctionClosed));

    assert_eq!(h.state.get_auction(closed).unwrap().bid_count, 0);
    assert_eq!(h.state.get_auction(expired).unwrap().bid_count, 0);
}

/// Finalization can be requested once; afterwards every request is refused.
#[test]
fn test_finalize_request_guards() {
    let mut h = Harness::new();
    let auction_id = h.create(100);
    h.bid(auction_id, bidder(1), 5).unwrap();

    assert_eq!(h.finalize(auction_id), Err(AuctionError::AuctionStillOpen));

    h.close(auction_id).unwrap();
    let request_id = h.request(auction_id);
    assert_eq!(
        h.finalize(auction_id),
        Err(AuctionError::DecryptionAlreadyPending)
    );
    assert_eq!(get_winner_info(&h.state, auction_id), Err(AuctionError::NotFinalized));

    h.relay();
    assert_eq!(h.relayer.get_state(request_id), Some(RelayState::Delivered));
    assert_eq!(h.finalize(auction_id), Err(AuctionError::AlreadyFinalized));
    assert_eq!(h.close(auction_id), Err(AuctionError::AlreadyFinalized));
    assert_eq!(h.coprocessor.outstanding(), Vec::<RequestId>::new());
}

/// An unanswered request can be expired and reissued; the late answer bounces.
#[test]
fn test_decryption_timeout_and_reissue() {
    let mut h = Harness::with_config(AuctionGenesisConfig::default().with_decryption_timeout(300));
    let auction_id = h.create(100);
    h.bid(auction_id, bidder(1), 70).unwrap();
    h.bid(auction_id, bidder(2), 60).unwrap();
    h.now += 100;

    let stale = h.request(auction_id);
    let requested_at = h.now;

    h.now += 299;
    assert_eq!(
        h.expire(auction_id),
        Err(AuctionError::DecryptionNotExpired {
            expires_at: requested_at + 300
        })
    );
    assert!(!get_pending_decryptions(&h.state, h.now)[0].expired);

    h.now += 1;
    assert!(get_pending_decryptions(&h.state, h.now)[0].expired);
    assert_eq!(h.expire(auction_id), Ok(stale));
    assert_eq!(h.phase(auction_id), AuctionPhase::Closed);
    assert!(get_pending_decryptions(&h.state, h.now).is_empty());

    let fresh = h.request(auction_id);
    assert_ne!(fresh, stale);

    // The relayer delivers both answers; only the live request is accepted.
    let report = h.relay();
    assert_eq!(report.delivered, vec![fresh]);
    assert_eq!(report.rejected.len(), 1);
    assert_eq!(report.rejected[0].0, stale);
    assert!(report.rejected[0].1.contains("Unknown decryption request"));

    let stats = get_stats(&h.state, auction_id).unwrap();
    assert_eq!(stats.winner, Some(bidder(1)));
    h.state.check_invariants().unwrap();
}

/// Call messages survive borsh encoding and drive the same state machine.
#[test]
fn test_encoded_call_messages() {
    let mut h = Harness::new();
    let deadline = h.now + 50;

    let calls = vec![
        (
            CREATOR,
            AuctionCall::CreateAuction {
                metadata: AuctionMetadata::default(),
                deadline,
            },
        ),
        (
            bidder(1),
            AuctionCall::PlaceBid {
                auction_id: 1,
                input: h.coprocessor.encrypt_input(33, &bidder(1)),
            },
        ),
        (CREATOR, AuctionCall::CloseAuction { auction_id: 1 }),
        (RELAYER, AuctionCall::RequestFinalize { auction_id: 1 }),
    ];

    let mut outcomes = Vec::new();
    for (sender, call) in calls {
        let bytes = borsh::to_vec(&call).unwrap();
        let decoded: AuctionCall = borsh::from_slice(&bytes).unwrap();
        let ctx = h.ctx(sender);
        outcomes.push(handle_call(&mut h.state, &h.coprocessor, &ctx, decoded).unwrap());
    }

    assert_eq!(outcomes[0], CallOutcome::AuctionCreated(1));
    assert_eq!(outcomes[1], CallOutcome::BidPlaced { bid_index: 0 });
    assert_eq!(outcomes[2], CallOutcome::Closed);
    let CallOutcome::Finalize(FinalizeOutcome::DecryptionRequested(request_id)) =
        outcomes[3].clone()
    else {
        panic!("expected a decryption request");
    };

    let response = h.coprocessor.fulfill(request_id).unwrap();
    let ctx = h.ctx(RELAYER);
    let outcome = handle_call(
        &mut h.state,
        &h.coprocessor,
        &ctx,
        AuctionCall::DecryptionCallback { response },
    )
    .unwrap();
    assert!(matches!(
        outcome,
        CallOutcome::Finalized(AuctionStats { high: 33, .. })
    ));
}
