//! Simulated ledger: module state, coprocessor and relayer behind one lock.

use auction_coprocessor::LocalCoprocessor;
use auction_module::{
    handlers, queries, AuctionCall, AuctionError, AuctionGenesisConfig, AuctionQuery,
    AuctionQueryResponse, AuctionState as ModuleState, CallContext, CallOutcome,
    GenesisValidationError,
};
use auction_relayer::{DecryptionRelayer, RelayReport};
use auction_types::{Address, DecryptionResponse};
use tracing::debug;

/// Seconds per simulated block.
pub const BLOCK_TIME: u64 = 12;

/// Shared chain state.
pub struct ChainState {
    /// Module state
    pub module: ModuleState,
    /// Homomorphic coprocessor and decryption oracle
    pub coprocessor: LocalCoprocessor,
    /// Carries oracle responses back into the module
    pub relayer: DecryptionRelayer,
    /// Current block height (simulated)
    pub block_height: u64,
    /// Current timestamp (simulated, can be advanced)
    pub timestamp: u64,
}

impl ChainState {
    pub fn new(coprocessor: LocalCoprocessor) -> Self {
        Self {
            module: ModuleState::new(),
            coprocessor,
            relayer: DecryptionRelayer::new(),
            block_height: 0,
            timestamp: 0,
        }
    }

    /// Reset module state under a new genesis configuration. The coprocessor
    /// keeps its key and handles.
    pub fn init(&mut self, config: AuctionGenesisConfig) -> Result<(), GenesisValidationError> {
        self.module = ModuleState::from_genesis(config)?;
        self.relayer = DecryptionRelayer::new();
        Ok(())
    }

    pub fn advance_block(&mut self) {
        self.block_height += 1;
        self.timestamp += BLOCK_TIME;
    }

    pub fn set_timestamp(&mut self, ts: u64) {
        self.timestamp = ts;
    }

    pub fn context(&self, sender: Address) -> CallContext {
        CallContext {
            sender,
            block_height: self.block_height,
            timestamp: self.timestamp,
        }
    }

    /// Execute one call message as a transaction from `sender`.
    pub fn execute(&mut self, sender: Address, call: AuctionCall) -> Result<CallOutcome, AuctionError> {
        let ctx = self.context(sender);
        debug!(height = ctx.block_height, ?call, "Executing call");
        handlers::handle_call(&mut self.module, &self.coprocessor, &ctx, call)
    }

    /// Answer a read query against the current chain time.
    pub fn query(&self, query: AuctionQuery) -> AuctionQueryResponse {
        queries::handle_query(&self.module, self.timestamp, query)
    }

    /// Run one relay pass, delivering every fulfilled oracle response as a
    /// callback transaction.
    pub fn relay(&mut self) -> RelayReport {
        let ctx = self.context([0u8; 32]);
        let Self {
            module,
            coprocessor,
            relayer,
            ..
        } = self;
        let coprocessor: &LocalCoprocessor = coprocessor;

        let mut sink = |response: DecryptionResponse| {
            handlers::handle_decryption_callback(module, coprocessor, &ctx, response).map(|_| ())
        };
        let report = relayer.relay_once(coprocessor, &mut sink);
        relayer.prune_finished();
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use auction_module::FinalizeOutcome;
    use auction_types::{AuctionMetadata, AuctionPhase};

    const CREATOR: Address = [1u8; 32];

    fn chain() -> ChainState {
        ChainState::new(LocalCoprocessor::from_key([5u8; 32]))
    }

    fn create(chain: &mut ChainState, deadline: u64) -> u64 {
        let outcome = chain
            .execute(
                CREATOR,
                AuctionCall::CreateAuction {
                    metadata: AuctionMetadata::default(),
                    deadline,
                },
            )
            .unwrap();
        let CallOutcome::AuctionCreated(auction_id) = outcome else {
            panic!("expected auction id");
        };
        auction_id
    }

    #[test]
    fn test_advance_block() {
        let mut chain = chain();
        chain.advance_block();
        chain.advance_block();
        assert_eq!(chain.block_height, 2);
        assert_eq!(chain.timestamp, 2 * BLOCK_TIME);
    }

    #[test]
    fn test_relay_finalizes_auction() {
        let mut chain = chain();
        let auction_id = create(&mut chain, 100);

        for (who, amount) in [(2u8, 50u64), (3, 70)] {
            let bidder = [who; 32];
            let input = chain.coprocessor.encrypt_input(amount, &bidder);
            chain
                .execute(bidder, AuctionCall::PlaceBid { auction_id, input })
                .unwrap();
        }

        chain.set_timestamp(100);
        let outcome = chain
            .execute(CREATOR, AuctionCall::RequestFinalize { auction_id })
            .unwrap();
        assert!(matches!(
            outcome,
            CallOutcome::Finalize(FinalizeOutcome::DecryptionRequested(_))
        ));

        let report = chain.relay();
        assert_eq!(report.delivered.len(), 1);
        let auction = chain.module.get_auction(auction_id).unwrap();
        assert_eq!(auction.phase(chain.timestamp), AuctionPhase::Finalized);
        assert_eq!(auction.result.as_ref().map(|s| s.high), Some(70));

        // Nothing left to relay.
        assert!(chain.relay().is_empty());
    }

    #[test]
    fn test_query_reads_at_chain_time() {
        let mut chain = chain();
        create(&mut chain, 100);
        create(&mut chain, 500);
        chain.set_timestamp(200);

        let AuctionQueryResponse::AuctionList(list) =
            chain.query(AuctionQuery::ListAuctions { offset: 1, limit: 10 })
        else {
            panic!("expected auction list");
        };
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].auction_id, 2);
        assert_eq!(list[0].phase, AuctionPhase::Open);

        assert!(matches!(
            chain.query(AuctionQuery::GetStats { auction_id: 1 }),
            AuctionQueryResponse::Stats(Err(AuctionError::NotFinalized))
        ));
        assert!(matches!(
            chain.query(AuctionQuery::GetAuctionBids { auction_id: 7 }),
            AuctionQueryResponse::Bids(Err(AuctionError::AuctionNotFound(7)))
        ));
    }

    #[test]
    fn test_init_rejects_invalid_config() {
        let mut chain = chain();
        let config = AuctionGenesisConfig {
            max_bids_per_auction: 0,
            ..Default::default()
        };
        assert!(chain.init(config).is_err());
    }
}
