//! Mock chain server for local testing of the confidential auction system.
//!
//! This provides a JSON-RPC server that simulates on-chain state management
//! for the auction module without requiring a real blockchain. Calls execute
//! one at a time under a single lock, and a background task relays decryption
//! oracle responses back into the module.

use anyhow::Result;
use clap::Parser;
use jsonrpsee::core::async_trait;
use jsonrpsee::proc_macros::rpc;
use jsonrpsee::server::Server;
use jsonrpsee::types::ErrorObjectOwned;
use parking_lot::RwLock;
use rand::rngs::OsRng;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use auction_coprocessor::LocalCoprocessor;
use auction_module::queries::AuctionSummary;
use auction_module::{
    AuctionCall, AuctionError, AuctionGenesisConfig, AuctionQuery, AuctionQueryResponse,
    CallOutcome, FinalizeOutcome,
};
use auction_types::rpc::*;
use auction_types::{AuctionMetadata, EncryptedInput};

mod chain;
use chain::ChainState;

/// Default page size for listings.
const DEFAULT_LIMIT: u64 = 100;

#[derive(Parser, Debug)]
#[command(name = "mock-chain")]
#[command(about = "Local JSON-RPC chain running the confidential auction module")]
struct Args {
    /// Address to listen on
    #[arg(long, env = "MOCK_CHAIN_LISTEN", default_value = "127.0.0.1:9944")]
    listen: SocketAddr,

    /// Milliseconds between relay passes; 0 disables automatic relaying
    #[arg(long, env = "MOCK_CHAIN_RELAY_INTERVAL_MS", default_value_t = 1000)]
    relay_interval_ms: u64,
}

/// RPC API definition for the mock chain.
#[rpc(server)]
pub trait MockChainApi {
    // ============ Admin Methods ============

    /// Initialize the chain with genesis config.
    #[method(name = "admin_init")]
    async fn admin_init(&self, config: GenesisConfigRpc) -> Result<bool, ErrorObjectOwned>;

    /// Advance the chain by one block.
    #[method(name = "admin_advanceBlock")]
    async fn admin_advance_block(&self) -> Result<BlockInfo, ErrorObjectOwned>;

    /// Set the current timestamp (for testing time-dependent logic).
    #[method(name = "admin_setTimestamp")]
    async fn admin_set_timestamp(&self, timestamp: u64) -> Result<bool, ErrorObjectOwned>;

    // ============ Coprocessor Gateway ============

    /// Encrypt a bid amount for a sender.
    #[method(name = "fhe_encryptInput")]
    async fn fhe_encrypt_input(
        &self,
        params: EncryptInputParams,
    ) -> Result<EncryptedInputRpc, ErrorObjectOwned>;

    // ============ Auction Methods ============

    /// Create a new auction.
    #[method(name = "auction_create")]
    async fn auction_create(&self, params: CreateAuctionParams) -> Result<u64, ErrorObjectOwned>;

    /// Place an encrypted bid. Returns the bid index.
    #[method(name = "auction_placeBid")]
    async fn auction_place_bid(&self, params: PlaceBidParams) -> Result<u32, ErrorObjectOwned>;

    /// Close an auction early (creator only).
    #[method(name = "auction_close")]
    async fn auction_close(&self, sender: String, auction_id: u64) -> Result<bool, ErrorObjectOwned>;

    /// Request finalization of an auction.
    #[method(name = "auction_requestFinalize")]
    async fn auction_request_finalize(
        &self,
        sender: String,
        auction_id: u64,
    ) -> Result<FinalizeOutcomeRpc, ErrorObjectOwned>;

    /// Expire a stale decryption request.
    #[method(name = "auction_expireDecryption")]
    async fn auction_expire_decryption(
        &self,
        sender: String,
        auction_id: u64,
    ) -> Result<u64, ErrorObjectOwned>;

    // ============ Oracle ============

    /// Run one relay pass immediately.
    #[method(name = "oracle_relay")]
    async fn oracle_relay(&self) -> Result<RelayReportRpc, ErrorObjectOwned>;

    // ============ Query Methods ============

    /// Get current block info.
    #[method(name = "chain_getBlockInfo")]
    async fn chain_get_block_info(&self) -> Result<BlockInfo, ErrorObjectOwned>;

    /// Get auction by ID.
    #[method(name = "query_getAuction")]
    async fn query_get_auction(&self, auction_id: u64)
        -> Result<Option<AuctionRpc>, ErrorObjectOwned>;

    /// List auctions ordered by ID.
    #[method(name = "query_listAuctions")]
    async fn query_list_auctions(
        &self,
        offset: Option<u64>,
        limit: Option<u64>,
    ) -> Result<Vec<AuctionSummaryRpc>, ErrorObjectOwned>;

    /// Get all bids for an auction.
    #[method(name = "query_getBids")]
    async fn query_get_bids(&self, auction_id: u64) -> Result<Vec<BidRpc>, ErrorObjectOwned>;

    /// Get revealed statistics of a finalized auction.
    #[method(name = "query_getStats")]
    async fn query_get_stats(&self, auction_id: u64) -> Result<AuctionStatsRpc, ErrorObjectOwned>;

    /// Get the winner of a finalized auction.
    #[method(name = "query_getWinner")]
    async fn query_get_winner(&self, auction_id: u64) -> Result<WinnerInfoRpc, ErrorObjectOwned>;

    /// Get events starting at a sequence number.
    #[method(name = "query_getEvents")]
    async fn query_get_events(
        &self,
        since: u64,
        limit: Option<u64>,
    ) -> Result<Vec<EventRpc>, ErrorObjectOwned>;

    /// Get in-flight decryption requests.
    #[method(name = "query_getPendingDecryptions")]
    async fn query_get_pending_decryptions(
        &self,
    ) -> Result<Vec<PendingDecryptionRpc>, ErrorObjectOwned>;
}

/// Implementation of the mock chain RPC server.
struct MockChainServer {
    state: Arc<RwLock<ChainState>>,
}

impl MockChainServer {
    fn new(state: Arc<RwLock<ChainState>>) -> Self {
        Self { state }
    }

    fn rpc_error(msg: &str) -> ErrorObjectOwned {
        ErrorObjectOwned::owned(-32000, msg.to_string(), None::<()>)
    }

    fn module_error(e: AuctionError) -> ErrorObjectOwned {
        ErrorObjectOwned::owned(-32000, e.to_string(), Some(e))
    }

    fn param_error(e: HexDecodeError) -> ErrorObjectOwned {
        ErrorObjectOwned::owned(-32602, e.to_string(), None::<()>)
    }

    fn unexpected(outcome: CallOutcome) -> ErrorObjectOwned {
        Self::rpc_error(&format!("Unexpected call outcome: {:?}", outcome))
    }

    fn unexpected_query(response: AuctionQueryResponse) -> ErrorObjectOwned {
        Self::rpc_error(&format!("Unexpected query response: {:?}", response))
    }

    fn execute(&self, sender: &str, call: AuctionCall) -> Result<CallOutcome, ErrorObjectOwned> {
        let sender = parse_address(sender).map_err(Self::param_error)?;
        self.state.write().execute(sender, call).map_err(Self::module_error)
    }
}

#[async_trait]
impl MockChainApiServer for MockChainServer {
    async fn admin_init(&self, config: GenesisConfigRpc) -> Result<bool, ErrorObjectOwned> {
        let mut state = self.state.write();

        let defaults = AuctionGenesisConfig::default();
        let genesis = AuctionGenesisConfig {
            decryption_timeout: config.decryption_timeout,
            max_bids_per_auction: config
                .max_bids_per_auction
                .unwrap_or(defaults.max_bids_per_auction),
        };
        state
            .init(genesis)
            .map_err(|e| Self::rpc_error(&format!("Invalid genesis config: {}", e)))?;

        if let Some(ts) = config.initial_timestamp {
            state.set_timestamp(ts);
        }

        info!(
            decryption_timeout = ?config.decryption_timeout,
            timestamp = state.timestamp,
            "Chain initialized"
        );
        Ok(true)
    }

    async fn admin_advance_block(&self) -> Result<BlockInfo, ErrorObjectOwned> {
        let mut state = self.state.write();
        state.advance_block();
        Ok(BlockInfo {
            height: state.block_height,
            timestamp: state.timestamp,
        })
    }

    async fn admin_set_timestamp(&self, timestamp: u64) -> Result<bool, ErrorObjectOwned> {
        let mut state = self.state.write();
        state.set_timestamp(timestamp);
        info!("Timestamp set to {}", timestamp);
        Ok(true)
    }

    async fn fhe_encrypt_input(
        &self,
        params: EncryptInputParams,
    ) -> Result<EncryptedInputRpc, ErrorObjectOwned> {
        let owner = parse_address(&params.sender).map_err(Self::param_error)?;
        let state = self.state.read();
        let input = state.coprocessor.encrypt_input(params.amount, &owner);
        Ok(EncryptedInputRpc::from(&input))
    }

    async fn auction_create(&self, params: CreateAuctionParams) -> Result<u64, ErrorObjectOwned> {
        let call = AuctionCall::CreateAuction {
            metadata: AuctionMetadata {
                name: params.name,
                description: params.description,
            },
            deadline: params.deadline,
        };
        match self.execute(&params.sender, call)? {
            CallOutcome::AuctionCreated(auction_id) => {
                info!("Created auction {}", auction_id);
                Ok(auction_id)
            }
            other => Err(Self::unexpected(other)),
        }
    }

    async fn auction_place_bid(&self, params: PlaceBidParams) -> Result<u32, ErrorObjectOwned> {
        let input = EncryptedInput::try_from(&params.input).map_err(Self::param_error)?;
        let call = AuctionCall::PlaceBid {
            auction_id: params.auction_id,
            input,
        };
        match self.execute(&params.sender, call)? {
            CallOutcome::BidPlaced { bid_index } => {
                info!(
                    "Bid {} placed on auction {} by {}",
                    bid_index, params.auction_id, params.sender
                );
                Ok(bid_index)
            }
            other => Err(Self::unexpected(other)),
        }
    }

    async fn auction_close(&self, sender: String, auction_id: u64) -> Result<bool, ErrorObjectOwned> {
        match self.execute(&sender, AuctionCall::CloseAuction { auction_id })? {
            CallOutcome::Closed => Ok(true),
            other => Err(Self::unexpected(other)),
        }
    }

    async fn auction_request_finalize(
        &self,
        sender: String,
        auction_id: u64,
    ) -> Result<FinalizeOutcomeRpc, ErrorObjectOwned> {
        match self.execute(&sender, AuctionCall::RequestFinalize { auction_id })? {
            CallOutcome::Finalize(FinalizeOutcome::Finalized(stats)) => Ok(FinalizeOutcomeRpc {
                stats: Some(AuctionStatsRpc::from(&stats)),
                request_id: None,
            }),
            CallOutcome::Finalize(FinalizeOutcome::DecryptionRequested(request_id)) => {
                Ok(FinalizeOutcomeRpc {
                    stats: None,
                    request_id: Some(request_id),
                })
            }
            other => Err(Self::unexpected(other)),
        }
    }

    async fn auction_expire_decryption(
        &self,
        sender: String,
        auction_id: u64,
    ) -> Result<u64, ErrorObjectOwned> {
        match self.execute(&sender, AuctionCall::ExpireDecryption { auction_id })? {
            CallOutcome::DecryptionExpired(request_id) => Ok(request_id),
            other => Err(Self::unexpected(other)),
        }
    }

    async fn oracle_relay(&self) -> Result<RelayReportRpc, ErrorObjectOwned> {
        let report = self.state.write().relay();
        Ok(RelayReportRpc {
            delivered: report.delivered,
            rejected: report.rejected,
        })
    }

    async fn chain_get_block_info(&self) -> Result<BlockInfo, ErrorObjectOwned> {
        let state = self.state.read();
        Ok(BlockInfo {
            height: state.block_height,
            timestamp: state.timestamp,
        })
    }

    async fn query_get_auction(
        &self,
        auction_id: u64,
    ) -> Result<Option<AuctionRpc>, ErrorObjectOwned> {
        let state = self.state.read();
        match state.query(AuctionQuery::GetAuction { auction_id }) {
            AuctionQueryResponse::Auction(auction) => {
                Ok(auction.map(|a| AuctionRpc::new(&a, state.timestamp)))
            }
            other => Err(Self::unexpected_query(other)),
        }
    }

    async fn query_list_auctions(
        &self,
        offset: Option<u64>,
        limit: Option<u64>,
    ) -> Result<Vec<AuctionSummaryRpc>, ErrorObjectOwned> {
        let query = AuctionQuery::ListAuctions {
            offset: offset.unwrap_or(0),
            limit: limit.unwrap_or(DEFAULT_LIMIT),
        };
        match self.state.read().query(query) {
            AuctionQueryResponse::AuctionList(summaries) => {
                Ok(summaries.iter().map(summary_rpc).collect())
            }
            other => Err(Self::unexpected_query(other)),
        }
    }

    async fn query_get_bids(&self, auction_id: u64) -> Result<Vec<BidRpc>, ErrorObjectOwned> {
        match self.state.read().query(AuctionQuery::GetAuctionBids { auction_id }) {
            AuctionQueryResponse::Bids(bids) => Ok(bids
                .map_err(Self::module_error)?
                .iter()
                .enumerate()
                .map(|(i, b)| BidRpc::new(i as u32, b))
                .collect()),
            other => Err(Self::unexpected_query(other)),
        }
    }

    async fn query_get_stats(&self, auction_id: u64) -> Result<AuctionStatsRpc, ErrorObjectOwned> {
        match self.state.read().query(AuctionQuery::GetStats { auction_id }) {
            AuctionQueryResponse::Stats(stats) => stats
                .map(|s| AuctionStatsRpc::from(&s))
                .map_err(Self::module_error),
            other => Err(Self::unexpected_query(other)),
        }
    }

    async fn query_get_winner(&self, auction_id: u64) -> Result<WinnerInfoRpc, ErrorObjectOwned> {
        match self.state.read().query(AuctionQuery::GetWinnerInfo { auction_id }) {
            AuctionQueryResponse::Winner(winner) => winner
                .map(|w| WinnerInfoRpc::from(&w))
                .map_err(Self::module_error),
            other => Err(Self::unexpected_query(other)),
        }
    }

    async fn query_get_events(
        &self,
        since: u64,
        limit: Option<u64>,
    ) -> Result<Vec<EventRpc>, ErrorObjectOwned> {
        let query = AuctionQuery::GetEvents {
            since,
            limit: limit.unwrap_or(DEFAULT_LIMIT),
        };
        match self.state.read().query(query) {
            AuctionQueryResponse::Events(events) => Ok(events.iter().map(EventRpc::from).collect()),
            other => Err(Self::unexpected_query(other)),
        }
    }

    async fn query_get_pending_decryptions(
        &self,
    ) -> Result<Vec<PendingDecryptionRpc>, ErrorObjectOwned> {
        match self.state.read().query(AuctionQuery::GetPendingDecryptions) {
            AuctionQueryResponse::PendingDecryptions(pending) => Ok(pending
                .into_iter()
                .map(|p| PendingDecryptionRpc {
                    request_id: p.request_id,
                    auction_id: p.auction_id,
                    requested_at: p.requested_at,
                    handle_count: p.handle_count,
                    expires_at: p.expires_at,
                    expired: p.expired,
                })
                .collect()),
            other => Err(Self::unexpected_query(other)),
        }
    }
}

fn summary_rpc(s: &AuctionSummary) -> AuctionSummaryRpc {
    AuctionSummaryRpc {
        auction_id: s.auction_id,
        creator: format_address(&s.creator),
        name: s.name.clone(),
        phase: format!("{:?}", s.phase),
        deadline: s.deadline,
        bid_count: s.bid_count,
    }
}

/// Periodically deliver fulfilled oracle responses.
async fn relay_loop(state: Arc<RwLock<ChainState>>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        let report = state.write().relay();
        for (request_id, reason) in &report.rejected {
            warn!(request_id, reason = %reason, "Relay rejected");
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("mock_chain=info".parse()?)
                .add_directive("jsonrpsee=warn".parse()?),
        )
        .init();

    let args = Args::parse();

    let coprocessor = LocalCoprocessor::new(&mut OsRng);
    let state = Arc::new(RwLock::new(ChainState::new(coprocessor)));

    if args.relay_interval_ms > 0 {
        let interval = Duration::from_millis(args.relay_interval_ms);
        tokio::spawn(relay_loop(state.clone(), interval));
        info!("Relaying oracle responses every {:?}", interval);
    } else {
        info!("Automatic relaying disabled, use oracle_relay");
    }

    info!("Starting mock chain server on {}", args.listen);

    let server = Server::builder().build(args.listen).await?;
    let handle = server.start(MockChainServer::new(state).into_rpc());

    info!("Mock chain server running. Press Ctrl+C to stop.");

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;

    info!("Shutting down...");
    handle.stop()?;
    handle.stopped().await;

    Ok(())
}
