//! Typed JSON-RPC client for the mock chain.

use jsonrpsee::core::client::{ClientT, Error as RpcError};
use jsonrpsee::http_client::{HttpClient, HttpClientBuilder};
use thiserror::Error;
use tracing::debug;

use auction_types::rpc::*;

/// Errors returned by [`AuctionClient`].
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("RPC error: {0}")]
    Rpc(#[from] RpcError),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Result type for client calls.
pub type ClientResult<T> = Result<T, ClientError>;

/// Client for the auction mock chain.
pub struct AuctionClient {
    inner: HttpClient,
}

impl AuctionClient {
    /// Connect to a mock chain RPC endpoint.
    pub fn new(url: &str) -> ClientResult<Self> {
        let inner = HttpClientBuilder::default().build(url)?;
        Ok(Self { inner })
    }

    // ============ Admin ============

    pub async fn init(&self, config: GenesisConfigRpc) -> ClientResult<bool> {
        Ok(self.inner.request("admin_init", vec![config]).await?)
    }

    pub async fn advance_block(&self) -> ClientResult<BlockInfo> {
        Ok(self.inner.request("admin_advanceBlock", Vec::<()>::new()).await?)
    }

    pub async fn set_timestamp(&self, timestamp: u64) -> ClientResult<bool> {
        Ok(self.inner.request("admin_setTimestamp", vec![timestamp]).await?)
    }

    pub async fn block_info(&self) -> ClientResult<BlockInfo> {
        Ok(self.inner.request("chain_getBlockInfo", Vec::<()>::new()).await?)
    }

    // ============ Auction ============

    /// Encrypt an amount through the coprocessor gateway, bound to `sender`.
    pub async fn encrypt_input(&self, sender: &str, amount: u64) -> ClientResult<EncryptedInputRpc> {
        let params = EncryptInputParams {
            sender: sender.to_string(),
            amount,
        };
        Ok(self.inner.request("fhe_encryptInput", vec![params]).await?)
    }

    pub async fn create_auction(
        &self,
        sender: &str,
        name: &str,
        description: Option<String>,
        deadline: u64,
    ) -> ClientResult<u64> {
        let params = CreateAuctionParams {
            sender: sender.to_string(),
            name: name.to_string(),
            description,
            deadline,
        };
        Ok(self.inner.request("auction_create", vec![params]).await?)
    }

    /// Encrypt `amount` and place it as a bid. Returns the bid index.
    pub async fn place_bid(&self, sender: &str, auction_id: u64, amount: u64) -> ClientResult<u32> {
        let input = self.encrypt_input(sender, amount).await?;
        debug!(auction_id, handle = %input.handle, "Encrypted bid amount");

        let params = PlaceBidParams {
            sender: sender.to_string(),
            auction_id,
            input,
        };
        Ok(self.inner.request("auction_placeBid", vec![params]).await?)
    }

    pub async fn close_auction(&self, sender: &str, auction_id: u64) -> ClientResult<bool> {
        Ok(self
            .inner
            .request("auction_close", (sender, auction_id))
            .await?)
    }

    pub async fn request_finalize(
        &self,
        sender: &str,
        auction_id: u64,
    ) -> ClientResult<FinalizeOutcomeRpc> {
        let outcome: FinalizeOutcomeRpc = self
            .inner
            .request("auction_requestFinalize", (sender, auction_id))
            .await?;
        if outcome.stats.is_some() == outcome.request_id.is_some() {
            return Err(ClientError::InvalidResponse(
                "finalize outcome must carry exactly one of stats or request_id".into(),
            ));
        }
        Ok(outcome)
    }

    pub async fn expire_decryption(&self, sender: &str, auction_id: u64) -> ClientResult<u64> {
        Ok(self
            .inner
            .request("auction_expireDecryption", (sender, auction_id))
            .await?)
    }

    pub async fn relay(&self) -> ClientResult<RelayReportRpc> {
        Ok(self.inner.request("oracle_relay", Vec::<()>::new()).await?)
    }

    // ============ Queries ============

    pub async fn get_auction(&self, auction_id: u64) -> ClientResult<Option<AuctionRpc>> {
        Ok(self.inner.request("query_getAuction", vec![auction_id]).await?)
    }

    pub async fn list_auctions(
        &self,
        offset: Option<u64>,
        limit: Option<u64>,
    ) -> ClientResult<Vec<AuctionSummaryRpc>> {
        Ok(self
            .inner
            .request("query_listAuctions", (offset, limit))
            .await?)
    }

    pub async fn get_bids(&self, auction_id: u64) -> ClientResult<Vec<BidRpc>> {
        Ok(self.inner.request("query_getBids", vec![auction_id]).await?)
    }

    pub async fn get_stats(&self, auction_id: u64) -> ClientResult<AuctionStatsRpc> {
        Ok(self.inner.request("query_getStats", vec![auction_id]).await?)
    }

    pub async fn get_winner(&self, auction_id: u64) -> ClientResult<WinnerInfoRpc> {
        Ok(self.inner.request("query_getWinner", vec![auction_id]).await?)
    }

    pub async fn get_events(&self, since: u64, limit: Option<u64>) -> ClientResult<Vec<EventRpc>> {
        Ok(self
            .inner
            .request("query_getEvents", (since, limit))
            .await?)
    }

    pub async fn get_pending_decryptions(&self) -> ClientResult<Vec<PendingDecryptionRpc>> {
        Ok(self
            .inner
            .request("query_getPendingDecryptions", Vec::<()>::new())
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_invalid_url_rejected() {
        assert!(matches!(
            AuctionClient::new("not a url"),
            Err(ClientError::Rpc(_))
        ));
    }

    #[tokio::test]
    async fn test_valid_url_accepted() {
        assert!(AuctionClient::new("http://127.0.0.1:9944").is_ok());
    }
}
