//! Call message types for the auction module.

use auction_types::{AuctionId, AuctionMetadata, DecryptionResponse, EncryptedInput};
use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

/// Call messages for the auction module.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub enum AuctionCall {
    // === Auction Lifecycle ===
    /// Create a new auction accepting bids until `deadline`.
    CreateAuction {
        metadata: AuctionMetadata,
        deadline: u64,
    },

    /// Submit an encrypted bid bound to the sender.
    PlaceBid {
        auction_id: AuctionId,
        input: EncryptedInput,
    },

    /// Stop accepting bids before the deadline (creator only).
    CloseAuction { auction_id: AuctionId },

    /// Ask the oracle to reveal the bids (permissionless).
    RequestFinalize { auction_id: AuctionId },

    // === Oracle ===
    /// Deliver the plaintexts for an outstanding decryption request.
    DecryptionCallback { response: DecryptionResponse },

    /// Drop a decryption request that outlived the configured timeout.
    ExpireDecryption { auction_id: AuctionId },
}
