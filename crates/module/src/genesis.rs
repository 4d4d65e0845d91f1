//! Genesis configuration for the auction module.
//!
//! This module defines the tunables fixed when the chain starts.

use serde::{Deserialize, Serialize};

/// Genesis configuration for the auction module.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuctionGenesisConfig {
    /// Seconds after which an unanswered decryption request may be expired.
    /// `None` keeps requests pending until the oracle answers.
    pub decryption_timeout: Option<u64>,

    /// Upper bound on bids per auction (and so on the oracle batch size)
    pub max_bids_per_auction: u32,
}

impl Default for AuctionGenesisConfig {
    fn default() -> Self {
        Self {
            decryption_timeout: None,
            max_bids_per_auction: 1024,
        }
    }
}

impl AuctionGenesisConfig {
    /// Enable expiry of decryption requests older than `seconds`.
    pub fn with_decryption_timeout(mut self, seconds: u64) -> Self {
        self.decryption_timeout = Some(seconds);
        self
    }

    /// Validate the genesis configuration.
    pub fn validate(&self) -> Result<(), GenesisValidationError> {
        if self.decryption_timeout == Some(0) {
            return Err(GenesisValidationError::ZeroDecryptionTimeout);
        }
        if self.max_bids_per_auction == 0 {
            return Err(GenesisValidationError::ZeroBidLimit);
        }
        Ok(())
    }
}

/// Errors that can occur during genesis validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenesisValidationError {
    #[error("Decryption timeout cannot be zero")]
    ZeroDecryptionTimeout,

    #[error("Bid limit cannot be zero")]
    ZeroBidLimit,
}
