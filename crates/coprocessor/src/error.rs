//! Error types for coprocessor operations.

use auction_types::{CiphertextHandle, RequestId};
use thiserror::Error;

/// Errors that can occur while operating on ciphertext handles.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoprocessorError {
    #[error("Unknown ciphertext handle {0}")]
    UnknownHandle(CiphertextHandle),

    #[error("Ciphertext {0} has the wrong type for this operation")]
    TypeMismatch(CiphertextHandle),

    #[error("Input proof does not bind the ciphertext to its owner")]
    InvalidInputProof,

    #[error("Decryption request carries no handles")]
    EmptyBatch,

    #[error("Unknown decryption request {0}")]
    UnknownRequest(RequestId),
}
