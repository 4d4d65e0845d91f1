//! Homomorphic arithmetic and decryption oracle capability for confidential auctions.
//!
//! The auction module never sees plaintext bid amounts. Everything it does with
//! them goes through the traits defined here:
//!
//! 1. **Arithmetic** ([`HomomorphicOps`]): comparisons, selection and addition over
//!    opaque 32-byte handles. Comparisons return encrypted booleans, so callers
//!    cannot branch on their outcome and must use [`HomomorphicOps::select`].
//!
//! 2. **Decryption requests** ([`DecryptionOracle`]): a batch of handles is
//!    submitted and a request id comes back immediately. The plaintexts arrive
//!    later together with an authenticity proof, which must be checked with
//!    [`DecryptionOracle::verify_decryption_proof`] before use.
//!
//! 3. **Fulfillment** ([`DecryptionFulfiller`]): the oracle side of the round
//!    trip, driven by a relayer that carries responses back to the module.
//!
//! [`LocalCoprocessor`] implements all three in process, for tests and the mock chain.

use auction_types::{
    Address, CiphertextHandle, DecryptionProof, DecryptionResponse, EncryptedBool,
    EncryptedInput, RequestId,
};

pub mod error;
pub mod local;
pub mod proof;

pub use error::CoprocessorError;
pub use local::LocalCoprocessor;

/// Pure operations over ciphertext handles.
///
/// Implementations must not reveal plaintexts through their results: every output
/// is a fresh handle.
pub trait HomomorphicOps {
    /// Encrypt a public constant.
    fn trivial_encrypt(&self, value: u64) -> Result<CiphertextHandle, CoprocessorError>;

    /// Check that `input` was encrypted for `owner` and return its handle.
    fn verify_input(
        &self,
        input: &EncryptedInput,
        owner: &Address,
    ) -> Result<CiphertextHandle, CoprocessorError>;

    /// Encrypted `a > b`.
    fn gt(
        &self,
        a: &CiphertextHandle,
        b: &CiphertextHandle,
    ) -> Result<EncryptedBool, CoprocessorError>;

    /// Encrypted `a < b`.
    fn lt(
        &self,
        a: &CiphertextHandle,
        b: &CiphertextHandle,
    ) -> Result<EncryptedBool, CoprocessorError>;

    /// Encrypted `if cond { if_true } else { if_false }`.
    fn select(
        &self,
        cond: &EncryptedBool,
        if_true: &CiphertextHandle,
        if_false: &CiphertextHandle,
    ) -> Result<CiphertextHandle, CoprocessorError>;

    /// Encrypted `a + b`, wrapping at 2^64.
    fn add(
        &self,
        a: &CiphertextHandle,
        b: &CiphertextHandle,
    ) -> Result<CiphertextHandle, CoprocessorError>;
}

/// Asynchronous batch decryption.
pub trait DecryptionOracle {
    /// Submit handles for decryption. The response is delivered later.
    ///
    /// Request ids must never repeat over the oracle's lifetime.
    fn request_decryption(
        &self,
        handles: &[CiphertextHandle],
    ) -> Result<RequestId, CoprocessorError>;

    /// Check that `proof` authenticates `plaintexts` as the answer to `request_id`.
    fn verify_decryption_proof(
        &self,
        request_id: RequestId,
        plaintexts: &[u64],
        proof: &DecryptionProof,
    ) -> bool;
}

/// Oracle side of the decryption round trip.
pub trait DecryptionFulfiller {
    /// Requests submitted but not yet fulfilled, oldest first.
    fn outstanding(&self) -> Vec<RequestId>;

    /// Decrypt the batch behind `request_id` and produce a proven response.
    fn fulfill(&self, request_id: RequestId) -> Result<DecryptionResponse, CoprocessorError>;
}
