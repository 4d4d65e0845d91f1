//! Keyed tags used by the local coprocessor.
//!
//! Handles, input proofs and decryption proofs are all SHA-256 digests over a
//! domain separator, the coprocessor's secret key and the bound values:
//!
//! - handle:           H("AUCTION_FHE_HANDLE_V1:" || key || nonce)
//! - input proof:      H("AUCTION_FHE_INPUT_V1:" || key || handle || owner)
//! - decryption proof: H("AUCTION_FHE_DECRYPT_V1:" || key || request_id || n || p_0 .. p_n)

use auction_types::{Address, CiphertextHandle, DecryptionProof, RequestId};
use sha2::{Digest, Sha256};

const HANDLE_DOMAIN: &[u8] = b"AUCTION_FHE_HANDLE_V1:";
const INPUT_DOMAIN: &[u8] = b"AUCTION_FHE_INPUT_V1:";
const DECRYPT_DOMAIN: &[u8] = b"AUCTION_FHE_DECRYPT_V1:";

/// Derive a fresh handle from the key and a nonce that is never reused.
pub fn derive_handle(key: &[u8; 32], nonce: u64) -> CiphertextHandle {
    let mut hasher = Sha256::new();
    hasher.update(HANDLE_DOMAIN);
    hasher.update(key);
    hasher.update(nonce.to_le_bytes());
    CiphertextHandle(hasher.finalize().into())
}

/// Tag binding an encrypted input to the address allowed to submit it.
pub fn input_tag(key: &[u8; 32], handle: &CiphertextHandle, owner: &Address) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(INPUT_DOMAIN);
    hasher.update(key);
    hasher.update(handle.0);
    hasher.update(owner);
    hasher.finalize().into()
}

/// Proof binding decrypted plaintexts to the request they answer.
pub fn decryption_proof(key: &[u8; 32], request_id: RequestId, plaintexts: &[u64]) -> DecryptionProof {
    let mut hasher = Sha256::new();
    hasher.update(DECRYPT_DOMAIN);
    hasher.update(key);
    hasher.update(request_id.to_le_bytes());
    hasher.update((plaintexts.len() as u64).to_le_bytes());
    for p in plaintexts {
        hasher.update(p.to_le_bytes());
    }
    DecryptionProof(hasher.finalize().to_vec())
}
