//! In-process coprocessor.
//!
//! Keeps the plaintext behind every handle in a private table and answers
//! decryption requests on demand. Intended for tests and the mock chain, where
//! the real network coprocessor and its key management are out of reach.

use auction_types::{
    Address, CiphertextHandle, DecryptionProof, DecryptionResponse, EncryptedBool,
    EncryptedInput, InputProof, RequestId,
};
use parking_lot::{Mutex, RwLock};
use rand::{CryptoRng, RngCore};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

use crate::error::CoprocessorError;
use crate::proof::{decryption_proof, derive_handle, input_tag};
use crate::{DecryptionFulfiller, DecryptionOracle, HomomorphicOps};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Plaintext {
    Uint(u64),
    Bool(bool),
}

#[derive(Debug, Default)]
struct Ciphertexts {
    values: HashMap<CiphertextHandle, Plaintext>,
    next_nonce: u64,
}

impl Ciphertexts {
    fn insert(&mut self, key: &[u8; 32], value: Plaintext) -> CiphertextHandle {
        let handle = derive_handle(key, self.next_nonce);
        self.next_nonce += 1;
        self.values.insert(handle, value);
        handle
    }

    fn uint(&self, handle: &CiphertextHandle) -> Result<u64, CoprocessorError> {
        match self.values.get(handle) {
            Some(Plaintext::Uint(v)) => Ok(*v),
            Some(Plaintext::Bool(_)) => Err(CoprocessorError::TypeMismatch(*handle)),
            None => Err(CoprocessorError::UnknownHandle(*handle)),
        }
    }

    fn boolean(&self, handle: &CiphertextHandle) -> Result<bool, CoprocessorError> {
        match self.values.get(handle) {
            Some(Plaintext::Bool(b)) => Ok(*b),
            Some(Plaintext::Uint(_)) => Err(CoprocessorError::TypeMismatch(*handle)),
            None => Err(CoprocessorError::UnknownHandle(*handle)),
        }
    }
}

#[derive(Debug)]
struct OracleQueue {
    next_request_id: RequestId,
    outstanding: BTreeMap<RequestId, Vec<CiphertextHandle>>,
}

/// Simulated coprocessor and decryption oracle.
#[derive(Debug)]
pub struct LocalCoprocessor {
    key: [u8; 32],
    ciphertexts: RwLock<Ciphertexts>,
    oracle: Mutex<OracleQueue>,
}

impl LocalCoprocessor {
    /// Create a coprocessor with a random secret key.
    pub fn new<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let mut key = [0u8; 32];
        rng.fill_bytes(&mut key);
        Self::from_key(key)
    }

    /// Create a coprocessor with a fixed secret key.
    pub fn from_key(key: [u8; 32]) -> Self {
        Self {
            key,
            ciphertexts: RwLock::new(Ciphertexts::default()),
            oracle: Mutex::new(OracleQueue {
                next_request_id: 1,
                outstanding: BTreeMap::new(),
            }),
        }
    }

    /// Encrypt `amount` on behalf of `owner`, as a bidder's client would.
    pub fn encrypt_input(&self, amount: u64, owner: &Address) -> EncryptedInput {
        let handle = self.ciphertexts.write().insert(&self.key, Plaintext::Uint(amount));
        EncryptedInput {
            handle,
            proof: InputProof(input_tag(&self.key, &handle, owner)),
        }
    }

    /// Read the plaintext behind a handle directly. Only the simulator can do
    /// this; it exists so tests can check encrypted aggregates.
    pub fn decrypt_handle(&self, handle: &CiphertextHandle) -> Result<u64, CoprocessorError> {
        self.ciphertexts.read().uint(handle)
    }

    fn compare(
        &self,
        a: &CiphertextHandle,
        b: &CiphertextHandle,
        op: fn(u64, u64) -> bool,
    ) -> Result<EncryptedBool, CoprocessorError> {
        let mut ciphertexts = self.ciphertexts.write();
        let (x, y) = (ciphertexts.uint(a)?, ciphertexts.uint(b)?);
        let handle = ciphertexts.insert(&self.key, Plaintext::Bool(op(x, y)));
        Ok(EncryptedBool(handle))
    }
}

impl HomomorphicOps for LocalCoprocessor {
    fn trivial_encrypt(&self, value: u64) -> Result<CiphertextHandle, CoprocessorError> {
        Ok(self.ciphertexts.write().insert(&self.key, Plaintext::Uint(value)))
    }

    fn verify_input(
        &self,
        input: &EncryptedInput,
        owner: &Address,
    ) -> Result<CiphertextHandle, CoprocessorError> {
        if input_tag(&self.key, &input.handle, owner) != input.proof.0 {
            return Err(CoprocessorError::InvalidInputProof);
        }
        self.ciphertexts.read().uint(&input.handle)?;
        Ok(input.handle)
    }

    fn gt(
        &self,
        a: &CiphertextHandle,
        b: &CiphertextHandle,
    ) -> Result<EncryptedBool, CoprocessorError> {
        self.compare(a, b, |x, y| x > y)
    }

    fn lt(
        &self,
        a: &CiphertextHandle,
        b: &CiphertextHandle,
    ) -> Result<EncryptedBool, CoprocessorError> {
        self.compare(a, b, |x, y| x < y)
    }

    fn select(
        &self,
        cond: &EncryptedBool,
        if_true: &CiphertextHandle,
        if_false: &CiphertextHandle,
    ) -> Result<CiphertextHandle, CoprocessorError> {
        let mut ciphertexts = self.ciphertexts.write();
        let c = ciphertexts.boolean(&cond.0)? as u64;
        let (t, f) = (ciphertexts.uint(if_true)?, ciphertexts.uint(if_false)?);
        // mux without a data-dependent branch
        let value = t.wrapping_mul(c).wrapping_add(f.wrapping_mul(1 - c));
        Ok(ciphertexts.insert(&self.key, Plaintext::Uint(value)))
    }

    fn add(
        &self,
        a: &CiphertextHandle,
        b: &CiphertextHandle,
    ) -> Result<CiphertextHandle, CoprocessorError> {
        let mut ciphertexts = self.ciphertexts.write();
        let value = ciphertexts.uint(a)?.wrapping_add(ciphertexts.uint(b)?);
        Ok(ciphertexts.insert(&self.key, Plaintext::Uint(value)))
    }
}

impl DecryptionOracle for LocalCoprocessor {
    fn request_decryption(
        &self,
        handles: &[CiphertextHandle],
    ) -> Result<RequestId, CoprocessorError> {
        if handles.is_empty() {
            return Err(CoprocessorError::EmptyBatch);
        }
        {
            let ciphertexts = self.ciphertexts.read();
            for handle in handles {
                ciphertexts.uint(handle)?;
            }
        }

        let mut oracle = self.oracle.lock();
        let request_id = oracle.next_request_id;
        oracle.next_request_id += 1;
        oracle.outstanding.insert(request_id, handles.to_vec());

        info!(request_id, handles = handles.len(), "Decryption requested");
        Ok(request_id)
    }

    fn verify_decryption_proof(
        &self,
        request_id: RequestId,
        plaintexts: &[u64],
        proof: &DecryptionProof,
    ) -> bool {
        decryption_proof(&self.key, request_id, plaintexts) == *proof
    }
}

impl DecryptionFulfiller for LocalCoprocessor {
    fn outstanding(&self) -> Vec<RequestId> {
        self.oracle.lock().outstanding.keys().copied().collect()
    }

    fn fulfill(&self, request_id: RequestId) -> Result<DecryptionResponse, CoprocessorError> {
        let handles = self
            .oracle
            .lock()
            .outstanding
            .remove(&request_id)
            .ok_or(CoprocessorError::UnknownRequest(request_id))?;

        let ciphertexts = self.ciphertexts.read();
        let plaintexts = handles
            .iter()
            .map(|h| ciphertexts.uint(h))
            .collect::<Result<Vec<_>, _>>()?;

        debug!(request_id, count = plaintexts.len(), "Decryption fulfilled");

        Ok(DecryptionResponse {
            request_id,
            proof: decryption_proof(&self.key, request_id, &plaintexts),
            plaintexts,
        })
    }
}
