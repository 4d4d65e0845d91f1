//! Decryption Relayer
//!
//! Carries oracle answers back to the auction module:
//! 1. Discovering outstanding decryption requests at the oracle
//! 2. Fetching each fulfilled response with its proof
//! 3. Delivering the response to the module's callback entry point
//! 4. Recording whether the module accepted or rejected it
//!
//! The relayer holds no authority of its own. The module checks every proof, so
//! a faulty or malicious relayer can delay finalization but never forge it.

use auction_coprocessor::{CoprocessorError, DecryptionFulfiller};
use auction_types::{DecryptionResponse, RequestId};
use std::collections::BTreeMap;
use std::fmt::Display;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors that can occur while relaying.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RelayError {
    #[error("Request {0} is not tracked")]
    UnknownRequest(RequestId),

    #[error("Request {request_id} is not ready for delivery")]
    NotReady { request_id: RequestId },

    #[error("Oracle could not fulfill request {request_id}: {source}")]
    Fulfillment {
        request_id: RequestId,
        source: CoprocessorError,
    },
}

/// State of a relayed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayState {
    /// Seen at the oracle, response not fetched yet
    Queued,
    /// Response fetched, waiting for delivery
    Fulfilled,
    /// Module accepted the response
    Delivered,
    /// Oracle or module refused
    Rejected(String),
}

/// A single request being relayed.
#[derive(Debug, Clone)]
pub struct RelayRecord {
    pub request_id: RequestId,
    pub state: RelayState,
    /// Fetched response, kept until delivery
    pub response: Option<DecryptionResponse>,
    /// Delivery attempts so far
    pub attempts: u32,
}

impl RelayRecord {
    fn new(request_id: RequestId) -> Self {
        Self {
            request_id,
            state: RelayState::Queued,
            response: None,
            attempts: 0,
        }
    }

    /// Whether the record reached a terminal state.
    pub fn is_finished(&self) -> bool {
        matches!(self.state, RelayState::Delivered | RelayState::Rejected(_))
    }
}

/// Destination for oracle responses, usually the module's callback handler.
pub trait CallbackSink {
    type Error: Display;

    fn deliver(&mut self, response: DecryptionResponse) -> Result<(), Self::Error>;
}

impl<F, E> CallbackSink for F
where
    F: FnMut(DecryptionResponse) -> Result<(), E>,
    E: Display,
{
    type Error = E;

    fn deliver(&mut self, response: DecryptionResponse) -> Result<(), E> {
        self(response)
    }
}

/// Outcome of one relay pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelayReport {
    pub delivered: Vec<RequestId>,
    pub rejected: Vec<(RequestId, String)>,
}

impl RelayReport {
    pub fn is_empty(&self) -> bool {
        self.delivered.is_empty() && self.rejected.is_empty()
    }
}

/// Relayer for moving decryption responses from the oracle to the module.
#[derive(Debug, Default)]
pub struct DecryptionRelayer {
    /// Tracked requests
    requests: BTreeMap<RequestId, RelayRecord>,
}

impl DecryptionRelayer {
    /// Create a new relayer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking every request the oracle reports as outstanding.
    /// Returns the newly discovered request IDs.
    pub fn discover<F>(&mut self, fulfiller: &F) -> Vec<RequestId>
    where
        F: DecryptionFulfiller + ?Sized,
    {
        let mut discovered = Vec::new();
        for request_id in fulfiller.outstanding() {
            if self.requests.contains_key(&request_id) {
                continue;
            }
            debug!(request_id, "Discovered decryption request");
            self.requests.insert(request_id, RelayRecord::new(request_id));
            discovered.push(request_id);
        }
        discovered
    }

    /// Fetch the response for a queued request.
    pub fn fetch<F>(&mut self, fulfiller: &F, request_id: RequestId) -> Result<(), RelayError>
    where
        F: DecryptionFulfiller + ?Sized,
    {
        let record = self
            .requests
            .get_mut(&request_id)
            .ok_or(RelayError::UnknownRequest(request_id))?;

        if record.state != RelayState::Queued {
            return Err(RelayError::NotReady { request_id });
        }

        match fulfiller.fulfill(request_id) {
            Ok(response) => {
                debug!(
                    request_id,
                    plaintexts = response.plaintexts.len(),
                    "Fetched decryption response"
                );
                record.response = Some(response);
                record.state = RelayState::Fulfilled;
                Ok(())
            }
            Err(source) => {
                warn!(request_id, error = %source, "Oracle failed to fulfill request");
                record.state = RelayState::Rejected(source.to_string());
                Err(RelayError::Fulfillment { request_id, source })
            }
        }
    }

    /// Hand a fetched response to the sink.
    ///
    /// A rejection by the sink is terminal for the request: the module consumes
    /// correlation records on success only, so a refused response would be
    /// refused again.
    pub fn deliver<S>(&mut self, sink: &mut S, request_id: RequestId) -> Result<RelayState, RelayError>
    where
        S: CallbackSink + ?Sized,
    {
        let record = self
            .requests
            .get_mut(&request_id)
            .ok_or(RelayError::UnknownRequest(request_id))?;

        let response = match (&record.state, record.response.take()) {
            (RelayState::Fulfilled, Some(response)) => response,
            (_, response) => {
                record.response = response;
                return Err(RelayError::NotReady { request_id });
            }
        };

        record.attempts += 1;
        record.state = match sink.deliver(response) {
            Ok(()) => {
                info!(request_id, "Decryption response delivered");
                RelayState::Delivered
            }
            Err(e) => {
                warn!(request_id, error = %e, "Decryption response rejected");
                RelayState::Rejected(e.to_string())
            }
        };

        Ok(record.state.clone())
    }

    /// Run one full pass: discover, fetch and deliver everything ready.
    pub fn relay_once<F, S>(&mut self, fulfiller: &F, sink: &mut S) -> RelayReport
    where
        F: DecryptionFulfiller + ?Sized,
        S: CallbackSink + ?Sized,
    {
        self.discover(fulfiller);

        let mut report = RelayReport::default();
        for request_id in self.requests_in(&RelayState::Queued) {
            if let Err(e) = self.fetch(fulfiller, request_id) {
                report.rejected.push((request_id, e.to_string()));
            }
        }

        for request_id in self.requests_in(&RelayState::Fulfilled) {
            match self.deliver(sink, request_id) {
                Ok(RelayState::Delivered) => report.delivered.push(request_id),
                Ok(RelayState::Rejected(reason)) => report.rejected.push((request_id, reason)),
                Ok(_) => {}
                Err(e) => report.rejected.push((request_id, e.to_string())),
            }
        }

        if !report.is_empty() {
            info!(
                delivered = report.delivered.len(),
                rejected = report.rejected.len(),
                "Relay pass complete"
            );
        }
        report
    }

    /// Get the state of a tracked request.
    pub fn get_state(&self, request_id: RequestId) -> Option<RelayState> {
        self.requests.get(&request_id).map(|r| r.state.clone())
    }

    /// Get all request IDs not yet in a terminal state.
    pub fn pending_requests(&self) -> Vec<RequestId> {
        self.requests
            .values()
            .filter(|r| !r.is_finished())
            .map(|r| r.request_id)
            .collect()
    }

    /// Forget requests in a terminal state. Returns how many were removed.
    pub fn prune_finished(&mut self) -> usize {
        let before = self.requests.len();
        self.requests.retain(|_, r| !r.is_finished());
        before - self.requests.len()
    }

    fn requests_in(&self, state: &RelayState) -> Vec<RequestId> {
        self.requests
            .values()
            .filter(|r| &r.state == state)
            .map(|r| r.request_id)
            .collect()
    }
}
