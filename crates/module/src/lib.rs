//! Confidential sealed-bid auction module.
//!
//! Bid amounts arrive as ciphertext handles and are folded into encrypted
//! running statistics (maximum, minimum, sum) without ever being decrypted.
//! Once bidding ends, the full bid list is sent to a decryption oracle and the
//! revealed statistics are recorded when the oracle calls back.
//!
//! # Architecture
//!
//! - `call`: Message types for state-changing operations
//! - `handlers`: Lifecycle and decryption correlation logic
//! - `engine`: Oblivious aggregate updates and the plaintext tally
//! - `queries`: Read-only state access
//! - `events`: Event log access
//! - `state`: Module state structures
//! - `genesis`: Initial configuration
//! - `error`: Error types
//!
//! # Example
//!
//! ```ignore
//! use auction_module::{handlers, AuctionState};
//!
//! let mut state = AuctionState::new();
//! let ctx = handlers::CallContext { ... };
//!
//! let auction_id = handlers::handle_create_auction(&mut state, &coprocessor, &ctx, metadata, deadline)?;
//! handlers::handle_place_bid(&mut state, &coprocessor, &ctx, auction_id, &input)?;
//! ```

pub mod call;
pub mod engine;
pub mod error;
pub mod events;
pub mod genesis;
pub mod handlers;
pub mod queries;
pub mod state;

pub use call::AuctionCall;
pub use error::AuctionError;
pub use genesis::{AuctionGenesisConfig, GenesisValidationError};
pub use handlers::{CallContext, CallOutcome, FinalizeOutcome, HandlerResult};
pub use queries::{AuctionQuery, AuctionQueryResponse};
pub use state::{AuctionState, InvariantViolation};
