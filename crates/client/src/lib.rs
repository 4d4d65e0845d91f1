//! Client SDK for confidential sealed-bid auctions.
//!
//! This crate provides a typed API over the mock chain's JSON-RPC surface for:
//! - Encrypting bid amounts through the coprocessor gateway
//! - Creating, bidding on, closing and finalizing auctions
//! - Driving the decryption relay
//! - Querying auction state, revealed statistics and events

pub mod rpc;

pub use rpc::{AuctionClient, ClientError, ClientResult};
