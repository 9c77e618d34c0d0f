//! Validator node for the zkOracle block attestation protocol.
//!
//! The validator watches the oracle contract for `BlockRequested` events, waits until the
//! requested block is buried under enough confirmations, signs its hash and sends the vote
//! to the aggregator currently registered in the contract.

pub mod cmd;
pub mod common;
pub mod config;
pub mod confirmation;
pub mod directory;
pub mod dispatcher;
pub mod handler;
pub mod observer;
pub mod signer;
pub mod watcher;
