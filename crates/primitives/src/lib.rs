pub use alloy_primitives;

/// Types exchanged between the chain, the validator and the aggregator.
pub mod core;

pub mod consts;

pub mod aliases;
