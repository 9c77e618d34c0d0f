use alloy_primitives::B256;

/// Identifier assigned by the oracle contract to every attestation request.
pub type RequestId = u64;

/// The hash of an execution layer block, as returned by the node.
pub type BlockHash = B256;

/// Position of an aggregator among the participants registered in the contract.
pub type AggregatorIndex = u64;
