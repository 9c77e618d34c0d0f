/// Number of blocks that must be built on top of a requested block before it is voted on.
///
/// Small enough to keep attestation latency low, large enough to make a reorg of the
/// requested block unlikely.
pub const DEFAULT_CONFIRMATIONS: u64 = 5;

/// Scheme assumed for aggregator addresses registered without one (e.g. `10.0.0.1:9000`).
pub const DEFAULT_AGGREGATOR_SCHEME: &str = "http";
