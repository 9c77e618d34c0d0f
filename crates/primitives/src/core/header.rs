use serde::{Deserialize, Serialize};

use crate::aliases::BlockHash;

/// The subset of a block header the validator votes on.
///
/// Always fetched fresh for every request so the confirmation depth is measured against the
/// live chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub number: u64,
    pub hash: BlockHash,
}

impl BlockHeader {
    pub fn new(number: u64, hash: BlockHash) -> Self {
        Self { number, hash }
    }
}
