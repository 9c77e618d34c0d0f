use alloy_primitives::Bytes;
use serde::{Deserialize, Serialize};

use crate::aliases::{BlockHash, RequestId};

/// A validator's signed assertion of the hash of the requested block.
///
/// The serialized form is the payload of the `oracle_sendVote` RPC call:
/// `{ "requestId": u64, "blockHash": "0x..", "signature": "0x.." }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vote {
    pub request_id: RequestId,
    pub block_hash: BlockHash,
    pub signature: Bytes,
}

/// Acknowledgment returned by the aggregator once a vote has been accepted.
///
/// The aggregator echoes the request the vote belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteAck {
    pub request_id: RequestId,
}

impl VoteAck {
    /// Returns `true` if this acknowledgment was issued for `vote`.
    pub fn acknowledges(&self, vote: &Vote) -> bool {
        self.request_id == vote.request_id
    }
}
