use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::aliases::RequestId;

/// A `BlockRequested` event emitted by the oracle contract.
///
/// Requests are consumed exactly once by the request handler and never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttestationRequest {
    pub request_id: RequestId,
    pub block_number: u64,
}

impl AttestationRequest {
    pub fn new(request_id: RequestId, block_number: u64) -> Self {
        Self {
            request_id,
            block_number,
        }
    }
}

impl Display for AttestationRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "request {} for block {}", self.request_id, self.block_number)
    }
}
