use jsonrpsee::{core::RpcResult, proc_macros::rpc};
use zkoracle_primitives::core::{Vote, VoteAck};

/// RPC interface exposed by oracle nodes acting as aggregator.
#[rpc(client, server, namespace = "oracle")]
pub trait OracleNodeApi {
    /// Submits a validator's vote on a requested block.
    #[method(name = "sendVote")]
    async fn send_vote(&self, vote: Vote) -> RpcResult<VoteAck>;
}
