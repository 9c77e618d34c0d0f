//! Delivery of signed votes to the aggregator.

pub mod api;
mod rpc;

use async_trait::async_trait;
use jsonrpsee::core::ClientError;
use zkoracle_primitives::{
    aliases::RequestId,
    core::{AggregatorEndpoint, EndpointError, Vote, VoteAck},
};

pub use self::rpc::{RpcMessenger, DEFAULT_RPC_TIMEOUT};

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error(transparent)]
    Endpoint(#[from] EndpointError),

    #[error("could not reach aggregator at {url}: {source}")]
    Connect {
        url: String,
        #[source]
        source: ClientError,
    },

    #[error("aggregator at {url} failed the call: {source}")]
    Rpc {
        url: String,
        #[source]
        source: ClientError,
    },

    #[error("malformed acknowledgment for request {request_id}: {reason}")]
    MalformedAck {
        request_id: RequestId,
        reason: String,
    },
}

/// Point-to-point transport to other oracle nodes.
#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
#[async_trait]
pub trait Messenger: Send + Sync + 'static {
    /// Sends `vote` to `endpoint` and waits for its acknowledgment.
    async fn send_vote(
        &self,
        endpoint: &AggregatorEndpoint,
        vote: &Vote,
    ) -> Result<VoteAck, DispatchError>;
}

/// Sends each vote exactly once, without retries.
#[derive(Debug)]
pub struct VoteDispatcher<M> {
    messenger: M,
}

impl<M: Messenger> VoteDispatcher<M> {
    pub fn new(messenger: M) -> Self {
        Self { messenger }
    }

    pub async fn dispatch(
        &self,
        endpoint: &AggregatorEndpoint,
        vote: &Vote,
    ) -> Result<VoteAck, DispatchError> {
        let ack = self.messenger.send_vote(endpoint, vote).await?;

        if !ack.acknowledges(vote) {
            return Err(DispatchError::MalformedAck {
                request_id: vote.request_id,
                reason: format!("acknowledges request {}", ack.request_id),
            });
        }

        Ok(ack)
    }
}
