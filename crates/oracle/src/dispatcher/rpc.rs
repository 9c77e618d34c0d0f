use std::time::Duration;

use async_trait::async_trait;
use jsonrpsee::{core::ClientError, http_client::HttpClientBuilder};
use tracing::trace;
use zkoracle_primitives::core::{AggregatorEndpoint, Vote, VoteAck};

use super::{api::OracleNodeApiClient, DispatchError, Messenger};

/// Default timeout of a single `oracle_sendVote` call.
pub const DEFAULT_RPC_TIMEOUT: Duration = Duration::from_secs(10);

/// [`Messenger`] speaking JSON-RPC over HTTP.
///
/// A fresh client is built for every vote since the aggregator changes between requests.
#[derive(Debug, Clone)]
pub struct RpcMessenger {
    request_timeout: Duration,
}

impl RpcMessenger {
    pub fn new(request_timeout: Duration) -> Self {
        Self { request_timeout }
    }
}

impl Default for RpcMessenger {
    fn default() -> Self {
        Self::new(DEFAULT_RPC_TIMEOUT)
    }
}

#[async_trait]
impl Messenger for RpcMessenger {
    async fn send_vote(
        &self,
        endpoint: &AggregatorEndpoint,
        vote: &Vote,
    ) -> Result<VoteAck, DispatchError> {
        let url = endpoint.url()?.to_string();

        let client = HttpClientBuilder::default()
            .request_timeout(self.request_timeout)
            .build(&url)
            .map_err(|source| DispatchError::Connect {
                url: url.clone(),
                source,
            })?;

        trace!(%url, request = vote.request_id, "Calling oracle_sendVote");

        client
            .send_vote(vote.clone())
            .await
            .map_err(|source| match source {
                ClientError::ParseError(e) => DispatchError::MalformedAck {
                    request_id: vote.request_id,
                    reason: e.to_string(),
                },
                ClientError::Transport(_) => DispatchError::Connect { url, source },
                source => DispatchError::Rpc { url, source },
            })
    }
}

#[cfg(test)]
mod tests {
    use std::{net::SocketAddr, sync::Arc};

    use alloy_primitives::Bytes;
    use jsonrpsee::{
        core::{async_trait, RpcResult},
        server::{Server, ServerHandle},
        types::ErrorObjectOwned,
    };
    use parking_lot::Mutex;
    use zkoracle_primitives::aliases::BlockHash;

    use super::*;
    use crate::dispatcher::api::OracleNodeApiServer;

    #[derive(Clone, Default)]
    struct StubAggregator {
        received: Arc<Mutex<Vec<Vote>>>,
        reject: bool,
    }

    #[async_trait]
    impl OracleNodeApiServer for StubAggregator {
        async fn send_vote(&self, vote: Vote) -> RpcResult<VoteAck> {
            if self.reject {
                return Err(ErrorObjectOwned::owned(
                    -32000,
                    "not the current aggregator",
                    None::<()>,
                ));
            }

            let request_id = vote.request_id;
            self.received.lock().push(vote);
            Ok(VoteAck { request_id })
        }
    }

    async fn start(aggregator: StubAggregator) -> (SocketAddr, ServerHandle) {
        let server = Server::builder().build("127.0.0.1:0").await.unwrap();
        let addr = server.local_addr().unwrap();

        (addr, server.start(aggregator.into_rpc()))
    }

    fn vote() -> Vote {
        Vote {
            request_id: 42,
            block_hash: BlockHash::with_last_byte(7),
            signature: Bytes::from_static(&[0xaa; 65]),
        }
    }

    #[tokio::test]
    async fn delivers_vote_to_aggregator() {
        let aggregator = StubAggregator::default();
        let (addr, handle) = start(aggregator.clone()).await;

        let ack = RpcMessenger::default()
            .send_vote(&AggregatorEndpoint::new(0, addr.to_string()), &vote())
            .await
            .unwrap();

        assert_eq!(ack, VoteAck { request_id: 42 });
        assert_eq!(*aggregator.received.lock(), vec![vote()]);

        handle.stop().unwrap();
    }

    #[tokio::test]
    async fn rpc_error_is_reported() {
        let (addr, handle) = start(StubAggregator {
            reject: true,
            ..Default::default()
        })
        .await;

        let err = RpcMessenger::default()
            .send_vote(&AggregatorEndpoint::new(0, addr.to_string()), &vote())
            .await
            .unwrap_err();

        assert!(matches!(err, DispatchError::Rpc { .. }), "{err:?}");

        handle.stop().unwrap();
    }

    #[tokio::test]
    async fn unreachable_aggregator() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = RpcMessenger::new(Duration::from_secs(2))
            .send_vote(&AggregatorEndpoint::new(0, addr.to_string()), &vote())
            .await
            .unwrap_err();

        assert!(matches!(err, DispatchError::Connect { .. }), "{err:?}");
    }

    #[tokio::test]
    async fn malformed_endpoint_is_not_dialed() {
        let err = RpcMessenger::default()
            .send_vote(&AggregatorEndpoint::new(0, "ftp://10.0.0.1"), &vote())
            .await
            .unwrap_err();

        assert!(matches!(err, DispatchError::Endpoint(_)));
    }
}
