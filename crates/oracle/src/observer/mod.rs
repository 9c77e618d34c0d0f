//! Read access to the chain and the oracle contract.

pub mod contract;
mod provider;

use alloy_primitives::U256;
use alloy_transport::TransportError;
use async_trait::async_trait;
use tokio::sync::mpsc::{self, error::SendError};
use zkoracle_primitives::{
    aliases::AggregatorIndex,
    core::{AttestationRequest, BlockHeader},
};

pub use self::provider::ContractObserver;

/// Number of decoded requests buffered between the node subscription and the watcher.
pub const DEFAULT_SUBSCRIPTION_BUFFER: usize = 256;

#[derive(Debug, thiserror::Error)]
pub enum ObserverError {
    #[error("`{method}` failed: {source}")]
    Rpc {
        method: &'static str,
        #[source]
        source: TransportError,
    },

    #[error("block {0} is unknown to the node")]
    BlockNotFound(u64),

    #[error("requested block {requested} but the node returned block {returned}")]
    UnexpectedBlock { requested: u64, returned: u64 },

    #[error("could not decode `{item}`: {source}")]
    Decode {
        item: &'static str,
        #[source]
        source: alloy_sol_types::Error,
    },

    #[error("`{field}` does not fit in 64 bits: {value}")]
    Overflow { field: &'static str, value: U256 },

    #[error("subscription closed by the node")]
    SubscriptionClosed,

    #[error("subscription lagged behind and dropped {0} events")]
    SubscriptionLagged(u64),
}

/// The chain as seen by a validator.
///
/// Implementations are shared by all in-flight requests, so every method takes `&self`.
#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
#[async_trait]
pub trait ChainObserver: Send + Sync + 'static {
    /// Subscribes to `BlockRequested` events of the oracle contract.
    async fn subscribe_requests(&self) -> Result<RequestSubscription, ObserverError>;

    async fn header_by_number(&self, number: u64) -> Result<BlockHeader, ObserverError>;

    async fn current_head_number(&self) -> Result<u64, ObserverError>;

    async fn current_aggregator_index(&self) -> Result<AggregatorIndex, ObserverError>;

    async fn address_for_index(&self, index: AggregatorIndex) -> Result<String, ObserverError>;
}

/// Creates a connected [`RequestSink`] and [`RequestSubscription`].
pub fn request_channel(buffer: usize) -> (RequestSink, RequestSubscription) {
    let (tx, rx) = mpsc::channel(buffer);
    (RequestSink(tx), RequestSubscription(rx))
}

/// Receiving half of an attestation request subscription.
///
/// Requests and transport errors share one channel, so an error is only observed after
/// every request delivered before it. Dropping the subscription releases it.
#[derive(Debug)]
pub struct RequestSubscription(mpsc::Receiver<Result<AttestationRequest, ObserverError>>);

impl RequestSubscription {
    /// Waits for the next request.
    ///
    /// Fails with [`ObserverError::SubscriptionClosed`] once the producing side is gone.
    /// Cancellation safe.
    pub async fn next(&mut self) -> Result<AttestationRequest, ObserverError> {
        self.0
            .recv()
            .await
            .unwrap_or(Err(ObserverError::SubscriptionClosed))
    }
}

/// Producing half of an attestation request subscription.
#[derive(Debug, Clone)]
pub struct RequestSink(mpsc::Sender<Result<AttestationRequest, ObserverError>>);

impl RequestSink {
    pub async fn send(
        &self,
        item: Result<AttestationRequest, ObserverError>,
    ) -> Result<(), SendError<Result<AttestationRequest, ObserverError>>> {
        self.0.send(item).await
    }

    /// Completes once the [`RequestSubscription`] has been dropped.
    pub async fn closed(&self) {
        self.0.closed().await
    }

    pub fn is_closed(&self) -> bool {
        self.0.is_closed()
    }
}
