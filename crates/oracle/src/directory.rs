//! Resolves the aggregator votes must be sent to.

use std::sync::Arc;

use tracing::trace;
use zkoracle_primitives::{
    aliases::AggregatorIndex,
    core::{AggregatorEndpoint, EndpointError},
};

use crate::observer::{ChainObserver, ObserverError};

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("failed to read the current aggregator: {0}")]
    Index(#[source] ObserverError),

    #[error("failed to read the address of aggregator {index}: {source}")]
    Address {
        index: AggregatorIndex,
        #[source]
        source: ObserverError,
    },

    #[error(transparent)]
    Endpoint(#[from] EndpointError),
}

/// Looks the aggregator up in the oracle contract.
///
/// Nothing is cached: the aggregator role rotates and a vote sent to a stale address is
/// never counted.
#[derive(Debug)]
pub struct AggregatorDirectory<O> {
    observer: Arc<O>,
}

impl<O: ChainObserver> AggregatorDirectory<O> {
    pub fn new(observer: Arc<O>) -> Self {
        Self { observer }
    }

    /// Reads the current aggregator index, then the address registered for it.
    ///
    /// Fails if either read fails or the address is empty or cannot be dialed.
    pub async fn resolve_aggregator(&self) -> Result<AggregatorEndpoint, DirectoryError> {
        let index = self
            .observer
            .current_aggregator_index()
            .await
            .map_err(DirectoryError::Index)?;

        let address = self
            .observer
            .address_for_index(index)
            .await
            .map_err(|source| DirectoryError::Address { index, source })?;

        let endpoint = AggregatorEndpoint::new(index, address);
        endpoint.url()?;

        trace!(index, address = %endpoint.address, "Resolved aggregator");

        Ok(endpoint)
    }
}
