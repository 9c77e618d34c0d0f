use alloy_primitives::{Address, U256};
use alloy_provider::Provider;
use alloy_pubsub::{PubSubFrontend, Subscription};
use alloy_rpc_types::{
    BlockNumberOrTag, BlockTransactionsKind, Filter, Log, TransactionInput, TransactionRequest,
};
use alloy_sol_types::{SolCall, SolEvent};
use async_trait::async_trait;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, trace, warn};
use zkoracle_primitives::{
    aliases::AggregatorIndex,
    core::{AttestationRequest, BlockHeader},
};

use super::{
    contract::IZKOracle::{self, BlockRequested},
    request_channel, ChainObserver, ObserverError, RequestSink, RequestSubscription,
    DEFAULT_SUBSCRIPTION_BUFFER,
};

/// [`ChainObserver`] backed by an alloy provider and the deployed oracle contract.
///
/// The provider must support subscriptions (websocket or IPC).
#[derive(Debug, Clone)]
pub struct ContractObserver<P> {
    provider: P,
    contract: Address,
}

impl<P> ContractObserver<P>
where
    P: Provider<PubSubFrontend> + Clone + 'static,
{
    pub fn new(provider: P, contract: Address) -> Self {
        Self { provider, contract }
    }

    /// Makes a read-only call to the oracle contract and decodes the response.
    async fn call_and_decode<C: SolCall>(&self, call: C) -> Result<C::Return, ObserverError> {
        let req = TransactionRequest::default()
            .to(self.contract)
            .input(TransactionInput::new(call.abi_encode().into()));

        let data = self
            .provider
            .call(&req)
            .await
            .map_err(|source| ObserverError::Rpc {
                method: C::SIGNATURE,
                source,
            })?;

        C::abi_decode_returns(data.as_ref(), true).map_err(|source| ObserverError::Decode {
            item: C::SIGNATURE,
            source,
        })
    }
}

#[async_trait]
impl<P> ChainObserver for ContractObserver<P>
where
    P: Provider<PubSubFrontend> + Clone + 'static,
{
    async fn subscribe_requests(&self) -> Result<RequestSubscription, ObserverError> {
        let filter = Filter::new()
            .address(self.contract)
            .event_signature(BlockRequested::SIGNATURE_HASH);

        let subscription = self
            .provider
            .subscribe_logs(&filter)
            .await
            .map_err(|source| ObserverError::Rpc {
                method: "eth_subscribe",
                source,
            })?;

        let (sink, requests) = request_channel(DEFAULT_SUBSCRIPTION_BUFFER);
        tokio::spawn(forward_requests(self.provider.clone(), subscription, sink));

        Ok(requests)
    }

    async fn header_by_number(&self, number: u64) -> Result<BlockHeader, ObserverError> {
        let block = self
            .provider
            .get_block_by_number(BlockNumberOrTag::Number(number), BlockTransactionsKind::Hashes)
            .await
            .map_err(|source| ObserverError::Rpc {
                method: "eth_getBlockByNumber",
                source,
            })?
            .ok_or(ObserverError::BlockNotFound(number))?;

        if block.header.number != number {
            return Err(ObserverError::UnexpectedBlock {
                requested: number,
                returned: block.header.number,
            });
        }

        Ok(BlockHeader::new(block.header.number, block.header.hash))
    }

    async fn current_head_number(&self) -> Result<u64, ObserverError> {
        self.provider
            .get_block_number()
            .await
            .map_err(|source| ObserverError::Rpc {
                method: "eth_blockNumber",
                source,
            })
    }

    async fn current_aggregator_index(&self) -> Result<AggregatorIndex, ObserverError> {
        let IZKOracle::getAggregatorReturn { _0: index } =
            self.call_and_decode(IZKOracle::getAggregatorCall {}).await?;

        to_u64("aggregator index", index)
    }

    async fn address_for_index(&self, index: AggregatorIndex) -> Result<String, ObserverError> {
        let IZKOracle::getIPAddressReturn { _0: address } = self
            .call_and_decode(IZKOracle::getIPAddressCall {
                index: U256::from(index),
            })
            .await?;

        Ok(address)
    }
}

/// Decodes subscription logs into requests until either side goes away, then
/// unsubscribes from the node.
async fn forward_requests<P: Provider<PubSubFrontend>>(
    provider: P,
    mut subscription: Subscription<Log>,
    sink: RequestSink,
) {
    let id = *subscription.local_id();

    loop {
        let log = tokio::select! {
            _ = sink.closed() => break,
            log = subscription.recv() => log,
        };

        let item = match log {
            Ok(log) => match decode_request(&log) {
                Ok(Some(request)) => Ok(request),
                Ok(None) => {
                    trace!(tx_hash = ?log.transaction_hash, "Skipping removed log");
                    continue;
                }
                Err(e) => {
                    warn!(
                        error = %e,
                        tx_hash = ?log.transaction_hash,
                        "Skipping undecodable block requested event"
                    );
                    continue;
                }
            },
            Err(RecvError::Lagged(missed)) => Err(ObserverError::SubscriptionLagged(missed)),
            Err(RecvError::Closed) => Err(ObserverError::SubscriptionClosed),
        };

        let is_err = item.is_err();
        if sink.send(item).await.is_err() || is_err {
            break;
        }
    }

    if let Err(e) = provider.unsubscribe(id).await {
        debug!(error = %e, "Failed to unsubscribe from block requested events");
    }
}

/// Returns [None] for logs that were removed by a reorg.
fn decode_request(log: &Log) -> Result<Option<AttestationRequest>, ObserverError> {
    if log.removed {
        return Ok(None);
    }

    let decoded = log
        .log_decode::<BlockRequested>()
        .map_err(|source| ObserverError::Decode {
            item: BlockRequested::SIGNATURE,
            source,
        })?;
    let BlockRequested { request, number } = decoded.inner.data;

    Ok(Some(AttestationRequest::new(
        to_u64("request", request)?,
        to_u64("block number", number)?,
    )))
}

fn to_u64(field: &'static str, value: U256) -> Result<u64, ObserverError> {
    u64::try_from(value).map_err(|_| ObserverError::Overflow { field, value })
}
