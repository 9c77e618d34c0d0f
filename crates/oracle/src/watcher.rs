//! The validator's main loop.

use std::sync::Arc;

use tokio::{sync::Semaphore, task::JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use zkoracle_primitives::core::AttestationRequest;

use crate::{
    dispatcher::Messenger,
    handler::{HandleError, RequestHandler},
    observer::{ChainObserver, ObserverError},
    signer::HashSigner,
};

/// Default bound on concurrently handled requests.
pub const DEFAULT_MAX_IN_FLIGHT: usize = 64;

#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    #[error("watcher cancelled")]
    Cancelled,

    #[error("request subscription failed: {0}")]
    Subscription(#[from] ObserverError),
}

/// Feeds every `BlockRequested` event into a [`RequestHandler`] task.
#[derive(Debug)]
pub struct RequestWatcher<O, S, M> {
    observer: Arc<O>,
    handler: Arc<RequestHandler<O, S, M>>,
    in_flight: Arc<Semaphore>,
}

impl<O, S, M> RequestWatcher<O, S, M>
where
    O: ChainObserver,
    S: HashSigner,
    M: Messenger,
{
    /// At most `max_in_flight` requests are handled at once; further requests wait inside
    /// their own task.
    pub fn new(
        observer: Arc<O>,
        handler: Arc<RequestHandler<O, S, M>>,
        max_in_flight: usize,
    ) -> Self {
        Self {
            observer,
            handler,
            in_flight: Arc::new(Semaphore::new(max_in_flight.max(1))),
        }
    }

    /// Watches until `cancel` fires or the subscription fails.
    ///
    /// Never returns on its own: the result is either [`WatchError::Cancelled`] or the
    /// subscription error. Requests still in flight are aborted on return.
    pub async fn watch(&self, cancel: CancellationToken) -> WatchError {
        let mut subscription = tokio::select! {
            _ = cancel.cancelled() => return WatchError::Cancelled,
            subscribed = self.observer.subscribe_requests() => match subscribed {
                Ok(subscription) => subscription,
                Err(err) => return err.into(),
            },
        };

        info!("Watching for block requests");

        let mut tasks = JoinSet::new();

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    info!(in_flight = tasks.len(), "Stopping request watcher");
                    return WatchError::Cancelled;
                }

                Some(joined) = tasks.join_next() => {
                    if let Err(err) = joined {
                        if err.is_panic() {
                            error!(%err, "Request handler panicked");
                        }
                    }
                }

                next = subscription.next() => match next {
                    Ok(request) => {
                        let handler = self.handler.clone();
                        let in_flight = self.in_flight.clone();

                        tasks.spawn(async move {
                            let Ok(_permit) = in_flight.acquire().await else {
                                return;
                            };
                            if let Err(err) = handler.handle(request).await {
                                log_failure(&request, &err);
                            }
                        });
                    }
                    Err(err) => {
                        error!(%err, "Lost block request subscription");
                        return err.into();
                    }
                },
            }
        }
    }
}

fn log_failure(request: &AttestationRequest, err: &HandleError) {
    if err.is_expected() {
        debug!(
            request = request.request_id,
            block_number = request.block_number,
            %err,
            "Request dropped, will not be retried"
        );
    } else {
        warn!(
            request = request.request_id,
            block_number = request.block_number,
            stage = err.stage(),
            %err,
            "Request failed"
        );
    }
}
