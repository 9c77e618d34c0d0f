//! Turns one attestation request into at most one delivered vote.

use std::{
    collections::{HashSet, VecDeque},
    sync::Arc,
};

use parking_lot::Mutex;
use strum::IntoStaticStr;
use tracing::{debug, info, instrument};
use zkoracle_primitives::{
    aliases::RequestId,
    core::{AttestationRequest, Vote, VoteAck},
};

use crate::{
    confirmation::ConfirmationPolicy,
    directory::{AggregatorDirectory, DirectoryError},
    dispatcher::{DispatchError, Messenger, VoteDispatcher},
    observer::{ChainObserver, ObserverError},
    signer::{HashSigner, SignError, VoteSigner},
};

/// Number of voted request ids remembered to reject re-emitted events.
pub const DEFAULT_VOTE_HISTORY: usize = 4096;

/// Progress of a single request through the handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum RequestState {
    Received,
    HeaderFetched,
    Confirmed,
    Signed,
    AggregatorResolved,
    Dispatched,
}

#[derive(Debug, thiserror::Error)]
pub enum HandleError {
    #[error("header/head fetch: {0}")]
    Fetch(#[source] ObserverError),

    #[error(
        "not confirmed: block {block_number} needs {depth} confirmations, chain head is {head}"
    )]
    NotConfirmedYet {
        block_number: u64,
        head: u64,
        depth: u64,
    },

    #[error("already voted on request {0}")]
    AlreadyVoted(RequestId),

    #[error("sign: {0}")]
    Sign(#[from] SignError),

    #[error("resolve aggregator: {0}")]
    Directory(#[from] DirectoryError),

    #[error("dispatch: {0}")]
    Dispatch(#[from] DispatchError),
}

impl HandleError {
    /// Short name of the step that failed.
    pub fn stage(&self) -> &'static str {
        match self {
            HandleError::Fetch(_) => "header/head fetch",
            HandleError::NotConfirmedYet { .. } => "not confirmed",
            HandleError::AlreadyVoted(_) => "already voted",
            HandleError::Sign(_) => "sign",
            HandleError::Directory(_) => "resolve aggregator",
            HandleError::Dispatch(_) => "dispatch",
        }
    }

    /// Returns `true` for outcomes that are part of normal operation rather than faults.
    pub fn is_expected(&self) -> bool {
        matches!(
            self,
            HandleError::NotConfirmedYet { .. } | HandleError::AlreadyVoted(_)
        )
    }
}

/// Handles attestation requests: fetch, confirm, sign, resolve the aggregator, dispatch.
///
/// Safe to share between concurrently running requests.
#[derive(Debug)]
pub struct RequestHandler<O, S, M> {
    observer: Arc<O>,
    policy: ConfirmationPolicy,
    signer: VoteSigner<S>,
    directory: AggregatorDirectory<O>,
    dispatcher: VoteDispatcher<M>,
    voted: VotedRequests,
}

impl<O, S, M> RequestHandler<O, S, M>
where
    O: ChainObserver,
    S: HashSigner,
    M: Messenger,
{
    pub fn new(observer: Arc<O>, signer: S, messenger: M, policy: ConfirmationPolicy) -> Self {
        Self {
            directory: AggregatorDirectory::new(observer.clone()),
            observer,
            policy,
            signer: VoteSigner::new(signer),
            dispatcher: VoteDispatcher::new(messenger),
            voted: VotedRequests::new(DEFAULT_VOTE_HISTORY),
        }
    }

    #[instrument(
        name = "request",
        skip_all,
        fields(request = request.request_id, block_number = request.block_number)
    )]
    pub async fn handle(&self, request: AttestationRequest) -> Result<VoteAck, HandleError> {
        info!("Handling block requested event");
        transition(RequestState::Received);

        let (header, head) = tokio::try_join!(
            self.observer.header_by_number(request.block_number),
            self.observer.current_head_number(),
        )
        .map_err(HandleError::Fetch)?;
        transition(RequestState::HeaderFetched);

        debug!(head, block_hash = %header.hash, "Checking block confirmations");
        if !self.policy.is_confirmed(header.number, head) {
            return Err(HandleError::NotConfirmedYet {
                block_number: header.number,
                head,
                depth: self.policy.depth(),
            });
        }
        transition(RequestState::Confirmed);

        let claim = self
            .voted
            .claim(request.request_id)
            .ok_or(HandleError::AlreadyVoted(request.request_id))?;
        let signature = self.signer.sign(&header.hash)?;
        claim.commit();

        let vote = Vote {
            request_id: request.request_id,
            block_hash: header.hash,
            signature,
        };
        transition(RequestState::Signed);

        let endpoint = self.directory.resolve_aggregator().await?;
        transition(RequestState::AggregatorResolved);

        info!(
            index = endpoint.index,
            address = %endpoint.address,
            "Sending vote to aggregator"
        );
        let ack = self.dispatcher.dispatch(&endpoint, &vote).await?;
        transition(RequestState::Dispatched);

        info!(index = endpoint.index, "Vote acknowledged by aggregator");

        Ok(ack)
    }
}

fn transition(state: RequestState) {
    debug!(state = <&'static str>::from(state), "Request state changed");
}

/// Requests this validator has produced a vote for, bounded to the most recent votes.
#[derive(Debug)]
struct VotedRequests {
    capacity: usize,
    history: Mutex<VoteHistory>,
}

#[derive(Debug, Default)]
struct VoteHistory {
    /// Claimed or voted ids.
    ids: HashSet<RequestId>,
    /// Voted ids, oldest first.
    voted: VecDeque<RequestId>,
}

impl VotedRequests {
    fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            history: Mutex::default(),
        }
    }

    /// Reserves `request_id`, or returns [None] if it is already taken.
    fn claim(&self, request_id: RequestId) -> Option<VoteClaim<'_>> {
        self.history
            .lock()
            .ids
            .insert(request_id)
            .then_some(VoteClaim {
                voted: self,
                request_id,
                committed: false,
            })
    }

    /// Records a vote, forgetting the oldest one once `capacity` is exceeded.
    fn record(&self, request_id: RequestId) {
        let mut history = self.history.lock();
        history.voted.push_back(request_id);

        while history.voted.len() > self.capacity {
            if let Some(oldest) = history.voted.pop_front() {
                history.ids.remove(&oldest);
            }
        }
    }

    fn release(&self, request_id: RequestId) {
        self.history.lock().ids.remove(&request_id);
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.history.lock().ids.len()
    }
}

/// Reservation of a request id, released on drop unless committed.
struct VoteClaim<'a> {
    voted: &'a VotedRequests,
    request_id: RequestId,
    committed: bool,
}

impl VoteClaim<'_> {
    fn commit(mut self) {
        self.voted.record(self.request_id);
        self.committed = true;
    }
}

impl Drop for VoteClaim<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.voted.release(self.request_id);
        }
    }
}
