use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use relay_core::{
    update, Contract, Effect, PollMsg, PollSettings, PollState, PollStatus, ProcessingState,
    StoredWebhookMessage,
};
use relay_logging::{relay_debug, relay_info, relay_warn};
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::client::{BackendClient, RelayClient};
use crate::store::MessageStore;
use crate::{ClientError, FailureKind};

/// Where the poller reads and clears an account's buffer.
#[async_trait]
pub trait RelayApi: Send + Sync {
    async fn list(&self, account_id: &str) -> Result<Vec<StoredWebhookMessage>, ClientError>;
    async fn clear(&self, account_id: &str) -> Result<(), ClientError>;
}

/// Where the poller fetches the finalized result set.
#[async_trait]
pub trait ResultsApi: Send + Sync {
    async fn fetch_results(&self) -> Result<Vec<Contract>, ClientError>;
}

#[async_trait]
impl RelayApi for RelayClient {
    async fn list(&self, account_id: &str) -> Result<Vec<StoredWebhookMessage>, ClientError> {
        RelayClient::list(self, account_id).await
    }

    async fn clear(&self, account_id: &str) -> Result<(), ClientError> {
        RelayClient::clear(self, account_id).await
    }
}

#[async_trait]
impl ResultsApi for BackendClient {
    async fn fetch_results(&self) -> Result<Vec<Contract>, ClientError> {
        BackendClient::fetch_results(self).await
    }
}

/// Reads a store in the same process, skipping HTTP.
pub struct LocalRelay {
    store: Arc<dyn MessageStore>,
}

impl LocalRelay {
    pub fn new(store: Arc<dyn MessageStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl RelayApi for LocalRelay {
    async fn list(&self, account_id: &str) -> Result<Vec<StoredWebhookMessage>, ClientError> {
        self.store
            .list(account_id)
            .await
            .map_err(|err| ClientError::new(FailureKind::Storage, err.to_string()))
    }

    async fn clear(&self, account_id: &str) -> Result<(), ClientError> {
        self.store
            .clear(account_id)
            .await
            .map_err(|err| ClientError::new(FailureKind::Storage, err.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PollEvent {
    /// Freshly derived state; replaces any earlier one.
    State(ProcessingState),
    Results(Vec<Contract>),
    ResultsFailed(ClientError),
    /// The task is about to exit.
    Finished(PollStatus),
}

pub trait PollSink: Send + Sync {
    fn emit(&self, event: PollEvent);
}

pub struct ChannelPollSink {
    tx: tokio::sync::mpsc::UnboundedSender<PollEvent>,
}

impl ChannelPollSink {
    pub fn new(tx: tokio::sync::mpsc::UnboundedSender<PollEvent>) -> Self {
        Self { tx }
    }
}

impl PollSink for ChannelPollSink {
    fn emit(&self, event: PollEvent) {
        let _ = self.tx.send(event);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PollOutcome {
    pub status: PollStatus,
    pub state: ProcessingState,
    pub results: Option<Vec<Contract>>,
    pub last_error: Option<String>,
}

/// Running poll subscription. Dropping the handle does not stop the task;
/// call [`PollerHandle::stop`].
pub struct PollerHandle {
    cancel: CancellationToken,
    task: JoinHandle<PollOutcome>,
}

impl PollerHandle {
    /// Requests cancellation. Safe to call any number of times.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    pub async fn wait(self) -> Result<PollOutcome, JoinError> {
        self.task.await
    }
}

struct PollContext {
    account_id: String,
    relay: Arc<dyn RelayApi>,
    results: Arc<dyn ResultsApi>,
    sink: Arc<dyn PollSink>,
}

/// Polls `account_id` until completion or `stop`, on the current tokio runtime.
pub fn spawn_poller(
    account_id: impl Into<String>,
    relay: Arc<dyn RelayApi>,
    results: Arc<dyn ResultsApi>,
    settings: PollSettings,
    sink: Arc<dyn PollSink>,
) -> PollerHandle {
    let cancel = CancellationToken::new();
    let ctx = PollContext {
        account_id: account_id.into(),
        relay,
        results,
        sink,
    };
    let task = tokio::spawn(run(ctx, settings, cancel.clone()));
    PollerHandle { cancel, task }
}

async fn run(ctx: PollContext, settings: PollSettings, cancel: CancellationToken) -> PollOutcome {
    relay_info!(
        "polling account {} every {:?}",
        ctx.account_id,
        settings.interval
    );
    let (mut state, effects) = update(PollState::new(settings), PollMsg::Start);
    let mut queue: VecDeque<Effect> = effects.into();
    let mut results = None;

    while let Some(effect) = queue.pop_front() {
        let msg = match effect {
            Effect::Publish(processing) => {
                relay_debug!(
                    "account {} phase={:?} progress={} complete={}",
                    ctx.account_id,
                    processing.current_phase,
                    processing.progress,
                    processing.is_complete
                );
                ctx.sink.emit(PollEvent::State(processing));
                continue;
            }
            Effect::FetchMessages { after } => {
                match cancellable(&cancel, after, ctx.relay.list(&ctx.account_id)).await {
                    None => PollMsg::StopRequested,
                    Some(Ok(messages)) => PollMsg::MessagesFetched(messages),
                    Some(Err(err)) => {
                        relay_warn!("poll of account {} failed: {}", ctx.account_id, err);
                        PollMsg::FetchFailed(err.to_string())
                    }
                }
            }
            Effect::ClearBuffer { after } => {
                match cancellable(&cancel, after, ctx.relay.clear(&ctx.account_id)).await {
                    None => PollMsg::StopRequested,
                    Some(Ok(())) => PollMsg::BufferCleared,
                    Some(Err(err)) => {
                        relay_warn!("clearing account {} failed: {}", ctx.account_id, err);
                        PollMsg::ClearFailed(err.to_string())
                    }
                }
            }
            Effect::FetchResults => {
                match cancellable(&cancel, Duration::ZERO, ctx.results.fetch_results()).await {
                    None => PollMsg::StopRequested,
                    Some(Ok(contracts)) => {
                        relay_info!(
                            "fetched {} finalized contracts for account {}",
                            contracts.len(),
                            ctx.account_id
                        );
                        ctx.sink.emit(PollEvent::Results(contracts.clone()));
                        results = Some(contracts);
                        PollMsg::ResultsFetched
                    }
                    Some(Err(err)) => {
                        relay_warn!(
                            "fetching results for account {} failed: {}",
                            ctx.account_id,
                            err
                        );
                        let reason = err.to_string();
                        ctx.sink.emit(PollEvent::ResultsFailed(err));
                        PollMsg::ResultsFailed(reason)
                    }
                }
            }
        };
        let (next, effects) = update(state, msg);
        state = next;
        queue.extend(effects);
    }

    let status = state.status();
    relay_info!("polling account {} ended: {:?}", ctx.account_id, status);
    ctx.sink.emit(PollEvent::Finished(status));
    PollOutcome {
        status,
        state: state.processing().clone(),
        results,
        last_error: state.last_error().map(str::to_string),
    }
}

/// Waits `after`, then runs `work`; `None` if cancelled first.
async fn cancellable<T>(
    cancel: &CancellationToken,
    after: Duration,
    work: impl Future<Output = T>,
) -> Option<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        value = async {
            if !after.is_zero() {
                tokio::time::sleep(after).await;
            }
            work.await
        } => Some(value),
    }
}
