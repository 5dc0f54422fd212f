#[derive(Debug, Clone, PartialEq)]
pub enum PollMsg {
    /// Begin polling the account.
    Start,
    /// Relay returned the account's current buffer.
    MessagesFetched(Vec<crate::StoredWebhookMessage>),
    /// Reading the buffer failed (transport, status or decode).
    FetchFailed(String),
    /// Relay acknowledged the clear.
    BufferCleared,
    ClearFailed(String),
    /// Finalized results arrived.
    ResultsFetched,
    ResultsFailed(String),
    /// Caller tore the subscription down.
    StopRequested,
}
