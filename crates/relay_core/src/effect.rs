use std::time::Duration;

use crate::ProcessingState;

/// Side effects requested by the poll state machine; executed by the driver.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Read the account's buffer once `after` has elapsed.
    FetchMessages { after: Duration },
    /// Hand the freshly derived state to whoever renders it.
    Publish(ProcessingState),
    /// Empty the account's buffer once `after` has elapsed.
    ClearBuffer { after: Duration },
    /// Fetch the finalized result set. Requested at most once per run.
    FetchResults,
}
