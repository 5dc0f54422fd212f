use serde::{Deserialize, Serialize};

use crate::{ProcessingPhase, StoredWebhookMessage};

/// Which messages mark an account's pipeline as finished.
///
/// Pipelines in the field emit either an explicit terminate message or a
/// `batch_completed` update at the graph phase, so both are recognised by
/// default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalRule {
    /// Only `{"type":"terminate","terminate":true}` is terminal.
    ExplicitTerminate,
    /// Only a `batch_completed` message in the `json_to_graph` phase is terminal.
    BatchCompletedAtGraph,
    #[default]
    Either,
}

impl TerminalRule {
    pub fn accepts_terminate(self) -> bool {
        matches!(self, TerminalRule::ExplicitTerminate | TerminalRule::Either)
    }

    pub fn accepts_batch_completed(self) -> bool {
        matches!(
            self,
            TerminalRule::BatchCompletedAtGraph | TerminalRule::Either
        )
    }
}

impl std::str::FromStr for TerminalRule {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "explicit_terminate" | "terminate" => Ok(TerminalRule::ExplicitTerminate),
            "batch_completed_at_graph" | "batch_completed" => {
                Ok(TerminalRule::BatchCompletedAtGraph)
            }
            "either" | "both" => Ok(TerminalRule::Either),
            other => Err(format!("unknown terminal rule: {other}")),
        }
    }
}

/// Point-in-time view of an account's processing, derived from its buffer.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingState {
    pub is_complete: bool,
    /// Percentage in `[0, 100]`.
    pub progress: f64,
    pub messages: Vec<StoredWebhookMessage>,
    pub current_phase: ProcessingPhase,
}
