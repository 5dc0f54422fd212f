use crate::{
    BatchMessage, IndividualMessage, ProcessingPhase, ProcessingState, StoredWebhookMessage,
    TerminalRule, WebhookMessage,
};

/// Pure reducer: folds an ordered message buffer into a `ProcessingState`.
///
/// Buffer order is the only ordering signal; the last message decides the
/// phase and the progress, any message may decide completion.
pub fn reduce(messages: &[StoredWebhookMessage], rule: TerminalRule) -> ProcessingState {
    let last = messages.last().map(|stored| &stored.message);
    let current_phase = last
        .map(WebhookMessage::phase)
        .unwrap_or(ProcessingPhase::Download);
    let is_complete = messages
        .iter()
        .any(|stored| is_terminal(&stored.message, rule));
    let progress = match last {
        Some(message) => progress_of(message, is_complete),
        None => 0.0,
    };

    ProcessingState {
        is_complete,
        progress,
        messages: messages.to_vec(),
        current_phase,
    }
}

/// Whether a single message ends the pipeline under `rule`.
pub fn is_terminal(message: &WebhookMessage, rule: TerminalRule) -> bool {
    match message {
        WebhookMessage::Terminate(terminate) => rule.accepts_terminate() && terminate.terminate,
        WebhookMessage::Batch(BatchMessage::BatchCompleted { phase, .. }) => {
            rule.accepts_batch_completed() && *phase == ProcessingPhase::JsonToGraph
        }
        WebhookMessage::Batch(BatchMessage::BatchProgress { .. })
        | WebhookMessage::Individual(_) => false,
    }
}

fn progress_of(message: &WebhookMessage, is_complete: bool) -> f64 {
    let fallback = if is_complete { 100.0 } else { 0.0 };
    match message {
        WebhookMessage::Batch(
            BatchMessage::BatchProgress {
                overall_progress, ..
            }
            | BatchMessage::BatchCompleted {
                overall_progress, ..
            },
        ) => clamp_percentage(overall_progress.percentage),
        WebhookMessage::Individual(IndividualMessage::InProgress { progress, .. }) => {
            clamp_percentage(progress.percentage)
        }
        WebhookMessage::Individual(
            IndividualMessage::Started { .. }
            | IndividualMessage::Completed { .. }
            | IndividualMessage::Error { .. },
        )
        | WebhookMessage::Terminate(_) => fallback,
    }
}

/// Upstream percentages are untrusted.
fn clamp_percentage(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 100.0)
    } else {
        0.0
    }
}
