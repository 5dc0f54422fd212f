use crate::{
    BatchMessage, IndividualMessage, ProcessingPhase, ProcessingState, StoredWebhookMessage,
    WebhookMessage,
};

pub const COMPLETE_HEADLINE: &str = "All documents have been processed successfully!";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseStep {
    Done,
    Active,
    Pending,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseView {
    pub phase: ProcessingPhase,
    pub label: &'static str,
    pub step: PhaseStep,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageLine {
    pub timestamp: String,
    pub kind: &'static str,
    pub text: String,
}

/// Everything a progress display needs, precomputed from a `ProcessingState`.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessingView {
    pub progress: f64,
    pub is_complete: bool,
    pub headline: String,
    pub phases: Vec<PhaseView>,
    pub lines: Vec<MessageLine>,
}

impl ProcessingView {
    pub fn from_state(state: &ProcessingState) -> Self {
        let current = state.current_phase;
        let phases = ProcessingPhase::PIPELINE
            .iter()
            .map(|&phase| PhaseView {
                phase,
                label: phase.label(),
                step: if phase == current {
                    PhaseStep::Active
                } else if phase.order() < current.order() {
                    PhaseStep::Done
                } else {
                    PhaseStep::Pending
                },
            })
            .collect();

        let headline = if state.is_complete {
            COMPLETE_HEADLINE.to_string()
        } else {
            format!("{}...", current.label())
        };

        Self {
            progress: state.progress,
            is_complete: state.is_complete,
            headline,
            phases,
            lines: state.messages.iter().map(message_line).collect(),
        }
    }
}

fn message_line(stored: &StoredWebhookMessage) -> MessageLine {
    MessageLine {
        timestamp: stored.timestamp.clone(),
        kind: stored.message.kind(),
        text: describe(&stored.message),
    }
}

/// One-line, human readable description prefixed with the phase label.
pub fn describe(message: &WebhookMessage) -> String {
    let prefix = format!("[{}] ", message.phase().label());
    let body = match message {
        WebhookMessage::Individual(IndividualMessage::Started {
            envelope_id,
            total_documents,
            ..
        }) => format!(
            "Started processing envelope {envelope_id} ({total_documents} documents)"
        ),
        WebhookMessage::Individual(IndividualMessage::InProgress { progress, .. }) => format!(
            "Processing {} ({}/{})",
            progress.current_document, progress.completed, progress.total
        ),
        WebhookMessage::Individual(IndividualMessage::Completed { files, .. }) => {
            format!("Completed processing: {}", files.join(", "))
        }
        WebhookMessage::Individual(IndividualMessage::Error {
            envelope_id, error, ..
        }) => format!("Error processing envelope {envelope_id}: {error}"),
        WebhookMessage::Batch(BatchMessage::BatchProgress {
            overall_progress,
            current_envelope,
            ..
        }) => {
            let current = current_envelope
                .as_ref()
                .map(|envelope| format!(" - Processing {}", envelope.current_document))
                .unwrap_or_default();
            format!(
                "Overall progress: {}/{} documents ({}%){}",
                overall_progress.completed_documents,
                overall_progress.total_documents,
                overall_progress.percentage,
                current
            )
        }
        WebhookMessage::Batch(BatchMessage::BatchCompleted {
            overall_progress, ..
        }) => format!(
            "Completed: {}/{} envelopes processed",
            overall_progress.completed_envelopes, overall_progress.total_envelopes
        ),
        WebhookMessage::Terminate(terminate) => {
            if terminate.terminate {
                "Processing finished".to_string()
            } else {
                "Termination notice (not final)".to_string()
            }
        }
    };
    prefix + &body
}
