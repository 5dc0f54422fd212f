use std::collections::BTreeMap;

use pretty_assertions::assert_eq;
use relay_core::{
    describe, reduce, BatchMessage, CurrentEnvelope, DocumentProgress, IndividualMessage,
    OverallProgress, PhaseStep, ProcessingPhase, ProcessingView, StoredWebhookMessage,
    TerminalRule, TerminateMessage, WebhookMessage, COMPLETE_HEADLINE,
};

fn stored(message: WebhookMessage) -> StoredWebhookMessage {
    StoredWebhookMessage::new(message, "2025-01-01T08:30:00.000Z")
}

#[test]
fn describes_each_message_shape() {
    let started = WebhookMessage::Individual(IndividualMessage::Started {
        envelope_id: "E1".to_string(),
        total_documents: 3,
        phase: ProcessingPhase::Download,
    });
    let progress = WebhookMessage::Individual(IndividualMessage::InProgress {
        envelope_id: "E1".to_string(),
        progress: DocumentProgress {
            current_document: "lease.pdf".to_string(),
            completed: 1,
            total: 3,
            percentage: 33.33,
        },
        phase: ProcessingPhase::PdfToJson,
    });
    let failed = WebhookMessage::Individual(IndividualMessage::Error {
        envelope_id: "E9".to_string(),
        error: "timeout".to_string(),
        phase: ProcessingPhase::Download,
    });
    let batch = WebhookMessage::Batch(BatchMessage::BatchProgress {
        overall_progress: OverallProgress {
            completed_envelopes: 0,
            total_envelopes: 2,
            completed_documents: 2,
            total_documents: 4,
            percentage: 50.0,
        },
        current_envelope: Some(CurrentEnvelope {
            id: "E1".to_string(),
            current_document: "b.pdf".to_string(),
            completed: 2,
            total: 2,
        }),
        envelope_statuses: BTreeMap::new(),
        phase: ProcessingPhase::JsonToGraph,
    });
    let batch_done = WebhookMessage::Batch(BatchMessage::BatchCompleted {
        overall_progress: OverallProgress {
            completed_envelopes: 2,
            total_envelopes: 2,
            completed_documents: 4,
            total_documents: 4,
            percentage: 100.0,
        },
        envelope_statuses: BTreeMap::new(),
        phase: ProcessingPhase::JsonToGraph,
    });

    assert_eq!(
        describe(&started),
        "[Downloading Documents] Started processing envelope E1 (3 documents)"
    );
    assert_eq!(
        describe(&progress),
        "[Converting PDFs] Processing lease.pdf (1/3)"
    );
    assert_eq!(
        describe(&failed),
        "[Downloading Documents] Error processing envelope E9: timeout"
    );
    assert_eq!(
        describe(&batch),
        "[Creating Knowledge Graph] Overall progress: 2/4 documents (50%) - Processing b.pdf"
    );
    assert_eq!(
        describe(&batch_done),
        "[Creating Knowledge Graph] Completed: 2/2 envelopes processed"
    );
}

#[test]
fn phases_before_current_are_done() {
    let messages = vec![stored(WebhookMessage::Individual(
        IndividualMessage::Started {
            envelope_id: "E1".to_string(),
            total_documents: 1,
            phase: ProcessingPhase::PdfToJson,
        },
    ))];
    let view = ProcessingView::from_state(&reduce(&messages, TerminalRule::Either));

    let steps: Vec<PhaseStep> = view.phases.iter().map(|phase| phase.step).collect();
    assert_eq!(
        steps,
        vec![PhaseStep::Done, PhaseStep::Active, PhaseStep::Pending]
    );
    assert_eq!(view.headline, "Converting PDFs...");
    assert_eq!(view.lines.len(), 1);
    assert_eq!(view.lines[0].kind, "individual");
    assert_eq!(view.lines[0].timestamp, "2025-01-01T08:30:00.000Z");
}

#[test]
fn completed_run_marks_all_pipeline_phases_done() {
    let messages = vec![stored(WebhookMessage::Terminate(TerminateMessage {
        terminate: true,
        ..TerminateMessage::default()
    }))];
    let view = ProcessingView::from_state(&reduce(&messages, TerminalRule::Either));

    assert!(view.is_complete);
    assert_eq!(view.progress, 100.0);
    assert_eq!(view.headline, COMPLETE_HEADLINE);
    assert!(view.phases.iter().all(|phase| phase.step == PhaseStep::Done));
}
