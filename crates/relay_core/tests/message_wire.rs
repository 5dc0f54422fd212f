use pretty_assertions::assert_eq;
use relay_core::{
    BatchMessage, EnvelopeState, IndividualMessage, ProcessingPhase, ProcessingState,
    ReceivedMessage, StoredWebhookMessage, TerminateMessage, TerminateStatus, WebhookMessage,
};
use serde_json::{json, Value};

#[test]
fn individual_started_decodes_from_pipeline_json() {
    let raw = json!({
        "type": "individual",
        "status": "started",
        "envelope_id": "E1",
        "total_documents": 3,
        "phase": "download"
    });

    let message: WebhookMessage = serde_json::from_value(raw).unwrap();

    assert_eq!(
        message,
        WebhookMessage::Individual(IndividualMessage::Started {
            envelope_id: "E1".to_string(),
            total_documents: 3,
            phase: ProcessingPhase::Download,
        })
    );
    assert_eq!(message.envelope_id(), Some("E1"));
    assert_eq!(message.kind(), "individual");
}

#[test]
fn batch_progress_accepts_fractional_percentage_and_statuses() {
    let raw = json!({
        "type": "batch",
        "status": "batch_progress",
        "overall_progress": {
            "completed_envelopes": 0,
            "total_envelopes": 2,
            "completed_documents": 1,
            "total_documents": 3,
            "percentage": 33.33
        },
        "current_envelope": {"id": "E1", "current_document": "a.pdf", "completed": 1, "total": 2},
        "envelope_statuses": {
            "E1": {"total_documents": 2, "completed_documents": 1, "status": "pending"},
            "E2": {"total_documents": 1, "completed_documents": 0, "status": "failed"}
        },
        "phase": "pdf_to_json"
    });

    let message: WebhookMessage = serde_json::from_value(raw).unwrap();
    let WebhookMessage::Batch(BatchMessage::BatchProgress {
        overall_progress,
        current_envelope,
        envelope_statuses,
        phase,
    }) = message
    else {
        panic!("expected batch progress");
    };

    assert_eq!(overall_progress.percentage, 33.33);
    assert_eq!(current_envelope.unwrap().current_document, "a.pdf");
    assert_eq!(envelope_statuses["E2"].status, EnvelopeState::Failed);
    assert_eq!(phase, ProcessingPhase::PdfToJson);
}

#[test]
fn bare_terminate_defaults_phase_to_terminate() {
    let message: WebhookMessage =
        serde_json::from_value(json!({"type": "terminate", "terminate": true})).unwrap();

    assert_eq!(
        message,
        WebhookMessage::Terminate(TerminateMessage {
            terminate: true,
            status: None,
            phase: None,
        })
    );
    assert_eq!(message.phase(), ProcessingPhase::Terminate);

    let missing_flag: WebhookMessage =
        serde_json::from_value(json!({"type": "terminate", "status": "terminated"})).unwrap();
    assert_eq!(
        missing_flag,
        WebhookMessage::Terminate(TerminateMessage {
            terminate: false,
            status: Some(TerminateStatus::Terminated),
            phase: None,
        })
    );
}

#[test]
fn unknown_status_is_rejected() {
    let result = serde_json::from_value::<WebhookMessage>(json!({
        "type": "individual",
        "status": "paused",
        "envelope_id": "E1",
        "phase": "download"
    }));
    assert!(result.is_err());

    let result = serde_json::from_value::<WebhookMessage>(json!({
        "type": "individual",
        "status": "started",
        "phase": "download"
    }));
    assert!(result.is_err(), "missing envelope_id must not decode");
}

#[test]
fn stored_message_serializes_flat_with_timestamp() {
    let stored = StoredWebhookMessage::new(
        WebhookMessage::Individual(IndividualMessage::Completed {
            envelope_id: "E1".to_string(),
            files: vec!["a.json".to_string()],
            phase: ProcessingPhase::PdfToJson,
        }),
        "2025-03-01T12:00:00.000Z",
    );

    let value = serde_json::to_value(&stored).unwrap();

    assert_eq!(
        value,
        json!({
            "type": "individual",
            "status": "completed",
            "envelope_id": "E1",
            "files": ["a.json"],
            "phase": "pdf_to_json",
            "timestamp": "2025-03-01T12:00:00.000Z"
        })
    );
    let decoded: StoredWebhookMessage = serde_json::from_value(value).unwrap();
    assert_eq!(decoded, stored);
}

#[test]
fn received_body_is_kept_verbatim_with_timestamp_added() {
    let posted = json!({
        "type": "batch",
        "status": "batch_progress",
        "phase": "download",
        "overall_progress": {
            "completed_envelopes": 0,
            "total_envelopes": 1,
            "completed_documents": 0,
            "total_documents": 2,
            "percentage": 0.0
        },
        "current_envelope": null,
        "envelope_statuses": {},
        "pipeline_run": "r-17",
        "timestamp": "sender clock"
    });

    let received = ReceivedMessage::parse(posted.to_string().as_bytes()).unwrap();
    assert_eq!(received.message().kind(), "batch");
    let stored = received.stamp("2025-03-01T12:00:00.000Z");

    let mut expected = posted.clone();
    expected["timestamp"] = json!("2025-03-01T12:00:00.000Z");
    let value = serde_json::to_value(&stored).unwrap();
    assert_eq!(value, expected);
    assert_eq!(value["current_envelope"], Value::Null);

    let decoded: StoredWebhookMessage = serde_json::from_value(value).unwrap();
    assert_eq!(decoded, stored);
}

#[test]
fn received_body_must_be_a_known_object() {
    assert!(ReceivedMessage::parse(b"[1, 2]").is_err());
    assert!(ReceivedMessage::parse(br#"{"type":"mystery"}"#).is_err());
    assert!(ReceivedMessage::parse(b"{not json").is_err());
}

#[test]
fn processing_state_uses_camel_case_keys() {
    let value = serde_json::to_value(ProcessingState::default()).unwrap();
    let keys: Vec<&str> = value
        .as_object()
        .unwrap()
        .keys()
        .map(String::as_str)
        .collect();

    assert!(keys.contains(&"isComplete"));
    assert!(keys.contains(&"currentPhase"));
    assert_eq!(value["currentPhase"], Value::from("download"));
}
