use std::collections::BTreeMap;

use serde::de::{self, Deserializer};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One stage of the document pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingPhase {
    #[default]
    Download,
    PdfToJson,
    JsonToGraph,
    Terminate,
}

impl ProcessingPhase {
    /// Pipeline phases in execution order, excluding the terminal marker.
    pub const PIPELINE: [ProcessingPhase; 3] = [
        ProcessingPhase::Download,
        ProcessingPhase::PdfToJson,
        ProcessingPhase::JsonToGraph,
    ];

    pub fn order(self) -> u8 {
        match self {
            ProcessingPhase::Download => 1,
            ProcessingPhase::PdfToJson => 2,
            ProcessingPhase::JsonToGraph => 3,
            ProcessingPhase::Terminate => 4,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ProcessingPhase::Download => "Downloading Documents",
            ProcessingPhase::PdfToJson => "Converting PDFs",
            ProcessingPhase::JsonToGraph => "Creating Knowledge Graph",
            ProcessingPhase::Terminate => "Processing",
        }
    }
}

/// Progress of a single envelope's documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentProgress {
    pub current_document: String,
    pub completed: u32,
    pub total: u32,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverallProgress {
    pub completed_envelopes: u32,
    pub total_envelopes: u32,
    pub completed_documents: u32,
    pub total_documents: u32,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentEnvelope {
    pub id: String,
    pub current_document: String,
    pub completed: u32,
    pub total: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvelopeState {
    Pending,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvelopeStatus {
    pub total_documents: u32,
    pub completed_documents: u32,
    pub status: EnvelopeState,
}

/// Updates about a single envelope, discriminated by `status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IndividualMessage {
    Started {
        envelope_id: String,
        total_documents: u32,
        phase: ProcessingPhase,
    },
    InProgress {
        envelope_id: String,
        progress: DocumentProgress,
        phase: ProcessingPhase,
    },
    Completed {
        envelope_id: String,
        files: Vec<String>,
        phase: ProcessingPhase,
    },
    Error {
        envelope_id: String,
        error: String,
        phase: ProcessingPhase,
    },
}

/// Aggregate updates across every envelope of a run, discriminated by `status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BatchMessage {
    BatchProgress {
        overall_progress: OverallProgress,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        current_envelope: Option<CurrentEnvelope>,
        envelope_statuses: BTreeMap<String, EnvelopeStatus>,
        phase: ProcessingPhase,
    },
    BatchCompleted {
        overall_progress: OverallProgress,
        envelope_statuses: BTreeMap<String, EnvelopeStatus>,
        phase: ProcessingPhase,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminateStatus {
    Terminated,
}

/// End-of-run marker. The pipeline may send only `{"type":"terminate","terminate":true}`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TerminateMessage {
    #[serde(default)]
    pub terminate: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TerminateStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<ProcessingPhase>,
}

/// A status update pushed by the processing pipeline, discriminated by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WebhookMessage {
    Individual(IndividualMessage),
    Batch(BatchMessage),
    Terminate(TerminateMessage),
}

impl WebhookMessage {
    pub fn phase(&self) -> ProcessingPhase {
        match self {
            WebhookMessage::Individual(
                IndividualMessage::Started { phase, .. }
                | IndividualMessage::InProgress { phase, .. }
                | IndividualMessage::Completed { phase, .. }
                | IndividualMessage::Error { phase, .. },
            ) => *phase,
            WebhookMessage::Batch(
                BatchMessage::BatchProgress { phase, .. } | BatchMessage::BatchCompleted { phase, .. },
            ) => *phase,
            WebhookMessage::Terminate(message) => {
                message.phase.unwrap_or(ProcessingPhase::Terminate)
            }
        }
    }

    pub fn envelope_id(&self) -> Option<&str> {
        match self {
            WebhookMessage::Individual(
                IndividualMessage::Started { envelope_id, .. }
                | IndividualMessage::InProgress { envelope_id, .. }
                | IndividualMessage::Completed { envelope_id, .. }
                | IndividualMessage::Error { envelope_id, .. },
            ) => Some(envelope_id),
            WebhookMessage::Batch(_) | WebhookMessage::Terminate(_) => None,
        }
    }

    /// Wire name of the `type` discriminant.
    pub fn kind(&self) -> &'static str {
        match self {
            WebhookMessage::Individual(_) => "individual",
            WebhookMessage::Batch(_) => "batch",
            WebhookMessage::Terminate(_) => "terminate",
        }
    }
}

/// A validated webhook body that remembers the exact fields it was posted with.
///
/// The typed message drives status derivation; the posted object is what gets
/// stored and served back, so keys the model does not know about survive.
#[derive(Debug, Clone, PartialEq)]
pub struct ReceivedMessage {
    message: WebhookMessage,
    body: Map<String, Value>,
}

impl ReceivedMessage {
    /// Parses a request body. It must be a JSON object that decodes as a [`WebhookMessage`].
    pub fn parse(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        let body: Map<String, Value> = serde_json::from_slice(bytes)?;
        Self::from_body(body)
    }

    pub fn from_body(body: Map<String, Value>) -> Result<Self, serde_json::Error> {
        let message = WebhookMessage::deserialize(&Value::Object(body.clone()))?;
        Ok(Self { message, body })
    }

    pub fn message(&self) -> &WebhookMessage {
        &self.message
    }

    pub fn body(&self) -> &Map<String, Value> {
        &self.body
    }

    /// Attaches the ingestion timestamp, replacing any `timestamp` the sender supplied.
    pub fn stamp(self, timestamp: impl Into<String>) -> StoredWebhookMessage {
        let mut body = self.body;
        body.remove(TIMESTAMP_KEY);
        StoredWebhookMessage {
            message: self.message,
            timestamp: timestamp.into(),
            body,
        }
    }
}

impl From<WebhookMessage> for ReceivedMessage {
    fn from(message: WebhookMessage) -> Self {
        let body = match serde_json::to_value(&message) {
            Ok(Value::Object(body)) => body,
            _ => Map::new(),
        };
        Self { message, body }
    }
}

const TIMESTAMP_KEY: &str = "timestamp";

/// A webhook message as held by the relay, stamped at ingestion.
///
/// Serializes as the posted object with `timestamp` added.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredWebhookMessage {
    pub message: WebhookMessage,
    /// ISO-8601 UTC instant assigned when the relay accepted the message.
    pub timestamp: String,
    body: Map<String, Value>,
}

impl StoredWebhookMessage {
    pub fn new(message: WebhookMessage, timestamp: impl Into<String>) -> Self {
        ReceivedMessage::from(message).stamp(timestamp)
    }

    /// Fields as posted, without `timestamp`.
    pub fn body(&self) -> &Map<String, Value> {
        &self.body
    }
}

impl Serialize for StoredWebhookMessage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.body.len() + 1))?;
        for (key, value) in &self.body {
            map.serialize_entry(key, value)?;
        }
        map.serialize_entry(TIMESTAMP_KEY, &self.timestamp)?;
        map.end()
    }
}

impl<'de> Deserialize<'de> for StoredWebhookMessage {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut body = Map::<String, Value>::deserialize(deserializer)?;
        let timestamp = match body.remove(TIMESTAMP_KEY) {
            Some(Value::String(timestamp)) => timestamp,
            Some(_) => return Err(de::Error::custom("timestamp must be a string")),
            None => return Err(de::Error::missing_field(TIMESTAMP_KEY)),
        };
        let received = ReceivedMessage::from_body(body).map_err(de::Error::custom)?;
        Ok(received.stamp(timestamp))
    }
}
