use std::fmt;

use serde::{Deserialize, Serialize};

/// An envelope as listed by the contracts backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub envelope_id: String,
    pub status: String,
    pub subject: String,
    pub sent_date: String,
    pub last_modified: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentInfo {
    pub document_id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pages: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_extension: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvelopeDocuments {
    pub envelope_id: String,
    pub documents: Vec<DocumentInfo>,
    pub created_date: String,
    pub status: String,
}

/// The signed-in user as reported alongside an envelope listing.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UserProfile {
    pub name: String,
    pub email: String,
}

/// Envelopes plus, when the backend sends one, the user's profile.
///
/// Accepts both a bare JSON array and `{"user": {..}, "envelopes": [..]}`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "ListingBody")]
pub struct EnvelopeListing {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserProfile>,
    pub envelopes: Vec<Envelope>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ListingBody {
    Bare(Vec<Envelope>),
    WithProfile {
        #[serde(default)]
        user: Option<UserProfile>,
        #[serde(default)]
        envelopes: Vec<Envelope>,
    },
}

impl From<ListingBody> for EnvelopeListing {
    fn from(body: ListingBody) -> Self {
        match body {
            ListingBody::Bare(envelopes) => Self {
                user: None,
                envelopes,
            },
            ListingBody::WithProfile { user, envelopes } => Self { user, envelopes },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct ChatRequest<'a> {
    pub message: &'a str,
}

/// The assistant's answer to one chat message.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChatReply {
    pub response: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedDocument {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct ClientError {
    pub kind: FailureKind,
    pub message: String,
}

impl ClientError {
    pub(crate) fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// The session is no longer valid and the user must sign in again.
    pub fn is_unauthorized(&self) -> bool {
        self.kind == FailureKind::Unauthorized
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    InvalidUrl,
    Unauthorized,
    HttpStatus(u16),
    Timeout,
    TooLarge { max_bytes: u64, actual: Option<u64> },
    Decode,
    Storage,
    Network,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvalidUrl => write!(f, "invalid url"),
            FailureKind::Unauthorized => write!(f, "unauthorized"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::TooLarge { max_bytes, actual } => {
                write!(f, "response too large (max {max_bytes}, actual {actual:?})")
            }
            FailureKind::Decode => write!(f, "malformed response body"),
            FailureKind::Storage => write!(f, "storage error"),
            FailureKind::Network => write!(f, "network error"),
        }
    }
}
