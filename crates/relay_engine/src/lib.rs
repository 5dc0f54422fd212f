//! Relay engine: webhook buffer, HTTP surface, backend clients and the poller.
mod client;
mod filename;
mod persist;
mod poller;
mod server;
mod session;
mod store;
mod types;

pub use client::{BackendClient, ClientSettings, RelayClient};
pub use filename::{content_disposition_filename, deterministic_filename, sanitize_filename};
pub use persist::{ensure_output_dir, AtomicFileWriter, PersistError};
pub use poller::{
    spawn_poller, ChannelPollSink, LocalRelay, PollEvent, PollOutcome, PollSink, PollerHandle,
    RelayApi, ResultsApi,
};
pub use server::{build_router, serve, RelayState, DEFAULT_MAX_BODY_BYTES};
pub use session::{
    expired_cookies, is_valid_account_id, login_url, session_cookies, session_from_cookie_header,
    AuthSettings, Session, ACCOUNT_COOKIE, SESSION_MAX_AGE_SECS, TOKEN_COOKIE,
};
pub use store::{format_timestamp, Clock, InMemoryStore, MessageStore, StoreError};
pub use types::{
    ChatReply, ClientError, DocumentInfo, DownloadedDocument, Envelope, EnvelopeDocuments,
    EnvelopeListing, FailureKind, UserProfile,
};
