//! Relay core: webhook message model, processing-status reducer and the pure
//! poll state machine.
mod contract;
mod effect;
mod message;
mod msg;
mod poll;
mod reduce;
mod state;
mod update;
mod view_model;

pub use contract::{
    Agreement, Contract, ContractDocument, GoverningLaw, IndustryPatterns, Obligation, Party, Risk,
};
pub use effect::Effect;
pub use message::{
    BatchMessage, CurrentEnvelope, DocumentProgress, EnvelopeState, EnvelopeStatus,
    IndividualMessage, OverallProgress, ProcessingPhase, ReceivedMessage, StoredWebhookMessage,
    TerminateMessage, TerminateStatus, WebhookMessage,
};
pub use msg::PollMsg;
pub use poll::{PollSettings, PollState, PollStatus};
pub use reduce::{is_terminal, reduce};
pub use state::{ProcessingState, TerminalRule};
pub use update::update;
pub use view_model::{
    describe, MessageLine, PhaseStep, PhaseView, ProcessingView, COMPLETE_HEADLINE,
};
