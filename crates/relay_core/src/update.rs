use std::time::Duration;

use crate::{reduce, Effect, PollMsg, PollState, PollStatus};

/// Pure update function: applies a message to the poll state and returns any effects.
///
/// Messages that do not belong to the current status are ignored.
pub fn update(mut state: PollState, msg: PollMsg) -> (PollState, Vec<Effect>) {
    if state.status().is_terminal() {
        return (state, Vec::new());
    }

    let effects = match msg {
        PollMsg::StopRequested => {
            state.set_status(PollStatus::Stopped);
            Vec::new()
        }
        PollMsg::Start => {
            if state.status() != PollStatus::Idle {
                return (state, Vec::new());
            }
            state.set_status(PollStatus::Polling);
            vec![Effect::FetchMessages {
                after: Duration::ZERO,
            }]
        }
        PollMsg::MessagesFetched(messages) => {
            if state.status() != PollStatus::Polling {
                return (state, Vec::new());
            }
            let processing = reduce(&messages, state.settings().terminal_rule);
            let complete = processing.is_complete;
            state.replace_processing(processing.clone());
            let mut effects = vec![Effect::Publish(processing)];
            if complete {
                state.set_status(PollStatus::Clearing);
                effects.push(Effect::ClearBuffer {
                    after: Duration::ZERO,
                });
            } else {
                effects.push(Effect::FetchMessages {
                    after: state.settings().interval,
                });
            }
            effects
        }
        PollMsg::FetchFailed(reason) => {
            if state.status() != PollStatus::Polling {
                return (state, Vec::new());
            }
            let after = state.record_fetch_failure(reason);
            vec![Effect::FetchMessages { after }]
        }
        PollMsg::BufferCleared => {
            if state.status() != PollStatus::Clearing {
                return (state, Vec::new());
            }
            state.set_status(PollStatus::FetchingResults);
            vec![Effect::FetchResults]
        }
        PollMsg::ClearFailed(reason) => {
            if state.status() != PollStatus::Clearing {
                return (state, Vec::new());
            }
            match state.record_clear_failure(reason) {
                Some(after) => vec![Effect::ClearBuffer { after }],
                None => {
                    // Stale messages stay behind; the next run still sees completion.
                    state.set_status(PollStatus::FetchingResults);
                    vec![Effect::FetchResults]
                }
            }
        }
        PollMsg::ResultsFetched => {
            if state.status() != PollStatus::FetchingResults {
                return (state, Vec::new());
            }
            state.set_status(PollStatus::Finished);
            Vec::new()
        }
        PollMsg::ResultsFailed(reason) => {
            if state.status() != PollStatus::FetchingResults {
                return (state, Vec::new());
            }
            state.record_error(reason);
            state.set_status(PollStatus::Finished);
            Vec::new()
        }
    };

    (state, effects)
}
