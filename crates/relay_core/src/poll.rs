use std::time::Duration;

use crate::{ProcessingState, TerminalRule};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollSettings {
    pub interval: Duration,
    /// Upper bound for the retry delay after consecutive failures.
    pub max_backoff: Duration,
    /// Attempts at clearing the buffer before giving up on it.
    pub clear_attempts: u32,
    pub terminal_rule: TerminalRule,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(2000),
            max_backoff: Duration::from_secs(30),
            clear_attempts: 3,
            terminal_rule: TerminalRule::default(),
        }
    }
}

impl PollSettings {
    /// Delay before the next attempt after `failures` consecutive failures.
    pub fn backoff(&self, failures: u32) -> Duration {
        if failures == 0 {
            return self.interval;
        }
        let exponent = failures.saturating_sub(1).min(16);
        self.interval
            .saturating_mul(1u32 << exponent)
            .min(self.max_backoff.max(self.interval))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PollStatus {
    #[default]
    Idle,
    Polling,
    Clearing,
    FetchingResults,
    Finished,
    Stopped,
}

impl PollStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, PollStatus::Finished | PollStatus::Stopped)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PollState {
    settings: PollSettings,
    status: PollStatus,
    processing: ProcessingState,
    consecutive_failures: u32,
    clear_failures: u32,
    last_error: Option<String>,
}

impl PollState {
    pub fn new(settings: PollSettings) -> Self {
        Self {
            settings,
            ..Self::default()
        }
    }

    pub fn settings(&self) -> &PollSettings {
        &self.settings
    }

    pub fn status(&self) -> PollStatus {
        self.status
    }

    pub fn processing(&self) -> &ProcessingState {
        &self.processing
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub(crate) fn set_status(&mut self, status: PollStatus) {
        self.status = status;
    }

    pub(crate) fn replace_processing(&mut self, processing: ProcessingState) {
        self.processing = processing;
        self.consecutive_failures = 0;
        self.last_error = None;
    }

    /// Records a failed fetch and returns the delay before retrying.
    pub(crate) fn record_fetch_failure(&mut self, reason: String) -> Duration {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.last_error = Some(reason);
        self.settings.backoff(self.consecutive_failures)
    }

    /// Records a failed clear; `None` once the attempts are exhausted.
    pub(crate) fn record_clear_failure(&mut self, reason: String) -> Option<Duration> {
        self.clear_failures = self.clear_failures.saturating_add(1);
        self.last_error = Some(reason);
        if self.clear_failures >= self.settings.clear_attempts {
            None
        } else {
            Some(self.settings.backoff(self.clear_failures))
        }
    }

    pub(crate) fn record_error(&mut self, reason: String) {
        self.last_error = Some(reason);
    }
}
