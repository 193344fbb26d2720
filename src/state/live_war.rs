use chrono::{DateTime, Duration, Utc};

/// Lifecycle of the tracked clan's current war as seen by the monitor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MonitorState {
    /// Nothing announced for the upcoming war yet
    Idle,

    /// The start of the upcoming war has been announced
    Notified,
}

/// Process-local record of what the live monitor has already handled
///
/// Nothing here is persisted: after a restart the monitor may announce the
/// same war start again. Archival stays idempotent regardless, since the store
/// is consulted before every write.
#[derive(Debug, Clone)]
pub struct LiveWarSession {
    state: MonitorState,

    /// Start time of the war whose start was announced
    notified_start_for: Option<DateTime<Utc>>,

    /// End-time key of the war archived most recently
    last_archived_end_time: Option<String>,
}

impl LiveWarSession {
    pub fn new() -> Self {
        Self {
            state: MonitorState::Idle,
            notified_start_for: None,
            last_archived_end_time: None,
        }
    }

    pub fn state(&self) -> MonitorState {
        self.state
    }

    pub fn notified_start_for(&self) -> Option<DateTime<Utc>> {
        self.notified_start_for
    }

    pub fn last_archived_end_time(&self) -> Option<&str> {
        self.last_archived_end_time.as_deref()
    }

    /// Checks whether a war starting at `start_time` should be announced now
    ///
    /// True when the start lies between `now` and `now + lead_window` and
    /// this start has not been announced yet.
    pub fn should_notify(
        &self,
        start_time: DateTime<Utc>,
        now: DateTime<Utc>,
        lead_window: Duration,
    ) -> bool {
        if self.notified_start_for == Some(start_time) {
            return false;
        }
        let until_start = start_time - now;
        until_start >= Duration::zero() && until_start <= lead_window
    }

    /// Records an announcement (Idle -> Notified)
    pub fn record_notified(&mut self, start_time: DateTime<Utc>) {
        self.notified_start_for = Some(start_time);
        self.state = MonitorState::Notified;
    }

    /// Checks whether the war ending at `end_key` was archived by this process
    pub fn is_archived(&self, end_key: &str) -> bool {
        self.last_archived_end_time.as_deref() == Some(end_key)
    }

    /// Records an archival (Notified/Idle -> Idle)
    pub fn record_archived(&mut self, end_key: &str) {
        self.last_archived_end_time = Some(end_key.to_string());
        self.state = MonitorState::Idle;
    }
}

impl Default for LiveWarSession {
    fn default() -> Self {
        Self::new()
    }
}
