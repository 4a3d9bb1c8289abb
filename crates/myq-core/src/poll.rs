// ── Adaptive poll scheduler state ──
//
// Two-rate state machine: a short interval while "active" (a command was
// just issued, or a door is in motion) and a long one otherwise. Active
// mode decays automatically five minutes after the last activating
// event. All methods take an explicit `now` so tests control time.

use std::time::{Duration, Instant};

use tracing::debug;

/// How long active mode lasts past the last activating event.
pub const ACTIVE_MODE_DURATION: Duration = Duration::from_secs(300);

/// Poll scheduler state. Mutated only by the controller's tick and
/// command paths; never persisted.
#[derive(Debug)]
pub struct PollState {
    active: bool,
    last_active_at: Option<Instant>,
    last_poll_at: Option<Instant>,
    active_interval: Duration,
    inactive_interval: Duration,
}

impl PollState {
    pub fn new(active_interval: Duration, inactive_interval: Duration) -> Self {
        Self {
            active: false,
            last_active_at: None,
            last_poll_at: None,
            active_interval,
            inactive_interval,
        }
    }

    /// Enter (or re-arm) active mode.
    pub fn mark_active(&mut self, now: Instant) {
        if !self.active {
            debug!("entering active polling mode");
        }
        self.active = true;
        self.last_active_at = Some(now);
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// One scheduler tick: decay active mode if it has run its course,
    /// then decide whether a poll is due under the current rate. A due
    /// tick stamps the poll time -- the caller is expected to poll.
    pub fn tick(&mut self, now: Instant) -> bool {
        self.decay(now);

        let interval = self.current_interval();
        let due = self
            .last_poll_at
            .is_none_or(|last| now.duration_since(last) >= interval);

        if due {
            self.last_poll_at = Some(now);
        }
        due
    }

    /// Stamp the poll time without a tick (query and discovery passes
    /// count as polls).
    pub fn note_poll(&mut self, now: Instant) {
        self.last_poll_at = Some(now);
    }

    fn decay(&mut self, now: Instant) {
        if !self.active {
            return;
        }
        let expired = self
            .last_active_at
            .is_none_or(|last| now.duration_since(last) >= ACTIVE_MODE_DURATION);
        if expired {
            debug!("active polling mode expired");
            self.active = false;
        }
    }

    fn current_interval(&self) -> Duration {
        if self.active {
            self.active_interval
        } else {
            self.inactive_interval
        }
    }
}
