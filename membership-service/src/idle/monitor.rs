use std::time::Duration;
use tokio::time::Instant;

use crate::config::IdleConfig;

/// User input that counts as activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityKind {
    MouseDown,
    MouseMove,
    KeyPress,
    Scroll,
    TouchStart,
    Click,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryCause {
    /// Warning countdown ran out.
    Idle,
    /// Explicit logout.
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdleState {
    Active,
    Warning { deadline: Instant },
    Expired(ExpiryCause),
}

impl IdleState {
    /// Whole seconds left in the warning countdown at `now`, rounded up.
    pub fn countdown_secs(&self, now: Instant) -> Option<u64> {
        match self {
            IdleState::Warning { deadline } => {
                Some(ceil_secs(deadline.saturating_duration_since(now)))
            }
            _ => None,
        }
    }
}

/// Transition reported by the monitor. `Expired` is reported once per monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdleEvent {
    WarningStarted { countdown_secs: u64 },
    Extended,
    Expired(ExpiryCause),
}

/// Idle-timeout state machine. Time is passed in, so it can be driven
/// by a timer task or stepped by hand.
#[derive(Debug, Clone)]
pub struct IdleMonitor {
    timeout: Duration,
    warning: Duration,
    last_activity: Instant,
    state: IdleState,
}

impl IdleMonitor {
    pub fn new(config: IdleConfig, now: Instant) -> Self {
        let timeout = Duration::from_secs(config.timeout_seconds);
        let warning = Duration::from_secs(config.warning_seconds).min(timeout);
        Self {
            timeout,
            warning,
            last_activity: now,
            state: IdleState::Active,
        }
    }

    pub fn state(&self) -> IdleState {
        self.state
    }

    pub fn is_expired(&self) -> bool {
        matches!(self.state, IdleState::Expired(_))
    }

    /// Instant at which `poll` next has something to do.
    pub fn next_deadline(&self) -> Option<Instant> {
        match self.state {
            IdleState::Active => Some(self.warning_at()),
            IdleState::Warning { deadline } => Some(deadline),
            IdleState::Expired(_) => None,
        }
    }

    pub fn countdown_secs(&self, now: Instant) -> Option<u64> {
        self.state.countdown_secs(now)
    }

    /// Any activity resets the idle clock; during the warning it also
    /// cancels the countdown.
    pub fn record_activity(&mut self, kind: ActivityKind, now: Instant) -> Option<IdleEvent> {
        match self.state {
            IdleState::Expired(_) => None,
            IdleState::Active => {
                self.last_activity = now;
                None
            }
            IdleState::Warning { .. } => {
                tracing::debug!(activity = ?kind, "Activity during idle warning");
                self.extend(now)
            }
        }
    }

    /// "Stay signed in".
    pub fn extend(&mut self, now: Instant) -> Option<IdleEvent> {
        match self.state {
            IdleState::Expired(_) => None,
            IdleState::Active => {
                self.last_activity = now;
                None
            }
            IdleState::Warning { .. } => {
                self.last_activity = now;
                self.state = IdleState::Active;
                Some(IdleEvent::Extended)
            }
        }
    }

    pub fn logout(&mut self) -> Option<IdleEvent> {
        self.expire(ExpiryCause::Manual)
    }

    /// Apply the clock. A late poll may go straight from `Active` to `Expired`.
    pub fn poll(&mut self, now: Instant) -> Option<IdleEvent> {
        match self.state {
            IdleState::Expired(_) => None,
            IdleState::Active => {
                if now >= self.last_activity + self.timeout {
                    self.expire(ExpiryCause::Idle)
                } else if now >= self.warning_at() {
                    let deadline = self.last_activity + self.timeout;
                    self.state = IdleState::Warning { deadline };
                    Some(IdleEvent::WarningStarted {
                        countdown_secs: ceil_secs(deadline.saturating_duration_since(now)),
                    })
                } else {
                    None
                }
            }
            IdleState::Warning { deadline } => {
                if now >= deadline {
                    self.expire(ExpiryCause::Idle)
                } else {
                    None
                }
            }
        }
    }

    fn expire(&mut self, cause: ExpiryCause) -> Option<IdleEvent> {
        if self.is_expired() {
            return None;
        }
        self.state = IdleState::Expired(cause);
        Some(IdleEvent::Expired(cause))
    }

    fn warning_at(&self) -> Instant {
        self.last_activity + (self.timeout - self.warning)
    }
}

fn ceil_secs(d: Duration) -> u64 {
    let secs = d.as_secs();
    if d.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs
    }
}
