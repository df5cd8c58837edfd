//! Live timed sessions.
//!
//! A [`SessionTimer`] drives one pausable activity (a breastfeeding session on
//! one side). Elapsed time is always derived from the wall clock:
//! `now - started_at - paused_total`, so delayed or skipped display ticks
//! never skew the committed duration.
//!
//! ```text
//! Idle --start--> Running --pause--> Paused --start/resume--> Running
//!                   |                  |
//!                   +------stop--------+----> Idle (session handed back)
//! ```

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use crate::store::StoreError;
use crate::types::{ValidationError, truncate_to_millis};

/// Errors from session transitions and the trackers built on them.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The requested transition is not valid from the current state.
    #[error("cannot {action} while {state}")]
    InvalidTransition {
        action: &'static str,
        state: &'static str,
    },
    /// A session is already running.
    #[error("a session is already running")]
    AlreadyRunning,
    /// Resuming with a different variant than the session started with.
    #[error("session was started as {started}, cannot resume as {requested}")]
    VariantMismatch { started: String, requested: String },
    /// There is no open entry to close.
    #[error("no session in progress")]
    NoOpenEntry,
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl SessionError {
    /// Whether the error came from a rejected user action rather than storage.
    pub const fn is_rejected_action(&self) -> bool {
        !matches!(self, Self::Store(_))
    }
}

/// Timer state. The variant is fixed when the session starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState<V> {
    Idle,
    Running {
        variant: V,
        started_at: DateTime<Utc>,
        paused_total: Duration,
    },
    Paused {
        variant: V,
        started_at: DateTime<Utc>,
        paused_total: Duration,
        paused_at: DateTime<Utc>,
    },
}

impl<V> Default for SessionState<V> {
    fn default() -> Self {
        Self::Idle
    }
}

impl<V> SessionState<V> {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running { .. } => "running",
            Self::Paused { .. } => "paused",
        }
    }
}

/// A stopped session, ready to be committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FinishedSession<V> {
    pub variant: V,
    pub started_at: DateTime<Utc>,
    /// Wall-clock time minus paused time. Negative if the clock went backwards.
    pub elapsed: Duration,
}

/// State machine for one live, pausable session.
#[derive(Debug, Clone)]
pub struct SessionTimer<V> {
    state: SessionState<V>,
}

impl<V> Default for SessionTimer<V> {
    fn default() -> Self {
        Self {
            state: SessionState::Idle,
        }
    }
}

impl<V: Copy + PartialEq + std::fmt::Display> SessionTimer<V> {
    pub const fn new() -> Self {
        Self {
            state: SessionState::Idle,
        }
    }

    pub const fn state(&self) -> &SessionState<V> {
        &self.state
    }

    pub const fn is_running(&self) -> bool {
        matches!(self.state, SessionState::Running { .. })
    }

    pub const fn is_active(&self) -> bool {
        !matches!(self.state, SessionState::Idle)
    }

    /// The variant of the current session.
    pub const fn variant(&self) -> Option<V> {
        match self.state {
            SessionState::Idle => None,
            SessionState::Running { variant, .. } | SessionState::Paused { variant, .. } => {
                Some(variant)
            }
        }
    }

    /// Starts a new session, or resumes a paused one with the same variant.
    pub fn start(&mut self, variant: V, now: DateTime<Utc>) -> Result<(), SessionError> {
        let now = truncate_to_millis(now);
        self.state = match self.state {
            SessionState::Idle => {
                tracing::debug!(%variant, started_at = %now, "session started");
                SessionState::Running {
                    variant,
                    started_at: now,
                    paused_total: Duration::zero(),
                }
            }
            SessionState::Paused {
                variant: started,
                started_at,
                paused_total,
                paused_at,
            } => {
                if started != variant {
                    return Err(SessionError::VariantMismatch {
                        started: started.to_string(),
                        requested: variant.to_string(),
                    });
                }
                let paused_for = (now - paused_at).max(Duration::zero());
                tracing::debug!(%variant, paused_ms = paused_for.num_milliseconds(), "session resumed");
                SessionState::Running {
                    variant,
                    started_at,
                    paused_total: paused_total + paused_for,
                }
            }
            SessionState::Running { .. } => return Err(SessionError::AlreadyRunning),
        };
        Ok(())
    }

    /// Resumes a paused session with its original variant.
    pub fn resume(&mut self, now: DateTime<Utc>) -> Result<(), SessionError> {
        match self.state {
            SessionState::Paused { variant, .. } => self.start(variant, now),
            _ => Err(self.invalid("resume")),
        }
    }

    /// Freezes the elapsed time.
    pub fn pause(&mut self, now: DateTime<Utc>) -> Result<(), SessionError> {
        let SessionState::Running {
            variant,
            started_at,
            paused_total,
        } = self.state
        else {
            return Err(self.invalid("pause"));
        };
        self.state = SessionState::Paused {
            variant,
            started_at,
            paused_total,
            paused_at: truncate_to_millis(now),
        };
        tracing::debug!(%variant, "session paused");
        Ok(())
    }

    /// Elapsed session time as of `now`.
    pub fn elapsed(&self, now: DateTime<Utc>) -> Duration {
        match self.state {
            SessionState::Idle => Duration::zero(),
            SessionState::Running {
                started_at,
                paused_total,
                ..
            } => truncate_to_millis(now) - started_at - paused_total,
            SessionState::Paused {
                started_at,
                paused_total,
                paused_at,
                ..
            } => paused_at - started_at - paused_total,
        }
    }

    /// Ends the session and returns to idle.
    pub fn stop(&mut self, now: DateTime<Utc>) -> Result<FinishedSession<V>, SessionError> {
        let (variant, started_at) = match self.state {
            SessionState::Idle => return Err(self.invalid("stop")),
            SessionState::Running {
                variant,
                started_at,
                ..
            }
            | SessionState::Paused {
                variant,
                started_at,
                ..
            } => (variant, started_at),
        };
        let elapsed = self.elapsed(now);
        self.state = SessionState::Idle;
        tracing::debug!(%variant, elapsed_ms = elapsed.num_milliseconds(), "session stopped");
        Ok(FinishedSession {
            variant,
            started_at,
            elapsed,
        })
    }

    /// Discards the current session without producing anything.
    pub fn reset(&mut self) {
        self.state = SessionState::Idle;
    }

    fn invalid(&self, action: &'static str) -> SessionError {
        tracing::warn!(action, state = self.state.name(), "rejected session transition");
        SessionError::InvalidTransition {
            action,
            state: self.state.name(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::Side;

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn start_stop_measures_wall_clock() {
        let mut timer = SessionTimer::new();
        timer.start(Side::Left, at("2025-03-01T08:00:00Z")).unwrap();
        assert!(timer.is_running());

        let finished = timer.stop(at("2025-03-01T08:12:30Z")).unwrap();
        assert_eq!(finished.variant, Side::Left);
        assert_eq!(finished.started_at, at("2025-03-01T08:00:00Z"));
        assert_eq!(finished.elapsed, Duration::seconds(750));
        assert!(!timer.is_active());
    }

    #[test]
    fn paused_time_is_excluded() {
        let mut timer = SessionTimer::new();
        timer.start(Side::Right, at("2025-03-01T08:00:00Z")).unwrap();
        timer.pause(at("2025-03-01T08:05:00Z")).unwrap();

        // Elapsed is frozen while paused, however late it is read.
        assert_eq!(
            timer.elapsed(at("2025-03-01T09:00:00Z")),
            Duration::minutes(5)
        );

        timer.start(Side::Right, at("2025-03-01T08:15:00Z")).unwrap();
        let finished = timer.stop(at("2025-03-01T08:20:00Z")).unwrap();
        assert_eq!(finished.elapsed, Duration::minutes(10));
    }

    #[test]
    fn multiple_pauses_accumulate() {
        let mut timer = SessionTimer::new();
        timer.start(Side::Left, at("2025-03-01T08:00:00Z")).unwrap();
        timer.pause(at("2025-03-01T08:01:00Z")).unwrap();
        timer.resume(at("2025-03-01T08:03:00Z")).unwrap();
        timer.pause(at("2025-03-01T08:04:00Z")).unwrap();
        timer.resume(at("2025-03-01T08:10:00Z")).unwrap();

        assert_eq!(
            timer.elapsed(at("2025-03-01T08:11:00Z")),
            Duration::minutes(3)
        );
    }

    #[test]
    fn stop_while_paused_uses_pause_instant() {
        let mut timer = SessionTimer::new();
        timer.start(Side::Left, at("2025-03-01T08:00:00Z")).unwrap();
        timer.pause(at("2025-03-01T08:07:00Z")).unwrap();
        let finished = timer.stop(at("2025-03-01T10:00:00Z")).unwrap();
        assert_eq!(finished.elapsed, Duration::minutes(7));
    }

    #[test]
    fn invalid_transitions_are_reported() {
        let mut timer: SessionTimer<Side> = SessionTimer::new();
        let now = at("2025-03-01T08:00:00Z");

        assert!(matches!(
            timer.pause(now),
            Err(SessionError::InvalidTransition { action: "pause", state: "idle" })
        ));
        assert!(matches!(
            timer.stop(now),
            Err(SessionError::InvalidTransition { action: "stop", .. })
        ));
        assert!(timer.resume(now).is_err());

        timer.start(Side::Left, now).unwrap();
        assert!(matches!(
            timer.start(Side::Left, now),
            Err(SessionError::AlreadyRunning)
        ));
        assert!(timer.resume(now).is_err());

        timer.pause(now).unwrap();
        assert!(matches!(
            timer.pause(now),
            Err(SessionError::InvalidTransition { state: "paused", .. })
        ));
    }

    #[test]
    fn variant_is_fixed_for_the_session() {
        let mut timer = SessionTimer::new();
        timer.start(Side::Left, at("2025-03-01T08:00:00Z")).unwrap();
        timer.pause(at("2025-03-01T08:01:00Z")).unwrap();

        let err = timer
            .start(Side::Right, at("2025-03-01T08:02:00Z"))
            .unwrap_err();
        assert!(matches!(err, SessionError::VariantMismatch { .. }));
        assert_eq!(timer.variant(), Some(Side::Left));
        assert_eq!(timer.state().name(), "paused");
    }

    #[test]
    fn clock_going_backwards_yields_negative_elapsed() {
        let mut timer = SessionTimer::new();
        timer.start(Side::Left, at("2025-03-01T08:00:00Z")).unwrap();
        let finished = timer.stop(at("2025-03-01T07:59:00Z")).unwrap();
        assert!(finished.elapsed < Duration::zero());
        assert!(!timer.is_active());
    }
}
