//! Tool trackers: the user-facing operations that commit logs.
//!
//! Each tracker validates the action, writes through the matching
//! [`LogStore`] and fires the [`Feedback`] pulse once the commit succeeded.

use chrono::{DateTime, Utc};

use crate::log::{ActivityLog, FeedingPayload, LogPatch, NursingPayload, Side, SleepPayload};
use crate::session::{FinishedSession, SessionError, SessionTimer};
use crate::store::{LogBackend, LogStore};

/// Cosmetic acknowledgement fired after a successful commit (haptics, a bell).
///
/// Implementations must not block; a missing device is simply a no-op.
pub trait Feedback {
    fn pulse(&self);
}

/// Feedback that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFeedback;

impl Feedback for NoFeedback {
    fn pulse(&self) {}
}

impl<T: Feedback + ?Sized> Feedback for &T {
    fn pulse(&self) {
        (**self).pulse();
    }
}

/// Stamps the store's subject, appends and pulses.
fn commit<P, B, F>(
    store: &mut LogStore<P, B>,
    entry: ActivityLog<P>,
    feedback: &F,
) -> Result<ActivityLog<P>, SessionError>
where
    P: crate::log::ToolPayload,
    B: LogBackend,
    F: Feedback,
{
    let entry = if entry.subject_id.is_none() {
        let subject = store.subject().cloned();
        entry.with_subject(subject)
    } else {
        entry
    };
    store.append(entry.clone())?;
    feedback.pulse();
    Ok(entry)
}

/// Breastfeeding: a pausable timer per side plus instant and manual logs.
#[derive(Debug, Default)]
pub struct NursingTracker<F = NoFeedback> {
    timer: SessionTimer<Side>,
    feedback: F,
}

impl<F: Feedback> NursingTracker<F> {
    pub const fn new(feedback: F) -> Self {
        Self {
            timer: SessionTimer::new(),
            feedback,
        }
    }

    pub const fn timer(&self) -> &SessionTimer<Side> {
        &self.timer
    }

    /// Starts a session on `side`, or resumes the paused one.
    pub fn start(&mut self, side: Side, now: DateTime<Utc>) -> Result<(), SessionError> {
        self.timer.start(side, now)
    }

    pub fn pause(&mut self, now: DateTime<Utc>) -> Result<(), SessionError> {
        self.timer.pause(now)
    }

    pub fn resume(&mut self, now: DateTime<Utc>) -> Result<(), SessionError> {
        self.timer.resume(now)
    }

    /// Drops the current session without committing anything.
    pub fn discard(&mut self) {
        self.timer.reset();
    }

    /// Stops the running or paused session and commits it.
    ///
    /// The timer is back to idle afterwards whatever happens to the commit.
    /// Returns `None` when the measured time was negative and nothing was stored.
    pub fn stop<B: LogBackend>(
        &mut self,
        store: &mut LogStore<NursingPayload, B>,
        now: DateTime<Utc>,
    ) -> Result<Option<ActivityLog<NursingPayload>>, SessionError> {
        let FinishedSession {
            variant,
            started_at,
            elapsed,
        } = self.timer.stop(now)?;

        if elapsed < chrono::Duration::zero() {
            tracing::warn!(
                elapsed_ms = elapsed.num_milliseconds(),
                "discarding session with negative duration"
            );
            return Ok(None);
        }
        let payload = NursingPayload {
            side: variant,
            manual: false,
        };
        let entry = ActivityLog::timed(started_at, elapsed, payload);
        commit(store, entry, &self.feedback).map(Some)
    }

    /// Records an instant session on `side` without touching the timer.
    pub fn quick_log<B: LogBackend>(
        &self,
        store: &mut LogStore<NursingPayload, B>,
        side: Side,
        now: DateTime<Utc>,
    ) -> Result<ActivityLog<NursingPayload>, SessionError> {
        let payload = NursingPayload { side, manual: true };
        commit(store, ActivityLog::instant(now, payload), &self.feedback)
    }

    /// Records a past session given its start and end.
    pub fn manual_entry<B: LogBackend>(
        &self,
        store: &mut LogStore<NursingPayload, B>,
        side: Side,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<ActivityLog<NursingPayload>, SessionError> {
        let payload = NursingPayload { side, manual: true };
        let entry = ActivityLog::completed(start, end, payload)?;
        commit(store, entry, &self.feedback)
    }
}

/// Sleep: open an entry on start, close it on wake.
///
/// The open entry lives in the store, so a subject never has two sleeps in
/// progress even across restarts.
#[derive(Debug, Default)]
pub struct SleepTracker<F = NoFeedback> {
    feedback: F,
}

impl<F: Feedback> SleepTracker<F> {
    pub const fn new(feedback: F) -> Self {
        Self { feedback }
    }

    pub fn is_sleeping<B: LogBackend>(store: &LogStore<SleepPayload, B>) -> bool {
        store.open_entry().is_some()
    }

    /// Opens a sleep entry at `now`. Rejected while another sleep is open.
    pub fn start<B: LogBackend>(
        &self,
        store: &mut LogStore<SleepPayload, B>,
        now: DateTime<Utc>,
    ) -> Result<ActivityLog<SleepPayload>, SessionError> {
        if let Some(open) = store.open_entry() {
            tracing::warn!(id = %open.id, "sleep already in progress");
            return Err(SessionError::AlreadyRunning);
        }
        commit(
            store,
            ActivityLog::new(now, SleepPayload::default()),
            &self.feedback,
        )
    }

    /// Closes the open sleep entry at `now`.
    pub fn wake<B: LogBackend>(
        &self,
        store: &mut LogStore<SleepPayload, B>,
        now: DateTime<Utc>,
    ) -> Result<ActivityLog<SleepPayload>, SessionError> {
        let Some(open) = store.open_entry() else {
            tracing::warn!("wake requested with no sleep in progress");
            return Err(SessionError::NoOpenEntry);
        };
        let mut closed = open.clone();
        let patch = LogPatch::close(closed.timestamp, now)?;
        store.update_matching(|e| e.id == closed.id, &patch)?;
        patch.apply(&mut closed);
        self.feedback.pulse();
        Ok(closed)
    }

    /// Records a completed past sleep.
    pub fn manual_entry<B: LogBackend>(
        &self,
        store: &mut LogStore<SleepPayload, B>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<ActivityLog<SleepPayload>, SessionError> {
        let payload = SleepPayload {
            manual: true,
            ..SleepPayload::default()
        };
        let entry = ActivityLog::completed(start, end, payload)?;
        commit(store, entry, &self.feedback)
    }
}

/// Bottle feedings: instant logs only.
#[derive(Debug, Default)]
pub struct FeedingTracker<F = NoFeedback> {
    feedback: F,
}

impl<F: Feedback> FeedingTracker<F> {
    pub const fn new(feedback: F) -> Self {
        Self { feedback }
    }

    pub fn log<B: LogBackend>(
        &self,
        store: &mut LogStore<FeedingPayload, B>,
        payload: FeedingPayload,
        at: DateTime<Utc>,
    ) -> Result<ActivityLog<FeedingPayload>, SessionError> {
        commit(store, ActivityLog::new(at, payload), &self.feedback)
    }
}
