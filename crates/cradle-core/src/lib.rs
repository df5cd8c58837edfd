//! Core domain logic for the infant activity log.
//!
//! This crate contains the fundamental types and logic for:
//! - Logs: append-only, subject-scoped activity entries and their store
//! - Sessions: the pausable timer behind live breastfeeding sessions
//! - Aggregation: daily totals and multi-day trends
//! - Timeline: mapping events onto a bounded time window

pub mod aggregate;
pub mod i18n;
pub mod log;
pub mod session;
pub mod store;
pub mod summary;
#[cfg(test)]
mod test_zone;
pub mod ticker;
pub mod timeline;
pub mod tracker;
mod types;

pub use aggregate::{
    DayBounds, MAX_TREND_DAYS, Trend, TrendBucket, TrendConfig, daily_total, local_day_span,
    local_midnight_to_utc, milk_volume, nursing_minutes, sleep_minutes_in_day, trend,
};
pub use i18n::{EnglishTranslator, Translator};
pub use log::{
    ActivityLog, FeedType, FeedingPayload, LogPatch, LogRecord, NursingPayload, RecordError, Side,
    SleepKind, SleepPayload, ToolKind, ToolPayload, VolumeUnit,
};
pub use session::{FinishedSession, SessionError, SessionState, SessionTimer};
pub use store::{LogBackend, LogStore, MemoryBackend, StoreError};
pub use summary::{Dashboard, SleepState, next_side, time_since};
pub use ticker::{TickGuard, TickScheduler};
pub use timeline::{
    EventSpan, HourMark, TimedEvent, TimelineBar, TimelineConfig, TimelineMapper, Window,
};
pub use tracker::{Feedback, FeedingTracker, NoFeedback, NursingTracker, SleepTracker};
pub use types::{LogId, SubjectId, ValidationError, truncate_to_millis};
