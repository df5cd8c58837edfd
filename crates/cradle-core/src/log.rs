//! Activity log entries and the closed set of tool payloads.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{LogId, SubjectId, ValidationError, truncate_to_millis};

/// The tracking tools that produce logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    Feeding,
    Breastfeeding,
    Sleep,
}

impl ToolKind {
    pub const ALL: [Self; 3] = [Self::Feeding, Self::Breastfeeding, Self::Sleep];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Feeding => "feeding",
            Self::Breastfeeding => "breastfeeding",
            Self::Sleep => "sleep",
        }
    }

    /// Stable key under which this tool's logs are persisted.
    #[must_use]
    pub const fn storage_key(&self) -> &'static str {
        match self {
            Self::Feeding => "feeding_logs",
            Self::Breastfeeding => "breastfeeding_logs",
            Self::Sleep => "sleep_logs",
        }
    }

    /// Resolves a persisted storage key back to its tool.
    pub fn from_storage_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.storage_key() == key)
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToolKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "feeding" | "feed" => Ok(Self::Feeding),
            "breastfeeding" | "nursing" | "nurse" => Ok(Self::Breastfeeding),
            "sleep" => Ok(Self::Sleep),
            _ => Err(ValidationError::UnknownVariant {
                field: "tool kind",
                value: s.to_string(),
            }),
        }
    }
}

/// Breastfeeding side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    #[serde(rename = "L")]
    Left,
    #[serde(rename = "R")]
    Right,
}

impl Side {
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::Left => Self::Right,
            Self::Right => Self::Left,
        }
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Left => "L",
            Self::Right => "R",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Side {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "l" | "left" => Ok(Self::Left),
            "r" | "right" => Ok(Self::Right),
            _ => Err(ValidationError::UnknownVariant {
                field: "side",
                value: s.to_string(),
            }),
        }
    }
}

/// What was fed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedType {
    Formula,
    BreastMilk,
    Cow,
    Water,
}

impl FeedType {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Formula => "formula",
            Self::BreastMilk => "breast_milk",
            Self::Cow => "cow",
            Self::Water => "water",
        }
    }

    /// Whether this feed counts towards milk volume totals.
    #[must_use]
    pub const fn is_milk(&self) -> bool {
        !matches!(self, Self::Water)
    }
}

impl fmt::Display for FeedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FeedType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "formula" => Ok(Self::Formula),
            "breast_milk" | "breastmilk" => Ok(Self::BreastMilk),
            "cow" | "cow_milk" => Ok(Self::Cow),
            "water" => Ok(Self::Water),
            _ => Err(ValidationError::UnknownVariant {
                field: "feed type",
                value: s.to_string(),
            }),
        }
    }
}

/// Volume unit for feeding amounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VolumeUnit {
    #[default]
    Ml,
    Oz,
}

/// Millilitres in one US fluid ounce.
const ML_PER_OZ: f64 = 29.573_5;

impl VolumeUnit {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Ml => "ml",
            Self::Oz => "oz",
        }
    }

    /// Converts `amount` expressed in `self` into `target`.
    #[must_use]
    pub fn convert(self, amount: f64, target: Self) -> f64 {
        match (self, target) {
            (Self::Ml, Self::Oz) => amount / ML_PER_OZ,
            (Self::Oz, Self::Ml) => amount * ML_PER_OZ,
            _ => amount,
        }
    }
}

impl fmt::Display for VolumeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VolumeUnit {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ml" => Ok(Self::Ml),
            "oz" => Ok(Self::Oz),
            _ => Err(ValidationError::UnknownVariant {
                field: "volume unit",
                value: s.to_string(),
            }),
        }
    }
}

/// Kind of sleep period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SleepKind {
    #[default]
    Nap,
}

/// Tool-specific fields carried by a log entry.
///
/// Implemented by the closed set of payloads below; one [`LogStore`] exists
/// per implementation.
///
/// [`LogStore`]: crate::store::LogStore
pub trait ToolPayload: Clone + fmt::Debug + Serialize + DeserializeOwned {
    /// The tool this payload belongs to.
    const KIND: ToolKind;

    /// Whether entries stay open until an end time is attached.
    const OPEN_ENDED: bool = false;
}

/// A bottle feeding.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeedingPayload {
    pub amount: f64,
    pub unit: VolumeUnit,
    #[serde(rename = "type")]
    pub feed_type: FeedType,
}

impl FeedingPayload {
    pub fn new(amount: f64, unit: VolumeUnit, feed_type: FeedType) -> Result<Self, ValidationError> {
        if !amount.is_finite() || amount < 0.0 {
            return Err(ValidationError::InvalidAmount { value: amount });
        }
        Ok(Self {
            amount,
            unit,
            feed_type,
        })
    }

    /// The amount expressed in `unit`.
    #[must_use]
    pub fn amount_in(&self, unit: VolumeUnit) -> f64 {
        self.unit.convert(self.amount, unit)
    }
}

impl ToolPayload for FeedingPayload {
    const KIND: ToolKind = ToolKind::Feeding;
}

/// A breastfeeding session on one side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NursingPayload {
    pub side: Side,
    #[serde(default)]
    pub manual: bool,
}

impl ToolPayload for NursingPayload {
    const KIND: ToolKind = ToolKind::Breastfeeding;
}

/// A sleep period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SleepPayload {
    #[serde(rename = "type", default)]
    pub kind: SleepKind,
    #[serde(default)]
    pub manual: bool,
}

impl ToolPayload for SleepPayload {
    const KIND: ToolKind = ToolKind::Sleep;
    const OPEN_ENDED: bool = true;
}

/// One recorded occurrence of a tracked activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityLog<P> {
    pub id: LogId,
    /// Start of the event.
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    /// End of the event, once completed.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "chrono::serde::ts_milliseconds_option"
    )]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_minutes: Option<i64>,
    /// Subject the entry belongs to. `None` marks a legacy entry shared by all subjects.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject_id: Option<SubjectId>,
    pub payload: P,
}

impl<P: ToolPayload> ActivityLog<P> {
    /// Creates an entry starting at `timestamp` with no end or duration.
    pub fn new(timestamp: DateTime<Utc>, payload: P) -> Self {
        Self {
            id: LogId::generate(),
            timestamp: truncate_to_millis(timestamp),
            end_time: None,
            duration_seconds: None,
            duration_minutes: None,
            subject_id: None,
            payload,
        }
    }

    /// Creates an instantaneous entry with zero duration.
    pub fn instant(timestamp: DateTime<Utc>, payload: P) -> Self {
        Self {
            duration_seconds: Some(0),
            duration_minutes: Some(0),
            ..Self::new(timestamp, payload)
        }
    }

    /// Creates an entry for a session that ran for `elapsed` from `started_at`.
    ///
    /// The end time is only attached when the session has positive length.
    pub fn timed(started_at: DateTime<Utc>, elapsed: Duration, payload: P) -> Self {
        let mut log = Self::new(started_at, payload);
        let end = log.timestamp + elapsed;
        log.end_time = (end > log.timestamp).then_some(end);
        log.duration_seconds = Some(elapsed.num_seconds());
        log.duration_minutes = Some(elapsed.num_minutes());
        log
    }

    /// Creates a completed entry spanning `[start, end)`.
    pub fn completed(
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        payload: P,
    ) -> Result<Self, ValidationError> {
        let patch = LogPatch::close(start, end)?;
        let mut log = Self::new(start, payload);
        patch.apply(&mut log);
        Ok(log)
    }

    /// Scopes the entry to a subject.
    #[must_use]
    pub fn with_subject(mut self, subject: Option<SubjectId>) -> Self {
        self.subject_id = subject;
        self
    }

    pub const fn kind(&self) -> ToolKind {
        P::KIND
    }

    /// Whether the entry is still in progress.
    pub const fn is_open(&self) -> bool {
        P::OPEN_ENDED && self.end_time.is_none()
    }

    /// Recorded length of the entry, if it has one.
    pub fn duration(&self) -> Option<Duration> {
        if let Some(end) = self.end_time {
            return Some(end - self.timestamp);
        }
        self.duration_seconds.map(Duration::seconds)
    }

    /// Whether the entry belongs to `subject` (legacy entries belong to everyone).
    pub fn visible_to(&self, subject: Option<&SubjectId>) -> bool {
        match (subject, &self.subject_id) {
            (None, _) | (_, None) => true,
            (Some(active), Some(owner)) => active == owner,
        }
    }

    /// Serializes the entry into its storage form.
    pub fn to_record(&self) -> Result<LogRecord, RecordError> {
        Ok(LogRecord {
            id: self.id.to_string(),
            kind: P::KIND,
            timestamp_ms: self.timestamp.timestamp_millis(),
            end_time_ms: self.end_time.map(|t| t.timestamp_millis()),
            duration_seconds: self.duration_seconds,
            duration_minutes: self.duration_minutes,
            subject_id: self.subject_id.as_ref().map(ToString::to_string),
            data: serde_json::to_string(&self.payload)?,
        })
    }

    /// Rebuilds an entry from its storage form.
    pub fn from_record(record: &LogRecord) -> Result<Self, RecordError> {
        if record.kind != P::KIND {
            return Err(RecordError::KindMismatch {
                expected: P::KIND,
                found: record.kind,
            });
        }
        let timestamp = millis_to_datetime(record.timestamp_ms)?;
        let end_time = record.end_time_ms.map(millis_to_datetime).transpose()?;
        let subject_id = record
            .subject_id
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(SubjectId::new)
            .transpose()?;
        Ok(Self {
            id: LogId::new(record.id.clone())?,
            timestamp,
            end_time,
            duration_seconds: record.duration_seconds,
            duration_minutes: record.duration_minutes,
            subject_id,
            payload: serde_json::from_str(&record.data)?,
        })
    }
}

fn millis_to_datetime(ms: i64) -> Result<DateTime<Utc>, RecordError> {
    DateTime::from_timestamp_millis(ms).ok_or(RecordError::TimestampOutOfRange(ms))
}

/// Completion data merged into an entry by [`LogStore::update_matching`].
///
/// [`LogStore::update_matching`]: crate::store::LogStore::update_matching
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LogPatch {
    pub end_time: Option<DateTime<Utc>>,
    pub duration_seconds: Option<i64>,
    pub duration_minutes: Option<i64>,
}

impl LogPatch {
    /// Patch closing an entry that started at `start` at `end`.
    pub fn close(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, ValidationError> {
        let start = truncate_to_millis(start);
        let end = truncate_to_millis(end);
        if end <= start {
            return Err(ValidationError::EndNotAfterStart { start, end });
        }
        let elapsed = end - start;
        Ok(Self {
            end_time: Some(end),
            duration_seconds: Some(elapsed.num_seconds()),
            duration_minutes: Some(elapsed.num_minutes()),
        })
    }

    /// Merges the set fields into `log`.
    pub fn apply<P>(&self, log: &mut ActivityLog<P>) {
        if let Some(end) = self.end_time {
            log.end_time = Some(end);
        }
        if let Some(seconds) = self.duration_seconds {
            log.duration_seconds = Some(seconds);
        }
        if let Some(minutes) = self.duration_minutes {
            log.duration_minutes = Some(minutes);
        }
    }
}

/// Storage form of a log entry, shared by all backends.
///
/// Timestamps are epoch milliseconds so they round-trip exactly; the payload
/// is JSON in `data`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub id: String,
    pub kind: ToolKind,
    pub timestamp_ms: i64,
    pub end_time_ms: Option<i64>,
    pub duration_seconds: Option<i64>,
    pub duration_minutes: Option<i64>,
    pub subject_id: Option<String>,
    pub data: String,
}

/// Errors converting between entries and records.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("payload JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("expected a {expected} record, found {found}")]
    KindMismatch { expected: ToolKind, found: ToolKind },
    #[error("timestamp out of range: {0} ms")]
    TimestampOutOfRange(i64),
}
