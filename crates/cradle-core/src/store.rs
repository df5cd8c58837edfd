//! Per-tool, per-subject log collection.
//!
//! A [`LogStore`] keeps every entry of one tool kind in memory and writes
//! through to a [`LogBackend`]. Reads are filtered to the active subject and
//! always observe the latest in-memory state.
//!
//! # Persistence failures
//!
//! A failed write never rolls back the in-memory change. The affected entry
//! is queued and [`StoreError::Persist`] is returned so the caller can warn
//! the user or call [`LogStore::flush`] later.

use std::error::Error as StdError;

use thiserror::Error;

use crate::log::{ActivityLog, LogPatch, LogRecord, RecordError, ToolKind, ToolPayload};
use crate::types::{LogId, SubjectId};

type BoxError = Box<dyn StdError + Send + Sync>;

/// Storage errors surfaced by [`LogStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend could not be read.
    #[error("failed to load {kind} logs")]
    Load {
        kind: ToolKind,
        #[source]
        source: BoxError,
    },
    /// A stored record could not be decoded.
    #[error("invalid stored {kind} log {id}")]
    Corrupt {
        kind: ToolKind,
        id: String,
        #[source]
        source: RecordError,
    },
    /// A write failed; the in-memory change was kept and queued for retry.
    #[error("failed to persist {kind} log {id}")]
    Persist {
        kind: ToolKind,
        id: LogId,
        #[source]
        source: BoxError,
    },
}

impl StoreError {
    /// Whether the error left in-memory state intact and can be retried.
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::Persist { .. })
    }
}

/// Durable storage for log records.
pub trait LogBackend {
    type Error: StdError + Send + Sync + 'static;

    /// Returns every record of `kind` in insertion order.
    fn load(&self, kind: ToolKind) -> Result<Vec<LogRecord>, Self::Error>;

    /// Inserts or replaces a record by ID, keeping its original insertion position.
    fn save(&mut self, record: &LogRecord) -> Result<(), Self::Error>;
}

/// Volatile backend holding records in memory.
///
/// Writes can be made to fail on demand, which exercises the same recovery
/// path as a full disk.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    records: Vec<LogRecord>,
    fail_writes: bool,
}

/// Write rejected by a [`MemoryBackend`] with failures enabled.
#[derive(Debug, Error)]
#[error("memory backend rejected the write")]
pub struct MemoryWriteError;

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a backend pre-populated with `records`.
    pub const fn with_records(records: Vec<LogRecord>) -> Self {
        Self {
            records,
            fail_writes: false,
        }
    }

    /// Makes subsequent writes fail (or succeed again).
    pub const fn set_fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }

    pub fn records(&self) -> &[LogRecord] {
        &self.records
    }
}

impl LogBackend for MemoryBackend {
    type Error = MemoryWriteError;

    fn load(&self, kind: ToolKind) -> Result<Vec<LogRecord>, Self::Error> {
        Ok(self
            .records
            .iter()
            .filter(|r| r.kind == kind)
            .cloned()
            .collect())
    }

    fn save(&mut self, record: &LogRecord) -> Result<(), Self::Error> {
        if self.fail_writes {
            return Err(MemoryWriteError);
        }
        match self.records.iter_mut().find(|r| r.id == record.id) {
            Some(existing) => *existing = record.clone(),
            None => self.records.push(record.clone()),
        }
        Ok(())
    }
}

/// Collection of one tool's logs, scoped to the active subject.
#[derive(Debug)]
pub struct LogStore<P, B> {
    backend: B,
    subject: Option<SubjectId>,
    /// Every entry for this tool, in insertion order.
    entries: Vec<ActivityLog<P>>,
    /// Entries whose latest state has not reached the backend.
    pending: Vec<LogId>,
}

impl<P: ToolPayload, B: LogBackend> LogStore<P, B> {
    /// Loads all entries of `P`'s tool kind from `backend`.
    pub fn open(backend: B, subject: Option<SubjectId>) -> Result<Self, StoreError> {
        let records = backend.load(P::KIND).map_err(|e| StoreError::Load {
            kind: P::KIND,
            source: Box::new(e),
        })?;
        let entries = records
            .iter()
            .map(|record| {
                ActivityLog::from_record(record).map_err(|source| StoreError::Corrupt {
                    kind: P::KIND,
                    id: record.id.clone(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        tracing::debug!(kind = %P::KIND, count = entries.len(), "loaded logs");
        Ok(Self {
            backend,
            subject,
            entries,
            pending: Vec::new(),
        })
    }

    pub const fn subject(&self) -> Option<&SubjectId> {
        self.subject.as_ref()
    }

    /// Switches the active subject. Reads reflect the new scope immediately.
    pub fn set_subject(&mut self, subject: Option<SubjectId>) {
        self.subject = subject;
    }

    /// Appends a new entry, scoping it to the active subject if it has none.
    pub fn append(&mut self, mut entry: ActivityLog<P>) -> Result<(), StoreError> {
        if entry.subject_id.is_none() {
            entry.subject_id.clone_from(&self.subject);
        }
        let id = entry.id.clone();
        tracing::debug!(kind = %P::KIND, %id, timestamp = %entry.timestamp, "appending log");
        self.entries.push(entry);
        self.persist(&id)
    }

    /// Merges `patch` into every in-scope entry matching `predicate`.
    ///
    /// Returns how many entries were updated. Callers are expected to match a
    /// single entry, usually by [`ActivityLog::id`].
    pub fn update_matching<F>(&mut self, predicate: F, patch: &LogPatch) -> Result<usize, StoreError>
    where
        F: Fn(&ActivityLog<P>) -> bool,
    {
        let subject = self.subject.clone();
        let mut updated = Vec::new();
        for entry in &mut self.entries {
            if entry.visible_to(subject.as_ref()) && predicate(entry) {
                patch.apply(entry);
                updated.push(entry.id.clone());
            }
        }
        if updated.len() > 1 {
            tracing::warn!(kind = %P::KIND, count = updated.len(), "patch matched several logs");
        }

        let mut first_error = None;
        for id in &updated {
            if let Err(e) = self.persist(id) {
                first_error = first_error.or(Some(e));
            }
        }
        first_error.map_or(Ok(updated.len()), Err)
    }

    /// All in-scope entries, most recent first.
    ///
    /// Entries sharing a timestamp are ordered by insertion, latest first.
    pub fn all(&self) -> Vec<&ActivityLog<P>> {
        let mut visible: Vec<(usize, &ActivityLog<P>)> = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.visible_to(self.subject.as_ref()))
            .collect();
        visible.sort_by(|(ia, a), (ib, b)| b.timestamp.cmp(&a.timestamp).then(ib.cmp(ia)));
        visible.into_iter().map(|(_, e)| e).collect()
    }

    /// All in-scope entries in the order they were appended.
    pub fn in_insertion_order(&self) -> impl Iterator<Item = &ActivityLog<P>> {
        self.entries
            .iter()
            .filter(|e| e.visible_to(self.subject.as_ref()))
    }

    /// The most recent in-scope entry.
    pub fn latest(&self) -> Option<&ActivityLog<P>> {
        self.all().into_iter().next()
    }

    /// The most recent in-scope entry that is still in progress.
    pub fn open_entry(&self) -> Option<&ActivityLog<P>> {
        self.all().into_iter().find(|e| e.is_open())
    }

    /// Retries writes that previously failed. Returns how many were flushed.
    pub fn flush(&mut self) -> Result<usize, StoreError> {
        let queued = std::mem::take(&mut self.pending);
        let mut flushed = 0;
        let mut first_error = None;
        for id in &queued {
            match self.persist(id) {
                Ok(()) => flushed += 1,
                Err(e) => first_error = first_error.or(Some(e)),
            }
        }
        first_error.map_or(Ok(flushed), Err)
    }

    /// Number of entries waiting to be written.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub const fn backend(&self) -> &B {
        &self.backend
    }

    pub const fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    fn persist(&mut self, id: &LogId) -> Result<(), StoreError> {
        let Some(entry) = self.entries.iter().find(|e| &e.id == id) else {
            return Ok(());
        };
        let result = entry
            .to_record()
            .map_err(BoxError::from)
            .and_then(|record| self.backend.save(&record).map_err(BoxError::from));

        match result {
            Ok(()) => {
                self.pending.retain(|p| p != id);
                Ok(())
            }
            Err(source) => {
                tracing::warn!(kind = %P::KIND, %id, error = %source, "failed to persist log");
                if !self.pending.contains(id) {
                    self.pending.push(id.clone());
                }
                Err(StoreError::Persist {
                    kind: P::KIND,
                    id: id.clone(),
                    source,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, Utc};

    use super::*;
    use crate::log::{FeedType, FeedingPayload, NursingPayload, Side, SleepPayload, VolumeUnit};

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn baby(id: &str) -> SubjectId {
        SubjectId::new(id).unwrap()
    }

    fn nursing(side: Side) -> NursingPayload {
        NursingPayload {
            side,
            manual: true,
        }
    }

    fn nursing_store(subject: Option<SubjectId>) -> LogStore<NursingPayload, MemoryBackend> {
        LogStore::open(MemoryBackend::new(), subject).unwrap()
    }

    #[test]
    fn append_is_visible_immediately() {
        let mut store = nursing_store(Some(baby("a")));
        store
            .append(ActivityLog::instant(at("2025-03-01T08:00:00Z"), nursing(Side::Left)))
            .unwrap();

        let all = store.all();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].subject_id, Some(baby("a")));
        assert_eq!(store.backend().records().len(), 1);
    }

    #[test]
    fn all_orders_by_timestamp_descending_even_for_backdated_entries() {
        let mut store = nursing_store(None);
        store
            .append(ActivityLog::instant(at("2025-03-01T10:00:00Z"), nursing(Side::Left)))
            .unwrap();
        store
            .append(ActivityLog::instant(at("2025-03-01T08:00:00Z"), nursing(Side::Right)))
            .unwrap();
        store
            .append(ActivityLog::instant(at("2025-03-01T09:00:00Z"), nursing(Side::Left)))
            .unwrap();

        let times: Vec<_> = store.all().iter().map(|e| e.timestamp).collect();
        assert_eq!(
            times,
            vec![
                at("2025-03-01T10:00:00Z"),
                at("2025-03-01T09:00:00Z"),
                at("2025-03-01T08:00:00Z"),
            ]
        );
        assert_eq!(store.latest().unwrap().payload.side, Side::Left);
    }

    #[test]
    fn insertion_order_survives_reopen_and_respects_scope() {
        let mut store = nursing_store(Some(baby("a")));
        store
            .append(ActivityLog::instant(at("2025-03-01T10:00:00Z"), nursing(Side::Left)))
            .unwrap();
        store.set_subject(Some(baby("b")));
        store
            .append(ActivityLog::instant(at("2025-03-01T09:00:00Z"), nursing(Side::Left)))
            .unwrap();
        store.set_subject(Some(baby("a")));
        store
            .append(ActivityLog::instant(at("2025-03-01T08:00:00Z"), nursing(Side::Right)))
            .unwrap();

        let times: Vec<_> = store.in_insertion_order().map(|e| e.timestamp).collect();
        assert_eq!(times, vec![at("2025-03-01T10:00:00Z"), at("2025-03-01T08:00:00Z")]);

        let backend = std::mem::take(store.backend_mut());
        let reopened: LogStore<NursingPayload, _> =
            LogStore::open(backend, Some(baby("a"))).unwrap();
        let times: Vec<_> = reopened.in_insertion_order().map(|e| e.timestamp).collect();
        assert_eq!(times, vec![at("2025-03-01T10:00:00Z"), at("2025-03-01T08:00:00Z")]);
    }

    #[test]
    fn timestamp_ties_prefer_latest_insertion() {
        let mut store = nursing_store(None);
        let t = at("2025-03-01T08:00:00Z");
        store.append(ActivityLog::instant(t, nursing(Side::Left))).unwrap();
        store.append(ActivityLog::instant(t, nursing(Side::Right))).unwrap();

        assert_eq!(store.latest().unwrap().payload.side, Side::Right);
    }

    #[test]
    fn subject_filter_includes_legacy_entries() {
        let mut store = nursing_store(None);
        let t = at("2025-03-01T08:00:00Z");
        store.append(ActivityLog::instant(t, nursing(Side::Left))).unwrap();
        store
            .append(ActivityLog::instant(t, nursing(Side::Right)).with_subject(Some(baby("a"))))
            .unwrap();
        store
            .append(ActivityLog::instant(t, nursing(Side::Right)).with_subject(Some(baby("b"))))
            .unwrap();

        assert_eq!(store.all().len(), 3);

        store.set_subject(Some(baby("a")));
        let visible = store.all();
        assert_eq!(visible.len(), 2);
        assert!(visible.iter().all(|e| e.subject_id.as_ref() != Some(&baby("b"))));
    }

    #[test]
    fn update_matching_patches_only_matching_entry() {
        let mut store: LogStore<SleepPayload, _> =
            LogStore::open(MemoryBackend::new(), None).unwrap();
        let start = at("2025-03-01T08:00:00Z");
        let first = ActivityLog::new(start, SleepPayload::default());
        let second = ActivityLog::new(start, SleepPayload::default());
        let target = second.id.clone();
        store.append(first).unwrap();
        store.append(second).unwrap();

        let patch = LogPatch::close(start, start + Duration::minutes(45)).unwrap();
        let updated = store.update_matching(|e| e.id == target, &patch).unwrap();
        assert_eq!(updated, 1);

        let open: Vec<_> = store.all().into_iter().filter(|e| e.is_open()).collect();
        assert_eq!(open.len(), 1);
        assert_ne!(open[0].id, target);

        let saved = store
            .backend()
            .records()
            .iter()
            .find(|r| r.id == target.as_str())
            .unwrap();
        assert_eq!(saved.duration_minutes, Some(45));
    }

    #[test]
    fn update_matching_ignores_other_subjects() {
        let mut store: LogStore<SleepPayload, _> =
            LogStore::open(MemoryBackend::new(), Some(baby("b"))).unwrap();
        let start = at("2025-03-01T08:00:00Z");
        store
            .append(ActivityLog::new(start, SleepPayload::default()).with_subject(Some(baby("a"))))
            .unwrap();

        let patch = LogPatch::close(start, start + Duration::minutes(5)).unwrap();
        let updated = store.update_matching(|_| true, &patch).unwrap();
        assert_eq!(updated, 0);
    }

    #[test]
    fn persistence_failure_keeps_memory_and_can_be_flushed() {
        let mut backend = MemoryBackend::new();
        backend.set_fail_writes(true);
        let mut store: LogStore<FeedingPayload, _> = LogStore::open(backend, None).unwrap();

        let payload = FeedingPayload::new(100.0, VolumeUnit::Ml, FeedType::Formula).unwrap();
        let err = store
            .append(ActivityLog::new(at("2025-03-01T08:00:00Z"), payload))
            .unwrap_err();
        assert!(err.is_recoverable());
        assert_eq!(store.all().len(), 1);
        assert_eq!(store.pending(), 1);
        assert!(store.backend().records().is_empty());

        store.backend.set_fail_writes(false);
        assert_eq!(store.flush().unwrap(), 1);
        assert_eq!(store.pending(), 0);
        assert_eq!(store.backend().records().len(), 1);
    }

    #[test]
    fn reopen_restores_entries_from_backend() {
        let mut store = nursing_store(Some(baby("a")));
        store
            .append(ActivityLog::instant(at("2025-03-01T08:00:00Z"), nursing(Side::Left)))
            .unwrap();
        let records = store.backend().records().to_vec();

        let reopened: LogStore<NursingPayload, _> =
            LogStore::open(MemoryBackend::with_records(records), Some(baby("a"))).unwrap();
        assert_eq!(reopened.all().len(), 1);
        assert_eq!(reopened.latest().unwrap().payload.side, Side::Left);

        let sleep: LogStore<SleepPayload, _> =
            LogStore::open(MemoryBackend::with_records(store.backend().records().to_vec()), None)
                .unwrap();
        assert!(sleep.all().is_empty());
    }

    #[test]
    fn open_rejects_corrupt_records() {
        let record = LogRecord {
            id: "bad".to_string(),
            kind: ToolKind::Sleep,
            timestamp_ms: 0,
            end_time_ms: None,
            duration_seconds: None,
            duration_minutes: None,
            subject_id: None,
            data: "not json".to_string(),
        };
        let result: Result<LogStore<SleepPayload, _>, _> =
            LogStore::open(MemoryBackend::with_records(vec![record]), None);
        assert!(matches!(result, Err(StoreError::Corrupt { .. })));
    }
}
