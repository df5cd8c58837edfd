//! CLI subcommand implementations.

use std::io::{IsTerminal, Write};

use anyhow::Context;
use cradle_core::{
    ActivityLog, EnglishTranslator, Feedback, FeedingPayload, LogBackend, LogStore,
    NursingPayload, SessionError, Side, SleepPayload, SubjectId, ToolPayload, Translator,
};

pub mod feed;
pub mod logs;
pub mod nurse;
pub mod sleep;
pub mod status;
pub mod timeline;
pub mod trend;
pub mod util;

/// The three per-tool stores, scoped to one subject.
pub struct Stores<B> {
    pub feeds: LogStore<FeedingPayload, B>,
    pub nursing: LogStore<NursingPayload, B>,
    pub sleeps: LogStore<SleepPayload, B>,
}

impl<B: LogBackend + Clone> Stores<B> {
    /// Loads all three tools from `backend`.
    pub fn open(backend: &B, subject: Option<&SubjectId>) -> anyhow::Result<Self> {
        Ok(Self {
            feeds: LogStore::open(backend.clone(), subject.cloned())
                .context("failed to load feeding logs")?,
            nursing: LogStore::open(backend.clone(), subject.cloned())
                .context("failed to load breastfeeding logs")?,
            sleeps: LogStore::open(backend.clone(), subject.cloned())
                .context("failed to load sleep logs")?,
        })
    }
}

/// Rings the terminal bell on stderr after a commit, when stderr is a terminal.
#[derive(Debug, Clone, Copy, Default)]
pub struct BellFeedback;

impl Feedback for BellFeedback {
    fn pulse(&self) {
        let mut stderr = std::io::stderr();
        if stderr.is_terminal() {
            let _ = stderr.write_all(b"\x07");
        }
    }
}

/// Retries a failed write once; other errors are returned as-is.
///
/// The entry is already in the store's memory, so a successful retry means
/// the commit went through and `feedback` pulses.
pub fn recover<P: ToolPayload, B: LogBackend, F: Feedback>(
    store: &mut LogStore<P, B>,
    err: SessionError,
    feedback: &F,
) -> anyhow::Result<()> {
    match err {
        SessionError::Store(source) if source.is_recoverable() => {
            tracing::warn!(error = %source, "write failed, retrying");
            let flushed = store.flush().context("failed to save log")?;
            tracing::debug!(flushed, "retry succeeded");
            feedback.pulse();
            Ok(())
        }
        other => Err(other.into()),
    }
}

/// One-line description of a log's payload.
pub trait Describe {
    fn describe(&self, translator: &dyn Translator, unit: cradle_core::VolumeUnit) -> String;
}

impl Describe for FeedingPayload {
    fn describe(&self, translator: &dyn Translator, unit: cradle_core::VolumeUnit) -> String {
        format!(
            "{} {}",
            util::format_volume(self.amount_in(unit), unit),
            translator.t(&format!("feed.{}", self.feed_type.as_str())).to_lowercase()
        )
    }
}

impl Describe for NursingPayload {
    fn describe(&self, translator: &dyn Translator, _unit: cradle_core::VolumeUnit) -> String {
        translator.t(&format!("side.{}", self.side.as_str()))
    }
}

impl Describe for SleepPayload {
    fn describe(&self, translator: &dyn Translator, _unit: cradle_core::VolumeUnit) -> String {
        translator.t("tool.sleep")
    }
}

/// Display name of a breast side.
pub fn side_label(side: Side) -> String {
    EnglishTranslator.t(&format!("side.{}", side.as_str()))
}

/// Length of a log for display, `None` for instant entries.
pub fn length_of<P: ToolPayload>(log: &ActivityLog<P>) -> Option<String> {
    log.duration()
        .filter(|d| *d > chrono::Duration::zero())
        .map(|d| util::format_duration(d.num_milliseconds()))
}

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::{DateTime, Utc};
    use cradle_core::MemoryBackend;

    use super::Stores;

    pub fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    /// Empty, unscoped stores with in-memory backends.
    pub fn memory_stores() -> Stores<MemoryBackend> {
        Stores {
            feeds: cradle_core::LogStore::open(MemoryBackend::new(), None).unwrap(),
            nursing: cradle_core::LogStore::open(MemoryBackend::new(), None).unwrap(),
            sleeps: cradle_core::LogStore::open(MemoryBackend::new(), None).unwrap(),
        }
    }
}
