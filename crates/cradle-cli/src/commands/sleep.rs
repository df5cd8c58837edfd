//! `cradle sleep`: start, wake and manual sleep entries.

use std::io::Write;

use anyhow::{Context, Result};
use chrono::{DateTime, TimeZone, Utc};
use cradle_core::{LogBackend, LogStore, SessionError, SleepPayload, SleepTracker};

use super::util::{format_clock, format_duration};
use super::{BellFeedback, recover};

pub fn start<W, B, Tz>(
    writer: &mut W,
    store: &mut LogStore<SleepPayload, B>,
    at: DateTime<Utc>,
    tz: &Tz,
) -> Result<()>
where
    W: Write,
    B: LogBackend,
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let tracker = SleepTracker::new(BellFeedback);
    match tracker.start(store, at) {
        Ok(_) => {}
        Err(SessionError::AlreadyRunning) => {
            let since = store
                .open_entry()
                .map_or_else(String::new, |open| format!(" since {}", format_clock(open.timestamp, tz)));
            anyhow::bail!("already sleeping{since}; run `cradle sleep wake` first");
        }
        Err(err) => recover(store, err, &BellFeedback)?,
    }
    writeln!(writer, "Sleep started at {}.", format_clock(at, tz))?;
    Ok(())
}

pub fn wake<W, B, Tz>(
    writer: &mut W,
    store: &mut LogStore<SleepPayload, B>,
    at: DateTime<Utc>,
    tz: &Tz,
) -> Result<()>
where
    W: Write,
    B: LogBackend,
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let started = store
        .open_entry()
        .map(|open| open.timestamp)
        .context("no sleep in progress")?;

    let tracker = SleepTracker::new(BellFeedback);
    if let Err(err) = tracker.wake(store, at) {
        recover(store, err, &BellFeedback)?;
    }
    writeln!(
        writer,
        "Woke at {} after {}.",
        format_clock(at, tz),
        format_duration((at - started).num_milliseconds())
    )?;
    Ok(())
}

pub fn manual<W: Write, B: LogBackend>(
    writer: &mut W,
    store: &mut LogStore<SleepPayload, B>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<()> {
    let tracker = SleepTracker::new(BellFeedback);
    if let Err(err) = tracker.manual_entry(store, start, end) {
        recover(store, err, &BellFeedback)?;
    }
    writeln!(
        writer,
        "Logged {} of sleep.",
        format_duration((end - start).num_milliseconds())
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use cradle_core::MemoryBackend;
    use insta::assert_snapshot;

    use crate::commands::test_support::at;

    #[test]
    fn start_then_wake() {
        let mut store = LogStore::open(MemoryBackend::new(), None).unwrap();
        let mut output = Vec::new();

        start(&mut output, &mut store, at("2025-03-01T13:00:00Z"), &Utc).unwrap();
        wake(&mut output, &mut store, at("2025-03-01T14:25:00Z"), &Utc).unwrap();

        assert_snapshot!(String::from_utf8(output).unwrap().trim_end(), @r"
        Sleep started at 13:00.
        Woke at 14:25 after 1h 25m.
        ");
        let nap = store.latest().unwrap();
        assert_eq!(nap.duration_minutes, Some(85));
        assert!(store.open_entry().is_none());
    }

    #[test]
    fn second_start_is_rejected_with_hint() {
        let mut store = LogStore::open(MemoryBackend::new(), None).unwrap();
        start(&mut Vec::new(), &mut store, at("2025-03-01T13:00:00Z"), &Utc).unwrap();

        let err = start(&mut Vec::new(), &mut store, at("2025-03-01T13:10:00Z"), &Utc)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "already sleeping since 13:00; run `cradle sleep wake` first"
        );
        assert_eq!(store.all().len(), 1);
    }

    #[test]
    fn wake_without_sleep_fails() {
        let mut store: LogStore<SleepPayload, _> =
            LogStore::open(MemoryBackend::new(), None).unwrap();
        let err = wake(&mut Vec::new(), &mut store, at("2025-03-01T13:00:00Z"), &Utc).unwrap_err();
        assert_eq!(err.to_string(), "no sleep in progress");
    }

    #[test]
    fn wake_before_start_is_rejected() {
        let mut store = LogStore::open(MemoryBackend::new(), None).unwrap();
        start(&mut Vec::new(), &mut store, at("2025-03-01T13:00:00Z"), &Utc).unwrap();
        assert!(wake(&mut Vec::new(), &mut store, at("2025-03-01T12:00:00Z"), &Utc).is_err());
        assert!(store.open_entry().is_some());
    }

    #[test]
    fn manual_sleep_is_recorded() {
        let mut store = LogStore::open(MemoryBackend::new(), None).unwrap();
        let mut output = Vec::new();
        manual(
            &mut output,
            &mut store,
            at("2025-03-01T01:00:00Z"),
            at("2025-03-01T04:30:00Z"),
        )
        .unwrap();
        assert_snapshot!(String::from_utf8(output).unwrap().trim_end(), @"Logged 3h 30m of sleep.");
        assert!(store.latest().unwrap().payload.manual);
    }
}
