//! `cradle feed`: log a bottle feeding.

use std::io::Write;

use anyhow::Result;
use chrono::{DateTime, TimeZone, Utc};
use cradle_core::{
    EnglishTranslator, FeedingPayload, FeedingTracker, LogBackend, LogStore, VolumeUnit,
};

use super::util::format_clock;
use super::{BellFeedback, Describe, recover};

pub fn run<W, B, Tz>(
    writer: &mut W,
    store: &mut LogStore<FeedingPayload, B>,
    payload: FeedingPayload,
    at: DateTime<Utc>,
    display_unit: VolumeUnit,
    tz: &Tz,
) -> Result<()>
where
    W: Write,
    B: LogBackend,
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let tracker = FeedingTracker::new(BellFeedback);
    if let Err(err) = tracker.log(store, payload, at) {
        recover(store, err, &BellFeedback)?;
    }
    writeln!(
        writer,
        "Logged {} at {}.",
        payload.describe(&EnglishTranslator, display_unit),
        format_clock(at, tz)
    )?;
    Ok(())
}
