//! `cradle logs`: list recorded entries.

use std::io::Write;

use anyhow::Result;
use chrono::TimeZone;
use cradle_core::{EnglishTranslator, LogBackend, LogStore, ToolKind, ToolPayload, VolumeUnit};

use super::util::format_datetime;
use super::{Describe, Stores, length_of};

/// Lists the logs of `kind`, newest first.
pub fn run<W, B, Tz>(
    writer: &mut W,
    stores: &Stores<B>,
    kind: ToolKind,
    limit: Option<usize>,
    unit: VolumeUnit,
    tz: &Tz,
    json: bool,
) -> Result<()>
where
    W: Write,
    B: LogBackend,
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let options = ListOptions { limit, unit, json };
    match kind {
        ToolKind::Feeding => list(writer, &stores.feeds, options, tz),
        ToolKind::Breastfeeding => list(writer, &stores.nursing, options, tz),
        ToolKind::Sleep => list(writer, &stores.sleeps, options, tz),
    }
}

#[derive(Debug, Clone, Copy)]
struct ListOptions {
    limit: Option<usize>,
    unit: VolumeUnit,
    json: bool,
}

fn list<W, P, B, Tz>(
    writer: &mut W,
    store: &LogStore<P, B>,
    options: ListOptions,
    tz: &Tz,
) -> Result<()>
where
    W: Write,
    P: ToolPayload + Describe,
    B: LogBackend,
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let mut logs = store.all();
    if let Some(limit) = options.limit {
        logs.truncate(limit);
    }

    if options.json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&logs)?)?;
        return Ok(());
    }

    if logs.is_empty() {
        writeln!(writer, "No {} logs.", P::KIND)?;
        return Ok(());
    }

    for log in logs {
        let mut line = format!(
            "{}  {}",
            format_datetime(log.timestamp, tz),
            log.payload.describe(&EnglishTranslator, options.unit)
        );
        if log.is_open() {
            line.push_str("  (in progress)");
        } else if let Some(length) = length_of(log) {
            line.push_str("  ");
            line.push_str(&length);
        }
        writeln!(writer, "{line}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::Utc;
    use cradle_core::{ActivityLog, FeedType, FeedingPayload, MemoryBackend, SleepPayload};
    use insta::assert_snapshot;

    use crate::commands::test_support::{at, memory_stores};

    fn listing(stores: &Stores<MemoryBackend>, kind: ToolKind, limit: Option<usize>) -> String {
        let mut output = Vec::new();
        run(&mut output, stores, kind, limit, VolumeUnit::Ml, &Utc, false).unwrap();
        String::from_utf8(output).unwrap()
    }

    #[test]
    fn lists_newest_first() {
        let mut stores = memory_stores();
        for (time, amount) in [("2025-03-01T08:15:00Z", 120.0), ("2025-03-01T11:30:00Z", 90.0)] {
            stores
                .feeds
                .append(ActivityLog::new(
                    at(time),
                    FeedingPayload::new(amount, VolumeUnit::Ml, FeedType::Formula).unwrap(),
                ))
                .unwrap();
        }

        assert_snapshot!(listing(&stores, ToolKind::Feeding, None).trim_end(), @r"
        2025-03-01 11:30  90 ml formula
        2025-03-01 08:15  120 ml formula
        ");
        assert_snapshot!(listing(&stores, ToolKind::Feeding, Some(1)).trim_end(), @"2025-03-01 11:30  90 ml formula");
    }

    #[test]
    fn marks_sleep_in_progress() {
        let mut stores = memory_stores();
        stores
            .sleeps
            .append(
                ActivityLog::completed(
                    at("2025-03-01T01:00:00Z"),
                    at("2025-03-01T04:30:00Z"),
                    SleepPayload::default(),
                )
                .unwrap(),
            )
            .unwrap();
        stores
            .sleeps
            .append(ActivityLog::new(at("2025-03-01T13:00:00Z"), SleepPayload::default()))
            .unwrap();

        assert_snapshot!(listing(&stores, ToolKind::Sleep, None).trim_end(), @r"
        2025-03-01 13:00  Sleep  (in progress)
        2025-03-01 01:00  Sleep  3h 30m
        ");
    }

    #[test]
    fn empty_listing() {
        let stores = memory_stores();
        assert_eq!(
            listing(&stores, ToolKind::Breastfeeding, None).trim_end(),
            "No breastfeeding logs."
        );
    }

    #[test]
    fn json_keeps_wire_fields() {
        let mut stores = memory_stores();
        stores
            .feeds
            .append(ActivityLog::new(
                at("2025-03-01T08:15:00Z"),
                FeedingPayload::new(4.0, VolumeUnit::Oz, FeedType::BreastMilk).unwrap(),
            ))
            .unwrap();

        let mut output = Vec::new();
        run(
            &mut output,
            &stores,
            ToolKind::Feeding,
            None,
            VolumeUnit::Ml,
            &Utc,
            true,
        )
        .unwrap();
        let value: serde_json::Value = serde_json::from_slice(&output).unwrap();
        let entry = &value[0];
        assert_eq!(entry["timestamp"], 1_740_816_900_000_i64);
        assert_eq!(entry["payload"]["unit"], "oz");
        assert!(entry.get("end_time").is_none());
    }
}
