//! `cradle trend`: per-day totals with bars.

use std::io::Write;

use anyhow::Result;
use chrono::{NaiveDate, TimeZone};
use cradle_core::{
    EnglishTranslator, LogBackend, Trend, TrendConfig, VolumeUnit, milk_volume, nursing_minutes,
    sleep_minutes_in_day, trend,
};
use serde::Serialize;

use super::Stores;
use super::util::{format_duration, format_volume, progress_bar};
use crate::cli::TrendMetric;

/// How trend values are shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Measure {
    Minutes,
    Volume(VolumeUnit),
}

impl Measure {
    #[allow(clippy::cast_possible_truncation)]
    fn format(self, value: f64) -> String {
        match self {
            Self::Minutes => format_duration((value * 60_000.0).round() as i64),
            Self::Volume(unit) => format_volume(value, unit),
        }
    }
}

#[derive(Serialize)]
struct TrendJson<'a> {
    metric: &'static str,
    unit: &'static str,
    #[serde(flatten)]
    trend: &'a Trend,
    average: f64,
}

/// Computes the trend for `metric` over the days ending on `today`.
pub fn compute<B: LogBackend, Tz: TimeZone>(
    stores: &Stores<B>,
    metric: TrendMetric,
    today: NaiveDate,
    tz: &Tz,
    config: TrendConfig,
    unit: VolumeUnit,
) -> (Trend, Measure) {
    let translator = EnglishTranslator;
    match metric {
        TrendMetric::Sleep => {
            let logs = stores.sleeps.all();
            let trend = trend(&logs, today, tz, config, &translator, |logs, day| {
                sleep_minutes_in_day(logs, day)
            });
            (trend, Measure::Minutes)
        }
        TrendMetric::Nursing => {
            let logs = stores.nursing.all();
            let trend = trend(&logs, today, tz, config, &translator, |logs, day| {
                nursing_minutes(logs, day)
            });
            (trend, Measure::Minutes)
        }
        TrendMetric::Milk => {
            let logs = stores.feeds.all();
            let trend = trend(&logs, today, tz, config, &translator, |logs, day| {
                milk_volume(logs, day, unit)
            });
            (trend, Measure::Volume(unit))
        }
    }
}

const fn metric_name(metric: TrendMetric) -> &'static str {
    match metric {
        TrendMetric::Sleep => "sleep",
        TrendMetric::Milk => "milk",
        TrendMetric::Nursing => "nursing",
    }
}

pub fn run<W: Write>(
    writer: &mut W,
    metric: TrendMetric,
    trend: &Trend,
    measure: Measure,
    json: bool,
) -> Result<()> {
    if json {
        let unit = match measure {
            Measure::Minutes => "minutes",
            Measure::Volume(unit) => unit.as_str(),
        };
        let out = TrendJson {
            metric: metric_name(metric),
            unit,
            trend,
            average: trend.average(),
        };
        writeln!(writer, "{}", serde_json::to_string_pretty(&out)?)?;
        return Ok(());
    }

    for bucket in &trend.buckets {
        writeln!(
            writer,
            "{} {}  {}  {}",
            bucket.label,
            bucket.date.format("%m-%d"),
            progress_bar(trend.ratio(bucket.value)),
            measure.format(bucket.value)
        )?;
    }
    writeln!(writer)?;
    writeln!(writer, "Average: {}", measure.format(trend.average()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::Utc;
    use cradle_core::{ActivityLog, FeedType, FeedingPayload, SleepPayload};
    use insta::assert_snapshot;

    use crate::commands::test_support::{at, memory_stores};

    #[test]
    fn sleep_trend_renders_bars() {
        let mut stores = memory_stores();
        for (start, end) in [
            ("2025-02-27T13:00:00Z", "2025-02-27T14:00:00Z"),
            ("2025-03-01T01:00:00Z", "2025-03-01T03:00:00Z"),
            ("2025-03-01T13:00:00Z", "2025-03-01T13:30:00Z"),
        ] {
            stores
                .sleeps
                .append(ActivityLog::completed(at(start), at(end), SleepPayload::default()).unwrap())
                .unwrap();
        }

        let today = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        let config = TrendConfig {
            days: 3,
            floor: 60.0,
        };
        let (trend, measure) =
            compute(&stores, TrendMetric::Sleep, today, &Utc, config, VolumeUnit::Ml);

        let mut output = Vec::new();
        run(&mut output, TrendMetric::Sleep, &trend, measure, false).unwrap();
        assert_snapshot!(String::from_utf8(output).unwrap().trim_end(), @r"
        Thu 02-27  ████░░░░░░  1h 0m
        Fri 02-28  ░░░░░░░░░░  0m
        Sat 03-01  ██████████  2h 30m

        Average: 1h 10m
        ");
    }

    #[test]
    fn milk_trend_skips_water_and_converts() {
        let mut stores = memory_stores();
        let feeds = [
            (120.0, VolumeUnit::Ml, FeedType::Formula),
            (2.0, VolumeUnit::Oz, FeedType::BreastMilk),
            (60.0, VolumeUnit::Ml, FeedType::Water),
        ];
        for (amount, unit, feed_type) in feeds {
            stores
                .feeds
                .append(ActivityLog::new(
                    at("2025-03-01T09:00:00Z"),
                    FeedingPayload::new(amount, unit, feed_type).unwrap(),
                ))
                .unwrap();
        }

        let today = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        let config = TrendConfig {
            days: 1,
            floor: 100.0,
        };
        let (trend, measure) =
            compute(&stores, TrendMetric::Milk, today, &Utc, config, VolumeUnit::Ml);
        assert_eq!(measure, Measure::Volume(VolumeUnit::Ml));
        assert!((trend.buckets[0].value - (120.0 + 2.0 * 29.573_5)).abs() < 1e-9);

        let mut output = Vec::new();
        run(&mut output, TrendMetric::Milk, &trend, measure, true).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&output).unwrap();
        assert_eq!(value["metric"], "milk");
        assert_eq!(value["unit"], "ml");
        assert_eq!(value["buckets"].as_array().unwrap().len(), 1);
        assert_eq!(value["buckets"][0]["label"], "Sat");
    }
}
