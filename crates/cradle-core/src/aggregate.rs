//! Daily totals and multi-day trends.
//!
//! Everything here is a pure function of its inputs: no clock reads, no
//! store access. Empty input yields zeros.

use std::borrow::Borrow;

use chrono::{
    DateTime, Datelike, Days, Duration, NaiveDate, NaiveTime, TimeZone, Utc, Weekday,
};
use serde::Serialize;

use crate::i18n::Translator;
use crate::log::{ActivityLog, FeedingPayload, NursingPayload, SleepPayload, VolumeUnit};

/// Converts a local date at midnight to UTC.
///
/// Ambiguous midnights (DST fall-back) resolve to the earlier instant. A
/// midnight skipped by a spring-forward gap falls back to 1am local.
pub fn local_midnight_to_utc<Tz: TimeZone>(date: NaiveDate, tz: &Tz) -> DateTime<Utc> {
    let midnight = date.and_time(NaiveTime::MIN);
    if let Some(dt) = tz.from_local_datetime(&midnight).earliest() {
        return dt.with_timezone(&Utc);
    }
    let one_am = midnight + Duration::hours(1);
    tz.from_local_datetime(&one_am)
        .earliest()
        .map_or_else(|| Utc.from_utc_datetime(&midnight), |dt| dt.with_timezone(&Utc))
}

/// UTC instants of `date`'s local midnight and the following one.
///
/// The last representable date ends 24 hours after it starts, saturating
/// at the latest UTC instant.
pub fn local_day_span<Tz: TimeZone>(date: NaiveDate, tz: &Tz) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = local_midnight_to_utc(date, tz);
    let end = date.succ_opt().map_or_else(
        || {
            start
                .checked_add_signed(Duration::hours(24))
                .unwrap_or(DateTime::<Utc>::MAX_UTC)
        },
        |next| local_midnight_to_utc(next, tz),
    );
    (start, end)
}

/// A calendar day in local time: from its midnight up to the next day's
/// midnight, half-open. Spans 23 or 25 hours across DST changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DayBounds {
    pub date: NaiveDate,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DayBounds {
    pub fn for_date<Tz: TimeZone>(date: NaiveDate, tz: &Tz) -> Self {
        let (start, end) = local_day_span(date, tz);
        Self { date, start, end }
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant < self.end
    }
}

/// Sums `value` over entries starting within `day` that satisfy `predicate`.
pub fn daily_total<P, L, V, F>(logs: &[L], day: &DayBounds, value: V, predicate: F) -> f64
where
    L: Borrow<ActivityLog<P>>,
    V: Fn(&ActivityLog<P>) -> f64,
    F: Fn(&ActivityLog<P>) -> bool,
{
    logs.iter()
        .map(<L as Borrow<ActivityLog<P>>>::borrow)
        .filter(|log| day.contains(log.timestamp) && predicate(*log))
        .map(value)
        .sum()
}

/// Milk volume (water excluded) fed during `day`, in `unit`.
pub fn milk_volume<L>(logs: &[L], day: &DayBounds, unit: VolumeUnit) -> f64
where
    L: Borrow<ActivityLog<FeedingPayload>>,
{
    daily_total(
        logs,
        day,
        |log: &ActivityLog<FeedingPayload>| log.payload.amount_in(unit),
        |log: &ActivityLog<FeedingPayload>| log.payload.feed_type.is_milk(),
    )
}

/// Minutes of completed sleep that both started and ended within `day`.
pub fn sleep_minutes_in_day<L>(logs: &[L], day: &DayBounds) -> f64
where
    L: Borrow<ActivityLog<SleepPayload>>,
{
    daily_total(
        logs,
        day,
        |log: &ActivityLog<SleepPayload>| {
            let minutes = log
                .duration_minutes
                .or_else(|| log.duration().map(|d| d.num_minutes()))
                .unwrap_or(0);
            as_f64(minutes)
        },
        |log: &ActivityLog<SleepPayload>| log.end_time.is_some_and(|end| day.contains(end)),
    )
}

/// Minutes spent breastfeeding in sessions started within `day`.
pub fn nursing_minutes<L>(logs: &[L], day: &DayBounds) -> f64
where
    L: Borrow<ActivityLog<NursingPayload>>,
{
    daily_total(
        logs,
        day,
        |log: &ActivityLog<NursingPayload>| as_f64(log.duration_seconds.unwrap_or(0)) / 60.0,
        |_: &ActivityLog<NursingPayload>| true,
    )
}

#[allow(clippy::cast_precision_loss)]
fn as_f64(value: i64) -> f64 {
    value as f64
}

/// How many days a trend covers and the minimum chart scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrendConfig {
    /// Number of calendar days, ending today.
    pub days: u32,
    /// Lower bound for [`Trend::scale`], so near-zero data does not fill the chart.
    pub floor: f64,
}

impl Default for TrendConfig {
    fn default() -> Self {
        Self {
            days: 7,
            floor: 1.0,
        }
    }
}

/// One day of a trend.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendBucket {
    pub date: NaiveDate,
    pub label: String,
    pub value: f64,
}

/// Per-day values, oldest first, with a display scale.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trend {
    pub buckets: Vec<TrendBucket>,
    /// `max(largest value, floor)`.
    pub scale: f64,
}

impl Trend {
    /// `value` as a fraction of the scale, in `[0, 1]`.
    pub fn ratio(&self, value: f64) -> f64 {
        if self.scale <= 0.0 {
            return 0.0;
        }
        (value / self.scale).clamp(0.0, 1.0)
    }

    pub fn total(&self) -> f64 {
        self.buckets.iter().map(|b| b.value).sum()
    }

    pub fn average(&self) -> f64 {
        if self.buckets.is_empty() {
            return 0.0;
        }
        self.total() / as_f64(i64::try_from(self.buckets.len()).unwrap_or(i64::MAX))
    }
}

/// Longest trend computed; larger requests are clamped.
pub const MAX_TREND_DAYS: u32 = 366;

/// Computes `bucket` for each of the last `config.days` days ending on `today`.
///
/// At most [`MAX_TREND_DAYS`] buckets are produced, and days before the
/// earliest representable date are skipped.
pub fn trend<L, Tz, B>(
    logs: &[L],
    today: NaiveDate,
    tz: &Tz,
    config: TrendConfig,
    translator: &dyn Translator,
    bucket: B,
) -> Trend
where
    Tz: TimeZone,
    B: Fn(&[L], &DayBounds) -> f64,
{
    let buckets: Vec<TrendBucket> = (0..config.days.min(MAX_TREND_DAYS))
        .rev()
        .filter_map(|days_ago| today.checked_sub_days(Days::new(u64::from(days_ago))))
        .map(|date| {
            let day = DayBounds::for_date(date, tz);
            TrendBucket {
                date,
                label: translator.t(weekday_key(date.weekday())),
                value: bucket(logs, &day),
            }
        })
        .collect();

    let scale = buckets
        .iter()
        .map(|b| b.value)
        .fold(config.floor, f64::max);

    Trend { buckets, scale }
}

const fn weekday_key(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "weekday.mon",
        Weekday::Tue => "weekday.tue",
        Weekday::Wed => "weekday.wed",
        Weekday::Thu => "weekday.thu",
        Weekday::Fri => "weekday.fri",
        Weekday::Sat => "weekday.sat",
        Weekday::Sun => "weekday.sun",
    }
}
