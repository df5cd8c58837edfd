//! At-a-glance state derived from the three logs.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::aggregate::{DayBounds, milk_volume};
use crate::log::{ActivityLog, FeedingPayload, NursingPayload, Side, SleepPayload, VolumeUnit};

/// Side to offer next: the opposite of the most recent session, left if none.
///
/// `logs` are newest first, as returned by [`crate::store::LogStore::all`].
pub fn next_side(logs: &[&ActivityLog<NursingPayload>]) -> Side {
    logs.first()
        .map_or(Side::Left, |latest| latest.payload.side.opposite())
}

/// Time elapsed since `latest`, never negative.
pub fn time_since(latest: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (now - latest).max(Duration::zero())
}

/// Sleep in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SleepState {
    pub since: DateTime<Utc>,
    #[serde(serialize_with = "serialize_minutes")]
    pub elapsed: Duration,
}

/// Snapshot shown by `status`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dashboard {
    pub last_feed: Option<ActivityLog<FeedingPayload>>,
    pub milk_today: f64,
    pub unit: VolumeUnit,
    pub next_side: Side,
    pub sleeping: Option<SleepState>,
    #[serde(serialize_with = "serialize_minutes_opt")]
    pub since_last_feed: Option<Duration>,
    #[serde(serialize_with = "serialize_minutes_opt")]
    pub since_last_nursing: Option<Duration>,
}

impl Dashboard {
    /// Builds the snapshot. Each slice is newest first.
    pub fn build(
        feeds: &[&ActivityLog<FeedingPayload>],
        nursing: &[&ActivityLog<NursingPayload>],
        sleeps: &[&ActivityLog<SleepPayload>],
        today: &DayBounds,
        unit: VolumeUnit,
        now: DateTime<Utc>,
    ) -> Self {
        let last_feed = feeds.first().map(|log| (*log).clone());
        let sleeping = sleeps
            .iter()
            .find(|log| log.is_open())
            .map(|open| SleepState {
                since: open.timestamp,
                elapsed: time_since(open.timestamp, now),
            });

        Self {
            since_last_feed: last_feed.as_ref().map(|log| time_since(log.timestamp, now)),
            last_feed,
            milk_today: milk_volume(feeds, today, unit),
            unit,
            next_side: next_side(nursing),
            sleeping,
            since_last_nursing: nursing
                .first()
                .map(|log| time_since(log.end_time.unwrap_or(log.timestamp), now)),
        }
    }
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn serialize_minutes<S: serde::Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_i64(value.num_minutes())
}

#[allow(clippy::ref_option)]
fn serialize_minutes_opt<S: serde::Serializer>(
    value: &Option<Duration>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match value {
        Some(duration) => serializer.serialize_some(&duration.num_minutes()),
        None => serializer.serialize_none(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::FeedType;

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn nursed(side: Side, start: &str) -> ActivityLog<NursingPayload> {
        ActivityLog::instant(at(start), NursingPayload { side, manual: true })
    }

    #[test]
    fn next_side_alternates() {
        assert_eq!(next_side(&[]), Side::Left);

        let left = nursed(Side::Left, "2025-03-01T08:00:00Z");
        assert_eq!(next_side(&[&left]), Side::Right);

        let right = nursed(Side::Right, "2025-03-01T10:00:00Z");
        assert_eq!(next_side(&[&right, &left]), Side::Left);
    }

    #[test]
    fn time_since_never_goes_negative() {
        let now = at("2025-03-01T10:00:00Z");
        assert_eq!(time_since(at("2025-03-01T09:15:00Z"), now), Duration::minutes(45));
        assert_eq!(time_since(at("2025-03-01T11:00:00Z"), now), Duration::zero());
    }

    #[test]
    fn dashboard_collects_current_state() {
        let now = at("2025-03-01T14:00:00Z");
        let today = DayBounds::for_date(now.date_naive(), &Utc);

        let formula = FeedingPayload::new(120.0, VolumeUnit::Ml, FeedType::Formula).unwrap();
        let water = FeedingPayload::new(30.0, VolumeUnit::Ml, FeedType::Water).unwrap();
        let morning = ActivityLog::new(at("2025-03-01T07:00:00Z"), formula);
        let noon = ActivityLog::new(at("2025-03-01T12:00:00Z"), water);
        let yesterday = ActivityLog::new(at("2025-02-28T20:00:00Z"), formula);

        let nursing = ActivityLog::completed(
            at("2025-03-01T12:30:00Z"),
            at("2025-03-01T12:45:00Z"),
            NursingPayload {
                side: Side::Right,
                manual: false,
            },
        )
        .unwrap();
        let nap = ActivityLog::new(at("2025-03-01T13:20:00Z"), SleepPayload::default());

        let dashboard = Dashboard::build(
            &[&noon, &morning, &yesterday],
            &[&nursing],
            &[&nap],
            &today,
            VolumeUnit::Ml,
            now,
        );

        assert_eq!(dashboard.last_feed.as_ref().map(|l| l.id.clone()), Some(noon.id.clone()));
        assert!((dashboard.milk_today - 120.0).abs() < 1e-9);
        assert_eq!(dashboard.next_side, Side::Left);
        assert_eq!(dashboard.since_last_feed, Some(Duration::hours(2)));
        assert_eq!(dashboard.since_last_nursing, Some(Duration::minutes(75)));
        let sleeping = dashboard.sleeping.unwrap();
        assert_eq!(sleeping.since, at("2025-03-01T13:20:00Z"));
        assert_eq!(sleeping.elapsed, Duration::minutes(40));
    }

    #[test]
    fn empty_dashboard() {
        let now = at("2025-03-01T14:00:00Z");
        let today = DayBounds::for_date(now.date_naive(), &Utc);
        let dashboard = Dashboard::build(&[], &[], &[], &today, VolumeUnit::Oz, now);

        assert!(dashboard.last_feed.is_none());
        assert!(dashboard.milk_today.abs() < f64::EPSILON);
        assert_eq!(dashboard.next_side, Side::Left);
        assert!(dashboard.sleeping.is_none());
        assert!(dashboard.since_last_nursing.is_none());
    }
}
