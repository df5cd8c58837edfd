//! A zone with real DST changes for tests that cannot rely on the host's `TZ`.

use chrono::{
    Duration, FixedOffset, MappedLocalTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone,
};

/// US Eastern time with the 2025 rules: EDT from 2025-03-09T07:00Z until
/// 2025-11-02T06:00Z, EST otherwise.
#[derive(Debug, Clone, Copy)]
pub struct Eastern2025;

fn est() -> FixedOffset {
    FixedOffset::west_opt(5 * 3600).unwrap()
}

fn edt() -> FixedOffset {
    FixedOffset::west_opt(4 * 3600).unwrap()
}

fn utc(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M").unwrap()
}

impl TimeZone for Eastern2025 {
    type Offset = FixedOffset;

    fn from_offset(_offset: &FixedOffset) -> Self {
        Self
    }

    fn offset_from_local_date(&self, local: &NaiveDate) -> MappedLocalTime<FixedOffset> {
        self.offset_from_local_datetime(&local.and_time(NaiveTime::MIN))
    }

    fn offset_from_local_datetime(&self, local: &NaiveDateTime) -> MappedLocalTime<FixedOffset> {
        let fits = |offset: FixedOffset| {
            let instant = *local - Duration::seconds(i64::from(offset.local_minus_utc()));
            self.offset_from_utc_datetime(&instant) == offset
        };
        match (fits(edt()), fits(est())) {
            (true, true) => MappedLocalTime::Ambiguous(edt(), est()),
            (true, false) => MappedLocalTime::Single(edt()),
            (false, true) => MappedLocalTime::Single(est()),
            (false, false) => MappedLocalTime::None,
        }
    }

    fn offset_from_utc_date(&self, utc: &NaiveDate) -> FixedOffset {
        self.offset_from_utc_datetime(&utc.and_time(NaiveTime::MIN))
    }

    fn offset_from_utc_datetime(&self, instant: &NaiveDateTime) -> FixedOffset {
        if *instant >= utc("2025-03-09T07:00") && *instant < utc("2025-11-02T06:00") {
            edt()
        } else {
            est()
        }
    }
}
