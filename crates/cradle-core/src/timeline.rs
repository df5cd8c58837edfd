//! Timeline layout: maps events onto a bounded window as percentages.
//!
//! Positions are clamped to `[0, 100]` so events reaching past either edge
//! stay visible, and widths are floored so instant events remain
//! inspectable. Bars keep their input order; overlapping bars simply stack.

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Timelike, Utc};
use serde::Serialize;

use crate::aggregate::local_day_span;
use crate::log::{ActivityLog, ToolKind, ToolPayload};

/// Layout parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimelineConfig {
    /// Total span of a rolling window.
    pub span: Duration,
    /// Fraction of the span kept ahead of "now" on a rolling window.
    pub forward_buffer: f64,
    /// Minimum bar width, as a percentage of the span.
    pub min_width: f64,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            span: Duration::hours(24),
            forward_buffer: 0.1,
            min_width: 1.5,
        }
    }
}

/// A bounded time range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: DateTime<Utc>,
    pub span: Duration,
}

impl Window {
    /// A window of `span` ending `forward_buffer * span` after `now`.
    pub fn rolling(now: DateTime<Utc>, span: Duration, forward_buffer: f64) -> Self {
        let buffer_ratio = if forward_buffer.is_finite() {
            forward_buffer.clamp(0.0, 1.0)
        } else {
            0.0
        };
        #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
        let buffer = Duration::milliseconds((span.num_milliseconds() as f64 * buffer_ratio) as i64);
        let end = now + buffer;
        Self {
            start: end - span,
            span,
        }
    }

    /// Local midnight of `date` up to the next local midnight.
    pub fn calendar_day<Tz: TimeZone>(date: NaiveDate, tz: &Tz) -> Self {
        let (start, end) = local_day_span(date, tz);
        Self {
            start,
            span: end - start,
        }
    }

    /// Saturates at the latest representable instant.
    pub fn end(&self) -> DateTime<Utc> {
        self.start
            .checked_add_signed(self.span)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant < self.end()
    }
}

/// Anything that can be drawn on a timeline.
pub trait TimedEvent {
    fn kind(&self) -> ToolKind;

    /// When the event started.
    fn start(&self) -> DateTime<Utc>;

    /// Recorded length; `None` for events without one.
    fn recorded_duration(&self) -> Option<Duration>;

    /// Whether the event is still in progress.
    fn is_live(&self) -> bool;
}

impl<P: ToolPayload> TimedEvent for ActivityLog<P> {
    fn kind(&self) -> ToolKind {
        P::KIND
    }

    fn start(&self) -> DateTime<Utc> {
        self.timestamp
    }

    fn recorded_duration(&self) -> Option<Duration> {
        self.duration()
    }

    fn is_live(&self) -> bool {
        self.is_open()
    }
}

impl<T: TimedEvent + ?Sized> TimedEvent for &T {
    fn kind(&self) -> ToolKind {
        (**self).kind()
    }

    fn start(&self) -> DateTime<Utc> {
        (**self).start()
    }

    fn recorded_duration(&self) -> Option<Duration> {
        (**self).recorded_duration()
    }

    fn is_live(&self) -> bool {
        (**self).is_live()
    }
}

/// A kind-erased event, for mixing logs of different tools on one timeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventSpan {
    pub kind: ToolKind,
    pub start: DateTime<Utc>,
    pub duration: Option<Duration>,
    pub live: bool,
}

impl EventSpan {
    pub fn of<E: TimedEvent>(event: &E) -> Self {
        Self {
            kind: event.kind(),
            start: event.start(),
            duration: event.recorded_duration(),
            live: event.is_live(),
        }
    }
}

impl TimedEvent for EventSpan {
    fn kind(&self) -> ToolKind {
        self.kind
    }

    fn start(&self) -> DateTime<Utc> {
        self.start
    }

    fn recorded_duration(&self) -> Option<Duration> {
        self.duration
    }

    fn is_live(&self) -> bool {
        self.live
    }
}

/// A laid-out event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelineBar {
    pub kind: ToolKind,
    pub start: DateTime<Utc>,
    /// Left edge, percent of the window.
    pub left: f64,
    /// Width, percent of the window.
    pub width: f64,
    /// Still in progress; width grows with every refresh.
    pub live: bool,
}

/// An hour gridline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HourMark {
    /// Local hour of day.
    pub hour: u32,
    pub position: f64,
}

/// Maps instants and durations onto a [`Window`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimelineMapper {
    window: Window,
    min_width: f64,
}

impl TimelineMapper {
    pub const fn new(window: Window, min_width: f64) -> Self {
        Self { window, min_width }
    }

    /// Rolling window around `now` using `config`.
    pub fn rolling(now: DateTime<Utc>, config: &TimelineConfig) -> Self {
        Self::new(
            Window::rolling(now, config.span, config.forward_buffer),
            config.min_width,
        )
    }

    /// Calendar-day window for `date` using `config`'s minimum width.
    pub fn calendar_day<Tz: TimeZone>(date: NaiveDate, tz: &Tz, config: &TimelineConfig) -> Self {
        Self::new(Window::calendar_day(date, tz), config.min_width)
    }

    pub const fn window(&self) -> &Window {
        &self.window
    }

    /// Percentage offset of `instant` from the window start, clamped to `[0, 100]`.
    #[allow(clippy::cast_precision_loss)]
    pub fn position(&self, instant: DateTime<Utc>) -> f64 {
        let span_ms = self.window.span.num_milliseconds();
        if span_ms <= 0 {
            return 0.0;
        }
        let offset_ms = (instant - self.window.start).num_milliseconds();
        (offset_ms as f64 / span_ms as f64 * 100.0).clamp(0.0, 100.0)
    }

    /// Percentage of the window covered by `duration`, floored at the minimum width.
    #[allow(clippy::cast_precision_loss)]
    pub fn width(&self, duration: Duration) -> f64 {
        let span_ms = self.window.span.num_milliseconds();
        if span_ms <= 0 {
            return self.min_width;
        }
        let ratio = duration.num_milliseconds().max(0) as f64 / span_ms as f64 * 100.0;
        ratio.max(self.min_width).min(100.0)
    }

    /// Duration used for layout: live events extend to `now`.
    pub fn effective_duration<E: TimedEvent>(event: &E, now: DateTime<Utc>) -> Duration {
        if event.is_live() {
            (now - event.start()).max(Duration::zero())
        } else {
            event.recorded_duration().unwrap_or_else(Duration::zero)
        }
    }

    /// Lays out `events` that start at or after the window start, in input order.
    pub fn layout<E, I>(&self, events: I, now: DateTime<Utc>) -> Vec<TimelineBar>
    where
        E: TimedEvent,
        I: IntoIterator<Item = E>,
    {
        events
            .into_iter()
            .filter(|event| event.start() >= self.window.start)
            .map(|event| TimelineBar {
                kind: event.kind(),
                start: event.start(),
                left: self.position(event.start()),
                width: self.width(Self::effective_duration(&event, now)),
                live: event.is_live(),
            })
            .collect()
    }

    /// Positions of every `step_hours`-th local whole hour inside the window.
    pub fn hour_marks<Tz: TimeZone>(&self, tz: &Tz, step_hours: u32) -> Vec<HourMark> {
        let step = step_hours.max(1);
        let local_start = self.window.start.with_timezone(tz).naive_local();
        let Some(mut naive) = local_start
            .date()
            .and_hms_opt(local_start.hour(), 0, 0)
        else {
            return Vec::new();
        };

        let end = self.window.end();
        let mut marks = Vec::new();
        for _ in 0..=self.window.span.num_hours().saturating_add(1) {
            // Local hours skipped by a DST jump have no instant.
            if let Some(instant) = tz.from_local_datetime(&naive).earliest() {
                let instant = instant.with_timezone(&Utc);
                if instant >= end {
                    break;
                }
                if instant >= self.window.start && naive.hour() % step == 0 {
                    marks.push(HourMark {
                        hour: naive.hour(),
                        position: self.position(instant),
                    });
                }
            }
            let Some(next) = naive.checked_add_signed(Duration::hours(1)) else {
                break;
            };
            naive = next;
        }
        marks
    }
}
