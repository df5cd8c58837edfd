//! `cradle nurse`: breastfeeding logs and the live session timer.

use std::cell::Cell;
use std::io::{BufRead, Write};
use std::rc::Rc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::Duration as StdDuration;

use anyhow::Result;
use chrono::{DateTime, Duration, TimeZone, Utc};
use cradle_core::{
    ActivityLog, LogBackend, LogStore, NursingPayload, NursingTracker, SessionError, Side,
    TickGuard, TickScheduler, next_side,
};

use super::util::{format_clock, format_duration, format_elapsed};
use super::{BellFeedback, recover, side_label};

/// A line typed during a live session, stamped when it was read.
pub type TimedInput = (DateTime<Utc>, String);

/// Records an instant session.
pub fn log<W: Write, B: LogBackend, Tz>(
    writer: &mut W,
    store: &mut LogStore<NursingPayload, B>,
    side: Side,
    at: DateTime<Utc>,
    tz: &Tz,
) -> Result<()>
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let tracker = NursingTracker::new(BellFeedback);
    if let Err(err) = tracker.quick_log(store, side, at) {
        recover(store, err, &BellFeedback)?;
    }
    writeln!(
        writer,
        "Logged {} side at {}. Next: {}.",
        side_label(side),
        format_clock(at, tz),
        side_label(side.opposite())
    )?;
    Ok(())
}

/// Records a past session.
pub fn manual<W: Write, B: LogBackend>(
    writer: &mut W,
    store: &mut LogStore<NursingPayload, B>,
    side: Side,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<()> {
    let tracker = NursingTracker::new(BellFeedback);
    if let Err(err) = tracker.manual_entry(store, side, start, end) {
        recover(store, err, &BellFeedback)?;
    }
    writeln!(
        writer,
        "Logged {} {} session.",
        format_duration((end - start).num_milliseconds()),
        side_label(side)
    )?;
    Ok(())
}

/// Prints the side to offer next.
pub fn next<W: Write, B: LogBackend>(
    writer: &mut W,
    store: &LogStore<NursingPayload, B>,
) -> Result<()> {
    writeln!(writer, "Next side: {}", side_label(next_side(&store.all())))?;
    Ok(())
}

/// Forwards stdin lines, stamped on arrival, until EOF.
pub fn spawn_stdin_reader() -> Receiver<TimedInput> {
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if tx.send((Utc::now(), line)).is_err() {
                break;
            }
        }
    });
    rx
}

/// Runs a live session until it is stopped (`s`, or end of input) or discarded (`q`).
///
/// Commands take effect at the instant their line was read. The elapsed
/// display refreshes once a second while running and stops while paused.
pub fn timer<W, B, C>(
    writer: &mut W,
    store: &mut LogStore<NursingPayload, B>,
    side: Side,
    started_at: DateTime<Utc>,
    input: &Receiver<TimedInput>,
    clock: C,
) -> Result<Option<ActivityLog<NursingPayload>>>
where
    W: Write,
    B: LogBackend,
    C: Fn() -> DateTime<Utc>,
{
    let mut tracker = NursingTracker::new(BellFeedback);
    tracker.start(side, started_at)?;

    let scheduler = TickScheduler::new();
    let redraw = Rc::new(Cell::new(false));
    let mut ticker = Some(tick_every_second(&scheduler, &redraw, started_at));

    writeln!(
        writer,
        "Nursing {} side. [p]ause [r]esume [s]top [q]uit",
        side_label(side)
    )?;

    loop {
        let now = clock();
        scheduler.run_due(now);
        if redraw.replace(false) && ticker.is_some() {
            write!(writer, "\r{}", format_elapsed(tracker.timer().elapsed(now)))?;
            writer.flush()?;
        }

        let wait = scheduler
            .next_deadline()
            .and_then(|deadline| (deadline - now).to_std().ok())
            .unwrap_or(StdDuration::from_secs(1));

        let (at, line) = match input.recv_timeout(wait) {
            Ok(received) => received,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => (clock(), "s".to_string()),
        };

        let outcome = match line.trim() {
            "p" | "pause" => tracker.pause(at).map(|()| {
                ticker = None;
                format!(
                    "Paused at {}.",
                    format_elapsed(tracker.timer().elapsed(at))
                )
            }),
            "r" | "resume" => tracker.resume(at).map(|()| {
                ticker = Some(tick_every_second(&scheduler, &redraw, at));
                "Resumed.".to_string()
            }),
            "s" | "stop" => return finish(writer, store, &mut tracker, at),
            "q" | "quit" => {
                tracker.discard();
                writeln!(writer, "Session discarded.")?;
                return Ok(None);
            }
            "" => continue,
            other => Ok(format!("Unknown command: {other}")),
        };

        match outcome {
            Ok(message) => writeln!(writer, "{message}")?,
            Err(err) => writeln!(writer, "{err}")?,
        }
    }
}

fn tick_every_second(
    scheduler: &TickScheduler,
    redraw: &Rc<Cell<bool>>,
    now: DateTime<Utc>,
) -> TickGuard {
    let redraw = Rc::clone(redraw);
    scheduler.every(Duration::seconds(1), now, move |_| redraw.set(true))
}

fn finish<W: Write, B: LogBackend>(
    writer: &mut W,
    store: &mut LogStore<NursingPayload, B>,
    tracker: &mut NursingTracker<BellFeedback>,
    at: DateTime<Utc>,
) -> Result<Option<ActivityLog<NursingPayload>>> {
    match tracker.stop(store, at) {
        Ok(Some(entry)) => {
            let seconds = entry.duration_seconds.unwrap_or(0);
            writeln!(
                writer,
                "Saved {} side, {}.",
                side_label(entry.payload.side),
                format_elapsed(Duration::seconds(seconds))
            )?;
            Ok(Some(entry))
        }
        Ok(None) => {
            writeln!(writer, "Clock went backwards; nothing saved.")?;
            Ok(None)
        }
        Err(err @ SessionError::Store(_)) => {
            recover(store, err, &BellFeedback)?;
            writeln!(writer, "Saved after retry.")?;
            Ok(store.latest().cloned())
        }
        Err(err) => Err(err.into()),
    }
}
