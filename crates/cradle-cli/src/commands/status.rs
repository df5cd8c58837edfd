//! `cradle status`: the dashboard.

use std::cell::Cell;
use std::io::Write;
use std::rc::Rc;
use std::time::Duration as StdDuration;

use anyhow::Result;
use chrono::{DateTime, Duration, TimeZone, Utc};
use cradle_core::{
    Dashboard, DayBounds, EnglishTranslator, LogBackend, SubjectId, TickScheduler, VolumeUnit,
};

use super::util::{format_clock, format_duration, format_volume};
use super::{Describe, Stores, side_label};

/// Builds the dashboard for the local day containing `now`.
pub fn dashboard<B: LogBackend, Tz: TimeZone>(
    stores: &Stores<B>,
    unit: VolumeUnit,
    tz: &Tz,
    now: DateTime<Utc>,
) -> Dashboard {
    let today = DayBounds::for_date(now.with_timezone(tz).date_naive(), tz);
    Dashboard::build(
        &stores.feeds.all(),
        &stores.nursing.all(),
        &stores.sleeps.all(),
        &today,
        unit,
        now,
    )
}

pub fn run<W, B, Tz>(
    writer: &mut W,
    stores: &Stores<B>,
    subject: Option<&SubjectId>,
    unit: VolumeUnit,
    tz: &Tz,
    now: DateTime<Utc>,
    json: bool,
) -> Result<()>
where
    W: Write,
    B: LogBackend,
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let board = dashboard(stores, unit, tz, now);
    if json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&board)?)?;
        return Ok(());
    }
    render(writer, &board, subject, tz)
}

fn render<W, Tz>(
    writer: &mut W,
    board: &Dashboard,
    subject: Option<&SubjectId>,
    tz: &Tz,
) -> Result<()>
where
    W: Write,
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    match subject {
        Some(baby) => writeln!(writer, "Status for {baby}")?,
        None => writeln!(writer, "Status (all babies)")?,
    }
    writeln!(writer, "───────────────────")?;

    match (&board.last_feed, board.since_last_feed) {
        (Some(feed), Some(since)) => writeln!(
            writer,
            "Last feed:     {}, {} ({} ago)",
            format_clock(feed.timestamp, tz),
            feed.payload.describe(&EnglishTranslator, board.unit),
            format_duration(since.num_milliseconds())
        )?,
        _ => writeln!(writer, "Last feed:     none")?,
    }
    writeln!(
        writer,
        "Milk today:    {}",
        format_volume(board.milk_today, board.unit)
    )?;
    match board.since_last_nursing {
        Some(since) => writeln!(
            writer,
            "Last nursing:  {} ago",
            format_duration(since.num_milliseconds())
        )?,
        None => writeln!(writer, "Last nursing:  none")?,
    }
    writeln!(writer, "Next side:     {}", side_label(board.next_side))?;
    match board.sleeping {
        Some(sleep) => writeln!(
            writer,
            "Sleep:         sleeping since {} ({})",
            format_clock(sleep.since, tz),
            format_duration(sleep.elapsed.num_milliseconds())
        )?,
        None => writeln!(writer, "Sleep:         awake")?,
    }
    Ok(())
}

/// Calls `render` now and then once a minute, until it fails or
/// `refreshes` renders have happened.
pub fn watch<F>(mut render: F, refreshes: Option<usize>) -> Result<()>
where
    F: FnMut(DateTime<Utc>) -> Result<()>,
{
    let scheduler = TickScheduler::new();
    let due = Rc::new(Cell::new(true));
    let flag = Rc::clone(&due);
    let _ticker = scheduler.every(Duration::seconds(60), Utc::now(), move |_| flag.set(true));

    let mut remaining = refreshes;
    loop {
        let now = Utc::now();
        scheduler.run_due(now);
        if due.replace(false) {
            render(now)?;
            if let Some(left) = remaining.as_mut() {
                *left = left.saturating_sub(1);
                if *left == 0 {
                    return Ok(());
                }
            }
        }
        let wait = scheduler
            .next_deadline()
            .and_then(|deadline| (deadline - Utc::now()).to_std().ok())
            .unwrap_or(StdDuration::from_millis(100));
        std::thread::sleep(wait);
    }
}
