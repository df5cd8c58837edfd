//! `cradle timeline`: one lane per tool, drawn in text columns.

use std::io::Write;

use anyhow::Result;
use chrono::{DateTime, TimeZone, Utc};
use cradle_core::{
    EnglishTranslator, EventSpan, LogBackend, TimelineBar, TimelineMapper, ToolKind, Translator,
};

use super::Stores;
use super::util::format_datetime;

const LABEL_WIDTH: usize = 13;
const EMPTY: char = '·';
const DONE: char = '█';
const LIVE: char = '▓';

/// Every event from all three tools, in the order each tool recorded them.
///
/// Later entries are drawn over earlier ones where bars overlap.
pub fn events<B: LogBackend>(stores: &Stores<B>) -> Vec<EventSpan> {
    let mut spans: Vec<EventSpan> = stores
        .feeds
        .in_insertion_order()
        .map(EventSpan::of)
        .collect();
    spans.extend(stores.nursing.in_insertion_order().map(EventSpan::of));
    spans.extend(stores.sleeps.in_insertion_order().map(EventSpan::of));
    spans
}

pub fn run<W, B, Tz>(
    writer: &mut W,
    stores: &Stores<B>,
    mapper: &TimelineMapper,
    columns: usize,
    tz: &Tz,
    zone: &str,
    now: DateTime<Utc>,
) -> Result<()>
where
    W: Write,
    B: LogBackend,
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let columns = columns.max(1);
    let window = mapper.window();
    let bars = mapper.layout(events(stores), now);
    tracing::debug!(bars = bars.len(), start = %window.start, "laid out timeline");

    writeln!(
        writer,
        "Timeline {} to {} ({zone})",
        format_datetime(window.start, tz),
        format_datetime(window.end(), tz)
    )?;
    writeln!(writer)?;

    let translator = EnglishTranslator;
    for kind in ToolKind::ALL {
        let label = translator.t(&format!("tool.{}", kind.as_str()));
        let lane = draw_lane(bars.iter().filter(|bar| bar.kind == kind), columns);
        writeln!(writer, "{label:<LABEL_WIDTH$} {lane}")?;
    }

    let axis = draw_axis(mapper, tz, columns);
    writeln!(writer, "{:<LABEL_WIDTH$} {axis}", "")?;
    writeln!(writer)?;
    writeln!(writer, "{DONE} done  {LIVE} in progress")?;
    Ok(())
}

/// Column index nearest to a percentage offset.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn column(percent: f64, columns: usize) -> usize {
    ((percent / 100.0 * columns as f64).round().max(0.0) as usize).min(columns)
}

fn draw_lane<'a, I>(bars: I, columns: usize) -> String
where
    I: Iterator<Item = &'a TimelineBar>,
{
    let mut cells = vec![EMPTY; columns];
    for bar in bars {
        let start = column(bar.left, columns).min(columns - 1);
        let end = column(bar.left + bar.width, columns).max(start + 1);
        let glyph = if bar.live { LIVE } else { DONE };
        for cell in &mut cells[start..end] {
            *cell = glyph;
        }
    }
    cells.into_iter().collect()
}

/// Hour labels every six hours; labels that would collide are dropped.
fn draw_axis<Tz: TimeZone>(mapper: &TimelineMapper, tz: &Tz, columns: usize) -> String {
    let mut axis = vec![' '; columns];
    let mut next_free = 0;
    for mark in mapper.hour_marks(tz, 6) {
        let at = column(mark.position, columns);
        let label = format!("{:02}", mark.hour);
        if at < next_free || at + label.len() > columns {
            continue;
        }
        for (offset, ch) in label.chars().enumerate() {
            axis[at + offset] = ch;
        }
        next_free = at + label.len() + 1;
    }
    axis.into_iter().collect::<String>().trim_end().to_string()
}
