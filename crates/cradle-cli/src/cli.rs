//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use cradle_core::{FeedType, MAX_TREND_DAYS, Side, ToolKind, VolumeUnit};

/// Infant activity log.
///
/// Records feedings, breastfeeding sessions and sleep, and summarizes them
/// as daily totals, trends and a timeline.
#[derive(Debug, Parser)]
#[command(name = "cradle", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Baby the logs belong to (overrides `active_baby`).
    #[arg(short, long, global = true)]
    pub baby: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Log a bottle feeding.
    Feed {
        /// Amount fed.
        amount: f64,

        /// Volume unit (ml or oz). Defaults to the configured unit.
        #[arg(short, long)]
        unit: Option<VolumeUnit>,

        /// What was fed: formula, breast-milk, cow or water.
        #[arg(short = 't', long = "type", default_value = "formula")]
        feed_type: FeedType,

        /// When it happened (ISO 8601 or e.g. '20 minutes ago'). Defaults to now.
        #[arg(long)]
        at: Option<String>,
    },

    /// Breastfeeding sessions.
    #[command(subcommand)]
    Nurse(NurseAction),

    /// Sleep tracking.
    #[command(subcommand)]
    Sleep(SleepAction),

    /// Show the current state at a glance.
    Status {
        /// Keep refreshing every minute.
        #[arg(long)]
        watch: bool,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show daily totals for the last days.
    Trend {
        /// What to chart.
        #[arg(value_enum)]
        metric: TrendMetric,

        /// Number of days, ending today.
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..=i64::from(MAX_TREND_DAYS)))]
        days: Option<u32>,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Draw events on a timeline.
    Timeline {
        /// Calendar day to show (YYYY-MM-DD). Defaults to a rolling 24 hours.
        #[arg(long)]
        day: Option<String>,

        /// Width of the chart in columns.
        #[arg(long, default_value_t = 48)]
        width: usize,
    },

    /// List recorded logs, newest first.
    Logs {
        /// Tool to list: feeding, breastfeeding or sleep.
        kind: ToolKind,

        /// Show at most this many entries.
        #[arg(long)]
        limit: Option<usize>,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },
}

/// Breastfeeding actions.
#[derive(Debug, Subcommand)]
pub enum NurseAction {
    /// Log an instant session on one side.
    Log {
        /// Side (L or R).
        side: Side,

        /// When it happened. Defaults to now.
        #[arg(long)]
        at: Option<String>,
    },

    /// Run a live timer; type p to pause, r to resume, s to stop, q to discard.
    Timer {
        /// Side (L or R).
        side: Side,
    },

    /// Record a past session.
    Manual {
        /// Side (L or R).
        #[arg(long)]
        side: Side,

        /// Session start.
        #[arg(long)]
        start: String,

        /// Session end; must be after the start.
        #[arg(long)]
        end: String,
    },

    /// Show which side to offer next.
    Next,
}

/// Sleep actions.
#[derive(Debug, Subcommand)]
pub enum SleepAction {
    /// Start a sleep now (or at --at).
    Start {
        #[arg(long)]
        at: Option<String>,
    },

    /// End the sleep in progress.
    Wake {
        #[arg(long)]
        at: Option<String>,
    },

    /// Record a past sleep.
    Manual {
        #[arg(long)]
        start: String,

        #[arg(long)]
        end: String,
    },
}

/// Metrics that can be charted as a trend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TrendMetric {
    /// Minutes of sleep per day.
    Sleep,
    /// Milk volume per day.
    Milk,
    /// Minutes of breastfeeding per day.
    Nursing,
}
