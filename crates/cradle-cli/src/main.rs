use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{Local, Utc};
use clap::Parser;
use cradle_core::{FeedingPayload, SubjectId, TimelineMapper};
use tracing_subscriber::EnvFilter;

use cradle_cli::commands::util::{parse_at, parse_datetime, parse_day, timezone_name};
use cradle_cli::commands::{Stores, feed, logs, nurse, sleep, status, timeline, trend};
use cradle_cli::{Cli, Commands, Config, NurseAction, SleepAction, TrendMetric};
use cradle_db::Database;

/// Load config and open database, ensuring the parent directory exists.
fn open_database(config_path: Option<&Path>) -> Result<(Database, Config)> {
    let config = Config::load_from(config_path).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");

    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent).context("failed to create database directory")?;
    }

    let db = Database::open(&config.database_path).context("failed to open database")?;
    if let Ok(counts) = db.count_by_kind() {
        tracing::debug!(?counts, "opened database");
    }
    Ok((db, config))
}

/// Warns when `--baby` names a baby nothing has been recorded for yet.
fn check_subject(db: &Database, subject: Option<&SubjectId>) {
    let Some(subject) = subject else { return };
    match db.list_subjects() {
        Ok(known) if !known.iter().any(|name| name == subject.as_str()) => {
            tracing::warn!(%subject, "no logs recorded for this baby yet");
        }
        Ok(_) => {}
        Err(err) => tracing::debug!(%err, "could not list babies"),
    }
}

#[expect(
    clippy::too_many_lines,
    reason = "CLI command dispatch is inherently verbose"
)]
fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    let Some(command) = &cli.command else {
        use clap::CommandFactory;
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    let (db, config) = open_database(cli.config.as_deref())?;
    let subject = config.subject(cli.baby.as_deref());
    check_subject(&db, subject.as_ref());

    let backend = &db;
    let mut stores = Stores::open(&backend, subject.as_ref())?;
    let now = Utc::now();
    let today = now.with_timezone(&Local).date_naive();
    let unit = config.volume_unit;
    let mut out = std::io::stdout().lock();

    match command {
        Commands::Feed {
            amount,
            unit: entered_unit,
            feed_type,
            at,
        } => {
            let payload =
                FeedingPayload::new(*amount, entered_unit.unwrap_or(unit), *feed_type)
                    .context("invalid feeding")?;
            let at = parse_at(at.as_deref(), now)?;
            feed::run(&mut out, &mut stores.feeds, payload, at, unit, &Local)?;
        }
        Commands::Nurse(action) => match action {
            NurseAction::Log { side, at } => {
                let at = parse_at(at.as_deref(), now)?;
                nurse::log(&mut out, &mut stores.nursing, *side, at, &Local)?;
            }
            NurseAction::Timer { side } => {
                let input = nurse::spawn_stdin_reader();
                nurse::timer(&mut out, &mut stores.nursing, *side, now, &input, Utc::now)?;
            }
            NurseAction::Manual { side, start, end } => {
                let start = parse_datetime(start, now)?;
                let end = parse_datetime(end, now)?;
                nurse::manual(&mut out, &mut stores.nursing, *side, start, end)?;
            }
            NurseAction::Next => nurse::next(&mut out, &stores.nursing)?,
        },
        Commands::Sleep(action) => match action {
            SleepAction::Start { at } => {
                let at = parse_at(at.as_deref(), now)?;
                sleep::start(&mut out, &mut stores.sleeps, at, &Local)?;
            }
            SleepAction::Wake { at } => {
                let at = parse_at(at.as_deref(), now)?;
                sleep::wake(&mut out, &mut stores.sleeps, at, &Local)?;
            }
            SleepAction::Manual { start, end } => {
                let start = parse_datetime(start, now)?;
                let end = parse_datetime(end, now)?;
                sleep::manual(&mut out, &mut stores.sleeps, start, end)?;
            }
        },
        Commands::Status { watch, json } => {
            if *watch {
                status::watch(
                    |now| {
                        // Reload so entries recorded by other invocations show up.
                        let stores = Stores::open(&backend, subject.as_ref())?;
                        write!(out, "\x1b[2J\x1b[H")?;
                        status::run(&mut out, &stores, subject.as_ref(), unit, &Local, now, *json)?;
                        out.flush()?;
                        Ok(())
                    },
                    None,
                )?;
            } else {
                status::run(&mut out, &stores, subject.as_ref(), unit, &Local, now, *json)?;
            }
        }
        Commands::Trend {
            metric,
            days,
            json,
        } => {
            let floor = match metric {
                TrendMetric::Sleep | TrendMetric::Nursing => config.sleep_trend_floor_minutes,
                TrendMetric::Milk => config.milk_trend_floor,
            };
            let (chart, measure) = trend::compute(
                &stores,
                *metric,
                today,
                &Local,
                config.trend(*days, floor),
                unit,
            );
            trend::run(&mut out, *metric, &chart, measure, *json)?;
        }
        Commands::Timeline { day, width } => {
            let layout = config.timeline();
            let mapper = match day {
                Some(day) => TimelineMapper::calendar_day(parse_day(day, today)?, &Local, &layout),
                None => TimelineMapper::rolling(now, &layout),
            };
            let zone = timezone_name();
            timeline::run(&mut out, &stores, &mapper, *width, &Local, &zone, now)?;
        }
        Commands::Logs { kind, limit, json } => {
            logs::run(&mut out, &stores, *kind, *limit, unit, &Local, *json)?;
        }
    }

    Ok(())
}
