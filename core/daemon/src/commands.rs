//! One-shot CLI commands.
//!
//! With no daemon running, each command builds an engine over the store,
//! acts, and saves through `shutdown`. While a daemon owns the store,
//! changes are queued for it (see `intents`) and `status` reads a copy
//! without writing back.

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use workday_core::{
    HistorySummary, MemoryPersistence, NoLockSource, Persistence, Settings, StatusSnapshot,
    WorkdayEngine,
};

use crate::intents::{Intent, IntentQueue};
use crate::pidfile;
use crate::Host;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseAction {
    Pause,
    Resume,
    Toggle,
}

fn open_engine(host: &Host) -> Result<WorkdayEngine, String> {
    let settings = host.persistence().load_settings();
    Ok(WorkdayEngine::new(
        settings,
        Box::new(host.persistence()),
        Box::new(host.clock()),
        &NoLockSource,
    )?)
}

/// Engine over an in-memory copy of the store. Nothing it saves reaches disk.
fn open_read_only_engine(host: &Host) -> Result<WorkdayEngine, String> {
    let settings = host.persistence().load_settings();
    let copy = match std::fs::read_to_string(host.storage().sessions_file()) {
        Ok(raw) => MemoryPersistence::new().with_raw_sessions(&raw),
        Err(_) => MemoryPersistence::new(),
    };
    Ok(WorkdayEngine::new(
        settings,
        Box::new(copy),
        Box::new(host.clock()),
        &NoLockSource,
    )?)
}

fn running_daemon(host: &Host) -> Option<u32> {
    pidfile::running_daemon(&host.storage().daemon_pid_file())
}

/// Hands the request to the running daemon. Returns false if none is running.
fn forward_to_daemon(host: &Host, intent: Intent) -> Result<bool, String> {
    let Some(pid) = running_daemon(host) else {
        return Ok(false);
    };
    IntentQueue::new(host.storage()).push(intent)?;
    tracing::info!(?intent, pid, "Forwarded request to running daemon");
    Ok(true)
}

pub fn status(host: &Host, json: bool) -> Result<(), String> {
    let engine = if running_daemon(host).is_some() {
        open_read_only_engine(host)?
    } else {
        open_engine(host)?
    };
    let snapshot = engine.snapshot();
    engine.shutdown()?;

    if json {
        let rendered = serde_json::to_string_pretty(&snapshot)
            .map_err(|err| format!("Failed to serialize status: {}", err))?;
        println!("{}", rendered);
    } else {
        print!("{}", render_status(&snapshot));
    }
    Ok(())
}

pub fn pause(host: &Host, action: PauseAction) -> Result<(), String> {
    if forward_to_daemon(host, action.into())? {
        println!("Sent {:?} to the running daemon", action);
        return Ok(());
    }

    let mut engine = open_engine(host)?;
    let paused = match action {
        PauseAction::Pause => {
            engine.pause();
            true
        }
        PauseAction::Resume => {
            engine.resume();
            false
        }
        PauseAction::Toggle => engine.toggle_pause(),
    };
    engine.shutdown()?;
    println!("{}", if paused { "Paused" } else { "Running" });
    Ok(())
}

pub fn reset(host: &Host) -> Result<(), String> {
    if forward_to_daemon(host, Intent::Reset)? {
        println!("Sent Reset to the running daemon");
        return Ok(());
    }

    let mut engine = open_engine(host)?;
    engine.reset_day()?;
    let login = engine.login_time();
    engine.shutdown()?;
    println!("Day reset, logged in at {}", login.format("%H:%M"));
    Ok(())
}

pub fn history(host: &Host, month: Option<&str>) -> Result<(), String> {
    let filter = month.map(parse_month).transpose()?;
    let workday_minutes = host.persistence().load_settings().workday_minutes;
    let store = host.persistence().load_sessions();

    let sessions: Vec<_> = match filter {
        Some(first) => store.history_for_month(first.year(), first.month()),
        None => store.history.iter().collect(),
    };
    if sessions.is_empty() {
        println!("No history");
        return Ok(());
    }

    for session in &sessions {
        let login = session
            .first_login
            .map(|at| at.format("%H:%M").to_string())
            .unwrap_or_else(|| "--:--".to_string());
        let marker = if session.is_overtime(workday_minutes) {
            " +"
        } else {
            ""
        };
        println!(
            "{}  {}  worked {}  paused {}  lunch {}{}",
            session.date_key(),
            login,
            format_minutes(session.effective_minutes),
            format_minutes(session.paused_minutes),
            format_minutes(session.lunch_minutes),
            marker
        );
    }

    let summary = HistorySummary::from_sessions(sessions.iter().copied(), workday_minutes);
    let (hours, minutes) = summary.total_time();
    println!(
        "{} days, {}h {:02}m total, {} average, {} in overtime",
        summary.days,
        hours,
        minutes,
        format_minutes(summary.average_effective_minutes),
        summary.overtime_days
    );
    Ok(())
}

pub fn settings(host: &Host) -> Result<(), String> {
    let settings: Settings = host.persistence().load_settings();
    let rendered = serde_json::to_string_pretty(&settings)
        .map_err(|err| format!("Failed to serialize settings: {}", err))?;
    println!("{}", rendered);
    Ok(())
}

/// Parses "YYYY-MM" into the first day of that month.
fn parse_month(value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(&format!("{}-01", value.trim()), "%Y-%m-%d")
        .map_err(|_| format!("Invalid month {:?}, expected YYYY-MM", value))
}

fn format_minutes(minutes: f64) -> String {
    let total = minutes.max(0.0).floor() as u64;
    format!("{}h {:02}m", total / 60, total % 60)
}

fn format_clock(at: NaiveDateTime) -> String {
    at.format("%H:%M").to_string()
}

fn progress_bar(filled: u32, segments: u32) -> String {
    let filled = filled.min(segments) as usize;
    let empty = segments as usize - filled;
    format!("[{}{}]", "#".repeat(filled), "-".repeat(empty))
}

fn render_status(snapshot: &StatusSnapshot) -> String {
    let mut out = String::new();
    let state = if snapshot.is_paused {
        " (paused)"
    } else if snapshot.is_on_lunch_break {
        " (lunch)"
    } else {
        ""
    };

    out.push_str(&format!("Date        {}{}\n", snapshot.date, state));
    out.push_str(&format!("Logged in   {}\n", format_clock(snapshot.login_time)));
    out.push_str(&format!(
        "Worked      {}  {} {:.0}%\n",
        format_minutes(snapshot.effective_minutes),
        progress_bar(snapshot.filled_segments, snapshot.segments),
        snapshot.progress_percent
    ));
    out.push_str(&format!("Paused      {}\n", format_minutes(snapshot.paused_minutes)));
    out.push_str(&format!("Lunch       {}\n", format_minutes(snapshot.lunch_minutes)));
    if snapshot.is_overtime {
        out.push_str(&format!("Overtime    {}\n", format_minutes(snapshot.overtime_minutes)));
    } else {
        out.push_str(&format!(
            "Remaining   {}\n",
            format_minutes(snapshot.remaining_minutes)
        ));
        out.push_str(&format!("Est. end    {}\n", format_clock(snapshot.estimated_end)));
    }
    out
}
