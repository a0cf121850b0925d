//! Colored CLI display utilities for relayed process output.
//!
//! Child lines go to stdout; status lines are tagged and colored so they
//! stand out from the relayed text.

use std::io::{self, Write};

use chrono::Utc;
use owo_colors::OwoColorize;
use serde::Serialize;

use crate::stream::{OutputLine, ProcessEvent};

/// Get current timestamp in the same format as tracing.
fn timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
}

/// Plain-text rendering of a relayed line, without color.
#[must_use]
pub fn format_line(label: &str, line: &OutputLine) -> String {
    if line.is_err() {
        format!("{label} [{}]: {}", line.kind(), line.text())
    } else {
        format!("{label}: {}", line.text())
    }
}

/// Print a relayed line. Stderr lines are shown in red.
pub fn print_line(label: &str, line: &OutputLine, timestamps: bool) {
    let prefix = if timestamps {
        format!("{} ", timestamp().dimmed())
    } else {
        String::new()
    };
    if line.is_err() {
        println!("{prefix}{}", format_line(label, line).red());
    } else {
        println!("{prefix}{}", format_line(label, line));
    }
    let _ = io::stdout().flush();
}

#[derive(Serialize)]
struct JsonRecord<'a> {
    source: &'a str,
    timestamp: String,
    #[serde(flatten)]
    event: &'a ProcessEvent,
}

/// Print an event as a single JSON object.
pub fn print_json_event(label: &str, event: &ProcessEvent) {
    let record = JsonRecord {
        source: label,
        timestamp: timestamp(),
        event,
    };
    match serde_json::to_string(&record) {
        Ok(json) => println!("{json}"),
        Err(e) => tracing::warn!(error = %e, "Failed to serialize event"),
    }
    let _ = io::stdout().flush();
}

/// Print that a process's stream completed.
pub fn print_completed(label: &str) {
    println!("{} {} exited", "[EXIT]".blue().bold(), label);
    let _ = io::stdout().flush();
}

/// Print a process's exit code.
pub fn print_exit_code(label: &str, code: Option<i32>) {
    match code {
        Some(0) => println!("{} {} exited with code = 0", "[EXIT]".green().bold(), label),
        Some(code) => println!(
            "{} {} exited with code = {}",
            "[EXIT]".red().bold(),
            label,
            code
        ),
        None => println!(
            "{} {} terminated by signal",
            "[EXIT]".red().bold(),
            label
        ),
    }
    let _ = io::stdout().flush();
}

/// Print a status message.
pub fn print_status(msg: &str) {
    println!("{} {}", "[FORKLINE]".cyan().bold(), msg);
    let _ = io::stdout().flush();
}

/// Print an error message.
pub fn print_error(msg: &str) {
    eprintln!("{} {}", "[ERROR]".red().bold(), msg.red());
}
