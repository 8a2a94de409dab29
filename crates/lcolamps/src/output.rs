//! Output formatting: table, JSON, plain.
//!
//! Renders lamp states and switch outcomes in the format selected by
//! `--output`. Table uses `tabled`, structured formats use serde,
//! plain emits one lamp per line.

use std::io::{self, IsTerminal, Write};

use owo_colors::OwoColorize;
use serde_json::json;
use tabled::{Table, Tabled, settings::Style};

use lcolamps_core::{LampState, SwitchOutcome, SwitchResult};

use crate::cli::{ColorMode, OutputFormat};

// ── Color helpers ────────────────────────────────────────────────────

/// Determine whether color output should be enabled.
pub fn should_color(mode: &ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err(),
    }
}

fn paint_state(state: LampState, color: bool) -> String {
    if !color {
        return state.to_string();
    }
    match state {
        LampState::On => state.green().bold().to_string(),
        LampState::Warming => state.yellow().to_string(),
        LampState::Off => state.dimmed().to_string(),
        LampState::Unknown => state.red().to_string(),
    }
}

fn paint_outcome(outcome: &SwitchOutcome, color: bool) -> String {
    if !color {
        return outcome.to_string();
    }
    match outcome {
        SwitchOutcome::Applied => outcome.green().to_string(),
        SwitchOutcome::Skipped => outcome.dimmed().to_string(),
        SwitchOutcome::Failed(_) => outcome.red().bold().to_string(),
    }
}

// ── Status rendering ─────────────────────────────────────────────────

/// One lamp in the status view: display name, backend label, state.
pub struct StatusEntry {
    pub name: String,
    pub backend: String,
    pub state: LampState,
}

#[derive(Tabled)]
struct StatusRow {
    #[tabled(rename = "LAMP")]
    name: String,
    #[tabled(rename = "BACKEND")]
    backend: String,
    #[tabled(rename = "STATE")]
    state: String,
}

pub fn render_status(format: &OutputFormat, color: bool, entries: &[StatusEntry]) -> String {
    match format {
        OutputFormat::Table => {
            let rows: Vec<StatusRow> = entries
                .iter()
                .map(|e| StatusRow {
                    name: e.name.clone(),
                    backend: e.backend.clone(),
                    state: paint_state(e.state, color),
                })
                .collect();
            Table::new(rows).with(Style::rounded()).to_string()
        }
        OutputFormat::Json | OutputFormat::JsonCompact => {
            let map: serde_json::Map<String, serde_json::Value> = entries
                .iter()
                .map(|e| (e.name.clone(), json!(e.state)))
                .collect();
            render_json(&serde_json::Value::Object(map), format)
        }
        OutputFormat::Plain => entries
            .iter()
            .map(|e| format!("{} {}", e.name, e.state))
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

// ── Switch-result rendering ──────────────────────────────────────────

#[derive(Tabled)]
struct SwitchRow {
    #[tabled(rename = "LAMP")]
    name: String,
    #[tabled(rename = "OUTCOME")]
    outcome: String,
    #[tabled(rename = "STATE")]
    state: String,
}

pub fn render_switch(format: &OutputFormat, color: bool, result: &SwitchResult) -> String {
    match format {
        OutputFormat::Table => {
            let rows: Vec<SwitchRow> = result
                .outcomes
                .iter()
                .map(|(name, outcome)| SwitchRow {
                    name: name.clone(),
                    outcome: paint_outcome(outcome, color),
                    state: result
                        .states
                        .get(name)
                        .map_or_else(String::new, |s| paint_state(*s, color)),
                })
                .collect();
            Table::new(rows).with(Style::rounded()).to_string()
        }
        OutputFormat::Json | OutputFormat::JsonCompact => {
            let outcomes: serde_json::Map<String, serde_json::Value> = result
                .outcomes
                .iter()
                .map(|(name, outcome)| (name.clone(), json!(outcome.to_string())))
                .collect();
            let states: serde_json::Map<String, serde_json::Value> = result
                .states
                .iter()
                .map(|(name, state)| (name.clone(), json!(state)))
                .collect();
            render_json(&json!({ "outcomes": outcomes, "states": states }), format)
        }
        OutputFormat::Plain => result
            .outcomes
            .iter()
            .map(|(name, outcome)| format!("{name} {outcome}"))
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

fn render_json(value: &serde_json::Value, format: &OutputFormat) -> String {
    match format {
        OutputFormat::JsonCompact => value.to_string(),
        _ => serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string()),
    }
}

/// Print the rendered output to stdout, respecting quiet mode.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}
