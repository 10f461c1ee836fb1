//! Output formatting utilities

use anyhow::Result;
use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, PartialEq, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

impl OutputFormat {
    /// Parse a saved format name, ignoring case
    pub fn from_name(name: &str) -> Option<Self> {
        <Self as ValueEnum>::from_str(name, true).ok()
    }
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Render rows with the rounded style used by every command
pub fn print_rows<T: Tabled>(rows: Vec<T>) {
    let table = Table::new(rows).with(Style::rounded()).to_string();
    println!("{}", table);
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Print a section header
pub fn print_header(title: &str) {
    println!("\n{}", title.bold().underline());
}

/// Color a health value (`good`, `warning`, `critical`)
pub fn color_health(health: &str) -> String {
    match health.to_lowercase().as_str() {
        "good" | "active" | "healthy" => health.green().to_string(),
        "warning" | "inactive" => health.yellow().to_string(),
        "critical" | "error" | "unhealthy" => health.red().to_string(),
        _ => health.to_string(),
    }
}

pub fn color_priority(priority: &str) -> String {
    match priority.to_lowercase().as_str() {
        "high" => priority.red().bold().to_string(),
        "medium" => priority.yellow().to_string(),
        "low" => priority.dimmed().to_string(),
        _ => priority.to_string(),
    }
}

pub fn color_action(action: &str) -> String {
    match action.to_lowercase().as_str() {
        "scale_up" => action.red().to_string(),
        "scale_down" => action.cyan().to_string(),
        _ => action.to_string(),
    }
}

/// Format a utilization percentage, coloring it against a high mark
pub fn format_percent(value: f64, high: f64) -> String {
    let formatted = format!("{:.1}%", value);
    if value > high {
        formatted.red().to_string()
    } else {
        formatted
    }
}

/// RFC 3339 timestamps as `YYYY-MM-DD HH:MM`; anything else as is
pub fn format_timestamp(ts: &str) -> String {
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(ts) {
        return dt.format("%Y-%m-%d %H:%M").to_string();
    }
    if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(ts, "%Y-%m-%dT%H:%M:%S%.f") {
        return dt.format("%Y-%m-%d %H:%M").to_string();
    }
    ts.to_string()
}

/// Shorten long text for table cells
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}
