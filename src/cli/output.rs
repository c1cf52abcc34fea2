//! Astral-style CLI output formatting.

use std::fmt::Display;

use owo_colors::OwoColorize;

/// Print the application header.
pub fn header(version: &str) {
    println!("{} {}", "matchlock".bold(), version.dimmed());
    println!();
}

/// Print a labeled value.
pub fn field(label: &str, value: impl Display) {
    println!("  {:<14} {}", label.dimmed(), value);
}

/// Print a success line.
pub fn success(message: &str) {
    println!("  {} {}", "✓".green(), message);
}

/// Print a warning line.
pub fn warning(message: &str) {
    println!("  {} {}", "⚠".yellow(), message);
}

/// Print an error line.
pub fn error(message: &str) {
    eprintln!("  {} {}", "×".red(), message);
}

/// Print a section header.
pub fn section(title: &str) {
    println!();
    println!("{}", title.bold());
}

/// Print one operational step's status.
pub fn step(name: &str, ok: bool, duration_ms: u128, summary: &str) {
    let mark = if ok {
        "✓".green().to_string()
    } else {
        "✗".red().to_string()
    };
    println!(
        "  {mark} {:<24} {:>7}ms  {}",
        name,
        duration_ms,
        summary.dimmed()
    );
}
