use colored::Colorize;
use declarative::PathChange;
use std::io::{self, Write};

/// Print an info message
pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print a warning message
pub fn warn(msg: &str) {
    println!("{} {}", "⚠".yellow(), msg);
}

/// Write a failed item and its detail to the same stream
pub fn failure(out: &mut impl Write, name: &str, detail: &str) -> io::Result<()> {
    writeln!(out, "{} {}", "✗".red(), name)?;
    writeln!(out, "  {}", detail.dimmed())
}

/// Print a header/title
pub fn header(title: &str) {
    println!();
    println!("{}", title.bold());
    println!("{}", "─".repeat(title.chars().count()).dimmed());
}

/// Print a section header
pub fn section(title: &str) {
    println!();
    println!("{}", title.cyan().bold());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

/// Print one structural change, colored by direction
pub fn change(change: &PathChange) {
    let line = format!("  {change}");
    match change {
        PathChange::Added { .. } => println!("{}", line.green()),
        PathChange::Removed { .. } => println!("{}", line.red()),
        PathChange::Changed { .. } => println!("{}", line.yellow()),
    }
}

/// Pluralize a count for display ("1 resource", "3 resources")
pub fn plural(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("{count} {noun}")
    } else {
        format!("{count} {noun}s")
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plural() {
        assert_eq!(plural(0, "change"), "0 changes");
        assert_eq!(plural(1, "change"), "1 change");
        assert_eq!(plural(7, "resource"), "7 resources");
    }

    #[test]
    fn test_failure_keeps_name_and_detail_together() {
        let mut out = Vec::new();
        failure(&mut out, "three functions", "expected 3, found 2").unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("three functions"));
        assert!(lines[1].contains("expected 3, found 2"));
    }
}
