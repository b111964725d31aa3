//! Terminal-aware table utilities.

use comfy_table::{presets::UTF8_FULL, Cell, Color, ContentArrangement, Table};

/// Create a table with `headers`, sized to the terminal width (120 columns
/// when not connected to a TTY).
pub fn new_table(headers: &[&str]) -> Table {
    let width = crossterm::terminal::size().map(|(w, _)| w).unwrap_or(120);

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_width(width);
    table.set_header(headers.to_vec());
    table
}

/// Green check or dim dash.
pub fn flag_cell(value: bool) -> Cell {
    if value {
        Cell::new("\u{2713}").fg(Color::Green)
    } else {
        Cell::new("-").fg(Color::DarkGrey)
    }
}

/// Truncate a string to `max` characters, appending "..." if truncated.
///
/// Safe for multi-byte (UTF-8) strings.
pub fn truncate_str(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", truncated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_str_keeps_short_descriptions() {
        assert_eq!(truncate_str("Issue tracking", 60), "Issue tracking");
    }

    #[test]
    fn test_truncate_str_long() {
        assert_eq!(truncate_str("Semantic code navigation", 10), "Semantic...");
    }

    #[test]
    fn test_truncate_str_unicode() {
        assert_eq!(truncate_str("ñandú ñandú ñandú", 8), "ñandú...");
    }

    #[test]
    fn test_new_table_has_header() {
        let mut table = new_table(&["Skill", "Enabled"]);
        table.add_row(vec![Cell::new("beads"), flag_cell(true)]);
        let rendered = table.to_string();
        assert!(rendered.contains("Skill"));
        assert!(rendered.contains("beads"));
    }
}
