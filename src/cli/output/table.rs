//! Table output formatting for CLI commands
//!
//! Renders the agent registry with comfy-table, color-coding liveness.

use chrono::{DateTime, Utc};
use comfy_table::{presets, Attribute, Cell, Color, ContentArrangement, Table};
use std::env;

use crate::cli::output::truncate;
use crate::services::AgentListing;

/// Table formatter for CLI output
pub struct TableFormatter {
    /// Whether to use colors in output
    use_colors: bool,
    /// Maximum width for tables (None = auto)
    max_width: Option<u16>,
}

impl TableFormatter {
    pub fn new() -> Self {
        Self {
            use_colors: supports_color(),
            max_width: None,
        }
    }

    pub fn with_config(use_colors: bool, max_width: Option<u16>) -> Self {
        Self {
            use_colors,
            max_width,
        }
    }

    /// Format the agent registry as a table
    pub fn format_agents(&self, agents: &[AgentListing], now: DateTime<Utc>) -> String {
        let mut table = self.create_base_table();

        table.set_header(vec![
            Cell::new("Agent").add_attribute(Attribute::Bold),
            Cell::new("Status").add_attribute(Attribute::Bold),
            Cell::new("Last Seen").add_attribute(Attribute::Bold),
            Cell::new("Live").add_attribute(Attribute::Bold),
        ]);

        for listing in agents {
            let live_text = if listing.live { "yes" } else { "no" };
            let live_cell = if self.use_colors {
                Cell::new(live_text).fg(if listing.live {
                    Color::Green
                } else {
                    Color::DarkGrey
                })
            } else {
                Cell::new(format!("{} {live_text}", live_icon(listing.live)))
            };

            table.add_row(vec![
                Cell::new(truncate(&listing.agent.id, 32)),
                Cell::new(listing.agent.status.to_string()),
                Cell::new(format_age(now - listing.agent.last_seen_at)),
                live_cell,
            ]);
        }

        table.to_string()
    }

    fn create_base_table(&self) -> Table {
        let mut table = Table::new();

        table
            .load_preset(presets::UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic);

        if let Some(width) = self.max_width {
            table.set_width(width);
        }

        table
    }
}

impl Default for TableFormatter {
    fn default() -> Self {
        Self::new()
    }
}

/// Check if color output is supported
fn supports_color() -> bool {
    if env::var("NO_COLOR").is_ok() {
        return false;
    }

    !matches!(env::var("TERM").as_deref(), Ok("dumb"))
}

fn live_icon(live: bool) -> &'static str {
    if live {
        "●"
    } else {
        "○"
    }
}

/// Human readable "how long ago"
fn format_age(age: chrono::Duration) -> String {
    let secs = age.num_seconds();
    match secs {
        s if s < 0 => "just now".to_string(),
        s if s < 60 => format!("{s}s ago"),
        s if s < 3600 => format!("{}m ago", s / 60),
        s if s < 86_400 => format!("{}h ago", s / 3600),
        s => format!("{}d ago", s / 86_400),
    }
}
