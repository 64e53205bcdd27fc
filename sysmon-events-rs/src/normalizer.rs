// sysmon-events-rs/src/normalizer.rs
//
// Maps raw tabular rows onto the canonical Event shape.
//
// Each canonical field has an ordered list of candidate column names; the first
// column present in the row wins, even when its value is empty. Headers outside
// these lists are never consulted. Supporting another export schema means adding
// a name to the relevant list.

use crate::event::{Event, RawRow, UNKNOWN_PROCESS};

pub const ID_ALIASES: &[&str] = &["Id", "id", "EventID"];
pub const CATEGORY_ALIASES: &[&str] = &["LevelDisplayName", "Level", "TaskCategory"];
pub const TIMESTAMP_ALIASES: &[&str] = &["TimeCreated", "TimeGenerated", "timestamp"];
pub const MESSAGE_ALIASES: &[&str] = &["Message", "message"];

/// First value among `aliases` present in `row`
pub fn resolve<'a>(row: &'a RawRow, aliases: &[&str]) -> Option<&'a str> {
    aliases.iter().find_map(|alias| row.get(alias))
}

/// Normalize one row. `positional_index` is the 0-based position of the row within
/// its collection and only feeds the id fallback. Never fails.
pub fn normalize(row: &RawRow, positional_index: usize) -> Event {
    let id = resolve(row, ID_ALIASES)
        .map(str::to_string)
        .unwrap_or_else(|| (positional_index + 1).to_string());

    let message = match resolve(row, MESSAGE_ALIASES) {
        Some(message) => message.to_string(),
        None => serde_json::to_string(row).unwrap_or_default(),
    };

    Event {
        id,
        category: resolve(row, CATEGORY_ALIASES).unwrap_or_default().to_string(),
        timestamp: resolve(row, TIMESTAMP_ALIASES).unwrap_or_default().to_string(),
        process: UNKNOWN_PROCESS.to_string(),
        message,
    }
}
