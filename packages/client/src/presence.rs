//! Presence display helpers: activity labels, initials and avatar colors.
//!
//! All functions are pure; "now" is passed in explicitly.

use crate::domain::Collaborator;

const MINUTE_MILLIS: i64 = 60_000;
const HOUR_MILLIS: i64 = 60 * MINUTE_MILLIS;
const DAY_MILLIS: i64 = 24 * HOUR_MILLIS;

/// A collaborator with no presence event for this long is shown as idle
pub const IDLE_THRESHOLD_MILLIS: i64 = 5 * MINUTE_MILLIS;

/// Fixed avatar palette
pub const DISPLAY_PALETTE: [&str; 8] = [
    "#3B82F6", "#10B981", "#F59E0B", "#EF4444", "#8B5CF6", "#EC4899", "#14B8A6", "#F97316",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceStatus {
    Active,
    Idle,
}

impl PresenceStatus {
    pub fn label(&self) -> &'static str {
        match self {
            PresenceStatus::Active => "active",
            PresenceStatus::Idle => "idle",
        }
    }
}

/// Coarse "last active" label for a millisecond timestamp.
///
/// Timestamps in the future are treated as "Just now".
pub fn format_last_active(timestamp_millis: i64, now_millis: i64) -> String {
    let elapsed = now_millis.saturating_sub(timestamp_millis).max(0);

    if elapsed < MINUTE_MILLIS {
        "Just now".to_string()
    } else if elapsed < HOUR_MILLIS {
        format!("{}m ago", elapsed / MINUTE_MILLIS)
    } else if elapsed < DAY_MILLIS {
        format!("{}h ago", elapsed / HOUR_MILLIS)
    } else {
        format!("{}d ago", elapsed / DAY_MILLIS)
    }
}

/// First letter of each whitespace-separated token, uppercased, at most two characters.
pub fn get_initials(username: &str) -> String {
    username
        .split_whitespace()
        .filter_map(|token| token.chars().next())
        .flat_map(char::to_uppercase)
        .take(2)
        .collect()
}

/// Palette color chosen by the sum of the username's UTF-16 code units.
///
/// Matches the web client, so characters outside the BMP count as two surrogates.
pub fn get_display_color(username: &str) -> &'static str {
    let sum: u64 = username.encode_utf16().map(u64::from).sum();
    // palette length is a small constant, the cast cannot truncate
    DISPLAY_PALETTE[(sum % DISPLAY_PALETTE.len() as u64) as usize]
}

/// `Idle` when the collaborator has no current view or has been silent past the threshold.
pub fn presence_status(collaborator: &Collaborator, now_millis: i64) -> PresenceStatus {
    let silent_for = now_millis.saturating_sub(collaborator.last_updated);
    if collaborator.current_view.is_empty() || silent_for >= IDLE_THRESHOLD_MILLIS {
        PresenceStatus::Idle
    } else {
        PresenceStatus::Active
    }
}
