//! Session formatting utilities for console display.

use livesync_shared::time::timestamp_to_rfc3339;

use crate::{
    connection::ConnectionStatus,
    domain::{Collaborator, UniverseLiveView},
    dto::websocket::InboundEvent,
    presence::{format_last_active, get_display_color, get_initials, presence_status},
};

const RULE: &str = "============================================================";

/// Session formatter for console display
pub struct SessionFormatter;

impl SessionFormatter {
    /// Format the collaborator list of the live view
    ///
    /// # Arguments
    ///
    /// * `view` - The live view to render
    /// * `now_millis` - Current Unix timestamp (milliseconds) for activity labels
    pub fn format_collaborators(view: &UniverseLiveView, now_millis: i64) -> String {
        let mut output = String::new();
        output.push_str(&format!("\n{}\n", RULE));
        output.push_str(&format!(
            "Collaborators in {}:\n",
            Self::universe_title(view)
        ));

        let collaborators = view.collaborators_sorted();
        if collaborators.is_empty() {
            output.push_str("(No collaborators)\n");
        } else {
            for collaborator in collaborators {
                output.push_str(&Self::format_collaborator(collaborator, now_millis));
                output.push('\n');
            }
        }

        output.push_str(&format!("{}\n", RULE));
        output
    }

    /// One collaborator line: initials, color, name, view and activity
    pub fn format_collaborator(collaborator: &Collaborator, now_millis: i64) -> String {
        let view = if collaborator.current_view.is_empty() {
            "-"
        } else {
            collaborator.current_view.as_str()
        };
        let cursor = collaborator
            .cursor_position
            .map(|c| format!(" @({}, {})", c.x, c.y))
            .unwrap_or_default();

        format!(
            "[{}] {} {} - {}{} ({}, {})",
            get_initials(&collaborator.username),
            get_display_color(&collaborator.username),
            collaborator.username,
            view,
            cursor,
            presence_status(collaborator, now_millis).label(),
            format_last_active(collaborator.last_updated, now_millis)
        )
    }

    /// Format every parameter group as `group.name = value`
    pub fn format_parameters(view: &UniverseLiveView) -> String {
        let mut output = String::new();
        output.push_str(&format!("\n{}\n", RULE));
        output.push_str(&format!("Parameters of {}:\n", Self::universe_title(view)));

        if view.parameters.values().all(|params| params.is_empty()) {
            output.push_str("(No parameters)\n");
        } else {
            for (group, params) in &view.parameters {
                for (name, value) in params {
                    output.push_str(&format!("{}.{} = {}\n", group, name, value));
                }
            }
        }

        output.push_str(&format!("{}\n", RULE));
        output
    }

    /// Format a one-line notification for an inbound event
    pub fn format_event(event: &InboundEvent) -> String {
        match event {
            InboundEvent::UniverseState(state) => format!(
                "\n* joined '{}' with {} collaborator(s)\n",
                state.universe.name,
                state.universe.collaborators.len()
            ),
            InboundEvent::UserJoined(joined) => {
                format!("\n+ {} (#{}) joined\n", joined.user.username, joined.user.id)
            }
            InboundEvent::UserLeft(left) => format!("\n- user #{} left\n", left.user_id),
            InboundEvent::PresenceUpdated(presence) => match &presence.current_view {
                Some(view) if !view.is_empty() => {
                    format!("\n~ user #{} is viewing {}\n", presence.user_id, view)
                }
                Some(_) => format!("\n~ user #{} is idle\n", presence.user_id),
                None => String::new(),
            },
            InboundEvent::ParameterUpdated(delta) => format!(
                "\n= {}.{} = {}\n",
                delta.group, delta.parameter_name, delta.value
            ),
            InboundEvent::Error(error) => format!("\n! server error: {}\n", error.message),
        }
    }

    /// Format a connection status change
    pub fn format_status(status: ConnectionStatus) -> String {
        let label = match status {
            ConnectionStatus::Connecting => "connecting...".to_string(),
            ConnectionStatus::Connected => "connected".to_string(),
            ConnectionStatus::Disconnected => "disconnected".to_string(),
            ConnectionStatus::Reconnecting { attempt } => {
                format!("reconnecting (attempt {})...", attempt)
            }
            ConnectionStatus::Closed => "closed".to_string(),
        };
        format!("\n[{}]\n", label)
    }

    fn universe_title(view: &UniverseLiveView) -> String {
        let created = view
            .info
            .created_at
            .and_then(timestamp_to_rfc3339)
            .map(|ts| format!(", created {}", ts))
            .unwrap_or_default();
        if view.info.name.is_empty() {
            format!("universe #{}{}", view.id(), created)
        } else {
            format!("'{}' (#{}{})", view.info.name, view.id(), created)
        }
    }
}
