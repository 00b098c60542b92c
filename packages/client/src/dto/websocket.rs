//! WebSocket event DTOs.
//!
//! Every frame is a JSON text frame with a snake_case `"type"` discriminator and
//! the payload fields flattened next to it.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

use crate::domain::{CursorPosition, ParameterGroups, ParameterValue};

// ========================================
// Inbound (server → client)
// ========================================

/// Name of an inbound event, used as the dispatch table key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    UniverseState,
    UserJoined,
    UserLeft,
    PresenceUpdated,
    ParameterUpdated,
    Error,
}

impl EventKind {
    pub const ALL: [EventKind; 6] = [
        EventKind::UniverseState,
        EventKind::UserJoined,
        EventKind::UserLeft,
        EventKind::PresenceUpdated,
        EventKind::ParameterUpdated,
        EventKind::Error,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::UniverseState => "universe_state",
            EventKind::UserJoined => "user_joined",
            EventKind::UserLeft => "user_left",
            EventKind::PresenceUpdated => "presence_updated",
            EventKind::ParameterUpdated => "parameter_updated",
            EventKind::Error => "error",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Events pushed by the universe server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundEvent {
    UniverseState(UniverseStateMessage),
    UserJoined(UserJoinedMessage),
    UserLeft(UserLeftMessage),
    PresenceUpdated(PresenceUpdatedMessage),
    ParameterUpdated(ParameterUpdatedMessage),
    Error(ErrorMessage),
}

impl InboundEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            InboundEvent::UniverseState(_) => EventKind::UniverseState,
            InboundEvent::UserJoined(_) => EventKind::UserJoined,
            InboundEvent::UserLeft(_) => EventKind::UserLeft,
            InboundEvent::PresenceUpdated(_) => EventKind::PresenceUpdated,
            InboundEvent::ParameterUpdated(_) => EventKind::ParameterUpdated,
            InboundEvent::Error(_) => EventKind::Error,
        }
    }
}

/// Full-state snapshot sent after joining a room
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UniverseStateMessage {
    pub universe: UniverseSnapshot,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UniverseSnapshot {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub created_at: Option<i64>,
    #[serde(default)]
    pub updated_at: Option<i64>,
    #[serde(default)]
    pub creator_id: Option<i64>,
    #[serde(default)]
    pub collaborators: Vec<CollaboratorInfo>,
    #[serde(default)]
    pub parameters: ParameterGroups,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserInfo {
    pub id: i64,
    pub username: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollaboratorInfo {
    pub user: UserInfo,
    #[serde(default)]
    pub current_view: String,
    #[serde(default)]
    pub cursor_position: Option<CursorPosition>,
    /// Unix timestamp (milliseconds)
    #[serde(default)]
    pub last_updated: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserJoinedMessage {
    pub user: UserInfo,
    #[serde(default)]
    pub current_view: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserLeftMessage {
    pub user_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresenceUpdatedMessage {
    pub user_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_view: Option<String>,
    /// Absent: untouched. `null`: cursor cleared.
    #[serde(
        default,
        deserialize_with = "present_or_null",
        skip_serializing_if = "Option::is_none"
    )]
    pub cursor_position: Option<Option<CursorPosition>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterUpdatedMessage {
    pub group: String,
    pub parameter_name: String,
    pub value: ParameterValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorMessage {
    pub message: String,
}

/// Map a present field to `Some`, keeping an explicit `null` as `Some(None)`
fn present_or_null<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

// ========================================
// Outbound (client → server)
// ========================================

/// Events sent by the client, all scoped to one universe id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundEvent {
    JoinRoom(JoinRoomMessage),
    LeaveRoom(LeaveRoomMessage),
    UpdatePresence(UpdatePresenceMessage),
    UpdateParameter(UpdateParameterMessage),
}

impl OutboundEvent {
    pub fn name(&self) -> &'static str {
        match self {
            OutboundEvent::JoinRoom(_) => "join_room",
            OutboundEvent::LeaveRoom(_) => "leave_room",
            OutboundEvent::UpdatePresence(_) => "update_presence",
            OutboundEvent::UpdateParameter(_) => "update_parameter",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinRoomMessage {
    pub universe_id: i64,
    pub current_view: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaveRoomMessage {
    pub universe_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdatePresenceMessage {
    pub universe_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_view: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor_position: Option<CursorPosition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateParameterMessage {
    pub universe_id: i64,
    pub group: String,
    pub parameter_name: String,
    pub value: ParameterValue,
}
