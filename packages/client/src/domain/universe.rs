//! Universe live view: collaborators and parameter groups for one session.

use std::{
    collections::{BTreeMap, HashMap},
    fmt,
};

use serde::{Deserialize, Serialize};

/// Universe identifier (stable, server-assigned)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UniverseId(i64);

impl UniverseId {
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for UniverseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// User identifier, unique within a collaborator set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UserId(i64);

impl UserId {
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Cursor coordinates reported by a collaborator
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CursorPosition {
    pub x: f64,
    pub y: f64,
}

/// A single named parameter setting (e.g. `gravity = 9.81`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Number(f64),
    Text(String),
}

impl ParameterValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(_) => None,
        }
    }

    /// Numbers when the input parses as one, text otherwise.
    pub fn parse(input: &str) -> Self {
        input
            .parse::<f64>()
            .ok()
            .filter(|n| n.is_finite())
            .map_or_else(|| Self::Text(input.to_string()), Self::Number)
    }
}

impl From<f64> for ParameterValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for ParameterValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for ParameterValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{}", n),
            Self::Text(s) => write!(f, "{:?}", s),
        }
    }
}

/// Parameter groups: group name → (parameter name → value)
pub type ParameterGroups = BTreeMap<String, BTreeMap<String, ParameterValue>>;

/// Server-owned descriptive fields; read-only for the client
#[derive(Debug, Clone, PartialEq)]
pub struct UniverseInfo {
    pub id: UniverseId,
    pub name: String,
    pub description: Option<String>,
    pub is_public: bool,
    /// Unix timestamp (milliseconds)
    pub created_at: Option<i64>,
    /// Unix timestamp (milliseconds)
    pub updated_at: Option<i64>,
    pub creator_id: Option<UserId>,
}

impl UniverseInfo {
    /// Placeholder metadata used until the first snapshot arrives
    pub fn unnamed(id: UniverseId) -> Self {
        Self {
            id,
            name: String::new(),
            description: None,
            is_public: false,
            created_at: None,
            updated_at: None,
            creator_id: None,
        }
    }
}

/// A user currently viewing or editing the universe
#[derive(Debug, Clone, PartialEq)]
pub struct Collaborator {
    pub user_id: UserId,
    pub username: String,
    pub avatar_url: Option<String>,
    /// Path-like description of what the user is looking at; empty means idle
    pub current_view: String,
    pub cursor_position: Option<CursorPosition>,
    /// Unix timestamp (milliseconds) of the most recent presence event
    pub last_updated: i64,
}

/// Partial presence update; `None` fields are left untouched
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PresenceFields {
    pub current_view: Option<String>,
    /// `Some(None)` clears the cursor
    pub cursor_position: Option<Option<CursorPosition>>,
    pub last_updated: Option<i64>,
}

impl Collaborator {
    /// Merge presence fields into this record.
    ///
    /// `last_updated` falls back to `now_millis` when the update carries no timestamp.
    pub fn merge(&mut self, fields: PresenceFields, now_millis: i64) {
        if let Some(view) = fields.current_view {
            self.current_view = view;
        }
        if let Some(cursor) = fields.cursor_position {
            self.cursor_position = cursor;
        }
        self.last_updated = fields.last_updated.unwrap_or(now_millis);
    }
}

/// Client-local view of one universe's live state
#[derive(Debug, Clone, PartialEq)]
pub struct UniverseLiveView {
    pub info: UniverseInfo,
    pub collaborators: HashMap<UserId, Collaborator>,
    pub parameters: ParameterGroups,
}

impl UniverseLiveView {
    /// Empty view bound to `id`, before any snapshot
    pub fn empty(id: UniverseId) -> Self {
        Self {
            info: UniverseInfo::unnamed(id),
            collaborators: HashMap::new(),
            parameters: ParameterGroups::new(),
        }
    }

    pub fn id(&self) -> UniverseId {
        self.info.id
    }

    /// Insert or overwrite the collaborator keyed by its user id
    pub fn upsert_collaborator(&mut self, collaborator: Collaborator) {
        self.collaborators
            .insert(collaborator.user_id, collaborator);
    }

    pub fn remove_collaborator(&mut self, user_id: UserId) -> Option<Collaborator> {
        self.collaborators.remove(&user_id)
    }

    pub fn collaborator(&self, user_id: UserId) -> Option<&Collaborator> {
        self.collaborators.get(&user_id)
    }

    /// Collaborators ordered by user id
    pub fn collaborators_sorted(&self) -> Vec<&Collaborator> {
        let mut collaborators: Vec<&Collaborator> = self.collaborators.values().collect();
        collaborators.sort_by_key(|c| c.user_id);
        collaborators
    }

    /// Set `group.name`, creating the group when needed. Last write wins.
    pub fn set_parameter(&mut self, group: &str, name: &str, value: ParameterValue) {
        self.parameters
            .entry(group.to_string())
            .or_default()
            .insert(name.to_string(), value);
    }

    pub fn parameter(&self, group: &str, name: &str) -> Option<&ParameterValue> {
        self.parameters.get(group).and_then(|params| params.get(name))
    }
}
