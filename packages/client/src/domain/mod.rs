//! Domain model of the universe live view and pure client-side rules.

mod reconnect;
mod universe;

pub use reconnect::{
    backoff_delay, is_stable_session, should_attempt_reconnect, should_exit_immediately,
};
pub use universe::{
    Collaborator, CursorPosition, ParameterGroups, ParameterValue, PresenceFields, UniverseId,
    UniverseInfo, UniverseLiveView, UserId,
};
