//! Presence and parameter sync client for shared universes.
//!
//! A [`LiveSession`] keeps a client-local view of one universe (collaborators,
//! presence, parameter groups) consistent with the server by seeding it from a
//! full snapshot and applying pushed deltas, while local parameter edits are
//! applied optimistically and sent fire-and-forget.

pub mod config;
pub mod connection;
pub mod console;
pub mod dispatch;
pub mod domain;
pub mod dto;
pub mod error;
pub mod presence;
pub mod reconciler;
pub mod session;

pub use config::{ClientConfig, ReconnectPolicy};
pub use connection::{ConnectionManager, ConnectionStatus};
pub use error::ClientError;
pub use reconciler::StateReconciler;
pub use session::LiveSession;
