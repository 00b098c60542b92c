//! Shared utilities for the live sync workspace.

pub mod logger;
pub mod time;
