//! Data Transfer Objects (DTOs) for the live sync client.
//!
//! - `websocket`: WebSocket event DTOs (inbound and outbound)
//! - `conversion`: DTO → domain conversions

pub mod conversion;
pub mod websocket;
