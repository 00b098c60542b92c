//! Reconnection rules for the connection manager.
//!
//! Pure functions without side effects, so the retry behavior can be tested
//! without a live transport.

use std::time::Duration;

use crate::{config::ReconnectPolicy, error::ClientError};

/// Check if the session must stop immediately based on the error type.
///
/// # Returns
///
/// `true` for errors that retrying cannot fix (missing or rejected credentials),
/// `false` otherwise
pub fn should_exit_immediately(error: &ClientError) -> bool {
    matches!(
        error,
        ClientError::MissingToken | ClientError::Unauthorized(_) | ClientError::InvalidRequest(_)
    )
}

/// Check if the client should attempt to reconnect.
///
/// # Arguments
///
/// * `error` - The client error that occurred
/// * `current_attempt` - The number of reconnection attempts already made
/// * `max_attempts` - The maximum number of reconnection attempts allowed
pub fn should_attempt_reconnect(
    error: &ClientError,
    current_attempt: u32,
    max_attempts: u32,
) -> bool {
    if should_exit_immediately(error) {
        return false;
    }

    current_attempt < max_attempts
}

/// Delay before reconnection attempt `attempt` (1-based).
///
/// Doubles from `initial_delay` on every attempt and is capped at `max_delay`.
pub fn backoff_delay(policy: &ReconnectPolicy, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(31);
    policy
        .initial_delay
        .checked_mul(1u32 << exponent)
        .map_or(policy.max_delay, |delay| delay.min(policy.max_delay))
}

/// Check if a lost session lasted long enough to reset the attempt counter.
///
/// A server that accepts the handshake and drops right away must not restart
/// the backoff from scratch on every cycle.
pub fn is_stable_session(policy: &ReconnectPolicy, connected_for: Duration) -> bool {
    connected_for >= policy.stable_after
}
