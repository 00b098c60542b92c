//! Live session: one mounted subscription to a universe.
//!
//! Owns its own connection manager and reconciler (no global instances), so two
//! sessions for the same universe id are fully independent. Unmounting tears the
//! cache down before the transport closes; dropping the session does the same
//! without waiting.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use livesync_shared::time::Clock;
use tokio::sync::watch;

use crate::{
    config::ClientConfig,
    connection::{ConnectionManager, ConnectionStatus},
    dispatch::HandlerId,
    domain::{CursorPosition, ParameterValue, UniverseId, UniverseLiveView},
    dto::websocket::{EventKind, InboundEvent, OutboundEvent, UpdatePresenceMessage},
    error::ClientError,
    reconciler::StateReconciler,
};

pub struct LiveSession {
    universe_id: UniverseId,
    connection: ConnectionManager,
    reconciler: Arc<Mutex<StateReconciler>>,
}

impl LiveSession {
    /// Build the cache and connection for `universe_id` and start joining its room.
    ///
    /// Fails only when no auth token is available. Must be called within a Tokio runtime.
    pub fn mount(
        config: ClientConfig,
        universe_id: UniverseId,
        auth_token: &str,
        current_view: &str,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ClientError> {
        Self::mount_with(
            ConnectionManager::new(config),
            universe_id,
            auth_token,
            current_view,
            clock,
        )
    }

    /// Like [`LiveSession::mount`] with a pre-configured connection manager
    /// (e.g. one with an error callback already set).
    pub fn mount_with(
        mut connection: ConnectionManager,
        universe_id: UniverseId,
        auth_token: &str,
        current_view: &str,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ClientError> {
        let reconciler = Arc::new(Mutex::new(StateReconciler::new(universe_id, clock)));

        for kind in EventKind::ALL {
            if kind == EventKind::Error {
                continue;
            }
            let reconciler = reconciler.clone();
            connection.on_event(kind, move |event| {
                lock(&reconciler).apply(event);
            });
        }

        connection.open(universe_id, auth_token, current_view)?;
        tracing::info!("Mounted live session for universe {}", universe_id);

        Ok(Self {
            universe_id,
            connection,
            reconciler,
        })
    }

    pub fn universe_id(&self) -> UniverseId {
        self.universe_id
    }

    /// Register an extra inbound handler; it runs after the cache has been updated.
    pub fn on_event(
        &self,
        kind: EventKind,
        handler: impl FnMut(&InboundEvent) + Send + 'static,
    ) -> HandlerId {
        self.connection.on_event(kind, handler)
    }

    /// Register an extra inbound handler that also reads the updated live view.
    ///
    /// Skipped once the session is torn down. The view is locked while the
    /// handler runs.
    pub fn on_view_event(
        &self,
        kind: EventKind,
        mut handler: impl FnMut(&InboundEvent, &UniverseLiveView) + Send + 'static,
    ) -> HandlerId {
        let reconciler = self.reconciler.clone();
        self.connection.on_event(kind, move |event| {
            if let Some(view) = lock(&reconciler).view() {
                handler(event, view);
            }
        })
    }

    pub fn off(&self, id: HandlerId) -> bool {
        self.connection.off(id)
    }

    pub fn status(&self) -> ConnectionStatus {
        self.connection.status()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.connection.subscribe_status()
    }

    /// Read the live view; `None` once the session is torn down.
    pub fn with_view<R>(&self, read: impl FnOnce(&UniverseLiveView) -> R) -> Option<R> {
        lock(&self.reconciler).view().map(read)
    }

    /// Cloned copy of the live view
    pub fn view(&self) -> Option<UniverseLiveView> {
        self.with_view(UniverseLiveView::clone)
    }

    pub fn parameter(&self, group: &str, name: &str) -> Option<ParameterValue> {
        lock(&self.reconciler).parameter(group, name).cloned()
    }

    /// Optimistic parameter edit: cache first, then a fire-and-forget send.
    ///
    /// Returns whether the outbound event reached the transport.
    pub fn update_parameter(&self, group: &str, name: &str, value: ParameterValue) -> bool {
        let event = lock(&self.reconciler).update_parameter_locally(group, name, value);
        self.connection.send(event)
    }

    /// Publish this user's presence. Dropped while disconnected.
    pub fn update_presence(
        &self,
        current_view: Option<String>,
        cursor_position: Option<CursorPosition>,
    ) -> bool {
        self.connection
            .send(OutboundEvent::UpdatePresence(UpdatePresenceMessage {
                universe_id: self.universe_id.value(),
                current_view,
                cursor_position,
            }))
    }

    /// Discard the cache, then leave the room and close the transport.
    pub async fn unmount(mut self) {
        lock(&self.reconciler).teardown();
        self.connection.close().await;
        tracing::info!("Unmounted live session for universe {}", self.universe_id);
    }
}

impl Drop for LiveSession {
    fn drop(&mut self) {
        // The connection manager's own Drop closes the transport afterwards.
        lock(&self.reconciler).teardown();
    }
}

fn lock(reconciler: &Mutex<StateReconciler>) -> MutexGuard<'_, StateReconciler> {
    reconciler.lock().unwrap_or_else(PoisonError::into_inner)
}
