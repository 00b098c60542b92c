//! State reconciler: the client-local cache of one universe session.
//!
//! Inbound events are applied in delivery order with last-write-wins semantics.
//! After [`StateReconciler::teardown`] every `apply_*` call is a no-op, so
//! events that arrive between unmount and transport close cannot touch a
//! discarded cache.

use std::sync::Arc;

use livesync_shared::time::Clock;

use crate::{
    domain::{
        Collaborator, ParameterValue, PresenceFields, UniverseId, UniverseLiveView, UserId,
    },
    dto::websocket::{InboundEvent, OutboundEvent, UpdateParameterMessage},
};

pub struct StateReconciler {
    universe_id: UniverseId,
    /// `None` once torn down
    view: Option<UniverseLiveView>,
    snapshot_applied: bool,
    clock: Arc<dyn Clock>,
}

impl StateReconciler {
    /// Create an empty cache bound to `universe_id`
    pub fn new(universe_id: UniverseId, clock: Arc<dyn Clock>) -> Self {
        Self {
            universe_id,
            view: Some(UniverseLiveView::empty(universe_id)),
            snapshot_applied: false,
            clock,
        }
    }

    pub fn universe_id(&self) -> UniverseId {
        self.universe_id
    }

    pub fn view(&self) -> Option<&UniverseLiveView> {
        self.view.as_ref()
    }

    pub fn collaborator(&self, user_id: UserId) -> Option<&Collaborator> {
        self.view.as_ref()?.collaborator(user_id)
    }

    pub fn parameter(&self, group: &str, name: &str) -> Option<&ParameterValue> {
        self.view.as_ref()?.parameter(group, name)
    }

    /// Whether a full snapshot has seeded the cache since construction
    pub fn has_snapshot(&self) -> bool {
        self.snapshot_applied
    }

    pub fn is_torn_down(&self) -> bool {
        self.view.is_none()
    }

    /// Route an inbound event to the matching `apply_*` operation.
    ///
    /// Returns `true` if the cache changed.
    pub fn apply(&mut self, event: &InboundEvent) -> bool {
        let now = self.clock.now_millis();
        match event {
            InboundEvent::UniverseState(state) => {
                self.apply_snapshot(state.universe.clone().into_live_view(now))
            }
            InboundEvent::UserJoined(joined) => {
                self.apply_user_joined(joined.clone().into_collaborator(now))
            }
            InboundEvent::UserLeft(left) => self.apply_user_left(UserId::new(left.user_id)),
            InboundEvent::PresenceUpdated(presence) => {
                let (user_id, fields) = presence.clone().into();
                self.apply_presence_update(user_id, fields)
            }
            InboundEvent::ParameterUpdated(delta) => self.apply_parameter_delta(
                &delta.group,
                &delta.parameter_name,
                delta.value.clone(),
            ),
            InboundEvent::Error(_) => false,
        }
    }

    /// Replace the collaborator set and parameter groups in one step.
    ///
    /// Snapshots for a different universe id are ignored.
    pub fn apply_snapshot(&mut self, snapshot: UniverseLiveView) -> bool {
        let Some(view) = self.view.as_mut() else {
            return false;
        };
        if snapshot.id() != self.universe_id {
            tracing::warn!(
                "Ignoring snapshot for universe {} (session is bound to {})",
                snapshot.id(),
                self.universe_id
            );
            return false;
        }

        tracing::debug!(
            "Applying snapshot for universe {}: {} collaborators, {} parameter groups",
            self.universe_id,
            snapshot.collaborators.len(),
            snapshot.parameters.len()
        );
        *view = snapshot;
        self.snapshot_applied = true;
        true
    }

    /// Insert a collaborator; a duplicate join overwrites the existing record.
    pub fn apply_user_joined(&mut self, collaborator: Collaborator) -> bool {
        let Some(view) = self.view.as_mut() else {
            return false;
        };
        tracing::debug!(
            "User {} ('{}') joined universe {}",
            collaborator.user_id,
            collaborator.username,
            self.universe_id
        );
        view.upsert_collaborator(collaborator);
        true
    }

    /// Remove a collaborator; unknown ids are a silent no-op.
    pub fn apply_user_left(&mut self, user_id: UserId) -> bool {
        let Some(view) = self.view.as_mut() else {
            return false;
        };
        let removed = view.remove_collaborator(user_id).is_some();
        if removed {
            tracing::debug!("User {} left universe {}", user_id, self.universe_id);
        } else {
            tracing::trace!("Ignoring leave for unknown user {}", user_id);
        }
        removed
    }

    /// Merge presence fields into an existing collaborator.
    ///
    /// Presence never creates a collaborator; updates for unknown ids are discarded.
    pub fn apply_presence_update(&mut self, user_id: UserId, fields: PresenceFields) -> bool {
        let now = self.clock.now_millis();
        let Some(collaborator) = self
            .view
            .as_mut()
            .and_then(|view| view.collaborators.get_mut(&user_id))
        else {
            tracing::trace!("Discarding presence update for unknown user {}", user_id);
            return false;
        };
        collaborator.merge(fields, now);
        true
    }

    /// Overwrite `group.name` unconditionally (last write wins).
    pub fn apply_parameter_delta(
        &mut self,
        group: &str,
        name: &str,
        value: ParameterValue,
    ) -> bool {
        let Some(view) = self.view.as_mut() else {
            return false;
        };
        view.set_parameter(group, name, value);
        true
    }

    /// Optimistic local edit.
    ///
    /// Writes the cache immediately and returns the `update_parameter` event the
    /// caller hands to the connection manager. Never fails; after teardown only
    /// the event is produced.
    pub fn update_parameter_locally(
        &mut self,
        group: &str,
        name: &str,
        value: ParameterValue,
    ) -> OutboundEvent {
        if let Some(view) = self.view.as_mut() {
            view.set_parameter(group, name, value.clone());
        }

        OutboundEvent::UpdateParameter(UpdateParameterMessage {
            universe_id: self.universe_id.value(),
            group: group.to_string(),
            parameter_name: name.to_string(),
            value,
        })
    }

    /// Discard the cache. Idempotent.
    pub fn teardown(&mut self) {
        if self.view.take().is_some() {
            tracing::debug!("Discarded live view cache for universe {}", self.universe_id);
        }
    }
}

impl std::fmt::Debug for StateReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateReconciler")
            .field("universe_id", &self.universe_id)
            .field("view", &self.view)
            .field("snapshot_applied", &self.snapshot_applied)
            .finish_non_exhaustive()
    }
}
