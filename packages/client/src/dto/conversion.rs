//! Conversion logic between DTOs and domain entities.
//!
//! Inbound conversions take `now_millis` because presence records are stamped
//! with the local clock when the server omits a timestamp.

use crate::domain::{
    Collaborator, PresenceFields, UniverseId, UniverseInfo, UniverseLiveView, UserId,
};
use crate::dto::websocket as dto;

// ========================================
// DTO → Domain Entity
// ========================================

impl dto::UserInfo {
    fn into_collaborator(
        self,
        current_view: String,
        cursor_position: Option<crate::domain::CursorPosition>,
        last_updated: i64,
    ) -> Collaborator {
        Collaborator {
            user_id: UserId::new(self.id),
            username: self.username,
            avatar_url: self.avatar_url,
            current_view,
            cursor_position,
            last_updated,
        }
    }
}

impl dto::CollaboratorInfo {
    pub fn into_collaborator(self, now_millis: i64) -> Collaborator {
        let last_updated = self.last_updated.unwrap_or(now_millis);
        self.user
            .into_collaborator(self.current_view, self.cursor_position, last_updated)
    }
}

impl dto::UserJoinedMessage {
    pub fn into_collaborator(self, now_millis: i64) -> Collaborator {
        self.user
            .into_collaborator(self.current_view, None, now_millis)
    }
}

impl dto::UniverseSnapshot {
    pub fn into_live_view(self, now_millis: i64) -> UniverseLiveView {
        let info = UniverseInfo {
            id: UniverseId::new(self.id),
            name: self.name,
            description: self.description,
            is_public: self.is_public,
            created_at: self.created_at,
            updated_at: self.updated_at,
            creator_id: self.creator_id.map(UserId::new),
        };
        let collaborators = self
            .collaborators
            .into_iter()
            .map(|info| {
                let collaborator = info.into_collaborator(now_millis);
                (collaborator.user_id, collaborator)
            })
            .collect();

        UniverseLiveView {
            info,
            collaborators,
            parameters: self.parameters,
        }
    }
}

impl From<dto::PresenceUpdatedMessage> for (UserId, PresenceFields) {
    fn from(dto: dto::PresenceUpdatedMessage) -> Self {
        (
            UserId::new(dto.user_id),
            PresenceFields {
                current_view: dto.current_view,
                cursor_position: dto.cursor_position,
                last_updated: dto.last_updated,
            },
        )
    }
}
