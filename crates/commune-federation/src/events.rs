//! Ephemeral event routing — typing and presence.
//!
//! Consumes the platform's internal ephemeral events and forwards them to
//! the federation network as EDUs. Events for unmapped rooms or users are
//! dropped silently; mappings appear asynchronously and an early event is
//! not an error.

use std::sync::Arc;

use commune_common::models::UserStatus;
use uuid::Uuid;

use crate::{
    error::BridgeError,
    services::EduService,
    store::BridgeStore,
    types::RemotePresence,
};

/// A local typing-state change.
#[derive(Debug, Clone)]
pub struct TypingEvent {
    pub room_id: Uuid,
    pub username: String,
    pub is_typing: bool,
}

/// A local presence change.
#[derive(Debug, Clone)]
pub struct PresenceEvent {
    pub username: String,
    pub status: UserStatus,
}

/// Routes ephemeral platform events out to the federation network.
pub struct EventRouter {
    store: Arc<dyn BridgeStore>,
    edu: Arc<dyn EduService>,
}

impl EventRouter {
    pub fn new(store: Arc<dyn BridgeStore>, edu: Arc<dyn EduService>) -> Self {
        Self { store, edu }
    }

    /// Forward a typing-state change scoped to one room/user pair.
    pub async fn user_typing(&self, event: &TypingEvent) -> Result<(), BridgeError> {
        let Some(external_room_id) = self.store.external_room_id(event.room_id).await? else {
            return Ok(());
        };
        let Some(user) = self.store.user_by_username(&event.username).await? else {
            return Ok(());
        };
        let Some(external_user_id) = self.store.external_user_id(user.id).await? else {
            return Ok(());
        };

        self.edu
            .send_typing_notification(&external_room_id, &external_user_id, event.is_typing)
            .await
    }

    /// Forward a presence change as one batched update covering every
    /// federated room the user belongs to.
    pub async fn presence_changed(&self, event: &PresenceEvent) -> Result<(), BridgeError> {
        let Some(user) = self.store.user_by_username(&event.username).await? else {
            return Ok(());
        };
        let Some(external_user_id) = self.store.external_user_id(user.id).await? else {
            return Ok(());
        };

        let room_ids = self.store.federated_room_ids_for_user(user.id).await?;
        let update = RemotePresence { user_id: external_user_id, presence: event.status.into() };
        self.edu.send_presence_update_to_rooms(&[update], &room_ids).await
    }
}
