//! Local↔external identity and room mapping.
//!
//! Mappings are created on first federation touch-point and never deleted.
//! Creation is an upsert; the store's uniqueness constraint on the local id
//! makes concurrent first-use creation converge to a single row.

use std::sync::Arc;

use uuid::Uuid;

use crate::{error::BridgeError, store::BridgeStore, types::mxid};

// ─── Users ───────────────────────────────────────────────────────────────────

/// Resolves local users to their external protocol identities.
#[derive(Clone)]
pub struct UserBridge {
    store: Arc<dyn BridgeStore>,
}

impl UserBridge {
    pub fn new(store: Arc<dyn BridgeStore>) -> Self {
        Self { store }
    }

    /// The external user id mapped to a local user, if any.
    pub async fn external_user_id(
        &self,
        local_user_id: Uuid,
    ) -> Result<Option<String>, BridgeError> {
        self.store.external_user_id(local_user_id).await
    }

    /// Return the stored external id for a local user, deriving and
    /// persisting `@username:domain` when no mapping exists yet.
    ///
    /// Idempotent — an existing mapping is returned as-is, never re-derived.
    pub async fn resolve_or_create(
        &self,
        local_user_id: Uuid,
        username: &str,
        domain: &str,
        created_as_owner: bool,
    ) -> Result<String, BridgeError> {
        if let Some(existing) = self.store.external_user_id(local_user_id).await? {
            return Ok(existing);
        }

        let external_user_id = mxid(username, domain);
        self.store
            .upsert_bridged_user(local_user_id, &external_user_id, domain, created_as_owner)
            .await?;
        Ok(external_user_id)
    }
}

// ─── Rooms ───────────────────────────────────────────────────────────────────

/// Resolves local rooms to their external protocol counterparts.
#[derive(Clone)]
pub struct RoomBridge {
    store: Arc<dyn BridgeStore>,
}

impl RoomBridge {
    pub fn new(store: Arc<dyn BridgeStore>) -> Self {
        Self { store }
    }

    /// The external room id mapped to a local room, if any.
    pub async fn external_room_id(
        &self,
        local_room_id: Uuid,
    ) -> Result<Option<String>, BridgeError> {
        self.store.external_room_id(local_room_id).await
    }

    /// The external room id, failing when no mapping exists. Used by
    /// primary-content operations that cannot proceed without one.
    pub async fn require_external_room_id(
        &self,
        local_room_id: Uuid,
    ) -> Result<String, BridgeError> {
        self.store
            .external_room_id(local_room_id)
            .await?
            .ok_or_else(|| BridgeError::MappingNotFound(format!("room {local_room_id}")))
    }

    /// Upsert a room mapping.
    pub async fn create_mapping(
        &self,
        local_room_id: Uuid,
        external_room_id: &str,
        domain: &str,
    ) -> Result<(), BridgeError> {
        self.store.upsert_bridged_room(local_room_id, external_room_id, domain).await
    }
}
