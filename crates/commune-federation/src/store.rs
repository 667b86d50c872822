//! Persistence collaborator surface of the bridge.
//!
//! [`BridgeStore`] captures exactly what the bridge reads and upserts:
//! identity/room mappings, federation-related message fields, membership,
//! and file records. The schema itself is owned by `commune-db`; [`PgStore`]
//! is the production implementation over it.

use async_trait::async_trait;
use commune_common::models::{FileRecord, Message, Room, User};
use commune_db::{Database, repository, storage::StorageClient};
use uuid::Uuid;

use crate::error::BridgeError;

// ─── Store trait ─────────────────────────────────────────────────────────────

#[async_trait]
pub trait BridgeStore: Send + Sync {
    // ── Users & identity mappings ───────────────────────────────────────────

    async fn user_by_username(&self, username: &str) -> Result<Option<User>, BridgeError>;

    async fn external_user_id(&self, local_user_id: Uuid) -> Result<Option<String>, BridgeError>;

    /// Upsert a user mapping. Converges under concurrent creation thanks to
    /// the uniqueness constraint on the local id.
    async fn upsert_bridged_user(
        &self,
        local_user_id: Uuid,
        external_user_id: &str,
        domain: &str,
        created_as_owner: bool,
    ) -> Result<(), BridgeError>;

    // ── Rooms & room mappings ───────────────────────────────────────────────

    async fn room_by_id(&self, id: Uuid) -> Result<Option<Room>, BridgeError>;

    async fn external_room_id(&self, local_room_id: Uuid) -> Result<Option<String>, BridgeError>;

    async fn upsert_bridged_room(
        &self,
        local_room_id: Uuid,
        external_room_id: &str,
        domain: &str,
    ) -> Result<(), BridgeError>;

    // ── Membership ──────────────────────────────────────────────────────────

    async fn is_room_member(&self, room_id: Uuid, username: &str) -> Result<bool, BridgeError>;

    async fn add_room_member(
        &self,
        room_id: Uuid,
        user: &User,
        invited_by: &User,
    ) -> Result<(), BridgeError>;

    /// External room ids of every federated room the user belongs to.
    async fn federated_room_ids_for_user(&self, user_id: Uuid)
    -> Result<Vec<String>, BridgeError>;

    // ── Messages ────────────────────────────────────────────────────────────

    async fn message_by_id(&self, id: Uuid) -> Result<Option<Message>, BridgeError>;

    /// Record the external event id for a message. Write-once — a message
    /// that already has one keeps it.
    async fn set_message_event_id(
        &self,
        message_id: Uuid,
        event_id: &str,
    ) -> Result<(), BridgeError>;

    /// Newest thread reply that already carries an external event id,
    /// excluding the given message.
    async fn latest_thread_reply_event_id(
        &self,
        thread_root_id: Uuid,
        exclude_id: Uuid,
    ) -> Result<Option<String>, BridgeError>;

    async fn record_reaction_event(
        &self,
        message_id: Uuid,
        shortcode: &str,
        event_id: &str,
        username: &str,
    ) -> Result<(), BridgeError>;

    async fn clear_reaction_event(
        &self,
        message_id: Uuid,
        shortcode: &str,
        event_id: &str,
    ) -> Result<(), BridgeError>;

    // ── Files ───────────────────────────────────────────────────────────────

    async fn file_by_id(&self, id: Uuid) -> Result<Option<FileRecord>, BridgeError>;

    /// Read the stored bytes of a locally uploaded file.
    async fn file_data(&self, file: &FileRecord) -> Result<Vec<u8>, BridgeError>;
}

// ─── PostgreSQL implementation ───────────────────────────────────────────────

/// Production store over PostgreSQL and object storage.
#[derive(Clone)]
pub struct PgStore {
    db: Database,
    storage: StorageClient,
}

impl PgStore {
    pub fn new(db: Database, storage: StorageClient) -> Self {
        Self { db, storage }
    }
}

#[async_trait]
impl BridgeStore for PgStore {
    async fn user_by_username(&self, username: &str) -> Result<Option<User>, BridgeError> {
        Ok(repository::users::find_by_username(&self.db.pg, username).await?)
    }

    async fn external_user_id(&self, local_user_id: Uuid) -> Result<Option<String>, BridgeError> {
        Ok(repository::bridged_users::external_id_by_local_id(&self.db.pg, local_user_id).await?)
    }

    async fn upsert_bridged_user(
        &self,
        local_user_id: Uuid,
        external_user_id: &str,
        domain: &str,
        created_as_owner: bool,
    ) -> Result<(), BridgeError> {
        Ok(repository::bridged_users::create_or_update(
            &self.db.pg,
            local_user_id,
            external_user_id,
            domain,
            created_as_owner,
        )
        .await?)
    }

    async fn room_by_id(&self, id: Uuid) -> Result<Option<Room>, BridgeError> {
        Ok(repository::rooms::find_by_id(&self.db.pg, id).await?)
    }

    async fn external_room_id(&self, local_room_id: Uuid) -> Result<Option<String>, BridgeError> {
        Ok(repository::bridged_rooms::external_id_by_local_id(&self.db.pg, local_room_id).await?)
    }

    async fn upsert_bridged_room(
        &self,
        local_room_id: Uuid,
        external_room_id: &str,
        domain: &str,
    ) -> Result<(), BridgeError> {
        Ok(repository::bridged_rooms::create_or_update(
            &self.db.pg,
            local_room_id,
            external_room_id,
            domain,
        )
        .await?)
    }

    async fn is_room_member(&self, room_id: Uuid, username: &str) -> Result<bool, BridgeError> {
        Ok(repository::subscriptions::is_member(&self.db.pg, room_id, username).await?)
    }

    async fn add_room_member(
        &self,
        room_id: Uuid,
        user: &User,
        invited_by: &User,
    ) -> Result<(), BridgeError> {
        Ok(repository::subscriptions::add_member(
            &self.db.pg,
            room_id,
            user.id,
            &user.username,
            invited_by.id,
        )
        .await?)
    }

    async fn federated_room_ids_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<String>, BridgeError> {
        Ok(repository::subscriptions::federated_room_ids(&self.db.pg, user_id).await?)
    }

    async fn message_by_id(&self, id: Uuid) -> Result<Option<Message>, BridgeError> {
        match repository::messages::find_by_id(&self.db.pg, id).await? {
            Some(row) => Ok(Some(row.into_message()?)),
            None => Ok(None),
        }
    }

    async fn set_message_event_id(
        &self,
        message_id: Uuid,
        event_id: &str,
    ) -> Result<(), BridgeError> {
        repository::messages::set_federation_event_id(&self.db.pg, message_id, event_id).await?;
        Ok(())
    }

    async fn latest_thread_reply_event_id(
        &self,
        thread_root_id: Uuid,
        exclude_id: Uuid,
    ) -> Result<Option<String>, BridgeError> {
        Ok(repository::messages::latest_thread_reply_event_id(
            &self.db.pg,
            thread_root_id,
            exclude_id,
        )
        .await?)
    }

    async fn record_reaction_event(
        &self,
        message_id: Uuid,
        shortcode: &str,
        event_id: &str,
        username: &str,
    ) -> Result<(), BridgeError> {
        Ok(repository::messages::set_reaction_event_id(
            &self.db.pg,
            message_id,
            shortcode,
            event_id,
            username,
        )
        .await?)
    }

    async fn clear_reaction_event(
        &self,
        message_id: Uuid,
        shortcode: &str,
        event_id: &str,
    ) -> Result<(), BridgeError> {
        Ok(repository::messages::unset_reaction_event_id(
            &self.db.pg,
            message_id,
            shortcode,
            event_id,
        )
        .await?)
    }

    async fn file_by_id(&self, id: Uuid) -> Result<Option<FileRecord>, BridgeError> {
        match repository::uploads::find_by_id(&self.db.pg, id).await? {
            Some(row) => Ok(Some(row.into_file_record()?)),
            None => Ok(None),
        }
    }

    async fn file_data(&self, file: &FileRecord) -> Result<Vec<u8>, BridgeError> {
        Ok(self.storage.get_object(&file.storage_key).await?)
    }
}

#[async_trait]
impl crate::domain::SettingsReader for PgStore {
    async fn get(&self, key: &str) -> Result<Option<String>, BridgeError> {
        Ok(repository::settings::get(&self.db.pg, key).await?)
    }
}
