//! Protocol service capability set.
//!
//! The bridge only issues high-level calls against the federation backend —
//! event-graph resolution, signing, and transaction delivery live behind
//! these seams. [`crate::client::ProtocolClient`] is the default HTTP-backed
//! implementation; tests substitute recording fakes.

use std::sync::Arc;

use async_trait::async_trait;
use commune_common::models::FileRecord;

use crate::{
    error::BridgeError,
    types::{ContentUri, CreatedRoom, EventReceipt, FileMessageContent, JoinRule, RemotePresence},
};

// ─── Capabilities ────────────────────────────────────────────────────────────

/// Remote room lifecycle operations.
#[async_trait]
pub trait RoomService: Send + Sync {
    /// Create a room on the remote network on behalf of `creator_id`.
    async fn create_room(
        &self,
        creator_id: &str,
        name: &str,
        join_rule: JoinRule,
    ) -> Result<CreatedRoom, BridgeError>;

    /// Leave a remote room as `user_id`.
    async fn leave_room(&self, room_id: &str, user_id: &str) -> Result<(), BridgeError>;

    /// Remove `kicked_user_id` from a remote room as `sender_id`.
    async fn kick_user(
        &self,
        room_id: &str,
        kicked_user_id: &str,
        sender_id: &str,
        reason: &str,
    ) -> Result<(), BridgeError>;
}

/// Remote invitations.
#[async_trait]
pub trait InviteService: Send + Sync {
    async fn invite_user_to_room(
        &self,
        invitee: &str,
        room_id: &str,
        inviter_id: &str,
    ) -> Result<(), BridgeError>;
}

/// Message delivery, reactions, and redactions.
#[async_trait]
pub trait MessageService: Send + Sync {
    async fn send_message(
        &self,
        room_id: &str,
        body: &str,
        sender_id: &str,
    ) -> Result<EventReceipt, BridgeError>;

    async fn send_file_message(
        &self,
        room_id: &str,
        content: &FileMessageContent,
        sender_id: &str,
    ) -> Result<EventReceipt, BridgeError>;

    /// Send a message inside a thread. `latest_event_id` is the most recent
    /// already-federated sibling reply, when one exists.
    async fn send_thread_message(
        &self,
        room_id: &str,
        body: &str,
        sender_id: &str,
        root_event_id: &str,
        latest_event_id: Option<&str>,
    ) -> Result<EventReceipt, BridgeError>;

    async fn send_reaction(
        &self,
        room_id: &str,
        target_event_id: &str,
        key: &str,
        sender_id: &str,
    ) -> Result<EventReceipt, BridgeError>;

    /// Retract a previously delivered reaction event. Returns `None` when the
    /// remote network no longer knows the event.
    async fn unset_reaction(
        &self,
        room_id: &str,
        reaction_event_id: &str,
        key: &str,
        sender_id: &str,
    ) -> Result<Option<EventReceipt>, BridgeError>;

    async fn redact_message(
        &self,
        room_id: &str,
        event_id: &str,
        sender_id: &str,
    ) -> Result<EventReceipt, BridgeError>;
}

/// Event lookups on the remote network.
#[async_trait]
pub trait EventService: Send + Sync {
    async fn event_by_id(&self, event_id: &str) -> Result<Option<serde_json::Value>, BridgeError>;
}

/// Media repository of the remote network.
#[async_trait]
pub trait MediaService: Send + Sync {
    /// Upload a locally stored file, returning its remote content reference.
    async fn upload_file(
        &self,
        file: &FileRecord,
        data: Vec<u8>,
    ) -> Result<ContentUri, BridgeError>;

    /// Fetch a remote file's bytes. Returns `None` when the remote network
    /// does not know the media.
    async fn download_file(
        &self,
        server: &str,
        media_id: &str,
    ) -> Result<Option<Vec<u8>>, BridgeError>;
}

/// Ephemeral data units — typing and presence.
#[async_trait]
pub trait EduService: Send + Sync {
    async fn send_typing_notification(
        &self,
        room_id: &str,
        user_id: &str,
        is_typing: bool,
    ) -> Result<(), BridgeError>;

    /// One batched presence update covering all given rooms.
    async fn send_presence_update_to_rooms(
        &self,
        updates: &[RemotePresence],
        room_ids: &[String],
    ) -> Result<(), BridgeError>;
}

// ─── Aggregate ───────────────────────────────────────────────────────────────

/// The full capability set the bridge is wired against.
#[derive(Clone)]
pub struct ProtocolServices {
    pub room: Arc<dyn RoomService>,
    pub invite: Arc<dyn InviteService>,
    pub message: Arc<dyn MessageService>,
    pub event: Arc<dyn EventService>,
    pub media: Arc<dyn MediaService>,
    pub edu: Arc<dyn EduService>,
}
