//! The federation bridge — translates local room actions into protocol calls.
//!
//! Every operation resolves identities through the mapping store, creating
//! missing user mappings lazily on first federation touch-point. Operations
//! gating primary content (message send, redaction) fail hard when required
//! mappings are absent; social operations (reactions, leave, kick) degrade
//! silently because a purely local room or an unmapped user is a valid,
//! non-exceptional state.

use std::sync::Arc;

use commune_common::models::{Message, Room, RoomKind, User};
use futures_util::future::join_all;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
    domain::{DomainResolver, SettingsReader},
    error::BridgeError,
    identity::{RoomBridge, UserBridge},
    media::MediaProxy,
    services::ProtocolServices,
    store::BridgeStore,
    types::{FileMessageContent, JoinRule, mxid},
};

/// Translates local actions into protocol calls and keeps the mapping store
/// consistent with what the remote network knows.
pub struct FederationBridge {
    store: Arc<dyn BridgeStore>,
    users: UserBridge,
    rooms: RoomBridge,
    domain: DomainResolver,
    services: Option<ProtocolServices>,
    media: Option<Arc<MediaProxy>>,
}

impl FederationBridge {
    /// A bridge with no protocol services wired. Every remote operation
    /// fails with [`BridgeError::ServiceUnavailable`] until
    /// [`FederationBridge::with_services`] is used instead.
    pub fn new(store: Arc<dyn BridgeStore>, settings: Arc<dyn SettingsReader>) -> Self {
        Self::build(store, settings, None)
    }

    pub fn with_services(
        store: Arc<dyn BridgeStore>,
        settings: Arc<dyn SettingsReader>,
        services: ProtocolServices,
    ) -> Self {
        Self::build(store, settings, Some(services))
    }

    fn build(
        store: Arc<dyn BridgeStore>,
        settings: Arc<dyn SettingsReader>,
        services: Option<ProtocolServices>,
    ) -> Self {
        let media = services
            .as_ref()
            .map(|s| Arc::new(MediaProxy::new(store.clone(), s.media.clone())));
        Self {
            users: UserBridge::new(store.clone()),
            rooms: RoomBridge::new(store.clone()),
            domain: DomainResolver::new(settings),
            store,
            services,
            media,
        }
    }

    fn services(&self) -> Result<&ProtocolServices, BridgeError> {
        self.services.as_ref().ok_or(BridgeError::ServiceUnavailable)
    }

    fn media(&self) -> Result<&Arc<MediaProxy>, BridgeError> {
        self.media.as_ref().ok_or(BridgeError::ServiceUnavailable)
    }

    /// The media proxy, when protocol services are wired. The HTTP media
    /// boundary calls this directly to stream remote files.
    pub fn media_proxy(&self) -> Option<Arc<MediaProxy>> {
        self.media.clone()
    }

    // ── Room creation ───────────────────────────────────────────────────────

    /// Create the remote counterpart of a local room and invite its members.
    ///
    /// Failure of the remote room-create aborts the whole operation; failures
    /// of individual member invites are logged and do not affect siblings.
    pub async fn create_room(
        &self,
        room: &Room,
        owner: &User,
        member_usernames: &[String],
    ) -> Result<(), BridgeError> {
        if !matches!(room.kind, RoomKind::Public | RoomKind::Private) {
            return Err(BridgeError::Validation(
                "room is not a public or private room".to_owned(),
            ));
        }
        let services = self.services()?;

        let domain = self.domain.resolve().await?;
        let owner_id = self
            .store
            .external_user_id(owner.id)
            .await?
            .unwrap_or_else(|| mxid(&owner.username, &domain));

        let join_rule =
            if room.kind == RoomKind::Public { JoinRule::Public } else { JoinRule::Invite };
        let created = services.room.create_room(&owner_id, room.display_name(), join_rule).await?;
        debug!(room = %room.id, external = %created.room_id, "External room created");

        self.rooms.create_mapping(room.id, &created.room_id, &domain).await?;
        self.store.upsert_bridged_user(owner.id, &owner_id, &domain, true).await?;

        let targets: Vec<&String> =
            member_usernames.iter().filter(|m| *m != &owner.username).collect();
        let results = join_all(targets.iter().map(|member| {
            self.invite_room_member(member.as_str(), &created.room_id, &owner_id, &domain)
        }))
        .await;

        let mut failed = 0usize;
        for (member, result) in targets.iter().zip(&results) {
            if let Err(e) = result {
                warn!(member = %member, error = %e, "Failed to invite member during room creation");
                failed += 1;
            }
        }
        if failed > 0 {
            debug!(failed, total = targets.len(), "Room-creation invites finished with failures");
        }

        debug!(room = %room.id, "Room creation completed");
        Ok(())
    }

    async fn invite_room_member(
        &self,
        member: &str,
        external_room_id: &str,
        inviter_id: &str,
        domain: &str,
    ) -> Result<(), BridgeError> {
        let services = self.services()?;

        if member.contains(':') {
            // Already-external name; its mapping is created once the invite
            // is accepted.
            return services.invite.invite_user_to_room(member, external_room_id, inviter_id).await;
        }

        match self.store.user_by_username(member).await? {
            Some(local) => {
                let external =
                    self.users.resolve_or_create(local.id, &local.username, domain, false).await?;
                services.invite.invite_user_to_room(&external, external_room_id, inviter_id).await
            }
            None => {
                services.invite.invite_user_to_room(member, external_room_id, inviter_id).await
            }
        }
    }

    // ── Message send ────────────────────────────────────────────────────────

    /// Deliver a local message to the federation network.
    ///
    /// Dispatch priority, first match wins: attached file → file message;
    /// non-thread → plain message; thread reply whose root is federated →
    /// threaded message, degrading to plain when the root has no external
    /// event id. The returned event id is persisted on the message
    /// (write-once).
    pub async fn send_message(
        &self,
        message: &Message,
        room: &Room,
        user: &User,
    ) -> Result<(), BridgeError> {
        let services = self.services()?;
        let external_room_id = self.rooms.require_external_room_id(room.id).await?;

        let domain = self.domain.resolve().await?;
        let sender = self.users.resolve_or_create(user.id, &user.username, &domain, true).await?;

        let receipt = match self.resolve_attached_file(message).await? {
            Some(file) => {
                let uri = self.media()?.prepare_local_file(file.id).await?;
                let content = FileMessageContent::from_file(&file, &uri);
                services.message.send_file_message(&external_room_id, &content, &sender).await?
            }
            None => match message.thread_root_id {
                None => {
                    services.message.send_message(&external_room_id, &message.content, &sender).await?
                }
                Some(root_id) => {
                    let root_event_id = self
                        .store
                        .message_by_id(root_id)
                        .await?
                        .and_then(|root| root.federation_event_id().map(str::to_owned));
                    match root_event_id {
                        Some(root_event_id) => {
                            let latest = self
                                .store
                                .latest_thread_reply_event_id(root_id, message.id)
                                .await?;
                            services
                                .message
                                .send_thread_message(
                                    &external_room_id,
                                    &message.content,
                                    &sender,
                                    &root_event_id,
                                    latest.as_deref(),
                                )
                                .await?
                        }
                        None => {
                            warn!(message = %message.id,
                                "Thread root has no external event id, sending as plain message");
                            services
                                .message
                                .send_message(&external_room_id, &message.content, &sender)
                                .await?
                        }
                    }
                }
            },
        };

        self.store.set_message_event_id(message.id, &receipt.event_id).await?;
        debug!(message = %message.id, event = %receipt.event_id, "Message delivered");
        Ok(())
    }

    /// The attached file record, checking the direct attachment first and the
    /// legacy attachment list second. A dangling file id resolves to `None`.
    async fn resolve_attached_file(
        &self,
        message: &Message,
    ) -> Result<Option<commune_common::models::FileRecord>, BridgeError> {
        match message.attached_file_id() {
            Some(file_id) => self.store.file_by_id(file_id).await,
            None => Ok(None),
        }
    }

    // ── Redaction ───────────────────────────────────────────────────────────

    /// Redact a message on the remote network.
    ///
    /// A message that never crossed the bridge, or was already deleted, is a
    /// silent no-op.
    pub async fn delete_message(&self, message: &Message) -> Result<(), BridgeError> {
        if !message.is_federated() || message.deleted {
            return Ok(());
        }
        let services = self.services()?;

        let external_room_id = self.rooms.require_external_room_id(message.room_id).await?;
        let event_id = message.federation_event_id().ok_or_else(|| {
            BridgeError::MappingNotFound(format!("message {} event id", message.id))
        })?;

        let domain = self.domain.resolve().await?;
        let sender = self
            .users
            .resolve_or_create(message.author_id, &message.author_username, &domain, true)
            .await?;

        let receipt = services.message.redact_message(&external_room_id, event_id, &sender).await?;
        debug!(message = %message.id, event = %receipt.event_id, "Redaction delivered");
        Ok(())
    }

    // ── Reactions ───────────────────────────────────────────────────────────

    /// Deliver a reaction to the remote network.
    ///
    /// Message, room mapping and message event id are required; the acting
    /// user's mapping must already exist — reactions never create one, they
    /// are dropped instead.
    pub async fn send_reaction(
        &self,
        message_id: Uuid,
        shortcode: &str,
        user: &User,
    ) -> Result<(), BridgeError> {
        let services = self.services()?;

        let message = self
            .store
            .message_by_id(message_id)
            .await?
            .ok_or_else(|| BridgeError::NotFound(format!("message {message_id}")))?;
        let external_room_id = self.rooms.require_external_room_id(message.room_id).await?;
        let target_event_id = message.federation_event_id().ok_or_else(|| {
            BridgeError::MappingNotFound(format!("message {message_id} event id"))
        })?;

        let key = crate::types::canonical_reaction_key(shortcode);

        let Some(sender) = self.store.external_user_id(user.id).await? else {
            error!(user = %user.id, "No external user mapping for reaction sender");
            return Ok(());
        };

        let receipt =
            services.message.send_reaction(&external_room_id, target_event_id, &key, &sender).await?;
        self.store
            .record_reaction_event(message_id, shortcode, &receipt.event_id, &user.username)
            .await?;
        debug!(message = %message_id, event = %receipt.event_id, "Reaction delivered");
        Ok(())
    }

    /// Retract this user's reaction on the remote network.
    ///
    /// Scans the shortcode's recorded reaction events for the acting user,
    /// unsets the first match, and clears that entry. Every missing
    /// precondition is a soft fail.
    pub async fn remove_reaction(
        &self,
        message_id: Uuid,
        shortcode: &str,
        user: &User,
        old_message: &Message,
    ) -> Result<(), BridgeError> {
        let services = self.services()?;

        let Some(message) = self.store.message_by_id(message_id).await? else {
            error!(message = %message_id, "Message not found for reaction removal");
            return Ok(());
        };
        if message.federation_event_id().is_none() {
            warn!(message = %message_id, "No external event id on message, skipping unreact");
            return Ok(());
        }
        let Some(external_room_id) = self.rooms.external_room_id(message.room_id).await? else {
            error!(room = %message.room_id, "No room mapping found for reaction removal");
            return Ok(());
        };
        let Some(sender) = self.store.external_user_id(user.id).await? else {
            error!(user = %user.id, "No external user mapping for reaction removal");
            return Ok(());
        };
        let Some(reaction) = old_message.reactions.get(shortcode) else {
            return Ok(());
        };

        let key = crate::types::canonical_reaction_key(shortcode);

        for (event_id, username) in &reaction.federation_event_ids {
            if username != &user.username {
                continue;
            }

            let Some(receipt) =
                services.message.unset_reaction(&external_room_id, event_id, &key, &sender).await?
            else {
                warn!(event = %event_id, "No reaction event found to remove on remote network");
                return Ok(());
            };

            self.store.clear_reaction_event(message_id, shortcode, event_id).await?;
            debug!(message = %message_id, event = %receipt.event_id, "Reaction retracted");
            break;
        }

        Ok(())
    }

    // ── Invitations ─────────────────────────────────────────────────────────

    /// Invite a batch of users to a federated room.
    ///
    /// Targets run concurrently and independently; one target's failure never
    /// aborts the batch. Targets already in the room are skipped.
    pub async fn invite_users(
        &self,
        room: &Room,
        usernames: &[String],
        inviter: &User,
    ) -> Result<(), BridgeError> {
        self.services()?;
        let external_room_id = self.rooms.require_external_room_id(room.id).await?;

        let domain = self.domain.resolve().await?;
        let inviter_id = mxid(&inviter.username, &domain);

        let results = join_all(usernames.iter().map(|username| {
            self.invite_target(username, room, &external_room_id, &inviter_id, inviter, &domain)
        }))
        .await;

        for (username, result) in usernames.iter().zip(&results) {
            if let Err(e) = result {
                warn!(target = %username, error = %e, "Failed to invite user");
            }
        }

        Ok(())
    }

    async fn invite_target(
        &self,
        username: &str,
        room: &Room,
        external_room_id: &str,
        inviter_id: &str,
        inviter: &User,
        domain: &str,
    ) -> Result<(), BridgeError> {
        let services = self.services()?;

        if self.store.is_room_member(room.id, username).await? {
            return Ok(());
        }

        if username.contains(':') {
            // External-style name. When it collides with a local account the
            // invite goes out under a disambiguating prefix so it cannot be
            // confused with that account's own external identity.
            let collides = self.store.user_by_username(username).await?.is_some();
            let invitee =
                if collides { format!("@{username}") } else { username.to_owned() };
            return services.invite.invite_user_to_room(&invitee, external_room_id, inviter_id).await;
        }

        let Some(local) = self.store.user_by_username(username).await? else {
            return Ok(());
        };
        self.store.add_room_member(room.id, &local, inviter).await?;
        let external = self.users.resolve_or_create(local.id, &local.username, domain, false).await?;
        services.invite.invite_user_to_room(&external, external_room_id, inviter_id).await
    }

    // ── Leave / kick ────────────────────────────────────────────────────────

    /// Leave the remote counterpart of a room.
    ///
    /// A room without federation metadata or without a mapping is a valid
    /// local-only state — no remote call is made.
    pub async fn leave_room(&self, room_id: Uuid, user: &User) -> Result<(), BridgeError> {
        let Some(room) = self.store.room_by_id(room_id).await? else {
            debug!(room = %room_id, "Room not found, skipping leave");
            return Ok(());
        };
        if !room.federated {
            debug!(room = %room_id, "Room is not federated, skipping leave");
            return Ok(());
        }
        let Some(external_room_id) = self.rooms.external_room_id(room_id).await? else {
            debug!(room = %room_id, "No room mapping for federated room, skipping leave");
            return Ok(());
        };

        let services = self.services()?;
        let domain = self.domain.resolve().await?;
        let user_id = self.users.resolve_or_create(user.id, &user.username, &domain, true).await?;

        services.room.leave_room(&external_room_id, &user_id).await?;
        info!(user = %user.username, room = %external_room_id, "User left federated room");
        Ok(())
    }

    /// Kick a user from the remote counterpart of a room.
    ///
    /// Same no-op semantics as [`FederationBridge::leave_room`] for
    /// non-federated rooms; mappings for both users are created lazily.
    pub async fn kick_user(
        &self,
        room_id: Uuid,
        removed: &User,
        removed_by: &User,
    ) -> Result<(), BridgeError> {
        let Some(room) = self.store.room_by_id(room_id).await? else {
            debug!(room = %room_id, "Room not found, skipping kick");
            return Ok(());
        };
        if !room.federated {
            debug!(room = %room_id, "Room is not federated, skipping kick");
            return Ok(());
        }
        let Some(external_room_id) = self.rooms.external_room_id(room_id).await? else {
            debug!(room = %room_id, "No room mapping for federated room, skipping kick");
            return Ok(());
        };

        let services = self.services()?;
        let domain = self.domain.resolve().await?;
        let kicked_id =
            self.users.resolve_or_create(removed.id, &removed.username, &domain, true).await?;
        let sender_id = self
            .users
            .resolve_or_create(removed_by.id, &removed_by.username, &domain, true)
            .await?;

        services
            .room
            .kick_user(
                &external_room_id,
                &kicked_id,
                &sender_id,
                &format!("Kicked by {}", removed_by.username),
            )
            .await?;
        info!(user = %removed.username, room = %external_room_id, by = %removed_by.username,
            "User kicked from federated room");
        Ok(())
    }

    // ── Event lookup ────────────────────────────────────────────────────────

    /// Fetch a remote event by its external id.
    pub async fn get_event_by_id(
        &self,
        event_id: &str,
    ) -> Result<Option<serde_json::Value>, BridgeError> {
        self.services()?.event.event_by_id(event_id).await
    }
}
