//! Shared in-memory fakes for the crate's tests.

use std::{
    collections::{HashMap, HashSet, VecDeque},
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use commune_common::models::{
    FileFederation, FileRecord, Message, MessageFederation, Room, RoomKind, User, UserStatus,
};
use futures_util::{StreamExt, stream};
use uuid::Uuid;

use crate::{
    domain::SettingsReader,
    error::BridgeError,
    media::{EndpointFetcher, FetchedMedia, MediaEndpoint},
    services::{
        EduService, EventService, InviteService, MediaService, MessageService, ProtocolServices,
        RoomService,
    },
    store::BridgeStore,
    types::{ContentUri, CreatedRoom, EventReceipt, FileMessageContent, JoinRule, RemotePresence},
};

// ─── Fixtures ────────────────────────────────────────────────────────────────

pub fn user(username: &str) -> User {
    User {
        id: Uuid::new_v4(),
        username: username.to_owned(),
        display_name: None,
        status: UserStatus::Online,
        created_at: Utc::now(),
    }
}

pub fn room(kind: RoomKind, federated: bool) -> Room {
    Room {
        id: Uuid::new_v4(),
        kind,
        name: Some("general".to_owned()),
        federated,
        created_at: Utc::now(),
    }
}

pub fn message(room_id: Uuid, author: &User, content: &str) -> Message {
    Message {
        id: Uuid::new_v4(),
        room_id,
        author_id: author.id,
        author_username: author.username.clone(),
        content: content.to_owned(),
        thread_root_id: None,
        file: None,
        attachments: Vec::new(),
        reactions: Default::default(),
        federation: None,
        deleted: false,
        created_at: Utc::now(),
    }
}

/// A remote-origin file whose content reference is the given URI.
pub fn remote_file(content_uri: &str) -> FileRecord {
    FileRecord {
        id: Uuid::new_v4(),
        name: "photo.png".to_owned(),
        content_type: "image/png".to_owned(),
        size: 9,
        width: None,
        height: None,
        storage_key: String::new(),
        federation: Some(FileFederation {
            content_uri: Some(content_uri.to_owned()),
            origin_server: Some("remote.test".to_owned()),
            media_id: Some("abc".to_owned()),
        }),
        uploaded_by: Uuid::new_v4(),
        created_at: Utc::now(),
    }
}

/// A locally uploaded file stored under a storage key.
pub fn local_file(name: &str, content_type: &str) -> FileRecord {
    FileRecord {
        id: Uuid::new_v4(),
        name: name.to_owned(),
        content_type: content_type.to_owned(),
        size: 42,
        width: Some(640),
        height: Some(480),
        storage_key: format!("uploads/{name}"),
        federation: None,
        uploaded_by: Uuid::new_v4(),
        created_at: Utc::now(),
    }
}

// ─── Settings ────────────────────────────────────────────────────────────────

pub struct StaticSettings {
    values: HashMap<String, String>,
    reads: AtomicUsize,
}

impl StaticSettings {
    pub fn new(domain: &str, port: &str) -> Self {
        let mut values = HashMap::new();
        values.insert(crate::domain::FEDERATION_DOMAIN_SETTING.to_owned(), domain.to_owned());
        values.insert(crate::domain::FEDERATION_PORT_SETTING.to_owned(), port.to_owned());
        Self { values, reads: AtomicUsize::new(0) }
    }

    pub fn empty() -> Self {
        Self { values: HashMap::new(), reads: AtomicUsize::new(0) }
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SettingsReader for StaticSettings {
    async fn get(&self, key: &str) -> Result<Option<String>, BridgeError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.values.get(key).cloned())
    }
}

// ─── In-memory store ─────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemStore {
    users: Mutex<Vec<User>>,
    rooms: Mutex<HashMap<Uuid, Room>>,
    messages: Mutex<HashMap<Uuid, Message>>,
    files: Mutex<HashMap<Uuid, FileRecord>>,
    file_bytes: Mutex<HashMap<Uuid, Vec<u8>>>,
    bridged_users: Mutex<HashMap<Uuid, (String, String, bool)>>,
    bridged_rooms: Mutex<HashMap<Uuid, (String, String)>>,
    members: Mutex<HashSet<(Uuid, String)>>,
    added_members: Mutex<Vec<(Uuid, String)>>,
    federated_rooms: Mutex<HashMap<Uuid, Vec<String>>>,
    message_event_ids: Mutex<HashMap<Uuid, String>>,
    reaction_records: Mutex<Vec<(Uuid, String, String, String)>>,
    cleared_reactions: Mutex<Vec<(Uuid, String, String)>>,
    user_upserts: AtomicUsize,
}

impl MemStore {
    // ── Seeding ─────────────────────────────────────────────────────────────

    pub fn seed_user(&self, username: &str) -> User {
        let u = user(username);
        self.users.lock().unwrap().push(u.clone());
        u
    }

    pub fn seed_room(&self, r: &Room) {
        self.rooms.lock().unwrap().insert(r.id, r.clone());
    }

    pub fn seed_message(&self, m: &Message) {
        self.messages.lock().unwrap().insert(m.id, m.clone());
    }

    pub fn seed_file(&self, f: &FileRecord, data: &[u8]) {
        self.files.lock().unwrap().insert(f.id, f.clone());
        self.file_bytes.lock().unwrap().insert(f.id, data.to_vec());
    }

    pub fn seed_bridged_user(&self, local_user_id: Uuid, external: &str, domain: &str) {
        self.bridged_users
            .lock()
            .unwrap()
            .insert(local_user_id, (external.to_owned(), domain.to_owned(), false));
    }

    pub fn seed_bridged_room(&self, local_room_id: Uuid, external: &str, domain: &str) {
        self.bridged_rooms
            .lock()
            .unwrap()
            .insert(local_room_id, (external.to_owned(), domain.to_owned()));
    }

    pub fn seed_member(&self, room_id: Uuid, username: &str) {
        self.members.lock().unwrap().insert((room_id, username.to_owned()));
    }

    pub fn seed_federated_rooms(&self, user_id: Uuid, room_ids: &[&str]) {
        self.federated_rooms
            .lock()
            .unwrap()
            .insert(user_id, room_ids.iter().map(|s| (*s).to_owned()).collect());
    }

    // ── Inspection ──────────────────────────────────────────────────────────

    pub fn bridged_user_count(&self) -> usize {
        self.bridged_users.lock().unwrap().len()
    }

    pub fn user_upserts(&self) -> usize {
        self.user_upserts.load(Ordering::SeqCst)
    }

    pub fn bridged_user(&self, local_user_id: Uuid) -> Option<(String, String, bool)> {
        self.bridged_users.lock().unwrap().get(&local_user_id).cloned()
    }

    pub fn bridged_room(&self, local_room_id: Uuid) -> Option<(String, String)> {
        self.bridged_rooms.lock().unwrap().get(&local_room_id).cloned()
    }

    pub fn message_event_id(&self, message_id: Uuid) -> Option<String> {
        self.message_event_ids.lock().unwrap().get(&message_id).cloned()
    }

    pub fn reaction_records(&self) -> Vec<(Uuid, String, String, String)> {
        self.reaction_records.lock().unwrap().clone()
    }

    pub fn cleared_reactions(&self) -> Vec<(Uuid, String, String)> {
        self.cleared_reactions.lock().unwrap().clone()
    }

    pub fn added_members(&self) -> Vec<(Uuid, String)> {
        self.added_members.lock().unwrap().clone()
    }
}

#[async_trait]
impl BridgeStore for MemStore {
    async fn user_by_username(&self, username: &str) -> Result<Option<User>, BridgeError> {
        Ok(self.users.lock().unwrap().iter().find(|u| u.username == username).cloned())
    }

    async fn external_user_id(&self, local_user_id: Uuid) -> Result<Option<String>, BridgeError> {
        Ok(self.bridged_users.lock().unwrap().get(&local_user_id).map(|(id, _, _)| id.clone()))
    }

    async fn upsert_bridged_user(
        &self,
        local_user_id: Uuid,
        external_user_id: &str,
        domain: &str,
        created_as_owner: bool,
    ) -> Result<(), BridgeError> {
        self.user_upserts.fetch_add(1, Ordering::SeqCst);
        self.bridged_users.lock().unwrap().insert(
            local_user_id,
            (external_user_id.to_owned(), domain.to_owned(), created_as_owner),
        );
        Ok(())
    }

    async fn room_by_id(&self, id: Uuid) -> Result<Option<Room>, BridgeError> {
        Ok(self.rooms.lock().unwrap().get(&id).cloned())
    }

    async fn external_room_id(&self, local_room_id: Uuid) -> Result<Option<String>, BridgeError> {
        Ok(self.bridged_rooms.lock().unwrap().get(&local_room_id).map(|(id, _)| id.clone()))
    }

    async fn upsert_bridged_room(
        &self,
        local_room_id: Uuid,
        external_room_id: &str,
        domain: &str,
    ) -> Result<(), BridgeError> {
        self.bridged_rooms
            .lock()
            .unwrap()
            .insert(local_room_id, (external_room_id.to_owned(), domain.to_owned()));
        Ok(())
    }

    async fn is_room_member(&self, room_id: Uuid, username: &str) -> Result<bool, BridgeError> {
        Ok(self.members.lock().unwrap().contains(&(room_id, username.to_owned())))
    }

    async fn add_room_member(
        &self,
        room_id: Uuid,
        user: &User,
        _invited_by: &User,
    ) -> Result<(), BridgeError> {
        self.members.lock().unwrap().insert((room_id, user.username.clone()));
        self.added_members.lock().unwrap().push((room_id, user.username.clone()));
        Ok(())
    }

    async fn federated_room_ids_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<String>, BridgeError> {
        Ok(self.federated_rooms.lock().unwrap().get(&user_id).cloned().unwrap_or_default())
    }

    async fn message_by_id(&self, id: Uuid) -> Result<Option<Message>, BridgeError> {
        Ok(self.messages.lock().unwrap().get(&id).cloned())
    }

    async fn set_message_event_id(
        &self,
        message_id: Uuid,
        event_id: &str,
    ) -> Result<(), BridgeError> {
        // Write-once, mirroring the SQL guard.
        self.message_event_ids
            .lock()
            .unwrap()
            .entry(message_id)
            .or_insert_with(|| event_id.to_owned());
        if let Some(m) = self.messages.lock().unwrap().get_mut(&message_id) {
            if m.federation.is_none() {
                m.federation = Some(MessageFederation { event_id: event_id.to_owned() });
            }
        }
        Ok(())
    }

    async fn latest_thread_reply_event_id(
        &self,
        thread_root_id: Uuid,
        exclude_id: Uuid,
    ) -> Result<Option<String>, BridgeError> {
        Ok(self
            .messages
            .lock()
            .unwrap()
            .values()
            .filter(|m| {
                m.thread_root_id == Some(thread_root_id)
                    && m.id != exclude_id
                    && m.federation.is_some()
            })
            .max_by_key(|m| m.created_at)
            .and_then(|m| m.federation_event_id().map(str::to_owned)))
    }

    async fn record_reaction_event(
        &self,
        message_id: Uuid,
        shortcode: &str,
        event_id: &str,
        username: &str,
    ) -> Result<(), BridgeError> {
        self.reaction_records.lock().unwrap().push((
            message_id,
            shortcode.to_owned(),
            event_id.to_owned(),
            username.to_owned(),
        ));
        Ok(())
    }

    async fn clear_reaction_event(
        &self,
        message_id: Uuid,
        shortcode: &str,
        event_id: &str,
    ) -> Result<(), BridgeError> {
        self.cleared_reactions.lock().unwrap().push((
            message_id,
            shortcode.to_owned(),
            event_id.to_owned(),
        ));
        Ok(())
    }

    async fn file_by_id(&self, id: Uuid) -> Result<Option<FileRecord>, BridgeError> {
        Ok(self.files.lock().unwrap().get(&id).cloned())
    }

    async fn file_data(&self, file: &FileRecord) -> Result<Vec<u8>, BridgeError> {
        Ok(self.file_bytes.lock().unwrap().get(&file.id).cloned().unwrap_or_default())
    }
}

// ─── Recording protocol services ─────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingServices {
    event_counter: AtomicUsize,
    created_rooms: Mutex<Vec<(String, String, JoinRule)>>,
    invites: Mutex<Vec<(String, String, String)>>,
    failing_invitees: Mutex<HashSet<String>>,
    sent_messages: Mutex<Vec<(String, String, String)>>,
    sent_files: Mutex<Vec<(String, FileMessageContent, String)>>,
    sent_threads: Mutex<Vec<(String, String, String, String, Option<String>)>>,
    reactions: Mutex<Vec<(String, String, String, String)>>,
    unset_reactions: Mutex<Vec<(String, String, String, String)>>,
    redactions: Mutex<Vec<(String, String, String)>>,
    leaves: Mutex<Vec<(String, String)>>,
    kicks: Mutex<Vec<(String, String, String, String)>>,
    uploads: Mutex<Vec<Uuid>>,
    downloads: Mutex<Vec<(String, String)>>,
    typing: Mutex<Vec<(String, String, bool)>>,
    presence: Mutex<Vec<(Vec<RemotePresence>, Vec<String>)>>,
}

impl RecordingServices {
    fn next_event_id(&self) -> EventReceipt {
        let n = self.event_counter.fetch_add(1, Ordering::SeqCst) + 1;
        EventReceipt { event_id: format!("$ev{n}:remote.test") }
    }

    /// Make future invites for this exact invitee fail.
    pub fn fail_invitee(&self, invitee: &str) {
        self.failing_invitees.lock().unwrap().insert(invitee.to_owned());
    }

    pub fn created_rooms(&self) -> Vec<(String, String, JoinRule)> {
        self.created_rooms.lock().unwrap().clone()
    }

    pub fn invites(&self) -> Vec<(String, String, String)> {
        self.invites.lock().unwrap().clone()
    }

    pub fn sent_messages(&self) -> Vec<(String, String, String)> {
        self.sent_messages.lock().unwrap().clone()
    }

    pub fn sent_files(&self) -> Vec<(String, FileMessageContent, String)> {
        self.sent_files.lock().unwrap().clone()
    }

    pub fn sent_threads(&self) -> Vec<(String, String, String, String, Option<String>)> {
        self.sent_threads.lock().unwrap().clone()
    }

    pub fn reactions(&self) -> Vec<(String, String, String, String)> {
        self.reactions.lock().unwrap().clone()
    }

    pub fn unset_reactions(&self) -> Vec<(String, String, String, String)> {
        self.unset_reactions.lock().unwrap().clone()
    }

    pub fn redactions(&self) -> Vec<(String, String, String)> {
        self.redactions.lock().unwrap().clone()
    }

    pub fn leaves(&self) -> Vec<(String, String)> {
        self.leaves.lock().unwrap().clone()
    }

    pub fn kicks(&self) -> Vec<(String, String, String, String)> {
        self.kicks.lock().unwrap().clone()
    }

    pub fn uploads(&self) -> Vec<Uuid> {
        self.uploads.lock().unwrap().clone()
    }

    pub fn downloads(&self) -> Vec<(String, String)> {
        self.downloads.lock().unwrap().clone()
    }

    pub fn typing(&self) -> Vec<(String, String, bool)> {
        self.typing.lock().unwrap().clone()
    }

    pub fn presence(&self) -> Vec<(Vec<RemotePresence>, Vec<String>)> {
        self.presence.lock().unwrap().clone()
    }
}

/// Bundle one recording fake into the full capability set.
pub fn protocol_services(recorder: &std::sync::Arc<RecordingServices>) -> ProtocolServices {
    ProtocolServices {
        room: recorder.clone(),
        invite: recorder.clone(),
        message: recorder.clone(),
        event: recorder.clone(),
        media: recorder.clone(),
        edu: recorder.clone(),
    }
}

#[async_trait]
impl RoomService for RecordingServices {
    async fn create_room(
        &self,
        creator_id: &str,
        name: &str,
        join_rule: JoinRule,
    ) -> Result<CreatedRoom, BridgeError> {
        self.created_rooms.lock().unwrap().push((
            creator_id.to_owned(),
            name.to_owned(),
            join_rule,
        ));
        Ok(CreatedRoom { room_id: "!room:remote.test".to_owned() })
    }

    async fn leave_room(&self, room_id: &str, user_id: &str) -> Result<(), BridgeError> {
        self.leaves.lock().unwrap().push((room_id.to_owned(), user_id.to_owned()));
        Ok(())
    }

    async fn kick_user(
        &self,
        room_id: &str,
        kicked_user_id: &str,
        sender_id: &str,
        reason: &str,
    ) -> Result<(), BridgeError> {
        self.kicks.lock().unwrap().push((
            room_id.to_owned(),
            kicked_user_id.to_owned(),
            sender_id.to_owned(),
            reason.to_owned(),
        ));
        Ok(())
    }
}

#[async_trait]
impl InviteService for RecordingServices {
    async fn invite_user_to_room(
        &self,
        invitee: &str,
        room_id: &str,
        inviter_id: &str,
    ) -> Result<(), BridgeError> {
        if self.failing_invitees.lock().unwrap().contains(invitee) {
            return Err(BridgeError::Remote(403, "forbidden".to_owned()));
        }
        self.invites.lock().unwrap().push((
            invitee.to_owned(),
            room_id.to_owned(),
            inviter_id.to_owned(),
        ));
        Ok(())
    }
}

#[async_trait]
impl MessageService for RecordingServices {
    async fn send_message(
        &self,
        room_id: &str,
        body: &str,
        sender_id: &str,
    ) -> Result<EventReceipt, BridgeError> {
        self.sent_messages.lock().unwrap().push((
            room_id.to_owned(),
            body.to_owned(),
            sender_id.to_owned(),
        ));
        Ok(self.next_event_id())
    }

    async fn send_file_message(
        &self,
        room_id: &str,
        content: &FileMessageContent,
        sender_id: &str,
    ) -> Result<EventReceipt, BridgeError> {
        self.sent_files.lock().unwrap().push((
            room_id.to_owned(),
            content.clone(),
            sender_id.to_owned(),
        ));
        Ok(self.next_event_id())
    }

    async fn send_thread_message(
        &self,
        room_id: &str,
        body: &str,
        sender_id: &str,
        root_event_id: &str,
        latest_event_id: Option<&str>,
    ) -> Result<EventReceipt, BridgeError> {
        self.sent_threads.lock().unwrap().push((
            room_id.to_owned(),
            body.to_owned(),
            sender_id.to_owned(),
            root_event_id.to_owned(),
            latest_event_id.map(str::to_owned),
        ));
        Ok(self.next_event_id())
    }

    async fn send_reaction(
        &self,
        room_id: &str,
        target_event_id: &str,
        key: &str,
        sender_id: &str,
    ) -> Result<EventReceipt, BridgeError> {
        self.reactions.lock().unwrap().push((
            room_id.to_owned(),
            target_event_id.to_owned(),
            key.to_owned(),
            sender_id.to_owned(),
        ));
        Ok(self.next_event_id())
    }

    async fn unset_reaction(
        &self,
        room_id: &str,
        reaction_event_id: &str,
        key: &str,
        sender_id: &str,
    ) -> Result<Option<EventReceipt>, BridgeError> {
        self.unset_reactions.lock().unwrap().push((
            room_id.to_owned(),
            reaction_event_id.to_owned(),
            key.to_owned(),
            sender_id.to_owned(),
        ));
        Ok(Some(self.next_event_id()))
    }

    async fn redact_message(
        &self,
        room_id: &str,
        event_id: &str,
        sender_id: &str,
    ) -> Result<EventReceipt, BridgeError> {
        self.redactions.lock().unwrap().push((
            room_id.to_owned(),
            event_id.to_owned(),
            sender_id.to_owned(),
        ));
        Ok(self.next_event_id())
    }
}

#[async_trait]
impl EventService for RecordingServices {
    async fn event_by_id(
        &self,
        _event_id: &str,
    ) -> Result<Option<serde_json::Value>, BridgeError> {
        Ok(None)
    }
}

#[async_trait]
impl MediaService for RecordingServices {
    async fn upload_file(
        &self,
        file: &FileRecord,
        _data: Vec<u8>,
    ) -> Result<ContentUri, BridgeError> {
        self.uploads.lock().unwrap().push(file.id);
        Ok(ContentUri { server: "media.test".to_owned(), media_id: file.id.simple().to_string() })
    }

    async fn download_file(
        &self,
        server: &str,
        media_id: &str,
    ) -> Result<Option<Vec<u8>>, BridgeError> {
        self.downloads.lock().unwrap().push((server.to_owned(), media_id.to_owned()));
        Ok(Some(b"remote bytes".to_vec()))
    }
}

#[async_trait]
impl EduService for RecordingServices {
    async fn send_typing_notification(
        &self,
        room_id: &str,
        user_id: &str,
        is_typing: bool,
    ) -> Result<(), BridgeError> {
        self.typing.lock().unwrap().push((room_id.to_owned(), user_id.to_owned(), is_typing));
        Ok(())
    }

    async fn send_presence_update_to_rooms(
        &self,
        updates: &[RemotePresence],
        room_ids: &[String],
    ) -> Result<(), BridgeError> {
        self.presence.lock().unwrap().push((updates.to_vec(), room_ids.to_vec()));
        Ok(())
    }
}

// ─── Fake media fetcher ──────────────────────────────────────────────────────

pub struct FakeFetcher {
    outcomes: Mutex<VecDeque<Result<Vec<u8>, String>>>,
    calls: Mutex<Vec<&'static str>>,
    urls: Mutex<Vec<String>>,
}

impl FakeFetcher {
    pub fn scripted(outcomes: Vec<Result<Vec<u8>, String>>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into()),
            calls: Mutex::new(Vec::new()),
            urls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().unwrap().clone()
    }
}

#[async_trait]
impl EndpointFetcher for FakeFetcher {
    async fn fetch(&self, endpoint: &MediaEndpoint) -> Result<FetchedMedia, String> {
        self.calls.lock().unwrap().push(endpoint.name);
        self.urls.lock().unwrap().push(endpoint.url.clone());
        match self.outcomes.lock().unwrap().pop_front() {
            Some(Ok(bytes)) => Ok(FetchedMedia {
                content_type: Some("image/png".to_owned()),
                content_length: Some(bytes.len() as u64),
                body: stream::iter(vec![Ok(Bytes::from(bytes))]).boxed(),
            }),
            Some(Err(e)) => Err(e),
            None => Err(format!("{}: no scripted response", endpoint.name)),
        }
    }
}

// ─── Recording media sink ────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemSink {
    pub status: Option<u16>,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl MemSink {
    pub fn header(&self, name: &str) -> Option<String> {
        self.headers.iter().find(|(n, _)| n == name).map(|(_, v)| v.clone())
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[async_trait]
impl crate::media::MediaSink for MemSink {
    fn set_status(&mut self, status: u16) {
        self.status = Some(status);
    }

    fn set_header(&mut self, name: &str, value: &str) {
        self.headers.push((name.to_owned(), value.to_owned()));
    }

    async fn write(&mut self, chunk: &[u8]) -> std::io::Result<()> {
        self.body.extend_from_slice(chunk);
        Ok(())
    }
}
