//! HTTP client for the protocol service capability set.
//!
//! The default production implementation of the traits in
//! [`crate::services`]. Authenticates against the homeserver as an
//! application service (bearer token) and acts on behalf of bridged users
//! via the `user_id` impersonation query parameter.

use std::time::Duration;

use async_trait::async_trait;
use commune_common::models::FileRecord;
use reqwest::Method;
use serde_json::{Value, json};
use tracing::debug;

use crate::{
    error::BridgeError,
    services::{
        EduService, EventService, InviteService, MediaService, MessageService, RoomService,
    },
    types::{ContentUri, CreatedRoom, EventReceipt, FileMessageContent, JoinRule, RemotePresence},
};

/// Typing notifications carry a fixed validity window.
const TYPING_TIMEOUT_MS: u64 = 30_000;

/// Configuration for the protocol client.
#[derive(Debug, Clone)]
pub struct ProtocolConfig {
    /// Base URL of the homeserver (e.g. `https://synapse.example.org`).
    pub homeserver_url: String,
    /// Application-service access token.
    pub access_token: String,
}

/// HTTP-backed implementation of the protocol capability set.
pub struct ProtocolClient {
    config: ProtocolConfig,
    http: reqwest::Client,
}

impl ProtocolClient {
    pub fn new(config: ProtocolConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("Commune-Federation/", env!("CARGO_PKG_VERSION")))
            .build()
            .expect("failed to build protocol http client");
        Self { config, http }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.homeserver_url.trim_end_matches('/'), path)
    }

    fn txn_id() -> String {
        uuid::Uuid::new_v4().simple().to_string()
    }

    async fn request(
        &self,
        method: Method,
        path: &str,
        as_user: Option<&str>,
        body: Option<Value>,
    ) -> Result<Value, BridgeError> {
        let url = self.url(path);
        debug!(%method, %url, "Protocol request");

        let mut req = self.http.request(method, &url).bearer_auth(&self.config.access_token);
        if let Some(user) = as_user {
            req = req.query(&[("user_id", user)]);
        }
        if let Some(body) = &body {
            req = req.json(body);
        }

        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(BridgeError::Remote(status.as_u16(), text));
        }
        Ok(resp.json().await?)
    }

    fn receipt(value: &Value) -> Result<EventReceipt, BridgeError> {
        value
            .get("event_id")
            .and_then(Value::as_str)
            .map(|id| EventReceipt { event_id: id.to_owned() })
            .ok_or_else(|| BridgeError::RemoteProtocol("response is missing event_id".to_owned()))
    }
}

#[async_trait]
impl RoomService for ProtocolClient {
    async fn create_room(
        &self,
        creator_id: &str,
        name: &str,
        join_rule: JoinRule,
    ) -> Result<CreatedRoom, BridgeError> {
        let preset = match join_rule {
            JoinRule::Public => "public_chat",
            JoinRule::Invite => "private_chat",
        };
        let value = self
            .request(
                Method::POST,
                "/_matrix/client/v3/createRoom",
                Some(creator_id),
                Some(json!({ "name": name, "preset": preset })),
            )
            .await?;

        value
            .get("room_id")
            .and_then(Value::as_str)
            .map(|id| CreatedRoom { room_id: id.to_owned() })
            .ok_or_else(|| BridgeError::RemoteProtocol("response is missing room_id".to_owned()))
    }

    async fn leave_room(&self, room_id: &str, user_id: &str) -> Result<(), BridgeError> {
        let path = format!("/_matrix/client/v3/rooms/{}/leave", urlencoded(room_id));
        self.request(Method::POST, &path, Some(user_id), Some(json!({}))).await?;
        Ok(())
    }

    async fn kick_user(
        &self,
        room_id: &str,
        kicked_user_id: &str,
        sender_id: &str,
        reason: &str,
    ) -> Result<(), BridgeError> {
        let path = format!("/_matrix/client/v3/rooms/{}/kick", urlencoded(room_id));
        self.request(
            Method::POST,
            &path,
            Some(sender_id),
            Some(json!({ "user_id": kicked_user_id, "reason": reason })),
        )
        .await?;
        Ok(())
    }
}

#[async_trait]
impl InviteService for ProtocolClient {
    async fn invite_user_to_room(
        &self,
        invitee: &str,
        room_id: &str,
        inviter_id: &str,
    ) -> Result<(), BridgeError> {
        let path = format!("/_matrix/client/v3/rooms/{}/invite", urlencoded(room_id));
        self.request(Method::POST, &path, Some(inviter_id), Some(json!({ "user_id": invitee })))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl MessageService for ProtocolClient {
    async fn send_message(
        &self,
        room_id: &str,
        body: &str,
        sender_id: &str,
    ) -> Result<EventReceipt, BridgeError> {
        let path = format!(
            "/_matrix/client/v3/rooms/{}/send/m.room.message/{}",
            urlencoded(room_id),
            Self::txn_id()
        );
        let value = self
            .request(
                Method::PUT,
                &path,
                Some(sender_id),
                Some(json!({ "msgtype": "m.text", "body": body })),
            )
            .await?;
        Self::receipt(&value)
    }

    async fn send_file_message(
        &self,
        room_id: &str,
        content: &FileMessageContent,
        sender_id: &str,
    ) -> Result<EventReceipt, BridgeError> {
        let path = format!(
            "/_matrix/client/v3/rooms/{}/send/m.room.message/{}",
            urlencoded(room_id),
            Self::txn_id()
        );
        let value = self
            .request(Method::PUT, &path, Some(sender_id), Some(serde_json::to_value(content)?))
            .await?;
        Self::receipt(&value)
    }

    async fn send_thread_message(
        &self,
        room_id: &str,
        body: &str,
        sender_id: &str,
        root_event_id: &str,
        latest_event_id: Option<&str>,
    ) -> Result<EventReceipt, BridgeError> {
        let path = format!(
            "/_matrix/client/v3/rooms/{}/send/m.room.message/{}",
            urlencoded(room_id),
            Self::txn_id()
        );
        let value = self
            .request(
                Method::PUT,
                &path,
                Some(sender_id),
                Some(json!({
                    "msgtype": "m.text",
                    "body": body,
                    "m.relates_to": {
                        "rel_type": "m.thread",
                        "event_id": root_event_id,
                        "is_falling_back": true,
                        "m.in_reply_to": {
                            "event_id": latest_event_id.unwrap_or(root_event_id),
                        },
                    },
                })),
            )
            .await?;
        Self::receipt(&value)
    }

    async fn send_reaction(
        &self,
        room_id: &str,
        target_event_id: &str,
        key: &str,
        sender_id: &str,
    ) -> Result<EventReceipt, BridgeError> {
        let path = format!(
            "/_matrix/client/v3/rooms/{}/send/m.reaction/{}",
            urlencoded(room_id),
            Self::txn_id()
        );
        let value = self
            .request(
                Method::PUT,
                &path,
                Some(sender_id),
                Some(json!({
                    "m.relates_to": {
                        "rel_type": "m.annotation",
                        "event_id": target_event_id,
                        "key": key,
                    },
                })),
            )
            .await?;
        Self::receipt(&value)
    }

    async fn unset_reaction(
        &self,
        room_id: &str,
        reaction_event_id: &str,
        _key: &str,
        sender_id: &str,
    ) -> Result<Option<EventReceipt>, BridgeError> {
        let path = format!(
            "/_matrix/client/v3/rooms/{}/redact/{}/{}",
            urlencoded(room_id),
            urlencoded(reaction_event_id),
            Self::txn_id()
        );
        match self.request(Method::PUT, &path, Some(sender_id), Some(json!({}))).await {
            Ok(value) => Ok(Some(Self::receipt(&value)?)),
            // The reaction event is already gone on the remote side.
            Err(BridgeError::Remote(404, _)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn redact_message(
        &self,
        room_id: &str,
        event_id: &str,
        sender_id: &str,
    ) -> Result<EventReceipt, BridgeError> {
        let path = format!(
            "/_matrix/client/v3/rooms/{}/redact/{}/{}",
            urlencoded(room_id),
            urlencoded(event_id),
            Self::txn_id()
        );
        let value =
            self.request(Method::PUT, &path, Some(sender_id), Some(json!({}))).await?;
        Self::receipt(&value)
    }
}

#[async_trait]
impl EventService for ProtocolClient {
    async fn event_by_id(&self, event_id: &str) -> Result<Option<Value>, BridgeError> {
        let path = format!("/_matrix/federation/v1/event/{}", urlencoded(event_id));
        match self.request(Method::GET, &path, None, None).await {
            Ok(value) => Ok(Some(value)),
            Err(BridgeError::Remote(404, _)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl MediaService for ProtocolClient {
    async fn upload_file(
        &self,
        file: &FileRecord,
        data: Vec<u8>,
    ) -> Result<ContentUri, BridgeError> {
        let url = self.url("/_matrix/media/v3/upload");
        let content_type = if file.content_type.is_empty() {
            "application/octet-stream"
        } else {
            &file.content_type
        };
        debug!(%url, file = %file.id, "Uploading file to remote media repository");

        let resp = self
            .http
            .post(&url)
            .query(&[("filename", file.name.as_str())])
            .bearer_auth(&self.config.access_token)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(data)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(BridgeError::Remote(status.as_u16(), text));
        }

        let value: Value = resp.json().await?;
        let uri = value.get("content_uri").and_then(Value::as_str).ok_or_else(|| {
            BridgeError::RemoteProtocol("response is missing content_uri".to_owned())
        })?;
        ContentUri::parse(uri)
            .ok_or_else(|| BridgeError::RemoteProtocol(format!("malformed content_uri: {uri}")))
    }

    async fn download_file(
        &self,
        server: &str,
        media_id: &str,
    ) -> Result<Option<Vec<u8>>, BridgeError> {
        let url = self.url(&format!(
            "/_matrix/media/v3/download/{}/{}",
            urlencoded(server),
            urlencoded(media_id)
        ));
        debug!(%url, "Downloading remote media");

        let resp = self.http.get(&url).bearer_auth(&self.config.access_token).send().await?;
        let status = resp.status();
        if status.as_u16() == 404 {
            return Ok(None);
        }
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(BridgeError::Remote(status.as_u16(), text));
        }
        Ok(Some(resp.bytes().await?.to_vec()))
    }
}

#[async_trait]
impl EduService for ProtocolClient {
    async fn send_typing_notification(
        &self,
        room_id: &str,
        user_id: &str,
        is_typing: bool,
    ) -> Result<(), BridgeError> {
        let path = format!(
            "/_matrix/client/v3/rooms/{}/typing/{}",
            urlencoded(room_id),
            urlencoded(user_id)
        );
        self.request(
            Method::PUT,
            &path,
            Some(user_id),
            Some(json!({ "typing": is_typing, "timeout": TYPING_TIMEOUT_MS })),
        )
        .await?;
        Ok(())
    }

    async fn send_presence_update_to_rooms(
        &self,
        updates: &[RemotePresence],
        _room_ids: &[String],
    ) -> Result<(), BridgeError> {
        // The homeserver fans presence out to shared rooms itself; the room
        // list is informational at this layer.
        for update in updates {
            let path = format!("/_matrix/client/v3/presence/{}/status", urlencoded(&update.user_id));
            self.request(
                Method::PUT,
                &path,
                Some(&update.user_id),
                Some(json!({ "presence": update.presence.as_str() })),
            )
            .await?;
        }
        Ok(())
    }
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

fn urlencoded(s: &str) -> String {
    url::form_urlencoded::byte_serialize(s.as_bytes()).collect()
}
