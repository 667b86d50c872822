//! Message model — the core content unit.
//!
//! Messages that have crossed the federation bridge carry a `federation`
//! block correlating them with their external protocol event, and reactions
//! keep a per-shortcode map of the external reaction events they produced so
//! a retraction can later redact exactly one of them.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A message in a room.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,

    /// Room this message belongs to
    pub room_id: Uuid,

    /// Author user ID
    pub author_id: Uuid,

    /// Author username, denormalized for display and reaction bookkeeping
    pub author_username: String,

    /// Message text (empty for pure file messages)
    pub content: String,

    /// Root message of the thread this message replies to, if any
    pub thread_root_id: Option<Uuid>,

    /// Directly attached file
    pub file: Option<MessageFile>,

    /// Legacy attachment references (older clients attach files here)
    #[serde(default)]
    pub attachments: Vec<MessageAttachment>,

    /// Emoji reactions keyed by shortcode (`:thumbsup:`)
    #[serde(default)]
    pub reactions: BTreeMap<String, MessageReaction>,

    /// Federation correlation, present once the message has been delivered
    /// to the external network
    pub federation: Option<MessageFederation>,

    /// Whether the message has been deleted (tombstoned)
    pub deleted: bool,

    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Whether this message has crossed the federation bridge.
    pub fn is_federated(&self) -> bool {
        self.federation.is_some()
    }

    /// The external event id assigned on first successful delivery, if any.
    pub fn federation_event_id(&self) -> Option<&str> {
        self.federation.as_ref().map(|f| f.event_id.as_str())
    }

    /// The attached file id, checking the direct attachment first and the
    /// legacy attachment list second.
    pub fn attached_file_id(&self) -> Option<Uuid> {
        self.file
            .as_ref()
            .map(|f| f.id)
            .or_else(|| self.attachments.iter().find_map(|a| a.file_id))
    }
}

/// Reference to a directly attached file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageFile {
    pub id: Uuid,
    pub name: String,
}

/// Legacy attachment entry — may or may not reference an uploaded file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageAttachment {
    pub title: Option<String>,
    pub file_id: Option<Uuid>,
}

/// A single emoji reaction aggregate on a message.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageReaction {
    /// Usernames that reacted with this shortcode
    pub usernames: Vec<String>,

    /// External reaction event id → acting username. Populated as reactions
    /// are delivered to the federation network; entries are removed one at a
    /// time when a reaction is retracted.
    #[serde(default)]
    pub federation_event_ids: BTreeMap<String, String>,
}

/// Federation correlation data for a delivered message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageFederation {
    /// Event id assigned by the external network. Set exactly once on first
    /// successful delivery, immutable afterwards.
    pub event_id: String,
}
