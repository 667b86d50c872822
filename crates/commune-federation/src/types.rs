//! Bridge data types — external identifiers, message content shapes, and
//! presence states exchanged with the protocol network.

use commune_common::models::{FileRecord, UserStatus};
use serde::Serialize;

// ─── External identifiers ────────────────────────────────────────────────────

/// Build an external user id from a local username and this bridge's domain.
///
/// Example: `@alice:chat.example.org`
pub fn mxid(local_part: &str, domain: &str) -> String {
    format!("@{}:{}", local_part, domain)
}

/// A parsed content reference (`mxc://server/media-id`).
///
/// Derived, never stored — the URI string on the file record is the source
/// of truth.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentUri {
    pub server: String,
    pub media_id: String,
}

impl ContentUri {
    /// Parse an `mxc://server/media-id` reference.
    ///
    /// Returns `None` when the scheme is wrong or either component is empty.
    pub fn parse(uri: &str) -> Option<Self> {
        let rest = uri.strip_prefix("mxc://")?;
        let (server, media_id) = rest.split_once('/')?;
        if server.is_empty() || media_id.is_empty() {
            return None;
        }
        Some(Self { server: server.to_owned(), media_id: media_id.to_owned() })
    }
}

impl std::fmt::Display for ContentUri {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "mxc://{}/{}", self.server, self.media_id)
    }
}

// ─── Protocol call results ───────────────────────────────────────────────────

/// Receipt returned by the protocol for a delivered event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventReceipt {
    pub event_id: String,
}

/// Result of a remote room creation.
#[derive(Debug, Clone)]
pub struct CreatedRoom {
    pub room_id: String,
}

/// Join rule requested for a newly created remote room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinRule {
    Public,
    Invite,
}

// ─── File message content ────────────────────────────────────────────────────

/// Content kind of an outbound file message, classified by MIME prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MessageKind {
    #[serde(rename = "m.image")]
    Image,
    #[serde(rename = "m.video")]
    Video,
    #[serde(rename = "m.audio")]
    Audio,
    #[serde(rename = "m.file")]
    File,
}

impl MessageKind {
    /// Classify a MIME type by its prefix; anything unrecognised is a
    /// generic file.
    pub fn from_mime(mime: &str) -> Self {
        if mime.starts_with("image/") {
            Self::Image
        } else if mime.starts_with("video/") {
            Self::Video
        } else if mime.starts_with("audio/") {
            Self::Audio
        } else {
            Self::File
        }
    }
}

/// Wire shape of an outbound file message.
#[derive(Debug, Clone, Serialize)]
pub struct FileMessageContent {
    pub body: String,
    #[serde(rename = "msgtype")]
    pub kind: MessageKind,
    pub url: String,
    pub info: FileMessageInfo,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileMessageInfo {
    pub size: i64,
    pub mimetype: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub w: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub h: Option<i32>,
}

impl FileMessageContent {
    /// Build the outbound content for an uploaded file. Image dimensions are
    /// attached only for image kinds.
    pub fn from_file(file: &FileRecord, url: &ContentUri) -> Self {
        let kind = MessageKind::from_mime(&file.content_type);
        let mimetype = if file.content_type.is_empty() {
            "application/octet-stream".to_owned()
        } else {
            file.content_type.clone()
        };
        Self {
            body: if file.name.is_empty() { "Unnamed file".to_owned() } else { file.name.clone() },
            kind,
            url: url.to_string(),
            info: FileMessageInfo {
                size: file.size,
                mimetype,
                w: if kind == MessageKind::Image { file.width } else { None },
                h: if kind == MessageKind::Image { file.height } else { None },
            },
        }
    }
}

// ─── Presence ────────────────────────────────────────────────────────────────

/// Presence states understood by the protocol network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PresenceState {
    Online,
    Offline,
    Unavailable,
}

impl PresenceState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Offline => "offline",
            Self::Unavailable => "unavailable",
        }
    }
}

impl From<UserStatus> for PresenceState {
    fn from(status: UserStatus) -> Self {
        match status {
            UserStatus::Online => Self::Online,
            UserStatus::Offline | UserStatus::Disabled => Self::Offline,
            UserStatus::Away | UserStatus::Busy => Self::Unavailable,
        }
    }
}

/// A single entry of a batched presence update.
#[derive(Debug, Clone, Serialize)]
pub struct RemotePresence {
    pub user_id: String,
    pub presence: PresenceState,
}

// ─── Reactions ───────────────────────────────────────────────────────────────

/// Map a reaction shortcode (`:tada:`) to its canonical display form.
///
/// Unknown shortcodes pass through unchanged so custom emoji still federate
/// under their local name.
pub fn canonical_reaction_key(shortcode: &str) -> String {
    let name = shortcode.trim_matches(':');
    emojis::get_by_shortcode(name)
        .map(|e| e.as_str().to_owned())
        .unwrap_or_else(|| shortcode.to_owned())
}
