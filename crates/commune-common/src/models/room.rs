//! Room model — where conversation happens.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A chat room.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Room {
    pub id: Uuid,

    /// Room visibility / membership kind
    pub kind: RoomKind,

    /// Room name (optional for direct-message rooms)
    pub name: Option<String>,

    /// Whether this room is connected to the federation network.
    /// Rooms created before federation was enabled stay purely local.
    pub federated: bool,

    pub created_at: DateTime<Utc>,
}

impl Room {
    /// Human-readable name with a fallback for unnamed rooms.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("Untitled Room")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RoomKind {
    /// Anyone on the server can join
    Public,
    /// Invite-only
    Private,
    /// One-to-one direct messages
    Direct,
}
