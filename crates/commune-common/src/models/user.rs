//! User model — the identity layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A Commune user account.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    /// Unique user ID (UUID v7 — time-sortable)
    pub id: Uuid,

    /// Unique username (3-32 chars, alphanumeric + underscores)
    pub username: String,

    /// Display name (optional, up to 64 chars)
    pub display_name: Option<String>,

    /// Current availability state
    pub status: UserStatus,

    /// Account creation timestamp
    pub created_at: DateTime<Utc>,
}

/// Availability states a user can be in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    /// User is actively connected
    Online,
    /// User is not connected
    Offline,
    /// User is connected but idle
    Away,
    /// User wants no interruptions
    Busy,
    /// Account disabled by the user or by moderation
    Disabled,
}
