//! Bridged-room repository — the local↔external room mapping.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

/// A bridged-room row from the database.
#[derive(Debug, sqlx::FromRow)]
pub struct BridgedRoomRow {
    pub local_room_id: Uuid,
    pub external_room_id: String,
    pub domain: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Look up the external room id for a local room.
pub async fn external_id_by_local_id(
    pool: &PgPool,
    local_room_id: Uuid,
) -> Result<Option<String>, sqlx::Error> {
    sqlx::query_scalar("SELECT external_room_id FROM bridged_rooms WHERE local_room_id = $1")
        .bind(local_room_id)
        .fetch_optional(pool)
        .await
}

/// Reverse lookup — the local room id behind an external room id.
pub async fn local_id_by_external_id(
    pool: &PgPool,
    external_room_id: &str,
) -> Result<Option<Uuid>, sqlx::Error> {
    sqlx::query_scalar("SELECT local_room_id FROM bridged_rooms WHERE external_room_id = $1")
        .bind(external_room_id)
        .fetch_optional(pool)
        .await
}

/// Create or update the mapping for a local room.
pub async fn create_or_update(
    pool: &PgPool,
    local_room_id: Uuid,
    external_room_id: &str,
    domain: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO bridged_rooms
            (local_room_id, external_room_id, domain, created_at, updated_at)
        VALUES ($1, $2, $3, NOW(), NOW())
        ON CONFLICT (local_room_id) DO UPDATE SET
            external_room_id = EXCLUDED.external_room_id,
            domain = EXCLUDED.domain,
            updated_at = NOW()
        "#,
    )
    .bind(local_room_id)
    .bind(external_room_id)
    .bind(domain)
    .execute(pool)
    .await?;
    Ok(())
}
