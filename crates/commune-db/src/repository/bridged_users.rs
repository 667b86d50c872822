//! Bridged-user repository — the local↔external user identity mapping.
//!
//! One row per local user that has ever touched federation. The primary key
//! on `local_user_id` is what makes concurrent create-on-first-use upserts
//! converge to a single row, and `external_user_id` carries its own unique
//! index so reverse lookups stay unambiguous.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

/// A bridged-user row from the database.
#[derive(Debug, sqlx::FromRow)]
pub struct BridgedUserRow {
    pub local_user_id: Uuid,
    pub external_user_id: String,
    pub domain: String,
    pub created_as_owner: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Look up the external user id for a local user.
pub async fn external_id_by_local_id(
    pool: &PgPool,
    local_user_id: Uuid,
) -> Result<Option<String>, sqlx::Error> {
    sqlx::query_scalar("SELECT external_user_id FROM bridged_users WHERE local_user_id = $1")
        .bind(local_user_id)
        .fetch_optional(pool)
        .await
}

/// Reverse lookup — the local user id behind an external user id.
pub async fn local_id_by_external_id(
    pool: &PgPool,
    external_user_id: &str,
) -> Result<Option<Uuid>, sqlx::Error> {
    sqlx::query_scalar("SELECT local_user_id FROM bridged_users WHERE external_user_id = $1")
        .bind(external_user_id)
        .fetch_optional(pool)
        .await
}

/// Create or update the mapping for a local user.
pub async fn create_or_update(
    pool: &PgPool,
    local_user_id: Uuid,
    external_user_id: &str,
    domain: &str,
    created_as_owner: bool,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO bridged_users
            (local_user_id, external_user_id, domain, created_as_owner, created_at, updated_at)
        VALUES ($1, $2, $3, $4, NOW(), NOW())
        ON CONFLICT (local_user_id) DO UPDATE SET
            external_user_id = EXCLUDED.external_user_id,
            domain = EXCLUDED.domain,
            updated_at = NOW()
        "#,
    )
    .bind(local_user_id)
    .bind(external_user_id)
    .bind(domain)
    .bind(created_as_owner)
    .execute(pool)
    .await?;
    Ok(())
}
