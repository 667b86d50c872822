//! Room repository — lookups used by the federation layer.

use commune_common::models::Room;
use sqlx::PgPool;
use uuid::Uuid;

/// Find a room by its unique ID.
pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Room>, sqlx::Error> {
    sqlx::query_as::<_, Room>("SELECT * FROM rooms WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}
