//! Subscription repository — room membership.

use sqlx::PgPool;
use uuid::Uuid;

/// Check whether a username is already a member of a room.
pub async fn is_member(
    pool: &PgPool,
    room_id: Uuid,
    username: &str,
) -> Result<bool, sqlx::Error> {
    let row: (bool,) = sqlx::query_as(
        "SELECT EXISTS(SELECT 1 FROM subscriptions WHERE room_id = $1 AND username = $2)",
    )
    .bind(room_id)
    .bind(username)
    .fetch_one(pool)
    .await?;
    Ok(row.0)
}

/// Add a user to a room's membership.
pub async fn add_member(
    pool: &PgPool,
    room_id: Uuid,
    user_id: Uuid,
    username: &str,
    invited_by: Uuid,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO subscriptions (room_id, user_id, username, invited_by, created_at)
        VALUES ($1, $2, $3, $4, NOW())
        ON CONFLICT (room_id, user_id) DO NOTHING
        "#,
    )
    .bind(room_id)
    .bind(user_id)
    .bind(username)
    .bind(invited_by)
    .execute(pool)
    .await?;
    Ok(())
}

/// External room ids of every federated room the user is subscribed to.
pub async fn federated_room_ids(
    pool: &PgPool,
    user_id: Uuid,
) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar(
        r#"
        SELECT br.external_room_id
        FROM subscriptions s
        JOIN bridged_rooms br ON br.local_room_id = s.room_id
        WHERE s.user_id = $1
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
}
