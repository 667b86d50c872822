//! Message repository — lookups and the federation-related message fields.
//!
//! Nested message data (file reference, attachments, reactions) lives in
//! jsonb columns; the flat `MessageRow` is converted to the shared model via
//! [`MessageRow::into_message`].

use chrono::{DateTime, Utc};
use commune_common::models::{Message, MessageFederation};
use sqlx::PgPool;
use uuid::Uuid;

/// Row type for messages from PostgreSQL.
#[derive(Debug, sqlx::FromRow)]
pub struct MessageRow {
    pub id: Uuid,
    pub room_id: Uuid,
    pub author_id: Uuid,
    pub author_username: String,
    pub content: String,
    pub thread_root_id: Option<Uuid>,
    pub file: Option<serde_json::Value>,
    pub attachments: serde_json::Value,
    pub reactions: serde_json::Value,
    pub federation_event_id: Option<String>,
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
}

impl MessageRow {
    /// Convert the flat row into the shared message model.
    pub fn into_message(self) -> Result<Message, serde_json::Error> {
        Ok(Message {
            id: self.id,
            room_id: self.room_id,
            author_id: self.author_id,
            author_username: self.author_username,
            content: self.content,
            thread_root_id: self.thread_root_id,
            file: self.file.map(serde_json::from_value).transpose()?,
            attachments: serde_json::from_value(self.attachments)?,
            reactions: serde_json::from_value(self.reactions)?,
            federation: self
                .federation_event_id
                .map(|event_id| MessageFederation { event_id }),
            deleted: self.deleted,
            created_at: self.created_at,
        })
    }
}

/// Find a message by ID.
pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<MessageRow>, sqlx::Error> {
    sqlx::query_as::<_, MessageRow>("SELECT * FROM messages WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Record the external event id assigned to a message on delivery.
///
/// Write-once: the guard on `federation_event_id IS NULL` makes the column
/// immutable after the first successful send. Returns whether the id was
/// newly recorded.
pub async fn set_federation_event_id(
    pool: &PgPool,
    id: Uuid,
    event_id: &str,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE messages SET federation_event_id = $2 \
         WHERE id = $1 AND federation_event_id IS NULL",
    )
    .bind(id)
    .bind(event_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// The most recent reply in a thread that already has an external event id,
/// excluding the given message. Supplies threading context for new replies.
pub async fn latest_thread_reply_event_id(
    pool: &PgPool,
    thread_root_id: Uuid,
    exclude_id: Uuid,
) -> Result<Option<String>, sqlx::Error> {
    sqlx::query_scalar(
        r#"
        SELECT federation_event_id FROM messages
        WHERE thread_root_id = $1
          AND id != $2
          AND federation_event_id IS NOT NULL
        ORDER BY created_at DESC
        LIMIT 1
        "#,
    )
    .bind(thread_root_id)
    .bind(exclude_id)
    .fetch_optional(pool)
    .await
}

/// Record the external event id of a delivered reaction, keyed by shortcode
/// and acting username.
///
/// The reaction aggregate under `reactions -> $shortcode` is created when the
/// user reacts locally; this only annotates it with the federation event.
pub async fn set_reaction_event_id(
    pool: &PgPool,
    message_id: Uuid,
    shortcode: &str,
    event_id: &str,
    username: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE messages
        SET reactions = jsonb_set(
            reactions,
            ARRAY[$2::text, 'federation_event_ids', $3::text],
            to_jsonb($4::text),
            true
        )
        WHERE id = $1
        "#,
    )
    .bind(message_id)
    .bind(shortcode)
    .bind(event_id)
    .bind(username)
    .execute(pool)
    .await?;
    Ok(())
}

/// Remove a single reaction event entry after the remote reaction was unset.
pub async fn unset_reaction_event_id(
    pool: &PgPool,
    message_id: Uuid,
    shortcode: &str,
    event_id: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE messages
        SET reactions = reactions #- ARRAY[$2::text, 'federation_event_ids', $3::text]
        WHERE id = $1
        "#,
    )
    .bind(message_id)
    .bind(shortcode)
    .bind(event_id)
    .execute(pool)
    .await?;
    Ok(())
}
