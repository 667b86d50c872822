//! Upload repository — metadata for stored and remote-origin files.

use chrono::{DateTime, Utc};
use commune_common::models::FileRecord;
use sqlx::PgPool;
use uuid::Uuid;

/// Row type for uploads from PostgreSQL.
#[derive(Debug, sqlx::FromRow)]
pub struct UploadRow {
    pub id: Uuid,
    pub name: String,
    pub content_type: String,
    pub size: i64,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub storage_key: String,
    pub federation: Option<serde_json::Value>,
    pub uploaded_by: Uuid,
    pub created_at: DateTime<Utc>,
}

impl UploadRow {
    /// Convert the flat row into the shared file model.
    pub fn into_file_record(self) -> Result<FileRecord, serde_json::Error> {
        Ok(FileRecord {
            id: self.id,
            name: self.name,
            content_type: self.content_type,
            size: self.size,
            width: self.width,
            height: self.height,
            storage_key: self.storage_key,
            federation: self.federation.map(serde_json::from_value).transpose()?,
            uploaded_by: self.uploaded_by,
            created_at: self.created_at,
        })
    }
}

/// Find an upload by ID.
pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<UploadRow>, sqlx::Error> {
    sqlx::query_as::<_, UploadRow>("SELECT * FROM uploads WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}
