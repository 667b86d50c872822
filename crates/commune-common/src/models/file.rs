//! Uploaded file metadata.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Metadata for an uploaded file.
///
/// Files uploaded locally live in object storage under `storage_key`. Files
/// that originate from the federation network instead carry a `federation`
/// block pointing at the remote media, and are proxied rather than stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: Uuid,

    /// Original filename
    pub name: String,

    /// MIME type
    pub content_type: String,

    /// File size in bytes
    pub size: i64,

    /// Image dimensions, when probed at upload time
    pub width: Option<i32>,
    pub height: Option<i32>,

    /// Object storage key (empty for remote-origin files)
    pub storage_key: String,

    /// Remote-origin metadata for federated media
    pub federation: Option<FileFederation>,

    pub uploaded_by: Uuid,

    pub created_at: DateTime<Utc>,
}

/// Where a remote-origin file lives on the federation network.
///
/// All three fields are recorded when an inbound file event is processed;
/// the content URI is authoritative, the server/media-id pair is kept as a
/// fallback for URIs that fail to parse.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileFederation {
    /// Content reference of the form `mxc://server/media-id`
    pub content_uri: Option<String>,

    /// Origin server name
    pub origin_server: Option<String>,

    /// Media id on the origin server
    pub media_id: Option<String>,
}
