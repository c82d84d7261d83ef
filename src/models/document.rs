//! Uploaded plan document metadata. Bytes live on local disk.

use serde::{Deserialize, Serialize};

/// Metadata row for an uploaded file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: String,
    pub project_id: String,
    pub filename: String,
    pub content_type: String,
    pub size_bytes: i64,
    /// Path relative to the configured storage root; not exposed to clients.
    #[serde(default, skip_serializing)]
    pub storage_path: String,
    pub uploaded_by: String,
    pub created_at: String,
}
