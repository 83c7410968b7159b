use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Photo {
    pub id: Uuid,
    pub user_id: Uuid,
    pub filename: String,
    pub file_path: String,
    pub file_size: i64,
    pub content_sha256: String,
    pub url: String,
    pub uploaded_at: DateTime<Utc>,
}

/// One photo in an upload batch, carried as a base64 payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhotoPayload {
    pub filename: String,
    pub content_base64: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct PhotoUploadRequest {
    #[validate(length(min = 1, max = 16))]
    pub photos: Vec<PhotoPayload>,
}

#[derive(Debug, Serialize)]
pub struct PhotoResponse {
    pub id: Uuid,
    pub filename: String,
    pub url: String,
    pub file_size: i64,
    pub uploaded_at: DateTime<Utc>,
}

impl From<Photo> for PhotoResponse {
    fn from(photo: Photo) -> Self {
        Self {
            id: photo.id,
            filename: photo.filename,
            url: photo.url,
            file_size: photo.file_size,
            uploaded_at: photo.uploaded_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PhotoUploadResponse {
    pub photos: Vec<PhotoResponse>,
    pub total: usize,
}
