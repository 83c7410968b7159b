use crate::api_error::ApiError;
use crate::config::StorageConfig;
use crate::db::DbPool;
use crate::models::photo::{Photo, PhotoPayload, PhotoResponse, PhotoUploadRequest, PhotoUploadResponse};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use uuid::Uuid;

const ALLOWED_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "webp"];
const MAX_FILENAME_LEN: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ImageFormat {
    Jpeg,
    Png,
    Webp,
}

impl ImageFormat {
    fn matches_extension(self, ext: &str) -> bool {
        match self {
            ImageFormat::Jpeg => ext == "jpg" || ext == "jpeg",
            ImageFormat::Png => ext == "png",
            ImageFormat::Webp => ext == "webp",
        }
    }
}

/// Photo upload and ownership management. Uploads arrive as base64 payloads
/// and are validated by extension, size cap and content magic bytes before
/// anything touches disk.
#[derive(Clone)]
pub struct PhotoService {
    pool: DbPool,
    storage: StorageConfig,
}

impl PhotoService {
    pub fn new(pool: DbPool, storage: StorageConfig) -> Self {
        Self { pool, storage }
    }

    pub async fn upload(
        &self,
        user_id: Uuid,
        request: PhotoUploadRequest,
    ) -> Result<PhotoUploadResponse, ApiError> {
        let mut saved = Vec::with_capacity(request.photos.len());
        for payload in &request.photos {
            saved.push(self.save_one(user_id, payload).await?);
        }

        info!(user_id = %user_id, count = saved.len(), "Photos uploaded");
        let total = saved.len();
        Ok(PhotoUploadResponse {
            photos: saved.into_iter().map(PhotoResponse::from).collect(),
            total,
        })
    }

    async fn save_one(&self, user_id: Uuid, payload: &PhotoPayload) -> Result<Photo, ApiError> {
        let ext = file_extension(&payload.filename)?;
        let bytes = BASE64
            .decode(payload.content_base64.as_bytes())
            .map_err(|e| ApiError::bad_request(format!("invalid base64 payload: {e}")))?;

        if bytes.len() > self.storage.max_file_size {
            return Err(ApiError::PayloadTooLarge(format!(
                "photo exceeds the {} byte limit",
                self.storage.max_file_size
            )));
        }
        let format = sniff_image_format(&bytes)
            .ok_or_else(|| ApiError::bad_request("unrecognized image data"))?;
        if !format.matches_extension(&ext) {
            return Err(ApiError::bad_request(
                "file content does not match its extension",
            ));
        }

        let digest = hex_digest(&bytes);
        let stored_name = format!("{}.{}", Uuid::new_v4(), ext);
        let dir: PathBuf = Path::new(&self.storage.upload_dir).join("photos");
        tokio::fs::create_dir_all(&dir).await?;
        let file_path = dir.join(&stored_name);
        tokio::fs::write(&file_path, &bytes).await?;

        let url = format!(
            "{}/uploads/photos/{}",
            self.storage.public_base_url.trim_end_matches('/'),
            stored_name
        );
        let photo = sqlx::query_as::<_, Photo>(
            r#"
            INSERT INTO photos
                (id, user_id, filename, file_path, file_size, content_sha256, url)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, user_id, filename, file_path, file_size, content_sha256, url,
                      uploaded_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(sanitize_filename(&payload.filename))
        .bind(file_path.to_string_lossy().to_string())
        .bind(bytes.len() as i64)
        .bind(digest)
        .bind(url)
        .fetch_one(&self.pool)
        .await?;

        Ok(photo)
    }

    pub async fn list(&self, user_id: Uuid) -> Result<Vec<PhotoResponse>, ApiError> {
        let photos = sqlx::query_as::<_, Photo>(
            "SELECT * FROM photos WHERE user_id = $1 ORDER BY uploaded_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(photos.into_iter().map(PhotoResponse::from).collect())
    }

    pub async fn delete(&self, user_id: Uuid, photo_id: Uuid) -> Result<(), ApiError> {
        let photo = sqlx::query_as::<_, Photo>(
            "DELETE FROM photos WHERE id = $1 AND user_id = $2 RETURNING *",
        )
        .bind(photo_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(ApiError::NotFound)?;

        if let Err(e) = tokio::fs::remove_file(&photo.file_path).await {
            // The row is gone either way; a stray file is not worth failing
            // the request over.
            warn!(photo_id = %photo_id, error = %e, "Failed to remove photo file");
        }
        Ok(())
    }
}

fn file_extension(filename: &str) -> Result<String, ApiError> {
    let ext = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .ok_or_else(|| ApiError::bad_request("filename has no extension"))?;
    if !ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
        return Err(ApiError::bad_request(format!(
            "unsupported file type .{ext}, allowed: {}",
            ALLOWED_EXTENSIONS.join(", ")
        )));
    }
    Ok(ext)
}

fn sniff_image_format(bytes: &[u8]) -> Option<ImageFormat> {
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return Some(ImageFormat::Jpeg);
    }
    if bytes.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
        return Some(ImageFormat::Png);
    }
    if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        return Some(ImageFormat::Webp);
    }
    None
}

fn sanitize_filename(filename: &str) -> String {
    let base = Path::new(filename)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("photo");
    let (name, ext) = match base.rsplit_once('.') {
        Some((name, ext)) => (name, ext.to_ascii_lowercase()),
        None => (base, String::new()),
    };
    let mut safe: String = name
        .chars()
        .map(|c| if c == ' ' { '_' } else { c })
        .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '-')
        .collect();
    safe.truncate(MAX_FILENAME_LEN);
    if ext.is_empty() {
        safe
    } else {
        format!("{safe}.{ext}")
    }
}

fn hex_digest(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_HEADER: [u8; 12] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 13];

    #[test]
    fn test_sniff_known_formats() {
        assert_eq!(
            sniff_image_format(&[0xFF, 0xD8, 0xFF, 0xE0, 0x00]),
            Some(ImageFormat::Jpeg)
        );
        assert_eq!(sniff_image_format(&PNG_HEADER), Some(ImageFormat::Png));

        let mut webp = Vec::from(*b"RIFF");
        webp.extend_from_slice(&[0, 0, 0, 0]);
        webp.extend_from_slice(b"WEBP");
        assert_eq!(sniff_image_format(&webp), Some(ImageFormat::Webp));
    }

    #[test]
    fn test_sniff_rejects_other_content() {
        assert_eq!(sniff_image_format(b"GIF89a...."), None);
        assert_eq!(sniff_image_format(b"<svg></svg>"), None);
        assert_eq!(sniff_image_format(&[]), None);
    }

    #[test]
    fn test_format_extension_agreement() {
        assert!(ImageFormat::Jpeg.matches_extension("jpg"));
        assert!(ImageFormat::Jpeg.matches_extension("jpeg"));
        assert!(!ImageFormat::Jpeg.matches_extension("png"));
        assert!(ImageFormat::Webp.matches_extension("webp"));
    }

    #[test]
    fn test_file_extension_allowlist() {
        assert_eq!(file_extension("holiday.JPG").unwrap(), "jpg");
        assert_eq!(file_extension("x.webp").unwrap(), "webp");
        assert!(file_extension("script.exe").is_err());
        assert!(file_extension("noextension").is_err());
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("my photo.JPG"), "my_photo.jpg");
        assert_eq!(sanitize_filename("../../etc/passwd.png"), "passwd.png");
        assert_eq!(sanitize_filename("caf\u{e9}!!.png"), "caf\u{e9}.png");
        let long = format!("{}.jpg", "a".repeat(80));
        assert_eq!(sanitize_filename(&long).len(), MAX_FILENAME_LEN + 4);
    }

    #[test]
    fn test_hex_digest_stable() {
        let a = hex_digest(b"same bytes");
        let b = hex_digest(b"same bytes");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert_ne!(a, hex_digest(b"other bytes"));
    }
}
