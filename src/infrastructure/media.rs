// Media gateway - upload/destroy of images and videos addressed by URL-derived ids

use async_trait::async_trait;
use base64::Engine;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::PathBuf;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

static VIDEO_EXTENSION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\.(mp4|mov|avi|webm)$").expect("video extension pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
        }
    }

    pub fn from_content_type(content_type: &str) -> Self {
        if content_type.starts_with("video") {
            MediaKind::Video
        } else {
            MediaKind::Image
        }
    }
}

/// Raw media on its way to the gateway
#[derive(Debug, Clone)]
pub struct MediaUpload {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

impl MediaUpload {
    pub fn kind(&self) -> MediaKind {
        MediaKind::from_content_type(&self.content_type)
    }

    /// Parse a `data:<mime>;base64,<payload>` URI
    pub fn from_data_uri(uri: &str) -> AppResult<Self> {
        let rest = uri
            .strip_prefix("data:")
            .ok_or_else(|| AppError::Validation("Image must be a base64 data URI".to_string()))?;
        let (meta, payload) = rest
            .split_once(',')
            .ok_or_else(|| AppError::Validation("Malformed data URI".to_string()))?;
        let content_type = meta
            .strip_suffix(";base64")
            .ok_or_else(|| AppError::Validation("Data URI must be base64 encoded".to_string()))?;

        let bytes = base64::engine::general_purpose::STANDARD
            .decode(payload.trim())
            .map_err(|e| AppError::Validation(format!("Invalid base64 payload: {}", e)))?;
        if bytes.is_empty() {
            return Err(AppError::Validation("Data URI carries no data".to_string()));
        }

        Ok(Self {
            bytes,
            content_type: if content_type.is_empty() {
                "application/octet-stream".to_string()
            } else {
                content_type.to_string()
            },
        })
    }
}

/// Identifier of stored media, derived from its public URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaRef {
    pub public_id: String,
    pub kind: MediaKind,
}

impl MediaRef {
    /// Trailing path segment without extension; video when the path says so
    pub fn from_url(url: &str) -> Option<Self> {
        let last_segment = url.rsplit('/').next()?;
        let public_id = last_segment.split('.').next()?;
        if public_id.is_empty() {
            return None;
        }

        let kind = if url.contains("/video/") || VIDEO_EXTENSION.is_match(url) {
            MediaKind::Video
        } else {
            MediaKind::Image
        };

        Some(Self {
            public_id: public_id.to_string(),
            kind,
        })
    }
}

#[async_trait]
pub trait MediaGateway: Send + Sync {
    /// Store the media and return its public URL
    async fn upload(&self, upload: MediaUpload) -> AppResult<String>;

    /// Remove stored media; false if nothing matched
    async fn destroy(&self, media: &MediaRef) -> AppResult<bool>;
}

/// Stores media under `root/{image|video}/{id}.{ext}` and serves it from `public_url`
pub struct DiskMediaGateway {
    root: PathBuf,
    public_url: String,
}

impl DiskMediaGateway {
    pub fn new(root: impl Into<PathBuf>, public_url: &str) -> Self {
        Self {
            root: root.into(),
            public_url: public_url.trim_end_matches('/').to_string(),
        }
    }

    fn extension_for(content_type: &str) -> String {
        let subtype = content_type
            .split(';')
            .next()
            .and_then(|essence| essence.split('/').nth(1))
            .unwrap_or("bin");
        let subtype = match subtype {
            "jpeg" => "jpg",
            "quicktime" => "mov",
            "svg+xml" => "svg",
            other => other,
        };
        let cleaned: String = subtype.chars().filter(|c| c.is_ascii_alphanumeric()).collect();
        if cleaned.is_empty() {
            "bin".to_string()
        } else {
            cleaned
        }
    }
}

#[async_trait]
impl MediaGateway for DiskMediaGateway {
    #[instrument(skip(self, upload), fields(bytes = upload.bytes.len(), content_type = %upload.content_type))]
    async fn upload(&self, upload: MediaUpload) -> AppResult<String> {
        let kind = upload.kind();
        let dir = self.root.join(kind.as_str());
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| AppError::MediaError(format!("Failed to create {}: {}", dir.display(), e)))?;

        let file_name = format!(
            "{}.{}",
            Uuid::new_v4().simple(),
            Self::extension_for(&upload.content_type)
        );
        let path = dir.join(&file_name);
        tokio::fs::write(&path, &upload.bytes)
            .await
            .map_err(|e| AppError::MediaError(format!("Failed to write {}: {}", path.display(), e)))?;

        info!("Stored {} {}", kind.as_str(), file_name);
        Ok(format!("{}/{}/{}", self.public_url, kind.as_str(), file_name))
    }

    #[instrument(skip(self), fields(public_id = %media.public_id, kind = media.kind.as_str()))]
    async fn destroy(&self, media: &MediaRef) -> AppResult<bool> {
        let dir = self.root.join(media.kind.as_str());
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => {
                return Err(AppError::MediaError(format!("Failed to read {}: {}", dir.display(), e)))
            }
        };

        let mut removed = false;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| AppError::MediaError(format!("Failed to scan {}: {}", dir.display(), e)))?
        {
            let path = entry.path();
            let matches = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .map(|stem| stem == media.public_id)
                .unwrap_or(false);
            if matches {
                tokio::fs::remove_file(&path).await.map_err(|e| {
                    AppError::MediaError(format!("Failed to remove {}: {}", path.display(), e))
                })?;
                removed = true;
            }
        }

        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn media_ref_from_image_url() {
        let media = MediaRef::from_url("https://res.example.com/demo/image/upload/v1/abc123.png").unwrap();
        assert_eq!(media.public_id, "abc123");
        assert_eq!(media.kind, MediaKind::Image);
    }

    #[test]
    fn media_ref_detects_video_by_path_or_extension() {
        let by_path = MediaRef::from_url("https://res.example.com/demo/video/upload/clip.bin").unwrap();
        assert_eq!(by_path.kind, MediaKind::Video);

        let by_ext = MediaRef::from_url("https://cdn.example.com/uploads/clip.webm").unwrap();
        assert_eq!(by_ext.public_id, "clip");
        assert_eq!(by_ext.kind, MediaKind::Video);
    }

    #[test]
    fn media_ref_rejects_urls_without_a_name() {
        assert!(MediaRef::from_url("https://cdn.example.com/uploads/").is_none());
        assert!(MediaRef::from_url("").is_none());
    }

    #[test]
    fn data_uri_is_decoded() {
        let upload = MediaUpload::from_data_uri("data:image/png;base64,aGVsbG8=").unwrap();
        assert_eq!(upload.bytes, b"hello");
        assert_eq!(upload.content_type, "image/png");
        assert_eq!(upload.kind(), MediaKind::Image);
    }

    #[test]
    fn plain_urls_are_not_data_uris() {
        let err = MediaUpload::from_data_uri("https://example.com/a.png").unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn extension_follows_content_type() {
        assert_eq!(DiskMediaGateway::extension_for("image/jpeg"), "jpg");
        assert_eq!(DiskMediaGateway::extension_for("video/mp4"), "mp4");
        assert_eq!(DiskMediaGateway::extension_for("application/octet-stream"), "octetstream");
        assert_eq!(DiskMediaGateway::extension_for("garbage"), "bin");
    }

    #[tokio::test]
    async fn upload_then_destroy() {
        let dir = tempfile::tempdir().unwrap();
        let gateway = DiskMediaGateway::new(dir.path(), "http://localhost/media/");

        let url = gateway
            .upload(MediaUpload {
                bytes: vec![0, 1, 2],
                content_type: "video/mp4".to_string(),
            })
            .await
            .unwrap();
        assert!(url.starts_with("http://localhost/media/video/"));
        assert!(url.ends_with(".mp4"));

        let media = MediaRef::from_url(&url).unwrap();
        assert_eq!(media.kind, MediaKind::Video);
        assert!(gateway.destroy(&media).await.unwrap());
        assert!(!gateway.destroy(&media).await.unwrap());
    }
}
