use std::path::PathBuf;

use anyhow::Context;
use tokio::fs;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::ApiError;
use crate::form::MediaUpload;

/// 10 MB upload limit for subpost logos
pub const MAX_MEDIA_SIZE: usize = 10 * 1024 * 1024;

/// Local directory store for uploaded subpost images.
///
/// Files are written flat as `{dir}/{uuid}.{ext}` and addressed publicly as
/// `{public_prefix}/{uuid}.{ext}`; the server binary serves `dir` under that
/// prefix.
pub struct MediaStore {
    dir: PathBuf,
    public_prefix: String,
}

impl MediaStore {
    pub async fn new(dir: PathBuf, public_prefix: impl Into<String>) -> anyhow::Result<Self> {
        fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("creating media directory {}", dir.display()))?;
        info!("Media storage directory: {}", dir.display());

        Ok(Self {
            dir,
            public_prefix: public_prefix.into().trim_end_matches('/').to_string(),
        })
    }

    /// Persist an image upload and return its public URL.
    pub async fn store(&self, upload: &MediaUpload) -> Result<String, ApiError> {
        let ext = extension_for(&upload.content_type).ok_or_else(|| {
            warn!(
                "Rejected upload {:?} with content type {}",
                upload.file_name, upload.content_type
            );
            ApiError::BadRequest("Invalid media")
        })?;

        if upload.bytes.is_empty() || upload.bytes.len() > MAX_MEDIA_SIZE {
            warn!("Rejected upload of {} bytes", upload.bytes.len());
            return Err(ApiError::BadRequest("Invalid media"));
        }

        let file_name = format!("{}.{}", Uuid::new_v4(), ext);
        let path = self.dir.join(&file_name);
        fs::write(&path, &upload.bytes)
            .await
            .with_context(|| format!("writing media file {}", path.display()))?;

        info!("Stored {} byte upload as {}", upload.bytes.len(), file_name);
        Ok(format!("{}/{}", self.public_prefix, file_name))
    }

    /// Delete a file previously returned by [`store`](Self::store).
    /// URLs that do not point into this store are ignored.
    pub async fn discard(&self, url: &str) {
        let Some(path) = self.local_path(url) else {
            return;
        };

        match fs::remove_file(&path).await {
            Ok(()) => info!("Deleted media file {}", path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Media file {} already gone", path.display());
            }
            Err(e) => warn!("Failed to delete media file {}: {}", path.display(), e),
        }
    }

    fn local_path(&self, url: &str) -> Option<PathBuf> {
        let name = url.strip_prefix(&self.public_prefix)?.strip_prefix('/')?;
        let valid = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.')
            && !name.starts_with('.');
        valid.then(|| self.dir.join(name))
    }
}

fn extension_for(content_type: &str) -> Option<&'static str> {
    let essence = content_type.split(';').next()?.trim().to_ascii_lowercase();
    match essence.as_str() {
        "image/png" => Some("png"),
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        _ => None,
    }
}
