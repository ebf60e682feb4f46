/// Disk-backed storage for uploaded media files.
///
/// Files land in a single directory served statically under `/uploads`;
/// the stored name is the upload timestamp plus the sanitized original
/// name, so names never collide in practice and never contain path
/// separators.
use std::io;
use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::error::{AppError, Result};

/// Public URL prefix under which stored files are served.
pub const PUBLIC_PREFIX: &str = "/uploads";

#[derive(Debug, Clone)]
pub struct MediaStorage {
    root: PathBuf,
}

impl MediaStorage {
    /// Create the storage, ensuring the directory exists.
    pub fn new(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write an uploaded file and return its public URL path.
    pub async fn store(&self, original_name: &str, data: &[u8]) -> Result<String> {
        let filename = format!(
            "{}-{}",
            Utc::now().timestamp_millis(),
            sanitize_filename(original_name)
        );
        let path = self.root.join(&filename);

        tokio::fs::write(&path, data)
            .await
            .map_err(|e| AppError::Internal(format!("failed to store upload: {}", e)))?;

        Ok(format!("{}/{}", PUBLIC_PREFIX, filename))
    }

    /// Best-effort removal of a stored file by its public URL.
    ///
    /// Only URLs under `/uploads/` refer to local files; anything else
    /// (absolute URLs, external references) is left alone. A file that is
    /// already gone is not an error.
    pub async fn remove(&self, media_url: &str) {
        let Some(filename) = media_url.strip_prefix(&format!("{}/", PUBLIC_PREFIX)) else {
            return;
        };

        // Refuse anything that could escape the upload directory.
        if filename.is_empty() || filename.contains('/') || filename.contains("..") {
            return;
        }

        let path = self.root.join(filename);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!("failed to remove media file {}: {}", path.display(), e);
            }
        }
    }
}

/// Keep alphanumerics, dots, dashes and underscores; everything else
/// becomes an underscore. Empty names get a placeholder.
fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.trim_matches(['.', '_']).is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}
