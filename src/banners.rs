use std::path::PathBuf;

use uuid::Uuid;

use crate::errors::AppError;

/// Stores banner images under a fixed directory, one file per video, named by
/// a random UUID so a write can never clobber an existing banner.
#[derive(Clone)]
pub struct BannerStore {
    dir: PathBuf,
}

impl BannerStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        BannerStore { dir: dir.into() }
    }

    /// Validates the upload and writes it to disk, returning the relative
    /// path to store on the record.
    pub async fn store(
        &self,
        file_name: Option<&str>,
        content_type: Option<&str>,
        contents: &[u8],
    ) -> Result<String, AppError> {
        let file_name = file_name
            .filter(|name| !name.is_empty())
            .ok_or_else(|| AppError::Validation("No file provided".to_string()))?;

        let is_image = content_type
            .map(|ct| ct.starts_with("image/"))
            .unwrap_or(false);
        if !is_image {
            return Err(AppError::Validation(
                "Only image files are allowed".to_string(),
            ));
        }

        let extension = file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext)
            .filter(|ext| !ext.is_empty())
            .unwrap_or("jpg");
        let path = self.dir.join(format!("{}.{}", Uuid::new_v4(), extension));

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| {
                AppError::Storage(anyhow::Error::new(e).context("Failed to create banner directory"))
            })?;
        tokio::fs::write(&path, contents).await.map_err(|e| {
            AppError::Storage(anyhow::Error::new(e).context("Failed to save file"))
        })?;

        Ok(path.to_string_lossy().into_owned())
    }

    /// Best-effort delete. Missing files, empty paths, and OS failures are
    /// all silent no-ops; banner cleanup must never fail a request.
    pub async fn remove(&self, path: &str) {
        if path.is_empty() {
            return;
        }
        match tokio::fs::remove_file(path).await {
            Ok(()) => tracing::debug!("removed banner {}", path),
            Err(e) => tracing::debug!("skipping banner cleanup for {}: {}", path, e),
        }
    }
}
