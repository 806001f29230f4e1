use axum::extract::{Path, State};
use axum::response::Redirect;
use axum_typed_multipart::{FieldData, TryFromMultipart, TypedMultipart};
use bytes::Bytes;

use crate::db::{NewVideo, VideoChanges};
use crate::errors::{AppError, PageError};
use crate::videos::validate_video_form;
use crate::InnerState;

#[derive(TryFromMultipart)]
pub struct VideoForm {
    pub title: String,
    pub description: Option<String>,
    pub hashtags: Option<String>,
    pub streamtape_url: String,
    pub banner: Option<FieldData<Bytes>>,
}

fn trimmed_opt(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Create a new video. The banner is written to disk before the insert; if
/// the insert then fails, the freshly stored file is removed again so no
/// orphan is left behind.
pub async fn upload_video(
    State(inner): State<InnerState>,
    TypedMultipart(form): TypedMultipart<VideoForm>,
) -> Result<Redirect, PageError> {
    validate_video_form(&form.title, &form.streamtape_url)?;

    let banner = form
        .banner
        .as_ref()
        .ok_or_else(|| AppError::Validation("No file provided".to_string()))?;
    let banner_path = inner
        .banners
        .store(
            banner.metadata.file_name.as_deref(),
            banner.metadata.content_type.as_deref(),
            &banner.contents,
        )
        .await?;

    let new_video = NewVideo {
        title: form.title.trim().to_string(),
        description: trimmed_opt(form.description),
        hashtags: trimmed_opt(form.hashtags),
        streamtape_url: form.streamtape_url.trim().to_string(),
        banner_path: banner_path.clone(),
    };

    match inner.videos.insert(new_video).await {
        Ok(video) => {
            tracing::info!("uploaded video {} ({})", video.id, video.title);
            Ok(Redirect::to("/admin"))
        }
        Err(e) => {
            inner.banners.remove(&banner_path).await;
            Err(e.into())
        }
    }
}

/// Update metadata and optionally replace the banner. A replacement banner
/// is stored first; the old file is only removed once the row update has
/// committed, and the new file is cleaned up if it has not.
pub async fn update_video(
    State(inner): State<InnerState>,
    Path(video_id): Path<i64>,
    TypedMultipart(form): TypedMultipart<VideoForm>,
) -> Result<Redirect, PageError> {
    let existing = inner
        .videos
        .get(video_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Video {} not found", video_id)))?;

    validate_video_form(&form.title, &form.streamtape_url)?;

    // Browsers submit an empty banner field when nothing was picked.
    let new_banner_path = match form.banner.as_ref() {
        Some(banner)
            if banner
                .metadata
                .file_name
                .as_deref()
                .is_some_and(|name| !name.is_empty()) =>
        {
            Some(
                inner
                    .banners
                    .store(
                        banner.metadata.file_name.as_deref(),
                        banner.metadata.content_type.as_deref(),
                        &banner.contents,
                    )
                    .await?,
            )
        }
        _ => None,
    };

    let changes = VideoChanges {
        title: form.title.trim().to_string(),
        description: trimmed_opt(form.description),
        hashtags: trimmed_opt(form.hashtags),
        streamtape_url: form.streamtape_url.trim().to_string(),
        banner_path: new_banner_path.clone(),
    };

    if let Err(e) = inner.videos.update(video_id, changes).await {
        if let Some(path) = &new_banner_path {
            inner.banners.remove(path).await;
        }
        return Err(e.into());
    }

    if let Some(path) = &new_banner_path {
        if *path != existing.banner_path {
            inner.banners.remove(&existing.banner_path).await;
        }
    }

    Ok(Redirect::to("/admin"))
}

/// Delete a video and its banner. The file delete is best-effort; the row is
/// removed regardless.
pub async fn delete_video(
    State(inner): State<InnerState>,
    Path(video_id): Path<i64>,
) -> Result<Redirect, PageError> {
    let video = inner
        .videos
        .get(video_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Video {} not found", video_id)))?;

    inner.banners.remove(&video.banner_path).await;
    inner.videos.delete(video_id).await?;

    tracing::info!("deleted video {} ({})", video.id, video.title);
    Ok(Redirect::to("/admin"))
}
