use std::collections::HashSet;

use axum::extract::{Path, State};
use axum::Json;
use serde_json::{json, Value};

use crate::errors::AppError;
use crate::InnerState;

pub async fn get_videos_api(State(inner): State<InnerState>) -> Result<Json<Value>, AppError> {
    let videos = inner.videos.list_all().await?;

    let payload: Vec<Value> = videos
        .iter()
        .map(|video| {
            json!({
                "id": video.id,
                "title": video.title,
                "description": video.description,
                "hashtags": video.hashtag_list(),
                "banner_url": video.banner_url(),
                "watch_url": video.watch_url(),
                "created_at": video.created_at,
                "updated_at": video.updated_at,
            })
        })
        .collect();

    Ok(Json(json!({
        "status": "success",
        "count": payload.len(),
        "videos": payload,
    })))
}

pub async fn get_video_api(
    State(inner): State<InnerState>,
    Path(video_id): Path<i64>,
) -> Result<Json<Value>, AppError> {
    let video = inner
        .videos
        .get(video_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Video {} not found", video_id)))?;

    Ok(Json(json!({
        "status": "success",
        "video": {
            "id": video.id,
            "title": video.title,
            "description": video.description,
            "hashtags": video.hashtag_list(),
            "streamtape_url": video.streamtape_url,
            "streamtape_id": video.streamtape_id,
            "embed_url": video.embed_url(),
            "banner_url": video.banner_url(),
            "watch_url": video.watch_url(),
            "created_at": video.created_at,
            "updated_at": video.updated_at,
        },
    })))
}

/// Aggregate stats: total count, distinct hashtags across all records, and
/// the five most recently created videos.
pub async fn get_stats(State(inner): State<InnerState>) -> Result<Json<Value>, AppError> {
    let total_videos = inner.videos.count().await?;
    let all_videos = inner.videos.list_all().await?;
    let recent = inner.videos.recent(5).await?;

    let unique_hashtags: HashSet<String> = all_videos
        .iter()
        .flat_map(|video| video.hashtag_list())
        .collect();

    let recent_videos: Vec<Value> = recent
        .iter()
        .map(|video| {
            json!({
                "id": video.id,
                "title": video.title,
                "created_at": video.created_at,
            })
        })
        .collect();

    Ok(Json(json!({
        "status": "success",
        "stats": {
            "total_videos": total_videos,
            "unique_hashtags": unique_hashtags.len(),
            "recent_videos": recent_videos,
        },
    })))
}
