use axum::extract::{Path, State};
use axum::response::Html;
use tera::Context;

use crate::errors::{AppError, PageError};
use crate::videos::VideoView;
use crate::InnerState;

fn render(
    inner: &InnerState,
    template: &str,
    context: &Context,
) -> Result<Html<String>, PageError> {
    inner
        .templates
        .render(template, context)
        .map(Html)
        .map_err(|e| {
            PageError(AppError::Unexpected(
                anyhow::Error::new(e).context("Template rendering failed"),
            ))
        })
}

/// Homepage: all videos, newest first.
pub async fn homepage(State(inner): State<InnerState>) -> Result<Html<String>, PageError> {
    let videos = inner.videos.list_all().await?;
    let views: Vec<VideoView> = videos.iter().map(VideoView::from).collect();

    let mut context = Context::new();
    context.insert("videos", &views);
    render(&inner, "index.html", &context)
}

/// Individual video page with the Streamtape embed.
pub async fn watch_video(
    State(inner): State<InnerState>,
    Path(video_id): Path<i64>,
) -> Result<Html<String>, PageError> {
    let video = inner
        .videos
        .get(video_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Video {} not found", video_id)))?;

    let mut context = Context::new();
    context.insert("video", &VideoView::from(&video));
    render(&inner, "watch.html", &context)
}

pub async fn admin_panel(State(inner): State<InnerState>) -> Result<Html<String>, PageError> {
    let videos = inner.videos.list_all().await?;
    let views: Vec<VideoView> = videos.iter().map(VideoView::from).collect();

    let mut context = Context::new();
    context.insert("videos", &views);
    render(&inner, "admin.html", &context)
}

pub async fn edit_video_form(
    State(inner): State<InnerState>,
    Path(video_id): Path<i64>,
) -> Result<Html<String>, PageError> {
    let video = inner
        .videos
        .get(video_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Video {} not found", video_id)))?;

    let mut context = Context::new();
    context.insert("video", &VideoView::from(&video));
    render(&inner, "edit.html", &context)
}
