use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::errors::AppError;

/// Sentinel returned when no id can be extracted from a Streamtape URL.
pub const INVALID_STREAMTAPE_ID: &str = "invalid_id";

#[derive(Debug, Serialize, Deserialize, FromRow, Clone)]
pub struct Video {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub hashtags: Option<String>,
    pub streamtape_url: String,
    pub streamtape_id: String,
    pub banner_path: String,
    pub created_at: String,
    pub updated_at: String,
}

impl Video {
    pub fn hashtag_list(&self) -> Vec<String> {
        hashtag_list(self.hashtags.as_deref())
    }

    pub fn embed_url(&self) -> String {
        format!("https://streamtape.com/e/{}/", self.streamtape_id)
    }

    pub fn watch_url(&self) -> String {
        format!("/watch/{}", self.id)
    }

    pub fn banner_url(&self) -> String {
        format!("/{}", self.banner_path)
    }

    pub fn formatted_created_at(&self) -> String {
        format_date(&self.created_at)
    }

    pub fn formatted_updated_at(&self) -> String {
        format_datetime(&self.updated_at)
    }
}

/// Template-facing view of a [`Video`] with the derived fields materialized,
/// since Tera cannot call methods on the model.
#[derive(Debug, Serialize)]
pub struct VideoView {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub hashtags: Option<String>,
    pub hashtag_list: Vec<String>,
    pub streamtape_url: String,
    pub streamtape_id: String,
    pub embed_url: String,
    pub banner_path: String,
    pub banner_url: String,
    pub watch_url: String,
    pub created_at: String,
    pub updated_at: String,
    pub formatted_created_at: String,
    pub formatted_updated_at: String,
}

impl From<&Video> for VideoView {
    fn from(video: &Video) -> Self {
        VideoView {
            id: video.id,
            title: video.title.clone(),
            description: video.description.clone(),
            hashtags: video.hashtags.clone(),
            hashtag_list: video.hashtag_list(),
            streamtape_url: video.streamtape_url.clone(),
            streamtape_id: video.streamtape_id.clone(),
            embed_url: video.embed_url(),
            banner_path: video.banner_path.clone(),
            banner_url: video.banner_url(),
            watch_url: video.watch_url(),
            created_at: video.created_at.clone(),
            updated_at: video.updated_at.clone(),
            formatted_created_at: video.formatted_created_at(),
            formatted_updated_at: video.formatted_updated_at(),
        }
    }
}

/// Extracts the video id from a Streamtape URL.
///
/// Embed URLs carry the id right after the `/e/` segment; share URLs carry it
/// as the last path segment. Anything this cannot make sense of yields the
/// `invalid_id` sentinel instead of failing the write.
pub fn extract_streamtape_id(url: &str) -> String {
    let url = url.trim();
    let id = match url.split_once("/e/") {
        Some((_, rest)) => rest.split('/').next().unwrap_or_default(),
        None => url.trim_end_matches('/').rsplit('/').next().unwrap_or_default(),
    };
    if id.is_empty() {
        INVALID_STREAMTAPE_ID.to_string()
    } else {
        id.to_string()
    }
}

/// Splits a raw comma-separated hashtag string into trimmed, non-empty tags.
/// Order is preserved and duplicates are kept as-is.
pub fn hashtag_list(raw: Option<&str>) -> Vec<String> {
    raw.map(|tags| {
        tags.split(',')
            .map(str::trim)
            .filter(|tag| !tag.is_empty())
            .map(String::from)
            .collect()
    })
    .unwrap_or_default()
}

pub fn validate_video_form(title: &str, streamtape_url: &str) -> Result<(), AppError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(AppError::Validation("Title is required".to_string()));
    }
    if title.chars().count() > 255 {
        return Err(AppError::Validation(
            "Title too long (max 255 characters)".to_string(),
        ));
    }
    if !streamtape_url.contains("streamtape.com") {
        return Err(AppError::Validation(
            "Invalid Streamtape URL - must contain 'streamtape.com'".to_string(),
        ));
    }
    Ok(())
}

/// RFC 3339 with fixed-width microseconds, so lexicographic order on the
/// stored column matches chronological order on every backend.
pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_rfc3339(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|parsed| parsed.with_timezone(&Utc))
}

pub fn format_date(raw: &str) -> String {
    parse_rfc3339(raw)
        .map(|date| date.format("%B %d, %Y").to_string())
        .unwrap_or_else(|| raw.to_string())
}

pub fn format_datetime(raw: &str) -> String {
    parse_rfc3339(raw)
        .map(|date| date.format("%B %d, %Y at %I:%M %p").to_string())
        .unwrap_or_else(|| raw.to_string())
}
