mod banners;
mod db;
mod errors;
mod routes;
mod videos;

use std::error::Error;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use axum_prometheus::PrometheusMetricLayer;
use tera::Tera;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::banners::BannerStore;
use crate::db::init_db;
use crate::routes::{
    admin_panel, delete_video, edit_video_form, get_stats, get_video_api, get_videos_api,
    health_check, homepage, update_video, upload_video, watch_video,
};

const BANNER_DIR: &str = "static/banners";

#[derive(Clone)]
struct InnerState {
    pub videos: db::VideoStore,
    pub banners: BannerStore,
    pub templates: Arc<Tera>,
}

fn load_templates() -> Arc<Tera> {
    match Tera::new("templates/**/*.html") {
        Ok(templates) => Arc::new(templates),
        Err(e) => {
            // Keep serving; the page routes fall back to static error pages.
            tracing::error!("template compilation failed, pages will degrade: {}", e);
            Arc::new(Tera::default())
        }
    }
}

fn app(state: InnerState) -> Router {
    Router::new()
        .route("/", get(homepage))
        .route("/watch/:id", get(watch_video))
        .route("/admin", get(admin_panel))
        .route("/admin/upload", post(upload_video))
        .route("/admin/delete/:id", post(delete_video))
        .route("/admin/edit/:id", get(edit_video_form).post(update_video))
        .route("/api/videos", get(get_videos_api))
        .route("/api/video/:id", get(get_video_api))
        .route("/api/stats", get(get_stats))
        .route("/health", get(health_check))
        .nest_service("/static", ServeDir::new("static"))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "streamhub=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    for dir in [BANNER_DIR, "templates"] {
        tokio::fs::create_dir_all(dir).await?;
    }

    let videos = init_db().await?;
    let banners = BannerStore::new(BANNER_DIR);
    let templates = load_templates();

    let (prometheus_layer, metric_handle) = PrometheusMetricLayer::pair();

    let app_state = InnerState {
        videos,
        banners,
        templates,
    };

    let app = app(app_state)
        .route("/metrics", get(|| async move { metric_handle.render() }))
        .layer(prometheus_layer);

    let port = std::env::var("PORT").unwrap_or_else(|_| "8000".to_string());
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port))
        .await
        .expect("Could not initialize TcpListener");

    tracing::info!(
        "StreamHub listening on {}",
        listener
            .local_addr()
            .expect("Could not convert listener address to local address")
    );

    axum::serve(listener, app)
        .await
        .expect("Could not successfully serve");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use serde_json::Value;
    use tower::ServiceExt;

    const BOUNDARY: &str = "streamhub-test-boundary";

    async fn test_state(banner_dir: &std::path::Path) -> InnerState {
        let mut tera = Tera::default();
        tera.add_raw_templates(vec![
            ("index.html", "<ul>{% for video in videos %}<li>{{ video.title }}</li>{% endfor %}</ul>"),
            ("watch.html", "<h1>{{ video.title }}</h1><iframe src=\"{{ video.embed_url }}\"></iframe>"),
            ("admin.html", "{{ videos | length }} videos"),
            ("edit.html", "<form>{{ video.title }}</form>"),
        ])
        .expect("Failed to register test templates");

        InnerState {
            videos: db::memory_store().await,
            banners: BannerStore::new(banner_dir),
            templates: Arc::new(tera),
        }
    }

    fn text_field(body: &mut Vec<u8>, name: &str, value: &str) {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }

    fn file_field(body: &mut Vec<u8>, name: &str, filename: &str, content_type: &str, data: &[u8]) {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }

    fn video_form(title: &str, url: &str, banner: Option<(&str, &str, &[u8])>) -> Vec<u8> {
        let mut body = Vec::new();
        text_field(&mut body, "title", title);
        text_field(&mut body, "description", "a description");
        text_field(&mut body, "hashtags", "x,y");
        text_field(&mut body, "streamtape_url", url);
        if let Some((filename, content_type, data)) = banner {
            file_field(&mut body, "banner", filename, content_type, data);
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn multipart_post(uri: &str, body: Vec<u8>) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn text_body(response: axum::response::Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn banner_count(dir: &std::path::Path) -> usize {
        std::fs::read_dir(dir)
            .map(|entries| entries.count())
            .unwrap_or(0)
    }

    #[tokio::test]
    async fn health_reports_liveness() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(test_state(dir.path()).await);

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["database"], "SQLite");
    }

    #[tokio::test]
    async fn upload_creates_record_and_banner() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(test_state(dir.path()).await);

        let response = app
            .clone()
            .oneshot(multipart_post(
                "/admin/upload",
                video_form(
                    "T",
                    "https://streamtape.com/e/abc123/",
                    Some(("banner.png", "image/png", b"png-bytes")),
                ),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers().get(header::LOCATION).unwrap(), "/admin");
        assert_eq!(banner_count(dir.path()), 1);

        let response = app
            .oneshot(Request::builder().uri("/api/videos").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = json_body(response).await;
        assert_eq!(body["status"], "success");
        assert_eq!(body["count"], 1);
        assert_eq!(body["videos"][0]["title"], "T");
        assert_eq!(body["videos"][0]["hashtags"], serde_json::json!(["x", "y"]));
    }

    #[tokio::test]
    async fn upload_with_empty_title_leaves_no_banner() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(test_state(dir.path()).await);

        let response = app
            .oneshot(multipart_post(
                "/admin/upload",
                video_form(
                    "   ",
                    "https://streamtape.com/e/abc123/",
                    Some(("banner.png", "image/png", b"png-bytes")),
                ),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(banner_count(dir.path()), 0);
    }

    #[tokio::test]
    async fn upload_rejects_foreign_host() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(test_state(dir.path()).await);

        let response = app
            .oneshot(multipart_post(
                "/admin/upload",
                video_form(
                    "T",
                    "https://example.com/e/abc123/",
                    Some(("banner.png", "image/png", b"png-bytes")),
                ),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(banner_count(dir.path()), 0);
    }

    #[tokio::test]
    async fn upload_without_banner_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(test_state(dir.path()).await);

        let response = app
            .oneshot(multipart_post(
                "/admin/upload",
                video_form("T", "https://streamtape.com/e/abc123/", None),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn watch_renders_embed_and_missing_id_is_404() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(test_state(dir.path()).await);

        app.clone()
            .oneshot(multipart_post(
                "/admin/upload",
                video_form(
                    "T",
                    "https://streamtape.com/e/abc123/",
                    Some(("banner.png", "image/png", b"png-bytes")),
                ),
            ))
            .await
            .unwrap();

        let listing = app
            .clone()
            .oneshot(Request::builder().uri("/api/videos").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let id = json_body(listing).await["videos"][0]["id"].as_i64().unwrap();

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri(format!("/watch/{}", id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let page = text_body(response).await;
        assert!(page.contains("https://streamtape.com/e/abc123/"));

        let response = app
            .oneshot(Request::builder().uri("/watch/9999").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let page = text_body(response).await;
        assert!(page.contains("404 - Page Not Found"));
    }

    #[tokio::test]
    async fn api_detail_includes_derived_fields() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(test_state(dir.path()).await);

        app.clone()
            .oneshot(multipart_post(
                "/admin/upload",
                video_form(
                    "T",
                    "https://streamtape.com/e/abc123/",
                    Some(("banner.png", "image/png", b"png-bytes")),
                ),
            ))
            .await
            .unwrap();

        let listing = app
            .clone()
            .oneshot(Request::builder().uri("/api/videos").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let id = json_body(listing).await["videos"][0]["id"].as_i64().unwrap();

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri(format!("/api/video/{}", id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["video"]["streamtape_id"], "abc123");
        assert_eq!(
            body["video"]["embed_url"],
            "https://streamtape.com/e/abc123/"
        );
        assert_eq!(body["video"]["created_at"], body["video"]["updated_at"]);

        let response = app
            .oneshot(Request::builder().uri("/api/video/9999").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = json_body(response).await;
        assert_eq!(body["status"], 404);
    }

    #[tokio::test]
    async fn edit_with_banner_replaces_the_old_file() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(test_state(dir.path()).await);

        app.clone()
            .oneshot(multipart_post(
                "/admin/upload",
                video_form(
                    "T",
                    "https://streamtape.com/e/abc123/",
                    Some(("old.png", "image/png", b"old-bytes")),
                ),
            ))
            .await
            .unwrap();

        let listing = app
            .clone()
            .oneshot(Request::builder().uri("/api/videos").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let id = json_body(listing).await["videos"][0]["id"].as_i64().unwrap();

        let response = app
            .clone()
            .oneshot(multipart_post(
                &format!("/admin/edit/{}", id),
                video_form(
                    "T renamed",
                    "https://streamtape.com/e/def456/",
                    Some(("new.png", "image/png", b"new-bytes")),
                ),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);

        // Exactly one banner on disk: the replacement.
        assert_eq!(banner_count(dir.path()), 1);

        let response = app
            .oneshot(
                Request::builder()
                    .uri(format!("/api/video/{}", id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let body = json_body(response).await;
        assert_eq!(body["video"]["title"], "T renamed");
        assert_eq!(body["video"]["streamtape_id"], "def456");
    }

    #[tokio::test]
    async fn edit_without_banner_keeps_the_old_file() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(test_state(dir.path()).await);

        app.clone()
            .oneshot(multipart_post(
                "/admin/upload",
                video_form(
                    "T",
                    "https://streamtape.com/e/abc123/",
                    Some(("old.png", "image/png", b"old-bytes")),
                ),
            ))
            .await
            .unwrap();

        let listing = app
            .clone()
            .oneshot(Request::builder().uri("/api/videos").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let before = json_body(listing).await;
        let id = before["videos"][0]["id"].as_i64().unwrap();
        let old_banner = before["videos"][0]["banner_url"].clone();

        let response = app
            .clone()
            .oneshot(multipart_post(
                &format!("/admin/edit/{}", id),
                video_form("T renamed", "https://streamtape.com/e/abc123/", None),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(banner_count(dir.path()), 1);

        let listing = app
            .oneshot(Request::builder().uri("/api/videos").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let after = json_body(listing).await;
        assert_eq!(after["videos"][0]["banner_url"], old_banner);
    }

    #[tokio::test]
    async fn delete_removes_row_and_banner() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(test_state(dir.path()).await);

        app.clone()
            .oneshot(multipart_post(
                "/admin/upload",
                video_form(
                    "T",
                    "https://streamtape.com/e/abc123/",
                    Some(("banner.png", "image/png", b"png-bytes")),
                ),
            ))
            .await
            .unwrap();

        let listing = app
            .clone()
            .oneshot(Request::builder().uri("/api/videos").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let id = json_body(listing).await["videos"][0]["id"].as_i64().unwrap();

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(format!("/admin/delete/{}", id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(banner_count(dir.path()), 0);

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(format!("/admin/delete/{}", id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn stats_aggregates_counts_and_recents() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(test_state(dir.path()).await);

        for title in ["one", "two"] {
            app.clone()
                .oneshot(multipart_post(
                    "/admin/upload",
                    video_form(
                        title,
                        "https://streamtape.com/e/abc123/",
                        Some(("banner.png", "image/png", b"png-bytes")),
                    ),
                ))
                .await
                .unwrap();
        }

        let response = app
            .oneshot(Request::builder().uri("/api/stats").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["stats"]["total_videos"], 2);
        // Both uploads carry the same "x,y" hashtags.
        assert_eq!(body["stats"]["unique_hashtags"], 2);
        assert_eq!(body["stats"]["recent_videos"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn homepage_and_admin_render() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(test_state(dir.path()).await);

        for uri in ["/", "/admin"] {
            let response = app
                .clone()
                .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }
    }
}
