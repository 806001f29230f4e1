use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    Json,
};
use serde_json::json;

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(#[source] anyhow::Error),

    #[error("Storage error: {0}")]
    Storage(#[source] anyhow::Error),

    #[error("Timeout error: {0}")]
    Timeout(#[from] tokio::time::error::Elapsed),

    #[error("An unexpected error occurred: {0}")]
    Unexpected(#[from] anyhow::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Database(_) | AppError::Storage(_) | AppError::Unexpected(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    fn message(&self) -> String {
        match self {
            AppError::Validation(msg) | AppError::NotFound(msg) => msg.clone(),
            AppError::Database(e) => format!("Database error: {}", e),
            AppError::Storage(e) => format!("Storage error: {}", e),
            AppError::Timeout(e) => format!("Operation timed out: {}", e),
            AppError::Unexpected(e) => format!("An unexpected error occurred: {}", e),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.message();

        tracing::error!(
            error_type = %self,
            error_message = %message,
            status_code = %status,
            "Request error"
        );

        let body = Json(json!({
            "message": message,
            "status": status.as_u16()
        }));
        (status, body).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => AppError::NotFound("Video not found".to_string()),
            _ => AppError::Database(anyhow::Error::new(err).context("SQLx operation failed")),
        }
    }
}

/// Error wrapper for the HTML routes: same taxonomy, but rendered as a
/// self-contained fallback page instead of a JSON body, so a broken template
/// set can never turn an error page into another error.
#[derive(Debug)]
pub struct PageError(pub AppError);

impl From<AppError> for PageError {
    fn from(err: AppError) -> Self {
        PageError(err)
    }
}

impl From<sqlx::Error> for PageError {
    fn from(err: sqlx::Error) -> Self {
        PageError(AppError::from(err))
    }
}

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        let status = self.0.status();

        tracing::error!(
            error_type = %self.0,
            status_code = %status,
            "Page error"
        );

        let body = match status {
            StatusCode::NOT_FOUND => {
                "<h1>404 - Page Not Found</h1><a href='/'>Go Home</a>".to_string()
            }
            StatusCode::BAD_REQUEST => format!(
                "<h1>400 - {}</h1><a href='/admin'>Back to Admin</a>",
                self.0.message()
            ),
            _ => "<h1>500 - Internal Server Error</h1><a href='/'>Go Home</a>".to_string(),
        };
        (status, Html(body)).into_response()
    }
}
