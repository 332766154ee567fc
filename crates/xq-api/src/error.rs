use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use xq_core::SearchError;

use crate::handlers::{CACHE_CONTROL, JSON_CONTENT_TYPE};

/// Body sent with every error status.
pub const EMPTY_OBJECT: &str = "{}";

#[derive(Error, Debug)]
pub enum ApiError {
    /// Unknown route, architecture, or package.
    #[error("not found")]
    NotFound,

    /// A reply could not be serialized.
    #[error("unable to encode response: {0}")]
    Encoding(#[from] serde_json::Error),

    /// Full-text search was not enabled at startup.
    #[error("full-text search is disabled")]
    Unavailable,

    /// Full-text search failed. Unparsable queries map to 400.
    #[error("{0}")]
    Search(#[from] SearchError),

    /// The blocking query worker panicked.
    #[error("query worker failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// The server is shutting down and takes no new queries.
    #[error("query limiter closed")]
    Closed,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotFound | Self::Unavailable => StatusCode::NOT_FOUND,
            Self::Search(SearchError::Query(_)) => StatusCode::BAD_REQUEST,
            Self::Closed => StatusCode::SERVICE_UNAVAILABLE,
            Self::Encoding(_) | Self::Search(_) | Self::Task(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            Self::NotFound | Self::Unavailable => {}
            Self::Search(SearchError::Query(err)) => tracing::debug!("rejected query: {err}"),
            _ => tracing::warn!(error = %self, "request failed"),
        }

        (
            status,
            [
                (header::CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE)),
                (header::CACHE_CONTROL, HeaderValue::from_static(CACHE_CONTROL)),
            ],
            EMPTY_OBJECT,
        )
            .into_response()
    }
}
