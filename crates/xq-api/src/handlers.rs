//! Route handlers.
//!
//! Every successful reply is `{"data": ...}` tagged with the ETag of the
//! entity it was built from. A request whose `If-None-Match` equals that tag
//! gets `304 Not Modified` and no body. HEAD is answered by the GET routes
//! with the body stripped; query routes answer it from the tag alone without
//! running the query.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, HeaderName, Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use xq_core::SearchError;
use xq_schema::{ETag, Record, ShortRecord};

use crate::error::ApiError;
use crate::server::ServerState;

pub const CACHE_CONTROL: &str = "public, max-age=300";
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Search results returned when `limit` is absent.
pub const DEFAULT_SEARCH_LIMIT: usize = 50;
pub const MAX_SEARCH_LIMIT: usize = 1000;

#[derive(Serialize)]
struct Envelope<'a, T: Serialize + ?Sized> {
    data: &'a T,
}

fn matches_validator(headers: &HeaderMap, etag: &ETag) -> bool {
    headers
        .get(header::IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| etag.matches(v))
}

fn not_modified(etag: &ETag) -> Response {
    (
        StatusCode::NOT_MODIFIED,
        [
            (header::ETAG, etag.as_str()),
            (header::CACHE_CONTROL, CACHE_CONTROL),
        ],
    )
        .into_response()
}

/// 200 with the reply headers and no body, for HEAD on query routes.
fn headers_only(etag: &ETag) -> Response {
    (StatusCode::OK, json_headers(etag)).into_response()
}

fn json_headers(etag: &ETag) -> [(HeaderName, &str); 3] {
    [
        (header::CONTENT_TYPE, JSON_CONTENT_TYPE),
        (header::ETAG, etag.as_str()),
        (header::CACHE_CONTROL, CACHE_CONTROL),
    ]
}

/// Conditional JSON reply for `data` validated against `etag`.
fn reply<T: Serialize + ?Sized>(
    headers: &HeaderMap,
    etag: &ETag,
    data: &T,
) -> Result<Response, ApiError> {
    if matches_validator(headers, etag) {
        return Ok(not_modified(etag));
    }

    let body = serde_json::to_vec(&Envelope { data })?;
    Ok((StatusCode::OK, json_headers(etag), body).into_response())
}

/// `GET /v1/archs`
pub async fn archs(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let snap = state.store.snapshot();
    reply(&headers, snap.etag(), snap.names())
}

/// `GET /v1/packages/:arch`
pub async fn packages(
    State(state): State<Arc<ServerState>>,
    Path(arch): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let snap = state.store.snapshot();
    let rd = snap.arch(&arch).ok_or(ApiError::NotFound)?;
    reply(&headers, rd.etag(), rd.name_index())
}

/// `GET /v1/packages/:arch/:package`
pub async fn package(
    State(state): State<Arc<ServerState>>,
    Path((arch, name)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let snap = state.store.snapshot();
    let record = snap
        .arch(&arch)
        .and_then(|rd| rd.package(&name))
        .ok_or(ApiError::NotFound)?;
    reply(&headers, &record.etag, record)
}

#[derive(Debug, Default, Deserialize)]
pub struct QueryParams {
    #[serde(default)]
    pub q: String,
}

/// `GET /v1/query/:arch?q=`
pub async fn query(
    State(state): State<Arc<ServerState>>,
    Path(arch): Path<String>,
    Query(params): Query<QueryParams>,
    method: Method,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let snap = state.store.snapshot();
    let rd = snap.arch(&arch).ok_or(ApiError::NotFound)?;
    let etag = rd.etag().clone();
    if matches_validator(&headers, &etag) {
        return Ok(not_modified(&etag));
    }
    if method == Method::HEAD {
        return Ok(headers_only(&etag));
    }

    let _permit = state.permits.acquire().await.map_err(|_| ApiError::Closed)?;
    let results = tokio::task::spawn_blocking(move || {
        snap.arch(&arch)
            .map(|rd| rd.query(&params.q))
            .unwrap_or_default()
    })
    .await?;

    reply(&headers, &etag, &results)
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
    pub limit: Option<usize>,
}

/// `GET /v1/search/:arch?q=&limit=`
pub async fn search(
    State(state): State<Arc<ServerState>>,
    Path(arch): Path<String>,
    Query(params): Query<SearchParams>,
    method: Method,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    if !state.store.search_enabled() {
        return Err(ApiError::Unavailable);
    }

    let snap = state.store.snapshot();
    let rd = snap.arch(&arch).ok_or(ApiError::NotFound)?;
    if !rd.has_search() {
        return Err(ApiError::Unavailable);
    }
    let etag = rd.etag().clone();
    if matches_validator(&headers, &etag) {
        return Ok(not_modified(&etag));
    }
    if method == Method::HEAD {
        return Ok(headers_only(&etag));
    }

    let limit = params
        .limit
        .unwrap_or(DEFAULT_SEARCH_LIMIT)
        .min(MAX_SEARCH_LIMIT);

    let _permit = state.permits.acquire().await.map_err(|_| ApiError::Closed)?;
    let results = tokio::task::spawn_blocking(move || -> Result<Vec<ShortRecord>, SearchError> {
        let Some(found) = snap.arch(&arch).and_then(|rd| rd.search(&params.q, limit)) else {
            return Ok(Vec::new());
        };
        Ok(found?.into_iter().map(Record::short).collect())
    })
    .await??;

    reply(&headers, &etag, &results)
}

/// Fallback for every unknown route.
pub async fn not_found() -> ApiError {
    ApiError::NotFound
}
