//! The fixed-order request pipeline.
//!
//! Order matters and is part of the wire contract: path normalization
//! (trailing slash, `$details`), content negotiation, conditional 304,
//! CORS, bearer authentication, then request logging closest to the
//! handler. Handlers behind the pipeline only ever see normalized paths.

use crate::problem::{ErrorKind, Problem};
use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderValue, Method, StatusCode, Uri, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, NaiveDateTime, Utc};
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

pub const DETAILS_HEADER: &str = "X-XRegistry-Details";

/// Marker left on the request when the `$details` suffix was stripped.
#[derive(Debug, Clone, Copy)]
struct DetailsRequested;

/// Pipeline configuration shared by the auth middleware.
#[derive(Debug, Clone, Default)]
pub struct AuthConfig {
    pub api_key: Option<String>,
}

/// Trailing-slash and `$details` normalization.
///
/// `GET path`, `GET path/`, and `GET path$details` are the same request;
/// the `$details` variant additionally tags the response.
pub async fn normalize_path(mut req: Request, next: Next) -> Response {
    let uri = req.uri().clone();
    let path = uri.path();

    let mut normalized = path.to_string();
    if normalized.len() > 1 && normalized.ends_with('/') {
        normalized.truncate(normalized.len() - 1);
    }
    let details = normalized.ends_with("$details");
    if details {
        normalized.truncate(normalized.len() - "$details".len());
        if normalized.is_empty() {
            normalized.push('/');
        }
        req.extensions_mut().insert(DetailsRequested);
    }

    if normalized != path {
        let rewritten = match uri.query() {
            Some(query) => format!("{normalized}?{query}"),
            None => normalized,
        };
        if let Ok(new_uri) = rewritten.parse::<Uri>() {
            *req.uri_mut() = new_uri;
        }
    }

    let mut response = next.run(req).await;
    if details {
        response
            .headers_mut()
            .insert(DETAILS_HEADER, HeaderValue::from_static("true"));
    }
    response
}

/// Content negotiation: the gateway only speaks xRegistry JSON.
///
/// An absent header, `*/*`, or anything including `text/html` (browsers)
/// is served; otherwise only `application/json` and its schema-qualified
/// variant are accepted.
pub async fn negotiate(req: Request, next: Next) -> Response {
    let accept = req
        .headers()
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok());

    if !acceptable(accept) {
        let offered = accept.unwrap_or_default().to_string();
        return Problem::new(ErrorKind::NotAcceptable, req.uri().path())
            .with_detail(format!("cannot satisfy Accept header '{offered}'"))
            .into_response();
    }
    next.run(req).await
}

fn acceptable(accept: Option<&str>) -> bool {
    let Some(accept) = accept else {
        return true;
    };
    if accept.trim().is_empty() {
        return true;
    }
    accept.split(',').any(|part| {
        let media_type = part.split(';').next().unwrap_or("").trim();
        matches!(
            media_type,
            "*/*" | "text/html" | "application/json" | "application/*"
        )
    })
}

/// Conditional responses: a matching `If-None-Match` or a fresh
/// `If-Modified-Since` turns the shaped response into a bodiless 304
/// carrying the same identity headers.
pub async fn conditional(req: Request, next: Next) -> Response {
    let if_none_match = header_string(&req, header::IF_NONE_MATCH);
    let if_modified_since = header_string(&req, header::IF_MODIFIED_SINCE);
    let method = req.method().clone();

    let response = next.run(req).await;
    if method != Method::GET || !response.status().is_success() {
        return response;
    }

    let etag = response
        .headers()
        .get(header::ETAG)
        .and_then(|v| v.to_str().ok());

    let mut not_modified = match (&if_none_match, etag) {
        (Some(candidates), Some(etag)) => {
            candidates == "*" || candidates.split(',').any(|c| c.trim() == etag)
        }
        _ => false,
    };

    if !not_modified
        && let (Some(since), Some(last_modified)) = (
            if_modified_since.as_deref().and_then(parse_http_date),
            response
                .headers()
                .get(header::LAST_MODIFIED)
                .and_then(|v| v.to_str().ok())
                .and_then(parse_http_date),
        )
        && last_modified <= since
    {
        not_modified = true;
    }

    if not_modified {
        let mut stripped = Response::builder()
            .status(StatusCode::NOT_MODIFIED)
            .body(axum::body::Body::empty())
            .unwrap_or_default();
        *stripped.headers_mut() = response.headers().clone();
        stripped.headers_mut().remove(header::CONTENT_LENGTH);
        return stripped;
    }
    response
}

fn parse_http_date(raw: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw, "%a, %d %b %Y %H:%M:%S GMT")
        .ok()
        .map(|naive| naive.and_utc())
}

fn header_string(req: &Request, name: header::HeaderName) -> Option<String> {
    req.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Bearer authentication when an API key is configured.
///
/// `OPTIONS` is always exempt; `/model` is exempt for loopback peers so
/// container health checks keep working without credentials.
pub async fn authenticate(
    State(config): State<Arc<AuthConfig>>,
    req: Request,
    next: Next,
) -> Response {
    let Some(expected) = config.api_key.as_deref() else {
        return next.run(req).await;
    };

    if req.method() == Method::OPTIONS {
        return next.run(req).await;
    }
    if req.uri().path().ends_with("/model") || req.uri().path() == "/model" {
        let loopback = req
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .is_some_and(|ConnectInfo(addr)| addr.ip().is_loopback());
        if loopback {
            return next.run(req).await;
        }
    }

    let authorized = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .is_some_and(|token| token == expected);

    if authorized {
        next.run(req).await
    } else {
        Problem::new(ErrorKind::Unauthorized, req.uri().path())
            .with_detail("missing or invalid API key")
            .into_response()
    }
}

static REQUEST_SEQ: AtomicU64 = AtomicU64::new(1);

/// Structured request logging with a per-process request id. Inbound W3C
/// `traceparent` values are carried into the log record and echoed back.
pub async fn trace_requests(req: Request, next: Next) -> Response {
    let id = REQUEST_SEQ.fetch_add(1, Ordering::Relaxed);
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let traceparent = header_string(&req, header::HeaderName::from_static("traceparent"));

    tracing::debug!(request_id = id, %method, path, "request start");
    let start = Instant::now();

    let mut response = next.run(req).await;

    let bytes = response
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());
    tracing::info!(
        request_id = id,
        %method,
        path,
        status = response.status().as_u16(),
        duration_ms = start.elapsed().as_millis() as u64,
        bytes,
        traceparent,
        "request complete"
    );

    if let Ok(value) = HeaderValue::from_str(&id.to_string()) {
        response.headers_mut().insert("x-request-id", value);
    }
    if let Some(tp) = traceparent
        && let Ok(value) = HeaderValue::from_str(&tp)
    {
        response.headers_mut().insert("traceparent", value);
    }
    response
}
