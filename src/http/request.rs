//! Inbound request handling.
//!
//! # Responsibilities
//! - Generate a unique request ID (UUID v4) and echo it back
//! - Enforce the body size limit
//! - Decode posted form fields
//! - Convert the axum request into a transport-neutral [`DispatchRequest`]
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - Form data only read for `application/x-www-form-urlencoded` bodies

use axum::body::Body;
use axum::extract::Request;
use axum::http::{header, HeaderMap, HeaderName};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};

use crate::dispatch::DispatchRequest;

pub const X_REQUEST_ID: &str = "x-request-id";

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Layer that assigns `x-request-id` when the client did not send one.
pub fn set_request_id_layer() -> SetRequestIdLayer<MakeRequestUuid> {
    SetRequestIdLayer::new(HeaderName::from_static(X_REQUEST_ID), MakeRequestUuid)
}

/// Layer that copies `x-request-id` onto the response.
pub fn propagate_request_id_layer() -> PropagateRequestIdLayer {
    PropagateRequestIdLayer::new(HeaderName::from_static(X_REQUEST_ID))
}

/// Request ID assigned by [`set_request_id_layer`], or `"unknown"`.
pub fn request_id(headers: &HeaderMap) -> &str {
    headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
}

#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("request body unreadable or larger than {limit} bytes")]
    Body {
        limit: usize,
        #[source]
        source: axum::Error,
    },
}

/// Buffer the body (up to `max_body_bytes`) and build a dispatch request.
pub async fn into_dispatch_request(
    request: Request<Body>,
    max_body_bytes: usize,
) -> Result<DispatchRequest, RequestError> {
    let (parts, body) = request.into_parts();
    let path_and_query = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");

    let form = if is_form(&parts.headers) {
        let bytes = axum::body::to_bytes(body, max_body_bytes)
            .await
            .map_err(|source| RequestError::Body {
                limit: max_body_bytes,
                source,
            })?;
        url::form_urlencoded::parse(&bytes).into_owned().collect()
    } else {
        Vec::new()
    };

    Ok(DispatchRequest::new(parts.method.clone(), path_and_query)
        .with_headers(parts.headers)
        .with_form(form))
}

fn is_form(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|ct| ct.split(';').next())
        .is_some_and(|mime| mime.trim().eq_ignore_ascii_case(FORM_CONTENT_TYPE))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Method;

    #[tokio::test]
    async fn form_fields_are_decoded() {
        let request = axum::http::Request::builder()
            .method(Method::POST)
            .uri("/comments/add?draft=1")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded; charset=utf-8")
            .body(Body::from("name=Ada+L&text=hi%21"))
            .unwrap();

        let req = into_dispatch_request(request, 1024).await.unwrap();
        assert!(req.is_post());
        assert_eq!(req.path(), "/comments/add");
        assert_eq!(req.query(), Some("draft=1"));
        assert_eq!(req.form_value("name"), Some("Ada L"));
        assert_eq!(req.form_value("text"), Some("hi!"));
    }

    #[tokio::test]
    async fn oversized_form_is_rejected() {
        let request = axum::http::Request::builder()
            .method(Method::POST)
            .uri("/comments/add")
            .header(header::CONTENT_TYPE, FORM_CONTENT_TYPE)
            .body(Body::from("x".repeat(64)))
            .unwrap();

        let err = into_dispatch_request(request, 16).await.unwrap_err();
        assert!(matches!(err, RequestError::Body { limit: 16, .. }));
    }

    #[tokio::test]
    async fn other_bodies_are_ignored() {
        let request = axum::http::Request::builder()
            .method(Method::POST)
            .uri("/upload")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{\"a\":1}"))
            .unwrap();

        let req = into_dispatch_request(request, 4).await.unwrap();
        assert!(req.form().is_empty());
    }

    #[test]
    fn missing_request_id_is_unknown() {
        assert_eq!(request_id(&HeaderMap::new()), "unknown");
    }
}
