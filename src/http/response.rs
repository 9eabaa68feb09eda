//! Response rendering.
//!
//! # Responsibilities
//! - Turn a [`DispatchOutcome`] into an HTTP response
//! - Emit `ETag` on cached artifacts and `304` on conditional hits
//! - Map dispatch errors to status codes
//!
//! # Design Decisions
//! - Debug mode shows the error code and message
//! - Production mode never shows internals; it serves static pages

use std::error::Error as _;

use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::dispatch::{fallback_page, DispatchError, DispatchOutcome, HandlerOutput};

const SERVER_ERROR_PAGE: &str = "<!DOCTYPE html>\n<html><head><title>Server Error</title></head>\
<body><h1>Server Error</h1><p>Something went wrong.</p></body></html>\n";

pub fn render(outcome: DispatchOutcome, debug: bool) -> Response {
    match outcome {
        DispatchOutcome::Served(artifact) => {
            let mut response = Response::new(Body::from(artifact.body));
            let headers = response.headers_mut();
            if let Ok(v) = HeaderValue::from_str(&artifact.content_type) {
                headers.insert(header::CONTENT_TYPE, v);
            }
            insert_etag(headers, &artifact.etag);
            response
        }
        DispatchOutcome::NotModified { etag } => {
            let mut response = StatusCode::NOT_MODIFIED.into_response();
            insert_etag(response.headers_mut(), &etag);
            response
        }
        DispatchOutcome::Dispatched(output) => output_response(output),
        DispatchOutcome::Failed(error) if debug => debug_page(&error),
        DispatchOutcome::Failed(error) if error.is_not_found() => output_response(fallback_page()),
        DispatchOutcome::Failed(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
            SERVER_ERROR_PAGE,
        )
            .into_response(),
    }
}

fn output_response(output: HandlerOutput) -> Response {
    let mut response = Response::new(Body::from(output.body));
    *response.status_mut() = output.status;
    *response.headers_mut() = output.headers;
    response
}

fn insert_etag(headers: &mut axum::http::HeaderMap, etag: &str) {
    if let Ok(v) = HeaderValue::from_str(&format!("\"{}\"", etag)) {
        headers.insert(header::ETAG, v);
    }
}

fn debug_page(error: &DispatchError) -> Response {
    let mut detail = String::new();
    let mut source = error.source();
    while let Some(cause) = source {
        detail.push_str(&format!("<li>{}</li>", escape(&cause.to_string())));
        source = cause.source();
    }

    let body = format!(
        "<!DOCTYPE html>\n<html><head><title>Error {code}</title></head><body>\
         <h1>Error {code}</h1><p>{message}</p><ul>{detail}</ul></body></html>\n",
        code = error.code().as_u32(),
        message = escape(&error.to_string()),
        detail = detail,
    );
    (
        error.status(),
        [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
        body,
    )
        .into_response()
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}
