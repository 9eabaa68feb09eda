//! In-memory response sink handed to actions.
//!
//! Actions never write to the transport directly. Everything lands here and
//! is turned into a [`HandlerOutput`] once the action returns, which is what
//! lets the cache persist a complete body or discard it.

use std::fmt;

use axum::body::Bytes;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};

pub const HTML_CONTENT_TYPE: &str = "text/html; charset=utf-8";

/// Buffer for status, headers and body produced by one action.
#[derive(Debug)]
pub struct ResponseSink {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
    base_url: String,
}

impl ResponseSink {
    /// `base_url` prefixes `Location` headers written by [`redirect`](Self::redirect).
    pub fn new(base_url: &str) -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Vec::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn write(&mut self, bytes: &[u8]) {
        self.body.extend_from_slice(bytes);
    }

    pub fn write_str(&mut self, text: &str) {
        self.write(text.as_bytes());
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn set_header(&mut self, name: header::HeaderName, value: HeaderValue) {
        self.headers.insert(name, value);
    }

    /// Set `Content-Type`; invalid values are ignored with a warning.
    pub fn set_content_type(&mut self, content_type: &str) {
        match HeaderValue::from_str(content_type) {
            Ok(v) => self.set_header(header::CONTENT_TYPE, v),
            Err(_) => tracing::warn!(content_type, "Ignoring invalid content type"),
        }
    }

    /// Redirect the client to another application route, e.g. `blog/show/1`.
    pub fn redirect(&mut self, route: &str) {
        let location = format!("{}/{}", self.base_url, route.trim_start_matches('/'));
        match HeaderValue::from_str(&location) {
            Ok(v) => {
                self.set_header(header::LOCATION, v);
                self.status = StatusCode::FOUND;
            }
            Err(_) => tracing::warn!(location = %location, "Ignoring invalid redirect target"),
        }
    }

    pub fn len(&self) -> usize {
        self.body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    /// Freeze the sink into a finished output.
    pub fn finish(mut self) -> HandlerOutput {
        if !self.headers.contains_key(header::CONTENT_TYPE) {
            self.headers
                .insert(header::CONTENT_TYPE, HeaderValue::from_static(HTML_CONTENT_TYPE));
        }
        HandlerOutput {
            status: self.status,
            headers: self.headers,
            body: Bytes::from(self.body),
        }
    }
}

impl fmt::Write for ResponseSink {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        ResponseSink::write_str(self, s);
        Ok(())
    }
}

/// Completed output of an action.
#[derive(Debug, Clone)]
pub struct HandlerOutput {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl HandlerOutput {
    /// Attach the cache validator as an `ETag` header.
    pub fn set_etag(&mut self, etag: &str) {
        if let Ok(v) = HeaderValue::from_str(&format!("\"{}\"", etag)) {
            self.headers.insert(header::ETAG, v);
        }
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
    }
}
