//! Transport-neutral view of an inbound request.

use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Method};

/// What the dispatcher and handlers may observe about a request.
#[derive(Debug, Clone)]
pub struct DispatchRequest {
    method: Method,
    path: String,
    query: Option<String>,
    headers: HeaderMap,
    form: Vec<(String, String)>,
}

impl DispatchRequest {
    /// Build from a method and a path that may carry a query string.
    pub fn new(method: Method, path_and_query: &str) -> Self {
        let (path, query) = match path_and_query.split_once('?') {
            Some((p, q)) => (p, Some(q.to_string())),
            None => (path_and_query, None),
        };
        Self {
            method,
            path: path.to_string(),
            query,
            headers: HeaderMap::new(),
            form: Vec::new(),
        }
    }

    pub fn get(path_and_query: &str) -> Self {
        Self::new(Method::GET, path_and_query)
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_form(mut self, form: Vec<(String, String)>) -> Self {
        self.form = form;
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// Path plus query string, as the client sent it.
    pub fn uri(&self) -> String {
        match &self.query {
            Some(q) if !q.is_empty() => format!("{}?{}", self.path, q),
            _ => self.path.clone(),
        }
    }

    /// Header value as text; `None` if absent or not visible ASCII.
    pub fn header(&self, name: impl header::AsHeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// All posted form fields in submission order.
    pub fn form(&self) -> &[(String, String)] {
        &self.form
    }

    /// First posted value for `key`.
    pub fn form_value(&self, key: &str) -> Option<&str> {
        self.form
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn is_get(&self) -> bool {
        self.method == Method::GET
    }

    pub fn is_post(&self) -> bool {
        self.method == Method::POST
    }

    /// True for requests sent with `X-Requested-With: XMLHttpRequest`.
    pub fn is_xhr(&self) -> bool {
        self.header("x-requested-with") == Some("XMLHttpRequest")
    }

    /// Only safe reads are served from or written to the cache.
    pub fn is_cacheable_method(&self) -> bool {
        self.method == Method::GET || self.method == Method::HEAD
    }

    /// Validator presented in `If-None-Match`.
    pub fn if_none_match(&self) -> Option<&str> {
        self.header(header::IF_NONE_MATCH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_query() {
        let req = DispatchRequest::get("/blog/show/1?x=y");
        assert_eq!(req.path(), "/blog/show/1");
        assert_eq!(req.query(), Some("x=y"));
        assert_eq!(req.uri(), "/blog/show/1?x=y");
        assert_eq!(DispatchRequest::get("/a?").uri(), "/a");
    }

    #[test]
    fn header_and_form_lookup() {
        let req = DispatchRequest::new(Method::POST, "/comments/add")
            .with_header(
                HeaderName::from_static("x-requested-with"),
                HeaderValue::from_static("XMLHttpRequest"),
            )
            .with_form(vec![
                ("name".into(), "ada".into()),
                ("name".into(), "grace".into()),
            ]);

        assert!(req.is_post());
        assert!(req.is_xhr());
        assert!(!req.is_cacheable_method());
        assert_eq!(req.form_value("name"), Some("ada"));
        assert_eq!(req.form_value("missing"), None);
        assert_eq!(req.if_none_match(), None);
    }
}
