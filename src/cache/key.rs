//! Cache identifiers.
//!
//! An identifier is `{stem}.{bucket}.{ext}`: a sanitized, flat rendering of
//! the request path and query, the time bucket, and an extension. It names
//! the cache file and doubles as the ETag. Because the bucket is part of the
//! name, rolling into a new bucket simply produces a new file.
//!
//! Stems longer than [`MAX_STEM_LEN`] are cut and suffixed with a digest of
//! the full stem so that identifiers stay within filesystem name limits.

use std::borrow::Cow;

/// Cache category of a request; selects the bucket width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheClass {
    /// Ordinary pages, short buckets.
    Page,
    /// Images and other long-lived resources, long buckets.
    Asset,
}

impl CacheClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheClass::Page => "page",
            CacheClass::Asset => "asset",
        }
    }
}

const IMAGE_EXTENSIONS: &[(&str, &str)] = &[
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("png", "image/png"),
    ("gif", "image/gif"),
    ("webp", "image/webp"),
    ("svg", "image/svg+xml"),
    ("ico", "image/x-icon"),
    ("bmp", "image/bmp"),
];

const DEFAULT_EXTENSION: &str = "html";
const HTML_CONTENT_TYPE: &str = "text/html; charset=utf-8";

/// Longest stem kept verbatim. Leaves room for the digest, bucket, extension
/// and the temp/sidecar suffixes under a 255 byte file name.
pub const MAX_STEM_LEN: usize = 120;
const DIGEST_HEX_LEN: usize = 16;

/// Bucket index for a unix timestamp: `floor(now / width)`.
pub fn bucket_index(now_secs: u64, bucket_secs: u64) -> u64 {
    now_secs / bucket_secs.max(1)
}

/// Image extension of the last path segment, lower-cased, if it has one.
pub fn image_extension(path: &str) -> Option<&'static str> {
    let last = path.rsplit('/').find(|s| !s.is_empty())?;
    let (_, ext) = last.rsplit_once('.')?;
    let ext = ext.to_ascii_lowercase();
    IMAGE_EXTENSIONS
        .iter()
        .find(|(known, _)| *known == ext)
        .map(|(known, _)| *known)
}

/// A computed cache key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKey {
    identifier: String,
    class: CacheClass,
    bucket: u64,
    extension: &'static str,
}

impl CacheKey {
    /// Derive the key for `uri` (path plus optional query) in `bucket`.
    pub fn new(uri: &str, class: CacheClass, bucket: u64, case_sensitive: bool) -> Self {
        let (path, query) = match uri.split_once('?') {
            Some((p, q)) => (p, Some(q)),
            None => (uri, None),
        };
        let extension = image_extension(path).unwrap_or(DEFAULT_EXTENSION);

        let path = fold_case(decode(path), case_sensitive);
        let mut parts: Vec<String> = path
            .split('/')
            .map(sanitize_segment)
            .filter(|s| !s.is_empty())
            .collect();

        if extension != DEFAULT_EXTENSION {
            if let Some(last) = parts.last_mut() {
                strip_extension(last, extension);
            }
            parts.retain(|s| !s.is_empty());
        }

        if let Some(query) = query {
            let query = sanitize_segment(&fold_case(decode(query), case_sensitive));
            if !query.is_empty() {
                parts.push(query);
            }
        }

        let stem = parts.join("_");
        let stem = stem.trim_matches('_');
        let stem = if stem.is_empty() { "index" } else { stem };
        let stem = bounded_stem(stem);

        Self {
            identifier: format!("{}.{}.{}", stem, bucket, extension),
            class,
            bucket,
            extension,
        }
    }

    /// File name in the cache directory; also the ETag.
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn class(&self) -> CacheClass {
        self.class
    }

    pub fn bucket(&self) -> u64 {
        self.bucket
    }

    /// Content type implied by the extension, used when no type was recorded.
    pub fn default_content_type(&self) -> &'static str {
        IMAGE_EXTENSIONS
            .iter()
            .find(|(ext, _)| *ext == self.extension)
            .map(|(_, ct)| *ct)
            .unwrap_or(HTML_CONTENT_TYPE)
    }
}

/// Sanitized stems are ASCII, so cutting at a byte index is safe.
fn bounded_stem(stem: &str) -> Cow<'_, str> {
    if stem.len() <= MAX_STEM_LEN {
        return Cow::Borrowed(stem);
    }
    let digest = blake3::hash(stem.as_bytes()).to_hex();
    let head = stem[..MAX_STEM_LEN].trim_end_matches(|c| c == '_' || c == '.');
    Cow::Owned(format!("{}_{}", head, &digest.as_str()[..DIGEST_HEX_LEN]))
}

fn decode(raw: &str) -> String {
    match urlencoding::decode_binary(raw.as_bytes()) {
        Cow::Borrowed(bytes) => String::from_utf8_lossy(bytes).into_owned(),
        Cow::Owned(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
    }
}

fn fold_case(s: String, case_sensitive: bool) -> String {
    if case_sensitive {
        s
    } else {
        s.to_lowercase()
    }
}

/// Replace anything outside `[a-zA-Z0-9._-]` with `_`, then trim stray
/// `_` and `.` from both ends.
fn sanitize_segment(segment: &str) -> String {
    let replaced: String = segment
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    replaced.trim_matches(|c| c == '_' || c == '.').to_string()
}

fn strip_extension(segment: &mut String, extension: &str) {
    if let Some(dot) = segment.rfind('.') {
        if segment[dot + 1..].eq_ignore_ascii_case(extension) {
            segment.truncate(dot);
            let trimmed = segment.trim_end_matches(|c| c == '_' || c == '.').len();
            segment.truncate(trimmed);
        }
    }
}
