//! Filesystem-backed response store.
//!
//! # Responsibilities
//! - Classify requests (page, asset, not cacheable)
//! - Answer conditional requests from the validator alone
//! - Serve stored artifacts
//! - Hand out captures on a miss and publish them atomically
//!
//! # Design Decisions
//! - The store owns its directory; nothing else writes there
//! - Files are written to a unique temp name then renamed into place
//! - A capture that is dropped without commit removes its temp file
//! - The output's content type is kept in an `{identifier}.meta` sidecar,
//!   published before the body so a visible body always has its type
//! - Only permission and missing-directory errors count as an unwritable
//!   directory; other per-key I/O errors bypass the cache for that request
//! - Freshness is the time bucket only; a matching validator is a 304 even
//!   if the file is gone

use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use axum::body::Bytes;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;

use crate::cache::inflight::{BuildPermit, InflightBuilds};
use crate::cache::key::{bucket_index, image_extension, CacheClass, CacheKey};
use crate::config::CacheConfig;
use crate::dispatch::error::ErrorCode;
use crate::dispatch::sink::HandlerOutput;
use crate::observability::metrics;

/// Cache failures that disable caching for a request.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache directory {} is not writable: {source}", dir.display())]
    DirectoryUnwritable {
        dir: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl CacheError {
    pub fn code(&self) -> ErrorCode {
        ErrorCode::CacheDirNotWritable
    }
}

/// A stored artifact read back from disk.
#[derive(Debug, Clone)]
pub struct CachedArtifact {
    pub etag: String,
    pub content_type: String,
    pub body: Bytes,
}

/// Sidecar metadata stored next to an artifact.
#[derive(Debug, Serialize, Deserialize)]
struct ArtifactMeta {
    content_type: String,
}

fn meta_path(dir: &Path, key: &CacheKey) -> PathBuf {
    dir.join(format!("{}.meta", key.identifier()))
}

fn temp_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!(".{}.{}.tmp", name, uuid::Uuid::new_v4().simple()))
}

/// Result of consulting the store.
#[derive(Debug)]
pub enum CacheLookup {
    /// The client's validator matches the current identifier.
    NotModified { etag: String },
    /// A stored artifact exists for the current identifier.
    Hit(CachedArtifact),
    /// Nothing stored yet; the caller builds and commits through the capture.
    Miss(CacheCapture),
    /// The request is not cacheable.
    Bypass,
}

impl CacheLookup {
    pub fn label(&self) -> &'static str {
        match self {
            CacheLookup::NotModified { .. } => "not_modified",
            CacheLookup::Hit(_) => "hit",
            CacheLookup::Miss(_) => "miss",
            CacheLookup::Bypass => "bypass",
        }
    }
}

/// Response cache rooted at a directory.
#[derive(Debug, Clone)]
pub struct CacheStore {
    dir: PathBuf,
    config: CacheConfig,
    case_sensitive: bool,
    inflight: InflightBuilds,
}

impl CacheStore {
    pub fn new(config: &CacheConfig, case_sensitive: bool) -> Self {
        Self {
            dir: config.dir.clone(),
            config: config.clone(),
            case_sensitive,
            inflight: InflightBuilds::new(),
        }
    }

    /// A store with new settings that shares this store's in-flight builds.
    pub fn reconfigured(&self, config: &CacheConfig, case_sensitive: bool) -> Self {
        Self {
            inflight: self.inflight.clone(),
            ..Self::new(config, case_sensitive)
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the directory if needed and verify it accepts writes.
    pub fn probe(&self) -> Result<(), CacheError> {
        let unwritable = |source| CacheError::DirectoryUnwritable {
            dir: self.dir.clone(),
            source,
        };
        std::fs::create_dir_all(&self.dir).map_err(unwritable)?;
        let probe = self.dir.join(format!(".probe.{}", uuid::Uuid::new_v4().simple()));
        std::fs::write(&probe, b"").map_err(unwritable)?;
        std::fs::remove_file(&probe).map_err(unwritable)?;
        Ok(())
    }

    /// Cache class for a request path, or `None` if it is not cacheable.
    pub fn classify(&self, uri: &str) -> Option<CacheClass> {
        let path = uri.split('?').next().unwrap_or_default();
        let lower = path.to_lowercase();
        let marked = self
            .config
            .asset_markers
            .iter()
            .any(|m| !m.is_empty() && lower.contains(&m.to_lowercase()));

        if marked || image_extension(path).is_some() {
            self.config.use_asset_cache.then_some(CacheClass::Asset)
        } else {
            self.config.use_cache.then_some(CacheClass::Page)
        }
    }

    /// Key for `uri` at unix time `now`.
    pub fn key_at(&self, uri: &str, class: CacheClass, now: u64) -> CacheKey {
        let width = match class {
            CacheClass::Page => self.config.page_bucket_secs,
            CacheClass::Asset => self.config.asset_bucket_secs,
        };
        CacheKey::new(uri, class, bucket_index(now, width), self.case_sensitive)
    }

    /// Consult the store at the current time.
    pub async fn lookup(&self, uri: &str, validator: Option<&str>) -> Result<CacheLookup, CacheError> {
        self.lookup_at(uri, validator, unix_now()).await
    }

    /// Consult the store as of unix time `now`.
    pub async fn lookup_at(
        &self,
        uri: &str,
        validator: Option<&str>,
        now: u64,
    ) -> Result<CacheLookup, CacheError> {
        let Some(class) = self.classify(uri) else {
            return Ok(CacheLookup::Bypass);
        };
        let key = self.key_at(uri, class, now);

        let lookup = self.decide(key, validator).await;
        match &lookup {
            Ok(found) => {
                metrics::record_cache_lookup(class.as_str(), found.label());
                tracing::debug!(uri, class = class.as_str(), result = found.label(), "Cache lookup");
            }
            Err(e) => {
                metrics::record_cache_config_error();
                tracing::error!(uri, error = %e, "Cache directory unwritable, caching disabled for request");
            }
        }
        lookup
    }

    async fn decide(&self, key: CacheKey, validator: Option<&str>) -> Result<CacheLookup, CacheError> {
        if validator.is_some_and(|v| etag_matches(v, key.identifier())) {
            return Ok(CacheLookup::NotModified {
                etag: key.identifier().to_string(),
            });
        }

        if let Some(artifact) = self.read(&key).await {
            return Ok(CacheLookup::Hit(artifact));
        }

        let permit = self.inflight.acquire(key.identifier()).await;

        // A concurrent build may have published while we waited.
        if let Some(artifact) = self.read(&key).await {
            return Ok(CacheLookup::Hit(artifact));
        }

        match CacheCapture::begin(key, &self.dir, permit).await {
            Ok(capture) => Ok(CacheLookup::Miss(capture)),
            Err(source) if is_directory_error(&source) => Err(CacheError::DirectoryUnwritable {
                dir: self.dir.clone(),
                source,
            }),
            Err(e) => {
                tracing::warn!(dir = %self.dir.display(), error = %e, "Cannot capture response, bypassing cache");
                Ok(CacheLookup::Bypass)
            }
        }
    }

    async fn read(&self, key: &CacheKey) -> Option<CachedArtifact> {
        let path = self.dir.join(key.identifier());
        let body = match tokio::fs::read(&path).await {
            Ok(body) => body,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Cache file unreadable, treating as miss");
                return None;
            }
        };

        Some(CachedArtifact {
            etag: key.identifier().to_string(),
            content_type: self.read_content_type(key).await,
            body: Bytes::from(body),
        })
    }

    async fn read_content_type(&self, key: &CacheKey) -> String {
        let path = meta_path(&self.dir, key);
        let recorded = match tokio::fs::read(&path).await {
            Ok(raw) => match serde_json::from_slice::<ArtifactMeta>(&raw) {
                Ok(meta) => Some(meta.content_type),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Malformed cache metadata");
                    None
                }
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Cache metadata unreadable");
                None
            }
        };
        recorded.unwrap_or_else(|| key.default_content_type().to_string())
    }
}

fn is_directory_error(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::PermissionDenied | io::ErrorKind::NotFound
    )
}

/// Compare an `If-None-Match` header against an identifier. Accepts a
/// comma-separated list, quoted or not, strong or weak.
pub fn etag_matches(header: &str, identifier: &str) -> bool {
    header.split(',').any(|candidate| {
        let candidate = candidate.trim();
        let candidate = candidate.strip_prefix("W/").unwrap_or(candidate);
        candidate.trim_matches('"') == identifier
    })
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

struct TempFile {
    path: PathBuf,
    file: tokio::fs::File,
}

/// Output capture for a cache miss.
///
/// Holds the key's build permit and an open temp file. [`commit`](Self::commit)
/// publishes the artifact; dropping the capture discards it.
#[derive(Debug)]
pub struct CacheCapture {
    key: CacheKey,
    dir: PathBuf,
    target: PathBuf,
    temp: Option<TempFile>,
    _permit: BuildPermit,
}

impl std::fmt::Debug for TempFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TempFile").field("path", &self.path).finish()
    }
}

impl CacheCapture {
    async fn begin(key: CacheKey, dir: &Path, permit: BuildPermit) -> io::Result<Self> {
        let path = temp_path(dir, key.identifier());
        let file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await?;

        Ok(Self {
            target: dir.join(key.identifier()),
            dir: dir.to_path_buf(),
            key,
            temp: Some(TempFile { path, file }),
            _permit: permit,
        })
    }

    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    /// Persist a successful output and tag it with the validator.
    ///
    /// Persist failures are logged; the output is returned either way.
    pub async fn commit(mut self, mut output: HandlerOutput) -> HandlerOutput {
        if !output.status.is_success() {
            tracing::debug!(key = self.key.identifier(), status = %output.status, "Not caching unsuccessful output");
            return output;
        }
        output.set_etag(self.key.identifier());

        let content_type = output
            .content_type()
            .unwrap_or(self.key.default_content_type())
            .to_string();

        match self.persist(&content_type, &output.body).await {
            Ok(()) => {
                metrics::record_cache_write(self.key.class().as_str(), true);
                tracing::debug!(key = self.key.identifier(), bytes = output.body.len(), "Cached response");
            }
            Err(e) => {
                metrics::record_cache_write(self.key.class().as_str(), false);
                tracing::warn!(key = self.key.identifier(), error = %e, "Failed to write cache file");
            }
        }
        output
    }

    async fn persist(&mut self, content_type: &str, body: &[u8]) -> io::Result<()> {
        let Some(temp) = self.temp.as_mut() else {
            return Err(io::Error::new(io::ErrorKind::Other, "capture already consumed"));
        };
        temp.file.write_all(body).await?;
        temp.file.flush().await?;
        temp.file.sync_all().await?;

        self.write_meta(content_type).await?;
        if let Some(temp) = &self.temp {
            tokio::fs::rename(&temp.path, &self.target).await?;
        }
        self.temp = None;
        Ok(())
    }

    async fn write_meta(&self, content_type: &str) -> io::Result<()> {
        let meta = ArtifactMeta {
            content_type: content_type.to_string(),
        };
        let data = serde_json::to_vec(&meta).map_err(io::Error::other)?;

        let target = meta_path(&self.dir, &self.key);
        let temp = temp_path(&self.dir, &format!("{}.meta", self.key.identifier()));
        let written = async {
            let mut file = tokio::fs::File::create(&temp).await?;
            file.write_all(&data).await?;
            file.sync_all().await?;
            tokio::fs::rename(&temp, &target).await
        }
        .await;

        if written.is_err() {
            let _ = tokio::fs::remove_file(&temp).await;
        }
        written
    }
}

impl Drop for CacheCapture {
    fn drop(&mut self) {
        if let Some(temp) = self.temp.take() {
            drop(temp.file);
            if let Err(e) = std::fs::remove_file(&temp.path) {
                if e.kind() != io::ErrorKind::NotFound {
                    tracing::warn!(path = %temp.path.display(), error = %e, "Failed to remove cache temp file");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::sink::ResponseSink;
    use axum::http::{header, StatusCode};

    const NOW: u64 = 1_700_000_000;

    fn store(dir: &Path) -> CacheStore {
        let config = CacheConfig {
            dir: dir.to_path_buf(),
            use_cache: true,
            ..CacheConfig::default()
        };
        CacheStore::new(&config, false)
    }

    fn page(body: &str) -> HandlerOutput {
        let mut sink = ResponseSink::new("");
        sink.write_str(body);
        sink.finish()
    }

    fn files(dir: &Path) -> Vec<String> {
        let mut names: Vec<_> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn classification() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        assert_eq!(store.classify("/blog/show/1"), Some(CacheClass::Page));
        assert_eq!(store.classify("/blog/Thumbnail/1"), Some(CacheClass::Asset));
        assert_eq!(store.classify("/img/a.png?x=1"), Some(CacheClass::Asset));

        let pages_off = CacheStore::new(
            &CacheConfig {
                use_cache: false,
                ..CacheConfig::default()
            },
            false,
        );
        assert_eq!(pages_off.classify("/blog/show/1"), None);
        assert_eq!(pages_off.classify("/thumbnail/1"), Some(CacheClass::Asset));
    }

    #[test]
    fn asset_and_page_buckets_differ() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let page = store.key_at("/a", CacheClass::Page, NOW);
        let asset = store.key_at("/a", CacheClass::Asset, NOW);
        assert_eq!(page.bucket(), NOW / 3600);
        assert_eq!(asset.bucket(), NOW / 2_592_000);
    }

    #[test]
    fn etag_comparison() {
        assert!(etag_matches("\"a.1.html\"", "a.1.html"));
        assert!(etag_matches("a.1.html", "a.1.html"));
        assert!(etag_matches("W/\"x\", \"a.1.html\"", "a.1.html"));
        assert!(!etag_matches("\"a.2.html\"", "a.1.html"));
        assert!(!etag_matches("", "a.1.html"));
    }

    #[tokio::test]
    async fn miss_then_hit_then_conditional() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());

        let capture = match store.lookup_at("/blog/show/1", None, NOW).await.unwrap() {
            CacheLookup::Miss(c) => c,
            other => panic!("expected miss, got {:?}", other),
        };
        let etag = capture.key().identifier().to_string();
        let out = capture.commit(page("<p>post</p>")).await;
        assert_eq!(out.headers.get(header::ETAG).unwrap(), &format!("\"{}\"", etag));
        assert_eq!(files(dir.path()), vec![etag.clone(), format!("{}.meta", etag)]);

        match store.lookup_at("/blog/show/1", Some("\"other\""), NOW).await.unwrap() {
            CacheLookup::Hit(a) => {
                assert_eq!(&a.body[..], b"<p>post</p>");
                assert_eq!(a.content_type, "text/html; charset=utf-8");
                assert_eq!(a.etag, etag);
            }
            other => panic!("expected hit, got {:?}", other),
        }

        let quoted = format!("\"{}\"", etag);
        match store.lookup_at("/blog/show/1", Some(quoted.as_str()), NOW).await.unwrap() {
            CacheLookup::NotModified { etag: e } => assert_eq!(e, etag),
            other => panic!("expected not modified, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn bucket_rollover_misses() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());

        if let CacheLookup::Miss(c) = store.lookup_at("/about", None, NOW).await.unwrap() {
            c.commit(page("v1")).await;
        }
        let later = NOW + 3600;
        assert!(matches!(
            store.lookup_at("/about", None, later).await.unwrap(),
            CacheLookup::Miss(_)
        ));
    }

    #[tokio::test]
    async fn dropped_capture_leaves_no_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());

        let lookup = store.lookup_at("/blog/show/2", None, NOW).await.unwrap();
        assert!(matches!(lookup, CacheLookup::Miss(_)));
        assert_eq!(files(dir.path()).len(), 1, "temp file exists while capturing");
        drop(lookup);

        assert!(files(dir.path()).is_empty());
        assert!(matches!(
            store.lookup_at("/blog/show/2", None, NOW).await.unwrap(),
            CacheLookup::Miss(_)
        ));
    }

    #[tokio::test]
    async fn unsuccessful_output_is_not_stored() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());

        let CacheLookup::Miss(capture) = store.lookup_at("/gone", None, NOW).await.unwrap() else {
            panic!("expected miss");
        };
        let mut out = page("missing");
        out.status = StatusCode::NOT_FOUND;
        let out = capture.commit(out).await;

        assert_eq!(out.status, StatusCode::NOT_FOUND);
        assert!(out.headers.get(header::ETAG).is_none());
        assert!(files(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn unwritable_directory_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("does-not-exist");
        let store = store(&missing);

        let err = store.lookup_at("/a", None, NOW).await.unwrap_err();
        assert!(matches!(err, CacheError::DirectoryUnwritable { .. }));
        assert_eq!(err.code(), ErrorCode::CacheDirNotWritable);
    }

    #[tokio::test]
    async fn recorded_content_type_survives_a_hit() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());

        let CacheLookup::Miss(capture) = store.lookup_at("/thumbnail/show/5", None, NOW).await.unwrap() else {
            panic!("expected miss");
        };
        assert_eq!(capture.key().class(), CacheClass::Asset);
        let mut sink = ResponseSink::new("");
        sink.set_content_type("image/png");
        sink.write(b"\x89PNG");
        capture.commit(sink.finish()).await;

        match store.lookup_at("/thumbnail/show/5", None, NOW).await.unwrap() {
            CacheLookup::Hit(a) => {
                assert_eq!(a.content_type, "image/png");
                assert_eq!(&a.body[..], b"\x89PNG");
            }
            other => panic!("expected hit, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn missing_metadata_falls_back_to_extension() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let key = store.key_at("/img/logo.gif", CacheClass::Asset, NOW);
        std::fs::write(dir.path().join(key.identifier()), b"GIF89a").unwrap();

        match store.lookup_at("/img/logo.gif", None, NOW).await.unwrap() {
            CacheLookup::Hit(a) => assert_eq!(a.content_type, "image/gif"),
            other => panic!("expected hit, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn long_uri_is_still_cached() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let uri = format!("/thumbnail/show/{}", "a".repeat(300));

        let CacheLookup::Miss(capture) = store.lookup_at(&uri, None, NOW).await.unwrap() else {
            panic!("expected miss");
        };
        capture.commit(page("long")).await;
        assert!(matches!(
            store.lookup_at(&uri, None, NOW).await.unwrap(),
            CacheLookup::Hit(_)
        ));
    }

    #[tokio::test]
    async fn broken_entry_does_not_fail_the_request() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let key = store.key_at("/blocked", CacheClass::Page, NOW);
        std::fs::create_dir(dir.path().join(key.identifier())).unwrap();

        // Reading and replacing a directory both fail.
        let CacheLookup::Miss(capture) = store.lookup_at("/blocked", None, NOW).await.unwrap() else {
            panic!("expected miss");
        };
        let out = capture.commit(page("x")).await;
        assert_eq!(&out.body[..], b"x");
    }

    #[test]
    fn only_permission_and_missing_dir_are_directory_errors() {
        assert!(is_directory_error(&io::Error::from(io::ErrorKind::PermissionDenied)));
        assert!(is_directory_error(&io::Error::from(io::ErrorKind::NotFound)));
        assert!(!is_directory_error(&io::Error::from(io::ErrorKind::InvalidInput)));
        #[cfg(target_os = "linux")]
        assert!(!is_directory_error(&io::Error::from_raw_os_error(36)));
    }

    #[tokio::test]
    async fn probe_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a/b");
        let store = store(&nested);
        store.probe().unwrap();
        assert!(nested.is_dir());
        assert!(files(&nested).is_empty());
    }

    #[tokio::test]
    async fn bypass_when_disabled() {
        let config = CacheConfig {
            use_cache: false,
            use_asset_cache: false,
            ..CacheConfig::default()
        };
        let store = CacheStore::new(&config, false);
        assert!(matches!(
            store.lookup_at("/thumbnail/1", None, NOW).await.unwrap(),
            CacheLookup::Bypass
        ));
    }
}
