//! Request dispatch.
//!
//! # Responsibilities
//! - Consult the response cache before doing any work
//! - Resolve the route and find the controller and action
//! - Enforce declared arity before invoking anything
//! - Recover from dispatch failures through the error controller
//! - Hand successful output back to the cache capture
//!
//! # Design Decisions
//! - A `Dispatcher` is an immutable snapshot; reload builds a new one
//! - Fallback is one level deep: the error controller's `notFound` action
//! - Handler errors are not recovered by the fallback chain

use std::sync::Arc;

use axum::body::Bytes;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};

use crate::cache::{CacheCapture, CacheLookup, CacheStore, CachedArtifact};
use crate::config::{AppConfig, ApplicationConfig};
use crate::dispatch::error::{DispatchError, DispatchFailure, HandlerError, NOT_FOUND_MESSAGE};
use crate::dispatch::registry::{ActionContext, HandlerRegistry};
use crate::dispatch::request::DispatchRequest;
use crate::dispatch::sink::{HandlerOutput, ResponseSink, HTML_CONTENT_TYPE};
use crate::observability::metrics;
use crate::routing::{capitalize, ResolvedRoute, RouteError, Router};

/// Action invoked on the error controller when dispatch fails.
pub const NOT_FOUND_ACTION: &str = "notFound";

const FALLBACK_PAGE: &str = "<!DOCTYPE html>\n<html><head><title>Not Found</title></head>\
<body><h1>Not Found</h1><p>The page you requested could not be found.</p></body></html>\n";

/// Static 404 page served when nothing else can answer.
pub fn fallback_page() -> HandlerOutput {
    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(HTML_CONTENT_TYPE));
    HandlerOutput {
        status: StatusCode::NOT_FOUND,
        headers,
        body: Bytes::from_static(FALLBACK_PAGE.as_bytes()),
    }
}

/// How a request was answered.
#[derive(Debug)]
pub enum DispatchOutcome {
    /// Stored artifact served from the cache.
    Served(CachedArtifact),
    /// Client validator still current; answer 304.
    NotModified { etag: String },
    /// A handler (or the static fallback page) produced output.
    Dispatched(HandlerOutput),
    /// Terminal failure.
    Failed(DispatchError),
}

impl DispatchOutcome {
    /// Short label for metrics and logs.
    pub fn label(&self) -> &'static str {
        match self {
            DispatchOutcome::Served(_) => "cache_hit",
            DispatchOutcome::NotModified { .. } => "not_modified",
            DispatchOutcome::Dispatched(_) => "dispatched",
            DispatchOutcome::Failed(_) => "failed",
        }
    }
}

enum Attempt {
    Done(HandlerOutput),
    Failed(DispatchFailure),
}

/// Routes requests to registered handlers, with caching and 404 fallback.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    router: Router,
    registry: Arc<HandlerRegistry>,
    cache: Option<CacheStore>,
    settings: ApplicationConfig,
}

impl Dispatcher {
    pub fn new(
        router: Router,
        registry: Arc<HandlerRegistry>,
        cache: Option<CacheStore>,
        settings: ApplicationConfig,
    ) -> Self {
        Self {
            router,
            registry,
            cache,
            settings,
        }
    }

    /// Build from configuration. The cache is only attached when enabled.
    pub fn from_config(config: &AppConfig, registry: Arc<HandlerRegistry>) -> Result<Self, RouteError> {
        let router = Router::from_config(config)?;
        let cache = config
            .cache
            .enabled()
            .then(|| CacheStore::new(&config.cache, config.application.url_case_sensitive));
        Ok(Self::new(router, registry, cache, config.application.clone()))
    }

    /// A new snapshot for `config` sharing this one's registry and
    /// in-flight cache builds.
    pub fn reconfigure(&self, config: &AppConfig) -> Result<Self, RouteError> {
        let router = Router::from_config(config)?;
        let case_sensitive = config.application.url_case_sensitive;
        let cache = config.cache.enabled().then(|| match &self.cache {
            Some(current) => current.reconfigured(&config.cache, case_sensitive),
            None => CacheStore::new(&config.cache, case_sensitive),
        });
        Ok(Self::new(
            router,
            Arc::clone(&self.registry),
            cache,
            config.application.clone(),
        ))
    }

    pub fn debug(&self) -> bool {
        self.settings.debug
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn cache(&self) -> Option<&CacheStore> {
        self.cache.as_ref()
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    /// Answer one request.
    pub async fn handle(&self, request: DispatchRequest) -> DispatchOutcome {
        let capture = match self.consult_cache(&request).await {
            Ok(capture) => capture,
            Err(answered) => return answered,
        };

        let request = Arc::new(request);
        match self.dispatch(&request).await {
            Ok(output) => match capture {
                Some(capture) => DispatchOutcome::Dispatched(capture.commit(output).await),
                None => DispatchOutcome::Dispatched(output),
            },
            Err(e) => {
                tracing::warn!(path = %request.path(), error = %e, "Request failed");
                DispatchOutcome::Failed(e)
            }
        }
    }

    /// `Err` carries an outcome answered from the cache; `Ok` carries the
    /// capture to fill, if any.
    async fn consult_cache(
        &self,
        request: &DispatchRequest,
    ) -> Result<Option<CacheCapture>, DispatchOutcome> {
        let Some(cache) = &self.cache else {
            return Ok(None);
        };
        if !request.is_cacheable_method() {
            return Ok(None);
        }

        match cache.lookup(&request.uri(), request.if_none_match()).await {
            Ok(CacheLookup::NotModified { etag }) => Err(DispatchOutcome::NotModified { etag }),
            Ok(CacheLookup::Hit(artifact)) => Err(DispatchOutcome::Served(artifact)),
            Ok(CacheLookup::Miss(capture)) => Ok(Some(capture)),
            Ok(CacheLookup::Bypass) => Ok(None),
            // Already logged and counted by the store.
            Err(_) => Ok(None),
        }
    }

    async fn dispatch(&self, request: &Arc<DispatchRequest>) -> Result<HandlerOutput, DispatchError> {
        let route = self.router.resolve(request.path());
        let primary = match self.try_dispatch(&route, request).await? {
            Attempt::Done(output) => return Ok(output),
            Attempt::Failed(failure) => failure,
        };
        metrics::record_dispatch_failure(primary.kind());
        tracing::debug!(path = %route.path(), failure = %primary, "Dispatch failed");

        let Some(error_controller) = self.settings.error_controller.as_deref() else {
            return Err(DispatchError::not_found(primary));
        };

        let fallback_path = format!("/{}/{}", error_controller, NOT_FOUND_ACTION);
        let fallback_route = self.router.resolve(&fallback_path);
        match self.try_dispatch(&fallback_route, request).await? {
            Attempt::Done(mut output) => {
                if output.status == StatusCode::OK {
                    output.status = StatusCode::NOT_FOUND;
                }
                Ok(output)
            }
            Attempt::Failed(fallback) => {
                metrics::record_dispatch_failure(fallback.kind());
                tracing::warn!(
                    path = %route.path(),
                    primary = %primary,
                    fallback = %fallback,
                    "Error controller could not handle not-found"
                );
                if self.settings.debug {
                    Err(DispatchError::FallbackExhausted {
                        message: NOT_FOUND_MESSAGE.to_string(),
                        route: fallback_path,
                        primary,
                        fallback,
                    })
                } else {
                    Ok(fallback_page())
                }
            }
        }
    }

    async fn try_dispatch(
        &self,
        route: &ResolvedRoute,
        request: &Arc<DispatchRequest>,
    ) -> Result<Attempt, DispatchError> {
        let controller = route
            .controller()
            .or_else(|| self.settings.default_controller.as_deref().map(capitalize))
            .unwrap_or_default();
        let action = route
            .action()
            .unwrap_or_else(|| self.settings.default_action.to_lowercase());

        let Some(entry) = self.registry.lookup(&controller) else {
            return Ok(Attempt::Failed(DispatchFailure::HandlerNotFound { controller }));
        };
        let Some(arity) = entry.arity(&action) else {
            return Ok(Attempt::Failed(DispatchFailure::ActionNotFound { controller, action }));
        };

        let params = route.params();
        if !arity.accepts(params.len()) {
            return Ok(Attempt::Failed(DispatchFailure::ArityMismatch {
                controller,
                action,
                required: arity.required,
                total: arity.total,
                supplied: params.len(),
            }));
        }

        tracing::debug!(controller = %controller, action = %action, params = ?params, "Dispatching");
        let handler = entry.instantiate(request);
        let mut ctx = ActionContext::new(
            Arc::clone(request),
            params.to_vec(),
            ResponseSink::new(&self.settings.base_url),
        );

        match handler.call(&action, &mut ctx).await {
            Ok(()) => Ok(Attempt::Done(ctx.into_output())),
            Err(HandlerError::UnknownAction(_)) => {
                Ok(Attempt::Failed(DispatchFailure::ActionNotFound { controller, action }))
            }
            Err(source) => Err(DispatchError::Handler {
                controller,
                action,
                source,
            }),
        }
    }
}
