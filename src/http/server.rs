//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the axum Router with a single catch-all handler
//! - Wire up middleware (tracing, timeout, request ID)
//! - Hand every request to the current dispatcher snapshot
//! - Swap the snapshot when a new configuration arrives
//! - Shut down gracefully on the lifecycle signal

use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use axum::{
    extract::{Request, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::AppConfig;
use crate::dispatch::{Dispatcher, HandlerRegistry};
use crate::http::request::{
    into_dispatch_request, propagate_request_id_layer, request_id, set_request_id_layer,
};
use crate::http::response::render;
use crate::lifecycle::shutdown::wait as wait_for_shutdown;
use crate::observability::metrics;
use crate::routing::RouteError;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<ArcSwap<Dispatcher>>,
    pub max_body_bytes: usize,
}

/// HTTP front end for the dispatcher.
pub struct HttpServer {
    router: Router,
    config: AppConfig,
    dispatcher: Arc<ArcSwap<Dispatcher>>,
}

impl HttpServer {
    pub fn new(config: AppConfig, registry: Arc<HandlerRegistry>) -> Result<Self, RouteError> {
        let dispatcher = Arc::new(ArcSwap::from_pointee(Dispatcher::from_config(
            &config, registry,
        )?));
        let state = AppState {
            dispatcher: Arc::clone(&dispatcher),
            max_body_bytes: config.listener.max_body_bytes,
        };
        let router = Self::build_router(&config, state);
        Ok(Self {
            router,
            config,
            dispatcher,
        })
    }

    /// Build the axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &AppConfig, state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(dispatch_handler))
            .route("/", any(dispatch_handler))
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(propagate_request_id_layer())
            .layer(TraceLayer::new_for_http())
            .layer(set_request_id_layer())
    }

    /// Router with all layers, for serving or driving directly in tests.
    pub fn app(&self) -> Router {
        self.router.clone()
    }

    /// Current dispatcher snapshot.
    pub fn dispatcher(&self) -> Arc<Dispatcher> {
        self.dispatcher.load_full()
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Serve until `shutdown` fires, applying configs from `config_updates`
    /// as they arrive.
    pub async fn run(
        self,
        listener: TcpListener,
        config_updates: mpsc::UnboundedReceiver<AppConfig>,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let reloader = tokio::spawn(apply_updates(Arc::clone(&self.dispatcher), config_updates));

        axum::serve(listener, self.router)
            .with_graceful_shutdown(wait_for_shutdown(shutdown))
            .await?;

        reloader.abort();
        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn apply_updates(
    dispatcher: Arc<ArcSwap<Dispatcher>>,
    mut updates: mpsc::UnboundedReceiver<AppConfig>,
) {
    while let Some(config) = updates.recv().await {
        match dispatcher.load().reconfigure(&config) {
            Ok(next) => {
                dispatcher.store(Arc::new(next));
                tracing::info!(routes = config.routes.len(), "Configuration applied");
            }
            Err(e) => tracing::error!(error = %e, "Rejected configuration update"),
        }
    }
}

async fn dispatch_handler(State(state): State<AppState>, request: Request) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let request_id = request_id(request.headers()).to_string();

    let request = match into_dispatch_request(request, state.max_body_bytes).await {
        Ok(r) => r,
        Err(e) => {
            tracing::warn!(request_id = %request_id, error = %e, "Rejected request body");
            metrics::record_request(&method, 413, "rejected", start);
            return (StatusCode::PAYLOAD_TOO_LARGE, e.to_string()).into_response();
        }
    };

    let dispatcher = state.dispatcher.load_full();
    let path = request.path().to_string();
    let outcome = dispatcher.handle(request).await;
    let label = outcome.label();
    let response = render(outcome, dispatcher.debug());

    let status = response.status().as_u16();
    metrics::record_request(&method, status, label, start);
    tracing::debug!(
        request_id = %request_id,
        method = %method,
        path = %path,
        status,
        outcome = label,
        "Request complete"
    );
    response
}
