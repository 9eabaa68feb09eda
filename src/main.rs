//! route-cache server.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ─────────────▶ http::server ──▶ dispatch::Dispatcher ──▶ cache::CacheStore
//!                    (request id,        │        ▲             (hit / 304 / miss)
//!                     timeout, trace)    │        │
//!                                        ▼        │ commit
//!                                  routing::Router │
//!                                        │        │
//!                                        ▼        │
//!                                  HandlerRegistry ──▶ Controller::call ──▶ ResponseSink
//!
//!     config::ConfigWatcher ──▶ new AppConfig ──▶ dispatcher snapshot swap
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::{Parser, Subcommand};
use tokio::net::TcpListener;

use route_cache::config::watcher::ConfigWatcher;
use route_cache::config::{load_config, AppConfig};
use route_cache::lifecycle::signals::wait_for_signal;
use route_cache::observability::{init_logging, metrics};
use route_cache::routing::capitalize;
use route_cache::{app, CacheStore, HttpServer, Router, Shutdown};

#[derive(Parser)]
#[command(name = "route-cache")]
#[command(about = "Pattern router and controller dispatcher with a bucketed response cache", long_about = None)]
struct Cli {
    /// Configuration file (defaults are used if it does not exist)
    #[arg(short, long, global = true, default_value = "config/app.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server (default)
    Serve,
    /// Show how a path resolves and which cache file it maps to
    Resolve { path: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let (config, from_file) = if cli.config.exists() {
        (load_config(&cli.config)?, true)
    } else {
        (AppConfig::default(), false)
    };
    init_logging(&config.observability.log_level, config.observability.json_logs);
    if !from_file {
        tracing::warn!(path = ?cli.config, "Config file not found, using defaults");
    }

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(&cli.config, config, from_file).await,
        Commands::Resolve { path } => resolve(&config, &path),
    }
}

async fn serve(
    path: &Path,
    config: AppConfig,
    watch: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(
        bind_address = %config.listener.bind_address,
        routes = config.routes.len(),
        cache_enabled = config.cache.enabled(),
        debug = config.application.debug,
        "Configuration loaded"
    );

    let server = HttpServer::new(config.clone(), Arc::new(app::registry()))?;

    if let Some(cache) = server.dispatcher().cache() {
        if let Err(e) = cache.probe() {
            tracing::warn!(
                code = e.code().as_u32(),
                error = %e,
                "Cache directory is not writable; responses will not be cached"
            );
        }
    }

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let (watcher, config_updates) = ConfigWatcher::new(path);
    let _watch_handle = if watch {
        match watcher.run() {
            Ok(handle) => Some(handle),
            Err(e) => {
                tracing::warn!(error = %e, "Config hot reload disabled");
                None
            }
        }
    } else {
        None
    };

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        wait_for_signal().await;
        shutdown.trigger();
    });

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    server.run(listener, config_updates, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

fn resolve(config: &AppConfig, raw: &str) -> Result<(), Box<dyn std::error::Error>> {
    let router = Router::from_config(config)?;
    let route = router.resolve(raw);
    let app = &config.application;

    let controller = route
        .controller()
        .or_else(|| app.default_controller.as_deref().map(capitalize));
    let action = route
        .action()
        .unwrap_or_else(|| app.default_action.to_lowercase());

    let store = CacheStore::new(&config.cache, app.url_case_sensitive);
    let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs();
    let cache = store.classify(raw).map(|class| {
        let key = store.key_at(raw, class, now);
        serde_json::json!({
            "class": class.as_str(),
            "identifier": key.identifier(),
            "content_type": key.default_content_type(),
        })
    });

    let report = serde_json::json!({
        "input": raw,
        "path": route.path(),
        "matched_pattern": route.matched_pattern(),
        "segments": route.segments(),
        "controller": controller,
        "action": action,
        "params": route.params(),
        "cache": cache,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
