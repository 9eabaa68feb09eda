//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use route_cache::config::{AppConfig, CacheConfig, RouteConfig};
use route_cache::{app, HttpServer, Shutdown};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

/// A running server and the handles needed to drive and stop it.
pub struct TestServer {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    #[allow(dead_code)]
    pub config_tx: mpsc::UnboundedSender<AppConfig>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Config for the built-in app with caching into `cache_dir`.
pub fn app_config(cache_dir: &Path) -> AppConfig {
    let mut config = AppConfig::default();
    config.application.default_controller = Some("pages".into());
    config.application.error_controller = Some("errors".into());
    config.application.base_url = "http://localhost".into();
    config.cache = CacheConfig {
        dir: cache_dir.to_path_buf(),
        use_cache: true,
        ..CacheConfig::default()
    };
    config.routes = vec![
        RouteConfig::new("/", "pages/index"),
        RouteConfig::new("page/:alphanum", "pages/show/$1"),
        RouteConfig::new("page/:alphanum/:num", "pages/show/$1/$2"),
    ];
    config
}

/// Start the built-in app on an ephemeral port.
pub async fn start_server(config: AppConfig) -> TestServer {
    let server = HttpServer::new(config, Arc::new(app::registry())).unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    let (config_tx, config_updates) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let _ = server.run(listener, config_updates, server_shutdown).await;
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    TestServer {
        addr,
        shutdown,
        config_tx,
    }
}

/// Client that does not follow redirects.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}
