//! Configuration file watcher for hot reload.
//!
//! Only fully validated configurations are forwarded; a broken edit is logged
//! and the running route table stays in place.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::config::schema::AppConfig;

/// Watches one configuration file and emits reloaded configs.
pub struct ConfigWatcher {
    path: PathBuf,
    update_tx: mpsc::UnboundedSender<AppConfig>,
}

impl ConfigWatcher {
    /// Returns the watcher and a receiver for configuration updates.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<AppConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        let watcher = Self {
            path: path.to_path_buf(),
            update_tx,
        };
        (watcher, update_rx)
    }

    /// Start watching. The returned handle must be kept alive.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let Self { path, update_tx } = self;
        let watched = path.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if triggers_reload(&event.kind) => reload(&path, &update_tx),
                Ok(_) => {}
                Err(e) => tracing::error!(error = ?e, "Config watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&watched, RecursiveMode::NonRecursive)?;
        tracing::info!(path = ?watched, "Config watcher started");
        Ok(watcher)
    }
}

fn triggers_reload(kind: &EventKind) -> bool {
    kind.is_modify() || kind.is_create()
}

fn reload(path: &Path, tx: &mpsc::UnboundedSender<AppConfig>) {
    tracing::info!(path = ?path, "Config file changed, reloading");
    match load_config(path) {
        Ok(config) => {
            if tx.send(config).is_err() {
                tracing::debug!("Config receiver dropped, ignoring reload");
            }
        }
        Err(e) => tracing::error!(error = %e, "Failed to reload config, keeping current routes"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, ModifyKind};

    #[test]
    fn only_writes_trigger_reload() {
        assert!(triggers_reload(&EventKind::Modify(ModifyKind::Any)));
        assert!(triggers_reload(&EventKind::Create(CreateKind::File)));
        assert!(!triggers_reload(&EventKind::Access(AccessKind::Any)));
    }

    #[test]
    fn invalid_reload_is_not_forwarded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.toml");
        std::fs::write(&path, "[cache]\nasset_bucket_secs = 0\n").unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        reload(&path, &tx);
        assert!(rx.try_recv().is_err());

        std::fs::write(&path, "[application]\ndefault_action = \"home\"\n").unwrap();
        reload(&path, &tx);
        assert_eq!(rx.try_recv().unwrap().application.default_action, "home");
    }
}
