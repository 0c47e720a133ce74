//! Config file watcher driving node reloads.
//!
//! # Data Flow
//! ```text
//! notify event (parent dir) → filter by file name → debounce task
//!     → load_config → validated AgentConfig → reload channel
//! ```
//!
//! # Design Decisions
//! - The parent directory is watched so atomic replace-by-rename is seen
//! - Bursts of events collapse into one reload after a quiet period
//! - A config that fails to load is logged and never forwarded

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::config::schema::AgentConfig;

const DEBOUNCE: Duration = Duration::from_millis(500);

/// Watches one config file and emits each successfully loaded revision.
pub struct ConfigWatcher {
    path: PathBuf,
    update_tx: mpsc::UnboundedSender<AgentConfig>,
}

impl ConfigWatcher {
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<AgentConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        (
            Self {
                path: path.to_path_buf(),
                update_tx,
            },
            update_rx,
        )
    }

    /// Start watching. Must be called inside a tokio runtime.
    ///
    /// Events stop once the returned watcher is dropped.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let (event_tx, event_rx) = mpsc::unbounded_channel::<()>();
        let file_name: Option<OsString> = self.path.file_name().map(OsString::from);

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if event.kind.is_modify() || event.kind.is_create() => {
                    let ours = event
                        .paths
                        .iter()
                        .any(|p| p.file_name().map(OsString::from) == file_name);
                    if ours {
                        let _ = event_tx.send(());
                    }
                }
                Ok(_) => {}
                Err(e) => tracing::error!("Watch error: {:?}", e),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        tokio::spawn(debounce_reloads(self.path.clone(), event_rx, self.update_tx));
        tracing::info!(path = ?self.path, "Config watcher started");
        Ok(watcher)
    }
}

async fn debounce_reloads(
    path: PathBuf,
    mut events: mpsc::UnboundedReceiver<()>,
    updates: mpsc::UnboundedSender<AgentConfig>,
) {
    while events.recv().await.is_some() {
        // Swallow the rest of the burst.
        loop {
            match tokio::time::timeout(DEBOUNCE, events.recv()).await {
                Ok(Some(())) => continue,
                Ok(None) => return,
                Err(_) => break,
            }
        }

        tracing::info!(path = ?path, "Config file changed, reloading");
        match load_config(&path) {
            Ok(config) => {
                if updates.send(config).is_err() {
                    return;
                }
            }
            Err(e) => {
                tracing::error!("Failed to reload config: {}. Keeping current configuration.", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const VALID: &str = r#"
[[nodes]]
[nodes.api]
api_host = "https://panel.example"
api_key = "k"
node_id = 1
node_type = "vmess"
"#;

    #[tokio::test(start_paused = true)]
    async fn test_burst_collapses_into_one_reload() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(VALID.as_bytes()).unwrap();

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (update_tx, mut update_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(debounce_reloads(
            file.path().to_path_buf(),
            event_rx,
            update_tx,
        ));

        for _ in 0..5 {
            event_tx.send(()).unwrap();
        }
        let config = update_rx.recv().await.unwrap();
        assert_eq!(config.nodes.len(), 1);

        drop(event_tx);
        task.await.unwrap();
        assert!(update_rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_revision_is_not_forwarded() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"nodes = 5").unwrap();

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (update_tx, mut update_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(debounce_reloads(
            file.path().to_path_buf(),
            event_rx,
            update_tx,
        ));

        event_tx.send(()).unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        drop(event_tx);
        task.await.unwrap();
        assert!(update_rx.try_recv().is_err());
    }
}
