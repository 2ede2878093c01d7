//! File system watcher that turns manifest changes into queue keys.

use std::path::{Path, PathBuf};
use std::sync::mpsc::{sync_channel, SyncSender};
use std::thread::JoinHandle;
use std::time::Duration;

use notify::{RecommendedWatcher, RecursiveMode};
use notify_debouncer_mini::{new_debouncer, DebouncedEvent, Debouncer};
use tokio_util::sync::CancellationToken;

use crate::error::WatchError;
use crate::queue::WorkQueue;
use crate::resource::ResourceKind;
use crate::source::manifest::is_manifest_path;
use crate::source::ManifestDirectory;

/// Key pushed when a change cannot be attributed to specific records.
pub const RESYNC_KEY: &str = "resync";

/// Watches a manifest directory and feeds the per-kind work queues.
pub struct ManifestWatcher {
    manifests: ManifestDirectory,
    rules: WorkQueue,
    scrapes: WorkQueue,
}

impl ManifestWatcher {
    pub fn new(dir: impl Into<PathBuf>, rules: WorkQueue, scrapes: WorkQueue) -> Self {
        Self {
            manifests: ManifestDirectory::new(dir),
            rules,
            scrapes,
        }
    }

    pub fn dir(&self) -> &Path {
        self.manifests.dir()
    }

    fn queue(&self, kind: ResourceKind) -> &WorkQueue {
        match kind {
            ResourceKind::RuleGroup => &self.rules,
            ResourceKind::Scrape => &self.scrapes,
        }
    }

    /// Watches until `cancel` fires. Blocks the calling thread.
    pub fn watch(&self, cancel: &CancellationToken) -> Result<(), WatchError> {
        self.watch_until(cancel, None)
    }

    fn watch_until(
        &self,
        cancel: &CancellationToken,
        ready: Option<SyncSender<()>>,
    ) -> Result<(), WatchError> {
        let dir = self.dir().to_path_buf();
        if !dir.is_dir() {
            return Err(WatchError::DirectoryNotFound(dir));
        }

        let (tx, rx) = std::sync::mpsc::channel();

        let mut debouncer: Debouncer<RecommendedWatcher> =
            new_debouncer(Duration::from_millis(500), tx)
                .map_err(|e| WatchError::Notify(e.to_string()))?;

        debouncer
            .watcher()
            .watch(&dir, RecursiveMode::Recursive)
            .map_err(|e| WatchError::Notify(e.to_string()))?;

        log::info!("Started watching manifest directory: {}", dir.display());
        if let Some(ready) = ready {
            let _ = ready.send(());
        }

        loop {
            if cancel.is_cancelled() {
                break;
            }

            match rx.recv_timeout(Duration::from_millis(100)) {
                Ok(Ok(events)) => {
                    for event in events {
                        self.process_event(event);
                    }
                }
                Ok(Err(e)) => {
                    log::error!("Watch error: {}", e);
                }
                Err(std::sync::mpsc::RecvTimeoutError::Timeout) => {}
                Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => break,
            }
        }

        log::info!("Stopped watching manifest directory");
        Ok(())
    }

    /// Runs [`watch`](Self::watch) on a dedicated thread. Returns once the
    /// directory watch is registered, or once the thread has failed.
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<Result<(), WatchError>> {
        let (ready_tx, ready_rx) = sync_channel(1);
        let handle = std::thread::spawn(move || {
            let result = self.watch_until(&cancel, Some(ready_tx));
            if let Err(e) = &result {
                log::error!("manifest watcher failed: {}", e);
            }
            result
        });
        // Disconnected means the thread exited early; its handle carries the error.
        let _ = ready_rx.recv();
        handle
    }

    /// Pushes the keys affected by one debounced event. Returns what was
    /// pushed.
    fn process_event(&self, event: DebouncedEvent) -> Vec<(ResourceKind, String)> {
        let path = &event.path;
        if !is_manifest_path(self.dir(), path) {
            return Vec::new();
        }

        let keys = if path.is_file() {
            match self.manifests.load_file(path) {
                // A record whose document stopped decoding must still leave the output.
                Ok(resources) if resources.is_empty() => resync_all(),
                Ok(resources) => resources
                    .iter()
                    .map(|r| (r.kind(), r.key().to_string()))
                    .collect(),
                Err(e) => {
                    log::warn!("{}", e);
                    resync_all()
                }
            }
        } else {
            log::debug!("{} removed, resyncing", path.display());
            resync_all()
        };

        for (kind, key) in &keys {
            log::debug!("queueing {} {}", kind, key);
            self.queue(*kind).add(key.clone());
        }
        keys
    }
}

fn resync_all() -> Vec<(ResourceKind, String)> {
    ResourceKind::all()
        .iter()
        .map(|kind| (*kind, RESYNC_KEY.to_string()))
        .collect()
}
