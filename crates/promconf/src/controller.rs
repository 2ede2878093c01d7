//! Scheduler: one queue and one worker per resource kind.
//!
//! A queued key only says that a pass should run. Every pass recomputes the
//! complete document for its kind, so the key itself is never inspected.

use futures_util::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::queue::{WorkQueue, DEFAULT_BASE_DELAY, DEFAULT_MAX_DELAY};
use crate::reconcile::Reconciler;
use crate::reload::Reload;
use crate::resource::ResourceKind;

struct Worker {
    reconciler: Arc<dyn Reconciler>,
    queue: WorkQueue,
}

pub struct Controller {
    rules: Worker,
    scrapes: Worker,
    reloader: Option<Arc<dyn Reload>>,
}

impl Controller {
    pub fn new(rules: Arc<dyn Reconciler>, scrapes: Arc<dyn Reconciler>) -> Self {
        Self::with_backoff(rules, scrapes, DEFAULT_BASE_DELAY, DEFAULT_MAX_DELAY)
    }

    /// Per-key retry delays start at `base` and are capped at `max`.
    pub fn with_backoff(
        rules: Arc<dyn Reconciler>,
        scrapes: Arc<dyn Reconciler>,
        base: Duration,
        max: Duration,
    ) -> Self {
        Self {
            rules: Worker {
                reconciler: rules,
                queue: WorkQueue::with_backoff("rulegroups", base, max),
            },
            scrapes: Worker {
                reconciler: scrapes,
                queue: WorkQueue::with_backoff("scrapes", base, max),
            },
            reloader: None,
        }
    }

    pub fn with_reloader(mut self, reloader: Arc<dyn Reload>) -> Self {
        self.reloader = Some(reloader);
        self
    }

    fn worker(&self, kind: ResourceKind) -> &Worker {
        match kind {
            ResourceKind::RuleGroup => &self.rules,
            ResourceKind::Scrape => &self.scrapes,
        }
    }

    /// The queue feeding `kind`'s worker. Watch collaborators push here.
    pub fn queue(&self, kind: ResourceKind) -> WorkQueue {
        self.worker(kind).queue.clone()
    }

    pub fn enqueue(&self, kind: ResourceKind, key: impl Into<String>) {
        self.worker(kind).queue.add(key);
    }

    /// Runs one pass per kind and reloads if either changed. Failures are
    /// logged; the queues retry them later.
    pub async fn initial_sync(&self) -> bool {
        let mut changed = false;
        for kind in ResourceKind::all() {
            match self.worker(*kind).reconciler.sync().await {
                Ok(c) => changed |= c,
                Err(e) => log::error!("initial {} sync failed: {}", kind, e),
            }
        }

        if changed {
            self.reload().await;
        }
        changed
    }

    async fn reload(&self) {
        match &self.reloader {
            Some(reloader) => reloader.reload().await,
            None => log::debug!("no reloader configured"),
        }
    }

    /// Runs both workers until `cancel` fires, then drains the queues.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        let workers: Vec<_> = ResourceKind::all()
            .iter()
            .map(|kind| {
                let this = Arc::clone(&self);
                let kind = *kind;
                tokio::spawn(async move {
                    log::info!("starting {} worker", kind);
                    while this.process_next_item(kind).await {}
                    log::info!("{} worker stopped", kind);
                })
            })
            .collect();

        cancel.cancelled().await;
        log::info!("shutting down workers");
        self.rules.queue.shut_down();
        self.scrapes.queue.shut_down();

        for worker in workers {
            if let Err(e) = worker.await {
                log::error!("worker task failed: {}", e);
            }
        }
    }

    /// Handles one key. Returns false once the queue is shut down and empty.
    pub async fn process_next_item(&self, kind: ResourceKind) -> bool {
        let worker = self.worker(kind);
        let Some(key) = worker.queue.get().await else {
            return false;
        };
        worker.queue.done(&key);

        let result = AssertUnwindSafe(worker.reconciler.sync())
            .catch_unwind()
            .await;

        match result {
            Ok(Ok(changed)) => {
                worker.queue.forget(&key);
                if changed {
                    self.reload().await;
                }
            }
            Ok(Err(e)) => {
                log::error!("{} sync triggered by {} failed: {}", kind, key, e);
                worker.queue.add_rate_limited(key);
            }
            Err(_) => {
                log::error!("{} sync triggered by {} panicked", kind, key);
                worker.queue.add_rate_limited(key);
            }
        }
        true
    }
}
