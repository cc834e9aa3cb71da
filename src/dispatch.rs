//! Per-tab event dispatcher
//!
//! Events for the same tab id are handled strictly in delivery order by a
//! dedicated worker task; events for different tabs run independently.
//! A worker is spawned on a tab's first event and retires itself once its
//! queue is empty after a `TabRemoved` event.
//!
//! A `TabCreated` event with an opener waits until the opener's worker has
//! handled everything delivered to it before the tab was created, so the
//! spawned-tab context sees the opener's latest click and gesture.

use crate::guard::{NavigationGuard, Outcome};
use crate::types::{BrowserEvent, TabId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, oneshot};

enum Job {
    Event {
        event: BrowserEvent,
        /// Released once the opener's earlier events were handled
        after: Option<oneshot::Receiver<()>>,
        done: Option<oneshot::Sender<Outcome>>,
    },
    Barrier(oneshot::Sender<()>),
}

struct Worker {
    id: u64,
    sender: mpsc::UnboundedSender<Job>,
}

type Workers = Arc<Mutex<HashMap<TabId, Worker>>>;

/// Routes inbound events to one FIFO worker per tab
///
/// Must be used from within a Tokio runtime.
pub struct GuardDispatcher {
    guard: Arc<NavigationGuard>,
    workers: Workers,
    next_worker_id: AtomicU64,
}

impl GuardDispatcher {
    pub fn new(guard: Arc<NavigationGuard>) -> Self {
        Self {
            guard,
            workers: Arc::new(Mutex::new(HashMap::new())),
            next_worker_id: AtomicU64::new(0),
        }
    }

    pub fn guard(&self) -> &Arc<NavigationGuard> {
        &self.guard
    }

    /// Queue an event without waiting for it to be handled
    pub fn dispatch(&self, event: BrowserEvent) {
        self.enqueue(event, None);
    }

    /// Queue an event and wait for its outcome
    ///
    /// Returns `None` if the worker stopped before handling the event.
    pub async fn dispatch_and_wait(&self, event: BrowserEvent) -> Option<Outcome> {
        let (tx, rx) = oneshot::channel();
        self.enqueue(event, Some(tx));
        rx.await.ok()
    }

    /// Number of tabs with a live worker
    pub fn active_tabs(&self) -> usize {
        self.workers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    fn enqueue(&self, event: BrowserEvent, done: Option<oneshot::Sender<Outcome>>) {
        let tab_id = event.tab_id();
        let opener_tab_id = match &event {
            BrowserEvent::TabCreated(tab) => tab.opener_tab_id.filter(|id| *id != tab_id),
            _ => None,
        };

        let mut workers = self.workers.lock().unwrap_or_else(|e| e.into_inner());

        // An opener without a live worker has nothing pending
        let after = opener_tab_id.and_then(|opener_tab_id| {
            let worker = workers.get(&opener_tab_id)?;
            let (tx, rx) = oneshot::channel();
            worker.sender.send(Job::Barrier(tx)).ok()?;
            Some(rx)
        });

        self.send(&mut workers, tab_id, Job::Event { event, after, done });
    }

    /// Send a job to a tab's worker, spawning one if none is live
    ///
    /// Callers hold the worker map lock, which is what orders sends
    /// against a worker retiring itself.
    fn send(&self, workers: &mut HashMap<TabId, Worker>, tab_id: TabId, job: Job) {
        let job = match workers.get(&tab_id) {
            Some(worker) => match worker.sender.send(job) {
                Ok(()) => return,
                Err(mpsc::error::SendError(job)) => job,
            },
            None => job,
        };

        let worker = self.spawn_worker(tab_id);
        // A fresh receiver is alive, so this send cannot fail
        let _ = worker.sender.send(job);
        workers.insert(tab_id, worker);
    }

    fn spawn_worker(&self, tab_id: TabId) -> Worker {
        let (tx, mut rx) = mpsc::unbounded_channel::<Job>();
        let id = self.next_worker_id.fetch_add(1, Ordering::Relaxed);
        let guard = self.guard.clone();
        let workers = self.workers.clone();

        tokio::spawn(async move {
            tracing::debug!(tab_id, worker = id, "Tab worker started");
            let mut next = None;

            loop {
                let job = match next.take() {
                    Some(job) => job,
                    None => match rx.recv().await {
                        Some(job) => job,
                        None => break,
                    },
                };

                let (event, after, done) = match job {
                    Job::Barrier(release) => {
                        let _ = release.send(());
                        continue;
                    }
                    Job::Event { event, after, done } => (event, after, done),
                };

                if let Some(after) = after {
                    // An error means the opener's worker is gone; nothing to wait for
                    let _ = after.await;
                }

                let name = event.name();
                let closes_tab = matches!(event, BrowserEvent::TabRemoved { .. });
                let outcome = guard.handle(event).await;
                tracing::trace!(tab_id, event = name, outcome = ?outcome, "Event handled");

                let mut retire = false;
                if closes_tab {
                    let mut map = workers.lock().unwrap_or_else(|e| e.into_inner());
                    match rx.try_recv() {
                        // The tab id was reused before the removal was handled
                        Ok(job) => next = Some(job),
                        Err(_) => {
                            if map.get(&tab_id).is_some_and(|w| w.id == id) {
                                map.remove(&tab_id);
                            }
                            retire = true;
                        }
                    }
                }

                if let Some(done) = done {
                    let _ = done.send(outcome);
                }
                if retire {
                    break;
                }
            }
            tracing::debug!(tab_id, worker = id, "Tab worker stopped");
        });

        Worker { id, sender: tx }
    }
}
