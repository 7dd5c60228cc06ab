//! Per-job publish/subscribe for job snapshots.
//!
//! [`ProgressBus`] keeps one topic per live job id. A topic is opened when the
//! job is created and disappears either when a terminal snapshot is published
//! (auto-close) or when the job store drops the job. The bus stores no job
//! data of its own; it only relays what it is handed.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use uuid::Uuid;

use crate::models::job::JobSnapshot;

/// Callback invoked with every snapshot published for a subscribed job.
///
/// Listeners run on the publisher's thread while the job store is locked, so
/// they must hand the snapshot off (e.g. into a channel) and return.
pub type Listener = Arc<dyn Fn(&JobSnapshot) + Send + Sync>;

type Topics = HashMap<Uuid, Vec<(u64, Listener)>>;

/// In-process fan-out of job snapshots, keyed by job id.
///
/// Cloning is cheap and every clone shares the same topics.
#[derive(Clone, Default)]
pub struct ProgressBus {
    topics: Arc<Mutex<Topics>>,
    next_listener: Arc<AtomicU64>,
}

impl ProgressBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open an empty topic for a freshly created job.
    pub fn open(&self, job_id: Uuid) {
        self.topics.lock().entry(job_id).or_default();
    }

    /// Register a listener for `job_id`.
    ///
    /// Returns `None` when there is no open topic for the id, which is the
    /// case for unknown jobs and for jobs that already published a terminal
    /// snapshot. The bus never replays earlier snapshots.
    pub fn subscribe(&self, job_id: Uuid, listener: Listener) -> Option<Subscription> {
        let mut topics = self.topics.lock();
        let listeners = topics.get_mut(&job_id)?;
        let listener_id = self.next_listener.fetch_add(1, Ordering::Relaxed);
        listeners.push((listener_id, listener));

        tracing::trace!(job_id = %job_id, listener_id, "Listener subscribed");

        Some(Subscription {
            bus: self.clone(),
            job_id,
            listener_id,
            active: true,
        })
    }

    /// Deliver `snapshot` to every listener of its job, in subscription order.
    ///
    /// A terminal snapshot closes the topic after delivery. Publishing to a
    /// job with no listeners or no topic does nothing.
    pub fn publish(&self, snapshot: &JobSnapshot) {
        let listeners: Vec<Listener> = {
            let mut topics = self.topics.lock();
            if snapshot.is_terminal() {
                match topics.remove(&snapshot.id) {
                    Some(entries) => entries.into_iter().map(|(_, l)| l).collect(),
                    None => return,
                }
            } else {
                match topics.get(&snapshot.id) {
                    Some(entries) => entries.iter().map(|(_, l)| Arc::clone(l)).collect(),
                    None => return,
                }
            }
        };

        for listener in &listeners {
            listener(snapshot);
        }

        if snapshot.is_terminal() {
            tracing::trace!(
                job_id = %snapshot.id,
                delivered = listeners.len(),
                "Topic closed after terminal snapshot"
            );
        }
    }

    /// Remove one listener. Safe to call after the topic is gone.
    pub fn unsubscribe(&self, job_id: Uuid, listener_id: u64) {
        let mut topics = self.topics.lock();
        if let Some(listeners) = topics.get_mut(&job_id) {
            listeners.retain(|(id, _)| *id != listener_id);
        }
    }

    /// Drop the topic for `job_id` together with all its listeners.
    pub fn close(&self, job_id: Uuid) {
        self.topics.lock().remove(&job_id);
    }

    pub fn listener_count(&self, job_id: Uuid) -> usize {
        self.topics.lock().get(&job_id).map_or(0, Vec::len)
    }

    pub fn is_open(&self, job_id: Uuid) -> bool {
        self.topics.lock().contains_key(&job_id)
    }

    pub fn topic_count(&self) -> usize {
        self.topics.lock().len()
    }
}

/// Handle for one registered listener. Dropping it unsubscribes.
pub struct Subscription {
    bus: ProgressBus,
    job_id: Uuid,
    listener_id: u64,
    active: bool,
}

impl Subscription {
    pub fn job_id(&self) -> Uuid {
        self.job_id
    }

    /// Remove the listener. Calling this more than once is harmless.
    pub fn unsubscribe(&mut self) {
        if self.active {
            self.bus.unsubscribe(self.job_id, self.listener_id);
            self.active = false;
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("job_id", &self.job_id)
            .field("listener_id", &self.listener_id)
            .field("active", &self.active)
            .finish()
    }
}
