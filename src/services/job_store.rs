//! In-memory job registry with bounded capacity and age-based eviction.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::JobQueueConfig;
use crate::models::job::{Job, JobSnapshot, JobUpdate};
use crate::services::periodic;
use crate::services::progress_bus::{Listener, ProgressBus, Subscription};

/// Authoritative `id -> Job` map.
///
/// Every mutation publishes the resulting snapshot on the [`ProgressBus`]
/// while the map is still locked, so observers see updates for one job in
/// the order they were applied.
pub struct JobStore {
    jobs: Mutex<HashMap<Uuid, Job>>,
    bus: ProgressBus,
    config: JobQueueConfig,
    shutdown: CancellationToken,
}

/// Result of [`JobStore::watch`]: the current snapshot, plus a live
/// subscription when more updates can still arrive.
#[derive(Debug)]
pub struct Watch {
    pub snapshot: JobSnapshot,
    pub subscription: Option<Subscription>,
}

impl JobStore {
    /// Build a store without a background sweeper.
    pub fn new(config: JobQueueConfig, bus: ProgressBus) -> Self {
        Self {
            jobs: Mutex::new(HashMap::new()),
            bus,
            config,
            shutdown: CancellationToken::new(),
        }
    }

    /// Build a store and start its periodic sweep on the current runtime.
    ///
    /// The sweep runs every `sweep_interval` with the normal retention window
    /// and stops once the store is dropped.
    pub fn spawn(config: JobQueueConfig, bus: ProgressBus) -> Arc<Self> {
        let store = Arc::new(Self::new(config, bus));
        store.start_sweeper();
        store
    }

    fn start_sweeper(self: &Arc<Self>) -> JoinHandle<()> {
        let weak: Weak<Self> = Arc::downgrade(self);

        periodic::spawn(
            "job-sweep",
            self.config.sweep_interval,
            self.shutdown.clone(),
            move || match weak.upgrade() {
                Some(store) => {
                    store.sweep(store.config.retention);
                    true
                }
                None => false,
            },
        )
    }

    pub fn config(&self) -> &JobQueueConfig {
        &self.config
    }

    pub fn bus(&self) -> &ProgressBus {
        &self.bus
    }

    /// Allocate a new pending job.
    ///
    /// When the store is full an aggressive sweep runs first; if that frees
    /// nothing the job is refused with [`JobError::CapacityExceeded`].
    pub fn create(&self) -> Result<Uuid, JobError> {
        let mut jobs = self.jobs.lock();

        if jobs.len() >= self.config.max_jobs {
            let freed =
                Self::sweep_locked(&mut jobs, &self.bus, self.config.aggressive_retention);
            tracing::debug!(freed, live = jobs.len(), "Store full, ran aggressive sweep");

            if jobs.len() >= self.config.max_jobs {
                return Err(JobError::CapacityExceeded {
                    max_jobs: self.config.max_jobs,
                });
            }
        }

        let job = Job::new();
        let id = job.id();
        self.bus.open(id);
        jobs.insert(id, job);
        metrics::gauge!("palm_jobs_live").set(jobs.len() as f64);

        Ok(id)
    }

    pub fn get(&self, id: Uuid) -> Option<JobSnapshot> {
        self.jobs.lock().get(&id).map(Job::snapshot)
    }

    /// Apply `update` to the job and publish the new snapshot.
    ///
    /// Returns `false` without publishing when the job is gone or the update
    /// is not a legal transition (e.g. the job is already terminal).
    pub fn update(&self, id: Uuid, update: JobUpdate) -> bool {
        let mut jobs = self.jobs.lock();
        let Some(job) = jobs.get_mut(&id) else {
            tracing::debug!(job_id = %id, "Update for unknown job ignored");
            return false;
        };

        if let Err(e) = job.apply(update) {
            tracing::debug!(job_id = %id, error = %e, "Update rejected");
            return false;
        }

        let snapshot = job.snapshot();
        self.bus.publish(&snapshot);
        true
    }

    /// Remove a job regardless of its age or status.
    pub fn delete(&self, id: Uuid) -> bool {
        let mut jobs = self.jobs.lock();
        let removed = jobs.remove(&id).is_some();
        self.bus.close(id);
        metrics::gauge!("palm_jobs_live").set(jobs.len() as f64);
        removed
    }

    /// Remove terminal jobs whose last update is older than `max_age`.
    pub fn sweep(&self, max_age: Duration) -> usize {
        let mut jobs = self.jobs.lock();
        let removed = Self::sweep_locked(&mut jobs, &self.bus, max_age);
        if removed > 0 {
            tracing::debug!(removed, live = jobs.len(), "Swept finished jobs");
        }
        removed
    }

    fn sweep_locked(
        jobs: &mut HashMap<Uuid, Job>,
        bus: &ProgressBus,
        max_age: Duration,
    ) -> usize {
        let before = jobs.len();
        jobs.retain(|id, job| {
            let expired = job.is_terminal() && job.touched_at().elapsed() > max_age;
            if expired {
                bus.close(*id);
            }
            !expired
        });
        metrics::gauge!("palm_jobs_live").set(jobs.len() as f64);
        before - jobs.len()
    }

    /// Read the current snapshot and, unless it is terminal, subscribe
    /// `listener` to later updates.
    ///
    /// Both steps happen under the store lock, so no update can slip in
    /// between them: every transition is either part of `snapshot` or is
    /// delivered to `listener`.
    pub fn watch(&self, id: Uuid, listener: Listener) -> Result<Watch, JobError> {
        let jobs = self.jobs.lock();
        let job = jobs.get(&id).ok_or(JobError::NotFound(id))?;
        let snapshot = job.snapshot();

        let subscription = if snapshot.is_terminal() {
            None
        } else {
            self.bus.subscribe(id, listener)
        };

        Ok(Watch {
            snapshot,
            subscription,
        })
    }

    pub fn len(&self) -> usize {
        self.jobs.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.lock().is_empty()
    }
}

impl Drop for JobStore {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum JobError {
    #[error("Job queue is full ({max_jobs} jobs tracked)")]
    CapacityExceeded { max_jobs: usize },

    #[error("Job not found: {0}")]
    NotFound(Uuid),
}
