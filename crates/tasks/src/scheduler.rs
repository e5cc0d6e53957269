// SPDX-License-Identifier: LGPL-2.1-or-later
// Copyright (C) 2025 Shahzad A. Bhatti <bhatti@plexobject.com>
//
// This file is part of FleetCoord.
//
// FleetCoord is free software: you can redistribute it and/or modify
// it under the terms of the GNU Lesser General Public License as published by
// the Free Software Foundation, either version 2.1 of the License, or
// (at your option) any later version.
//
// FleetCoord is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Lesser General Public License for more details.
//
// You should have received a copy of the GNU Lesser General Public License
// along with FleetCoord. If not, see <https://www.gnu.org/licenses/>.

//! In-process recurring-job scheduler.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fleetcoord_taskhelper::BoxError;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use ulid::Ulid;

/// Identifier of a registered job, for later removal.
pub type JobId = u64;

/// A job the scheduler can run.
#[async_trait]
pub trait RunScheduledJob: Send + Sync {
    /// Stable name of the job, for logging and lease naming.
    fn name(&self) -> &str;

    /// One run of the job. `scheduled_at` is the tick this run was due at;
    /// `cancel` fires when the scheduler shuts down.
    async fn run(
        &self,
        job_run_id: &str,
        scheduled_at: DateTime<Utc>,
        cancel: CancellationToken,
    ) -> Result<(), BoxError>;
}

enum JobKind {
    Recurring(Duration),
    Delayed,
}

struct ScheduledJob {
    id: JobId,
    next_run: DateTime<Utc>,
    kind: JobKind,
    job: Arc<dyn RunScheduledJob>,
}

/// Minimal recurring-job framework.
///
/// Jobs are held in a list ordered by next run time; the scheduler loop
/// sleeps until the earliest one is due, spawns its run, and (for recurring
/// jobs) reschedules it. Adding or removing a job wakes the loop so the
/// wait is re-evaluated. [`shutdown`](JobScheduler::shutdown) cancels the
/// loop and every in-flight run's cancellation token.
///
/// The scheduler itself knows nothing about leases; fleet-wide
/// once-per-period behavior comes from registering jobs through
/// [`LeaseGatedJob`](crate::LeaseGatedJob).
pub struct JobScheduler {
    jobs: Mutex<Vec<ScheduledJob>>,
    wake: Notify,
    cancel: CancellationToken,
    next_id: AtomicU64,
}

impl Default for JobScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl JobScheduler {
    /// Create a new scheduler. Call [`start`](Self::start) (or
    /// [`run`](Self::run)) to begin dispatching.
    pub fn new() -> Self {
        Self {
            jobs: Mutex::new(Vec::new()),
            wake: Notify::new(),
            cancel: CancellationToken::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a job to run every `interval`, first run one interval from
    /// now.
    pub fn add_recurring_job(&self, interval: Duration, job: Arc<dyn RunScheduledJob>) -> JobId {
        self.add_job(interval, JobKind::Recurring(interval), job)
    }

    /// Register a job to run once, `delay` from now.
    pub fn add_delayed_job(&self, delay: Duration, job: Arc<dyn RunScheduledJob>) -> JobId {
        self.add_job(delay, JobKind::Delayed, job)
    }

    /// Unregister a job. Returns whether it was still registered. An
    /// already-spawned run is not interrupted.
    pub fn remove_job(&self, id: JobId) -> bool {
        let removed = {
            let mut jobs = self.jobs.lock().expect("scheduler job list poisoned");
            let before = jobs.len();
            jobs.retain(|job| job.id != id);
            jobs.len() != before
        };
        if removed {
            self.wake.notify_one();
        }
        removed
    }

    /// Run the scheduler loop on a background task.
    pub fn start(self: &Arc<Self>) -> JoinHandle<()> {
        let scheduler = Arc::clone(self);
        tokio::spawn(async move { scheduler.run().await })
    }

    /// Stop the loop and cancel in-flight job runs.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// The scheduler loop; returns after [`shutdown`](Self::shutdown).
    pub async fn run(&self) {
        info!("job scheduler started");
        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            let now = Utc::now();
            let mut due = None;
            let mut wait = Duration::from_secs(60);
            {
                let mut jobs = self.jobs.lock().expect("scheduler job list poisoned");
                if let Some(first) = jobs.first() {
                    if first.next_run <= now {
                        let mut entry = jobs.remove(0);
                        let scheduled_at = entry.next_run;
                        let job = Arc::clone(&entry.job);
                        if let JobKind::Recurring(interval) = entry.kind {
                            entry.next_run =
                                now + chrono::Duration::milliseconds(interval.as_millis() as i64);
                            insert_sorted(&mut jobs, entry);
                        }
                        due = Some((job, scheduled_at));
                    } else {
                        wait = (first.next_run - now).to_std().unwrap_or(Duration::ZERO);
                    }
                }
            }

            if let Some((job, scheduled_at)) = due {
                self.spawn_run(job, scheduled_at);
                // More jobs may be due this same tick.
                continue;
            }

            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = self.wake.notified() => {}
                _ = tokio::time::sleep(wait) => {}
            }
        }
        info!("job scheduler stopped");
    }

    fn add_job(&self, first_in: Duration, kind: JobKind, job: Arc<dyn RunScheduledJob>) -> JobId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let next_run = Utc::now() + chrono::Duration::milliseconds(first_in.as_millis() as i64);
        {
            let mut jobs = self.jobs.lock().expect("scheduler job list poisoned");
            insert_sorted(
                &mut jobs,
                ScheduledJob {
                    id,
                    next_run,
                    kind,
                    job,
                },
            );
        }
        self.wake.notify_one();
        id
    }

    fn spawn_run(&self, job: Arc<dyn RunScheduledJob>, scheduled_at: DateTime<Utc>) {
        let cancel = self.cancel.child_token();
        tokio::spawn(async move {
            let job_run_id = Ulid::new().to_string();
            info!(job = job.name(), %job_run_id, %scheduled_at, "job run started");
            match job.run(&job_run_id, scheduled_at, cancel).await {
                Ok(()) => info!(job = job.name(), %job_run_id, "job run completed"),
                Err(err) => error!(job = job.name(), %job_run_id, error = %err, "job run failed"),
            }
        });
    }
}

fn insert_sorted(jobs: &mut Vec<ScheduledJob>, job: ScheduledJob) {
    let index = jobs.partition_point(|existing| existing.next_run <= job.next_run);
    jobs.insert(index, job);
}
