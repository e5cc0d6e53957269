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

//! Lease-gated job scheduling: compose the claimed lease with the job
//! scheduler so a recurring payload runs on exactly one process per period.

use crate::{JobId, JobScheduler, RunScheduledJob};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fleetcoord_leases::{Acquisition, ClaimedDistributedLease, LeaseResult};
use fleetcoord_taskhelper::BoxError;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Capability for obtaining the claimed lease that gates one scheduled
/// job run.
#[async_trait]
pub trait JobSchedulerLeaseProvider: Send + Sync {
    /// Attempt to claim this run's lease for `job_name`. Honors `cancel`
    /// while waiting: a cancelled attempt reports `Contested` (do not run).
    async fn obtain(
        &self,
        job_name: &str,
        claim_span: Duration,
        cancel: &CancellationToken,
    ) -> LeaseResult<Acquisition>;
}

/// [`JobSchedulerLeaseProvider`] backed by [`ClaimedDistributedLease`].
///
/// The lease container is fixed per provider; the lease name is derived
/// from the job name through a configurable builder (default: the job name
/// itself).
pub struct ClaimedJobSchedulerLeaseProvider {
    leases: Arc<ClaimedDistributedLease>,
    container: String,
    lease_name: Box<dyn Fn(&str) -> String + Send + Sync>,
}

impl ClaimedJobSchedulerLeaseProvider {
    /// Create a provider claiming leases in `container`.
    pub fn new(leases: Arc<ClaimedDistributedLease>, container: impl Into<String>) -> Self {
        Self {
            leases,
            container: container.into(),
            lease_name: Box::new(|job_name| job_name.to_string()),
        }
    }

    /// Override how job names map to lease names (e.g. to add a
    /// service-wide prefix).
    pub fn with_lease_name(
        mut self,
        builder: impl Fn(&str) -> String + Send + Sync + 'static,
    ) -> Self {
        self.lease_name = Box::new(builder);
        self
    }
}

#[async_trait]
impl JobSchedulerLeaseProvider for ClaimedJobSchedulerLeaseProvider {
    async fn obtain(
        &self,
        job_name: &str,
        claim_span: Duration,
        cancel: &CancellationToken,
    ) -> LeaseResult<Acquisition> {
        let lease_name = (self.lease_name)(job_name);
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!(job = job_name, "lease wait cancelled");
                Ok(Acquisition::Contested)
            }
            acquisition = self.leases.obtain(&self.container, &lease_name, claim_span) => acquisition,
        }
    }
}

type BoxedJobFuture = Pin<Box<dyn Future<Output = Result<(), BoxError>> + Send>>;

/// A scheduled job whose payload runs only when this run's claimed lease is
/// obtained.
///
/// On every tick it first checks the optional enablement predicate, then
/// asks the provider for the claim; only the one process in the fleet that
/// wins runs the payload. The external scheduler needs to know none of
/// this — the gating lives entirely inside the job.
pub struct LeaseGatedJob<P> {
    name: String,
    claim_span: Duration,
    provider: Arc<P>,
    is_enabled: Option<Box<dyn Fn() -> bool + Send + Sync>>,
    payload: Box<dyn Fn(CancellationToken) -> BoxedJobFuture + Send + Sync>,
}

impl<P: JobSchedulerLeaseProvider> LeaseGatedJob<P> {
    /// Create a lease-gated job around `payload`.
    pub fn new<F, Fut>(
        name: impl Into<String>,
        claim_span: Duration,
        provider: Arc<P>,
        payload: F,
    ) -> Self
    where
        F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            claim_span,
            provider,
            is_enabled: None,
            payload: Box::new(move |cancel| {
                let fut: BoxedJobFuture = Box::pin(payload(cancel));
                fut
            }),
        }
    }

    /// Gate the payload behind an enablement predicate, checked before the
    /// lease is even attempted.
    pub fn with_enabled_check(
        mut self,
        is_enabled: impl Fn() -> bool + Send + Sync + 'static,
    ) -> Self {
        self.is_enabled = Some(Box::new(is_enabled));
        self
    }
}

#[async_trait]
impl<P: JobSchedulerLeaseProvider + 'static> RunScheduledJob for LeaseGatedJob<P> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(
        &self,
        job_run_id: &str,
        _scheduled_at: DateTime<Utc>,
        cancel: CancellationToken,
    ) -> Result<(), BoxError> {
        if let Some(is_enabled) = &self.is_enabled {
            if !is_enabled() {
                debug!(job = %self.name, job_run_id, "job disabled, skipping run");
                return Ok(());
            }
        }

        match self
            .provider
            .obtain(&self.name, self.claim_span, &cancel)
            .await?
        {
            Acquisition::Contested => {
                debug!(job = %self.name, job_run_id, "claim not obtained, skipping run");
                Ok(())
            }
            Acquisition::Acquired(guard) => {
                let result = (self.payload)(cancel).await;
                guard.release().await;
                result
            }
        }
    }
}

/// Register a recurring, lease-gated payload with the scheduler.
///
/// Every `interval` the wrapped job attempts the claim for the current
/// `claim_span` bucket and runs `payload` only on success, so across the
/// fleet the payload runs at most once per bucket no matter how many
/// processes tick the schedule.
pub fn add_recurring_lease_job<P, F, Fut>(
    scheduler: &JobScheduler,
    provider: Arc<P>,
    name: impl Into<String>,
    interval: Duration,
    claim_span: Duration,
    payload: F,
) -> JobId
where
    P: JobSchedulerLeaseProvider + 'static,
    F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
{
    let job = LeaseGatedJob::new(name, claim_span, provider, payload);
    scheduler.add_recurring_job(interval, Arc::new(job))
}
