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

//! Recurring maintenance-task template.

use crate::TaskSettings;
use async_trait::async_trait;
use fleetcoord_leases::ClaimedDistributedLease;
use fleetcoord_taskhelper::{BoxError, TaskHelper};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// A recurring maintenance task.
///
/// Implementations receive the fleet's claimed-lease provider on every run
/// and are expected to gate their work on it — typically one claim for the
/// task as a whole, or one claim per enumerated item via
/// [`TaskHelper`](fleetcoord_taskhelper::TaskHelper) lease gating — so the
/// work happens once per fleet and per period, not once per process.
#[async_trait]
pub trait BackgroundTask: Send + Sync {
    /// Stable name of this task; also the key of its enablement flag.
    fn task_name(&self) -> &str;

    /// One tick of the task.
    ///
    /// `claim_span` is the claim period to use for leases taken during this
    /// run (normally the task's schedule interval). Returns whether the
    /// task should be scheduled again: `Ok(false)` stops it permanently.
    async fn run(
        &self,
        leases: &ClaimedDistributedLease,
        claim_span: Duration,
    ) -> Result<bool, BoxError>;
}

/// Drives a [`BackgroundTask`] on a schedule.
///
/// Each tick re-reads the task's enablement flag (unset counts as enabled);
/// a disabled task is skipped but stays scheduled, so re-enabling the flag
/// revives it without a restart. The claimed-lease provider is a required
/// construction input: a task cannot be wired up without the means to make
/// itself a fleet-wide singleton.
pub struct BackgroundTaskRunner<T> {
    task: T,
    settings: Arc<dyn TaskSettings>,
    leases: Arc<ClaimedDistributedLease>,
}

impl<T: BackgroundTask> BackgroundTaskRunner<T> {
    /// Create a runner for `task`.
    pub fn new(
        task: T,
        settings: Arc<dyn TaskSettings>,
        leases: Arc<ClaimedDistributedLease>,
    ) -> Self {
        Self {
            task,
            settings,
            leases,
        }
    }

    /// Run one tick: enablement check, then the task itself.
    ///
    /// Returns whether the task should run again next interval.
    pub async fn run_task(&self, claim_span: Duration) -> Result<bool, BoxError> {
        let name = self.task.task_name();
        let enabled = self.settings.is_task_enabled(name).unwrap_or(true);
        if !enabled {
            debug!(task = name, "task disabled, skipping this run");
            return Ok(true);
        }
        self.task.run(&self.leases, claim_span).await
    }

    /// Schedule the task on `interval` via the task helper, forever, until
    /// a tick returns `Ok(false)`. The interval doubles as the claim span
    /// handed to the task.
    pub fn start(self: Arc<Self>, task_helper: &TaskHelper, interval: Duration)
    where
        T: 'static,
    {
        let name = format!("{}-schedule", self.task.task_name());
        let runner = self;
        task_helper.run_background_loop(name, Some(interval), move || {
            let runner = Arc::clone(&runner);
            async move { runner.run_task(interval).await }
        });
    }
}
