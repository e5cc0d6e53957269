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

//! # FleetCoord Tasks
//!
//! ## Purpose
//! Ties the lease primitives and the task helper into the shapes the rest
//! of a control-plane service consumes:
//!
//! - [`BackgroundTask`] / [`BackgroundTaskRunner`]: the template for a
//!   recurring maintenance task. The runner checks the task's enablement
//!   flag each tick and hands the task a claimed-lease provider, so the
//!   "runs once per fleet, not once per process" guarantee is wired in by
//!   construction rather than by convention.
//! - [`TaskSettings`]: the enablement-flag capability (env-backed in
//!   production, map-backed in tests); unset means enabled.
//! - [`JobScheduler`]: a minimal in-process recurring-job framework with
//!   delayed jobs, job removal, and cancellation-token shutdown.
//! - [`JobSchedulerLeaseProvider`] / [`LeaseGatedJob`]: compose the claimed
//!   lease with the scheduler, so a registered payload runs only on the one
//!   process that wins this period's claim — without the scheduler knowing
//!   anything about leasing.

pub mod background;
pub mod scheduler;
pub mod scheduler_lease;
pub mod settings;

pub use background::{BackgroundTask, BackgroundTaskRunner};
pub use scheduler::{JobId, JobScheduler, RunScheduledJob};
pub use scheduler_lease::{
    add_recurring_lease_job, ClaimedJobSchedulerLeaseProvider, JobSchedulerLeaseProvider,
    LeaseGatedJob,
};
pub use settings::{EnvTaskSettings, StaticTaskSettings, TaskSettings};
