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

//! # FleetCoord Task Helper
//!
//! ## Purpose
//! General-purpose background-execution engine for maintenance work:
//! fire-and-forget tasks, scheduled loops, serial and bounded-concurrency
//! enumeration with per-item lease gating, and retry-until-timeout. Callers
//! never spawn detached work themselves; the helper owns that, so the
//! calling context is never blocked by background work and detached
//! failures are always logged instead of lost.
//!
//! ## Operation Set
//! - [`TaskHelper::run_background`] / [`TaskHelper::run_background_long`]:
//!   fire-and-forget a single callback, optionally after a delay
//! - [`TaskHelper::run_background_loop`] /
//!   [`TaskHelper::run_background_loop_async`]: run now, then on a fixed
//!   schedule until the callback asks to stop
//! - [`TaskHelper::run_enumerable`] /
//!   [`TaskHelper::run_enumerable_leased`]: strictly serial per-item
//!   execution, optionally gated by a per-item lease
//! - [`TaskHelper::run_concurrent_enumerable`] /
//!   [`TaskHelper::run_concurrent_enumerable_leased`]: the same per-item
//!   semantics with bounded parallelism and aggregate failure reporting
//! - [`TaskHelper::retry_until_success_or_timeout`]: attempt-counted retry
//!   loop with a hard deadline
//!
//! ## Lease Gating
//! Enumeration variants accept a per-item lease function returning an
//! [`Acquisition`](fleetcoord_leases::Acquisition). A `Contested` outcome
//! skips the item silently — some other fleet member is handling it — and
//! a jittered delay after each executed item gives those members a chance
//! to claim the next ones.

pub mod background;
pub mod enumerable;
pub mod error;
pub mod retry;

pub use error::{AggregateError, BoxError, ItemFailure};

/// Task helper library.
///
/// Stateless and cheap to clone; one instance is typically shared through
/// the application the way other capabilities are.
#[derive(Debug, Clone, Default)]
pub struct TaskHelper;

impl TaskHelper {
    /// Create a new task helper.
    pub fn new() -> Self {
        Self
    }
}
