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

//! FleetCoord: distributed lease and background-work coordination
//!
//! FleetCoord is the coordination core of a horizontally-scaled control-plane
//! service. A fleet of identical worker processes uses it to guarantee that
//! periodic maintenance work runs once per fleet (not once per process), and
//! to fan per-item work out with bounded concurrency and per-item mutual
//! exclusion.
//!
//! The building blocks, leaf first:
//! - [`blobstore`]: the blob-lease store capability that is the single source
//!   of truth for cross-process mutual exclusion
//! - [`leases`]: renewable named leases and time-bucketed claimed leases on
//!   top of that store
//! - [`taskhelper`]: the background execution engine (fire-and-forget,
//!   scheduled loops, lease-gated enumeration, bounded-concurrency fan-out)
//! - [`tasks`]: the recurring maintenance-task template and the lease-gated
//!   recurring-job scheduler glue

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub use fleetcoord_blobstore as blobstore;
pub use fleetcoord_leases as leases;
pub use fleetcoord_taskhelper as taskhelper;
pub use fleetcoord_tasks as tasks;
