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

//! # FleetCoord Distributed Leases
//!
//! ## Purpose
//! Provides exclusive, renewable, named leases for a fleet of identical
//! worker processes, so components can know whether another process is
//! working on a given resource and either wait for it to be freed or move
//! on. Two primitives are offered:
//!
//! - [`DistributedLease`]: plain mutual exclusion — at most one holder per
//!   `(container, name)` at a time, with immediate-fail and bounded-retry
//!   acquisition modes
//! - [`ClaimedDistributedLease`]: time-bucketed mutual exclusion — at most
//!   one *successful* acquisition per claim period (e.g. once per hour),
//!   fleet-wide, regardless of how many processes race for it
//!
//! ## Design Decisions
//! - **Tagged acquisition outcome**: contention is a first-class
//!   [`Acquisition::Contested`] value, not an error. Callers treat it as
//!   "skip this run/item". Only genuine store faults surface as errors.
//! - **Structured renewal**: the returned [`LeaseGuard`] owns a renewal task
//!   that keeps the lease alive; releasing the guard stops the task and
//!   waits for it before releasing the lease, so a renewal can never fire
//!   after release.
//! - **Fenced claim records**: the claimed variant records a successful
//!   claim by touching the blob under the lease token on release; if the
//!   lease was lost in the meantime the touch is abandoned rather than
//!   written unfenced.
//!
//! ## Example
//! ```rust,no_run
//! use fleetcoord_blobstore::MemoryBlobLeaseStore;
//! use fleetcoord_leases::{Acquisition, DistributedLease};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(MemoryBlobLeaseStore::new());
//! let leases = DistributedLease::new(store);
//!
//! match leases.obtain("maintenance", "rebalance-pools").await? {
//!     Acquisition::Acquired(guard) => {
//!         // do exclusive work, lease auto-renews in the background
//!         guard.release().await;
//!     }
//!     Acquisition::Contested => {
//!         // another process is on it; skip this round
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod claimed;
pub mod distributed;
pub mod error;
pub mod guard;
pub mod key;

pub use claimed::ClaimedDistributedLease;
pub use distributed::DistributedLease;
pub use error::{LeaseError, LeaseResult};
pub use guard::{Acquisition, LeaseGuard};
pub use key::LeaseKey;

use std::time::Duration;

/// Fixed duration of every acquired lease.
pub const LEASE_DURATION: Duration = Duration::from_secs(60);

/// Margin subtracted from [`LEASE_DURATION`] to get the renewal period, so
/// a renewal lands comfortably before expiry.
pub const RENEWAL_MARGIN: Duration = Duration::from_millis(7_500);
