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

//! # FleetCoord Blob-Lease Store
//!
//! ## Purpose
//! Provides the storage capability that the distributed lease primitives are
//! built on: named blobs that support an exclusive, time-bounded, renewable
//! lease, fenced writes keyed by the lease token, and a last-modified query.
//! The backing store is the single source of truth for cross-process mutual
//! exclusion; nothing in this workspace holds an in-process lock that is
//! relied on for correctness across processes.
//!
//! ## Architecture Context
//! This crate is used internally by:
//! - **`fleetcoord-leases`**: `DistributedLease` and `ClaimedDistributedLease`
//!   drive the lease protocol defined here
//! - **Tests across the workspace**: the in-memory backend simulates a fleet
//!   of processes racing for the same blobs
//!
//! ## Backend Support
//! - **InMemory**: HashMap-based (feature: `memory-backend`, default)
//! - **SQLite**: persistent, single-node (feature: `sqlite-backend`)
//!
//! ## Lease Protocol
//! A lease is acquired for a fixed duration and identified by an opaque
//! token. While an unexpired lease is held:
//! - a second `acquire_lease` fails with [`BlobStoreError::LeaseConflict`]
//! - writes without the token (or with a stale token) fail with
//!   [`BlobStoreError::LeaseConflict`]
//! - `renew_lease` with the token extends the expiry by the original duration
//!
//! An expired lease is treated as absent for acquisition purposes, but a
//! fenced write with the expired token still fails: the fence never trusts a
//! token past its expiry.

pub mod config;
pub mod error;
pub mod store;

#[cfg(feature = "memory-backend")]
pub mod memory;

#[cfg(feature = "sqlite-backend")]
pub mod sql;

pub use config::BlobStoreConfig;
pub use error::{BlobStoreError, BlobStoreResult};
pub use store::{BlobLeaseStore, LeaseToken};

#[cfg(feature = "memory-backend")]
pub use memory::MemoryBlobLeaseStore;

#[cfg(feature = "sqlite-backend")]
pub use sql::SqliteBlobLeaseStore;
