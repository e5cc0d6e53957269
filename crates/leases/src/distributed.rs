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

//! Plain distributed lease: exclusive, renewable, named.

use crate::guard::{Acquisition, LeaseGuard};
use crate::{LeaseError, LeaseKey, LeaseResult, LEASE_DURATION, RENEWAL_MARGIN};
use fleetcoord_blobstore::{BlobLeaseStore, BlobStoreError};
use rand::Rng;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

/// Placeholder content of a freshly provisioned lease blob.
const INITIAL_CONTENT: &[u8] = b"Lock file contents. Auto-generated. Do not modify.";

/// Number of acquisition attempts made by [`DistributedLease::try_obtain`].
const OBTAIN_ATTEMPTS: u64 = 3;

/// Distributed lease lock.
///
/// Allows components to know whether another process in the fleet is working
/// on a given resource, and either retry briefly or move on. The lease is
/// held for a fixed duration and auto-renewed by the returned guard until
/// released.
pub struct DistributedLease {
    store: Arc<dyn BlobLeaseStore>,
    /// Keys whose container/blob have been provisioned by this process.
    /// Purely a round-trip saver; correctness never depends on it.
    provisioned: Mutex<HashSet<LeaseKey>>,
}

impl DistributedLease {
    /// Create a new distributed lease over the given store.
    pub fn new(store: Arc<dyn BlobLeaseStore>) -> Self {
        Self {
            store,
            provisioned: Mutex::new(HashSet::new()),
        }
    }

    /// Attempt to acquire the named lease exactly once.
    ///
    /// Returns [`Acquisition::Contested`] when another holder currently owns
    /// the lease; any other store failure propagates.
    #[instrument(skip(self))]
    pub async fn obtain(&self, container: &str, name: &str) -> LeaseResult<Acquisition> {
        let key = LeaseKey::new(container, name);
        self.provision(&key).await?;

        match self
            .store
            .acquire_lease(key.container(), key.name(), LEASE_DURATION)
            .await
        {
            Ok(token) => Ok(Acquisition::Acquired(LeaseGuard::start(
                Arc::clone(&self.store),
                key,
                token,
                false,
                LEASE_DURATION,
                RENEWAL_MARGIN,
            ))),
            Err(BlobStoreError::LeaseConflict { .. }) => {
                debug!(lease = %key, "lease contested");
                Ok(Acquisition::Contested)
            }
            Err(error) => Err(LeaseError::Store(error)),
        }
    }

    /// Attempt to acquire the named lease, retrying on contention.
    ///
    /// Makes up to 3 attempts; after a contested attempt *n* (1-based) it
    /// waits a random duration in `[500n, 1500n)` milliseconds, spreading
    /// contenders out so one of them wins quickly once the lease frees up.
    #[instrument(skip(self))]
    pub async fn try_obtain(&self, container: &str, name: &str) -> LeaseResult<Acquisition> {
        for attempt in 1..=OBTAIN_ATTEMPTS {
            match self.obtain(container, name).await? {
                Acquisition::Acquired(guard) => return Ok(Acquisition::Acquired(guard)),
                Acquisition::Contested if attempt < OBTAIN_ATTEMPTS => {
                    let wait_ms = rand::thread_rng().gen_range(500 * attempt..1500 * attempt);
                    debug!(container, name, attempt, wait_ms, "lease contested, backing off");
                    tokio::time::sleep(Duration::from_millis(wait_ms)).await;
                }
                Acquisition::Contested => {}
            }
        }
        Ok(Acquisition::Contested)
    }

    /// Idempotently provision the container and placeholder blob for `key`,
    /// memoized per process so repeated obtains skip the round trips.
    async fn provision(&self, key: &LeaseKey) -> LeaseResult<()> {
        {
            let provisioned = self.provisioned.lock().await;
            if provisioned.contains(key) {
                return Ok(());
            }
        }

        self.store
            .create_container_if_not_exists(key.container())
            .await?;
        self.store
            .create_blob_if_not_exists(key.container(), key.name(), INITIAL_CONTENT)
            .await?;

        self.provisioned.lock().await.insert(key.clone());
        Ok(())
    }
}
