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

//! Lease guard with structured auto-renewal.

use crate::LeaseKey;
use chrono::Utc;
use fleetcoord_blobstore::{BlobLeaseStore, LeaseToken};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::warn;

/// Outcome of a lease acquisition attempt.
///
/// `Contested` is a first-class outcome, not an error: the lease is held by
/// another process, or (for claimed leases) the current claim period was
/// already used. Either way the caller must not proceed with the guarded
/// work this round.
pub enum Acquisition {
    /// The lease was acquired; the guard keeps it alive until released.
    Acquired(LeaseGuard),
    /// The lease is not available this round.
    Contested,
}

impl Acquisition {
    /// Whether this outcome is `Contested`.
    pub fn is_contested(&self) -> bool {
        matches!(self, Acquisition::Contested)
    }

    /// The guard, if the lease was acquired.
    pub fn acquired(self) -> Option<LeaseGuard> {
        match self {
            Acquisition::Acquired(guard) => Some(guard),
            Acquisition::Contested => None,
        }
    }
}

impl std::fmt::Debug for Acquisition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Acquisition::Acquired(guard) => write!(f, "Acquired({})", guard.key()),
            Acquisition::Contested => write!(f, "Contested"),
        }
    }
}

struct GuardInner {
    store: Arc<dyn BlobLeaseStore>,
    key: LeaseKey,
    token: LeaseToken,
    touch_on_release: bool,
    stop: Notify,
}

impl GuardInner {
    /// Touch (claimed leases) and release, swallowing failures: release runs
    /// on unwind paths and must not introduce new errors.
    async fn finish(&self) {
        if self.touch_on_release {
            // Record the claim by touching the blob so future claim-period
            // checks see the updated last-modified time. The write is fenced
            // by the lease token: if the lease was lost the store rejects it
            // and the claim record is left unchanged.
            let stamp = Utc::now().to_rfc3339();
            if let Err(error) = self
                .store
                .write_blob(
                    self.key.container(),
                    self.key.name(),
                    stamp.as_bytes(),
                    Some(&self.token),
                )
                .await
            {
                warn!(lease = %self.key, %error, "claim touch rejected; claim record unchanged");
            }
        }

        if let Err(error) = self
            .store
            .release_lease(self.key.container(), self.key.name(), &self.token)
            .await
        {
            warn!(lease = %self.key, %error, "lease release failed");
        }
    }
}

/// Exclusive hold on a named lease.
///
/// While the guard is alive a background task renews the lease on a fixed
/// period, so the hold survives past the nominal lease duration. Renewal
/// failures are logged and swallowed; a persistently failing renewal lets
/// the lease lapse, at which point another process can acquire it.
///
/// [`release`](LeaseGuard::release) is the intended way to let go: it stops
/// the renewal task, waits for it to finish, then releases the lease (and,
/// for claimed leases, records the claim first). Dropping the guard without
/// releasing aborts renewal and releases best-effort in the background, so
/// early-exit paths still free the lease promptly instead of waiting out
/// its expiry.
pub struct LeaseGuard {
    inner: Arc<GuardInner>,
    renew_task: Option<JoinHandle<()>>,
    released: bool,
}

impl LeaseGuard {
    pub(crate) fn start(
        store: Arc<dyn BlobLeaseStore>,
        key: LeaseKey,
        token: LeaseToken,
        touch_on_release: bool,
        lease_duration: Duration,
        renewal_margin: Duration,
    ) -> Self {
        let inner = Arc::new(GuardInner {
            store,
            key,
            token,
            touch_on_release,
            stop: Notify::new(),
        });

        let period = lease_duration.saturating_sub(renewal_margin);
        let renewer = Arc::clone(&inner);
        let renew_task = tokio::spawn(async move {
            let mut renew_count: u64 = 0;
            loop {
                tokio::select! {
                    _ = renewer.stop.notified() => break,
                    _ = tokio::time::sleep(period) => {
                        renew_count += 1;
                        match renewer
                            .store
                            .renew_lease(renewer.key.container(), renewer.key.name(), &renewer.token)
                            .await
                        {
                            Ok(()) => {}
                            Err(error) => {
                                warn!(lease = %renewer.key, renew_count, %error, "lease renewal failed");
                            }
                        }
                    }
                }
            }
        });

        Self {
            inner,
            renew_task: Some(renew_task),
            released: false,
        }
    }

    /// The lease this guard holds.
    pub fn key(&self) -> &LeaseKey {
        &self.inner.key
    }

    /// Release the lease.
    ///
    /// Stops renewal and waits for the renewal task to terminate before
    /// touching/releasing, so no renewal can race past the release.
    pub async fn release(mut self) {
        self.released = true;
        self.inner.stop.notify_one();
        if let Some(task) = self.renew_task.take() {
            let _ = task.await;
        }
        self.inner.finish().await;
    }
}

impl Drop for LeaseGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        self.inner.stop.notify_one();
        if let Some(task) = self.renew_task.take() {
            task.abort();
        }
        // Best effort: free the lease without waiting for it to expire.
        let inner = Arc::clone(&self.inner);
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move { inner.finish().await });
        }
    }
}
