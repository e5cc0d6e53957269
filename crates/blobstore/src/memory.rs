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

//! In-memory blob-lease store implementation (for testing).

use crate::store::{lease_conflict, not_found};
use crate::{BlobLeaseStore, BlobStoreResult, LeaseToken};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use ulid::Ulid;

#[derive(Debug, Clone)]
struct HeldLease {
    token: LeaseToken,
    duration: Duration,
    expires_at: DateTime<Utc>,
}

impl HeldLease {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

#[derive(Debug, Clone)]
struct BlobEntry {
    content: Vec<u8>,
    last_modified: DateTime<Utc>,
    lease: Option<HeldLease>,
}

impl BlobEntry {
    /// The unexpired lease on this blob, if any.
    fn active_lease(&self, now: DateTime<Utc>) -> Option<&HeldLease> {
        self.lease.as_ref().filter(|l| !l.is_expired(now))
    }
}

#[derive(Debug, Default)]
struct StoreState {
    containers: HashSet<String>,
    blobs: HashMap<(String, String), BlobEntry>,
}

/// In-memory blob-lease store (for testing).
///
/// ## Purpose
/// Provides a simple in-memory implementation of [`BlobLeaseStore`] for tests
/// and single-process scenarios. Sharing one instance (it is cheaply
/// clonable) between several lease primitives simulates a fleet of processes
/// racing for the same blobs.
///
/// ## Limitations
/// - Not persistent (blobs lost on restart)
/// - Not distributed (single process only)
/// - No TTL cleanup (expired leases remain until the blob is next touched)
#[derive(Clone, Default)]
pub struct MemoryBlobLeaseStore {
    state: Arc<RwLock<StoreState>>,
}

impl MemoryBlobLeaseStore {
    /// Create a new in-memory blob-lease store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BlobLeaseStore for MemoryBlobLeaseStore {
    async fn create_container_if_not_exists(&self, container: &str) -> BlobStoreResult<()> {
        let mut state = self.state.write().await;
        state.containers.insert(container.to_string());
        Ok(())
    }

    async fn create_blob_if_not_exists(
        &self,
        container: &str,
        name: &str,
        initial_content: &[u8],
    ) -> BlobStoreResult<bool> {
        let mut state = self.state.write().await;
        if !state.containers.contains(container) {
            return Err(not_found(container, name));
        }

        let key = (container.to_string(), name.to_string());
        if state.blobs.contains_key(&key) {
            return Ok(true);
        }

        state.blobs.insert(
            key,
            BlobEntry {
                content: initial_content.to_vec(),
                last_modified: Utc::now(),
                lease: None,
            },
        );
        Ok(false)
    }

    async fn acquire_lease(
        &self,
        container: &str,
        name: &str,
        duration: Duration,
    ) -> BlobStoreResult<LeaseToken> {
        let mut state = self.state.write().await;
        let now = Utc::now();
        let key = (container.to_string(), name.to_string());

        let entry = state
            .blobs
            .get_mut(&key)
            .ok_or_else(|| not_found(container, name))?;

        if entry.active_lease(now).is_some() {
            return Err(lease_conflict(container, name));
        }

        let token = LeaseToken::new(Ulid::new().to_string());
        entry.lease = Some(HeldLease {
            token: token.clone(),
            duration,
            expires_at: now + duration,
        });
        Ok(token)
    }

    async fn renew_lease(
        &self,
        container: &str,
        name: &str,
        token: &LeaseToken,
    ) -> BlobStoreResult<()> {
        let mut state = self.state.write().await;
        let now = Utc::now();
        let key = (container.to_string(), name.to_string());

        let entry = state
            .blobs
            .get_mut(&key)
            .ok_or_else(|| not_found(container, name))?;

        // Renewal only requires that no other holder has taken the lease in
        // the meantime, matching the backing-store protocol where a holder
        // may renew a lapsed-but-unclaimed lease.
        match entry.lease.as_mut() {
            Some(held) if held.token == *token => {
                held.expires_at = now + held.duration;
                Ok(())
            }
            _ => Err(lease_conflict(container, name)),
        }
    }

    async fn release_lease(
        &self,
        container: &str,
        name: &str,
        token: &LeaseToken,
    ) -> BlobStoreResult<()> {
        let mut state = self.state.write().await;
        let key = (container.to_string(), name.to_string());

        let entry = state
            .blobs
            .get_mut(&key)
            .ok_or_else(|| not_found(container, name))?;

        let holds_lease = matches!(entry.lease.as_ref(), Some(held) if held.token == *token);
        if holds_lease {
            entry.lease = None;
            Ok(())
        } else {
            Err(lease_conflict(container, name))
        }
    }

    async fn last_modified(&self, container: &str, name: &str) -> BlobStoreResult<DateTime<Utc>> {
        let state = self.state.read().await;
        let key = (container.to_string(), name.to_string());
        state
            .blobs
            .get(&key)
            .map(|entry| entry.last_modified)
            .ok_or_else(|| not_found(container, name))
    }

    async fn write_blob(
        &self,
        container: &str,
        name: &str,
        content: &[u8],
        token: Option<&LeaseToken>,
    ) -> BlobStoreResult<()> {
        let mut state = self.state.write().await;
        let now = Utc::now();
        let key = (container.to_string(), name.to_string());

        match token {
            Some(token) => {
                let entry = state
                    .blobs
                    .get_mut(&key)
                    .ok_or_else(|| not_found(container, name))?;

                // Fenced write: the token must identify the currently held,
                // unexpired lease. An expired token is rejected even if no
                // one else has acquired since.
                let fence_holds =
                    matches!(entry.active_lease(now), Some(held) if held.token == *token);
                if fence_holds {
                    entry.content = content.to_vec();
                    entry.last_modified = now;
                    Ok(())
                } else {
                    Err(lease_conflict(container, name))
                }
            }
            None => {
                if !state.containers.contains(container) {
                    return Err(not_found(container, name));
                }
                match state.blobs.get_mut(&key) {
                    Some(entry) => {
                        if entry.active_lease(now).is_some() {
                            return Err(lease_conflict(container, name));
                        }
                        entry.content = content.to_vec();
                        entry.last_modified = now;
                        Ok(())
                    }
                    None => {
                        state.blobs.insert(
                            key,
                            BlobEntry {
                                content: content.to_vec(),
                                last_modified: now,
                                lease: None,
                            },
                        );
                        Ok(())
                    }
                }
            }
        }
    }
}
