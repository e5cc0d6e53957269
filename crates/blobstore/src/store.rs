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

//! Blob-lease store trait.

use crate::{BlobStoreError, BlobStoreResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Opaque token identifying a held lease.
///
/// Issued by [`BlobLeaseStore::acquire_lease`]; required for renewal,
/// release, and fenced writes. The token value has no meaning to callers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LeaseToken(String);

impl LeaseToken {
    /// Wrap a backend-issued token value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The raw token value, for backends that persist it.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for LeaseToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Trait for stores that support the blob lease protocol.
///
/// ## Behavior
/// - `acquire_lease` is atomic: for a given `(container, name)` at most one
///   unexpired lease exists at any time
/// - an expired lease is treated as absent for acquisition
/// - a write carrying a token is *fenced*: it succeeds only while that exact
///   lease is unexpired and held ([`BlobStoreError::LeaseConflict`] otherwise)
/// - a write without a token fails if any unexpired lease is held
#[async_trait]
pub trait BlobLeaseStore: Send + Sync {
    /// Create the container if it does not already exist. Idempotent.
    async fn create_container_if_not_exists(&self, container: &str) -> BlobStoreResult<()>;

    /// Create the blob with `initial_content` if it does not already exist.
    ///
    /// Returns whether the blob already existed. Never overwrites.
    async fn create_blob_if_not_exists(
        &self,
        container: &str,
        name: &str,
        initial_content: &[u8],
    ) -> BlobStoreResult<bool>;

    /// Acquire an exclusive lease on the blob for `duration`.
    ///
    /// ## Returns
    /// - `Ok(LeaseToken)`: lease acquired
    /// - `Err(BlobStoreError::LeaseConflict)`: an unexpired lease is held
    /// - `Err(BlobStoreError::NotFound)`: blob does not exist
    async fn acquire_lease(
        &self,
        container: &str,
        name: &str,
        duration: Duration,
    ) -> BlobStoreResult<LeaseToken>;

    /// Extend the lease expiry by its original duration.
    ///
    /// Fails with [`BlobStoreError::LeaseConflict`] if the token no longer
    /// matches the held lease (e.g. it expired and another holder acquired).
    async fn renew_lease(
        &self,
        container: &str,
        name: &str,
        token: &LeaseToken,
    ) -> BlobStoreResult<()>;

    /// Release the lease identified by `token`.
    async fn release_lease(
        &self,
        container: &str,
        name: &str,
        token: &LeaseToken,
    ) -> BlobStoreResult<()>;

    /// Last-modified timestamp of the blob.
    async fn last_modified(&self, container: &str, name: &str) -> BlobStoreResult<DateTime<Utc>>;

    /// Overwrite the blob content and bump its last-modified timestamp.
    ///
    /// With `token = Some(..)` the write is fenced by the lease protocol;
    /// with `None` it fails if any unexpired lease is held on the blob.
    async fn write_blob(
        &self,
        container: &str,
        name: &str,
        content: &[u8],
        token: Option<&LeaseToken>,
    ) -> BlobStoreResult<()>;
}

/// Shorthand used by backends to build the not-found condition.
pub(crate) fn not_found(container: &str, name: &str) -> BlobStoreError {
    BlobStoreError::NotFound {
        container: container.to_string(),
        name: name.to_string(),
    }
}

/// Shorthand used by backends to build the lease-conflict condition.
pub(crate) fn lease_conflict(container: &str, name: &str) -> BlobStoreError {
    BlobStoreError::LeaseConflict {
        container: container.to_string(),
        name: name.to_string(),
    }
}
