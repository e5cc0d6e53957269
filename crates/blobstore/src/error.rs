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

//! Error types for blob-lease store operations.

use thiserror::Error;

/// Result type for blob-lease store operations.
pub type BlobStoreResult<T> = Result<T, BlobStoreError>;

/// Errors that can occur during blob-lease store operations.
///
/// `NotFound` and `LeaseConflict` are contract-level conditions that callers
/// branch on; everything else is an opaque backend fault.
#[derive(Error, Debug)]
pub enum BlobStoreError {
    /// Container or blob does not exist
    #[error("Blob not found: {container}/{name}")]
    NotFound {
        /// Container the lookup targeted
        container: String,
        /// Blob name the lookup targeted
        name: String,
    },

    /// A lease is already present, or a fenced operation was attempted with
    /// a token that does not match the currently held lease
    #[error("Lease conflict on: {container}/{name}")]
    LeaseConflict {
        /// Container of the contended blob
        container: String,
        /// Name of the contended blob
        name: String,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Backend error (database, network, etc.)
    #[error("Backend error: {0}")]
    BackendError(String),

    /// IO error
    #[error("IO error: {0}")]
    IOError(#[from] std::io::Error),
}

impl BlobStoreError {
    /// Whether this error is the distinguishable "not found" condition.
    pub fn is_not_found(&self) -> bool {
        matches!(self, BlobStoreError::NotFound { .. })
    }

    /// Whether this error is the distinguishable "lease conflict" condition.
    pub fn is_lease_conflict(&self) -> bool {
        matches!(self, BlobStoreError::LeaseConflict { .. })
    }
}

#[cfg(feature = "sqlite-backend")]
impl From<sqlx::Error> for BlobStoreError {
    fn from(err: sqlx::Error) -> Self {
        BlobStoreError::BackendError(format!("SQL error: {}", err))
    }
}
