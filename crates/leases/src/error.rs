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

//! Error types for distributed lease operations.

use fleetcoord_blobstore::BlobStoreError;
use thiserror::Error;

/// Result type for lease operations.
pub type LeaseResult<T> = Result<T, LeaseError>;

/// Errors that can occur during lease operations.
///
/// Note that lease contention is *not* an error; it is the
/// [`Acquisition::Contested`](crate::Acquisition::Contested) outcome.
#[derive(Error, Debug)]
pub enum LeaseError {
    /// Claim period is unusable (zero or longer than a day)
    #[error("Invalid claim period: {0}")]
    InvalidClaimPeriod(String),

    /// Backing blob store failure
    #[error("Blob store error: {0}")]
    Store(#[from] BlobStoreError),
}
