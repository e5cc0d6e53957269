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

//! Error types for task helper operations.

use thiserror::Error;

/// Error type produced by caller-supplied callbacks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A single failed item from a concurrent enumeration.
#[derive(Debug)]
pub struct ItemFailure {
    /// Zero-based position of the item in the input sequence.
    pub index: usize,
    /// The failure itself.
    pub error: BoxError,
}

/// All failures from one concurrent enumeration, surfaced after every item
/// has finished. Individual failures are never dropped: each one is kept
/// here and also reported to the per-item error callback when supplied.
#[derive(Debug, Error)]
#[error("{} of {} enumerated items failed", .failures.len(), .total)]
pub struct AggregateError {
    /// Number of items in the enumeration.
    pub total: usize,
    /// The failed items, in completion order.
    pub failures: Vec<ItemFailure>,
}
