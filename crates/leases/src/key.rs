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

//! Lease identity and storage-safe name normalization.

/// Identity of a lease: a `(container, name)` pair with the name normalized
/// to a storage-safe form.
///
/// Lease names are built from free-form identifiers (pool codes, job names)
/// that may carry characters the blob store rejects; normalization strips
/// underscores and lowercases, so `Watch_Pool-7` and `watchpool-7` identify
/// the same lease.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LeaseKey {
    container: String,
    name: String,
}

impl LeaseKey {
    /// Build a key, normalizing `name`.
    pub fn new(container: impl Into<String>, name: &str) -> Self {
        Self {
            container: container.into(),
            name: normalize_name(name),
        }
    }

    /// The container this lease lives in.
    pub fn container(&self) -> &str {
        &self.container
    }

    /// The normalized blob name of this lease.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Display for LeaseKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.container, self.name)
    }
}

fn normalize_name(name: &str) -> String {
    name.replace('_', "").to_lowercase()
}
