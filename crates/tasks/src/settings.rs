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

//! Task enablement settings.

use std::collections::HashMap;

/// Capability for reading per-task enablement flags.
///
/// The flag is re-read on every scheduler tick, so flipping it takes effect
/// without a restart. `None` means the flag is unset; callers default unset
/// to enabled.
pub trait TaskSettings: Send + Sync {
    /// The configured enablement flag for `task_name`, if any.
    fn is_task_enabled(&self, task_name: &str) -> Option<bool>;
}

/// Environment-variable backed task settings.
///
/// A task named `watch-orphaned-pools` reads
/// `FLEETCOORD_TASK_WATCH_ORPHANED_POOLS_ENABLED`; accepted values are
/// `true`/`false`/`1`/`0` (case-insensitive). Anything else counts as unset.
#[derive(Debug, Clone, Default)]
pub struct EnvTaskSettings;

impl EnvTaskSettings {
    /// Create new env-backed settings.
    pub fn new() -> Self {
        Self
    }

    fn var_name(task_name: &str) -> String {
        format!(
            "FLEETCOORD_TASK_{}_ENABLED",
            task_name.to_uppercase().replace('-', "_")
        )
    }
}

impl TaskSettings for EnvTaskSettings {
    fn is_task_enabled(&self, task_name: &str) -> Option<bool> {
        let value = std::env::var(Self::var_name(task_name)).ok()?;
        match value.to_lowercase().as_str() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        }
    }
}

/// Map-backed task settings (for tests and static wiring).
#[derive(Debug, Clone, Default)]
pub struct StaticTaskSettings {
    flags: HashMap<String, bool>,
}

impl StaticTaskSettings {
    /// Create empty settings: every task reads as unset (enabled).
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the flag for one task.
    pub fn set(mut self, task_name: impl Into<String>, enabled: bool) -> Self {
        self.flags.insert(task_name.into(), enabled);
        self
    }
}

impl TaskSettings for StaticTaskSettings {
    fn is_task_enabled(&self, task_name: &str) -> Option<bool> {
        self.flags.get(task_name).copied()
    }
}
