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

//! Retry-until-success-or-timeout.

use crate::TaskHelper;
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::debug;

impl TaskHelper {
    /// Repeatedly invoke `callback` until it returns `true` or the elapsed
    /// time exceeds `timeout`.
    ///
    /// An optional `wait` is applied between failed attempts. If the loop
    /// exits without success, `on_timeout` fires exactly once. Returns the
    /// final success flag.
    pub async fn retry_until_success_or_timeout<F, Fut, O>(
        &self,
        name: &str,
        timeout: Duration,
        wait: Option<Duration>,
        on_timeout: Option<O>,
        mut callback: F,
    ) -> bool
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = bool>,
        O: FnOnce(),
    {
        let started = Instant::now();
        let mut try_count: u64 = 0;
        let success = loop {
            try_count += 1;
            let success = callback().await;
            debug!(
                task = name,
                try_count,
                success,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "retry attempt"
            );

            if success {
                break true;
            }
            if started.elapsed() >= timeout {
                break false;
            }
            if let Some(wait) = wait {
                sleep(wait).await;
            }
        };

        if !success {
            debug!(task = name, try_count, "retry timed out");
            if let Some(on_timeout) = on_timeout {
                on_timeout();
            }
        }
        success
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_succeeds_on_later_attempt() {
        let helper = TaskHelper::new();
        let attempts = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&attempts);
        let success = helper
            .retry_until_success_or_timeout(
                "eventually",
                Duration::from_secs(5),
                Some(Duration::from_millis(10)),
                None::<fn()>,
                move || {
                    let counter = Arc::clone(&counter);
                    async move { counter.fetch_add(1, Ordering::SeqCst) + 1 >= 3 }
                },
            )
            .await;

        assert!(success);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_timeout_fires_callback_once_and_returns_false() {
        let helper = TaskHelper::new();
        let timeouts = Arc::new(AtomicUsize::new(0));

        let started = std::time::Instant::now();
        let counter = Arc::clone(&timeouts);
        let success = helper
            .retry_until_success_or_timeout(
                "never",
                Duration::from_millis(500),
                Some(Duration::from_millis(100)),
                Some(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                }),
                || async { false },
            )
            .await;
        let elapsed = started.elapsed();

        assert!(!success);
        assert_eq!(timeouts.load(Ordering::SeqCst), 1);
        assert!(elapsed >= Duration::from_millis(500));
        assert!(elapsed < Duration::from_millis(900));
    }

    #[tokio::test]
    async fn test_immediate_success_skips_wait() {
        let helper = TaskHelper::new();

        let started = std::time::Instant::now();
        let success = helper
            .retry_until_success_or_timeout(
                "instant",
                Duration::from_secs(5),
                Some(Duration::from_millis(500)),
                None::<fn()>,
                || async { true },
            )
            .await;

        assert!(success);
        assert!(started.elapsed() < Duration::from_millis(100));
    }
}
