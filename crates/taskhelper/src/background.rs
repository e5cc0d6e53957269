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

//! Fire-and-forget execution and scheduled loops.

use crate::{BoxError, TaskHelper};
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{error, info, warn};

impl TaskHelper {
    /// Run a callback fire-and-forget style: in the background, detached
    /// from the caller, with no way for its outcome to propagate back.
    /// Failures are logged under `name`.
    pub fn run_background<F>(&self, name: impl Into<String>, delay: Option<Duration>, callback: F)
    where
        F: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        let name = name.into();
        tokio::spawn(async move {
            if let Some(delay) = delay {
                sleep(delay).await;
            }
            if let Err(err) = callback.await {
                error!(task = %name, error = %err, "background task failed");
            }
        });
    }

    /// Like [`run_background`](Self::run_background), additionally invoking
    /// `err_callback` if the callback fails. The error still never
    /// propagates anywhere — there is no caller to propagate to.
    pub fn run_background_with<F, E>(
        &self,
        name: impl Into<String>,
        delay: Option<Duration>,
        err_callback: E,
        callback: F,
    ) where
        F: Future<Output = Result<(), BoxError>> + Send + 'static,
        E: FnOnce(&BoxError) + Send + 'static,
    {
        let name = name.into();
        tokio::spawn(async move {
            if let Some(delay) = delay {
                sleep(delay).await;
            }
            if let Err(err) = callback.await {
                error!(task = %name, error = %err, "background task failed");
                err_callback(&err);
            }
        });
    }

    /// Run a callback fire-and-forget style on its own OS thread.
    ///
    /// For work dominated by long waits on slow external services: the
    /// future runs on a dedicated current-thread runtime so it never
    /// occupies a worker of the shared pool, however long it idles.
    pub fn run_background_long<F>(
        &self,
        name: impl Into<String>,
        delay: Option<Duration>,
        callback: F,
    ) where
        F: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        let name = name.into();
        let thread_name = format!("taskhelper-{}", name);
        let spawned = std::thread::Builder::new().name(thread_name).spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(err) => {
                    error!(task = %name, error = %err, "failed to build long-task runtime");
                    return;
                }
            };
            runtime.block_on(async move {
                if let Some(delay) = delay {
                    sleep(delay).await;
                }
                if let Err(err) = callback.await {
                    error!(task = %name, error = %err, "background task failed");
                }
            });
        });
        if let Err(err) = spawned {
            error!(error = %err, "failed to spawn long-task thread");
        }
    }

    /// Run a callback now and then repeatedly on `schedule`, in the
    /// background, until it returns `Ok(false)` or the process exits.
    /// Iteration failures are logged and the loop continues.
    pub fn run_background_loop<F, Fut>(
        &self,
        name: impl Into<String>,
        schedule: Option<Duration>,
        callback: F,
    ) where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<bool, BoxError>> + Send + 'static,
    {
        let name = name.into();
        let helper = self.clone();
        tokio::spawn(async move {
            helper
                .run_background_loop_async(&name, schedule, callback)
                .await;
        });
    }

    /// Awaitable form of [`run_background_loop`](Self::run_background_loop):
    /// the loop runs on the caller's task and this returns when the
    /// callback asks to stop.
    pub async fn run_background_loop_async<F, Fut>(
        &self,
        name: &str,
        schedule: Option<Duration>,
        callback: F,
    ) where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<bool, BoxError>> + Send,
    {
        self.run_background_loop_until(name, schedule, |_| true, callback)
            .await;
    }

    /// Loop variant where `err_loop` decides, per failed iteration, whether
    /// the loop continues (`true`) or stops (`false`).
    pub async fn run_background_loop_until<F, Fut, E>(
        &self,
        name: &str,
        schedule: Option<Duration>,
        mut err_loop: E,
        mut callback: F,
    ) where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<bool, BoxError>> + Send,
        E: FnMut(&BoxError) -> bool + Send,
    {
        info!(task = name, "background loop started");
        let mut iteration: u64 = 0;
        loop {
            iteration += 1;
            let started = Instant::now();
            let keep_going = match callback().await {
                Ok(keep_going) => {
                    tracing::debug!(
                        task = name,
                        iteration,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "loop iteration completed"
                    );
                    keep_going
                }
                Err(err) => {
                    warn!(task = name, iteration, error = %err, "loop iteration failed");
                    err_loop(&err)
                }
            };

            if !keep_going {
                break;
            }
            if let Some(schedule) = schedule {
                sleep(schedule).await;
            }
        }
        info!(task = name, iteration, "background loop stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_run_background_runs_detached() {
        let helper = TaskHelper::new();
        let ran = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&ran);
        helper.run_background("unit", None, async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        sleep(Duration::from_millis(50)).await;
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_run_background_honors_delay() {
        let helper = TaskHelper::new();
        let ran = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&ran);
        helper.run_background("delayed", Some(Duration::from_millis(80)), async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        sleep(Duration::from_millis(30)).await;
        assert_eq!(ran.load(Ordering::SeqCst), 0);
        sleep(Duration::from_millis(100)).await;
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_run_background_with_reports_error() {
        let helper = TaskHelper::new();
        let reported = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&reported);
        helper.run_background_with(
            "failing",
            None,
            move |_err| {
                counter.fetch_add(1, Ordering::SeqCst);
            },
            async move { Err::<(), BoxError>("boom".into()) },
        );

        sleep(Duration::from_millis(50)).await;
        assert_eq!(reported.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_run_background_long_runs_off_pool() {
        let helper = TaskHelper::new();
        let ran = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&ran);
        helper.run_background_long("slow-external", None, async move {
            sleep(Duration::from_millis(20)).await;
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        sleep(Duration::from_millis(200)).await;
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_loop_runs_until_callback_stops() {
        let helper = TaskHelper::new();
        let runs = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&runs);
        helper
            .run_background_loop_async("looper", Some(Duration::from_millis(10)), move || {
                let counter = Arc::clone(&counter);
                async move {
                    let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                    Ok(n < 3)
                }
            })
            .await;

        assert_eq!(runs.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_loop_error_handler_can_stop_loop() {
        let helper = TaskHelper::new();
        let runs = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&runs);
        helper
            .run_background_loop_until(
                "fail-fast",
                Some(Duration::from_millis(10)),
                |_err| false,
                move || {
                    let counter = Arc::clone(&counter);
                    async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        Err::<bool, BoxError>("boom".into())
                    }
                },
            )
            .await;

        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_loop_continues_past_errors_by_default() {
        let helper = TaskHelper::new();
        let runs = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&runs);
        helper
            .run_background_loop_async("flaky", Some(Duration::from_millis(5)), move || {
                let counter = Arc::clone(&counter);
                async move {
                    let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                    if n == 1 {
                        Err::<bool, BoxError>("transient".into())
                    } else {
                        Ok(n < 3)
                    }
                }
            })
            .await;

        assert_eq!(runs.load(Ordering::SeqCst), 3);
    }
}
