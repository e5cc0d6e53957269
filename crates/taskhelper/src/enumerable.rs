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

//! Serial and bounded-concurrency enumeration with per-item lease gating.

use crate::{AggregateError, BoxError, ItemFailure, TaskHelper};
use fleetcoord_leases::{Acquisition, LeaseResult};
use rand::Rng;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

/// Default spacing between executed items.
pub const DEFAULT_ITEM_DELAY: Duration = Duration::from_millis(250);

/// Default bound on in-flight items for concurrent enumeration.
pub const DEFAULT_CONCURRENT_LIMIT: usize = 3;

/// Every this many dispatched items the in-flight batch is awaited, to
/// bound task-queue growth on very large sequences.
const DISPATCH_BATCH: usize = 10;

/// Env var forcing concurrent enumeration down to one in-flight item, for
/// interactive debugging.
pub const SERIAL_ENUMERATION_ENV: &str = "FLEETCOORD_SERIAL_ENUMERATION";

/// Per-item error callback for concurrent enumeration, invoked for each
/// failing item in addition to the aggregate error.
pub type ItemErrorCallback<T> = Arc<dyn Fn(&T, &BoxError) + Send + Sync>;

type NoLeaseFn<T> = fn(&T) -> std::future::Ready<LeaseResult<Acquisition>>;

impl TaskHelper {
    /// Serially execute `callback` once per item, in input order.
    ///
    /// After each executed item an optional jittered delay (±10% around
    /// `item_delay`) spaces the work out. The first callback failure stops
    /// the enumeration and propagates.
    pub async fn run_enumerable<T, I, F, Fut>(
        &self,
        name: &str,
        items: I,
        item_delay: Option<Duration>,
        callback: F,
    ) -> Result<(), BoxError>
    where
        I: IntoIterator<Item = T>,
        F: Fn(T) -> Fut,
        Fut: Future<Output = Result<(), BoxError>>,
    {
        for (index, item) in items.into_iter().enumerate() {
            debug!(task = name, index, "executing item");
            callback(item).await?;
            if let Some(delay) = item_delay {
                tokio::time::sleep(jittered(delay)).await;
            }
        }
        Ok(())
    }

    /// Serially execute `callback` once per item whose lease is obtained.
    ///
    /// `obtain_lease` runs before each item; a `Contested` outcome skips
    /// that item silently — another fleet member has it — and enumeration
    /// moves on. The delay after executed items exists precisely for this
    /// mode: it gives the rest of the fleet a chance to claim later items.
    pub async fn run_enumerable_leased<T, I, F, Fut, L, LFut>(
        &self,
        name: &str,
        items: I,
        item_delay: Option<Duration>,
        obtain_lease: L,
        callback: F,
    ) -> Result<(), BoxError>
    where
        I: IntoIterator<Item = T>,
        F: Fn(T) -> Fut,
        Fut: Future<Output = Result<(), BoxError>>,
        L: Fn(&T) -> LFut,
        LFut: Future<Output = LeaseResult<Acquisition>>,
    {
        for (index, item) in items.into_iter().enumerate() {
            let executed =
                execute_item(name, item, &callback, Some(&obtain_lease)).await?;
            debug!(task = name, index, executed, "enumerated item");
            if executed {
                if let Some(delay) = item_delay {
                    tokio::time::sleep(jittered(delay)).await;
                }
            }
        }
        Ok(())
    }

    /// Fire-and-forget form of [`run_enumerable`](Self::run_enumerable).
    pub fn run_background_enumerable<T, F, Fut>(
        &self,
        name: impl Into<String>,
        items: Vec<T>,
        item_delay: Option<Duration>,
        callback: F,
    ) where
        T: Send + 'static,
        F: Fn(T) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        let name = name.into();
        let helper = self.clone();
        tokio::spawn(async move {
            if let Err(err) = helper
                .run_enumerable(&name, items, item_delay, callback)
                .await
            {
                error!(task = %name, error = %err, "background enumeration failed");
            }
        });
    }

    /// Fire-and-forget form of
    /// [`run_enumerable_leased`](Self::run_enumerable_leased).
    pub fn run_background_enumerable_leased<T, F, Fut, L, LFut>(
        &self,
        name: impl Into<String>,
        items: Vec<T>,
        item_delay: Option<Duration>,
        obtain_lease: L,
        callback: F,
    ) where
        T: Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
        L: Fn(&T) -> LFut + Send + Sync + 'static,
        LFut: Future<Output = LeaseResult<Acquisition>> + Send + 'static,
    {
        let name = name.into();
        let helper = self.clone();
        tokio::spawn(async move {
            if let Err(err) = helper
                .run_enumerable_leased(&name, items, item_delay, obtain_lease, callback)
                .await
            {
                error!(task = %name, error = %err, "background enumeration failed");
            }
        });
    }

    /// Execute `callback` over the items with at most `concurrent_limit` in
    /// flight at once.
    ///
    /// Items are dispatched in input order and may complete in any order.
    /// Per-item failures are collected; after every item finishes, any
    /// failures surface together as one [`AggregateError`].
    pub async fn run_concurrent_enumerable<T, F, Fut>(
        &self,
        name: &str,
        items: Vec<T>,
        concurrent_limit: usize,
        item_delay: Option<Duration>,
        callback: F,
    ) -> Result<(), AggregateError>
    where
        T: Clone + Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        self.run_concurrent_core(
            name,
            items,
            concurrent_limit,
            item_delay,
            None::<NoLeaseFn<T>>,
            None,
            callback,
        )
        .await
    }

    /// [`run_concurrent_enumerable`](Self::run_concurrent_enumerable) with
    /// per-item lease gating and an optional per-item error callback.
    #[allow(clippy::too_many_arguments)]
    pub async fn run_concurrent_enumerable_leased<T, F, Fut, L, LFut>(
        &self,
        name: &str,
        items: Vec<T>,
        concurrent_limit: usize,
        item_delay: Option<Duration>,
        obtain_lease: L,
        err_item_callback: Option<ItemErrorCallback<T>>,
        callback: F,
    ) -> Result<(), AggregateError>
    where
        T: Clone + Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
        L: Fn(&T) -> LFut + Send + Sync + 'static,
        LFut: Future<Output = LeaseResult<Acquisition>> + Send + 'static,
    {
        self.run_concurrent_core(
            name,
            items,
            concurrent_limit,
            item_delay,
            Some(obtain_lease),
            err_item_callback,
            callback,
        )
        .await
    }

    /// Fire-and-forget form of
    /// [`run_concurrent_enumerable_leased`](Self::run_concurrent_enumerable_leased).
    pub fn run_background_concurrent_enumerable<T, F, Fut, L, LFut>(
        &self,
        name: impl Into<String>,
        items: Vec<T>,
        concurrent_limit: usize,
        item_delay: Option<Duration>,
        obtain_lease: L,
        err_item_callback: Option<ItemErrorCallback<T>>,
        callback: F,
    ) where
        T: Clone + Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
        L: Fn(&T) -> LFut + Send + Sync + 'static,
        LFut: Future<Output = LeaseResult<Acquisition>> + Send + 'static,
    {
        let name = name.into();
        let helper = self.clone();
        tokio::spawn(async move {
            if let Err(err) = helper
                .run_concurrent_enumerable_leased(
                    &name,
                    items,
                    concurrent_limit,
                    item_delay,
                    obtain_lease,
                    err_item_callback,
                    callback,
                )
                .await
            {
                error!(task = %name, error = %err, "background concurrent enumeration failed");
            }
        });
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_concurrent_core<T, F, Fut, L, LFut>(
        &self,
        name: &str,
        items: Vec<T>,
        concurrent_limit: usize,
        item_delay: Option<Duration>,
        obtain_lease: Option<L>,
        err_item_callback: Option<ItemErrorCallback<T>>,
        callback: F,
    ) -> Result<(), AggregateError>
    where
        T: Clone + Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
        L: Fn(&T) -> LFut + Send + Sync + 'static,
        LFut: Future<Output = LeaseResult<Acquisition>> + Send + 'static,
    {
        let limit = effective_concurrency(concurrent_limit);
        let total = items.len();
        debug!(task = name, total, limit, "concurrent enumeration started");

        let semaphore = Arc::new(Semaphore::new(limit));
        let callback = Arc::new(callback);
        let obtain_lease = obtain_lease.map(Arc::new);
        let mut in_flight: Vec<(usize, JoinHandle<Result<(), BoxError>>)> = Vec::new();
        let mut failures: Vec<ItemFailure> = Vec::new();

        for (index, item) in items.into_iter().enumerate() {
            // Bounds in-flight items; dispatch order is input order.
            let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                break;
            };

            let task_name = name.to_string();
            let callback = Arc::clone(&callback);
            let obtain_lease = obtain_lease.clone();
            let err_callback = err_item_callback.clone();
            let handle = tokio::spawn(async move {
                let _permit = permit;
                match execute_item(
                    &task_name,
                    item.clone(),
                    callback.as_ref(),
                    obtain_lease.as_deref(),
                )
                .await
                {
                    Ok(executed) => {
                        if executed {
                            if let Some(delay) = item_delay {
                                tokio::time::sleep(jittered(delay)).await;
                            }
                        }
                        Ok(())
                    }
                    Err(err) => {
                        warn!(task = %task_name, index, error = %err, "item failed");
                        if let Some(err_callback) = &err_callback {
                            err_callback(&item, &err);
                        }
                        Err(err)
                    }
                }
            });
            in_flight.push((index, handle));

            if in_flight.len() >= DISPATCH_BATCH {
                drain(&mut in_flight, &mut failures).await;
            }
        }
        drain(&mut in_flight, &mut failures).await;

        debug!(
            task = name,
            total,
            failed = failures.len(),
            "concurrent enumeration finished"
        );
        if failures.is_empty() {
            Ok(())
        } else {
            Err(AggregateError { total, failures })
        }
    }
}

/// Run one item: obtain its lease if gating is in effect, execute, release.
/// Returns whether the callback actually ran.
async fn execute_item<T, F, Fut, L, LFut>(
    name: &str,
    item: T,
    callback: &F,
    obtain_lease: Option<&L>,
) -> Result<bool, BoxError>
where
    F: Fn(T) -> Fut,
    Fut: Future<Output = Result<(), BoxError>>,
    L: Fn(&T) -> LFut,
    LFut: Future<Output = LeaseResult<Acquisition>>,
{
    match obtain_lease {
        None => {
            callback(item).await?;
            Ok(true)
        }
        Some(obtain_lease) => match obtain_lease(&item).await? {
            Acquisition::Contested => {
                debug!(task = name, "item lease contested, skipping");
                Ok(false)
            }
            Acquisition::Acquired(guard) => {
                let result = callback(item).await;
                guard.release().await;
                result.map(|_| true)
            }
        },
    }
}

/// Await a batch of in-flight items, collecting failures.
async fn drain(
    in_flight: &mut Vec<(usize, JoinHandle<Result<(), BoxError>>)>,
    failures: &mut Vec<ItemFailure>,
) {
    for (index, handle) in in_flight.drain(..) {
        match handle.await {
            Ok(Ok(())) => {}
            Ok(Err(error)) => failures.push(ItemFailure { index, error }),
            Err(join_error) => failures.push(ItemFailure {
                index,
                error: Box::new(join_error),
            }),
        }
    }
}

fn effective_concurrency(concurrent_limit: usize) -> usize {
    let limit = concurrent_limit.max(1);
    match std::env::var(SERIAL_ENUMERATION_ENV) {
        Ok(value) if value == "1" || value.eq_ignore_ascii_case("true") => 1,
        _ => limit,
    }
}

/// ±10% jitter so fleet members fall out of lockstep.
fn jittered(delay: Duration) -> Duration {
    let base = delay.as_millis() as u64;
    if base == 0 {
        return Duration::ZERO;
    }
    let spread = base / 10;
    let ms = rand::thread_rng().gen_range(base.saturating_sub(spread)..=base + spread);
    Duration::from_millis(ms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetcoord_blobstore::{BlobLeaseStore, MemoryBlobLeaseStore};
    use fleetcoord_leases::DistributedLease;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[tokio::test]
    async fn test_serial_enumeration_preserves_order() {
        let helper = TaskHelper::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&seen);
        helper
            .run_enumerable("ordered", vec![1, 2, 3], None, move |item| {
                let sink = Arc::clone(&sink);
                async move {
                    sink.lock().unwrap().push(item);
                    Ok(())
                }
            })
            .await
            .unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_serial_enumeration_stops_on_error() {
        let helper = TaskHelper::new();
        let seen = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&seen);
        let result = helper
            .run_enumerable("fail-fast", vec![1, 2, 3], None, move |item| {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    if item == 2 {
                        Err::<(), BoxError>("boom".into())
                    } else {
                        Ok(())
                    }
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_lease_denied_items_are_skipped() {
        let helper = TaskHelper::new();
        let executed = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&executed);
        helper
            .run_enumerable_leased(
                "all-contested",
                vec![1, 2, 3],
                None,
                |_item: &i32| std::future::ready(Ok(Acquisition::Contested)),
                move |_item| {
                    let counter = Arc::clone(&counter);
                    async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    }
                },
            )
            .await
            .unwrap();

        assert_eq!(executed.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_leased_items_execute_and_release() {
        let helper = TaskHelper::new();
        let store = Arc::new(MemoryBlobLeaseStore::new());
        let leases = Arc::new(DistributedLease::new(
            Arc::clone(&store) as Arc<dyn BlobLeaseStore>
        ));
        let executed = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&executed);
        let lease_src = Arc::clone(&leases);
        helper
            .run_enumerable_leased(
                "leased",
                vec![1u32, 2, 3],
                None,
                move |item: &u32| {
                    let leases = Arc::clone(&lease_src);
                    let name = format!("item-{}", item);
                    async move { leases.obtain("work", &name).await }
                },
                move |_item| {
                    let counter = Arc::clone(&counter);
                    async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    }
                },
            )
            .await
            .unwrap();

        assert_eq!(executed.load(Ordering::SeqCst), 3);

        // Every per-item lease must have been released on the way through.
        for item in 1u32..=3 {
            let acquisition = leases
                .obtain("work", &format!("item-{}", item))
                .await
                .unwrap();
            assert!(!acquisition.is_contested());
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_concurrent_limit_is_respected() {
        let helper = TaskHelper::new();
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let gauge = Arc::clone(&in_flight);
        let high_water = Arc::clone(&peak);
        helper
            .run_concurrent_enumerable(
                "bounded",
                (0..20).collect::<Vec<_>>(),
                3,
                None,
                move |_item| {
                    let gauge = Arc::clone(&gauge);
                    let high_water = Arc::clone(&high_water);
                    async move {
                        let now = gauge.fetch_add(1, Ordering::SeqCst) + 1;
                        high_water.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        gauge.fetch_sub(1, Ordering::SeqCst);
                        Ok(())
                    }
                },
            )
            .await
            .unwrap();

        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert!(peak.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_aggregate_error_surfaces_all_failures() {
        let helper = TaskHelper::new();
        let executed = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&executed);
        let result = helper
            .run_concurrent_enumerable(
                "one-bad-apple",
                (0..5).collect::<Vec<_>>(),
                2,
                None,
                move |item| {
                    let counter = Arc::clone(&counter);
                    async move {
                        if item == 2 {
                            return Err::<(), BoxError>("item 2 failed".into());
                        }
                        counter.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    }
                },
            )
            .await;

        let aggregate = result.unwrap_err();
        assert_eq!(aggregate.total, 5);
        assert_eq!(aggregate.failures.len(), 1);
        assert_eq!(aggregate.failures[0].index, 2);
        // The other four items still completed.
        assert_eq!(executed.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_err_item_callback_runs_per_failure() {
        let helper = TaskHelper::new();
        let store = Arc::new(MemoryBlobLeaseStore::new());
        let leases = Arc::new(DistributedLease::new(
            Arc::clone(&store) as Arc<dyn BlobLeaseStore>
        ));
        let reported = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&reported);
        let err_callback: ItemErrorCallback<i32> = Arc::new(move |item, _err| {
            sink.lock().unwrap().push(*item);
        });

        let result = helper
            .run_concurrent_enumerable_leased(
                "reported",
                vec![1, 2, 3],
                2,
                None,
                move |item: &i32| {
                    let leases = Arc::clone(&leases);
                    let name = format!("item-{}", item);
                    async move { leases.obtain("work", &name).await }
                },
                Some(err_callback),
                |item| async move {
                    if item == 2 {
                        Err::<(), BoxError>("item 2 failed".into())
                    } else {
                        Ok(())
                    }
                },
            )
            .await;

        let aggregate = result.unwrap_err();
        assert_eq!(aggregate.failures.len(), 1);
        assert_eq!(*reported.lock().unwrap(), vec![2]);
    }

    #[tokio::test]
    async fn test_skipped_leased_items_raise_no_error() {
        let helper = TaskHelper::new();

        let result = helper
            .run_concurrent_enumerable_leased(
                "all-contested",
                vec![1, 2, 3],
                2,
                None,
                |_item: &i32| std::future::ready(Ok(Acquisition::Contested)),
                None,
                |_item| async move { Ok(()) },
            )
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_large_sequences_complete_past_dispatch_batches() {
        let helper = TaskHelper::new();
        let executed = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&executed);
        helper
            .run_concurrent_enumerable(
                "large",
                (0..47).collect::<Vec<_>>(),
                4,
                None,
                move |_item| {
                    let counter = Arc::clone(&counter);
                    async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    }
                },
            )
            .await
            .unwrap();

        assert_eq!(executed.load(Ordering::SeqCst), 47);
    }

    #[test]
    fn test_jitter_stays_within_ten_percent() {
        for _ in 0..100 {
            let d = jittered(Duration::from_millis(250));
            assert!(d >= Duration::from_millis(225));
            assert!(d <= Duration::from_millis(275));
        }
        assert_eq!(jittered(Duration::ZERO), Duration::ZERO);
    }

    #[test]
    fn test_effective_concurrency_floors_at_one() {
        assert_eq!(effective_concurrency(0), 1);
        assert_eq!(effective_concurrency(5), 5);
    }
}
