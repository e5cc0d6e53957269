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

//! Two workers fan out over the same items; per-item leases must keep them
//! from double-processing anything.

use fleetcoord_blobstore::{BlobLeaseStore, MemoryBlobLeaseStore};
use fleetcoord_leases::{ClaimedDistributedLease, DistributedLease};
use fleetcoord_taskhelper::TaskHelper;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Simulated worker process: its own lease primitive over the shared store.
fn worker(store: &Arc<MemoryBlobLeaseStore>) -> Arc<DistributedLease> {
    Arc::new(DistributedLease::new(
        Arc::clone(store) as Arc<dyn BlobLeaseStore>
    ))
}

#[tokio::test(flavor = "multi_thread")]
async fn claimed_fan_out_processes_each_item_exactly_once() {
    // Sweeps gate items on a *claimed* lease: once one worker has processed
    // an item this period, the claim record keeps every other worker (and
    // any later pass this period) from re-processing it.
    let store = Arc::new(MemoryBlobLeaseStore::new());
    let processed: Arc<Mutex<HashMap<u32, usize>>> = Arc::new(Mutex::new(HashMap::new()));
    let items: Vec<u32> = (0..12).collect();

    let mut fleet = vec![];
    for _ in 0..2 {
        let leases = Arc::new(ClaimedDistributedLease::new(
            Arc::clone(&store) as Arc<dyn BlobLeaseStore>
        ));
        let processed = Arc::clone(&processed);
        let items = items.clone();
        fleet.push(tokio::spawn(async move {
            let helper = TaskHelper::new();
            let lease_src = Arc::clone(&leases);
            helper
                .run_concurrent_enumerable_leased(
                    "fleet-sweep",
                    items,
                    3,
                    Some(Duration::from_millis(5)),
                    move |item: &u32| {
                        let leases = Arc::clone(&lease_src);
                        let name = format!("sweep-item-{}", item);
                        async move {
                            leases
                                .obtain("fleet-work", &name, Duration::from_secs(3600))
                                .await
                        }
                    },
                    None,
                    move |item| {
                        let processed = Arc::clone(&processed);
                        async move {
                            *processed.lock().unwrap().entry(item).or_insert(0) += 1;
                            tokio::time::sleep(Duration::from_millis(10)).await;
                            Ok(())
                        }
                    },
                )
                .await
        }));
    }

    for handle in fleet {
        handle.await.unwrap().unwrap();
    }

    let processed = processed.lock().unwrap();
    for item in 0..12u32 {
        assert_eq!(processed.get(&item), Some(&1), "item {} count", item);
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn serial_worker_skips_items_held_by_peer() {
    let store = Arc::new(MemoryBlobLeaseStore::new());
    let holder = worker(&store);
    let sweeper = worker(&store);

    // A peer already holds items 1 and 3.
    let g1 = holder
        .obtain("fleet-work", "held-item-1")
        .await
        .unwrap()
        .acquired()
        .unwrap();
    let g3 = holder
        .obtain("fleet-work", "held-item-3")
        .await
        .unwrap()
        .acquired()
        .unwrap();

    let helper = TaskHelper::new();
    let executed = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&executed);
    let lease_src = Arc::clone(&sweeper);
    helper
        .run_enumerable_leased(
            "partial-sweep",
            vec![1u32, 2, 3, 4],
            None,
            move |item: &u32| {
                let leases = Arc::clone(&lease_src);
                let name = format!("held-item-{}", item);
                async move { leases.obtain("fleet-work", &name).await }
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

    assert_eq!(executed.load(Ordering::SeqCst), 2);

    g1.release().await;
    g3.release().await;
}
