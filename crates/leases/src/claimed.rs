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

//! Time-bucketed distributed lease: at most one successful claim per period.

use crate::guard::{Acquisition, LeaseGuard};
use crate::{LeaseError, LeaseKey, LeaseResult, LEASE_DURATION, RENEWAL_MARGIN};
use chrono::{DateTime, NaiveTime, Utc};
use fleetcoord_blobstore::{BlobLeaseStore, BlobStoreError};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Placeholder content of a freshly provisioned claim blob.
const INITIAL_CONTENT: &[u8] = b"Lock file contents. Auto-generated. Do not modify.";

/// Distributed lease that can be successfully obtained at most once per
/// claim period, fleet-wide.
///
/// The day is divided into `claim_period`-sized buckets aligned to UTC
/// midnight: with a one-hour period, a call at 5:43:20 belongs to the bucket
/// starting at 5:00:00. A claim succeeds only if no claim has been recorded
/// in the current bucket yet; the claim is recorded when the winning guard
/// is released. This supports operations that must happen once per hour or
/// once per day no matter how many processes run the schedule.
///
/// Callers get [`Acquisition::Contested`] both when another holder currently
/// owns the lease and when the bucket was already claimed; the two are
/// indistinguishable on purpose, since both mean "do not proceed".
pub struct ClaimedDistributedLease {
    store: Arc<dyn BlobLeaseStore>,
}

impl ClaimedDistributedLease {
    /// Create a new claimed distributed lease over the given store.
    pub fn new(store: Arc<dyn BlobLeaseStore>) -> Self {
        Self { store }
    }

    /// Attempt to claim the named lease for the current time bucket.
    #[instrument(skip(self, claim_period))]
    pub async fn obtain(
        &self,
        container: &str,
        name: &str,
        claim_period: Duration,
    ) -> LeaseResult<Acquisition> {
        let bucket_start = claim_bucket_start(Utc::now(), claim_period)?;
        let key = LeaseKey::new(container, name);

        self.store
            .create_container_if_not_exists(key.container())
            .await?;
        let existed = self
            .store
            .create_blob_if_not_exists(key.container(), key.name(), INITIAL_CONTENT)
            .await?;
        let is_first_run = !existed;
        debug!(lease = %key, is_first_run, %bucket_start, "claim attempt");

        // Cheap check before taking the lease: if this bucket was already
        // claimed there is nothing to contend for.
        if !is_first_run && self.already_claimed(&key, bucket_start).await? {
            debug!(lease = %key, "claim period already used");
            return Ok(Acquisition::Contested);
        }

        let token = match self
            .store
            .acquire_lease(key.container(), key.name(), LEASE_DURATION)
            .await
        {
            Ok(token) => token,
            Err(BlobStoreError::LeaseConflict { .. }) => {
                debug!(lease = %key, "claim lease contested");
                return Ok(Acquisition::Contested);
            }
            Err(error) => return Err(LeaseError::Store(error)),
        };

        // Double lock check: between the check above and the acquisition
        // another process may have claimed and released. Re-read under the
        // lease and back out if so.
        if !is_first_run {
            match self.already_claimed(&key, bucket_start).await {
                Ok(false) => {}
                Ok(true) => {
                    debug!(lease = %key, "claim period used during acquisition");
                    self.force_release(&key, &token).await;
                    return Ok(Acquisition::Contested);
                }
                Err(error) => {
                    self.force_release(&key, &token).await;
                    return Err(error);
                }
            }
        }

        Ok(Acquisition::Acquired(LeaseGuard::start(
            Arc::clone(&self.store),
            key,
            token,
            true,
            LEASE_DURATION,
            RENEWAL_MARGIN,
        )))
    }

    /// Whether a claim has already been recorded within the current bucket.
    async fn already_claimed(
        &self,
        key: &LeaseKey,
        bucket_start: DateTime<Utc>,
    ) -> LeaseResult<bool> {
        match self.store.last_modified(key.container(), key.name()).await {
            Ok(last_modified) => Ok(last_modified >= bucket_start),
            Err(error) if error.is_not_found() => Ok(false),
            Err(error) => Err(LeaseError::Store(error)),
        }
    }

    async fn force_release(&self, key: &LeaseKey, token: &fleetcoord_blobstore::LeaseToken) {
        if let Err(error) = self
            .store
            .release_lease(key.container(), key.name(), token)
            .await
        {
            warn!(lease = %key, %error, "failed to release backed-out claim lease");
        }
    }
}

/// Start of the claim bucket containing `now`.
///
/// Buckets are aligned to UTC midnight: with a period of one hour a call at
/// 5:43:20 maps to 5:00:00, and with a period of twenty minutes to 5:40:00.
pub fn claim_bucket_start(now: DateTime<Utc>, period: Duration) -> LeaseResult<DateTime<Utc>> {
    let period_secs = period.as_secs() as i64;
    if period_secs == 0 {
        return Err(LeaseError::InvalidClaimPeriod(
            "claim period must be at least one second".to_string(),
        ));
    }
    if period_secs > 86_400 {
        return Err(LeaseError::InvalidClaimPeriod(
            "claim period must not exceed one day".to_string(),
        ));
    }

    let midnight = now.date_naive().and_time(NaiveTime::MIN).and_utc();
    let secs_since_midnight = (now - midnight).num_seconds();
    let bucket_offset = (secs_since_midnight / period_secs) * period_secs;
    Ok(midnight + chrono::Duration::seconds(bucket_offset))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use fleetcoord_blobstore::MemoryBlobLeaseStore;

    const HOUR: Duration = Duration::from_secs(3600);

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 12, h, m, s).unwrap()
    }

    #[test]
    fn test_bucket_start_rounds_down_to_period() {
        let start = claim_bucket_start(at(5, 43, 20), HOUR).unwrap();
        assert_eq!(start, at(5, 0, 0));

        let start = claim_bucket_start(at(5, 43, 20), Duration::from_secs(1200)).unwrap();
        assert_eq!(start, at(5, 40, 0));
    }

    #[test]
    fn test_bucket_boundaries() {
        let before = claim_bucket_start(at(5, 59, 59), HOUR).unwrap();
        let after = claim_bucket_start(at(6, 0, 1), HOUR).unwrap();
        assert_eq!(before, at(5, 0, 0));
        assert_eq!(after, at(6, 0, 0));
        assert_ne!(before, after);
    }

    #[test]
    fn test_daily_bucket_is_midnight() {
        let start = claim_bucket_start(at(23, 59, 0), Duration::from_secs(86_400)).unwrap();
        assert_eq!(start, at(0, 0, 0));
    }

    #[test]
    fn test_zero_period_rejected() {
        let result = claim_bucket_start(at(5, 0, 0), Duration::ZERO);
        assert!(matches!(result, Err(LeaseError::InvalidClaimPeriod(_))));
    }

    #[test]
    fn test_multi_day_period_rejected() {
        let result = claim_bucket_start(at(5, 0, 0), Duration::from_secs(2 * 86_400));
        assert!(matches!(result, Err(LeaseError::InvalidClaimPeriod(_))));
    }

    fn claimed_over(store: &Arc<MemoryBlobLeaseStore>) -> ClaimedDistributedLease {
        ClaimedDistributedLease::new(Arc::clone(store) as Arc<dyn BlobLeaseStore>)
    }

    #[tokio::test]
    async fn test_first_claim_wins_bucket() {
        let store = Arc::new(MemoryBlobLeaseStore::new());
        let leases = claimed_over(&store);

        let first = leases.obtain("jobs", "hourly-report", HOUR).await.unwrap();
        let guard = first.acquired().expect("first claim should win");
        guard.release().await;

        // Same bucket, same process: already claimed.
        let second = leases.obtain("jobs", "hourly-report", HOUR).await.unwrap();
        assert!(second.is_contested());
    }

    #[tokio::test]
    async fn test_claim_idempotent_across_processes() {
        let store = Arc::new(MemoryBlobLeaseStore::new());
        let process_a = claimed_over(&store);
        let process_b = claimed_over(&store);

        let won = process_a.obtain("jobs", "hourly-report", HOUR).await.unwrap();
        won.acquired().unwrap().release().await;

        let lost = process_b.obtain("jobs", "hourly-report", HOUR).await.unwrap();
        assert!(lost.is_contested());
    }

    #[tokio::test]
    async fn test_claim_contested_while_lease_held() {
        let store = Arc::new(MemoryBlobLeaseStore::new());
        let process_a = claimed_over(&store);
        let process_b = claimed_over(&store);

        let held = process_a
            .obtain("jobs", "hourly-report", HOUR)
            .await
            .unwrap()
            .acquired()
            .unwrap();

        let contested = process_b.obtain("jobs", "hourly-report", HOUR).await.unwrap();
        assert!(contested.is_contested());

        held.release().await;
    }

    #[tokio::test]
    async fn test_new_bucket_reopens_claim() {
        let store = Arc::new(MemoryBlobLeaseStore::new());
        let leases = claimed_over(&store);
        let period = Duration::from_secs(1);

        let first = leases.obtain("jobs", "fast-job", period).await.unwrap();
        first.acquired().unwrap().release().await;

        // Wait until the next one-second bucket opens.
        let now = Utc::now();
        let bucket = claim_bucket_start(now, period).unwrap();
        let next_bucket = bucket + chrono::Duration::seconds(1);
        let wait = (next_bucket - now).num_milliseconds().max(0) as u64 + 50;
        tokio::time::sleep(Duration::from_millis(wait)).await;

        let second = leases.obtain("jobs", "fast-job", period).await.unwrap();
        assert!(!second.is_contested());
        second.acquired().unwrap().release().await;
    }

    #[tokio::test]
    async fn test_dropped_guard_writes_no_claim_record() {
        // The claim record is written only on release; a guard dropped
        // without releasing (simulating a crash) frees the lease best-effort
        // but leaves last-modified untouched.
        let store = Arc::new(MemoryBlobLeaseStore::new());
        let leases = claimed_over(&store);

        let guard = leases
            .obtain("jobs", "hourly-report", HOUR)
            .await
            .unwrap()
            .acquired()
            .unwrap();

        // Pre-drop last-modified is the provisioning write.
        let before = store.last_modified("jobs", "hourly-report").await.unwrap();
        drop(guard);
        tokio::time::sleep(Duration::from_millis(50)).await;

        let after = store.last_modified("jobs", "hourly-report").await.unwrap();
        assert_eq!(before, after);
    }
}
