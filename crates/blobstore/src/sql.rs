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

//! SQL-based blob-lease store implementation (SQLite).
//!
//! This module provides a relational backend for the [`BlobLeaseStore`]
//! trait:
//!
//! - Row-based blobs with the lease columns inline
//! - Conditional `UPDATE`s enforce the lease protocol atomically
//! - Explicit lease expiration semantics (epoch milliseconds)
//! - Schema created lazily on connect
//!
//! PostgreSQL can be added by following the same pattern with a `PgPool`.

use crate::store::{lease_conflict, not_found};
use crate::{BlobLeaseStore, BlobStoreResult, LeaseToken};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use std::time::Duration;
use tracing::instrument;
use ulid::Ulid;

/// SQLite-based blob-lease store.
///
/// Uses a `containers` table and a `blobs` table:
///
/// ```sql
/// CREATE TABLE IF NOT EXISTS blobs (
///   container TEXT NOT NULL,
///   name TEXT NOT NULL,
///   content BLOB NOT NULL,
///   last_modified INTEGER NOT NULL,
///   lease_token TEXT,
///   lease_duration_ms INTEGER,
///   lease_expires_at INTEGER,
///   PRIMARY KEY (container, name)
/// );
/// ```
///
/// `last_modified` and `lease_expires_at` are UNIX epoch milliseconds.
#[derive(Clone)]
pub struct SqliteBlobLeaseStore {
    pool: SqlitePool,
}

impl SqliteBlobLeaseStore {
    /// Create a new SQLite blob-lease store.
    ///
    /// `database_url` is any valid `sqlx` SQLite URL, e.g.:
    /// - `sqlite::memory:` (in-memory)
    /// - `sqlite://leases.db`
    #[instrument(skip(database_url))]
    pub async fn new(database_url: &str) -> BlobStoreResult<Self> {
        let pool = SqlitePool::connect(database_url).await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS containers (
              name TEXT PRIMARY KEY
            );
        "#,
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS blobs (
              container TEXT NOT NULL,
              name TEXT NOT NULL,
              content BLOB NOT NULL,
              last_modified INTEGER NOT NULL,
              lease_token TEXT,
              lease_duration_ms INTEGER,
              lease_expires_at INTEGER,
              PRIMARY KEY (container, name)
            );
        "#,
        )
        .execute(&pool)
        .await?;

        Ok(Self { pool })
    }

    fn now_epoch_ms() -> i64 {
        Utc::now().timestamp_millis()
    }

    /// Distinguish "row missing" from "condition not met" after a
    /// zero-row conditional update.
    async fn classify_miss(
        &self,
        container: &str,
        name: &str,
    ) -> BlobStoreResult<crate::BlobStoreError> {
        let exists = sqlx::query("SELECT 1 FROM blobs WHERE container = ? AND name = ?")
            .bind(container)
            .bind(name)
            .fetch_optional(&self.pool)
            .await?
            .is_some();

        if exists {
            Ok(lease_conflict(container, name))
        } else {
            Ok(not_found(container, name))
        }
    }
}

#[async_trait]
impl BlobLeaseStore for SqliteBlobLeaseStore {
    async fn create_container_if_not_exists(&self, container: &str) -> BlobStoreResult<()> {
        sqlx::query("INSERT OR IGNORE INTO containers (name) VALUES (?)")
            .bind(container)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn create_blob_if_not_exists(
        &self,
        container: &str,
        name: &str,
        initial_content: &[u8],
    ) -> BlobStoreResult<bool> {
        let container_exists =
            sqlx::query("SELECT 1 FROM containers WHERE name = ?")
                .bind(container)
                .fetch_optional(&self.pool)
                .await?
                .is_some();
        if !container_exists {
            return Err(not_found(container, name));
        }

        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO blobs (container, name, content, last_modified)
            VALUES (?, ?, ?, ?)
        "#,
        )
        .bind(container)
        .bind(name)
        .bind(initial_content)
        .bind(Self::now_epoch_ms())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 0)
    }

    #[instrument(skip(self, duration))]
    async fn acquire_lease(
        &self,
        container: &str,
        name: &str,
        duration: Duration,
    ) -> BlobStoreResult<LeaseToken> {
        let now = Self::now_epoch_ms();
        let duration_ms = duration.as_millis() as i64;
        let token = Ulid::new().to_string();

        let result = sqlx::query(
            r#"
            UPDATE blobs
            SET lease_token = ?, lease_duration_ms = ?, lease_expires_at = ?
            WHERE container = ? AND name = ?
              AND (lease_token IS NULL OR lease_expires_at <= ?)
        "#,
        )
        .bind(&token)
        .bind(duration_ms)
        .bind(now + duration_ms)
        .bind(container)
        .bind(name)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(self.classify_miss(container, name).await?);
        }
        Ok(LeaseToken::new(token))
    }

    async fn renew_lease(
        &self,
        container: &str,
        name: &str,
        token: &LeaseToken,
    ) -> BlobStoreResult<()> {
        let now = Self::now_epoch_ms();

        let result = sqlx::query(
            r#"
            UPDATE blobs
            SET lease_expires_at = ? + lease_duration_ms
            WHERE container = ? AND name = ? AND lease_token = ?
        "#,
        )
        .bind(now)
        .bind(container)
        .bind(name)
        .bind(token.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(self.classify_miss(container, name).await?);
        }
        Ok(())
    }

    async fn release_lease(
        &self,
        container: &str,
        name: &str,
        token: &LeaseToken,
    ) -> BlobStoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE blobs
            SET lease_token = NULL, lease_duration_ms = NULL, lease_expires_at = NULL
            WHERE container = ? AND name = ? AND lease_token = ?
        "#,
        )
        .bind(container)
        .bind(name)
        .bind(token.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(self.classify_miss(container, name).await?);
        }
        Ok(())
    }

    async fn last_modified(&self, container: &str, name: &str) -> BlobStoreResult<DateTime<Utc>> {
        let row = sqlx::query("SELECT last_modified FROM blobs WHERE container = ? AND name = ?")
            .bind(container)
            .bind(name)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| not_found(container, name))?;

        let epoch_ms: i64 = row.get("last_modified");
        DateTime::<Utc>::from_timestamp_millis(epoch_ms).ok_or_else(|| {
            crate::BlobStoreError::BackendError(format!(
                "invalid last_modified timestamp: {}",
                epoch_ms
            ))
        })
    }

    async fn write_blob(
        &self,
        container: &str,
        name: &str,
        content: &[u8],
        token: Option<&LeaseToken>,
    ) -> BlobStoreResult<()> {
        let now = Self::now_epoch_ms();

        match token {
            Some(token) => {
                // Fenced write: only while this exact lease is unexpired.
                let result = sqlx::query(
                    r#"
                    UPDATE blobs
                    SET content = ?, last_modified = ?
                    WHERE container = ? AND name = ?
                      AND lease_token = ? AND lease_expires_at > ?
                "#,
                )
                .bind(content)
                .bind(now)
                .bind(container)
                .bind(name)
                .bind(token.as_str())
                .bind(now)
                .execute(&self.pool)
                .await?;

                if result.rows_affected() == 0 {
                    return Err(self.classify_miss(container, name).await?);
                }
                Ok(())
            }
            None => {
                let result = sqlx::query(
                    r#"
                    UPDATE blobs
                    SET content = ?, last_modified = ?
                    WHERE container = ? AND name = ?
                      AND (lease_token IS NULL OR lease_expires_at <= ?)
                "#,
                )
                .bind(content)
                .bind(now)
                .bind(container)
                .bind(name)
                .bind(now)
                .execute(&self.pool)
                .await?;

                if result.rows_affected() > 0 {
                    return Ok(());
                }

                match self.classify_miss(container, name).await? {
                    err @ crate::BlobStoreError::LeaseConflict { .. } => Err(err),
                    _ => {
                        // Blob absent: an unfenced write creates it, provided
                        // the container exists.
                        let container_exists =
                            sqlx::query("SELECT 1 FROM containers WHERE name = ?")
                                .bind(container)
                                .fetch_optional(&self.pool)
                                .await?
                                .is_some();
                        if !container_exists {
                            return Err(not_found(container, name));
                        }
                        sqlx::query(
                            r#"
                            INSERT OR IGNORE INTO blobs (container, name, content, last_modified)
                            VALUES (?, ?, ?, ?)
                        "#,
                        )
                        .bind(container)
                        .bind(name)
                        .bind(content)
                        .bind(now)
                        .execute(&self.pool)
                        .await?;
                        Ok(())
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BlobStoreError;

    const LEASE: Duration = Duration::from_secs(60);

    async fn sqlite_store_with_blob(container: &str, name: &str) -> SqliteBlobLeaseStore {
        let store = SqliteBlobLeaseStore::new("sqlite::memory:").await.unwrap();
        store.create_container_if_not_exists(container).await.unwrap();
        store
            .create_blob_if_not_exists(container, name, b"lock")
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_acquire_lease_is_exclusive() {
        let store = sqlite_store_with_blob("leases", "a").await;

        let _token = store.acquire_lease("leases", "a", LEASE).await.unwrap();
        let second = store.acquire_lease("leases", "a", LEASE).await;
        assert!(matches!(second, Err(BlobStoreError::LeaseConflict { .. })));
    }

    #[tokio::test]
    async fn test_expired_lease_is_acquirable() {
        let store = sqlite_store_with_blob("leases", "a").await;

        let _stale = store
            .acquire_lease("leases", "a", Duration::from_millis(20))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(store.acquire_lease("leases", "a", LEASE).await.is_ok());
    }

    #[tokio::test]
    async fn test_release_then_reacquire() {
        let store = sqlite_store_with_blob("leases", "a").await;

        let token = store.acquire_lease("leases", "a", LEASE).await.unwrap();
        store.release_lease("leases", "a", &token).await.unwrap();
        assert!(store.acquire_lease("leases", "a", LEASE).await.is_ok());
    }

    #[tokio::test]
    async fn test_fenced_write_with_stale_token_fails() {
        let store = sqlite_store_with_blob("leases", "a").await;

        let token = store
            .acquire_lease("leases", "a", Duration::from_millis(20))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let result = store.write_blob("leases", "a", b"late", Some(&token)).await;
        assert!(matches!(result, Err(BlobStoreError::LeaseConflict { .. })));
    }

    #[tokio::test]
    async fn test_write_bumps_last_modified() {
        let store = sqlite_store_with_blob("leases", "a").await;
        let created = store.last_modified("leases", "a").await.unwrap();

        tokio::time::sleep(Duration::from_millis(20)).await;
        store.write_blob("leases", "a", b"touch", None).await.unwrap();

        let modified = store.last_modified("leases", "a").await.unwrap();
        assert!(modified > created);
    }

    #[tokio::test]
    async fn test_create_blob_reports_existence() {
        let store = SqliteBlobLeaseStore::new("sqlite::memory:").await.unwrap();
        store.create_container_if_not_exists("leases").await.unwrap();

        let existed = store
            .create_blob_if_not_exists("leases", "a", b"x")
            .await
            .unwrap();
        assert!(!existed);

        let existed = store
            .create_blob_if_not_exists("leases", "a", b"y")
            .await
            .unwrap();
        assert!(existed);
    }
}
