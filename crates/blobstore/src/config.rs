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

//! Blob-lease store configuration.

use crate::{BlobLeaseStore, BlobStoreError, BlobStoreResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::sync::Arc;

/// Blob-lease store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlobStoreConfig {
    /// Backend type (memory, sqlite)
    pub backend: String,

    /// Database URL (for the sqlite backend), e.g. `sqlite://leases.db`
    pub database_url: Option<String>,
}

impl Default for BlobStoreConfig {
    fn default() -> Self {
        Self {
            backend: "memory".to_string(),
            database_url: None,
        }
    }
}

impl BlobStoreConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            backend: env::var("FLEETCOORD_BLOBSTORE_BACKEND")
                .unwrap_or_else(|_| "memory".to_string()),
            database_url: env::var("FLEETCOORD_BLOBSTORE_DATABASE_URL").ok(),
        }
    }

    /// Validate configuration.
    pub fn validate(&self) -> BlobStoreResult<()> {
        match self.backend.as_str() {
            "memory" => Ok(()),
            "sqlite" => {
                if self.database_url.is_none() {
                    return Err(BlobStoreError::ConfigError(
                        "database_url is required for the sqlite backend".to_string(),
                    ));
                }
                Ok(())
            }
            other => Err(BlobStoreError::ConfigError(format!(
                "Invalid backend: {}",
                other
            ))),
        }
    }

    /// Connect to the configured backend.
    pub async fn connect(&self) -> BlobStoreResult<Arc<dyn BlobLeaseStore>> {
        self.validate()?;
        match self.backend.as_str() {
            #[cfg(feature = "memory-backend")]
            "memory" => Ok(Arc::new(crate::memory::MemoryBlobLeaseStore::new())),

            #[cfg(feature = "sqlite-backend")]
            "sqlite" => {
                let url = self
                    .database_url
                    .as_deref()
                    .ok_or_else(|| {
                        BlobStoreError::ConfigError(
                            "database_url is required for the sqlite backend".to_string(),
                        )
                    })?;
                Ok(Arc::new(crate::sql::SqliteBlobLeaseStore::new(url).await?))
            }

            other => Err(BlobStoreError::ConfigError(format!(
                "Backend not enabled in this build: {}",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = BlobStoreConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unknown_backend_rejected() {
        let config = BlobStoreConfig {
            backend: "s3".to_string(),
            database_url: None,
        };
        assert!(matches!(
            config.validate(),
            Err(BlobStoreError::ConfigError(_))
        ));
    }

    #[test]
    fn test_sqlite_requires_database_url() {
        let config = BlobStoreConfig {
            backend: "sqlite".to_string(),
            database_url: None,
        };
        assert!(matches!(
            config.validate(),
            Err(BlobStoreError::ConfigError(_))
        ));
    }

    #[tokio::test]
    async fn test_connect_memory() {
        let config = BlobStoreConfig::default();
        let store = config.connect().await.unwrap();
        store.create_container_if_not_exists("leases").await.unwrap();
    }
}
