// ABOUTME: Factory for constructing the configured secret store backend
// ABOUTME: Dispatches between Redis (multi-instance) and in-memory (single-node) stores
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2026 Crewmatch

use super::memory::InMemorySecretStore;
use super::redis::RedisSecretStore;
use super::{SecretStore, StoreConfig};
use crate::errors::{AppError, AppResult};
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

/// Available secret store backends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    /// Shared Redis instance, required for multi-instance deployments
    Redis,
    /// Process-local store for tests and single-node development
    Memory,
}

impl FromStr for StoreBackend {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "redis" => Ok(Self::Redis),
            "memory" | "in-memory" => Ok(Self::Memory),
            other => Err(AppError::config(format!(
                "Unknown store backend '{other}' (expected 'redis' or 'memory')"
            ))),
        }
    }
}

/// Create the secret store for the given backend
///
/// # Errors
///
/// Returns an error if the backend fails to initialize (e.g. Redis is
/// unreachable after all connection retries)
pub async fn create_store(
    backend: StoreBackend,
    config: &StoreConfig,
) -> AppResult<Arc<dyn SecretStore>> {
    match backend {
        StoreBackend::Redis => {
            let store = RedisSecretStore::new(config).await?;
            info!("Secret store backend: redis");
            Ok(Arc::new(store))
        }
        StoreBackend::Memory => {
            info!("Secret store backend: in-memory (single node only)");
            Ok(Arc::new(InMemorySecretStore::new(config)))
        }
    }
}
