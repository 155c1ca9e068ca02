// ABOUTME: In-memory secret store with LRU eviction and TTL support
// ABOUTME: Single-node backend for tests and local development
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2026 Crewmatch

use super::{BucketDecision, SecretStore, StoreConfig, StoreKey};
use crate::errors::AppResult;
use lru::LruCache;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use subtle::ConstantTimeEq;
use tokio::sync::{Mutex, RwLock};

/// In-memory entry with expiration
#[derive(Debug, Clone)]
struct StoreEntry {
    value: String,
    expires_at: Instant,
}

impl StoreEntry {
    fn new(value: String, ttl: Duration) -> Self {
        Self {
            value,
            expires_at: Instant::now() + ttl,
        }
    }

    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }

    fn remaining_ttl(&self) -> Option<Duration> {
        self.expires_at.checked_duration_since(Instant::now())
    }
}

/// Token bucket state for one scope/client pair
#[derive(Debug, Clone, Copy)]
struct BucketState {
    tokens: f64,
    last_refill: f64,
}

/// In-memory secret store with LRU eviction and background cleanup
///
/// `Arc<RwLock<LruCache>>` shares state between store operations and the
/// cleanup task spawned in [`InMemorySecretStore::new`]. Buckets live under a
/// separate mutex so one lock acquisition covers the whole
/// read-refill-spend-write sequence, matching the atomicity the Redis
/// backend gets from its Lua script.
#[derive(Clone)]
pub struct InMemorySecretStore {
    entries: Arc<RwLock<LruCache<String, StoreEntry>>>,
    buckets: Arc<Mutex<HashMap<String, BucketState>>>,
    shutdown_tx: Option<Arc<tokio::sync::mpsc::Sender<()>>>,
}

impl InMemorySecretStore {
    /// Default capacity when config specifies zero entries
    const DEFAULT_CAPACITY: NonZeroUsize = match NonZeroUsize::new(10_000) {
        Some(n) => n,
        None => unreachable!(),
    };

    /// Create a new in-memory store with optional background cleanup task
    #[must_use]
    pub fn new(config: &StoreConfig) -> Self {
        // LruCache requires NonZeroUsize for capacity
        let capacity = NonZeroUsize::new(config.max_entries).unwrap_or(Self::DEFAULT_CAPACITY);

        let entries = Arc::new(RwLock::new(LruCache::new(capacity)));
        let buckets = Arc::new(Mutex::new(HashMap::new()));

        let shutdown_tx = if config.enable_background_cleanup {
            let (shutdown_tx, mut shutdown_rx) = tokio::sync::mpsc::channel::<()>(1);
            let entries_clone = entries.clone();
            let cleanup_interval = config.cleanup_interval;

            tokio::spawn(async move {
                let mut interval = tokio::time::interval(cleanup_interval);
                loop {
                    tokio::select! {
                        _ = interval.tick() => {
                            Self::cleanup_expired(&entries_clone).await;
                        }
                        _ = shutdown_rx.recv() => {
                            tracing::debug!("Store cleanup task received shutdown signal");
                            break;
                        }
                    }
                }
            });

            Some(Arc::new(shutdown_tx))
        } else {
            None
        };

        Self {
            entries,
            buckets,
            shutdown_tx,
        }
    }

    /// Remove all expired entries
    async fn cleanup_expired(entries: &Arc<RwLock<LruCache<String, StoreEntry>>>) {
        let mut guard = entries.write().await;

        // Collect expired keys first (can't modify while iterating)
        let expired_keys: Vec<String> = guard
            .iter()
            .filter_map(|(k, v)| v.is_expired().then(|| k.clone()))
            .collect();

        for key in &expired_keys {
            guard.pop(key);
        }

        let removed = expired_keys.len();
        drop(guard);
        if removed > 0 {
            tracing::debug!("Cleaned up {} expired store entries", removed);
        }
    }
}

#[async_trait::async_trait]
impl SecretStore for InMemorySecretStore {
    async fn put(&self, key: &StoreKey, value: &str, ttl: Duration) -> AppResult<()> {
        let entry = StoreEntry::new(value.to_owned(), ttl);

        // LruCache handles eviction automatically on push
        self.entries.write().await.push(key.to_string(), entry);

        Ok(())
    }

    async fn fetch(&self, key: &StoreKey) -> AppResult<Option<String>> {
        let mut entries = self.entries.write().await;

        // LruCache::get is mutable (updates access order)
        if let Some(entry) = entries.get(&key.to_string()) {
            if entry.is_expired() {
                entries.pop(&key.to_string());
                drop(entries);
                return Ok(None);
            }

            let value = entry.value.clone();
            drop(entries);
            return Ok(Some(value));
        }
        drop(entries);

        Ok(None)
    }

    async fn take(&self, key: &StoreKey) -> AppResult<Option<String>> {
        let mut entries = self.entries.write().await;

        // Pop under one write lock so exactly one caller wins
        match entries.pop(&key.to_string()) {
            Some(entry) if !entry.is_expired() => {
                drop(entries);
                Ok(Some(entry.value))
            }
            _ => {
                drop(entries);
                Ok(None)
            }
        }
    }

    async fn remove_if_matches(&self, key: &StoreKey, expected: &str) -> AppResult<bool> {
        let mut entries = self.entries.write().await;

        // Compare and pop under one write lock so exactly one caller wins
        let matches = match entries.peek(&key.to_string()) {
            Some(entry) if !entry.is_expired() => {
                entry.value.as_bytes().ct_eq(expected.as_bytes()).unwrap_u8() == 1
            }
            _ => false,
        };
        if matches {
            entries.pop(&key.to_string());
        }
        drop(entries);

        Ok(matches)
    }

    async fn put_if_absent(&self, key: &StoreKey, value: &str, ttl: Duration) -> AppResult<bool> {
        let mut entries = self.entries.write().await;

        let live = entries
            .peek(&key.to_string())
            .is_some_and(|entry| !entry.is_expired());
        if live {
            drop(entries);
            return Ok(false);
        }

        entries.push(key.to_string(), StoreEntry::new(value.to_owned(), ttl));
        drop(entries);

        Ok(true)
    }

    async fn remove(&self, key: &StoreKey) -> AppResult<()> {
        self.entries.write().await.pop(&key.to_string());
        Ok(())
    }

    async fn exists(&self, key: &StoreKey) -> AppResult<bool> {
        let mut entries = self.entries.write().await;

        if let Some(entry) = entries.get(&key.to_string()) {
            if entry.is_expired() {
                entries.pop(&key.to_string());
                drop(entries);
                return Ok(false);
            }
            drop(entries);
            return Ok(true);
        }
        drop(entries);

        Ok(false)
    }

    async fn ttl(&self, key: &StoreKey) -> AppResult<Option<Duration>> {
        let entries = self.entries.write().await;

        // Peek avoids updating LRU order
        if let Some(entry) = entries.peek(&key.to_string()) {
            if entry.is_expired() {
                return Ok(None);
            }
            let ttl = entry.remaining_ttl();
            drop(entries);
            return Ok(ttl);
        }

        Ok(None)
    }

    async fn consume_bucket_token(
        &self,
        key: &StoreKey,
        capacity: u32,
        refill_per_sec: f64,
        now: f64,
    ) -> AppResult<BucketDecision> {
        let mut buckets = self.buckets.lock().await;

        let state = buckets
            .entry(key.to_string())
            .or_insert_with(|| BucketState {
                tokens: f64::from(capacity),
                last_refill: now,
            });

        let elapsed = (now - state.last_refill).max(0.0);
        state.tokens = f64::from(capacity).min(state.tokens + elapsed * refill_per_sec);
        state.last_refill = now;

        let allowed = state.tokens >= 1.0;
        if allowed {
            state.tokens -= 1.0;
        }
        let tokens_remaining = state.tokens;
        drop(buckets);

        Ok(BucketDecision {
            allowed,
            tokens_remaining,
        })
    }

    async fn health_check(&self) -> AppResult<()> {
        // In-memory store is always healthy
        Ok(())
    }

    async fn clear_all(&self) -> AppResult<()> {
        self.entries.write().await.clear();
        self.buckets.lock().await.clear();
        Ok(())
    }
}

impl Drop for InMemorySecretStore {
    fn drop(&mut self) {
        // Signal the cleanup task to shut down once all clones are gone.
        // Errors are expected if the channel is already closed.
        if let Some(tx) = &self.shutdown_tx {
            if let Err(e) = tx.try_send(()) {
                tracing::debug!(error = ?e, "Store shutdown signal send failed (channel likely closed)");
            }
        }
    }
}
