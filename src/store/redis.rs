// ABOUTME: Redis secret store implementation with connection pooling and TTL support
// ABOUTME: Provides shared secret state for multi-instance deployments
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2026 Crewmatch

use super::{BucketDecision, SecretStore, StoreConfig, StoreKey, KEY_PREFIX};
use crate::config::environment::RedisConnectionConfig;
use crate::errors::{AppError, AppResult};
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::AsyncCommands;
use std::time::Duration;
use tracing::{error, info, warn};

/// Token-bucket evaluation, executed server-side so read-refill-spend-write
/// is one atomic step. Splitting it into separate round trips would let two
/// concurrent requests both observe capacity and both be admitted.
///
/// KEYS[1] bucket key; ARGV: capacity, refill per second, now (epoch secs).
/// Returns {allowed, tokens remaining * 1000}.
const BUCKET_SCRIPT: &str = r"
local key = KEYS[1]
local capacity = tonumber(ARGV[1])
local refill_rate = tonumber(ARGV[2])
local now = tonumber(ARGV[3])

local bucket = redis.call('HMGET', key, 'tokens', 'ts')
local tokens = tonumber(bucket[1])
local ts = tonumber(bucket[2])
if tokens == nil or ts == nil then
  tokens = capacity
  ts = now
end

local elapsed = now - ts
if elapsed < 0 then
  elapsed = 0
end
tokens = math.min(capacity, tokens + elapsed * refill_rate)

local allowed = 0
if tokens >= 1 then
  tokens = tokens - 1
  allowed = 1
end

redis.call('HSET', key, 'tokens', tokens, 'ts', now)
redis.call('EXPIRE', key, math.max(1, math.ceil(capacity / refill_rate) * 2))

return {allowed, math.floor(tokens * 1000)}
";

/// Compare-and-delete, executed server-side so check and removal are one
/// atomic step. A GET/DEL pair would let two concurrent callers both
/// observe the value before either deletes it.
///
/// KEYS[1] entry key; ARGV[1] expected value. Returns 1 on match+delete.
const COMPARE_DELETE_SCRIPT: &str = r"
if redis.call('GET', KEYS[1]) == ARGV[1] then
  redis.call('DEL', KEYS[1])
  return 1
end
return 0
";

/// Redis-backed secret store
///
/// Uses Redis `ConnectionManager` for automatic reconnection. All keys are
/// prefixed with [`KEY_PREFIX`] for namespace isolation. TTLs are enforced
/// by Redis; the token bucket runs as a Lua script for atomicity and the
/// single-use handoff take maps to `GETDEL`.
#[derive(Clone)]
pub struct RedisSecretStore {
    manager: ConnectionManager,
}

impl RedisSecretStore {
    /// Create a new Redis secret store
    ///
    /// # Errors
    ///
    /// Returns an error if the Redis connection fails after all retries
    pub async fn new(config: &StoreConfig) -> AppResult<Self> {
        let redis_url = config
            .redis_url
            .as_ref()
            .ok_or_else(|| AppError::config("Redis URL is required for the Redis store backend"))?;

        let conn_config = &config.redis_connection;

        info!(
            "Connecting to Redis at {} (timeout={}s, response_timeout={}s, retries={})",
            redis_url,
            conn_config.connection_timeout_secs,
            conn_config.response_timeout_secs,
            conn_config.initial_connection_retries
        );

        let client = redis::Client::open(redis_url.as_str())
            .map_err(|e| AppError::storage(format!("Failed to create Redis client: {e}")))?;

        let manager = Self::connect_with_retry(&client, conn_config).await?;

        info!("Successfully connected to Redis");

        Ok(Self { manager })
    }

    /// Connect to Redis with exponential backoff retry on failure
    async fn connect_with_retry(
        client: &redis::Client,
        conn_config: &RedisConnectionConfig,
    ) -> AppResult<ConnectionManager> {
        let manager_config = ConnectionManagerConfig::new()
            .set_connection_timeout(Duration::from_secs(conn_config.connection_timeout_secs))
            .set_response_timeout(Duration::from_secs(conn_config.response_timeout_secs))
            .set_number_of_retries(conn_config.reconnection_retries)
            .set_max_delay(conn_config.max_retry_delay_ms);

        let max_retries = conn_config.initial_connection_retries;
        let max_delay_ms = conn_config.max_retry_delay_ms;

        let mut last_error = None;
        let mut delay_ms = conn_config.initial_retry_delay_ms;

        for attempt in 0..=max_retries {
            match ConnectionManager::new_with_config(client.clone(), manager_config.clone()).await {
                Ok(manager) => {
                    if attempt > 0 {
                        info!("Redis connection established after {} retries", attempt);
                    }
                    return Ok(manager);
                }
                Err(e) => {
                    last_error = Some(e);

                    if attempt < max_retries {
                        warn!(
                            "Redis connection attempt {}/{} failed, retrying in {}ms: {}",
                            attempt + 1,
                            max_retries + 1,
                            delay_ms,
                            last_error
                                .as_ref()
                                .map_or_else(|| "unknown".to_owned(), ToString::to_string)
                        );
                        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                        // Exponential backoff with cap
                        delay_ms = (delay_ms * 2).min(max_delay_ms);
                    }
                }
            }
        }

        Err(AppError::storage(format!(
            "Failed to connect to Redis after {} retries: {}",
            max_retries + 1,
            last_error.map_or_else(|| "unknown error".to_owned(), |e| e.to_string())
        )))
    }

    /// Build full Redis key with namespace prefix
    fn build_key(key: &StoreKey) -> String {
        format!("{KEY_PREFIX}{key}")
    }
}

#[async_trait::async_trait]
impl SecretStore for RedisSecretStore {
    async fn put(&self, key: &StoreKey, value: &str, ttl: Duration) -> AppResult<()> {
        let redis_key = Self::build_key(key);
        let ttl_secs = ttl.as_secs().max(1);

        let mut conn = self.manager.clone();

        // SETEX sets value and expiration in one atomic operation
        conn.set_ex::<_, _, ()>(&redis_key, value, ttl_secs)
            .await
            .map_err(|e| {
                error!("Redis SET operation failed: {}", e);
                AppError::storage(format!("Store error: {e}"))
            })?;

        Ok(())
    }

    async fn fetch(&self, key: &StoreKey) -> AppResult<Option<String>> {
        let redis_key = Self::build_key(key);
        let mut conn = self.manager.clone();

        let value: Option<String> = conn.get(&redis_key).await.map_err(|e| {
            error!("Redis GET operation failed: {}", e);
            AppError::storage(format!("Store error: {e}"))
        })?;

        Ok(value)
    }

    async fn take(&self, key: &StoreKey) -> AppResult<Option<String>> {
        let redis_key = Self::build_key(key);
        let mut conn = self.manager.clone();

        // GETDEL guarantees exactly one consumer observes the value
        let value: Option<String> = redis::cmd("GETDEL")
            .arg(&redis_key)
            .query_async(&mut conn)
            .await
            .map_err(|e| {
                error!("Redis GETDEL operation failed: {}", e);
                AppError::storage(format!("Store error: {e}"))
            })?;

        Ok(value)
    }

    async fn remove_if_matches(&self, key: &StoreKey, expected: &str) -> AppResult<bool> {
        let redis_key = Self::build_key(key);
        let mut conn = self.manager.clone();

        let deleted: i64 = redis::Script::new(COMPARE_DELETE_SCRIPT)
            .key(&redis_key)
            .arg(expected)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| {
                error!("Redis compare-delete script failed: {}", e);
                AppError::storage(format!("Store error: {e}"))
            })?;

        Ok(deleted == 1)
    }

    async fn put_if_absent(&self, key: &StoreKey, value: &str, ttl: Duration) -> AppResult<bool> {
        let redis_key = Self::build_key(key);
        let ttl_secs = ttl.as_secs().max(1);
        let mut conn = self.manager.clone();

        // SET NX EX claims the key and its expiration in one operation
        let claimed: Option<String> = redis::cmd("SET")
            .arg(&redis_key)
            .arg(value)
            .arg("NX")
            .arg("EX")
            .arg(ttl_secs)
            .query_async(&mut conn)
            .await
            .map_err(|e| {
                error!("Redis SET NX operation failed: {}", e);
                AppError::storage(format!("Store error: {e}"))
            })?;

        Ok(claimed.is_some())
    }

    async fn remove(&self, key: &StoreKey) -> AppResult<()> {
        let redis_key = Self::build_key(key);
        let mut conn = self.manager.clone();

        let _: () = conn.del(&redis_key).await.map_err(|e| {
            error!("Redis DEL operation failed: {}", e);
            AppError::storage(format!("Store error: {e}"))
        })?;

        Ok(())
    }

    async fn exists(&self, key: &StoreKey) -> AppResult<bool> {
        let redis_key = Self::build_key(key);
        let mut conn = self.manager.clone();

        let exists: bool = conn.exists(&redis_key).await.map_err(|e| {
            error!("Redis EXISTS operation failed: {}", e);
            AppError::storage(format!("Store error: {e}"))
        })?;

        Ok(exists)
    }

    async fn ttl(&self, key: &StoreKey) -> AppResult<Option<Duration>> {
        let redis_key = Self::build_key(key);
        let mut conn = self.manager.clone();

        let ttl_secs: i64 = conn.ttl(&redis_key).await.map_err(|e| {
            error!("Redis TTL operation failed: {}", e);
            AppError::storage(format!("Store error: {e}"))
        })?;

        // Redis returns -2 if the key doesn't exist, -1 if it has no expiration
        match ttl_secs {
            secs if secs > 0 => Ok(Some(Duration::from_secs(secs as u64))),
            _ => Ok(None),
        }
    }

    async fn consume_bucket_token(
        &self,
        key: &StoreKey,
        capacity: u32,
        refill_per_sec: f64,
        now: f64,
    ) -> AppResult<BucketDecision> {
        let redis_key = Self::build_key(key);
        let mut conn = self.manager.clone();

        let (allowed, tokens_millis): (i64, i64) = redis::Script::new(BUCKET_SCRIPT)
            .key(&redis_key)
            .arg(capacity)
            .arg(refill_per_sec)
            .arg(now)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| {
                error!("Redis bucket script failed: {}", e);
                AppError::storage(format!("Store error: {e}"))
            })?;

        Ok(BucketDecision {
            allowed: allowed == 1,
            tokens_remaining: tokens_millis as f64 / 1000.0,
        })
    }

    async fn health_check(&self) -> AppResult<()> {
        let mut conn = self.manager.clone();

        let response: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| {
                error!("Redis PING failed: {}", e);
                AppError::storage(format!("Store error: {e}"))
            })?;

        if response == "PONG" {
            Ok(())
        } else {
            Err(AppError::storage(format!(
                "Store error: unexpected PING response '{response}'"
            )))
        }
    }

    async fn clear_all(&self) -> AppResult<()> {
        // Clear only keys under our namespace (safe for shared Redis instances)
        let pattern = format!("{KEY_PREFIX}*");

        let mut conn = self.manager.clone();
        let mut cursor = 0u64;

        loop {
            let (new_cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(100)
                .query_async(&mut conn)
                .await
                .map_err(|e| {
                    error!("Redis SCAN failed during clear_all: {}", e);
                    AppError::storage(format!("Store error: {e}"))
                })?;

            if !keys.is_empty() {
                let _: u64 = conn.del(&keys).await.map_err(|e| {
                    error!("Redis DEL failed during clear_all: {}", e);
                    AppError::storage(format!("Store error: {e}"))
                })?;
            }

            cursor = new_cursor;
            if cursor == 0 {
                break;
            }
        }

        Ok(())
    }
}
