// ABOUTME: Secret store abstraction for short-lived state with TTL semantics
// ABOUTME: Pluggable backend support (Redis, in-memory) with one atomic scripted primitive
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2026 Crewmatch

//! # Secret Store Adapter
//!
//! All time-boxed secrets (OTPs, resend cooldowns, OAuth state, handoff keys,
//! consumed reset tokens, rate-limit buckets) live behind this trait. Nothing
//! in this crate holds such state in process memory outside the in-memory
//! backend, so multiple server instances stay consistent when Redis backs it.

/// Backend factory
pub mod factory;
/// In-memory secret store implementation
pub mod memory;
/// Redis secret store implementation
pub mod redis;

use crate::errors::AppResult;
use std::fmt;
use std::time::Duration;

/// Namespace prefix applied to every key (safe for shared Redis instances)
pub const KEY_PREFIX: &str = "crewmatch:auth:";

/// Typed key space for the secret store
///
/// Every secret the service stores has a well-known key shape. Constructing
/// keys through this enum keeps the namespaces from colliding and makes the
/// TTL contract of each entry reviewable in one place.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StoreKey {
    /// Pending email verification code, overwritten on reissue
    EmailOtp {
        /// Normalized account email
        email: String,
    },
    /// Cooldown gate blocking OTP resends
    OtpResendGate {
        /// Normalized account email
        email: String,
    },
    /// Anti-CSRF state for a stateful OAuth provider flow
    OauthState {
        /// Opaque state value carried through the provider redirect
        state: String,
    },
    /// Session token parked for the mobile client, consumed exactly once
    HandoffToken {
        /// Opaque handoff key from the deep-link redirect
        key: String,
    },
    /// Account snapshot accompanying a parked session token
    HandoffProfile {
        /// Opaque handoff key from the deep-link redirect
        key: String,
    },
    /// Marker for a consumed single-use password-reset token
    ResetTokenUsed {
        /// Hex digest of the token signature
        digest: String,
    },
    /// Token bucket state for a rate-limit scope and client
    RateBucket {
        /// Endpoint class (e.g. "login")
        scope: String,
        /// Client identity, typically the network address
        client: String,
    },
}

impl fmt::Display for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmailOtp { email } => write!(f, "email_otp:{email}"),
            Self::OtpResendGate { email } => write!(f, "email_otp_resend:{email}"),
            Self::OauthState { state } => write!(f, "oauth_state:{state}"),
            Self::HandoffToken { key } => write!(f, "user_token:{key}"),
            Self::HandoffProfile { key } => write!(f, "user_data:{key}"),
            Self::ResetTokenUsed { digest } => write!(f, "reset_used:{digest}"),
            Self::RateBucket { scope, client } => write!(f, "rate:{scope}:{client}"),
        }
    }
}

/// Outcome of one atomic token-bucket evaluation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BucketDecision {
    /// Whether the request is admitted
    pub allowed: bool,
    /// Tokens remaining after this evaluation (fractional during refill)
    pub tokens_remaining: f64,
}

/// Secret store trait for pluggable backend implementations
///
/// Values are opaque strings; callers serialize structured payloads with
/// `serde_json` before storing. All operations apply [`KEY_PREFIX`].
#[async_trait::async_trait]
pub trait SecretStore: Send + Sync {
    /// Store a value under `key` with the given TTL, overwriting any
    /// previous value and its remaining TTL
    ///
    /// # Errors
    ///
    /// Returns an error if the backend write fails
    async fn put(&self, key: &StoreKey, value: &str, ttl: Duration) -> AppResult<()>;

    /// Fetch the value for `key`, `None` if absent or expired
    ///
    /// # Errors
    ///
    /// Returns an error if the backend read fails
    async fn fetch(&self, key: &StoreKey) -> AppResult<Option<String>>;

    /// Atomically fetch and delete the value for `key`
    ///
    /// Exactly one of several concurrent callers observes the value; the
    /// rest get `None`. Backs single-use handoff key exchange.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend operation fails
    async fn take(&self, key: &StoreKey) -> AppResult<Option<String>>;

    /// Atomically delete `key` when its live value equals `expected`
    ///
    /// Compare and delete happen in one backend step, so of several
    /// concurrent callers presenting the right value exactly one gets
    /// `true`; the rest, and any caller with a wrong value, get `false`
    /// with the entry intact. Backs single-use OTP consumption.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend operation fails
    async fn remove_if_matches(&self, key: &StoreKey, expected: &str) -> AppResult<bool>;

    /// Atomically store `value` under `key` only when no live value exists
    ///
    /// Returns `true` when this caller claimed the key. Backs single-use
    /// markers such as consumed reset tokens.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend write fails
    async fn put_if_absent(&self, key: &StoreKey, value: &str, ttl: Duration) -> AppResult<bool>;

    /// Delete the value for `key` (no-op when absent)
    ///
    /// # Errors
    ///
    /// Returns an error if the backend delete fails
    async fn remove(&self, key: &StoreKey) -> AppResult<()>;

    /// Whether a live value exists for `key`
    ///
    /// # Errors
    ///
    /// Returns an error if the backend read fails
    async fn exists(&self, key: &StoreKey) -> AppResult<bool>;

    /// Remaining TTL for `key`, `None` if absent or expired
    ///
    /// # Errors
    ///
    /// Returns an error if the backend read fails
    async fn ttl(&self, key: &StoreKey) -> AppResult<Option<Duration>>;

    /// Evaluate a token bucket in one atomic round trip
    ///
    /// Reads the bucket at `key`, refills by `refill_per_sec * elapsed`
    /// capped at `capacity`, spends one token when available, and persists
    /// the refreshed state whether or not the request is admitted. `now` is
    /// seconds since the Unix epoch, passed in so both backends and tests
    /// share one clock.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend operation fails
    async fn consume_bucket_token(
        &self,
        key: &StoreKey,
        capacity: u32,
        refill_per_sec: f64,
        now: f64,
    ) -> AppResult<BucketDecision>;

    /// Verify the backend is reachable and healthy
    ///
    /// # Errors
    ///
    /// Returns an error if the health check fails
    async fn health_check(&self) -> AppResult<()>;

    /// Remove every entry under [`KEY_PREFIX`] (testing/admin)
    ///
    /// # Errors
    ///
    /// Returns an error if the clear operation fails
    async fn clear_all(&self) -> AppResult<()>;
}

/// Secret store configuration
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Maximum number of entries (in-memory backend)
    pub max_entries: usize,
    /// Redis connection URL (Redis backend)
    pub redis_url: Option<String>,
    /// Cleanup interval for expired entries (in-memory backend)
    pub cleanup_interval: Duration,
    /// Enable the background cleanup task (disable in tests to avoid
    /// runtime conflicts)
    pub enable_background_cleanup: bool,
    /// Redis connection and retry configuration
    pub redis_connection: crate::config::environment::RedisConnectionConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
            redis_url: None,
            cleanup_interval: Duration::from_secs(60),
            enable_background_cleanup: true,
            redis_connection: crate::config::environment::RedisConnectionConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_key_display() {
        let key = StoreKey::EmailOtp {
            email: "a@b.co".into(),
        };
        assert_eq!(key.to_string(), "email_otp:a@b.co");

        let key = StoreKey::RateBucket {
            scope: "login".into(),
            client: "10.0.0.1".into(),
        };
        assert_eq!(key.to_string(), "rate:login:10.0.0.1");

        let key = StoreKey::HandoffToken { key: "abc".into() };
        assert_eq!(key.to_string(), "user_token:abc");
    }
}
