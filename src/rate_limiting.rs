// ABOUTME: Rate limiting guard for public endpoint throttling
// ABOUTME: Implements token bucket policies evaluated atomically in the secret store
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2026 Crewmatch

//! # Rate Limiter Guard
//!
//! Token buckets keyed by `(scope, client identity)`. Each check is one
//! atomic round trip to the secret store; the refreshed bucket state
//! persists whether the request is admitted or denied.

use crate::errors::{AppError, AppResult};
use crate::store::{SecretStore, StoreKey};
use chrono::Utc;
use std::sync::Arc;

/// Token bucket parameters for one endpoint class
#[derive(Debug, Clone, Copy)]
pub struct RateLimitPolicy {
    /// Scope name, part of the bucket key
    pub scope: &'static str,
    /// Burst ceiling
    pub capacity: u32,
    /// Sustained rate in tokens per second
    pub refill_per_sec: f64,
}

/// Policies per endpoint class
///
/// Public auth endpoints get tight buckets since each admitted request
/// costs a bcrypt verification, an email dispatch, or an upstream provider
/// round trip.
pub mod policies {
    use super::RateLimitPolicy;

    /// Account registration
    pub const REGISTER: RateLimitPolicy = RateLimitPolicy {
        scope: "register",
        capacity: 5,
        refill_per_sec: 0.1,
    };

    /// Password login
    pub const LOGIN: RateLimitPolicy = RateLimitPolicy {
        scope: "login",
        capacity: 10,
        refill_per_sec: 0.2,
    };

    /// OTP verification attempts
    pub const VERIFY_OTP: RateLimitPolicy = RateLimitPolicy {
        scope: "verify_otp",
        capacity: 5,
        refill_per_sec: 0.1,
    };

    /// OTP resend requests (the per-email cooldown gate applies on top)
    pub const RESEND_OTP: RateLimitPolicy = RateLimitPolicy {
        scope: "resend_otp",
        capacity: 3,
        refill_per_sec: 0.05,
    };

    /// Forgot-password requests
    pub const FORGOT_PASSWORD: RateLimitPolicy = RateLimitPolicy {
        scope: "forgot_password",
        capacity: 5,
        refill_per_sec: 0.1,
    };

    /// Password reset submissions
    pub const RESET_PASSWORD: RateLimitPolicy = RateLimitPolicy {
        scope: "reset_password",
        capacity: 5,
        refill_per_sec: 0.1,
    };

    /// OAuth redirect and callback traffic
    pub const OAUTH: RateLimitPolicy = RateLimitPolicy {
        scope: "oauth",
        capacity: 10,
        refill_per_sec: 0.2,
    };
}

/// Guard consulted as a precondition on public endpoints
#[derive(Clone)]
pub struct RateLimiterGuard {
    store: Arc<dyn SecretStore>,
}

impl RateLimiterGuard {
    /// Create a guard over the shared secret store
    #[must_use]
    pub fn new(store: Arc<dyn SecretStore>) -> Self {
        Self { store }
    }

    /// Admit or reject one request from `client` under `policy`
    ///
    /// # Errors
    ///
    /// Returns [`crate::errors::ErrorCode::RateLimited`] with a retry hint
    /// when the bucket is empty, or a storage error if the store round trip
    /// fails
    pub async fn check(&self, policy: &RateLimitPolicy, client: &str) -> AppResult<()> {
        let key = StoreKey::RateBucket {
            scope: policy.scope.to_owned(),
            client: client.to_owned(),
        };

        let now = Utc::now().timestamp_millis() as f64 / 1000.0;
        let decision = self
            .store
            .consume_bucket_token(&key, policy.capacity, policy.refill_per_sec, now)
            .await?;

        if decision.allowed {
            return Ok(());
        }

        let retry_after_secs =
            ((1.0 - decision.tokens_remaining) / policy.refill_per_sec).ceil().max(1.0) as u64;
        tracing::info!(
            scope = policy.scope,
            client = client,
            retry_after_secs,
            "rate limit exceeded"
        );
        Err(AppError::rate_limited(retry_after_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorCode;
    use crate::store::memory::InMemorySecretStore;
    use crate::store::StoreConfig;

    fn guard() -> RateLimiterGuard {
        let store = InMemorySecretStore::new(&StoreConfig {
            enable_background_cleanup: false,
            ..StoreConfig::default()
        });
        RateLimiterGuard::new(Arc::new(store))
    }

    #[tokio::test]
    async fn test_burst_allowed_then_denied() {
        let guard = guard();

        for _ in 0..policies::LOGIN.capacity {
            guard.check(&policies::LOGIN, "10.0.0.1").await.unwrap();
        }

        let err = guard.check(&policies::LOGIN, "10.0.0.1").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::RateLimited);
        assert!(err.details["retry_after_secs"].as_u64().unwrap() >= 1);
    }

    #[tokio::test]
    async fn test_clients_have_independent_buckets() {
        let guard = guard();

        for _ in 0..policies::RESEND_OTP.capacity {
            guard
                .check(&policies::RESEND_OTP, "10.0.0.1")
                .await
                .unwrap();
        }
        assert!(guard.check(&policies::RESEND_OTP, "10.0.0.1").await.is_err());

        // A different client address is unaffected
        guard
            .check(&policies::RESEND_OTP, "10.0.0.2")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_scopes_have_independent_buckets() {
        let guard = guard();

        for _ in 0..policies::RESEND_OTP.capacity {
            guard
                .check(&policies::RESEND_OTP, "10.0.0.1")
                .await
                .unwrap();
        }

        // Same client, different endpoint class
        guard.check(&policies::LOGIN, "10.0.0.1").await.unwrap();
    }
}
