// ABOUTME: Integration tests for the email/password credential flows
// ABOUTME: Registration, OTP verification, login, refresh, and profile lookup
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2026 Crewmatch

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use common::{extract_otp, harness};
use crewmatch_auth::errors::{AppResult, ErrorCode};
use crewmatch_auth::notifications::Notifier;
use crewmatch_auth::services::CredentialService;
use crewmatch_auth::store::{BucketDecision, SecretStore, StoreKey};
use crewmatch_auth::tokens::{TokenCodec, TokenPurpose};
use std::sync::Arc;
use std::time::Duration;

const EMAIL: &str = "sam@example.com";
const PASSWORD: &str = "correct-horse-battery";

/// Store double that delays every call, the way a remote backend would.
/// Widens the window between store round trips so concurrent flows
/// actually interleave on the test runtime.
struct HighLatencyStore {
    inner: Arc<dyn SecretStore>,
}

impl HighLatencyStore {
    async fn pause() {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

#[async_trait::async_trait]
impl SecretStore for HighLatencyStore {
    async fn put(&self, key: &StoreKey, value: &str, ttl: Duration) -> AppResult<()> {
        Self::pause().await;
        self.inner.put(key, value, ttl).await
    }

    async fn fetch(&self, key: &StoreKey) -> AppResult<Option<String>> {
        Self::pause().await;
        self.inner.fetch(key).await
    }

    async fn take(&self, key: &StoreKey) -> AppResult<Option<String>> {
        Self::pause().await;
        self.inner.take(key).await
    }

    async fn remove_if_matches(&self, key: &StoreKey, expected: &str) -> AppResult<bool> {
        Self::pause().await;
        self.inner.remove_if_matches(key, expected).await
    }

    async fn put_if_absent(&self, key: &StoreKey, value: &str, ttl: Duration) -> AppResult<bool> {
        Self::pause().await;
        self.inner.put_if_absent(key, value, ttl).await
    }

    async fn remove(&self, key: &StoreKey) -> AppResult<()> {
        Self::pause().await;
        self.inner.remove(key).await
    }

    async fn exists(&self, key: &StoreKey) -> AppResult<bool> {
        Self::pause().await;
        self.inner.exists(key).await
    }

    async fn ttl(&self, key: &StoreKey) -> AppResult<Option<Duration>> {
        Self::pause().await;
        self.inner.ttl(key).await
    }

    async fn consume_bucket_token(
        &self,
        key: &StoreKey,
        capacity: u32,
        refill_per_sec: f64,
        now: f64,
    ) -> AppResult<BucketDecision> {
        Self::pause().await;
        self.inner
            .consume_bucket_token(key, capacity, refill_per_sec, now)
            .await
    }

    async fn health_check(&self) -> AppResult<()> {
        self.inner.health_check().await
    }

    async fn clear_all(&self) -> AppResult<()> {
        self.inner.clear_all().await
    }
}

#[tokio::test]
async fn test_full_registration_and_login_flow() {
    let h = harness().await;

    h.resources
        .credentials
        .register(EMAIL, PASSWORD, Some("Sam"))
        .await
        .unwrap();

    // Login before verification is refused even with the right password
    let err = h
        .resources
        .credentials
        .login(EMAIL, PASSWORD)
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::NotVerified);

    let code = extract_otp(&h.notifier.last_message_to(EMAIL).unwrap());
    let tokens = h
        .resources
        .credentials
        .verify_otp(EMAIL, &code)
        .await
        .unwrap();

    // Post-verification session carries the longer access lifetime
    assert_eq!(tokens.expires_in, 120 * 60);
    assert_eq!(tokens.token_type, "Bearer");

    let profile = h
        .resources
        .credentials
        .me(&tokens.access_token)
        .await
        .unwrap();
    assert_eq!(profile.email, EMAIL);
    assert_eq!(profile.name.as_deref(), Some("Sam"));

    // Regular login hands out the standard lifetime
    let tokens = h.resources.credentials.login(EMAIL, PASSWORD).await.unwrap();
    assert_eq!(tokens.expires_in, 30 * 60);
}

#[tokio::test]
async fn test_login_failures_are_indistinguishable() {
    let h = harness().await;
    h.resources
        .credentials
        .register(EMAIL, PASSWORD, None)
        .await
        .unwrap();
    let code = extract_otp(&h.notifier.last_message_to(EMAIL).unwrap());
    h.resources
        .credentials
        .verify_otp(EMAIL, &code)
        .await
        .unwrap();

    let wrong_password = h
        .resources
        .credentials
        .login(EMAIL, "wrong-password-123")
        .await
        .unwrap_err();
    let unknown_address = h
        .resources
        .credentials
        .login("nobody@example.com", PASSWORD)
        .await
        .unwrap_err();

    assert_eq!(wrong_password.code, ErrorCode::InvalidCredentials);
    assert_eq!(unknown_address.code, wrong_password.code);
    assert_eq!(unknown_address.message, wrong_password.message);
}

#[tokio::test]
async fn test_wrong_otp_rejected_and_code_single_use() {
    let h = harness().await;
    h.resources
        .credentials
        .register(EMAIL, PASSWORD, None)
        .await
        .unwrap();
    let code = extract_otp(&h.notifier.last_message_to(EMAIL).unwrap());

    let err = h
        .resources
        .credentials
        .verify_otp(EMAIL, "000000")
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::OtpInvalid);

    h.resources
        .credentials
        .verify_otp(EMAIL, &code)
        .await
        .unwrap();

    // The code is consumed on success
    let err = h
        .resources
        .credentials
        .verify_otp(EMAIL, &code)
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::OtpInvalid);
}

#[tokio::test]
async fn test_concurrent_otp_verification_has_one_winner() {
    let h = harness().await;
    let credentials = CredentialService::new(
        h.database.clone(),
        Arc::new(HighLatencyStore {
            inner: Arc::clone(&h.store),
        }),
        Arc::new(TokenCodec::new(common::TEST_JWT_SECRET.as_bytes(), None)),
        Arc::clone(&h.notifier) as Arc<dyn Notifier>,
    );

    credentials.register(EMAIL, PASSWORD, None).await.unwrap();
    let code = extract_otp(&h.notifier.last_message_to(EMAIL).unwrap());

    // Two racing submissions of the correct code; consumption is one
    // atomic store operation, so exactly one may activate a session
    let (first, second) = tokio::join!(
        credentials.verify_otp(EMAIL, &code),
        credentials.verify_otp(EMAIL, &code),
    );

    let wins = usize::from(first.is_ok()) + usize::from(second.is_ok());
    assert_eq!(wins, 1, "the code verified {wins} times");
    let loser = first.err().or_else(|| second.err()).unwrap();
    assert_eq!(loser.code, ErrorCode::OtpInvalid);
}

#[tokio::test]
async fn test_reregistration_of_unverified_account_is_a_retry() {
    let h = harness().await;
    h.resources
        .credentials
        .register(EMAIL, PASSWORD, None)
        .await
        .unwrap();
    let first_code = extract_otp(&h.notifier.last_message_to(EMAIL).unwrap());

    // Second registration replaces the password and reissues a code
    h.resources
        .credentials
        .register(EMAIL, "a-different-password", None)
        .await
        .unwrap();

    // The reissued code supersedes the first one
    let err = h
        .resources
        .credentials
        .verify_otp(EMAIL, &first_code)
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::OtpInvalid);

    let code = extract_otp(&h.notifier.last_message_to(EMAIL).unwrap());
    h.resources
        .credentials
        .verify_otp(EMAIL, &code)
        .await
        .unwrap();

    h.resources
        .credentials
        .login(EMAIL, "a-different-password")
        .await
        .unwrap();
    assert_eq!(
        h.resources
            .credentials
            .login(EMAIL, PASSWORD)
            .await
            .unwrap_err()
            .code,
        ErrorCode::InvalidCredentials
    );
}

#[tokio::test]
async fn test_registration_of_verified_account_conflicts() {
    let h = harness().await;
    h.resources
        .credentials
        .register(EMAIL, PASSWORD, None)
        .await
        .unwrap();
    let code = extract_otp(&h.notifier.last_message_to(EMAIL).unwrap());
    h.resources
        .credentials
        .verify_otp(EMAIL, &code)
        .await
        .unwrap();

    let err = h
        .resources
        .credentials
        .register(EMAIL, PASSWORD, None)
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::EmailAlreadyRegistered);
}

#[tokio::test]
async fn test_resend_otp_rules() {
    let h = harness().await;

    // Unknown address
    let err = h
        .resources
        .credentials
        .resend_otp("nobody@example.com")
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::UserNotFound);

    h.resources
        .credentials
        .register(EMAIL, PASSWORD, None)
        .await
        .unwrap();

    // Cooldown from registration's own send is still active
    let err = h.resources.credentials.resend_otp(EMAIL).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::RateLimited);

    let code = extract_otp(&h.notifier.last_message_to(EMAIL).unwrap());
    h.resources
        .credentials
        .verify_otp(EMAIL, &code)
        .await
        .unwrap();

    // Verified accounts have nothing to resend
    let err = h.resources.credentials.resend_otp(EMAIL).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::EmailAlreadyVerified);
}

#[tokio::test]
async fn test_refresh_requires_refresh_purpose() {
    let h = harness().await;
    h.resources
        .credentials
        .register(EMAIL, PASSWORD, None)
        .await
        .unwrap();
    let code = extract_otp(&h.notifier.last_message_to(EMAIL).unwrap());
    let tokens = h
        .resources
        .credentials
        .verify_otp(EMAIL, &code)
        .await
        .unwrap();

    let refreshed = h
        .resources
        .credentials
        .refresh(&tokens.refresh_token)
        .await
        .unwrap();
    h.resources
        .codec
        .verify(&refreshed.access_token, TokenPurpose::Access)
        .unwrap();

    // An access token cannot stand in for a refresh token
    let err = h
        .resources
        .credentials
        .refresh(&tokens.access_token)
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::TokenPurposeMismatch);
}

#[tokio::test]
async fn test_register_input_validation() {
    let h = harness().await;

    let err = h
        .resources
        .credentials
        .register("not-an-email", PASSWORD, None)
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidInput);

    let err = h
        .resources
        .credentials
        .register(EMAIL, "short", None)
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidInput);
}
