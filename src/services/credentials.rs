// ABOUTME: Email/password credential flows
// ABOUTME: Registration, OTP verification, login, resend, refresh, and profile lookup
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2026 Crewmatch

use crate::database::Database;
use crate::errors::{AppError, AppResult, ErrorCode};
use crate::models::{Account, UserProfile};
use crate::notifications::{otp_email, Notifier};
use crate::store::{SecretStore, StoreKey};
use crate::tokens::{lifetimes, TokenCodec, TokenPurpose};
use chrono::Duration;
use rand::Rng;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tracing::{info, warn};

/// How long an issued OTP stays valid
const OTP_TTL: StdDuration = StdDuration::from_secs(300);
/// Cooldown before another OTP may be sent to the same address
const OTP_RESEND_COOLDOWN: StdDuration = StdDuration::from_secs(30);
/// Minimum accepted password length
const MIN_PASSWORD_LEN: usize = 8;

/// Access/refresh token pair returned by login, verification, and refresh
#[derive(Debug, Clone, Serialize)]
pub struct SessionTokens {
    /// Bearer token for API access
    pub access_token: String,
    /// Token for minting new access tokens
    pub refresh_token: String,
    /// Token type, always "Bearer"
    pub token_type: &'static str,
    /// Access token lifetime in seconds
    pub expires_in: i64,
}

/// Email/password credential service
pub struct CredentialService {
    database: Database,
    store: Arc<dyn SecretStore>,
    codec: Arc<TokenCodec>,
    notifier: Arc<dyn Notifier>,
}

/// Lowercase and trim an address so lookups and store keys agree
fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn validate_email(email: &str) -> AppResult<()> {
    let at = email.find('@');
    let valid = match at {
        Some(pos) => pos > 0 && email[pos + 1..].contains('.') && !email.ends_with('.'),
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(AppError::invalid_input("Invalid email address"))
    }
}

fn validate_password(password: &str) -> AppResult<()> {
    if password.len() < MIN_PASSWORD_LEN {
        return Err(AppError::invalid_input(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

/// bcrypt is CPU-bound; keep it off the async workers
async fn hash_password(password: String) -> AppResult<String> {
    tokio::task::spawn_blocking(move || bcrypt::hash(password, bcrypt::DEFAULT_COST))
        .await
        .map_err(|e| AppError::internal(format!("Hashing task failed: {e}")))?
        .map_err(|e| AppError::internal(format!("Password hashing failed: {e}")))
}

async fn verify_password(password: String, hash: String) -> AppResult<bool> {
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(|e| AppError::internal(format!("Hashing task failed: {e}")))?
        .map_err(|e| AppError::internal(format!("Password verification failed: {e}")))
}

fn generate_otp() -> String {
    let code: u32 = rand::thread_rng().gen_range(0..1_000_000);
    format!("{code:06}")
}

impl CredentialService {
    /// Wire up the credential service
    #[must_use]
    pub fn new(
        database: Database,
        store: Arc<dyn SecretStore>,
        codec: Arc<TokenCodec>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            database,
            store,
            codec,
            notifier,
        }
    }

    fn issue_session(&self, account: &Account, access_lifetime: Duration) -> AppResult<SessionTokens> {
        let access_token =
            self.codec
                .issue(account.id, &account.email, TokenPurpose::Access, access_lifetime)?;
        let refresh_token = self.codec.issue(
            account.id,
            &account.email,
            TokenPurpose::Refresh,
            lifetimes::refresh(),
        )?;

        Ok(SessionTokens {
            access_token,
            refresh_token,
            token_type: "Bearer",
            expires_in: access_lifetime.num_seconds(),
        })
    }

    /// Issue an OTP, store it, and mail it; the resend cooldown gate is set
    /// alongside
    async fn send_otp(&self, email: &str) -> AppResult<()> {
        let code = generate_otp();
        self.store
            .put(&StoreKey::EmailOtp { email: email.to_owned() }, &code, OTP_TTL)
            .await?;
        self.store
            .put(
                &StoreKey::OtpResendGate { email: email.to_owned() },
                "1",
                OTP_RESEND_COOLDOWN,
            )
            .await?;

        self.notifier.send_email(&otp_email(email, &code)).await?;
        info!(email = %email, "Verification code issued");
        Ok(())
    }

    /// Register a new account and send its verification code
    ///
    /// Registering an address that already holds an unverified account is
    /// treated as a retry: the password hash is refreshed and a fresh code
    /// goes out. A verified account is a conflict.
    ///
    /// # Errors
    ///
    /// Returns `EmailAlreadyRegistered` for a verified duplicate,
    /// `InvalidInput` for a bad email or short password, and
    /// `UpstreamProviderError` when the verification email cannot be sent
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> AppResult<()> {
        let email = normalize_email(email);
        validate_email(&email)?;
        validate_password(password)?;

        let password_hash = hash_password(password.to_owned()).await?;

        match self.database.account_by_email(&email).await? {
            Some(existing) if existing.verified => {
                return Err(AppError::email_already_registered());
            }
            Some(existing) => {
                // Unverified retry: the address is unproven, so the latest
                // registrant owns it
                self.database
                    .update_password_hash(existing.id, &password_hash)
                    .await?;
            }
            None => {
                self.database
                    .create_account(&email, &password_hash, display_name)
                    .await?;
            }
        }

        self.send_otp(&email).await
    }

    /// Verify the emailed code and activate the account
    ///
    /// Compare and removal of the stored code are one atomic store
    /// operation, so a code never verifies twice even under concurrent
    /// attempts against different server instances.
    ///
    /// # Errors
    ///
    /// Returns `OtpInvalid` for a wrong, expired, or absent code
    pub async fn verify_otp(&self, email: &str, code: &str) -> AppResult<SessionTokens> {
        let email = normalize_email(email);

        let key = StoreKey::EmailOtp { email: email.clone() };
        if !self.store.remove_if_matches(&key, code).await? {
            return Err(AppError::otp_invalid());
        }
        self.store
            .remove(&StoreKey::OtpResendGate { email: email.clone() })
            .await?;

        let account = self
            .database
            .account_by_email(&email)
            .await?
            .ok_or_else(AppError::user_not_found)?;
        self.database.mark_verified(account.id).await?;

        info!(email = %email, "Email verified");
        self.issue_session(&account, lifetimes::access_post_verify())
    }

    /// Reissue a verification code for an unverified account
    ///
    /// # Errors
    ///
    /// Returns `UserNotFound` for an unknown address,
    /// `EmailAlreadyVerified` for a verified one, and `RateLimited` while
    /// the resend cooldown is active
    pub async fn resend_otp(&self, email: &str) -> AppResult<()> {
        let email = normalize_email(email);

        let account = self
            .database
            .account_by_email(&email)
            .await?
            .ok_or_else(AppError::user_not_found)?;
        if account.verified {
            return Err(AppError::new(
                ErrorCode::EmailAlreadyVerified,
                "Email is already verified",
            ));
        }

        let gate = StoreKey::OtpResendGate { email: email.clone() };
        if self.store.exists(&gate).await? {
            let retry_after = self
                .store
                .ttl(&gate)
                .await?
                .map_or(OTP_RESEND_COOLDOWN.as_secs(), |d| d.as_secs().max(1));
            warn!(email = %email, "OTP resend inside cooldown window");
            return Err(AppError::rate_limited(retry_after));
        }

        self.send_otp(&email).await
    }

    /// Authenticate with email and password
    ///
    /// Unknown address, passwordless federated account, and wrong password
    /// all produce the same error so the endpoint reveals nothing about
    /// which addresses are registered.
    ///
    /// # Errors
    ///
    /// Returns `InvalidCredentials` on any authentication failure and
    /// `NotVerified` for a correct password on an unverified account
    pub async fn login(&self, email: &str, password: &str) -> AppResult<SessionTokens> {
        let email = normalize_email(email);

        let Some(account) = self.database.account_by_email(&email).await? else {
            return Err(AppError::invalid_credentials());
        };
        let Some(hash) = account.password_hash.clone() else {
            return Err(AppError::invalid_credentials());
        };

        if !verify_password(password.to_owned(), hash).await? {
            return Err(AppError::invalid_credentials());
        }

        if !account.verified {
            return Err(AppError::not_verified());
        }

        info!(email = %email, "Login succeeded");
        self.issue_session(&account, lifetimes::access())
    }

    /// Mint a new access token from a refresh token
    ///
    /// # Errors
    ///
    /// Returns a token error for an invalid, expired, or wrong-purpose
    /// token and `UserNotFound` if the account no longer exists
    pub async fn refresh(&self, refresh_token: &str) -> AppResult<SessionTokens> {
        let claims = self.codec.verify(refresh_token, TokenPurpose::Refresh)?;
        let account = self
            .database
            .account_by_id(claims.account_id()?)
            .await?
            .ok_or_else(AppError::user_not_found)?;

        self.issue_session(&account, lifetimes::access())
    }

    /// Resolve an access token to the account's profile
    ///
    /// # Errors
    ///
    /// Returns a token error for a bad token and `UserNotFound` if the
    /// account no longer exists
    pub async fn me(&self, access_token: &str) -> AppResult<UserProfile> {
        let claims = self.codec.verify(access_token, TokenPurpose::Access)?;
        let account = self
            .database
            .account_by_id(claims.account_id()?)
            .await?
            .ok_or_else(AppError::user_not_found)?;

        Ok(UserProfile::from(&account))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  User@Example.COM "), "user@example.com");
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("user@example.com").is_ok());
        assert!(validate_email("no-at-sign").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("user@nodot").is_err());
    }

    #[test]
    fn test_validate_password_length() {
        assert!(validate_password("12345678").is_ok());
        assert!(validate_password("1234567").is_err());
    }

    #[test]
    fn test_generate_otp_is_six_digits() {
        for _ in 0..50 {
            let code = generate_otp();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }
}
