// ABOUTME: Password-reset service
// ABOUTME: Forgot-password token issuance and single-use reset enforcement
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2026 Crewmatch

use crate::database::Database;
use crate::errors::{AppError, AppResult};
use crate::notifications::{password_reset_email, Notifier};
use crate::store::{SecretStore, StoreKey};
use crate::tokens::{lifetimes, signature_digest, TokenCodec, TokenPurpose};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

const MIN_PASSWORD_LEN: usize = 8;

/// Password-reset service
pub struct PasswordResetService {
    database: Database,
    store: Arc<dyn SecretStore>,
    codec: Arc<TokenCodec>,
    notifier: Arc<dyn Notifier>,
}

impl PasswordResetService {
    /// Wire up the password-reset service
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

    /// Issue a reset token and mail it, if the account exists
    ///
    /// Always succeeds with the same generic outcome. An unknown address
    /// and a notifier failure both stay silent so the endpoint reveals
    /// nothing about which addresses are registered.
    ///
    /// # Errors
    ///
    /// Returns an error only for database or token-issuance failures
    pub async fn forgot_password(&self, email: &str) -> AppResult<()> {
        let email = email.trim().to_lowercase();

        let Some(account) = self.database.account_by_email(&email).await? else {
            info!(email = %email, "Password reset requested for unknown address");
            return Ok(());
        };

        let token = self.codec.issue(
            account.id,
            &account.email,
            TokenPurpose::PasswordReset,
            lifetimes::password_reset(),
        )?;

        if let Err(e) = self
            .notifier
            .send_email(&password_reset_email(&account.email, &token))
            .await
        {
            warn!(email = %email, error = %e, "Password reset email failed to send");
        }

        Ok(())
    }

    /// Set a new password from a reset token, consuming the token
    ///
    /// The consumed-token marker is claimed with an atomic set-if-absent
    /// before any account change, keyed by the token's signature digest and
    /// living for the token's remaining validity. Of concurrent submissions
    /// of the same token, exactly one proceeds, even across server
    /// instances.
    ///
    /// # Errors
    ///
    /// Returns a token error for a bad or reused token and `InvalidInput`
    /// for a short password
    pub async fn reset_password(&self, token: &str, new_password: &str) -> AppResult<()> {
        if new_password.len() < MIN_PASSWORD_LEN {
            return Err(AppError::invalid_input(format!(
                "Password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }

        let claims = self.codec.verify(token, TokenPurpose::PasswordReset)?;

        // Marker lives exactly as long as the token could still verify
        let digest = signature_digest(token);
        let used_key = StoreKey::ResetTokenUsed { digest };
        let remaining = (claims.exp - Utc::now().timestamp()).max(1);
        let claimed = self
            .store
            .put_if_absent(&used_key, "1", Duration::from_secs(remaining.unsigned_abs()))
            .await?;
        if !claimed {
            warn!(email = %claims.email, "Reused password reset token rejected");
            return Err(AppError::new(
                crate::errors::ErrorCode::TokenInvalid,
                "Reset token has already been used",
            ));
        }

        let account_id = claims.account_id()?;
        let password = new_password.to_owned();
        let password_hash =
            tokio::task::spawn_blocking(move || bcrypt::hash(password, bcrypt::DEFAULT_COST))
                .await
                .map_err(|e| AppError::internal(format!("Hashing task failed: {e}")))?
                .map_err(|e| AppError::internal(format!("Password hashing failed: {e}")))?;

        self.database
            .update_password_hash(account_id, &password_hash)
            .await?;

        info!(email = %claims.email, "Password reset completed");
        Ok(())
    }
}
