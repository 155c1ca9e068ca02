// ABOUTME: OAuth federation service
// ABOUTME: Login redirects, callback handling, and single-use mobile handoff
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2026 Crewmatch

use crate::database::Database;
use crate::errors::{AppError, AppResult};
use crate::models::{HandoffPayload, UserProfile};
use crate::oauth::{require_provider, FederationError, OAuthProvider, Provider};
use crate::store::{SecretStore, StoreKey};
use crate::tokens::{lifetimes, TokenCodec, TokenPurpose};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

/// Pending anti-CSRF state lifetime
const STATE_TTL: Duration = Duration::from_secs(600);
/// Window the mobile app has to exchange a handoff key
const HANDOFF_TTL: Duration = Duration::from_secs(120);
/// Lifetime reported to the client for a federated access token, in seconds
const HANDOFF_EXPIRES_IN: u64 = 3600;

/// OAuth federation and handoff service
pub struct FederationService {
    database: Database,
    store: Arc<dyn SecretStore>,
    codec: Arc<TokenCodec>,
    providers: Vec<Arc<dyn OAuthProvider>>,
    deep_link_scheme: String,
}

impl FederationService {
    /// Wire up the federation service
    #[must_use]
    pub fn new(
        database: Database,
        store: Arc<dyn SecretStore>,
        codec: Arc<TokenCodec>,
        providers: Vec<Arc<dyn OAuthProvider>>,
        deep_link_scheme: String,
    ) -> Self {
        Self {
            database,
            store,
            codec,
            providers,
            deep_link_scheme,
        }
    }

    /// Build the provider redirect for a login request
    ///
    /// GitHub flows park an anti-CSRF state in the store and carry it in
    /// the redirect; the Google flow is stateless and sends none, which is
    /// what lets the shared callback tell the providers apart.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider is disabled or the store write fails
    pub async fn login_redirect(&self, provider: Provider) -> AppResult<String> {
        let provider_impl = require_provider(&self.providers, provider)?;

        if provider == Provider::Github {
            let state = Uuid::new_v4().to_string();
            self.store
                .put(&StoreKey::OauthState { state: state.clone() }, "pending", STATE_TTL)
                .await?;
            return Ok(provider_impl.authorize_url(Some(&state)));
        }

        Ok(provider_impl.authorize_url(None))
    }

    /// Handle the provider callback and park a session for the mobile app
    ///
    /// Returns the deep link the browser is redirected to; the app extracts
    /// the handoff key and exchanges it over HTTPS.
    ///
    /// # Errors
    ///
    /// Returns an error for an invalid state, a rejected code, or a
    /// provider/account failure
    pub async fn handle_callback(
        &self,
        provider: Provider,
        code: &str,
        state: Option<&str>,
    ) -> AppResult<String> {
        let provider_impl = require_provider(&self.providers, provider)?;

        if provider == Provider::Github {
            let state = state.ok_or(FederationError::StateInvalid)?;
            let pending = self
                .store
                .take(&StoreKey::OauthState { state: state.to_owned() })
                .await?;
            if pending.is_none() {
                return Err(FederationError::StateInvalid.into());
            }
        }

        let identity = provider_impl.exchange_identity(code).await?;
        let account = self
            .database
            .upsert_federated_account(
                &identity.email,
                identity.name.as_deref(),
                identity.avatar_url.as_deref(),
            )
            .await?;

        let token = self.codec.issue(
            account.id,
            &account.email,
            TokenPurpose::Access,
            lifetimes::access_federated(),
        )?;

        let key = Uuid::new_v4().to_string();
        let profile = UserProfile::from(&account);
        let profile_json = serde_json::to_string(&profile)
            .map_err(|e| AppError::internal(format!("Profile serialization failed: {e}")))?;

        self.store
            .put(&StoreKey::HandoffToken { key: key.clone() }, &token, HANDOFF_TTL)
            .await?;
        self.store
            .put(&StoreKey::HandoffProfile { key: key.clone() }, &profile_json, HANDOFF_TTL)
            .await?;

        info!(provider = %provider, email = %account.email, "OAuth callback completed");
        Ok(format!("{}://oauth/callback?key={key}", self.deep_link_scheme))
    }

    /// Exchange a handoff key for the parked session, exactly once
    ///
    /// # Errors
    ///
    /// Returns `HandoffKeyInvalid` when the key is unknown, expired, or
    /// already consumed
    pub async fn exchange_handoff(&self, key: &str) -> AppResult<HandoffPayload> {
        let token = self
            .store
            .take(&StoreKey::HandoffToken { key: key.to_owned() })
            .await?
            .ok_or_else(AppError::handoff_key_invalid)?;
        let profile_json = self
            .store
            .take(&StoreKey::HandoffProfile { key: key.to_owned() })
            .await?
            .ok_or_else(AppError::handoff_key_invalid)?;

        let user: UserProfile = serde_json::from_str(&profile_json)
            .map_err(|e| AppError::internal(format!("Profile deserialization failed: {e}")))?;

        Ok(HandoffPayload {
            token,
            token_type: "Bearer".into(),
            expires_in: HANDOFF_EXPIRES_IN,
            user,
        })
    }
}
