// ABOUTME: OAuth federation module for sign-in with external identity providers
// ABOUTME: Provider trait, identity model, and provider-specific errors
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2026 Crewmatch

//! OAuth federation
//!
//! Providers vouch for an email address; account linkage is by email. The
//! server never stores provider tokens, it only extracts an identity and
//! hands off its own JWT to the mobile app.

/// Google and GitHub provider implementations
pub mod providers;

use crate::errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Supported federation providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// Google OpenID Connect
    Google,
    /// GitHub OAuth
    Github,
}

impl Provider {
    /// Canonical lowercase name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::Github => "github",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "google" => Ok(Self::Google),
            "github" => Ok(Self::Github),
            other => Err(AppError::invalid_input(format!(
                "Unknown OAuth provider: {other}"
            ))),
        }
    }
}

/// Identity extracted from a provider after code exchange
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderIdentity {
    /// Verified email address the provider vouches for
    pub email: String,
    /// Display name, if the provider exposes one
    pub name: Option<String>,
    /// Avatar URL, if the provider exposes one
    pub avatar_url: Option<String>,
}

/// Failures during an OAuth code exchange
#[derive(Debug, thiserror::Error)]
pub enum FederationError {
    /// Provider is not configured on this deployment
    #[error("Provider {0} is not configured")]
    ProviderDisabled(Provider),
    /// Anti-CSRF state did not match a pending flow
    #[error("OAuth state is invalid or expired")]
    StateInvalid,
    /// Provider rejected the authorization code
    #[error("Provider rejected the authorization code: {0}")]
    CodeRejected(String),
    /// Provider returned an identity without a usable email
    #[error("Provider returned no verified email address")]
    NoVerifiedEmail,
    /// Transport or decoding failure talking to the provider
    #[error("Provider request failed: {0}")]
    Upstream(String),
}

impl From<FederationError> for AppError {
    fn from(err: FederationError) -> Self {
        match err {
            FederationError::ProviderDisabled(provider) => {
                Self::invalid_input(format!("Provider {provider} is not configured"))
            }
            FederationError::StateInvalid => {
                Self::invalid_input("OAuth state is invalid or expired")
            }
            FederationError::CodeRejected(detail) => Self::invalid_input(format!(
                "Authorization code was rejected: {detail}"
            )),
            FederationError::NoVerifiedEmail => {
                Self::invalid_input("Provider returned no verified email address")
            }
            FederationError::Upstream(detail) => Self::upstream("oauth_provider", detail),
        }
    }
}

/// One federation provider: builds the redirect URL and turns an
/// authorization code into an identity
#[async_trait::async_trait]
pub trait OAuthProvider: Send + Sync {
    /// Which provider this is
    fn provider(&self) -> Provider;

    /// Authorization URL the browser is redirected to
    ///
    /// `state` is `Some` only for stateful flows (GitHub); the shared
    /// callback routes by the presence of the echoed `state` parameter, so
    /// stateless providers must not send one
    fn authorize_url(&self, state: Option<&str>) -> String;

    /// Exchange an authorization code for the user's identity
    ///
    /// # Errors
    ///
    /// Returns a `FederationError` if the exchange or profile fetch fails
    async fn exchange_identity(&self, code: &str) -> Result<ProviderIdentity, FederationError>;
}

/// Build the providers enabled by configuration
#[must_use]
pub fn create_providers(
    config: &crate::config::environment::OAuthConfig,
) -> Vec<std::sync::Arc<dyn OAuthProvider>> {
    let mut enabled: Vec<std::sync::Arc<dyn OAuthProvider>> = Vec::new();
    if let Some(google) = &config.google {
        enabled.push(std::sync::Arc::new(providers::GoogleProvider::new(
            google.clone(),
        )));
    }
    if let Some(github) = &config.github {
        enabled.push(std::sync::Arc::new(providers::GithubProvider::new(
            github.clone(),
        )));
    }
    enabled
}

/// Ensure a callback or login request names an enabled provider
///
/// # Errors
///
/// Returns `ProviderDisabled` if the provider has no credentials configured
pub fn require_provider(
    enabled: &[std::sync::Arc<dyn OAuthProvider>],
    provider: Provider,
) -> AppResult<std::sync::Arc<dyn OAuthProvider>> {
    enabled
        .iter()
        .find(|p| p.provider() == provider)
        .cloned()
        .ok_or_else(|| FederationError::ProviderDisabled(provider).into())
}
