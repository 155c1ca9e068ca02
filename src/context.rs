// ABOUTME: Shared server resources wired once at startup
// ABOUTME: Owns the database, secret store, token codec, notifier, and services
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2026 Crewmatch

//! Shared server resources
//!
//! One `ServerResources` is built at startup and handed to the router as
//! shared state; handlers reach every seam through it.

use crate::config::environment::ServerConfig;
use crate::database::Database;
use crate::notifications::Notifier;
use crate::oauth::{create_providers, OAuthProvider};
use crate::rate_limiting::RateLimiterGuard;
use crate::services::{CredentialService, FederationService, PasswordResetService};
use crate::store::SecretStore;
use crate::tokens::TokenCodec;
use std::sync::Arc;

/// Everything the route handlers need, wired once
pub struct ServerResources {
    /// Relational store for account records
    pub database: Database,
    /// Secret store for time-boxed state
    pub store: Arc<dyn SecretStore>,
    /// Token codec
    pub codec: Arc<TokenCodec>,
    /// Rate-limit guard over the secret store
    pub rate_limiter: RateLimiterGuard,
    /// Credential flows
    pub credentials: CredentialService,
    /// OAuth federation flows
    pub federation: FederationService,
    /// Password-reset flows
    pub password_reset: PasswordResetService,
    /// Configuration snapshot
    pub config: ServerConfig,
}

impl ServerResources {
    /// Wire the services from their backing components
    #[must_use]
    pub fn new(
        config: ServerConfig,
        database: Database,
        store: Arc<dyn SecretStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let codec = Arc::new(TokenCodec::new(
            config.auth.jwt_secret.as_bytes(),
            config.auth.jwt_key_id.clone(),
        ));

        let providers: Vec<Arc<dyn OAuthProvider>> = create_providers(&config.oauth);

        let credentials = CredentialService::new(
            database.clone(),
            Arc::clone(&store),
            Arc::clone(&codec),
            Arc::clone(&notifier),
        );
        let federation = FederationService::new(
            database.clone(),
            Arc::clone(&store),
            Arc::clone(&codec),
            providers,
            config.auth.deep_link_scheme.clone(),
        );
        let password_reset = PasswordResetService::new(
            database.clone(),
            Arc::clone(&store),
            Arc::clone(&codec),
            notifier,
        );
        let rate_limiter = RateLimiterGuard::new(Arc::clone(&store));

        Self {
            database,
            store,
            codec,
            rate_limiter,
            credentials,
            federation,
            password_reset,
            config,
        }
    }
}
