// ABOUTME: OAuth federation route handlers
// ABOUTME: Provider login redirects, the shared callback, and handoff key exchange
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2026 Crewmatch

//! OAuth federation routes
//!
//! The callback is a single endpoint shared by both providers. GitHub
//! flows always carry the `state` query parameter from the stored
//! anti-CSRF value, so a callback with `state` routes to GitHub and one
//! without routes to Google.

use crate::context::ServerResources;
use crate::errors::{AppError, AppResult};
use crate::models::HandoffPayload;
use crate::oauth::Provider;
use crate::rate_limiting::policies;
use axum::extract::{ConnectInfo, Path, Query, State};
use axum::response::Redirect;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;

/// Provider callback query parameters
#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    /// Authorization code from the provider
    pub code: Option<String>,
    /// Anti-CSRF state, present on GitHub flows
    pub state: Option<String>,
    /// Provider-reported error, set when the user denied access
    pub error: Option<String>,
}

/// Handoff exchange query parameters
#[derive(Debug, Deserialize)]
pub struct HandoffParams {
    /// Single-use handoff key from the deep link
    pub key: String,
}

/// OAuth route handlers
pub struct OAuthRoutes;

impl OAuthRoutes {
    /// Create the OAuth federation routes
    #[must_use]
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/auth/:provider/login", get(login_redirect))
            .route("/auth/callback", get(callback).post(callback))
            .route("/auth/get-jwt", get(exchange_handoff))
            .with_state(resources)
    }
}

async fn login_redirect(
    State(resources): State<Arc<ServerResources>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Path(provider): Path<String>,
) -> AppResult<Redirect> {
    resources
        .rate_limiter
        .check(&policies::OAUTH, &addr.ip().to_string())
        .await?;

    let provider = Provider::from_str(&provider)?;
    let url = resources.federation.login_redirect(provider).await?;
    Ok(Redirect::temporary(&url))
}

async fn callback(
    State(resources): State<Arc<ServerResources>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Query(params): Query<CallbackParams>,
) -> AppResult<Redirect> {
    resources
        .rate_limiter
        .check(&policies::OAUTH, &addr.ip().to_string())
        .await?;

    if let Some(error) = params.error {
        return Err(AppError::invalid_input(format!(
            "Provider reported an error: {error}"
        )));
    }
    let code = params
        .code
        .ok_or_else(|| AppError::invalid_input("Missing authorization code"))?;

    let provider = if params.state.is_some() {
        Provider::Github
    } else {
        Provider::Google
    };

    let deep_link = resources
        .federation
        .handle_callback(provider, &code, params.state.as_deref())
        .await?;
    Ok(Redirect::temporary(&deep_link))
}

async fn exchange_handoff(
    State(resources): State<Arc<ServerResources>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Query(params): Query<HandoffParams>,
) -> AppResult<Json<HandoffPayload>> {
    resources
        .rate_limiter
        .check(&policies::OAUTH, &addr.ip().to_string())
        .await?;

    let payload = resources.federation.exchange_handoff(&params.key).await?;
    Ok(Json(payload))
}
