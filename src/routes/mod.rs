// ABOUTME: Route module organization for the auth server HTTP endpoints
// ABOUTME: Assembles domain routers and the shared middleware stack
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2026 Crewmatch

//! HTTP routes
//!
//! Each domain module contains only route definitions and thin handlers
//! that delegate to the service layer.

/// Credential and session routes
pub mod auth;
/// Health check and readiness routes
pub mod health;
/// OAuth federation routes
pub mod oauth;

use crate::context::ServerResources;
use axum::Router;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Assemble the full application router
#[must_use]
pub fn router(resources: Arc<ServerResources>) -> Router {
    Router::new()
        .merge(auth::AuthRoutes::routes(Arc::clone(&resources)))
        .merge(oauth::OAuthRoutes::routes(Arc::clone(&resources)))
        .merge(health::HealthRoutes::routes(resources))
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(CorsLayer::permissive())
}
