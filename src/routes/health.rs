// ABOUTME: Health check route handlers for service monitoring and status endpoints
// ABOUTME: Liveness and readiness endpoints backed by real dependency checks
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2026 Crewmatch

//! Health check routes
//!
//! `/health` is pure liveness; `/ready` verifies the database and secret
//! store so load balancers stop routing to an instance with a dead
//! dependency.

use crate::context::ServerResources;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use std::sync::Arc;

/// Health route handlers
pub struct HealthRoutes;

impl HealthRoutes {
    /// Create the health check routes
    #[must_use]
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/health", get(health_handler))
            .route("/ready", get(ready_handler))
            .with_state(resources)
    }
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

async fn ready_handler(
    State(resources): State<Arc<ServerResources>>,
) -> (StatusCode, Json<serde_json::Value>) {
    let store_ok = resources.store.health_check().await.is_ok();
    let database_ok = sqlx::query("SELECT 1")
        .execute(&resources.database.pool)
        .await
        .is_ok();

    let ready = store_ok && database_ok;
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(serde_json::json!({
            "status": if ready { "ready" } else { "degraded" },
            "checks": {
                "secret_store": store_ok,
                "database": database_ok,
            },
            "timestamp": chrono::Utc::now().to_rfc3339(),
        })),
    )
}
