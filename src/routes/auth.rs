// ABOUTME: Credential and session route handlers
// ABOUTME: Registration, OTP verification, login, refresh, profile, and password reset
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2026 Crewmatch

//! Credential and session routes
//!
//! Thin handlers over [`crate::services`]; every public endpoint consults
//! the rate-limit guard before touching its service.

use crate::context::ServerResources;
use crate::errors::{AppError, AppResult};
use crate::models::UserProfile;
use crate::rate_limiting::policies;
use crate::services::credentials::SessionTokens;
use axum::extract::{ConnectInfo, State};
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;

/// Registration request
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    /// Email address to register
    pub email: String,
    /// Chosen password
    pub password: String,
    /// Optional display name
    pub display_name: Option<String>,
}

/// OTP verification request
#[derive(Debug, Deserialize)]
pub struct VerifyOtpRequest {
    /// Address being verified
    pub email: String,
    /// Six-digit code from the verification email
    pub code: String,
}

/// Login request
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    /// Registered email address
    pub email: String,
    /// Password
    pub password: String,
}

/// Email-only request (resend, forgot-password)
#[derive(Debug, Deserialize)]
pub struct EmailRequest {
    /// Target email address
    pub email: String,
}

/// Refresh request
#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    /// Refresh token from a previous session response
    pub refresh_token: String,
}

/// Password reset submission
#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    /// Reset token from the email
    pub token: String,
    /// New password
    pub new_password: String,
    /// Must match `new_password`
    pub confirm_password: String,
}

/// Generic message response
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    /// Human-readable outcome
    pub message: String,
}

impl MessageResponse {
    fn new(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            message: message.into(),
        })
    }
}

/// Pull the bearer token out of the Authorization header
fn bearer_token(headers: &HeaderMap) -> AppResult<&str> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| AppError::invalid_input("Missing or malformed Authorization header"))
}

/// Credential route handlers
pub struct AuthRoutes;

impl AuthRoutes {
    /// Create the credential and session routes
    #[must_use]
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/auth/register", post(register))
            .route("/auth/verify-otp", post(verify_otp))
            .route("/auth/resend-otp", post(resend_otp))
            .route("/auth/login", post(login))
            .route("/auth/refresh", post(refresh))
            .route("/auth/me", get(me))
            .route("/auth/forgot-password", post(forgot_password))
            .route("/auth/reset-password", post(reset_password))
            .with_state(resources)
    }
}

async fn register(
    State(resources): State<Arc<ServerResources>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(request): Json<RegisterRequest>,
) -> AppResult<Json<MessageResponse>> {
    resources
        .rate_limiter
        .check(&policies::REGISTER, &addr.ip().to_string())
        .await?;

    resources
        .credentials
        .register(
            &request.email,
            &request.password,
            request.display_name.as_deref(),
        )
        .await?;

    Ok(MessageResponse::new(
        "Registration accepted. Check your email for a verification code",
    ))
}

async fn verify_otp(
    State(resources): State<Arc<ServerResources>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(request): Json<VerifyOtpRequest>,
) -> AppResult<Json<SessionTokens>> {
    resources
        .rate_limiter
        .check(&policies::VERIFY_OTP, &addr.ip().to_string())
        .await?;

    let tokens = resources
        .credentials
        .verify_otp(&request.email, &request.code)
        .await?;
    Ok(Json(tokens))
}

async fn resend_otp(
    State(resources): State<Arc<ServerResources>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(request): Json<EmailRequest>,
) -> AppResult<Json<MessageResponse>> {
    resources
        .rate_limiter
        .check(&policies::RESEND_OTP, &addr.ip().to_string())
        .await?;

    resources.credentials.resend_otp(&request.email).await?;
    Ok(MessageResponse::new("Verification code sent"))
}

async fn login(
    State(resources): State<Arc<ServerResources>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(request): Json<LoginRequest>,
) -> AppResult<Json<SessionTokens>> {
    resources
        .rate_limiter
        .check(&policies::LOGIN, &addr.ip().to_string())
        .await?;

    let tokens = resources
        .credentials
        .login(&request.email, &request.password)
        .await?;
    Ok(Json(tokens))
}

async fn refresh(
    State(resources): State<Arc<ServerResources>>,
    Json(request): Json<RefreshRequest>,
) -> AppResult<Json<SessionTokens>> {
    let tokens = resources.credentials.refresh(&request.refresh_token).await?;
    Ok(Json(tokens))
}

async fn me(
    State(resources): State<Arc<ServerResources>>,
    headers: HeaderMap,
) -> AppResult<Json<UserProfile>> {
    let token = bearer_token(&headers)?;
    let profile = resources.credentials.me(token).await?;
    Ok(Json(profile))
}

async fn forgot_password(
    State(resources): State<Arc<ServerResources>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(request): Json<EmailRequest>,
) -> AppResult<Json<MessageResponse>> {
    resources
        .rate_limiter
        .check(&policies::FORGOT_PASSWORD, &addr.ip().to_string())
        .await?;

    resources
        .password_reset
        .forgot_password(&request.email)
        .await?;

    // Same response whether or not the address is registered
    Ok(MessageResponse::new(
        "If that address is registered, a reset email is on its way",
    ))
}

async fn reset_password(
    State(resources): State<Arc<ServerResources>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(request): Json<ResetPasswordRequest>,
) -> AppResult<Json<MessageResponse>> {
    resources
        .rate_limiter
        .check(&policies::RESET_PASSWORD, &addr.ip().to_string())
        .await?;

    if request.new_password != request.confirm_password {
        return Err(AppError::invalid_input("Passwords do not match"));
    }

    resources
        .password_reset
        .reset_password(&request.token, &request.new_password)
        .await?;
    Ok(MessageResponse::new("Password updated"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_token_extraction() {
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::AUTHORIZATION,
            "Bearer abc.def.ghi".parse().unwrap(),
        );
        assert_eq!(bearer_token(&headers).unwrap(), "abc.def.ghi");

        headers.insert(
            axum::http::header::AUTHORIZATION,
            "Basic dXNlcg==".parse().unwrap(),
        );
        assert!(bearer_token(&headers).is_err());

        assert!(bearer_token(&HeaderMap::new()).is_err());
    }
}
