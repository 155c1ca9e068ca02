// ABOUTME: Unified error handling with standard error codes and HTTP response mapping
// ABOUTME: Defines the AppError type returned by every fallible operation in the crate
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2026 Crewmatch

//! # Unified Error Handling
//!
//! Standard error codes, the [`AppError`] type, and the JSON response body
//! every HTTP handler produces on failure.

use axum::response::{IntoResponse, Response};
use axum::Json;
use http::StatusCode;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Standard error codes used throughout the application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    // Authentication & account lifecycle (1000-1999)
    /// Wrong email/password pair, absent account, or passwordless account
    #[serde(rename = "INVALID_CREDENTIALS")]
    InvalidCredentials = 1000,
    /// Account exists but has not completed email verification
    #[serde(rename = "NOT_VERIFIED")]
    NotVerified = 1001,
    /// Registration against an already-verified email
    #[serde(rename = "EMAIL_ALREADY_REGISTERED")]
    EmailAlreadyRegistered = 1002,
    /// Resend requested for an account that is already verified
    #[serde(rename = "EMAIL_ALREADY_VERIFIED")]
    EmailAlreadyVerified = 1003,
    /// OTP absent, expired, or mismatched
    #[serde(rename = "OTP_INVALID")]
    OtpInvalid = 1004,

    // Tokens (1500-1599)
    /// Signature verification failed, malformed token, or already-consumed
    /// single-use token
    #[serde(rename = "TOKEN_INVALID")]
    TokenInvalid = 1500,
    /// Token is past its expiry
    #[serde(rename = "TOKEN_EXPIRED")]
    TokenExpired = 1501,
    /// Token is valid but minted for a different purpose
    #[serde(rename = "TOKEN_PURPOSE_MISMATCH")]
    TokenPurposeMismatch = 1502,
    /// OAuth handoff key absent, expired, or already exchanged
    #[serde(rename = "HANDOFF_KEY_INVALID")]
    HandoffKeyInvalid = 1503,

    // Rate limiting (2000-2999)
    /// Token bucket for this scope and client is out of tokens
    #[serde(rename = "RATE_LIMITED")]
    RateLimited = 2000,

    // Validation (3000-3999)
    /// Request failed input validation
    #[serde(rename = "INVALID_INPUT")]
    InvalidInput = 3000,

    // Resources (4000-4999)
    /// No account for the given identity
    #[serde(rename = "USER_NOT_FOUND")]
    UserNotFound = 4000,

    // External services (5000-5999)
    /// OAuth provider or email relay failure
    #[serde(rename = "UPSTREAM_PROVIDER_ERROR")]
    UpstreamProviderError = 5000,

    // Configuration (6000-6999)
    /// Invalid or missing configuration
    #[serde(rename = "CONFIG_ERROR")]
    ConfigError = 6000,

    // Internal (9000-9999)
    /// Unclassified internal failure
    #[serde(rename = "INTERNAL_ERROR")]
    InternalError = 9000,
    /// Relational store failure
    #[serde(rename = "DATABASE_ERROR")]
    DatabaseError = 9001,
    /// Secret store failure
    #[serde(rename = "STORAGE_ERROR")]
    StorageError = 9002,
}

impl ErrorCode {
    /// Get the HTTP status code for this error
    #[must_use]
    pub const fn http_status(&self) -> StatusCode {
        match self {
            Self::InvalidInput | Self::OtpInvalid | Self::EmailAlreadyVerified => {
                StatusCode::BAD_REQUEST
            }

            Self::InvalidCredentials
            | Self::TokenInvalid
            | Self::TokenExpired
            | Self::TokenPurposeMismatch
            | Self::HandoffKeyInvalid => StatusCode::UNAUTHORIZED,

            Self::NotVerified => StatusCode::FORBIDDEN,

            Self::UserNotFound => StatusCode::NOT_FOUND,

            Self::EmailAlreadyRegistered => StatusCode::CONFLICT,

            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,

            Self::UpstreamProviderError => StatusCode::BAD_GATEWAY,

            Self::ConfigError | Self::InternalError | Self::DatabaseError | Self::StorageError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Get a user-facing description of this error
    #[must_use]
    pub const fn description(&self) -> &'static str {
        match self {
            Self::InvalidCredentials => "Invalid email or password",
            Self::NotVerified => "Email address has not been verified",
            Self::EmailAlreadyRegistered => "An account with this email already exists",
            Self::EmailAlreadyVerified => "Email address is already verified",
            Self::OtpInvalid => "Invalid or expired verification code",
            Self::TokenInvalid => "The token is invalid",
            Self::TokenExpired => "The token has expired",
            Self::TokenPurposeMismatch => "The token cannot be used for this operation",
            Self::HandoffKeyInvalid => "Invalid or expired key",
            Self::RateLimited => "Too many requests. Please slow down",
            Self::InvalidInput => "The provided input is invalid",
            Self::UserNotFound => "User not found",
            Self::UpstreamProviderError => "An upstream service encountered an error",
            Self::ConfigError => "Configuration error encountered",
            Self::InternalError => "An internal server error occurred",
            Self::DatabaseError => "Database operation failed",
            Self::StorageError => "Secret store operation failed",
        }
    }
}

/// Unified error type for the application
#[derive(Debug, Error)]
pub struct AppError {
    /// Error code
    pub code: ErrorCode,
    /// Human-readable error message
    pub message: String,
    /// Structured details surfaced in the response body (e.g. retry hints)
    pub details: serde_json::Value,
    /// Source error for error chaining
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl AppError {
    /// Create a new `AppError` with the given code and message
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: serde_json::Value::Null,
            source: None,
        }
    }

    /// Attach structured details to the error
    #[must_use]
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }

    /// Add a source error for error chaining
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Get the HTTP status code for this error
    #[must_use]
    pub const fn http_status(&self) -> StatusCode {
        self.code.http_status()
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.description(), self.message)
    }
}

/// Result type alias for convenience
pub type AppResult<T> = Result<T, AppError>;

/// HTTP error response format
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error payload
    pub error: ErrorResponseDetails,
}

/// Body of an HTTP error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponseDetails {
    /// Stable machine-readable code
    pub code: ErrorCode,
    /// Human-readable message
    pub message: String,
    /// Structured details, omitted when empty
    #[serde(skip_serializing_if = "serde_json::Value::is_null")]
    #[serde(default)]
    pub details: serde_json::Value,
}

impl From<AppError> for ErrorResponse {
    fn from(error: AppError) -> Self {
        Self {
            error: ErrorResponseDetails {
                code: error.code,
                message: error.message,
                details: error.details,
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.http_status();
        if status.is_server_error() {
            tracing::error!(code = ?self.code, "request failed: {}", self);
        } else {
            tracing::debug!(code = ?self.code, "request rejected: {}", self);
        }
        (status, Json(ErrorResponse::from(self))).into_response()
    }
}

/// Convenience constructors for common errors
impl AppError {
    /// Wrong credentials (identical for absent account, passwordless account,
    /// and hash mismatch)
    #[must_use]
    pub fn invalid_credentials() -> Self {
        Self::new(ErrorCode::InvalidCredentials, "Invalid email or password")
    }

    /// Account has not verified its email
    #[must_use]
    pub fn not_verified() -> Self {
        Self::new(
            ErrorCode::NotVerified,
            "Email not verified. Please verify your email first",
        )
    }

    /// Email is already taken by a verified account
    #[must_use]
    pub fn email_already_registered() -> Self {
        Self::new(
            ErrorCode::EmailAlreadyRegistered,
            "An account with this email already exists",
        )
    }

    /// OTP absent, expired, or mismatched
    #[must_use]
    pub fn otp_invalid() -> Self {
        Self::new(ErrorCode::OtpInvalid, "Invalid or expired verification code")
    }

    /// Rate limit exceeded, with a retry hint in seconds
    #[must_use]
    pub fn rate_limited(retry_after_secs: u64) -> Self {
        Self::new(ErrorCode::RateLimited, "Too many requests").with_details(serde_json::json!({
            "retry_after_secs": retry_after_secs,
        }))
    }

    /// Handoff key absent, expired, or already exchanged
    #[must_use]
    pub fn handoff_key_invalid() -> Self {
        Self::new(ErrorCode::HandoffKeyInvalid, "Invalid or expired key")
    }

    /// No account for the given identity
    #[must_use]
    pub fn user_not_found() -> Self {
        Self::new(ErrorCode::UserNotFound, "User not found")
    }

    /// Invalid input
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    /// Internal server error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    /// Database error
    pub fn database(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DatabaseError, message)
    }

    /// Secret store error
    pub fn storage(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::StorageError, message)
    }

    /// Configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConfigError, message)
    }

    /// External service error
    pub fn upstream(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::UpstreamProviderError,
            format!("{}: {}", service.into(), message.into()),
        )
    }
}

/// Conversion from `anyhow::Error` for bootstrap-level code
impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        match error.source() {
            Some(source) => Self::new(ErrorCode::InternalError, error.to_string()).with_details(
                serde_json::json!({
                    "source": source.to_string()
                }),
            ),
            None => Self::new(ErrorCode::InternalError, error.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_http_status() {
        assert_eq!(
            ErrorCode::InvalidCredentials.http_status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ErrorCode::RateLimited.http_status(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            ErrorCode::EmailAlreadyRegistered.http_status(),
            StatusCode::CONFLICT
        );
        assert_eq!(ErrorCode::UserNotFound.http_status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ErrorCode::InternalError.http_status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_error_response_serialization() {
        let error = AppError::rate_limited(12);
        let response = ErrorResponse::from(error);

        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("RATE_LIMITED"));
        assert!(json.contains("retry_after_secs"));
    }

    #[test]
    fn test_null_details_omitted() {
        let response = ErrorResponse::from(AppError::invalid_credentials());
        let json = serde_json::to_string(&response).unwrap();
        assert!(!json.contains("details"));
    }
}
