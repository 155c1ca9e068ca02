// ABOUTME: Main library entry point for the Crewmatch authentication server
// ABOUTME: Credential auth, OAuth federation, and rate limiting for the mobile app
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2026 Crewmatch

#![deny(unsafe_code)]

//! # Crewmatch Auth Server
//!
//! Authentication and session lifecycle backend for the Crewmatch mobile
//! app. Handles email/password registration with OTP verification, login,
//! token refresh, password reset, and OAuth sign-in with Google and GitHub
//! handed off to the app through a single-use key.
//!
//! ## Architecture
//!
//! - **Services**: One service per flow (credentials, federation, reset)
//! - **Secret store**: All time-boxed state (OTPs, OAuth state, handoff
//!   keys, rate-limit buckets) behind one trait, backed by Redis or memory
//! - **Tokens**: HS256 claims tokens with a typed purpose per flow
//! - **Routes**: Thin axum handlers delegating to the services
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use crewmatch_auth::config::environment::ServerConfig;
//! use crewmatch_auth::errors::AppResult;
//!
//! fn main() -> AppResult<()> {
//!     let config = ServerConfig::from_env()?;
//!     println!("Auth server configured with port: HTTP={}", config.http_port);
//!     Ok(())
//! }
//! ```

/// Server configuration
pub mod config;
/// Shared server resources
pub mod context;
/// Relational store for account records
pub mod database;
/// Error types and HTTP error responses
pub mod errors;
/// Structured logging setup
pub mod logging;
/// Account and wire-format models
pub mod models;
/// Outbound email notifications
pub mod notifications;
/// OAuth federation providers
pub mod oauth;
/// Rate-limiting guard
pub mod rate_limiting;
/// HTTP routes
pub mod routes;
/// Domain services
pub mod services;
/// Secret store backends
pub mod store;
/// Token codec
pub mod tokens;
