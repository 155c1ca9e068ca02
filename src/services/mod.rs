// ABOUTME: Domain service layer for business logic extracted from route handlers
// ABOUTME: Credential auth, OAuth federation, and password-reset services
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2026 Crewmatch

//! Domain services
//!
//! Route handlers stay thin; each flow lives in a service that owns the
//! database, secret store, token codec, and notifier seams it needs.

/// Email/password registration, OTP verification, login, and sessions
pub mod credentials;
/// OAuth federation and mobile handoff
pub mod federation;
/// Forgot-password and single-use reset
pub mod password_reset;

pub use credentials::CredentialService;
pub use federation::FederationService;
pub use password_reset::PasswordResetService;
