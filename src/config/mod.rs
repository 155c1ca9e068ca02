// ABOUTME: Configuration management module for centralized server settings
// ABOUTME: Environment-driven configuration for HTTP, stores, tokens, OAuth, and email
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2026 Crewmatch

//! Configuration module
//!
//! Environment-only configuration: every setting comes from environment
//! variables with sensible development defaults, validated once at startup.

/// Environment and server configuration
pub mod environment;
