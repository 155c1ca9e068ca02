// ABOUTME: Outbound email notifications for OTP and password-reset flows
// ABOUTME: Notifier trait with an HTTP relay implementation and a recording test double
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2026 Crewmatch

//! Outbound email notifications

/// HTTP relay notifier implementation
pub mod relay;

use crate::errors::AppResult;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// One outbound email
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailMessage {
    /// Recipient address
    pub to: String,
    /// Subject line
    pub subject: String,
    /// Plain-text body
    pub text_body: String,
    /// HTML body
    pub html_body: String,
}

/// Email dispatch seam
///
/// Registration and resend fail loudly when dispatch fails (the account is
/// unusable without the code); forgot-password swallows failures to keep
/// its response independent of account existence.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    /// Send one email
    ///
    /// # Errors
    ///
    /// Returns an error if the message could not be handed to the relay
    async fn send_email(&self, message: &EmailMessage) -> AppResult<()>;
}

/// Verification-code email
#[must_use]
pub fn otp_email(to: &str, code: &str) -> EmailMessage {
    EmailMessage {
        to: to.to_owned(),
        subject: "Your Crewmatch verification code".into(),
        text_body: format!(
            "Your verification code is {code}. It is valid for 5 minutes.\n\n\
             If you did not create a Crewmatch account, you can ignore this email."
        ),
        html_body: format!(
            "<p>Your verification code is <strong>{code}</strong>.</p>\
             <p>It is valid for 5 minutes.</p>\
             <p>If you did not create a Crewmatch account, you can ignore this email.</p>"
        ),
    }
}

/// Password-reset email carrying the reset token
#[must_use]
pub fn password_reset_email(to: &str, reset_token: &str) -> EmailMessage {
    EmailMessage {
        to: to.to_owned(),
        subject: "Reset your Crewmatch password".into(),
        text_body: format!(
            "Use this token to reset your password: {reset_token}\n\n\
             The token is valid for 15 minutes and can be used once.\n\
             If you did not request a reset, you can ignore this email."
        ),
        html_body: format!(
            "<p>Use this token to reset your password:</p>\
             <p><code>{reset_token}</code></p>\
             <p>The token is valid for 15 minutes and can be used once.</p>\
             <p>If you did not request a reset, you can ignore this email.</p>"
        ),
    }
}

/// Notifier that records messages instead of sending them
///
/// Used by integration tests to observe OTP codes and reset tokens, and as
/// the fallback when no relay endpoint is configured.
#[derive(Default)]
pub struct RecordingNotifier {
    messages: std::sync::Mutex<Vec<EmailMessage>>,
}

impl RecordingNotifier {
    /// Create an empty recorder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every message recorded so far
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned (test-only type)
    #[must_use]
    #[allow(clippy::unwrap_used)]
    pub fn messages(&self) -> Vec<EmailMessage> {
        self.messages.lock().unwrap().clone()
    }

    /// The most recent message to `to`, if any
    #[must_use]
    pub fn last_message_to(&self, to: &str) -> Option<EmailMessage> {
        self.messages()
            .into_iter()
            .rev()
            .find(|m| m.to == to)
    }
}

#[async_trait::async_trait]
impl Notifier for RecordingNotifier {
    async fn send_email(&self, message: &EmailMessage) -> AppResult<()> {
        tracing::debug!(to = %message.to, subject = %message.subject, "recording email");
        if let Ok(mut messages) = self.messages.lock() {
            messages.push(message.clone());
        }
        Ok(())
    }
}

/// Build the configured notifier: the HTTP relay when an endpoint is set,
/// otherwise a recorder that only logs
#[must_use]
pub fn create_notifier(config: &crate::config::environment::NotifierConfig) -> Arc<dyn Notifier> {
    config.endpoint.as_ref().map_or_else(
        || {
            tracing::warn!("No EMAIL_RELAY_URL configured; emails will not be delivered");
            Arc::new(RecordingNotifier::new()) as Arc<dyn Notifier>
        },
        |endpoint| {
            Arc::new(relay::HttpRelayNotifier::new(
                endpoint.clone(),
                config.api_key.clone(),
                config.from_address.clone(),
            )) as Arc<dyn Notifier>
        },
    )
}
