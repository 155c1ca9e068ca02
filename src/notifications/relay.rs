// ABOUTME: HTTP email relay notifier
// ABOUTME: Posts messages to an upstream transactional-email service
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2026 Crewmatch

use super::{EmailMessage, Notifier};
use crate::errors::{AppError, AppResult};
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

const RELAY_TIMEOUT: Duration = Duration::from_secs(10);

/// Notifier that posts messages to an HTTP email relay
pub struct HttpRelayNotifier {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    from_address: String,
}

#[derive(Serialize)]
struct RelayRequest<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text: &'a str,
    html: &'a str,
}

impl HttpRelayNotifier {
    /// Create a relay notifier for the given endpoint
    #[must_use]
    pub fn new(endpoint: String, api_key: Option<String>, from_address: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(RELAY_TIMEOUT)
            .build()
            .unwrap_or_default();

        Self {
            client,
            endpoint,
            api_key,
            from_address,
        }
    }
}

#[async_trait::async_trait]
impl Notifier for HttpRelayNotifier {
    async fn send_email(&self, message: &EmailMessage) -> AppResult<()> {
        let body = RelayRequest {
            from: &self.from_address,
            to: &message.to,
            subject: &message.subject,
            text: &message.text_body,
            html: &message.html_body,
        };

        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AppError::upstream("email_relay", format!("Relay request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(AppError::upstream(
                "email_relay",
                format!("Relay returned {status}: {detail}"),
            ));
        }

        debug!(to = %message.to, "Email handed to relay");
        Ok(())
    }
}
