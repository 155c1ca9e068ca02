// ABOUTME: Shared test harness for integration tests
// ABOUTME: Wires in-memory storage, an in-memory database, and a recording notifier
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2026 Crewmatch

#![allow(dead_code)]

use crewmatch_auth::config::environment::{
    AuthConfig, DatabaseConfig, NotifierConfig, OAuthConfig, RedisConnectionConfig, ServerConfig,
    StoreSettings,
};
use crewmatch_auth::context::ServerResources;
use crewmatch_auth::database::Database;
use crewmatch_auth::notifications::{EmailMessage, RecordingNotifier};
use crewmatch_auth::store::factory::StoreBackend;
use crewmatch_auth::store::memory::InMemorySecretStore;
use crewmatch_auth::store::{SecretStore, StoreConfig};
use std::sync::Arc;

pub const TEST_JWT_SECRET: &str = "integration-test-secret-0123456789abcdef";

/// Fully wired server resources over in-memory backends
pub struct TestHarness {
    pub resources: Arc<ServerResources>,
    pub notifier: Arc<RecordingNotifier>,
    pub store: Arc<dyn SecretStore>,
    pub database: Database,
}

pub fn test_config() -> ServerConfig {
    ServerConfig {
        http_port: 0,
        database: DatabaseConfig {
            url: "sqlite::memory:".into(),
        },
        store: StoreSettings {
            backend: StoreBackend::Memory,
            redis_url: None,
            redis_connection: RedisConnectionConfig::default(),
        },
        auth: AuthConfig {
            jwt_secret: TEST_JWT_SECRET.into(),
            jwt_key_id: None,
            deep_link_scheme: "crewmatch".into(),
        },
        oauth: OAuthConfig::default(),
        notifier: NotifierConfig {
            endpoint: None,
            api_key: None,
            from_address: "no-reply@crewmatch.test".into(),
        },
    }
}

pub async fn harness() -> TestHarness {
    let config = test_config();

    let database = Database::new(&config.database.url)
        .await
        .expect("in-memory database");

    let store: Arc<dyn SecretStore> = Arc::new(InMemorySecretStore::new(&StoreConfig {
        enable_background_cleanup: false,
        ..StoreConfig::default()
    }));

    let notifier = Arc::new(RecordingNotifier::new());

    let resources = Arc::new(ServerResources::new(
        config,
        database.clone(),
        Arc::clone(&store),
        notifier.clone(),
    ));

    TestHarness {
        resources,
        notifier,
        store,
        database,
    }
}

/// First run of six consecutive digits in the message body
pub fn extract_otp(message: &EmailMessage) -> String {
    let mut run = String::new();
    for c in message.text_body.chars() {
        if c.is_ascii_digit() {
            run.push(c);
            if run.len() == 6 {
                return run;
            }
        } else {
            run.clear();
        }
    }
    panic!("no six-digit code in message: {}", message.text_body);
}

/// Reset token from the first line of a password-reset email
pub fn extract_reset_token(message: &EmailMessage) -> String {
    message
        .text_body
        .lines()
        .next()
        .and_then(|line| line.rsplit(' ').next())
        .expect("reset token in message")
        .to_owned()
}
