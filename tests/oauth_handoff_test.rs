// ABOUTME: Integration tests for OAuth federation and the mobile handoff
// ABOUTME: State validation, account upsert, deep links, and single-use key exchange
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2026 Crewmatch

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use common::{harness, TestHarness};
use crewmatch_auth::errors::ErrorCode;
use crewmatch_auth::oauth::{FederationError, OAuthProvider, Provider, ProviderIdentity};
use crewmatch_auth::services::FederationService;
use crewmatch_auth::store::StoreKey;
use crewmatch_auth::tokens::{TokenCodec, TokenPurpose};
use std::sync::Arc;
use url::Url;

/// Provider double that accepts one fixed code
struct StubProvider {
    provider: Provider,
    identity: ProviderIdentity,
}

#[async_trait::async_trait]
impl OAuthProvider for StubProvider {
    fn provider(&self) -> Provider {
        self.provider
    }

    fn authorize_url(&self, state: Option<&str>) -> String {
        match state {
            Some(state) => format!("https://provider.test/authorize?state={state}"),
            None => "https://provider.test/authorize".into(),
        }
    }

    async fn exchange_identity(&self, code: &str) -> Result<ProviderIdentity, FederationError> {
        if code == "good-code" {
            Ok(self.identity.clone())
        } else {
            Err(FederationError::CodeRejected("bad code".into()))
        }
    }
}

fn stub_identity() -> ProviderIdentity {
    ProviderIdentity {
        email: "oauth-user@example.com".into(),
        name: Some("OAuth User".into()),
        avatar_url: Some("https://provider.test/avatar.png".into()),
    }
}

fn federation_with_stub(h: &TestHarness, provider: Provider) -> FederationService {
    let codec = Arc::new(TokenCodec::new(common::TEST_JWT_SECRET.as_bytes(), None));
    FederationService::new(
        h.database.clone(),
        Arc::clone(&h.store),
        codec,
        vec![Arc::new(StubProvider {
            provider,
            identity: stub_identity(),
        })],
        "crewmatch".into(),
    )
}

fn handoff_key(deep_link: &str) -> String {
    let url = Url::parse(deep_link).unwrap();
    assert_eq!(url.scheme(), "crewmatch");
    url.query_pairs()
        .find(|(k, _)| k == "key")
        .map(|(_, v)| v.into_owned())
        .unwrap()
}

#[tokio::test]
async fn test_google_callback_parks_session_for_single_use_exchange() {
    let h = harness().await;
    let federation = federation_with_stub(&h, Provider::Google);

    let deep_link = federation
        .handle_callback(Provider::Google, "good-code", None)
        .await
        .unwrap();
    let key = handoff_key(&deep_link);

    let payload = federation.exchange_handoff(&key).await.unwrap();
    assert_eq!(payload.token_type, "Bearer");
    assert_eq!(payload.expires_in, 3600);
    assert_eq!(payload.user.email, "oauth-user@example.com");

    // The parked token is a real access token for the upserted account
    let codec = TokenCodec::new(common::TEST_JWT_SECRET.as_bytes(), None);
    let claims = codec.verify(&payload.token, TokenPurpose::Access).unwrap();
    assert_eq!(claims.email, "oauth-user@example.com");

    // Second exchange of the same key fails
    let err = federation.exchange_handoff(&key).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::HandoffKeyInvalid);
}

#[tokio::test]
async fn test_google_login_completes_through_stateless_callback() {
    let h = harness().await;
    let federation = federation_with_stub(&h, Provider::Google);

    let authorize_url = federation.login_redirect(Provider::Google).await.unwrap();
    let state = Url::parse(&authorize_url)
        .unwrap()
        .query_pairs()
        .find(|(k, _)| k == "state")
        .map(|(_, v)| v.into_owned());
    assert_eq!(state, None, "a Google redirect must not carry state");

    // The shared callback picks the provider by the echoed state, so a
    // stateless redirect has to land on the Google path and complete
    let routed = if state.is_some() {
        Provider::Github
    } else {
        Provider::Google
    };
    assert_eq!(routed, Provider::Google);

    let deep_link = federation
        .handle_callback(routed, "good-code", state.as_deref())
        .await
        .unwrap();
    federation
        .exchange_handoff(&handoff_key(&deep_link))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_unknown_handoff_key_rejected() {
    let h = harness().await;
    let federation = federation_with_stub(&h, Provider::Google);

    let err = federation.exchange_handoff("no-such-key").await.unwrap_err();
    assert_eq!(err.code, ErrorCode::HandoffKeyInvalid);
}

#[tokio::test]
async fn test_github_callback_requires_stored_state() {
    let h = harness().await;
    let federation = federation_with_stub(&h, Provider::Github);

    // No pending state for this value
    let err = federation
        .handle_callback(Provider::Github, "good-code", Some("forged-state"))
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidInput);

    // A redirect parks the state; the callback then consumes it
    let authorize_url = federation.login_redirect(Provider::Github).await.unwrap();
    let state = Url::parse(&authorize_url)
        .unwrap()
        .query_pairs()
        .find(|(k, _)| k == "state")
        .map(|(_, v)| v.into_owned())
        .unwrap();

    federation
        .handle_callback(Provider::Github, "good-code", Some(&state))
        .await
        .unwrap();

    // State is single-use
    let err = federation
        .handle_callback(Provider::Github, "good-code", Some(&state))
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidInput);
}

#[tokio::test]
async fn test_callback_upserts_verified_federated_account() {
    let h = harness().await;
    let federation = federation_with_stub(&h, Provider::Google);

    federation
        .handle_callback(Provider::Google, "good-code", None)
        .await
        .unwrap();

    let account = h
        .database
        .account_by_email("oauth-user@example.com")
        .await
        .unwrap()
        .unwrap();
    assert!(account.verified);
    assert!(account.password_hash.is_none());
    assert_eq!(account.display_name.as_deref(), Some("OAuth User"));
}

#[tokio::test]
async fn test_rejected_code_surfaces_as_invalid_input() {
    let h = harness().await;
    let federation = federation_with_stub(&h, Provider::Google);

    let err = federation
        .handle_callback(Provider::Google, "bad-code", None)
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidInput);
}

#[tokio::test]
async fn test_disabled_provider_rejected() {
    let h = harness().await;
    // Harness config enables no providers
    let err = h
        .resources
        .federation
        .login_redirect(Provider::Google)
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidInput);
}

#[tokio::test]
async fn test_handoff_keys_expire_with_store_ttl() {
    let h = harness().await;
    let federation = federation_with_stub(&h, Provider::Google);

    let deep_link = federation
        .handle_callback(Provider::Google, "good-code", None)
        .await
        .unwrap();
    let key = handoff_key(&deep_link);

    // Both halves of the parked session carry a TTL
    let token_ttl = h
        .store
        .ttl(&StoreKey::HandoffToken { key: key.clone() })
        .await
        .unwrap()
        .unwrap();
    let profile_ttl = h
        .store
        .ttl(&StoreKey::HandoffProfile { key })
        .await
        .unwrap()
        .unwrap();
    assert!(token_ttl.as_secs() <= 120);
    assert!(profile_ttl.as_secs() <= 120);
}
