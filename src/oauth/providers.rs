// ABOUTME: Google and GitHub OAuth provider implementations
// ABOUTME: Authorization URL construction, code exchange, and profile fetch
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2026 Crewmatch

use super::{FederationError, OAuthProvider, Provider, ProviderIdentity};
use crate::config::environment::OAuthClientConfig;
use serde::Deserialize;

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";

const GITHUB_AUTH_URL: &str = "https://github.com/login/oauth/authorize";
const GITHUB_TOKEN_URL: &str = "https://github.com/login/oauth/access_token";
const GITHUB_USER_URL: &str = "https://api.github.com/user";
const GITHUB_EMAILS_URL: &str = "https://api.github.com/user/emails";

/// Google OpenID Connect provider
pub struct GoogleProvider {
    config: OAuthClientConfig,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct GoogleTokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct GoogleUserInfo {
    email: Option<String>,
    email_verified: Option<bool>,
    name: Option<String>,
    picture: Option<String>,
}

impl GoogleProvider {
    /// Create a Google provider from client credentials
    #[must_use]
    pub fn new(config: OAuthClientConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait::async_trait]
impl OAuthProvider for GoogleProvider {
    fn provider(&self) -> Provider {
        Provider::Google
    }

    // The Google flow is stateless: no state parameter, so the callback
    // never mistakes a Google redirect for a GitHub one
    fn authorize_url(&self, _state: Option<&str>) -> String {
        format!(
            "{GOOGLE_AUTH_URL}?client_id={}&redirect_uri={}&response_type=code&scope={}",
            urlencoding::encode(&self.config.client_id),
            urlencoding::encode(&self.config.redirect_uri),
            urlencoding::encode("openid email profile"),
        )
    }

    async fn exchange_identity(&self, code: &str) -> Result<ProviderIdentity, FederationError> {
        let params = [
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("code", code),
            ("grant_type", "authorization_code"),
            ("redirect_uri", self.config.redirect_uri.as_str()),
        ];

        let response = self
            .client
            .post(GOOGLE_TOKEN_URL)
            .form(&params)
            .send()
            .await
            .map_err(|e| FederationError::Upstream(format!("Google token request: {e}")))?;

        if !response.status().is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(FederationError::CodeRejected(detail));
        }

        let token: GoogleTokenResponse = response
            .json()
            .await
            .map_err(|e| FederationError::Upstream(format!("Google token decode: {e}")))?;

        let userinfo: GoogleUserInfo = self
            .client
            .get(GOOGLE_USERINFO_URL)
            .bearer_auth(&token.access_token)
            .send()
            .await
            .map_err(|e| FederationError::Upstream(format!("Google userinfo request: {e}")))?
            .json()
            .await
            .map_err(|e| FederationError::Upstream(format!("Google userinfo decode: {e}")))?;

        if userinfo.email_verified != Some(true) {
            return Err(FederationError::NoVerifiedEmail);
        }
        let email = userinfo.email.ok_or(FederationError::NoVerifiedEmail)?;

        Ok(ProviderIdentity {
            email: email.to_lowercase(),
            name: userinfo.name,
            avatar_url: userinfo.picture,
        })
    }
}

/// GitHub OAuth provider
pub struct GithubProvider {
    config: OAuthClientConfig,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct GithubTokenResponse {
    access_token: Option<String>,
    error_description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GithubUser {
    name: Option<String>,
    login: String,
    avatar_url: Option<String>,
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GithubEmail {
    email: String,
    primary: bool,
    verified: bool,
}

impl GithubProvider {
    /// Create a GitHub provider from client credentials
    #[must_use]
    pub fn new(config: OAuthClientConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    /// GitHub hides private emails on /user; the emails endpoint lists the
    /// verified primary address
    async fn primary_email(&self, access_token: &str) -> Result<String, FederationError> {
        let emails: Vec<GithubEmail> = self
            .client
            .get(GITHUB_EMAILS_URL)
            .bearer_auth(access_token)
            .header("User-Agent", "crewmatch-auth")
            .send()
            .await
            .map_err(|e| FederationError::Upstream(format!("GitHub emails request: {e}")))?
            .json()
            .await
            .map_err(|e| FederationError::Upstream(format!("GitHub emails decode: {e}")))?;

        emails
            .into_iter()
            .find(|e| e.primary && e.verified)
            .map(|e| e.email)
            .ok_or(FederationError::NoVerifiedEmail)
    }
}

#[async_trait::async_trait]
impl OAuthProvider for GithubProvider {
    fn provider(&self) -> Provider {
        Provider::Github
    }

    fn authorize_url(&self, state: Option<&str>) -> String {
        let mut url = format!(
            "{GITHUB_AUTH_URL}?client_id={}&redirect_uri={}&scope={}",
            urlencoding::encode(&self.config.client_id),
            urlencoding::encode(&self.config.redirect_uri),
            urlencoding::encode("read:user user:email"),
        );
        if let Some(state) = state {
            url.push_str("&state=");
            url.push_str(&urlencoding::encode(state));
        }
        url
    }

    async fn exchange_identity(&self, code: &str) -> Result<ProviderIdentity, FederationError> {
        let params = [
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("code", code),
            ("redirect_uri", self.config.redirect_uri.as_str()),
        ];

        let token: GithubTokenResponse = self
            .client
            .post(GITHUB_TOKEN_URL)
            .header("Accept", "application/json")
            .form(&params)
            .send()
            .await
            .map_err(|e| FederationError::Upstream(format!("GitHub token request: {e}")))?
            .json()
            .await
            .map_err(|e| FederationError::Upstream(format!("GitHub token decode: {e}")))?;

        let access_token = token.access_token.ok_or_else(|| {
            FederationError::CodeRejected(
                token
                    .error_description
                    .unwrap_or_else(|| "no access token in response".into()),
            )
        })?;

        let user: GithubUser = self
            .client
            .get(GITHUB_USER_URL)
            .bearer_auth(&access_token)
            .header("User-Agent", "crewmatch-auth")
            .send()
            .await
            .map_err(|e| FederationError::Upstream(format!("GitHub user request: {e}")))?
            .json()
            .await
            .map_err(|e| FederationError::Upstream(format!("GitHub user decode: {e}")))?;

        let email = match user.email {
            Some(email) => email,
            None => self.primary_email(&access_token).await?,
        };

        Ok(ProviderIdentity {
            email: email.to_lowercase(),
            name: user.name.or(Some(user.login)),
            avatar_url: user.avatar_url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client_config() -> OAuthClientConfig {
        OAuthClientConfig {
            client_id: "client-id".into(),
            client_secret: "client-secret".into(),
            redirect_uri: "http://localhost:8080/auth/callback".into(),
        }
    }

    #[test]
    fn test_google_authorize_url_is_stateless() {
        let provider = GoogleProvider::new(test_client_config());
        let url = provider.authorize_url(None);
        assert!(url.starts_with(GOOGLE_AUTH_URL));
        assert!(!url.contains("state"));
        assert!(url.contains("scope=openid%20email%20profile"));
        assert!(url.contains("response_type=code"));

        // A stray state never leaks into the URL either
        assert!(!provider.authorize_url(Some("s-1")).contains("state"));
    }

    #[test]
    fn test_github_authorize_url_carries_state() {
        let provider = GithubProvider::new(test_client_config());
        let url = provider.authorize_url(Some("state-456"));
        assert!(url.starts_with(GITHUB_AUTH_URL));
        assert!(url.contains("state=state-456"));
        assert!(url.contains("client_id=client-id"));
    }
}
