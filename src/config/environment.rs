// ABOUTME: Environment configuration management for deployment-specific settings
// ABOUTME: Parses and validates all server settings from environment variables
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2026 Crewmatch

//! Server configuration loaded from environment variables

use crate::errors::{AppError, AppResult};
use crate::store::factory::StoreBackend;
use std::env;

/// Read an environment variable with a default fallback
fn env_var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_owned())
}

/// Read an optional environment variable, treating empty as absent
fn env_var_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.is_empty())
}

/// Complete server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP listen port
    pub http_port: u16,
    /// Relational store settings
    pub database: DatabaseConfig,
    /// Secret store settings
    pub store: StoreSettings,
    /// Token and session settings
    pub auth: AuthConfig,
    /// OAuth federation settings
    pub oauth: OAuthConfig,
    /// Email relay settings
    pub notifier: NotifierConfig,
}

/// Relational store settings
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// sqlx connection URL (SQLite by default)
    pub url: String,
}

/// Secret store settings
#[derive(Debug, Clone)]
pub struct StoreSettings {
    /// Which backend to construct
    pub backend: StoreBackend,
    /// Redis connection URL, required for the Redis backend
    pub redis_url: Option<String>,
    /// Redis connection and retry tuning
    pub redis_connection: RedisConnectionConfig,
}

/// Redis connection and retry configuration
#[derive(Debug, Clone)]
pub struct RedisConnectionConfig {
    /// TCP connect timeout in seconds
    pub connection_timeout_secs: u64,
    /// Per-command response timeout in seconds
    pub response_timeout_secs: u64,
    /// Retries for the initial connection at startup
    pub initial_connection_retries: u32,
    /// Initial delay between startup retries in milliseconds
    pub initial_retry_delay_ms: u64,
    /// Cap on the exponential backoff delay in milliseconds
    pub max_retry_delay_ms: u64,
    /// Reconnection retries handed to the connection manager
    pub reconnection_retries: usize,
}

impl Default for RedisConnectionConfig {
    fn default() -> Self {
        Self {
            connection_timeout_secs: 5,
            response_timeout_secs: 3,
            initial_connection_retries: 5,
            initial_retry_delay_ms: 200,
            max_retry_delay_ms: 5_000,
            reconnection_retries: 6,
        }
    }
}

/// Token and session settings
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// HS256 signing secret, at least 32 bytes
    pub jwt_secret: String,
    /// Optional key id stamped into token headers for future rotation
    pub jwt_key_id: Option<String>,
    /// URL scheme of the mobile deep link receiving OAuth handoff keys
    pub deep_link_scheme: String,
}

/// Per-provider OAuth client credentials
#[derive(Debug, Clone)]
pub struct OAuthClientConfig {
    /// Client id issued by the provider
    pub client_id: String,
    /// Client secret issued by the provider
    pub client_secret: String,
    /// Redirect URI registered with the provider
    pub redirect_uri: String,
}

/// OAuth federation settings; a provider with no credentials is disabled
#[derive(Debug, Clone, Default)]
pub struct OAuthConfig {
    /// Google OAuth client
    pub google: Option<OAuthClientConfig>,
    /// GitHub OAuth client
    pub github: Option<OAuthClientConfig>,
}

/// Email relay settings
#[derive(Debug, Clone)]
pub struct NotifierConfig {
    /// HTTP endpoint of the relay; absent disables outbound email
    pub endpoint: Option<String>,
    /// API key sent as a bearer header to the relay
    pub api_key: Option<String>,
    /// From address stamped on every message
    pub from_address: String,
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if a variable fails to parse or validation fails
    pub fn from_env() -> AppResult<Self> {
        let http_port = env_var_or("HTTP_PORT", "8080")
            .parse::<u16>()
            .map_err(|e| AppError::config(format!("Invalid HTTP_PORT: {e}")))?;

        let database = DatabaseConfig {
            url: env_var_or("DATABASE_URL", "sqlite:./data/crewmatch_auth.db?mode=rwc"),
        };

        let backend = env_var_or("STORE_BACKEND", "redis").parse::<StoreBackend>()?;
        let store = StoreSettings {
            backend,
            redis_url: env_var_opt("REDIS_URL"),
            redis_connection: RedisConnectionConfig::from_env()?,
        };

        let auth = AuthConfig {
            jwt_secret: env_var_or("JWT_SECRET", ""),
            jwt_key_id: env_var_opt("JWT_KEY_ID"),
            deep_link_scheme: env_var_or("DEEP_LINK_SCHEME", "crewmatch"),
        };

        let oauth = OAuthConfig {
            google: Self::oauth_client_from_env("GOOGLE"),
            github: Self::oauth_client_from_env("GITHUB"),
        };

        let notifier = NotifierConfig {
            endpoint: env_var_opt("EMAIL_RELAY_URL"),
            api_key: env_var_opt("EMAIL_RELAY_API_KEY"),
            from_address: env_var_or("EMAIL_FROM_ADDRESS", "no-reply@crewmatch.app"),
        };

        let config = Self {
            http_port,
            database,
            store,
            auth,
            oauth,
            notifier,
        };
        config.validate()?;
        Ok(config)
    }

    /// Read `{PREFIX}_CLIENT_ID` / `{PREFIX}_CLIENT_SECRET` /
    /// `{PREFIX}_REDIRECT_URI`; the provider stays disabled unless id and
    /// secret are both present
    fn oauth_client_from_env(prefix: &str) -> Option<OAuthClientConfig> {
        let client_id = env_var_opt(&format!("{prefix}_CLIENT_ID"))?;
        let client_secret = env_var_opt(&format!("{prefix}_CLIENT_SECRET"))?;
        let redirect_uri = env_var_or(
            &format!("{prefix}_REDIRECT_URI"),
            &format!(
                "http://localhost:{}/auth/callback",
                env_var_or("HTTP_PORT", "8080")
            ),
        );

        Some(OAuthClientConfig {
            client_id,
            client_secret,
            redirect_uri,
        })
    }

    /// Validate configuration invariants
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot produce a working server
    pub fn validate(&self) -> AppResult<()> {
        if self.auth.jwt_secret.len() < 32 {
            return Err(AppError::config(
                "JWT_SECRET must be set and at least 32 bytes long",
            ));
        }

        if self.store.backend == StoreBackend::Redis && self.store.redis_url.is_none() {
            return Err(AppError::config(
                "REDIS_URL is required when STORE_BACKEND=redis",
            ));
        }

        if self.auth.deep_link_scheme.is_empty()
            || !self
                .auth
                .deep_link_scheme
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '+' || c == '.')
        {
            return Err(AppError::config("DEEP_LINK_SCHEME is not a valid URL scheme"));
        }

        Ok(())
    }

    /// Secret-free configuration summary for startup logging
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "http_port={} database={} store_backend={:?} oauth_google={} oauth_github={} email_relay={}",
            self.http_port,
            self.database.url,
            self.store.backend,
            self.oauth.google.is_some(),
            self.oauth.github.is_some(),
            self.notifier.endpoint.is_some(),
        )
    }
}

impl RedisConnectionConfig {
    /// Load Redis connection tuning from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if a variable fails to parse
    pub fn from_env() -> AppResult<Self> {
        let defaults = Self::default();

        let parse_u64 = |key: &str, default: u64| -> AppResult<u64> {
            env_var_or(key, &default.to_string())
                .parse::<u64>()
                .map_err(|e| AppError::config(format!("Invalid {key}: {e}")))
        };

        Ok(Self {
            connection_timeout_secs: parse_u64(
                "REDIS_CONNECTION_TIMEOUT_SECS",
                defaults.connection_timeout_secs,
            )?,
            response_timeout_secs: parse_u64(
                "REDIS_RESPONSE_TIMEOUT_SECS",
                defaults.response_timeout_secs,
            )?,
            initial_connection_retries: parse_u64(
                "REDIS_INITIAL_CONNECTION_RETRIES",
                u64::from(defaults.initial_connection_retries),
            )? as u32,
            initial_retry_delay_ms: parse_u64(
                "REDIS_INITIAL_RETRY_DELAY_MS",
                defaults.initial_retry_delay_ms,
            )?,
            max_retry_delay_ms: parse_u64("REDIS_MAX_RETRY_DELAY_MS", defaults.max_retry_delay_ms)?,
            reconnection_retries: parse_u64(
                "REDIS_RECONNECTION_RETRIES",
                defaults.reconnection_retries as u64,
            )? as usize,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> ServerConfig {
        ServerConfig {
            http_port: 8080,
            database: DatabaseConfig {
                url: "sqlite::memory:".into(),
            },
            store: StoreSettings {
                backend: StoreBackend::Memory,
                redis_url: None,
                redis_connection: RedisConnectionConfig::default(),
            },
            auth: AuthConfig {
                jwt_secret: "0123456789abcdef0123456789abcdef".into(),
                jwt_key_id: None,
                deep_link_scheme: "crewmatch".into(),
            },
            oauth: OAuthConfig::default(),
            notifier: NotifierConfig {
                endpoint: None,
                api_key: None,
                from_address: "no-reply@crewmatch.app".into(),
            },
        }
    }

    #[test]
    fn test_valid_config_passes() {
        base_config().validate().unwrap();
    }

    #[test]
    fn test_short_jwt_secret_rejected() {
        let mut config = base_config();
        config.auth.jwt_secret = "too-short".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_redis_backend_requires_url() {
        let mut config = base_config();
        config.store.backend = StoreBackend::Redis;
        assert!(config.validate().is_err());

        config.store.redis_url = Some("redis://localhost:6379".into());
        config.validate().unwrap();
    }

    #[test]
    fn test_bad_deep_link_scheme_rejected() {
        let mut config = base_config();
        config.auth.deep_link_scheme = "not a scheme".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_summary_has_no_secrets() {
        let mut config = base_config();
        config.auth.jwt_secret = "super-secret-value-0123456789abcdef".into();
        assert!(!config.summary().contains("super-secret-value"));
    }
}
