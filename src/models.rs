// ABOUTME: Core data models for accounts and session handoff payloads
// ABOUTME: Defines the Account record and the public user snapshot shared with clients
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2026 Crewmatch

//! Core data models shared across services and routes

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Durable account record
///
/// `password_hash` is `None` for accounts created through OAuth federation;
/// such accounts can never pass password verification. `verified` gates
/// every password-login token issue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    /// Unique account id
    pub id: Uuid,
    /// Normalized (lowercased, trimmed) email, unique
    pub email: String,
    /// bcrypt hash, absent for federated accounts
    pub password_hash: Option<String>,
    /// Display name
    pub display_name: Option<String>,
    /// Avatar URL from the federated provider, if any
    pub avatar_url: Option<String>,
    /// Whether the email has been verified (OTP or trusted provider)
    pub verified: bool,
    /// When the account was created
    pub created_at: DateTime<Utc>,
    /// When the account was last updated
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Whether the account can attempt password login at all
    #[must_use]
    pub const fn has_password(&self) -> bool {
        self.password_hash.is_some()
    }
}

/// Public account snapshot shared with clients
///
/// This is the `user` object inside the OAuth handoff payload and the
/// `/auth/me` response. It never carries the password hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    /// Account id
    pub id: Uuid,
    /// Account email
    pub email: String,
    /// Display name
    pub name: Option<String>,
    /// Avatar URL
    #[serde(rename = "photoUrl")]
    pub photo_url: Option<String>,
}

impl From<&Account> for UserProfile {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id,
            email: account.email.clone(),
            name: account.display_name.clone(),
            photo_url: account.avatar_url.clone(),
        }
    }
}

/// Session payload parked for the mobile client during an OAuth handoff
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandoffPayload {
    /// Bearer token for API access
    pub token: String,
    /// Always "Bearer"
    #[serde(rename = "tokenType")]
    pub token_type: String,
    /// Token lifetime in seconds
    #[serde(rename = "expiresIn")]
    pub expires_in: u64,
    /// Public snapshot of the authenticated account
    pub user: UserProfile,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_never_leaks_password_hash() {
        let account = Account {
            id: Uuid::new_v4(),
            email: "user@example.com".into(),
            password_hash: Some("$2b$12$secret".into()),
            display_name: Some("Sam".into()),
            avatar_url: None,
            verified: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let profile = UserProfile::from(&account);
        let json = serde_json::to_string(&profile).unwrap();
        assert!(!json.contains("secret"));
        assert!(json.contains("photoUrl"));
    }
}
