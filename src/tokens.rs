// ABOUTME: Signed claims token codec with typed purposes and expiry enforcement
// ABOUTME: Handles token issue, verification, and purpose checks for all session flows
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2026 Crewmatch

//! # Token Codec
//!
//! HS256 claims tokens with a typed purpose. Every verification checks the
//! signature, the expiry, and that the token was minted for the purpose the
//! caller expects, so an access token can never stand in for a
//! password-reset token or vice versa.

use crate::errors::{AppError, ErrorCode};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

/// Token lifetimes per purpose
pub mod lifetimes {
    use chrono::Duration;

    /// Access token issued by password login
    #[must_use]
    pub fn access() -> Duration {
        Duration::minutes(30)
    }

    /// Access token issued right after OTP verification (longer so the
    /// fresh signup survives profile completion)
    #[must_use]
    pub fn access_post_verify() -> Duration {
        Duration::minutes(120)
    }

    /// Access token minted for an OAuth handoff
    #[must_use]
    pub fn access_federated() -> Duration {
        Duration::hours(1)
    }

    /// Refresh token
    #[must_use]
    pub fn refresh() -> Duration {
        Duration::days(7)
    }

    /// Password-reset token
    #[must_use]
    pub fn password_reset() -> Duration {
        Duration::minutes(15)
    }
}

/// What a token authorizes
///
/// A closed set: verification requires the caller to name the purpose it
/// expects, and a mismatch is rejected before any claims are trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenPurpose {
    /// Authenticated API access
    Access,
    /// Minting a new access token
    Refresh,
    /// Completing email verification
    EmailVerification,
    /// Setting a new password
    PasswordReset,
}

impl TokenPurpose {
    /// Wire name of the purpose
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Access => "access",
            Self::Refresh => "refresh",
            Self::EmailVerification => "email_verification",
            Self::PasswordReset => "password_reset",
        }
    }
}

impl fmt::Display for TokenPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Claims carried by every token
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Account id
    pub sub: String,
    /// Account email at issue time
    pub email: String,
    /// Purpose the token was minted for
    pub purpose: TokenPurpose,
    /// Issued at (milliseconds, made unique by a per-process counter)
    pub iat: i64,
    /// Expiration timestamp (seconds)
    pub exp: i64,
}

impl Claims {
    /// Parse the subject as an account id
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Invalid`] when the subject is not a UUID
    pub fn account_id(&self) -> Result<Uuid, TokenError> {
        Uuid::parse_str(&self.sub).map_err(|_| TokenError::Invalid {
            reason: format!("Token subject is not a valid account id: {}", self.sub),
        })
    }
}

/// Token validation error with detailed information
#[derive(Debug, Clone, thiserror::Error)]
pub enum TokenError {
    /// Token is past its expiry
    #[error("token expired at {expired_at}")]
    Expired {
        /// When the token expired
        expired_at: DateTime<Utc>,
    },
    /// Signature or claims are invalid
    #[error("token is invalid: {reason}")]
    Invalid {
        /// Reason for invalidity
        reason: String,
    },
    /// Token is not in proper compact form
    #[error("token is malformed: {details}")]
    Malformed {
        /// Details about the malformation
        details: String,
    },
    /// Token was minted for a different purpose
    #[error("token purpose is {found}, expected {expected}")]
    PurposeMismatch {
        /// Purpose the caller required
        expected: TokenPurpose,
        /// Purpose found in the token
        found: TokenPurpose,
    },
}

impl From<TokenError> for AppError {
    fn from(error: TokenError) -> Self {
        let code = match &error {
            TokenError::Expired { .. } => ErrorCode::TokenExpired,
            TokenError::Invalid { .. } | TokenError::Malformed { .. } => ErrorCode::TokenInvalid,
            TokenError::PurposeMismatch { .. } => ErrorCode::TokenPurposeMismatch,
        };
        Self::new(code, error.to_string()).with_source(error)
    }
}

/// Issues and verifies signed claims tokens
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    /// Key id stamped into headers so a future rotation can tell old and
    /// new secrets apart; verification currently accepts any kid since a
    /// single secret is active
    key_id: Option<String>,
    /// Monotonic counter to keep issued-at values unique per process
    token_counter: AtomicU64,
}

impl TokenCodec {
    /// Create a codec over the given HS256 secret
    #[must_use]
    pub fn new(secret: &[u8], key_id: Option<String>) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            key_id,
            token_counter: AtomicU64::new(0),
        }
    }

    /// Issue a token for `account_id` with the given purpose and lifetime
    ///
    /// # Errors
    ///
    /// Returns an error if JWT encoding fails
    pub fn issue(
        &self,
        account_id: Uuid,
        email: &str,
        purpose: TokenPurpose,
        lifetime: Duration,
    ) -> Result<String, TokenError> {
        let now = Utc::now();
        let expiry = now + lifetime;

        // Atomic counter keeps iat unique across rapid issuance
        let counter = self.token_counter.fetch_add(1, Ordering::Relaxed);
        let unique_iat =
            now.timestamp() * 1000 + i64::from(u32::try_from(counter % 1000).unwrap_or(0));

        let claims = Claims {
            sub: account_id.to_string(),
            email: email.to_owned(),
            purpose,
            iat: unique_iat,
            exp: expiry.timestamp(),
        };

        let mut header = Header::new(Algorithm::HS256);
        header.kid = self.key_id.clone();

        encode(&header, &claims, &self.encoding_key).map_err(|e| TokenError::Invalid {
            reason: format!("Token encoding failed: {e}"),
        })
    }

    /// Verify a token and require it was minted for `expected`
    ///
    /// Signature is checked first, then expiry, then purpose, so the error
    /// reported reflects the strongest failed check.
    ///
    /// # Errors
    ///
    /// Returns a [`TokenError`] if the signature is invalid, the token is
    /// malformed or expired, or the purpose does not match
    pub fn verify(&self, token: &str, expected: TokenPurpose) -> Result<Claims, TokenError> {
        let claims = self.decode_claims(token)?;
        Self::check_expiry(&claims)?;

        if claims.purpose != expected {
            tracing::warn!(
                "token purpose mismatch for subject {}: expected {}, found {}",
                claims.sub,
                expected,
                claims.purpose
            );
            return Err(TokenError::PurposeMismatch {
                expected,
                found: claims.purpose,
            });
        }

        Ok(claims)
    }

    /// Decode claims without expiration validation
    fn decode_claims(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| Self::convert_jwt_error(&e))
    }

    /// Check claims expiry with a detailed error
    fn check_expiry(claims: &Claims) -> Result<(), TokenError> {
        let current_time = Utc::now();
        if current_time.timestamp() > claims.exp {
            let expired_at = DateTime::from_timestamp(claims.exp, 0).unwrap_or_else(Utc::now);
            tracing::debug!(
                "token for subject {} expired at {}",
                claims.sub,
                expired_at.to_rfc3339()
            );
            return Err(TokenError::Expired { expired_at });
        }
        Ok(())
    }

    /// Convert JWT library errors to detailed validation errors
    fn convert_jwt_error(e: &jsonwebtoken::errors::Error) -> TokenError {
        use jsonwebtoken::errors::ErrorKind;

        match e.kind() {
            ErrorKind::InvalidSignature => TokenError::Invalid {
                reason: "Token signature verification failed".into(),
            },
            ErrorKind::InvalidToken => TokenError::Malformed {
                details: "Token format is invalid".into(),
            },
            ErrorKind::Base64(base64_err) => TokenError::Malformed {
                details: format!("Token contains invalid base64: {base64_err}"),
            },
            ErrorKind::Json(json_err) => TokenError::Malformed {
                details: format!("Token contains invalid JSON: {json_err}"),
            },
            ErrorKind::Utf8(utf8_err) => TokenError::Malformed {
                details: format!("Token contains invalid UTF-8: {utf8_err}"),
            },
            _ => TokenError::Invalid {
                reason: format!("Token validation failed: {e}"),
            },
        }
    }
}

/// Hex digest of a token's signature segment
///
/// Used to record consumed single-use tokens without storing the token
/// itself. The signature uniquely identifies an issued token (claims plus
/// unique iat), so the digest is collision-free for this use.
#[must_use]
pub fn signature_digest(token: &str) -> String {
    let signature = token.rsplit('.').next().unwrap_or(token);
    let mut hasher = Sha256::new();
    hasher.update(signature.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec() -> TokenCodec {
        TokenCodec::new(b"test-secret-at-least-32-bytes-long!", None)
    }

    #[test]
    fn test_issue_and_verify_roundtrip() {
        let codec = codec();
        let id = Uuid::new_v4();

        let token = codec
            .issue(id, "user@example.com", TokenPurpose::Access, lifetimes::access())
            .unwrap();
        let claims = codec.verify(&token, TokenPurpose::Access).unwrap();

        assert_eq!(claims.account_id().unwrap(), id);
        assert_eq!(claims.email, "user@example.com");
        assert_eq!(claims.purpose, TokenPurpose::Access);
    }

    #[test]
    fn test_purpose_mismatch_rejected() {
        let codec = codec();
        let token = codec
            .issue(
                Uuid::new_v4(),
                "user@example.com",
                TokenPurpose::Access,
                lifetimes::access(),
            )
            .unwrap();

        let err = codec
            .verify(&token, TokenPurpose::PasswordReset)
            .unwrap_err();
        assert!(matches!(
            err,
            TokenError::PurposeMismatch {
                expected: TokenPurpose::PasswordReset,
                found: TokenPurpose::Access,
            }
        ));
    }

    #[test]
    fn test_expired_token_rejected() {
        let codec = codec();
        let token = codec
            .issue(
                Uuid::new_v4(),
                "user@example.com",
                TokenPurpose::Access,
                Duration::seconds(-60),
            )
            .unwrap();

        let err = codec.verify(&token, TokenPurpose::Access).unwrap_err();
        assert!(matches!(err, TokenError::Expired { .. }));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let issuing = codec();
        let verifying = TokenCodec::new(b"a-completely-different-secret-value", None);

        let token = issuing
            .issue(
                Uuid::new_v4(),
                "user@example.com",
                TokenPurpose::Access,
                lifetimes::access(),
            )
            .unwrap();

        let err = verifying.verify(&token, TokenPurpose::Access).unwrap_err();
        assert!(matches!(err, TokenError::Invalid { .. }));
    }

    #[test]
    fn test_garbage_token_is_malformed() {
        let err = codec()
            .verify("not-a-token", TokenPurpose::Access)
            .unwrap_err();
        assert!(matches!(
            err,
            TokenError::Malformed { .. } | TokenError::Invalid { .. }
        ));
    }

    #[test]
    fn test_signature_digests_differ_per_token() {
        let codec = codec();
        let id = Uuid::new_v4();
        let a = codec
            .issue(id, "user@example.com", TokenPurpose::PasswordReset, lifetimes::password_reset())
            .unwrap();
        let b = codec
            .issue(id, "user@example.com", TokenPurpose::PasswordReset, lifetimes::password_reset())
            .unwrap();

        // Unique iat guarantees distinct signatures for back-to-back tokens
        assert_ne!(signature_digest(&a), signature_digest(&b));
    }

    #[test]
    fn test_kid_present_when_configured() {
        let codec = TokenCodec::new(b"test-secret-at-least-32-bytes-long!", Some("k1".into()));
        let token = codec
            .issue(
                Uuid::new_v4(),
                "user@example.com",
                TokenPurpose::Access,
                lifetimes::access(),
            )
            .unwrap();

        let header = jsonwebtoken::decode_header(&token).unwrap();
        assert_eq!(header.kid.as_deref(), Some("k1"));
    }
}
