// ABOUTME: Account management database operations
// ABOUTME: Handles account creation, lookup, verification, and federated upsert
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2026 Crewmatch

use super::Database;
use crate::errors::{AppError, AppResult};
use crate::models::Account;
use chrono::Utc;
use sqlx::Row;
use uuid::Uuid;

/// Map a sqlx error, translating unique-email violations into the
/// conflict the API reports
fn map_insert_error(e: &sqlx::Error) -> AppError {
    let message = e.to_string();
    if message.contains("UNIQUE constraint failed: accounts.email") {
        AppError::email_already_registered()
    } else {
        AppError::database(format!("Account insert failed: {message}"))
    }
}

fn row_to_account(row: &sqlx::sqlite::SqliteRow) -> AppResult<Account> {
    let id: String = row.get("id");
    Ok(Account {
        id: Uuid::parse_str(&id)
            .map_err(|e| AppError::database(format!("Corrupt account id '{id}': {e}")))?,
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        display_name: row.get("display_name"),
        avatar_url: row.get("avatar_url"),
        verified: row.get("verified"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

impl Database {
    /// Create the accounts table and indexes
    pub(super) async fn migrate_accounts(&self) -> AppResult<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS accounts (
                id TEXT PRIMARY KEY,
                email TEXT UNIQUE NOT NULL,
                password_hash TEXT,
                display_name TEXT,
                avatar_url TEXT,
                verified BOOLEAN NOT NULL DEFAULT 0,
                created_at DATETIME NOT NULL,
                updated_at DATETIME NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Migration failed: {e}")))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_accounts_email ON accounts(email)")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Migration failed: {e}")))?;

        Ok(())
    }

    /// Insert a new unverified password account
    ///
    /// # Errors
    ///
    /// Returns `EmailAlreadyRegistered` on a unique-email violation
    pub async fn create_account(
        &self,
        email: &str,
        password_hash: &str,
        display_name: Option<&str>,
    ) -> AppResult<Account> {
        let now = Utc::now();
        let account = Account {
            id: Uuid::new_v4(),
            email: email.to_owned(),
            password_hash: Some(password_hash.to_owned()),
            display_name: display_name.map(ToOwned::to_owned),
            avatar_url: None,
            verified: false,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r"
            INSERT INTO accounts (id, email, password_hash, display_name, avatar_url, verified, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ",
        )
        .bind(account.id.to_string())
        .bind(&account.email)
        .bind(&account.password_hash)
        .bind(&account.display_name)
        .bind(&account.avatar_url)
        .bind(account.verified)
        .bind(account.created_at)
        .bind(account.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_insert_error(&e))?;

        Ok(account)
    }

    /// Look up an account by normalized email
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn account_by_email(&self, email: &str) -> AppResult<Option<Account>> {
        let row = sqlx::query("SELECT * FROM accounts WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Account lookup failed: {e}")))?;

        row.as_ref().map(row_to_account).transpose()
    }

    /// Look up an account by id
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn account_by_id(&self, id: Uuid) -> AppResult<Option<Account>> {
        let row = sqlx::query("SELECT * FROM accounts WHERE id = $1")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Account lookup failed: {e}")))?;

        row.as_ref().map(row_to_account).transpose()
    }

    /// Mark an account's email as verified
    ///
    /// # Errors
    ///
    /// Returns `UserNotFound` if no such account exists
    pub async fn mark_verified(&self, id: Uuid) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE accounts SET verified = 1, updated_at = $2 WHERE id = $1",
        )
        .bind(id.to_string())
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Account update failed: {e}")))?;

        if result.rows_affected() == 0 {
            return Err(AppError::user_not_found());
        }
        Ok(())
    }

    /// Replace an account's password hash
    ///
    /// # Errors
    ///
    /// Returns `UserNotFound` if no such account exists
    pub async fn update_password_hash(&self, id: Uuid, password_hash: &str) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE accounts SET password_hash = $2, updated_at = $3 WHERE id = $1",
        )
        .bind(id.to_string())
        .bind(password_hash)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Account update failed: {e}")))?;

        if result.rows_affected() == 0 {
            return Err(AppError::user_not_found());
        }
        Ok(())
    }

    /// Create or refresh an account from a federated identity
    ///
    /// A new account is inserted already verified and without a password.
    /// An existing account is marked verified (the provider vouches for the
    /// email), picks up a display name it was missing, and refreshes its
    /// avatar to the provider's current one; an existing password hash is
    /// left untouched.
    ///
    /// # Errors
    ///
    /// Returns an error if a query fails
    pub async fn upsert_federated_account(
        &self,
        email: &str,
        display_name: Option<&str>,
        avatar_url: Option<&str>,
    ) -> AppResult<Account> {
        if let Some(existing) = self.account_by_email(email).await? {
            sqlx::query(
                r"
                UPDATE accounts SET
                    verified = 1,
                    display_name = COALESCE(display_name, $2),
                    avatar_url = COALESCE($3, avatar_url),
                    updated_at = $4
                WHERE id = $1
                ",
            )
            .bind(existing.id.to_string())
            .bind(display_name)
            .bind(avatar_url)
            .bind(Utc::now())
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Account update failed: {e}")))?;

            return self
                .account_by_id(existing.id)
                .await?
                .ok_or_else(AppError::user_not_found);
        }

        let now = Utc::now();
        let account = Account {
            id: Uuid::new_v4(),
            email: email.to_owned(),
            password_hash: None,
            display_name: display_name.map(ToOwned::to_owned),
            avatar_url: avatar_url.map(ToOwned::to_owned),
            verified: true,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r"
            INSERT INTO accounts (id, email, password_hash, display_name, avatar_url, verified, created_at, updated_at)
            VALUES ($1, $2, NULL, $3, $4, 1, $5, $6)
            ",
        )
        .bind(account.id.to_string())
        .bind(&account.email)
        .bind(&account.display_name)
        .bind(&account.avatar_url)
        .bind(account.created_at)
        .bind(account.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_insert_error(&e))?;

        Ok(account)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorCode;

    async fn test_db() -> Database {
        Database::new("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn test_create_and_lookup() {
        let db = test_db().await;
        let created = db
            .create_account("user@example.com", "$2b$12$hash", Some("Sam"))
            .await
            .unwrap();
        assert!(!created.verified);

        let found = db.account_by_email("user@example.com").await.unwrap().unwrap();
        assert_eq!(found.id, created.id);
        assert_eq!(found.display_name.as_deref(), Some("Sam"));

        assert!(db.account_by_email("other@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_email_maps_to_conflict() {
        let db = test_db().await;
        db.create_account("user@example.com", "$2b$12$hash", None)
            .await
            .unwrap();

        let err = db
            .create_account("user@example.com", "$2b$12$other", None)
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::EmailAlreadyRegistered);
    }

    #[tokio::test]
    async fn test_mark_verified() {
        let db = test_db().await;
        let account = db
            .create_account("user@example.com", "$2b$12$hash", None)
            .await
            .unwrap();

        db.mark_verified(account.id).await.unwrap();
        let found = db.account_by_id(account.id).await.unwrap().unwrap();
        assert!(found.verified);

        let err = db.mark_verified(Uuid::new_v4()).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::UserNotFound);
    }

    #[tokio::test]
    async fn test_federated_upsert_creates_passwordless_verified_account() {
        let db = test_db().await;
        let account = db
            .upsert_federated_account("oauth@example.com", Some("Sam"), Some("https://a/p.png"))
            .await
            .unwrap();

        assert!(account.verified);
        assert!(account.password_hash.is_none());
        assert_eq!(account.avatar_url.as_deref(), Some("https://a/p.png"));
    }

    #[tokio::test]
    async fn test_federated_upsert_keeps_existing_password_and_verifies() {
        let db = test_db().await;
        let created = db
            .create_account("user@example.com", "$2b$12$hash", None)
            .await
            .unwrap();

        let upserted = db
            .upsert_federated_account("user@example.com", Some("Sam"), None)
            .await
            .unwrap();

        assert_eq!(upserted.id, created.id);
        assert!(upserted.verified);
        assert_eq!(upserted.password_hash.as_deref(), Some("$2b$12$hash"));
        assert_eq!(upserted.display_name.as_deref(), Some("Sam"));
    }

    #[tokio::test]
    async fn test_federated_upsert_refreshes_avatar() {
        let db = test_db().await;
        db.upsert_federated_account("oauth@example.com", None, Some("https://a/old.png"))
            .await
            .unwrap();

        let updated = db
            .upsert_federated_account("oauth@example.com", None, Some("https://a/new.png"))
            .await
            .unwrap();
        assert_eq!(updated.avatar_url.as_deref(), Some("https://a/new.png"));

        // A provider that reports no avatar leaves the stored one alone
        let unchanged = db
            .upsert_federated_account("oauth@example.com", None, None)
            .await
            .unwrap();
        assert_eq!(unchanged.avatar_url.as_deref(), Some("https://a/new.png"));
    }
}
