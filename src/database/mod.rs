// ABOUTME: Relational store for durable account records
// ABOUTME: sqlx pool management and schema migration
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2026 Crewmatch

//! Relational store
//!
//! Durable `Account` records live here; every time-boxed secret lives in
//! the secret store instead.

/// Account CRUD operations
pub mod accounts;

use crate::errors::{AppError, AppResult};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use tracing::info;

/// Database handle over a sqlx connection pool
#[derive(Clone)]
pub struct Database {
    pub(crate) pool: SqlitePool,
}

impl Database {
    /// Connect and run schema migration
    ///
    /// # Errors
    ///
    /// Returns an error if the connection or migration fails
    pub async fn new(url: &str) -> AppResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .connect(url)
            .await
            .map_err(|e| AppError::database(format!("Failed to connect to database: {e}")))?;

        let database = Self { pool };
        database.migrate().await?;

        info!("Database initialized: {}", url);
        Ok(database)
    }

    /// Run schema migration (idempotent)
    async fn migrate(&self) -> AppResult<()> {
        self.migrate_accounts().await
    }
}
