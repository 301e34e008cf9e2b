// auth-server/src/storage/store.rs
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use chrono::DateTime;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{FromRow, Pool, Sqlite};
use thiserror::Error;

use common::messages::{UserDetails, UserSummary};
use common::models::identity::Identity;

/// Infrastructure failures only. Absence of a row is `Ok(None)` from the
/// lookups, never an error; the API layer depends on that distinction.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Query error: {0}")]
    Query(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        Self::Query(e.to_string())
    }
}

/// A stored user profile row. Timestamps are unix seconds.
#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    pub telegram_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    pub photo_url: String,
    pub created_at: i64,
    pub last_login: i64,
}

impl UserRow {
    /// The slim shape the validation endpoint returns.
    pub fn summary(&self) -> UserSummary {
        UserSummary {
            telegram_id: self.telegram_id,
            username: self.username.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
        }
    }

    /// The full shape the lookup endpoint returns, timestamps as RFC 3339.
    pub fn details(&self) -> UserDetails {
        UserDetails {
            telegram_id: self.telegram_id,
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            username: self.username.clone(),
            photo_url: self.photo_url.clone(),
            created_at: DateTime::from_timestamp(self.created_at, 0).unwrap_or_default(),
            last_login: DateTime::from_timestamp(self.last_login, 0).unwrap_or_default(),
        }
    }
}

/// SQLite-backed user store.
#[derive(Clone)]
pub struct UserStore {
    pool: Pool<Sqlite>,
}

impl UserStore {
    /// Open (or create) the store at the given file path and run
    /// migrations. Creates the parent directory if needed, enables WAL
    /// journal mode and a 5-second busy timeout.
    pub async fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::Io(e.to_string()))?;
        }

        let options =
            SqliteConnectOptions::from_str(&format!("sqlite:{}?mode=rwc", path.display()))
                .map_err(|e| StoreError::Connection(e.to_string()))?
                .journal_mode(SqliteJournalMode::Wal)
                .foreign_keys(true)
                .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        tracing::info!(path = %path.display(), "User store opened");

        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Open an in-memory store (for testing). A single connection keeps
    /// every query on the same in-memory database.
    pub async fn open_in_memory() -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| StoreError::Connection(e.to_string()))?
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Migration(e.to_string()))?;

        tracing::info!("User store migrations complete");
        Ok(())
    }

    /// Insert or refresh a profile. Display fields and `last_login` are
    /// updated on every login; `created_at` keeps its first-insert value.
    pub async fn upsert_profile(&self, identity: &Identity, now: i64) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO users \
                 (telegram_id, first_name, last_name, username, photo_url, created_at, last_login) \
             VALUES (?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT(telegram_id) DO UPDATE SET \
                 first_name = excluded.first_name, \
                 last_name = excluded.last_name, \
                 username = excluded.username, \
                 photo_url = excluded.photo_url, \
                 last_login = excluded.last_login",
        )
        .bind(identity.id)
        .bind(&identity.first_name)
        .bind(&identity.last_name)
        .bind(&identity.username)
        .bind(&identity.photo_url)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Point lookup by telegram id. `Ok(None)` means confirmed absent.
    pub async fn get_by_id(&self, telegram_id: i64) -> Result<Option<UserRow>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT telegram_id, first_name, last_name, username, photo_url, created_at, last_login \
             FROM users WHERE telegram_id = ?",
        )
        .bind(telegram_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    /// Lookup by username. Usernames are not unique in Telegram history;
    /// the most recently active match wins.
    pub async fn get_by_username(&self, username: &str) -> Result<Option<UserRow>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT telegram_id, first_name, last_name, username, photo_url, created_at, last_login \
             FROM users WHERE username = ? ORDER BY last_login DESC LIMIT 1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    /// Remove a profile. Returns whether a row was actually deleted.
    pub async fn delete_user(&self, telegram_id: i64) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM users WHERE telegram_id = ?")
            .bind(telegram_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
