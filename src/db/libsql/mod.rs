//! libSQL/Turso backend for the Database trait.
//!
//! Provides an embedded SQLite-compatible database using Turso's libSQL fork.
//! Supports two modes:
//! - Local embedded (file-based, no server needed)
//! - Turso cloud with embedded replica (sync to cloud)

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use libsql::{Connection, Database as LibSqlDatabase};

use crate::agent::intent::{MarketSnapshot, MarketStatus};
use crate::db::{
    AccountLinkStore, ChallengeStore, DAY_MS, Database, HOUR_MS, MarketDirectory, SpendLedger,
    SpendTotals, window_start,
};
use crate::error::DatabaseError;
use crate::link::{AccountLink, Challenge};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS link_challenges (
    identity TEXT PRIMARY KEY,
    nonce TEXT NOT NULL UNIQUE,
    issued_at_ms INTEGER NOT NULL,
    expires_at_ms INTEGER NOT NULL,
    used INTEGER NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS idx_link_challenges_expires ON link_challenges (expires_at_ms);

CREATE TABLE IF NOT EXISTS account_links (
    identity TEXT PRIMARY KEY,
    linked_account_id TEXT NOT NULL,
    linked_at_ms INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS spend_records (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    identity TEXT NOT NULL,
    idempotency_key TEXT NOT NULL UNIQUE,
    amount_cents INTEGER NOT NULL,
    at_ms INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_spend_records_identity_at ON spend_records (identity, at_ms);
CREATE INDEX IF NOT EXISTS idx_spend_records_at ON spend_records (at_ms);

CREATE TABLE IF NOT EXISTS markets (
    id TEXT PRIMARY KEY,
    status TEXT NOT NULL
);
"#;

/// libSQL/Turso database backend.
///
/// Every operation opens its own connection from the shared handle.
pub struct LibSqlBackend {
    db: Arc<LibSqlDatabase>,
}

impl LibSqlBackend {
    /// Create a new local embedded database.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        ensure_parent_dir(path)?;

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {}", e)))?;

        Ok(Self { db: Arc::new(db) })
    }

    /// Create with Turso cloud sync (embedded replica).
    pub async fn new_remote_replica(
        path: &Path,
        url: &str,
        auth_token: &str,
    ) -> Result<Self, DatabaseError> {
        ensure_parent_dir(path)?;

        let db = libsql::Builder::new_remote_replica(path, url.to_string(), auth_token.to_string())
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open remote replica: {}", e)))?;

        Ok(Self { db: Arc::new(db) })
    }

    /// Create a new connection to the database.
    ///
    /// Sets `PRAGMA busy_timeout = 5000` on every connection so concurrent
    /// writers wait up to 5 seconds instead of failing instantly with
    /// "database is locked".
    pub async fn connect(&self) -> Result<Connection, DatabaseError> {
        let conn = self
            .db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {}", e)))?;
        conn.query("PRAGMA busy_timeout = 5000", ())
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to set busy_timeout: {}", e)))?;
        Ok(conn)
    }
}

fn ensure_parent_dir(path: &Path) -> Result<(), DatabaseError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            DatabaseError::Pool(format!("Failed to create database directory: {}", e))
        })?;
    }
    Ok(())
}

fn row_to_challenge(row: &libsql::Row) -> Result<Challenge, DatabaseError> {
    Ok(Challenge {
        identity: row.get::<String>(0)?,
        nonce: row.get::<String>(1)?,
        issued_at_ms: row.get::<i64>(2)?,
        expires_at_ms: row.get::<i64>(3)?,
        used: row.get::<i64>(4)? != 0,
    })
}

#[async_trait]
impl ChallengeStore for LibSqlBackend {
    async fn create(&self, challenge: &Challenge) -> Result<(), DatabaseError> {
        let conn = self.connect().await?;
        conn.execute(
            r#"
            INSERT INTO link_challenges (identity, nonce, issued_at_ms, expires_at_ms, used)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT (identity) DO UPDATE SET
                nonce = excluded.nonce,
                issued_at_ms = excluded.issued_at_ms,
                expires_at_ms = excluded.expires_at_ms,
                used = excluded.used
            "#,
            libsql::params![
                challenge.identity.as_str(),
                challenge.nonce.as_str(),
                challenge.issued_at_ms,
                challenge.expires_at_ms,
                i64::from(challenge.used),
            ],
        )
        .await?;
        Ok(())
    }

    async fn get_active(&self, identity: &str) -> Result<Option<Challenge>, DatabaseError> {
        let conn = self.connect().await?;
        let mut rows = conn
            .query(
                r#"
                SELECT identity, nonce, issued_at_ms, expires_at_ms, used
                FROM link_challenges
                WHERE identity = ?1
                "#,
                libsql::params![identity],
            )
            .await?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_challenge(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(e.to_string())),
        }
    }

    async fn mark_used(&self, nonce: &str) -> Result<bool, DatabaseError> {
        let conn = self.connect().await?;
        let affected = conn
            .execute(
                "UPDATE link_challenges SET used = 1 WHERE nonce = ?1 AND used = 0",
                libsql::params![nonce],
            )
            .await?;
        Ok(affected == 1)
    }

    async fn purge_expired(&self, now_ms: i64) -> Result<usize, DatabaseError> {
        let conn = self.connect().await?;
        let affected = conn
            .execute(
                "DELETE FROM link_challenges WHERE expires_at_ms < ?1",
                libsql::params![now_ms],
            )
            .await?;
        Ok(affected as usize)
    }
}

#[async_trait]
impl AccountLinkStore for LibSqlBackend {
    async fn link(&self, identity: &str, account_id: &str, at_ms: i64) -> Result<(), DatabaseError> {
        let conn = self.connect().await?;
        conn.execute(
            r#"
            INSERT INTO account_links (identity, linked_account_id, linked_at_ms)
            VALUES (?1, ?2, ?3)
            ON CONFLICT (identity) DO UPDATE SET
                linked_account_id = excluded.linked_account_id,
                linked_at_ms = excluded.linked_at_ms
            "#,
            libsql::params![identity, account_id, at_ms],
        )
        .await?;
        Ok(())
    }

    async fn get_link(&self, identity: &str) -> Result<Option<AccountLink>, DatabaseError> {
        let conn = self.connect().await?;
        let mut rows = conn
            .query(
                "SELECT identity, linked_account_id, linked_at_ms FROM account_links WHERE identity = ?1",
                libsql::params![identity],
            )
            .await?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(AccountLink {
                identity: row.get::<String>(0)?,
                linked_account_id: row.get::<String>(1)?,
                linked_at_ms: row.get::<i64>(2)?,
            })),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(e.to_string())),
        }
    }

    async fn unlink(&self, identity: &str) -> Result<bool, DatabaseError> {
        let conn = self.connect().await?;
        let affected = conn
            .execute(
                "DELETE FROM account_links WHERE identity = ?1",
                libsql::params![identity],
            )
            .await?;
        Ok(affected > 0)
    }
}

#[async_trait]
impl SpendLedger for LibSqlBackend {
    async fn record(
        &self,
        identity: &str,
        idempotency_key: &str,
        amount_cents: i64,
        at_ms: i64,
    ) -> Result<bool, DatabaseError> {
        let conn = self.connect().await?;
        let affected = conn
            .execute(
                r#"
                INSERT INTO spend_records (identity, idempotency_key, amount_cents, at_ms)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT (idempotency_key) DO NOTHING
                "#,
                libsql::params![identity, idempotency_key, amount_cents, at_ms],
            )
            .await?;
        Ok(affected == 1)
    }

    async fn totals(&self, identity: &str, now_ms: i64) -> Result<SpendTotals, DatabaseError> {
        let day_start = window_start(now_ms, DAY_MS);
        let hour_start = window_start(now_ms, HOUR_MS);
        let conn = self.connect().await?;
        let mut rows = conn
            .query(
                r#"
                SELECT
                    COALESCE(SUM(CASE WHEN at_ms >= ?2 AND at_ms < ?3 THEN amount_cents ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN at_ms >= ?4 AND at_ms < ?5 THEN amount_cents ELSE 0 END), 0)
                FROM spend_records
                WHERE identity = ?1
                "#,
                libsql::params![
                    identity,
                    day_start,
                    day_start + DAY_MS,
                    hour_start,
                    hour_start + HOUR_MS,
                ],
            )
            .await?;

        match rows.next().await {
            Ok(Some(row)) => Ok(SpendTotals {
                today_cents: row.get::<i64>(0)?,
                this_hour_cents: row.get::<i64>(1)?,
            }),
            Ok(None) => Ok(SpendTotals::default()),
            Err(e) => Err(DatabaseError::Query(e.to_string())),
        }
    }

    async fn prune_before(&self, before_ms: i64) -> Result<usize, DatabaseError> {
        let conn = self.connect().await?;
        let affected = conn
            .execute(
                "DELETE FROM spend_records WHERE at_ms < ?1",
                libsql::params![before_ms],
            )
            .await?;
        Ok(affected as usize)
    }
}

#[async_trait]
impl MarketDirectory for LibSqlBackend {
    async fn lookup(&self, market_id: &str) -> Result<Option<MarketSnapshot>, DatabaseError> {
        let conn = self.connect().await?;
        let mut rows = conn
            .query(
                "SELECT id, status FROM markets WHERE id = ?1",
                libsql::params![market_id],
            )
            .await?;

        let row = match rows.next().await {
            Ok(Some(row)) => row,
            Ok(None) => return Ok(None),
            Err(e) => return Err(DatabaseError::Query(e.to_string())),
        };
        let id = row.get::<String>(0)?;
        let raw_status = row.get::<String>(1)?;
        let status = MarketStatus::parse(&raw_status).ok_or_else(|| {
            DatabaseError::Serialization(format!("market {id} has unknown status '{raw_status}'"))
        })?;
        Ok(Some(MarketSnapshot { id, status }))
    }
}

#[async_trait]
impl Database for LibSqlBackend {
    async fn run_migrations(&self) -> Result<(), DatabaseError> {
        let conn = self.connect().await?;
        // WAL mode persists in the database file: all future connections benefit.
        conn.query("PRAGMA journal_mode=WAL", ())
            .await
            .map_err(|e| DatabaseError::Migration(format!("Failed to enable WAL mode: {}", e)))?;
        conn.execute_batch(SCHEMA)
            .await
            .map_err(|e| DatabaseError::Migration(format!("libSQL migration failed: {}", e)))?;
        Ok(())
    }

    async fn upsert_market(&self, market: &MarketSnapshot) -> Result<(), DatabaseError> {
        let conn = self.connect().await?;
        conn.execute(
            r#"
            INSERT INTO markets (id, status) VALUES (?1, ?2)
            ON CONFLICT (id) DO UPDATE SET status = excluded.status
            "#,
            libsql::params![market.id.as_str(), market.status.as_str()],
        )
        .await?;
        Ok(())
    }
}
