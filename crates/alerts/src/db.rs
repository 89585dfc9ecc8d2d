//! SQLite store of transfer hashes that have already been alerted.

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use thiserror::Error;
use whale_core::Transfer;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),
}

/// Persistent set of alerted transaction hashes.
///
/// Append-only apart from [`AlertStateStore::reset`].
#[derive(Clone)]
pub struct AlertStateStore {
    pool: SqlitePool,
}

impl AlertStateStore {
    /// Connect to SQLite database at the given path.
    pub async fn connect(database_url: &str) -> Result<Self, DbError> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Run database migrations.
    async fn run_migrations(&self) -> Result<(), DbError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS alerted_transfers (
                tx_hash TEXT PRIMARY KEY,
                chain TEXT NOT NULL,
                usd_value REAL NOT NULL,
                alerted_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_alerted_at
            ON alerted_transfers(alerted_at)
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Atomically record a transfer as alerted.
    /// Returns true if this call inserted it, false if it was already present.
    pub async fn claim(&self, transfer: &Transfer) -> Result<bool, DbError> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO alerted_transfers (tx_hash, chain, usd_value) VALUES (?, ?, ?)",
        )
        .bind(&transfer.tx_hash)
        .bind(transfer.chain.as_str())
        .bind(transfer.usd_value)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Number of alerted hashes.
    pub async fn count(&self) -> Result<i64, DbError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM alerted_transfers")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Forget every alerted hash. Returns the number removed.
    pub async fn reset(&self) -> Result<u64, DbError> {
        let result = sqlx::query("DELETE FROM alerted_transfers")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Close the connection pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use whale_core::{Asset, Chain};

    fn transfer(hash: &str) -> Transfer {
        Transfer {
            chain: Chain::Bitcoin,
            asset: Asset::Btc,
            amount: 500.0,
            usd_value: 30_000_000.0,
            from: "mempool".into(),
            to: "multiple".into(),
            tx_hash: hash.into(),
            timestamp: 0,
        }
    }

    #[tokio::test]
    async fn test_claim_is_exclusive() {
        let store = AlertStateStore::connect("sqlite::memory:").await.unwrap();

        assert!(store.claim(&transfer("abc")).await.unwrap());
        assert!(!store.claim(&transfer("abc")).await.unwrap());
        assert!(store.claim(&transfer("def")).await.unwrap());
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_reset_forgets_hashes() {
        let store = AlertStateStore::connect("sqlite::memory:").await.unwrap();
        store.claim(&transfer("a")).await.unwrap();
        store.claim(&transfer("b")).await.unwrap();

        assert_eq!(store.reset().await.unwrap(), 2);
        assert_eq!(store.count().await.unwrap(), 0);
        assert!(store.claim(&transfer("a")).await.unwrap());
    }

    #[tokio::test]
    async fn test_closed_store_errors() {
        let store = AlertStateStore::connect("sqlite::memory:").await.unwrap();
        store.close().await;
        assert!(store.claim(&transfer("a")).await.is_err());
    }
}
