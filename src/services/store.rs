use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use tracing::info;

use crate::error::{AppError, Result};
use crate::models::Candle;

/// Upper bound on records per write call; callers chunk batches at this size
/// to bound memory and single-call payload size.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Outcome of an upsert batch. Re-ingesting the same records moves counts
/// from `upserted` to `matched` without changing stored content.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct UpsertStats {
    pub matched: u64,
    pub upserted: u64,
}

impl UpsertStats {
    fn absorb(&mut self, other: UpsertStats) {
        self.matched += other.matched;
        self.upserted += other.upserted;
    }
}

/// Candle store keyed UNIQUE(symbol, ts). Writes are replace-if-exists /
/// insert-if-absent, so overlapping fetch windows and re-runs are safe.
#[derive(Debug, Clone)]
pub struct CandleStore {
    pool: SqlitePool,
}

impl CandleStore {
    /// Open (creating if missing) the store. A connection failure here is
    /// surfaced to the caller, which treats it as fatal — no job can proceed
    /// without storage.
    pub async fn connect(database_path: &Path) -> Result<Self> {
        if let Some(parent) = database_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(database_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(30));

        // Single-connection pool: schema DDL (CREATE INDEX) committed on one
        // connection is not guaranteed visible to another pooled connection's
        // cached schema, which makes ON CONFLICT(symbol, ts) fail to resolve
        // the unique index. A single writer connection keeps schema and
        // upserts on the same connection. SQLite permits only one writer anyway.
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.initialize_schema().await?;
        info!(path = %database_path.display(), "Candle store ready");
        Ok(store)
    }

    async fn initialize_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS candles (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                symbol TEXT NOT NULL,
                ts DATETIME NOT NULL,
                open REAL NOT NULL,
                high REAL NOT NULL,
                low REAL NOT NULL,
                close REAL NOT NULL,
                volume INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // The natural key. Everything upserts against this index.
        sqlx::query(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_candles_symbol_ts ON candles(symbol, ts)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Upsert one batch. The whole batch is validated before any write; a
    /// record with an empty symbol fails the batch without touching the
    /// store. Within the batch, insert-if-absent then update-on-match gives
    /// exact matched/upserted counts.
    pub async fn upsert_batch(&self, records: &[Candle]) -> Result<UpsertStats> {
        for record in records {
            if record.symbol.trim().is_empty() {
                return Err(AppError::StoreValidation(format!(
                    "record at {} missing symbol",
                    record.ts
                )));
            }
        }

        let mut stats = UpsertStats::default();
        if records.is_empty() {
            return Ok(stats);
        }

        let mut tx = self.pool.begin().await?;
        for record in records {
            let inserted = sqlx::query(
                r#"
                INSERT INTO candles (symbol, ts, open, high, low, close, volume)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                ON CONFLICT(symbol, ts) DO NOTHING
                "#,
            )
            .bind(&record.symbol)
            .bind(record.ts)
            .bind(record.open)
            .bind(record.high)
            .bind(record.low)
            .bind(record.close)
            .bind(record.volume as i64)
            .execute(&mut *tx)
            .await?;

            if inserted.rows_affected() == 0 {
                sqlx::query(
                    r#"
                    UPDATE candles
                    SET open = ?3, high = ?4, low = ?5, close = ?6, volume = ?7
                    WHERE symbol = ?1 AND ts = ?2
                    "#,
                )
                .bind(&record.symbol)
                .bind(record.ts)
                .bind(record.open)
                .bind(record.high)
                .bind(record.low)
                .bind(record.close)
                .bind(record.volume as i64)
                .execute(&mut *tx)
                .await?;
                stats.matched += 1;
            } else {
                stats.upserted += 1;
            }
        }
        tx.commit().await?;

        Ok(stats)
    }

    /// Chunked ingestion. Chunks commit independently: a failure partway
    /// leaves earlier chunks in place, which is safe because re-running the
    /// ingest is idempotent.
    pub async fn upsert_chunked(
        &self,
        records: &[Candle],
        batch_size: usize,
    ) -> Result<UpsertStats> {
        let mut total = UpsertStats::default();
        for chunk in records.chunks(batch_size.max(1)) {
            total.absorb(self.upsert_batch(chunk).await?);
        }
        Ok(total)
    }

    /// Candles with start <= ts <= end, ascending.
    pub async fn fetch_range(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Candle>> {
        let rows = sqlx::query(
            r#"
            SELECT symbol, ts, open, high, low, close, volume
            FROM candles
            WHERE symbol = ?1 AND ts >= ?2 AND ts <= ?3
            ORDER BY ts ASC
            "#,
        )
        .bind(symbol)
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_candle).collect()
    }

    /// The n most recent candles, returned ascending.
    pub async fn latest_n(&self, symbol: &str, n: u32) -> Result<Vec<Candle>> {
        let rows = sqlx::query(
            r#"
            SELECT symbol, ts, open, high, low, close, volume
            FROM candles
            WHERE symbol = ?1
            ORDER BY ts DESC
            LIMIT ?2
            "#,
        )
        .bind(symbol)
        .bind(i64::from(n))
        .fetch_all(&self.pool)
        .await?;

        let mut candles: Vec<Candle> = rows
            .into_iter()
            .map(row_to_candle)
            .collect::<Result<_>>()?;
        candles.reverse();
        Ok(candles)
    }

    pub async fn stats(&self) -> Result<StoreStats> {
        let total_records: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM candles")
            .fetch_one(&self.pool)
            .await?;

        let unique_symbols: i64 = sqlx::query_scalar("SELECT COUNT(DISTINCT symbol) FROM candles")
            .fetch_one(&self.pool)
            .await?;

        let date_range = sqlx::query("SELECT MIN(ts), MAX(ts) FROM candles")
            .fetch_one(&self.pool)
            .await
            .ok()
            .and_then(|row| {
                let min: Option<String> = row.try_get(0).ok().flatten();
                let max: Option<String> = row.try_get(1).ok().flatten();
                match (min, max) {
                    (Some(min), Some(max)) => Some((min, max)),
                    _ => None,
                }
            });

        Ok(StoreStats {
            total_records,
            unique_symbols,
            date_range,
        })
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[derive(Debug)]
pub struct StoreStats {
    pub total_records: i64,
    pub unique_symbols: i64,
    pub date_range: Option<(String, String)>,
}

fn row_to_candle(row: sqlx::sqlite::SqliteRow) -> Result<Candle> {
    Ok(Candle {
        symbol: row.try_get("symbol")?,
        ts: row.try_get("ts")?,
        open: row.try_get("open")?,
        high: row.try_get("high")?,
        low: row.try_get("low")?,
        close: row.try_get("close")?,
        volume: row.try_get::<i64, _>("volume")? as u64,
    })
}
