use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

use crate::error::Result;
use crate::models::{JobOp, MinuteInterval};

/// A job row as stored. `op` and `minute_interval` stay raw here so the
/// dispatcher can skip unrecognized values with a warning instead of
/// failing the whole load.
#[derive(Debug, Clone)]
pub struct JobRow {
    pub id: i64,
    pub symbol: String,
    pub op: String,
    pub days_back: u32,
    pub minute_interval: u32,
    pub last_run: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Job collection access. Jobs are created externally (or via `add-job`) and
/// read-only to the pipeline apart from the last_run stamp.
#[derive(Debug, Clone)]
pub struct JobStore {
    pool: SqlitePool,
}

impl JobStore {
    pub async fn new(pool: SqlitePool) -> Result<Self> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS jobs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                symbol TEXT NOT NULL,
                op TEXT NOT NULL,
                days_back INTEGER NOT NULL,
                minute_interval INTEGER NOT NULL,
                is_enabled INTEGER NOT NULL DEFAULT 1,
                last_run DATETIME,
                created_at DATETIME NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn list_enabled(&self) -> Result<Vec<JobRow>> {
        let rows = sqlx::query(
            r#"
            SELECT id, symbol, op, days_back, minute_interval, last_run, created_at
            FROM jobs
            WHERE is_enabled = 1
            ORDER BY id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(JobRow {
                    id: row.try_get("id")?,
                    symbol: row.try_get("symbol")?,
                    op: row.try_get("op")?,
                    days_back: row.try_get::<i64, _>("days_back")? as u32,
                    minute_interval: row.try_get::<i64, _>("minute_interval")? as u32,
                    last_run: row.try_get("last_run")?,
                    created_at: row.try_get("created_at")?,
                })
            })
            .collect()
    }

    pub async fn insert(
        &self,
        symbol: &str,
        op: JobOp,
        days_back: u32,
        interval: MinuteInterval,
    ) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO jobs (symbol, op, days_back, minute_interval, is_enabled, created_at)
            VALUES (?1, ?2, ?3, ?4, 1, ?5)
            "#,
        )
        .bind(symbol)
        .bind(op.as_str())
        .bind(i64::from(days_back))
        .bind(i64::from(interval.minutes()))
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    pub async fn mark_last_run(&self, id: i64, ts: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE jobs SET last_run = ?2 WHERE id = ?1")
            .bind(id)
            .bind(ts)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn count_enabled(&self) -> Result<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM jobs WHERE is_enabled = 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
