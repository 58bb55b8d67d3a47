use std::path::PathBuf;

use chrono::Utc;
use tracing::{error, info, warn};

use crate::error::{AppError, Result};
use crate::models::{Job, JobOp, MinuteInterval};
use crate::services::csv_export;
use crate::services::csv_import;
use crate::services::jobs::{JobRow, JobStore};
use crate::services::store::{CandleStore, DEFAULT_BATCH_SIZE};
use crate::services::time_series::{MarketDataClient, TimeSeriesService};

/// Outcome of one poll cycle.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CycleStats {
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// Runs one poll cycle over the enabled jobs: resolve each job's op against
/// the closed operation set, execute it, and isolate failures so one broken
/// job never stops the rest of the cycle.
///
/// All collaborators are constructed by the caller and passed in — there is
/// no global store or client handle.
pub struct Dispatcher<C: MarketDataClient> {
    service: TimeSeriesService<C>,
    store: CandleStore,
    jobs: JobStore,
    data_dir: PathBuf,
}

impl<C: MarketDataClient> Dispatcher<C> {
    pub fn new(
        service: TimeSeriesService<C>,
        store: CandleStore,
        jobs: JobStore,
        data_dir: PathBuf,
    ) -> Self {
        Self {
            service,
            store,
            jobs,
            data_dir,
        }
    }

    pub async fn run_cycle(&self) -> Result<CycleStats> {
        let rows = self.jobs.list_enabled().await?;
        info!(count = rows.len(), "Loaded enabled jobs");

        let mut stats = CycleStats::default();
        for row in rows {
            let job = match resolve_job(&row) {
                Ok(job) => job,
                Err(reason) => {
                    warn!(job_id = row.id, symbol = %row.symbol, %reason, "Skipping job");
                    stats.skipped += 1;
                    continue;
                }
            };

            info!(job_id = job.id, symbol = %job.symbol, op = %job.op, "Running job");
            match self.execute(&job).await {
                Ok(()) => {
                    stats.succeeded += 1;
                    if let Err(e) = self.jobs.mark_last_run(job.id, Utc::now()).await {
                        warn!(job_id = job.id, error = %e, "Failed to stamp last_run");
                    }
                }
                Err(e) => {
                    error!(job_id = job.id, symbol = %job.symbol, error = %e, "Job failed");
                    stats.failed += 1;
                }
            }
        }

        info!(
            succeeded = stats.succeeded,
            failed = stats.failed,
            skipped = stats.skipped,
            "Cycle complete"
        );
        Ok(stats)
    }

    async fn execute(&self, job: &Job) -> Result<()> {
        match job.op {
            JobOp::FetchAndExport => self.fetch_and_export(job).await,
            JobOp::IngestToStore => self.ingest_to_store(job).await,
        }
    }

    async fn fetch_and_export(&self, job: &Job) -> Result<()> {
        let candles = self
            .service
            .intraday_history(&job.symbol, job.minute_interval, job.days_back)
            .await?;

        // an empty window is not worth an empty artifact
        if candles.is_empty() {
            return Err(AppError::EmptyResult);
        }

        let outfile = self.artifact_path(job);
        let written = csv_export::write_candles(&outfile, &candles)?;
        info!(symbol = %job.symbol, rows = written, path = %outfile.display(), "Export written");
        Ok(())
    }

    async fn ingest_to_store(&self, job: &Job) -> Result<()> {
        let outfile = self.artifact_path(job);
        let candles = csv_import::read_candles(&outfile, &job.symbol)?;
        let stats = self.store.upsert_chunked(&candles, DEFAULT_BATCH_SIZE).await?;
        info!(
            symbol = %job.symbol,
            upserted = stats.upserted,
            matched = stats.matched,
            processed = candles.len(),
            "Ingest complete"
        );
        Ok(())
    }

    /// `<data_dir>/<SYMBOL>/<YYYY-MM-DD>/<SYMBOL>_m<minutes>_d<days>.csv` —
    /// the fetch op writes here and the ingest op reads the same path, so a
    /// fetch job and an ingest job for the same parameters pair up.
    fn artifact_path(&self, job: &Job) -> PathBuf {
        let day = Utc::now().format("%Y-%m-%d").to_string();
        self.data_dir.join(&job.symbol).join(day).join(format!(
            "{}_m{}_d{}.csv",
            job.symbol,
            job.minute_interval.minutes(),
            job.days_back
        ))
    }
}

fn resolve_job(row: &JobRow) -> std::result::Result<Job, String> {
    let op = JobOp::parse(&row.op)?;
    let minute_interval = MinuteInterval::from_minutes(row.minute_interval)?;
    if row.days_back == 0 {
        return Err("days_back must be positive".to_string());
    }
    Ok(Job {
        id: row.id,
        symbol: row.symbol.clone(),
        op,
        days_back: row.days_back,
        minute_interval,
        is_enabled: true,
        last_run: row.last_run,
        created_at: row.created_at,
    })
}
