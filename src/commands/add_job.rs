use crate::config::AppConfig;
use crate::error::Error;
use crate::models::{JobOp, MinuteInterval};
use crate::services::{CandleStore, JobStore};

/// Insert an enabled job record. The dispatcher picks it up on its next
/// cycle.
pub fn run(symbol: String, op: String, days: u32, minutes: u32) {
    let op = match JobOp::parse(&op) {
        Ok(op) => op,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("   Valid ops: fetch_and_export, ingest_to_store");
            std::process::exit(1);
        }
    };
    let interval = match MinuteInterval::from_minutes(minutes) {
        Ok(interval) => interval,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let cfg = AppConfig::offline();
    match insert(cfg, &symbol, op, days, interval) {
        Ok(id) => println!("Created job {} ({} {} every cycle)", id, op, symbol),
        Err(e) => {
            eprintln!("Failed to create job: {}", e);
            std::process::exit(1);
        }
    }
}

fn insert(
    cfg: AppConfig,
    symbol: &str,
    op: JobOp,
    days: u32,
    interval: MinuteInterval,
) -> Result<i64, Error> {
    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| Error::Io(format!("Failed to create runtime: {}", e)))?;

    runtime.block_on(async {
        let store = CandleStore::connect(&cfg.db_path).await?;
        let jobs = JobStore::new(store.pool().clone()).await?;
        jobs.insert(symbol, op, days, interval).await
    })
}
