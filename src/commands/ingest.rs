use std::path::PathBuf;

use crate::config::AppConfig;
use crate::error::Error;
use crate::services::{csv_import, CandleStore, DEFAULT_BATCH_SIZE};

/// Ingest a CSV artifact into the candle store. Safe to re-run: rows land
/// as keyed upserts, so a second pass reports matches instead of inserts.
pub fn run(csv_path: PathBuf, symbol: String) {
    let cfg = AppConfig::offline();

    match ingest(cfg, &csv_path, &symbol) {
        Ok(()) => {}
        Err(e) => {
            eprintln!("Ingest failed: {}", e);
            std::process::exit(1);
        }
    }
}

fn ingest(cfg: AppConfig, csv_path: &PathBuf, symbol: &str) -> Result<(), Error> {
    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| Error::Io(format!("Failed to create runtime: {}", e)))?;

    runtime.block_on(async {
        let candles = csv_import::read_candles(csv_path, symbol)?;
        println!("Read {} rows from {}", candles.len(), csv_path.display());

        let store = CandleStore::connect(&cfg.db_path).await?;
        let stats = store.upsert_chunked(&candles, DEFAULT_BATCH_SIZE).await?;
        println!(
            "Upserted: {} | matched/updated: {} | processed: {}",
            stats.upserted,
            stats.matched,
            candles.len()
        );
        Ok(())
    })
}
