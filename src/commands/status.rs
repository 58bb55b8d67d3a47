use crate::config::AppConfig;
use crate::error::Error;
use crate::services::{CandleStore, JobStore};

pub fn run() {
    println!("📊 Stocker Status\n");

    match show_status() {
        Ok(()) => {}
        Err(e) => {
            eprintln!("❌ Error: {}", e);
            std::process::exit(1);
        }
    }
}

fn show_status() -> Result<(), Error> {
    let cfg = AppConfig::offline();
    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| Error::Io(format!("Failed to create runtime: {}", e)))?;

    runtime.block_on(async {
        let store = CandleStore::connect(&cfg.db_path).await?;
        let stats = store.stats().await?;
        let jobs = JobStore::new(store.pool().clone()).await?;
        let enabled = jobs.count_enabled().await?;

        println!("Database: {}", cfg.db_path.display());
        println!("   Candles: {:>10}", stats.total_records);
        println!("   Symbols: {:>10}", stats.unique_symbols);
        if let Some((first, last)) = &stats.date_range {
            println!("   Range:   {} → {}", first, last);
        } else {
            println!("   Range:   (empty)");
        }
        println!("\nEnabled jobs: {}", enabled);
        if enabled == 0 {
            println!("💡 Tip: create one with 'stocker add-job --symbol AAPL --op fetch_and_export'");
        }

        Ok(())
    })
}
