use std::time::Duration;

use crate::config::AppConfig;
use crate::dispatcher::Dispatcher;
use crate::error::Error;
use crate::services::{AlphaVantageClient, CandleStore, JobStore, TimeSeriesService};

/// Run one poll cycle over the enabled jobs, or keep polling with an
/// inter-cycle sleep when `--every` is given. The one-shot default leaves
/// scheduling cadence to whatever invokes the process.
pub fn run(every: Option<u64>) {
    let cfg = match AppConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    match run_cycles(cfg, every) {
        Ok(()) => {}
        Err(e) => {
            eprintln!("Job cycle failed: {}", e);
            std::process::exit(1);
        }
    }
}

fn run_cycles(cfg: AppConfig, every: Option<u64>) -> Result<(), Error> {
    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| Error::Io(format!("Failed to create runtime: {}", e)))?;

    runtime.block_on(async {
        // no job can proceed without storage, so a connect failure is fatal
        let store = CandleStore::connect(&cfg.db_path).await?;
        let jobs = JobStore::new(store.pool().clone()).await?;
        let client = AlphaVantageClient::new(&cfg)?;
        let dispatcher = Dispatcher::new(
            TimeSeriesService::new(client),
            store,
            jobs,
            cfg.data_dir.clone(),
        );

        loop {
            let stats = dispatcher.run_cycle().await?;
            println!(
                "Cycle done: {} succeeded, {} failed, {} skipped",
                stats.succeeded, stats.failed, stats.skipped
            );

            match every {
                Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
                None => return Ok(()),
            }
        }
    })
}
