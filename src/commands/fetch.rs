use std::path::PathBuf;

use crate::config::AppConfig;
use crate::error::Error;
use crate::models::MinuteInterval;
use crate::services::{csv_export, AlphaVantageClient, TimeSeriesService};

/// One-off fetch-and-export outside the job table: pull the last `days` days
/// for a symbol and write the CSV artifact to `outfile`.
pub fn run(symbol: String, days: u32, minutes: u32, outfile: PathBuf, daily: bool) {
    let interval = match MinuteInterval::from_minutes(minutes) {
        Ok(interval) => interval,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let cfg = match AppConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    match fetch_and_write(cfg, &symbol, days, interval, &outfile, daily) {
        Ok(rows) => {
            println!("Saved {} rows to {}", rows, outfile.display());
        }
        Err(e) => {
            eprintln!("Fetch failed: {}", e);
            std::process::exit(1);
        }
    }
}

fn fetch_and_write(
    cfg: AppConfig,
    symbol: &str,
    days: u32,
    interval: MinuteInterval,
    outfile: &PathBuf,
    daily: bool,
) -> Result<usize, Error> {
    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| Error::Io(format!("Failed to create runtime: {}", e)))?;

    runtime.block_on(async {
        let client = AlphaVantageClient::new(&cfg)?;
        let service = TimeSeriesService::new(client);

        if daily {
            println!("Fetching daily series for {}, last {} days ...", symbol, days);
        } else {
            println!(
                "Fetching {}-minute intraday for {}, last {} days ...",
                interval.minutes(),
                symbol,
                days
            );
        }

        let candles = if daily {
            service.daily_history(symbol, days).await?
        } else {
            service.intraday_history(symbol, interval, days).await?
        };

        if candles.is_empty() {
            return Err(Error::EmptyResult);
        }

        println!("Fetched {} bars", candles.len());
        csv_export::write_candles(outfile, &candles)
    })
}
