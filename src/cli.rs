use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::commands;

#[derive(Parser)]
#[command(name = "stocker")]
#[command(about = "Fetch intraday market data and ingest it into the candle store", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run one cycle over the enabled jobs
    RunJobs {
        /// Keep polling, sleeping this many seconds between cycles
        #[arg(long)]
        every: Option<u64>,
    },
    /// One-off fetch and CSV export for a symbol
    Fetch {
        #[arg(short, long)]
        symbol: String,
        /// Lookback window in days
        #[arg(short, long, default_value_t = 5)]
        days: u32,
        /// Bar interval in minutes (1, 5, 15, 30, 60)
        #[arg(short, long, default_value_t = 5)]
        minutes: u32,
        /// Output CSV path
        #[arg(short, long, default_value = "out.csv")]
        outfile: PathBuf,
        /// Fetch the daily series instead of intraday bars
        #[arg(long)]
        daily: bool,
    },
    /// Ingest a CSV artifact into the candle store
    Ingest {
        /// Path to the CSV file
        #[arg(short, long)]
        csv: PathBuf,
        /// Symbol to use for rows without a symbol column
        #[arg(short, long)]
        symbol: String,
    },
    /// Create an enabled job record
    AddJob {
        #[arg(short, long)]
        symbol: String,
        /// Operation: fetch_and_export or ingest_to_store
        #[arg(short, long)]
        op: String,
        #[arg(short, long, default_value_t = 5)]
        days: u32,
        #[arg(short, long, default_value_t = 5)]
        minutes: u32,
    },
    /// Show store and job status
    Status,
}

pub fn run() {
    let cli = Cli::parse();

    match cli.command {
        Commands::RunJobs { every } => {
            commands::run_jobs::run(every);
        }
        Commands::Fetch {
            symbol,
            days,
            minutes,
            outfile,
            daily,
        } => {
            commands::fetch::run(symbol, days, minutes, outfile, daily);
        }
        Commands::Ingest { csv, symbol } => {
            commands::ingest::run(csv, symbol);
        }
        Commands::AddJob {
            symbol,
            op,
            days,
            minutes,
        } => {
            commands::add_job::run(symbol, op, days, minutes);
        }
        Commands::Status => {
            commands::status::run();
        }
    }
}
