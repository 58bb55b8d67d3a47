pub mod alpha_vantage;
pub mod csv_export;
pub mod csv_import;
pub mod jobs;
pub mod normalizer;
pub mod store;
pub mod time_series;

pub use alpha_vantage::{AlphaVantageClient, IsahcTransport, Transport};
pub use jobs::{JobRow, JobStore};
pub use store::{CandleStore, StoreStats, UpsertStats, DEFAULT_BATCH_SIZE};
pub use time_series::{MarketDataClient, TimeSeriesService};
