use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::MinuteInterval;

/// Named operation a job routes to. Closed set: the dispatcher matches
/// exhaustively, and job rows whose stored op string does not parse are
/// skipped with a warning instead of crashing the cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobOp {
    /// Fetch the intraday window and write the CSV artifact
    FetchAndExport,
    /// Read the CSV artifact and upsert it into the candle store
    IngestToStore,
}

impl JobOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobOp::FetchAndExport => "fetch_and_export",
            JobOp::IngestToStore => "ingest_to_store",
        }
    }

    pub fn parse(s: &str) -> Result<Self, String> {
        match s {
            "fetch_and_export" => Ok(JobOp::FetchAndExport),
            "ingest_to_store" => Ok(JobOp::IngestToStore),
            other => Err(format!("Unsupported op: {}", other)),
        }
    }
}

impl fmt::Display for JobOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One declarative job record. Created externally (or via `add-job`),
/// read-only to the pipeline apart from the last_run stamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: i64,
    pub symbol: String,
    pub op: JobOp,
    pub days_back: u32,
    pub minute_interval: MinuteInterval,
    pub is_enabled: bool,
    pub last_run: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn op_strings_round_trip() {
        for op in [JobOp::FetchAndExport, JobOp::IngestToStore] {
            assert_eq!(JobOp::parse(op.as_str()), Ok(op));
        }
    }

    #[test]
    fn unknown_op_is_an_error_not_a_panic() {
        assert!(JobOp::parse("fetch_and_save_intraday").is_err());
        assert!(JobOp::parse("").is_err());
    }
}
