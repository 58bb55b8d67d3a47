pub mod add_job;
pub mod fetch;
pub mod ingest;
pub mod run_jobs;
pub mod status;
