//! Server-side state: background job run history and schedules.

mod models;
mod schema;
mod sqlite_server_store;

pub use models::*;
pub use schema::SERVER_VERSIONED_SCHEMAS;
pub use sqlite_server_store::SqliteServerStore;

use anyhow::Result;

/// Persists what the job scheduler needs across restarts.
pub trait ServerStore: Send + Sync {
    /// Opens a `running` row and returns its id.
    fn start_run(&self, job_id: &str, triggered_by: &str) -> Result<i64>;
    fn finish_run(&self, run_id: i64, outcome: RunOutcome) -> Result<()>;
    /// Newest first.
    fn run_history(&self, job_id: &str, limit: usize) -> Result<Vec<JobRun>>;
    fn last_run(&self, job_id: &str) -> Result<Option<JobRun>>;
    /// Runs left in `running` by a previous process become `failed`.
    fn fail_interrupted_runs(&self) -> Result<usize>;
    /// Keeps the `keep` newest finished runs of `job_id`, returns how many
    /// rows were deleted.
    fn prune_run_history(&self, job_id: &str, keep: usize) -> Result<usize>;

    fn schedule_state(&self, job_id: &str) -> Result<Option<JobScheduleState>>;
    fn save_schedule_state(&self, state: &JobScheduleState) -> Result<()>;
}
