use super::models::{JobRun, JobRunStatus, JobScheduleState, RunOutcome};
use super::schema::SERVER_VERSIONED_SCHEMAS;
use super::ServerStore;
use crate::sqlite_persistence::{lock_conn, open_versioned_db};
use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};

const JOB_RUN_SELECT: &str =
    "SELECT id, job_id, started_at, finished_at, status, error_message, triggered_by FROM job_runs";

pub struct SqliteServerStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteServerStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = open_versioned_db(db_path, SERVER_VERSIONED_SCHEMAS, "server")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn format_datetime(dt: &DateTime<Utc>) -> String {
        dt.to_rfc3339()
    }

    fn parse_datetime(value: &str) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(value)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
    }

    fn row_to_job_run(row: &rusqlite::Row) -> rusqlite::Result<JobRun> {
        let status_str: String = row.get("status")?;
        let status = JobRunStatus::parse(&status_str).unwrap_or(JobRunStatus::Failed);
        let started_at_str: String = row.get("started_at")?;
        let finished_at_str: Option<String> = row.get("finished_at")?;

        Ok(JobRun {
            id: row.get("id")?,
            job_id: row.get("job_id")?,
            started_at: Self::parse_datetime(&started_at_str).unwrap_or_else(Utc::now),
            finished_at: finished_at_str.as_deref().and_then(Self::parse_datetime),
            status,
            error_message: row.get("error_message")?,
            triggered_by: row.get("triggered_by")?,
        })
    }

    fn row_to_schedule_state(row: &rusqlite::Row) -> rusqlite::Result<JobScheduleState> {
        let next_run_at_str: String = row.get("next_run_at")?;
        let last_run_at_str: Option<String> = row.get("last_run_at")?;

        Ok(JobScheduleState {
            job_id: row.get("job_id")?,
            next_run_at: Self::parse_datetime(&next_run_at_str).unwrap_or_else(Utc::now),
            last_run_at: last_run_at_str.as_deref().and_then(Self::parse_datetime),
        })
    }
}

impl ServerStore for SqliteServerStore {
    fn start_run(&self, job_id: &str, triggered_by: &str) -> Result<i64> {
        let conn = lock_conn(&self.conn)?;
        let now = Self::format_datetime(&Utc::now());

        conn.execute(
            "INSERT INTO job_runs (job_id, started_at, status, triggered_by)
             VALUES (?1, ?2, ?3, ?4)",
            params![job_id, now, JobRunStatus::Running.as_str(), triggered_by],
        )?;

        Ok(conn.last_insert_rowid())
    }

    fn finish_run(&self, run_id: i64, outcome: RunOutcome) -> Result<()> {
        let conn = lock_conn(&self.conn)?;
        let now = Self::format_datetime(&Utc::now());

        let updated = conn.execute(
            "UPDATE job_runs SET finished_at = ?1, status = ?2, error_message = ?3 WHERE id = ?4",
            params![now, outcome.status().as_str(), outcome.error_message(), run_id],
        )?;
        if updated == 0 {
            bail!("Job run {} does not exist", run_id);
        }

        Ok(())
    }

    fn run_history(&self, job_id: &str, limit: usize) -> Result<Vec<JobRun>> {
        let conn = lock_conn(&self.conn)?;
        let mut stmt = conn.prepare(&format!(
            "{} WHERE job_id = ?1 ORDER BY started_at DESC, id DESC LIMIT ?2",
            JOB_RUN_SELECT
        ))?;

        let jobs = stmt
            .query_map(params![job_id, limit as i64], Self::row_to_job_run)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(jobs)
    }

    fn last_run(&self, job_id: &str) -> Result<Option<JobRun>> {
        let conn = lock_conn(&self.conn)?;
        let job = conn
            .query_row(
                &format!(
                    "{} WHERE job_id = ?1 ORDER BY started_at DESC, id DESC LIMIT 1",
                    JOB_RUN_SELECT
                ),
                params![job_id],
                Self::row_to_job_run,
            )
            .optional()?;

        Ok(job)
    }

    fn fail_interrupted_runs(&self) -> Result<usize> {
        let conn = lock_conn(&self.conn)?;
        let now = Self::format_datetime(&Utc::now());

        let count = conn.execute(
            "UPDATE job_runs SET status = ?1, finished_at = ?2, error_message = ?3
             WHERE status = ?4",
            params![
                JobRunStatus::Failed.as_str(),
                now,
                "Job was interrupted (server restart)",
                JobRunStatus::Running.as_str()
            ],
        )?;

        Ok(count)
    }

    fn prune_run_history(&self, job_id: &str, keep: usize) -> Result<usize> {
        let conn = lock_conn(&self.conn)?;
        let deleted = conn.execute(
            "DELETE FROM job_runs WHERE job_id = ?1 AND status != ?2 AND id NOT IN (
                 SELECT id FROM job_runs WHERE job_id = ?1 AND status != ?2
                 ORDER BY started_at DESC, id DESC LIMIT ?3)",
            params![job_id, JobRunStatus::Running.as_str(), keep as i64],
        )?;

        Ok(deleted)
    }

    fn schedule_state(&self, job_id: &str) -> Result<Option<JobScheduleState>> {
        let conn = lock_conn(&self.conn)?;
        let state = conn
            .query_row(
                "SELECT job_id, next_run_at, last_run_at FROM job_schedules WHERE job_id = ?1",
                params![job_id],
                Self::row_to_schedule_state,
            )
            .optional()?;

        Ok(state)
    }

    fn save_schedule_state(&self, state: &JobScheduleState) -> Result<()> {
        let conn = lock_conn(&self.conn)?;
        let next_run_at = Self::format_datetime(&state.next_run_at);
        let last_run_at = state.last_run_at.as_ref().map(Self::format_datetime);

        conn.execute(
            "INSERT INTO job_schedules (job_id, next_run_at, last_run_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(job_id) DO UPDATE SET next_run_at = ?2,
             last_run_at = coalesce(?3, last_run_at)",
            params![state.job_id, next_run_at, last_run_at],
        )?;

        Ok(())
    }
}
