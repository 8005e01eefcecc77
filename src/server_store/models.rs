use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobRunStatus {
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobRunStatus {
    const ALL: [JobRunStatus; 4] = [
        JobRunStatus::Running,
        JobRunStatus::Completed,
        JobRunStatus::Failed,
        JobRunStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobRunStatus::Running => "running",
            JobRunStatus::Completed => "completed",
            JobRunStatus::Failed => "failed",
            JobRunStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.as_str() == s)
    }
}

/// How a finished run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    Failed(String),
    Cancelled,
}

impl RunOutcome {
    pub fn status(&self) -> JobRunStatus {
        match self {
            RunOutcome::Completed => JobRunStatus::Completed,
            RunOutcome::Failed(_) => JobRunStatus::Failed,
            RunOutcome::Cancelled => JobRunStatus::Cancelled,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            RunOutcome::Failed(message) => Some(message),
            _ => None,
        }
    }
}

/// One execution of a background job.
#[derive(Debug, Clone)]
pub struct JobRun {
    pub id: i64,
    pub job_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub status: JobRunStatus,
    pub error_message: Option<String>,
    /// "schedule", "manual" or "hook:<event>".
    pub triggered_by: String,
}

#[derive(Debug, Clone)]
pub struct JobScheduleState {
    pub job_id: String,
    pub next_run_at: DateTime<Utc>,
    pub last_run_at: Option<DateTime<Utc>>,
}
