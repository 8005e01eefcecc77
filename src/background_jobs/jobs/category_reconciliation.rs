//! Merges categories that ended up with the same name.
//!
//! Runs at startup, after every successful library write, and on a slow
//! interval as a safety net.

use crate::background_jobs::{
    context::JobContext,
    job::{BackgroundJob, HookEvent, JobError, JobSchedule, ShutdownBehavior},
};
use crate::library::reconciler::reconcile_category_duplicates_with_report;
use std::time::Duration;
use tracing::{debug, info};

pub const DEFAULT_RECONCILE_INTERVAL: Duration = Duration::from_secs(60 * 60);

pub struct CategoryReconciliationJob {
    interval: Option<Duration>,
}

impl CategoryReconciliationJob {
    /// `interval` of `None` disables the periodic run, hooks still fire.
    pub fn new(interval: Option<Duration>) -> Self {
        Self { interval }
    }
}

impl Default for CategoryReconciliationJob {
    fn default() -> Self {
        Self::new(Some(DEFAULT_RECONCILE_INTERVAL))
    }
}

impl BackgroundJob for CategoryReconciliationJob {
    fn id(&self) -> &'static str {
        "category_reconciliation"
    }

    fn name(&self) -> &'static str {
        "Category Reconciliation"
    }

    fn description(&self) -> &'static str {
        "Merge categories sharing the same name into the oldest one"
    }

    fn schedule(&self) -> JobSchedule {
        JobSchedule::Combined {
            interval: self.interval,
            hooks: vec![HookEvent::OnStartup, HookEvent::OnLibraryWrite],
        }
    }

    fn shutdown_behavior(&self) -> ShutdownBehavior {
        // each merge is its own transaction, the next run picks up the rest
        ShutdownBehavior::Cancellable
    }

    fn execute(&self, ctx: &JobContext) -> Result<(), JobError> {
        if ctx.is_cancelled() {
            return Err(JobError::Cancelled);
        }

        let report = reconcile_category_duplicates_with_report(ctx.library_store.as_ref());

        if report.groups_found == 0 {
            debug!("No duplicate categories found");
            return Ok(());
        }

        info!(
            "Merged {} duplicate categories, re-linked {} media items",
            report.removed_duplicates, report.relinked_items
        );

        if report.failed_groups > 0 {
            return Err(JobError::ExecutionFailed(format!(
                "{} of {} duplicate groups could not be merged",
                report.failed_groups, report.groups_found
            )));
        }

        Ok(())
    }
}
