use super::context::JobContext;
use super::handle::{SchedulerCommand, SchedulerHandle, SharedJobState};
use super::job::{BackgroundJob, HookEvent, JobError, ShutdownBehavior};
use crate::server::metrics;
use crate::server_store::{JobScheduleState, RunOutcome, ServerStore};

/// Finished runs kept per job.
const MAX_RUN_HISTORY: usize = 200;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Manages background job scheduling and execution.
pub struct JobScheduler {
    /// Shared state accessible by SchedulerHandle
    shared_state: Arc<RwLock<SharedJobState>>,

    /// Task handles of running jobs, owned by the scheduler loop.
    running_handles: HashMap<String, JoinHandle<()>>,

    job_cancel_tokens: HashMap<String, CancellationToken>,

    server_store: Arc<dyn ServerStore>,

    /// Hook events from the HTTP server.
    hook_receiver: mpsc::Receiver<HookEvent>,

    command_receiver: mpsc::Receiver<SchedulerCommand>,

    /// Job tasks report their id here when they finish.
    completion_sender: mpsc::UnboundedSender<String>,
    completion_receiver: mpsc::UnboundedReceiver<String>,

    shutdown_token: CancellationToken,

    job_context: JobContext,
}

impl JobScheduler {
    pub fn new(
        server_store: Arc<dyn ServerStore>,
        hook_receiver: mpsc::Receiver<HookEvent>,
        command_receiver: mpsc::Receiver<SchedulerCommand>,
        shutdown_token: CancellationToken,
        job_context: JobContext,
        shared_state: Arc<RwLock<SharedJobState>>,
    ) -> Self {
        let (completion_sender, completion_receiver) = mpsc::unbounded_channel();
        Self {
            shared_state,
            running_handles: HashMap::new(),
            job_cancel_tokens: HashMap::new(),
            server_store,
            hook_receiver,
            command_receiver,
            completion_sender,
            completion_receiver,
            shutdown_token,
            job_context,
        }
    }

    pub async fn register_job(&mut self, job: Arc<dyn BackgroundJob>) {
        let job_id = job.id().to_string();
        info!("Registering job: {} - {}", job_id, job.description());
        let mut state = self.shared_state.write().await;
        state.jobs.insert(job_id, job);
    }

    pub async fn job_count(&self) -> usize {
        self.shared_state.read().await.jobs.len()
    }

    /// Main scheduler loop, returns after the shutdown token is cancelled.
    pub async fn run(&mut self) {
        let job_count = self.job_count().await;
        info!("Starting job scheduler with {} registered jobs", job_count);

        match self.server_store.fail_interrupted_runs() {
            Ok(count) if count > 0 => {
                info!("Marked {} stale jobs as failed from previous run", count);
            }
            Ok(_) => {}
            Err(e) => {
                error!("Failed to mark stale jobs: {}", e);
            }
        }

        self.trigger_jobs_for_hook(HookEvent::OnStartup).await;

        loop {
            self.cleanup_completed_jobs().await;

            let sleep_duration = self.time_until_next_scheduled_job().await;
            debug!(
                "Scheduler sleeping for {:?} until next scheduled job",
                sleep_duration
            );

            tokio::select! {
                _ = tokio::time::sleep(sleep_duration) => {
                    self.run_due_jobs().await;
                }
                Some(event) = self.hook_receiver.recv() => {
                    debug!("Received hook event: {}", event);
                    self.trigger_jobs_for_hook(event).await;
                }
                Some(cmd) = self.command_receiver.recv() => {
                    self.handle_command(cmd).await;
                }
                Some(job_id) = self.completion_receiver.recv() => {
                    self.spawn_pending_rerun(&job_id).await;
                }
                _ = self.shutdown_token.cancelled() => {
                    info!("Scheduler received shutdown signal");
                    self.shutdown().await;
                    break;
                }
            }
        }

        info!("Job scheduler stopped");
    }

    async fn handle_command(&mut self, cmd: SchedulerCommand) {
        match cmd {
            SchedulerCommand::TriggerJob { job_id, response } => {
                let result = self.trigger_job(&job_id).await;
                let _ = response.send(result);
            }
        }
    }

    async fn trigger_job(&mut self, job_id: &str) -> Result<(), JobError> {
        let state = self.shared_state.read().await;
        if !state.jobs.contains_key(job_id) {
            return Err(JobError::NotFound);
        }

        if state.running_jobs.contains(job_id) {
            return Err(JobError::AlreadyRunning);
        }
        drop(state);

        self.spawn_job(job_id, "manual").await;
        Ok(())
    }

    async fn time_until_next_scheduled_job(&self) -> Duration {
        let mut min_duration = Duration::from_secs(60);

        let state = self.shared_state.read().await;
        for (job_id, job) in &state.jobs {
            if state.running_jobs.contains(job_id) {
                continue;
            }

            if let Some(next_run) = self.get_next_run_time(job_id, job.as_ref()) {
                let now = chrono::Utc::now();
                if next_run > now {
                    let duration = (next_run - now).to_std().unwrap_or(Duration::from_secs(1));
                    if duration < min_duration {
                        min_duration = duration;
                    }
                } else {
                    return Duration::from_secs(0);
                }
            }
        }

        min_duration
    }

    /// Hook-only jobs have no scheduled runs. An interval job without a
    /// stored schedule is due immediately.
    fn get_next_run_time(
        &self,
        job_id: &str,
        job: &dyn BackgroundJob,
    ) -> Option<chrono::DateTime<chrono::Utc>> {
        job.schedule().interval()?;
        match self.server_store.schedule_state(job_id) {
            Ok(Some(state)) => Some(state.next_run_at),
            Ok(None) => Some(chrono::DateTime::<chrono::Utc>::MIN_UTC),
            Err(e) => {
                warn!("Failed to read schedule state of {}: {}", job_id, e);
                None
            }
        }
    }

    async fn run_due_jobs(&mut self) {
        let now = chrono::Utc::now();
        let mut jobs_to_run = Vec::new();

        {
            let state = self.shared_state.read().await;
            for (job_id, job) in &state.jobs {
                if state.running_jobs.contains(job_id) {
                    continue;
                }

                if let Some(next_run) = self.get_next_run_time(job_id, job.as_ref()) {
                    if next_run <= now {
                        jobs_to_run.push(job_id.clone());
                    }
                }
            }
        }

        for job_id in jobs_to_run {
            self.spawn_job(&job_id, "schedule").await;
        }
    }

    /// Runs every job listening for `event`. Jobs already running get one
    /// follow-up run queued instead.
    async fn trigger_jobs_for_hook(&mut self, event: HookEvent) {
        let mut jobs_to_trigger = Vec::new();

        {
            let mut guard = self.shared_state.write().await;
            let state = &mut *guard;
            for (job_id, job) in &state.jobs {
                if !job.schedule().listens_to(event) {
                    continue;
                }

                if state.running_jobs.contains(job_id) {
                    debug!("Job {} is running, queueing a rerun for {}", job_id, event);
                    state.pending_reruns.entry(job_id.clone()).or_insert(event);
                    continue;
                }

                jobs_to_trigger.push(job_id.clone());
            }
        }

        for job_id in jobs_to_trigger {
            let trigger = format!("hook:{}", event);
            self.spawn_job(&job_id, &trigger).await;
        }
    }

    async fn spawn_pending_rerun(&mut self, job_id: &str) {
        self.cleanup_completed_jobs().await;

        let event = {
            let mut state = self.shared_state.write().await;
            if state.running_jobs.contains(job_id) {
                // another run started in the meantime, the rerun waits for it
                return;
            }
            state.pending_reruns.remove(job_id)
        };

        if let Some(event) = event {
            let trigger = format!("hook:{}", event);
            self.spawn_job(job_id, &trigger).await;
        }
    }

    async fn spawn_job(&mut self, job_id: &str, triggered_by: &str) {
        let job = {
            let state = self.shared_state.read().await;
            match state.jobs.get(job_id) {
                Some(job) => Arc::clone(job),
                None => {
                    error!("Attempted to spawn unknown job: {}", job_id);
                    return;
                }
            }
        };

        let run_id = match self.server_store.start_run(job_id, triggered_by) {
            Ok(id) => id,
            Err(e) => {
                error!("Failed to record job start for {}: {}", job_id, e);
                return;
            }
        };

        info!(
            "Starting job: {} (run_id: {}, triggered_by: {})",
            job_id, run_id, triggered_by
        );

        {
            let mut state = self.shared_state.write().await;
            state.running_jobs.insert(job_id.to_string());
        }

        // Push next_run_at forward now so the loop does not respawn the
        // job while it is still running.
        if let Some(interval) = job.schedule().interval() {
            let schedule_state = JobScheduleState {
                job_id: job_id.to_string(),
                next_run_at: chrono::Utc::now()
                    + chrono::Duration::from_std(interval).unwrap_or_default(),
                last_run_at: None,
            };
            if let Err(e) = self.server_store.save_schedule_state(&schedule_state) {
                warn!("Failed to initialize schedule state for {}: {}", job_id, e);
            }
        }

        metrics::set_background_job_running(job_id, true);

        let cancel_token = self.job_context.cancellation_token.child_token();
        self.job_cancel_tokens
            .insert(job_id.to_string(), cancel_token.clone());

        let ctx = JobContext::new(
            cancel_token,
            Arc::clone(&self.job_context.library_store),
            Arc::clone(&self.job_context.server_store),
        );

        let server_store = Arc::clone(&self.server_store);
        let job_id_owned = job_id.to_string();
        let shared_state = Arc::clone(&self.shared_state);
        let completion_sender = self.completion_sender.clone();

        let handle = tokio::spawn(async move {
            let start_time = Instant::now();
            let result = tokio::task::spawn_blocking(move || job.execute(&ctx)).await;
            let elapsed = start_time.elapsed();

            let (outcome, status_label) = match result {
                Ok(Ok(())) => {
                    info!(
                        "Job {} completed successfully in {:?}",
                        job_id_owned, elapsed
                    );
                    (RunOutcome::Completed, "success")
                }
                Ok(Err(JobError::Cancelled)) => {
                    info!("Job {} was cancelled after {:?}", job_id_owned, elapsed);
                    (RunOutcome::Cancelled, "cancelled")
                }
                Ok(Err(e)) => {
                    error!("Job {} failed after {:?}: {}", job_id_owned, elapsed, e);
                    (RunOutcome::Failed(e.to_string()), "failed")
                }
                Err(e) => {
                    error!("Job {} panicked after {:?}: {}", job_id_owned, elapsed, e);
                    (RunOutcome::Failed(format!("Task panic: {}", e)), "panic")
                }
            };

            metrics::record_background_job_execution(&job_id_owned, status_label, elapsed);
            metrics::set_background_job_running(&job_id_owned, false);

            if let Err(e) = server_store.finish_run(run_id, outcome) {
                error!("Failed to record job finish for {}: {}", job_id_owned, e);
            }
            match server_store.prune_run_history(&job_id_owned, MAX_RUN_HISTORY) {
                Ok(0) => {}
                Ok(pruned) => debug!("Pruned {} old runs of {}", pruned, job_id_owned),
                Err(e) => warn!("Failed to prune run history of {}: {}", job_id_owned, e),
            }

            {
                let mut state = shared_state.write().await;
                state.running_jobs.remove(&job_id_owned);
            }

            // receiver is gone once the scheduler stopped
            let _ = completion_sender.send(job_id_owned);
        });

        self.running_handles.insert(job_id.to_string(), handle);
    }

    async fn update_schedule_after_run(&self, job_id: &str) {
        let interval = {
            let state = self.shared_state.read().await;
            match state.jobs.get(job_id) {
                Some(job) => job.schedule().interval(),
                None => return,
            }
        };

        if let Some(interval) = interval {
            let now = chrono::Utc::now();
            let state = JobScheduleState {
                job_id: job_id.to_string(),
                next_run_at: now + chrono::Duration::from_std(interval).unwrap_or_default(),
                last_run_at: Some(now),
            };

            if let Err(e) = self.server_store.save_schedule_state(&state) {
                error!("Failed to update schedule state for {}: {}", job_id, e);
            }
        }
    }

    async fn cleanup_completed_jobs(&mut self) {
        let completed: Vec<String> = self
            .running_handles
            .iter()
            .filter(|(_, handle)| handle.is_finished())
            .map(|(job_id, _)| job_id.clone())
            .collect();

        for job_id in completed {
            if let Some(handle) = self.running_handles.remove(&job_id) {
                let _ = handle.await;
            }
            self.job_cancel_tokens.remove(&job_id);
            self.update_schedule_after_run(&job_id).await;
        }
    }

    async fn shutdown(&mut self) {
        info!("Shutting down scheduler...");
        self.shared_state.write().await.pending_reruns.clear();

        {
            let state = self.shared_state.read().await;
            for job_id in &state.running_jobs {
                if let Some(job) = state.jobs.get(job_id) {
                    if job.shutdown_behavior() == ShutdownBehavior::Cancellable {
                        if let Some(token) = self.job_cancel_tokens.get(job_id) {
                            debug!("Cancelling job: {}", job_id);
                            token.cancel();
                        }
                    }
                }
            }
        }

        let mut wait_jobs = Vec::new();
        for (job_id, handle) in self.running_handles.drain() {
            let behavior = {
                let state = self.shared_state.read().await;
                state
                    .jobs
                    .get(&job_id)
                    .map(|j| j.shutdown_behavior())
                    .unwrap_or_default()
            };
            wait_jobs.push((job_id, handle, behavior));
        }

        for (job_id, handle, behavior) in wait_jobs {
            if behavior == ShutdownBehavior::WaitForCompletion {
                info!("Waiting for job {} to complete...", job_id);
            }
            let _ = tokio::time::timeout(Duration::from_secs(30), handle).await;
        }

        self.job_cancel_tokens.clear();
        info!("Scheduler shutdown complete");
    }
}

/// Create a scheduler and its handle.
pub fn create_scheduler(
    server_store: Arc<dyn ServerStore>,
    hook_receiver: mpsc::Receiver<HookEvent>,
    shutdown_token: CancellationToken,
    job_context: JobContext,
) -> (JobScheduler, SchedulerHandle) {
    let (command_tx, command_rx) = mpsc::channel(100);
    let shared_state = Arc::new(RwLock::new(SharedJobState {
        jobs: HashMap::new(),
        running_jobs: HashSet::new(),
        pending_reruns: HashMap::new(),
    }));

    let scheduler = JobScheduler::new(
        server_store.clone(),
        hook_receiver,
        command_rx,
        shutdown_token,
        job_context,
        Arc::clone(&shared_state),
    );

    let handle = SchedulerHandle::new(command_tx, shared_state, server_store);

    (scheduler, handle)
}
