use axum::extract::FromRef;

use crate::background_jobs::{HookEvent, SchedulerHandle};
use crate::library::LibraryManager;
use crate::user::UserManager;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;

use super::ServerConfig;

pub type GuardedLibraryManager = Arc<LibraryManager>;
pub type GuardedUserManager = Arc<UserManager>;
pub type OptionalSchedulerHandle = Option<SchedulerHandle>;
pub type OptionalHookSender = Option<mpsc::Sender<HookEvent>>;

#[derive(Clone)]
pub struct ServerState {
    pub config: ServerConfig,
    pub start_time: Instant,
    pub library_manager: GuardedLibraryManager,
    pub user_manager: GuardedUserManager,
    pub scheduler_handle: OptionalSchedulerHandle,
    /// Receives `OnLibraryWrite` after successful writes. `None` when no
    /// scheduler is running.
    pub hook_sender: OptionalHookSender,
    pub hash: String,
}

impl ServerState {
    pub fn new(
        config: ServerConfig,
        library_manager: GuardedLibraryManager,
        user_manager: GuardedUserManager,
        scheduler_handle: OptionalSchedulerHandle,
        hook_sender: OptionalHookSender,
    ) -> ServerState {
        ServerState {
            config,
            start_time: Instant::now(),
            library_manager,
            user_manager,
            scheduler_handle,
            hook_sender,
            hash: env!("GIT_HASH").to_owned(),
        }
    }
}

impl FromRef<ServerState> for GuardedLibraryManager {
    fn from_ref(input: &ServerState) -> Self {
        input.library_manager.clone()
    }
}

impl FromRef<ServerState> for GuardedUserManager {
    fn from_ref(input: &ServerState) -> Self {
        input.user_manager.clone()
    }
}

impl FromRef<ServerState> for ServerConfig {
    fn from_ref(input: &ServerState) -> Self {
        input.config.clone()
    }
}

impl FromRef<ServerState> for OptionalSchedulerHandle {
    fn from_ref(input: &ServerState) -> Self {
        input.scheduler_handle.clone()
    }
}

impl FromRef<ServerState> for OptionalHookSender {
    fn from_ref(input: &ServerState) -> Self {
        input.hook_sender.clone()
    }
}
