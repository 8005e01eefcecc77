use crate::library::LibraryStore;
use crate::server_store::ServerStore;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Shared resources handed to jobs, plus a cancellation token for
/// graceful shutdown.
#[derive(Clone)]
pub struct JobContext {
    pub cancellation_token: CancellationToken,

    /// Categories, media items and collections.
    pub library_store: Arc<dyn LibraryStore>,

    /// Job history and schedules.
    pub server_store: Arc<dyn ServerStore>,
}

impl JobContext {
    pub fn new(
        cancellation_token: CancellationToken,
        library_store: Arc<dyn LibraryStore>,
        server_store: Arc<dyn ServerStore>,
    ) -> Self {
        Self {
            cancellation_token,
            library_store,
            server_store,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation_token.is_cancelled()
    }
}
