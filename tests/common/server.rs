//! Test server lifecycle management
//!
//! Each test gets an isolated server with its own databases.

use super::constants::*;
use super::fixtures::create_test_db_with_users;
use media_library_server::background_jobs::jobs::CategoryReconciliationJob;
use media_library_server::background_jobs::{create_scheduler, JobContext};
use media_library_server::library::{LibraryManager, LibraryStore, SqliteLibraryStore};
use media_library_server::server::state::ServerState;
use media_library_server::server::{make_app, RequestsLoggingLevel, ServerConfig};
use media_library_server::server_store::{ServerStore, SqliteServerStore};
use media_library_server::user::{SqliteUserStore, UserManager};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

/// Test server instance with isolated databases.
///
/// When dropped, the server and its scheduler shut down and the temp
/// directory is removed.
pub struct TestServer {
    /// Base URL for making requests (e.g., "http://127.0.0.1:12345")
    pub base_url: String,

    /// Direct access to the library database, for seeding and assertions.
    pub library_store: Arc<SqliteLibraryStore>,

    _temp_db_dir: TempDir,
    _shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
    shutdown_token: CancellationToken,
}

impl TestServer {
    /// Spawns a server without a job scheduler.
    pub async fn spawn() -> Self {
        Self::spawn_inner(false).await
    }

    /// Spawns a server with the category reconciliation job registered and
    /// library writes wired to it. The periodic run is disabled.
    pub async fn spawn_with_scheduler() -> Self {
        Self::spawn_inner(true).await
    }

    async fn spawn_inner(with_scheduler: bool) -> Self {
        let (temp_db_dir, user_db_path) =
            create_test_db_with_users().expect("Failed to create test database");

        let library_store = Arc::new(
            SqliteLibraryStore::new(temp_db_dir.path().join("library.db"))
                .expect("Failed to open library store"),
        );
        let user_store =
            Arc::new(SqliteUserStore::new(&user_db_path).expect("Failed to open user store"));
        let server_store = Arc::new(
            SqliteServerStore::new(temp_db_dir.path().join("server.db"))
                .expect("Failed to create server store"),
        );

        let shutdown_token = CancellationToken::new();
        let (scheduler_handle, hook_sender) = if with_scheduler {
            let (hook_sender, hook_receiver) = tokio::sync::mpsc::channel(100);
            let job_context = JobContext::new(
                shutdown_token.child_token(),
                library_store.clone() as Arc<dyn LibraryStore>,
                server_store.clone() as Arc<dyn ServerStore>,
            );
            let (mut scheduler, handle) = create_scheduler(
                server_store as Arc<dyn ServerStore>,
                hook_receiver,
                shutdown_token.clone(),
                job_context,
            );
            scheduler
                .register_job(Arc::new(CategoryReconciliationJob::new(None)))
                .await;
            tokio::spawn(async move { scheduler.run().await });
            (Some(handle), Some(hook_sender))
        } else {
            (None, None)
        };

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();
        let base_url = format!("http://127.0.0.1:{}", port);

        let config = ServerConfig {
            requests_logging_level: RequestsLoggingLevel::None,
            port,
            metrics_port: 0,
            frontend_dir_path: None,
        };
        let state = ServerState::new(
            config,
            Arc::new(LibraryManager::new(library_store.clone())),
            Arc::new(UserManager::new(user_store)),
            scheduler_handle,
            hook_sender,
        );
        let app = make_app(state);

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .expect("Server failed");
        });

        let server = Self {
            base_url,
            library_store,
            _temp_db_dir: temp_db_dir,
            _shutdown_tx: Some(shutdown_tx),
            shutdown_token,
        };
        server.wait_for_ready().await;
        server
    }

    /// Polls `/` until the server answers.
    async fn wait_for_ready(&self) {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .expect("Failed to build reqwest client");

        let start = std::time::Instant::now();
        let timeout = Duration::from_millis(SERVER_READY_TIMEOUT_MS);

        loop {
            if start.elapsed() > timeout {
                panic!(
                    "Server did not become ready within {}ms",
                    SERVER_READY_TIMEOUT_MS
                );
            }
            match client.get(format!("{}/", self.base_url)).send().await {
                Ok(response) if response.status().is_success() => return,
                _ => {
                    tokio::time::sleep(Duration::from_millis(SERVER_READY_POLL_INTERVAL_MS)).await
                }
            }
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self._shutdown_tx.take() {
            let _ = tx.send(());
        }
        self.shutdown_token.cancel();
    }
}
