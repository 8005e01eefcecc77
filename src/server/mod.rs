pub mod config;
pub mod error;
mod http_layers;
pub mod metrics;
pub mod routes;
pub mod session;
#[allow(clippy::module_inception)]
mod server;
pub mod state;

pub use config::ServerConfig;
pub use http_layers::{
    emit_library_write_hook, log_requests, triggers_reconciliation, RequestsLoggingLevel,
};
pub use server::{make_app, run_server};
