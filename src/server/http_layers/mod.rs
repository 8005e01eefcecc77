mod library_write_hook;
mod requests_logging;

pub use library_write_hook::{emit_library_write_hook, triggers_reconciliation};
pub use requests_logging::{log_requests, RequestsLoggingLevel};
