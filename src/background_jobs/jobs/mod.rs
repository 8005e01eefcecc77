//! Specific background job implementations.

pub mod category_reconciliation;

pub use category_reconciliation::CategoryReconciliationJob;
