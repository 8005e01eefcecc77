//! Shared constants for end-to-end tests

// ============================================================================
// Test User Credentials
// ============================================================================

pub const TEST_USER_NAME: &str = "Test User";
pub const TEST_USER: &str = "user@example.com";
pub const TEST_PASS: &str = "testpass123";

pub const ADMIN_USER_NAME: &str = "Admin";
pub const ADMIN_USER: &str = "admin@example.com";
pub const ADMIN_PASS: &str = "adminpass123";

// ============================================================================
// Timeouts
// ============================================================================

pub const SERVER_READY_TIMEOUT_MS: u64 = 5000;
pub const SERVER_READY_POLL_INTERVAL_MS: u64 = 20;
pub const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Upper bound for background reconciliation to settle after a write.
pub const RECONCILE_WAIT_MS: u64 = 5000;
