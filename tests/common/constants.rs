//! Shared constants for the end-to-end tests.

pub const ADMIN_USER: &str = "admin";
pub const ADMIN_PASS: &str = "admin_password_123";

pub const TEST_USER: &str = "umar";
pub const TEST_PASS: &str = "test_password_123";

pub const SECOND_USER: &str = "aisha";
pub const SECOND_PASS: &str = "second_password_123";

/// A year safely in the past, so streak computation (which walks back from
/// the real current date) never sees these fixtures.
pub const TEST_YEAR: i32 = 2020;

pub const REQUEST_TIMEOUT_SECS: u64 = 10;
pub const SERVER_READY_TIMEOUT_MS: u64 = 5000;
pub const SERVER_READY_POLL_INTERVAL_MS: u64 = 20;
