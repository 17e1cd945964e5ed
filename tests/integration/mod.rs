//! Integration tests for mysql-probe.

pub mod context_test;
pub mod mysql_test;

/// Helper to get the live test server URL from the environment.
pub fn get_test_url() -> Option<String> {
    std::env::var("MYSQL_TEST_URL").ok()
}
