//! Shared helpers for integration tests.

#![allow(dead_code)]

pub mod mock_pagerduty;

use std::sync::Once;

static INIT: Once = Once::new();

/// Install a test-writer subscriber once, only when `RUST_LOG` is set.
pub fn init_test_logging() {
    INIT.call_once(|| {
        if std::env::var("RUST_LOG").is_ok() {
            tracing_subscriber::fmt()
                .with_test_writer()
                .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
                .try_init()
                .ok();
        }
    });
}
