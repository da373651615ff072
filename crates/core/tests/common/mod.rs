//! Shared setup for the integration tests

use adi_filter_core::{AnisotropicFilter, FilterConfig};
use tracing_subscriber::EnvFilter;

/// Route library logs to the test harness once per test binary.
/// Set `RUST_LOG=debug` to see them.
#[ctor::ctor]
fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Filter on a small pool so tests do not compete for every core
pub fn filter(config: FilterConfig) -> AnisotropicFilter {
    AnisotropicFilter::new(FilterConfig {
        worker_count: 2,
        ..config
    })
    .expect("valid test configuration")
}
