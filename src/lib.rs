pub mod config;
pub mod engine;
pub mod error;
pub mod feed;

pub use config::Config;
pub use error::{EngineError, EngineResult};

/// Install the fmt subscriber. `RUST_LOG` wins over `default_filter`.
/// Safe to call more than once; later calls are no-ops.
pub fn init_tracing(default_filter: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
