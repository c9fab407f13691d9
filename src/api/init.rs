use std::sync::Once;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::DEFAULT_LOG_FILTER;

static INIT_TRACING: Once = Once::new();

/// Install the fmt subscriber once. A subscriber set up by the host wins.
pub fn init_logging() {
    INIT_TRACING.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .try_init();

        info!("pgm tracing initialized");
    });
}
