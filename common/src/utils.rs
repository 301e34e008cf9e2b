// common/src/utils.rs
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Setup tracing for consistent logging across services
pub fn setup_tracing() {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");
}

/// Current unix time in whole seconds.
pub fn unix_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("Time went backwards")
        .as_secs() as i64
}
