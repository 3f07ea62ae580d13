/// Preset timeouts for the backends the visit pipeline talks to
use crate::timeout::TimeoutConfig;
use std::time::Duration;

/// Object storage uploads (photos, videos)
///
/// - Timeout: 60s (video payloads over mobile links are slow)
pub fn object_storage_config() -> TimeoutConfig {
    TimeoutConfig {
        duration: Duration::from_secs(60),
    }
}

/// Table API queries and inserts
///
/// - Timeout: 30s
pub fn table_api_config() -> TimeoutConfig {
    TimeoutConfig {
        duration: Duration::from_secs(30),
    }
}
