//! Shared job context

use std::sync::Arc;
use std::time::Duration;

use camrelay_core::{RelayConfig, RetryPolicy};
use camrelay_transport::ConnectionPool;
use chrono_tz::Tz;

pub const DEFAULT_PUBLIC_BASE_URL: &str = "https://glacier.org/webcam";

/// Retry, naming and labelling settings every job runs with
#[derive(Debug, Clone)]
pub struct JobSettings {
    pub download_retry: RetryPolicy,
    pub upload_retry: RetryPolicy,
    /// Whole download-and-overlay restarts after a corrupted frame
    pub cycle_retry: RetryPolicy,
    /// Wait before the single retry of a missing source
    pub not_found_grace: Duration,
    pub publish_temp_suffix: String,
    pub public_base_url: String,
    pub label_timezone: Tz,
}

impl JobSettings {
    pub fn from_config(config: &RelayConfig) -> Self {
        Self {
            download_retry: config.download_retry,
            upload_retry: config.upload_retry,
            cycle_retry: config.cycle_retry,
            not_found_grace: config.not_found_grace,
            publish_temp_suffix: config.publish_temp_suffix.clone(),
            public_base_url: config.public_base_url.clone(),
            label_timezone: config.label_timezone,
        }
    }
}

impl Default for JobSettings {
    fn default() -> Self {
        Self {
            download_retry: RetryPolicy::default(),
            upload_retry: RetryPolicy::default(),
            cycle_retry: RetryPolicy::new(3, Duration::from_secs(2)),
            not_found_grace: Duration::from_secs(6),
            publish_temp_suffix: ".tmp".to_string(),
            public_base_url: DEFAULT_PUBLIC_BASE_URL.to_string(),
            label_timezone: chrono_tz::America::Denver,
        }
    }
}

/// What a job needs from the outside world: the shared sessions and its settings.
pub struct JobContext {
    pub pool: Arc<ConnectionPool>,
    pub settings: JobSettings,
}

impl JobContext {
    pub fn new(pool: Arc<ConnectionPool>, settings: JobSettings) -> Self {
        Self { pool, settings }
    }
}
