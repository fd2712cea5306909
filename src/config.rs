//! Worker configuration loaded from the process environment

use std::env;
use std::path::PathBuf;

/// Retry bound fixed by the queue contract: a job that fails with this many
/// retries already recorded goes to the dead letter queue.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Worker configuration
///
/// Every field has a development default so a worker can run against a
/// local Redis and MinIO with no environment at all.
#[derive(Debug, Clone)]
pub struct Config {
    /// Broker connection string (`REDIS_URL`)
    pub redis_url: String,

    /// Object store endpoint, host:port (`MINIO_ENDPOINT`)
    pub store_endpoint: String,

    /// Object store access key (`MINIO_ACCESS_KEY`)
    pub store_access_key: String,

    /// Object store secret key (`MINIO_SECRET_KEY`)
    pub store_secret_key: String,

    /// Name of the work queue list (`WORK_QUEUE_NAME`)
    pub work_queue: String,

    /// Name of the dead letter queue list (`DLQ_NAME`)
    pub dead_letter_queue: String,

    /// Bucket receiving processed tensors (`PROCESSED_DATA_BUCKET`)
    pub output_bucket: String,

    /// Retry bound for operational failures (`MAX_RETRIES`)
    pub max_retries: u32,

    /// Directory for per-job scratch files (`SCRATCH_DIR`)
    pub scratch_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            redis_url: "redis://127.0.0.1:6379".to_string(),
            store_endpoint: "localhost:9000".to_string(),
            store_access_key: "minioadmin".to_string(),
            store_secret_key: "minioadmin".to_string(),
            work_queue: "workQueue".to_string(),
            dead_letter_queue: "dead_letter_queue".to_string(),
            output_bucket: "user-data".to_string(),
            max_retries: DEFAULT_MAX_RETRIES,
            scratch_dir: env::temp_dir(),
        }
    }
}

impl Config {
    /// Reads configuration from the environment, falling back to defaults
    /// for anything unset.
    pub fn from_env() -> Self {
        let defaults = Config::default();
        Self {
            redis_url: env::var("REDIS_URL").unwrap_or(defaults.redis_url),
            store_endpoint: env::var("MINIO_ENDPOINT").unwrap_or(defaults.store_endpoint),
            store_access_key: env::var("MINIO_ACCESS_KEY").unwrap_or(defaults.store_access_key),
            store_secret_key: env::var("MINIO_SECRET_KEY").unwrap_or(defaults.store_secret_key),
            work_queue: env::var("WORK_QUEUE_NAME").unwrap_or(defaults.work_queue),
            dead_letter_queue: env::var("DLQ_NAME").unwrap_or(defaults.dead_letter_queue),
            output_bucket: env::var("PROCESSED_DATA_BUCKET").unwrap_or(defaults.output_bucket),
            max_retries: env::var("MAX_RETRIES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_retries),
            scratch_dir: env::var("SCRATCH_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.scratch_dir),
        }
    }
}
