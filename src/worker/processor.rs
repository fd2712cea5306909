//! Job processor for handling individual image-transform jobs

use crate::config::Config;
use crate::error::Result;
use crate::job::JobDescriptor;
use crate::preprocess;
use crate::store::ObjectStoreGateway;
use std::path::PathBuf;
use tracing::{debug, info};

/// Processes validated jobs: fetch, preprocess, upload, clean up.
///
/// Holds no per-job state; the store gateway is injected once and reused
/// across jobs.
pub struct JobProcessor {
    store: ObjectStoreGateway,
    output_bucket: String,
    scratch_dir: PathBuf,
}

impl JobProcessor {
    pub fn new(store: ObjectStoreGateway, config: &Config) -> Self {
        Self {
            store,
            output_bucket: config.output_bucket.clone(),
            scratch_dir: config.scratch_dir.clone(),
        }
    }

    /// Scratch path for the fetched input frame.
    pub fn input_path(&self, job: &JobDescriptor) -> PathBuf {
        self.scratch_dir.join(format!("{}.fits", job.job_id))
    }

    /// Scratch path for the produced tensor.
    pub fn output_path(&self, job: &JobDescriptor) -> PathBuf {
        self.scratch_dir.join(format!("{}.npy", job.job_id))
    }

    /// Runs one processing attempt for a validated descriptor, returning the
    /// output object key on success.
    ///
    /// Scratch files are removed on the success path only; a failed attempt
    /// may leave them behind for the next attempt to overwrite.
    pub async fn process(&self, job: &JobDescriptor) -> Result<String> {
        let input_path = self.input_path(job);
        let output_path = self.output_path(job);

        info!("Fetching {} for job {}", job.s3_address, job.job_id);
        self.store.fetch(&job.s3_address, &input_path).await?;

        preprocess::process_file(&input_path, &output_path)?;

        let key = format!("{}/{}.npy", job.user_id, job.job_id);
        info!("Uploading tensor to {}/{}", self.output_bucket, key);
        self.store
            .upload(&output_path, &self.output_bucket, &key)
            .await?;

        tokio::fs::remove_file(&input_path).await?;
        tokio::fs::remove_file(&output_path).await?;
        debug!("Removed scratch files for job {}", job.job_id);

        Ok(key)
    }
}
