//! Worker runner - the main queue-consuming loop
//!
//! Owns every retry and dead-letter decision. One job fully resolves to
//! success, requeue, or the dead letter queue before the next pop; the
//! blocking pop is the only place the loop suspends.

use crate::config::Config;
use crate::error::{ErrorClass, Result};
use crate::job::JobDescriptor;
use crate::queue::JobQueue;
use crate::worker::JobProcessor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::{error, info, warn};

/// Terminal state of a single dequeued message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// Artifact uploaded, scratch files removed, message discarded.
    Completed { key: String },
    /// Structurally invalid payload, forwarded verbatim to the DLQ.
    Rejected,
    /// Operational failure with retry budget left; requeued with the
    /// counter bumped by one.
    Retried { attempt: u32 },
    /// Operational failure past the retry bound; forwarded verbatim to
    /// the DLQ.
    DeadLettered,
}

/// The worker loop over an already-connected queue.
pub struct WorkerRunner<Q: JobQueue> {
    queue: Q,
    processor: JobProcessor,
    max_retries: u32,
    shutdown: Arc<AtomicBool>,
}

impl<Q: JobQueue> WorkerRunner<Q> {
    pub fn new(queue: Q, processor: JobProcessor, config: &Config) -> Self {
        Self {
            queue,
            processor,
            max_retries: config.max_retries,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Get a handle to signal shutdown
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// Main worker loop
    ///
    /// Pops and resolves jobs until shutdown is signaled. The shutdown flag
    /// is checked between jobs, so it takes effect once the in-flight job
    /// resolves.
    pub async fn run(&mut self) -> Result<()> {
        info!(
            "Starting preprocessing worker (max retries: {})...",
            self.max_retries
        );

        loop {
            if self.shutdown.load(Ordering::Relaxed) {
                info!("Shutdown signal received, stopping worker...");
                break;
            }

            match self.run_once().await {
                Ok(outcome) => info!("Job resolved: {:?}", outcome),
                Err(e) => {
                    error!("Worker error: {}", e);
                    // Broker hiccup; wait a bit before the next pop.
                    sleep(Duration::from_secs(5)).await;
                }
            }
        }

        info!("Worker stopped");
        Ok(())
    }

    /// Pops and fully resolves a single job (useful for testing with the
    /// --once flag).
    pub async fn run_once(&mut self) -> Result<JobOutcome> {
        let raw = self.queue.pop_job().await?;

        let job = match JobDescriptor::parse(&raw) {
            Ok(job) => job,
            Err(e) => {
                // Unsalvageable payload: no retry count is ever assigned
                // and no processing side effect happens.
                warn!("Rejecting unsalvageable payload: {}", e);
                self.queue.push_dead_letter(&raw).await?;
                return Ok(JobOutcome::Rejected);
            }
        };

        info!("Processing job {} for user {}", job.job_id, job.user_id);
        match self.processor.process(&job).await {
            Ok(key) => {
                info!("Job {} completed, artifact at {}", job.job_id, key);
                Ok(JobOutcome::Completed { key })
            }
            Err(e) => {
                warn!("Job {} failed: {}", job.job_id, e);
                resolve_failure(&mut self.queue, &raw, e.class(), self.max_retries).await
            }
        }
    }
}

/// Single dispatch point from failure class to queue placement.
///
/// The retry counter is re-read from the original payload rather than any
/// in-memory copy, and every dead-lettered payload is forwarded verbatim.
async fn resolve_failure<Q: JobQueue>(
    queue: &mut Q,
    raw: &str,
    class: ErrorClass,
    max_retries: u32,
) -> Result<JobOutcome> {
    if class == ErrorClass::Structural {
        queue.push_dead_letter(raw).await?;
        return Ok(JobOutcome::Rejected);
    }

    // The requeued payload must stay identical to the original apart from
    // the retry counter, so the whole JSON object is round-tripped rather
    // than going through the typed descriptor (which would drop any fields
    // beyond the ones it knows).
    let mut payload: serde_json::Map<String, serde_json::Value> = match serde_json::from_str(raw) {
        Ok(payload) => payload,
        Err(_) => {
            // Poison pill: it failed operationally and cannot even carry a
            // retry counter.
            warn!("Could not parse job to update retry count, moving to DLQ");
            queue.push_dead_letter(raw).await?;
            return Ok(JobOutcome::DeadLettered);
        }
    };

    let retries = payload
        .get("retries")
        .and_then(|v| v.as_u64())
        .unwrap_or(0) as u32;
    let job_id = payload
        .get("jobId")
        .and_then(|v| v.as_str())
        .unwrap_or("<unknown>")
        .to_string();

    if retries < max_retries {
        let attempt = retries + 1;
        payload.insert("retries".to_string(), attempt.into());
        let requeued = serde_json::to_string(&payload)?;
        info!("Re-queueing job {} (attempt {})", job_id, attempt);
        queue.push_work(&requeued).await?;
        Ok(JobOutcome::Retried { attempt })
    } else {
        error!(
            "PERMANENT FAILURE: job {} failed after {} retries, moving to DLQ",
            job_id, max_retries
        );
        queue.push_dead_letter(raw).await?;
        Ok(JobOutcome::DeadLettered)
    }
}

/// Setup signal handlers for graceful shutdown
pub fn setup_signal_handler(shutdown: Arc<AtomicBool>) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl+C, initiating shutdown...");
                shutdown.store(true, Ordering::Relaxed);
            }
            Err(e) => {
                error!("Failed to listen for Ctrl+C: {}", e);
            }
        }
    });
}
