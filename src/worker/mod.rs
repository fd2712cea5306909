//! Worker module: the queue-consuming loop and per-job processor
//!
//! This module provides:
//! - WorkerRunner: main worker loop owning all retry/dead-letter decisions
//! - JobProcessor: fetch, preprocess, upload, cleanup for a single job
//! - JobOutcome: the terminal state of one dequeued message

pub mod processor;
pub mod runner;

pub use processor::JobProcessor;
pub use runner::{setup_signal_handler, JobOutcome, WorkerRunner};
