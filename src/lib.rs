//! Astro Preproc - a worker service that turns raw astronomical frames into
//! training-ready tensor artifacts.
//!
//! The worker consumes job descriptors from a Redis work queue, fetches the
//! referenced FITS frame from an S3-compatible object store, normalizes and
//! augments the image, serializes the result as an `.npy` tensor, uploads it,
//! and applies bounded retry with dead-letter routing on failure.
//!
//! Message failures split into two classes: structural (the payload itself is
//! broken; straight to the dead letter queue) and operational (the attempt
//! failed; bounded retry with the counter carried in the message body). The
//! broker is the only durable state store.

pub mod config;
pub mod error;
pub mod job;
pub mod preprocess;
pub mod queue;
pub mod store;
pub mod worker;

pub use config::Config;
pub use error::{ErrorClass, Result, WorkerError};
pub use job::{JobDescriptor, ObjectAddress};
pub use queue::{JobQueue, RedisQueue};
pub use store::ObjectStoreGateway;
pub use worker::{setup_signal_handler, JobOutcome, JobProcessor, WorkerRunner};
