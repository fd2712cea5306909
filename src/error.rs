//! Error types for astro-preproc

use thiserror::Error;

/// Failure classification driving the worker's retry and dead-letter dispatch.
///
/// Structural failures are terminal: the message itself is broken and
/// retrying cannot fix it. Operational failures get bounded retry with the
/// counter carried inside the message body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Structural,
    Operational,
}

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("malformed job payload: {0}")]
    MalformedPayload(String),

    #[error("invalid object address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("failed to fetch {address}: {reason}")]
    Fetch { address: String, reason: String },

    #[error("failed to upload to {bucket}/{key}")]
    Upload {
        bucket: String,
        key: String,
        #[source]
        source: object_store::Error,
    },

    #[error("object store client error: {0}")]
    StoreClient(#[source] object_store::Error),

    #[error("failed to read image: {0}")]
    ImageRead(String),

    #[error("unsupported image shape: {0:?}")]
    UnsupportedShape(Vec<usize>),

    #[error("degenerate intensity range: pmin == pmax == {0}")]
    DegenerateRange(f32),

    #[error("failed to serialize tensor: {0}")]
    TensorWrite(#[from] ndarray_npy::WriteNpyError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("queue error: {0}")]
    Queue(#[from] redis::RedisError),

    #[error("file system error: {0}")]
    Fs(#[from] std::io::Error),
}

impl WorkerError {
    /// Maps every failure kind onto the retry/dead-letter decision.
    pub fn class(&self) -> ErrorClass {
        match self {
            WorkerError::MalformedPayload(_) | WorkerError::InvalidAddress { .. } => {
                ErrorClass::Structural
            }
            _ => ErrorClass::Operational,
        }
    }
}

pub type Result<T> = std::result::Result<T, WorkerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structural_errors_are_terminal() {
        let err = WorkerError::MalformedPayload("not json".to_string());
        assert_eq!(err.class(), ErrorClass::Structural);

        let err = WorkerError::InvalidAddress {
            address: "http://x/y".to_string(),
            reason: "scheme must be 's3'".to_string(),
        };
        assert_eq!(err.class(), ErrorClass::Structural);
    }

    #[test]
    fn processing_errors_are_operational() {
        let err = WorkerError::Fetch {
            address: "s3://raw/a.fits".to_string(),
            reason: "object not found".to_string(),
        };
        assert_eq!(err.class(), ErrorClass::Operational);

        let err = WorkerError::DegenerateRange(0.5);
        assert_eq!(err.class(), ErrorClass::Operational);
    }
}
