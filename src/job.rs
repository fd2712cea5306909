//! Job descriptors and object addresses

use crate::error::{Result, WorkerError};
use serde::{Deserialize, Serialize};

/// A single image-transform job as carried on the work queue.
///
/// The wire form is a JSON object with camelCase field names; `retries` is
/// optional and defaults to zero on first delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobDescriptor {
    pub user_id: String,
    pub job_id: String,
    pub s3_address: String,
    #[serde(default)]
    pub retries: u32,
}

impl JobDescriptor {
    /// Parses and validates a raw queue payload.
    ///
    /// This is the single structural-validation point: unparseable JSON, a
    /// missing or mistyped required field, and a malformed object address
    /// all fail here, before any processing side effect.
    pub fn parse(raw: &str) -> Result<Self> {
        let descriptor: JobDescriptor =
            serde_json::from_str(raw).map_err(|e| WorkerError::MalformedPayload(e.to_string()))?;
        ObjectAddress::parse(&descriptor.s3_address)?;
        Ok(descriptor)
    }
}

/// A parsed `s3://<bucket>/<key>` address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectAddress {
    pub bucket: String,
    pub key: String,
}

impl ObjectAddress {
    /// Parses an address, requiring the `s3` scheme and non-empty bucket
    /// and key.
    ///
    /// The address is split by hand rather than through a URL parser, which
    /// would canonicalize the host and silently lowercase the bucket name.
    pub fn parse(address: &str) -> Result<Self> {
        let invalid = |reason: &str| WorkerError::InvalidAddress {
            address: address.to_string(),
            reason: reason.to_string(),
        };

        let rest = address
            .strip_prefix("s3://")
            .ok_or_else(|| invalid("scheme must be 's3'"))?;

        let (bucket, key) = match rest.split_once('/') {
            Some((bucket, key)) => (bucket, key.trim_start_matches('/')),
            None => (rest, ""),
        };
        if bucket.is_empty() || key.is_empty() {
            return Err(invalid("address must include a bucket and an object key"));
        }

        Ok(ObjectAddress {
            bucket: bucket.to_string(),
            key: key.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorClass;

    #[test]
    fn parse_valid_descriptor() {
        let raw = r#"{"userId":"u1","jobId":"j42","s3Address":"s3://raw/frame-g-001.fits","retries":2}"#;
        let job = JobDescriptor::parse(raw).unwrap();
        assert_eq!(job.user_id, "u1");
        assert_eq!(job.job_id, "j42");
        assert_eq!(job.s3_address, "s3://raw/frame-g-001.fits");
        assert_eq!(job.retries, 2);
    }

    #[test]
    fn retries_defaults_to_zero() {
        let raw = r#"{"userId":"u1","jobId":"j42","s3Address":"s3://raw/frame-g-001.fits"}"#;
        let job = JobDescriptor::parse(raw).unwrap();
        assert_eq!(job.retries, 0);
    }

    #[test]
    fn missing_field_is_structural() {
        let raw = r#"{"jobId":"j42","s3Address":"s3://raw/frame-g-001.fits"}"#;
        let err = JobDescriptor::parse(raw).unwrap_err();
        assert!(matches!(err, WorkerError::MalformedPayload(_)));
        assert_eq!(err.class(), ErrorClass::Structural);
    }

    #[test]
    fn mistyped_field_is_structural() {
        let raw = r#"{"userId":"u1","jobId":"j42","s3Address":"s3://raw/a.fits","retries":"three"}"#;
        let err = JobDescriptor::parse(raw).unwrap_err();
        assert!(matches!(err, WorkerError::MalformedPayload(_)));
    }

    #[test]
    fn garbage_payload_is_structural() {
        let err = JobDescriptor::parse("definitely not json").unwrap_err();
        assert!(matches!(err, WorkerError::MalformedPayload(_)));
    }

    #[test]
    fn bad_address_fails_at_construction() {
        let raw = r#"{"userId":"u1","jobId":"j42","s3Address":"http://raw/a.fits"}"#;
        let err = JobDescriptor::parse(raw).unwrap_err();
        assert!(matches!(err, WorkerError::InvalidAddress { .. }));
        assert_eq!(err.class(), ErrorClass::Structural);
    }

    #[test]
    fn requeue_serialization_keeps_wire_field_names() {
        let job = JobDescriptor {
            user_id: "u1".to_string(),
            job_id: "j42".to_string(),
            s3_address: "s3://raw/a.fits".to_string(),
            retries: 1,
        };
        let wire = serde_json::to_string(&job).unwrap();
        assert!(wire.contains("\"userId\""));
        assert!(wire.contains("\"jobId\""));
        assert!(wire.contains("\"s3Address\""));
        assert!(wire.contains("\"retries\":1"));
    }

    #[test]
    fn address_parse_components() {
        let addr = ObjectAddress::parse("s3://raw/sdss/frame-g-001.fits").unwrap();
        assert_eq!(addr.bucket, "raw");
        assert_eq!(addr.key, "sdss/frame-g-001.fits");
    }

    #[test]
    fn address_preserves_bucket_and_key_case() {
        let addr = ObjectAddress::parse("s3://Raw/Frames/Frame-G-001.fits").unwrap();
        assert_eq!(addr.bucket, "Raw");
        assert_eq!(addr.key, "Frames/Frame-G-001.fits");
    }

    #[test]
    fn address_requires_s3_scheme() {
        let err = ObjectAddress::parse("https://raw/frame.fits").unwrap_err();
        assert!(matches!(err, WorkerError::InvalidAddress { .. }));
    }

    #[test]
    fn address_requires_key() {
        assert!(ObjectAddress::parse("s3://raw").is_err());
        assert!(ObjectAddress::parse("s3://raw/").is_err());
    }

    #[test]
    fn address_requires_bucket() {
        assert!(ObjectAddress::parse("s3:///frame.fits").is_err());
    }
}
