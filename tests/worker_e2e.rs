//! End-to-end worker tests against live Redis and MinIO.
//!
//! These are ignored by default; run them with `cargo test -- --ignored`
//! against a broker at REDIS_URL and a store at MINIO_ENDPOINT with the
//! `raw` source bucket and the output bucket already created.

use astro_preproc::queue::JobQueue;
use astro_preproc::{
    Config, JobOutcome, JobProcessor, ObjectStoreGateway, RedisQueue, WorkerRunner,
};
use std::path::Path;

/// Writes a minimal single-HDU FITS file with 32-bit float pixels.
fn write_test_fits(path: &Path, width: usize, height: usize, data: &[f32]) {
    assert_eq!(data.len(), width * height);
    let cards = [
        format!("{:<8}= {:>20}", "SIMPLE", "T"),
        format!("{:<8}= {:>20}", "BITPIX", "-32"),
        format!("{:<8}= {:>20}", "NAXIS", "2"),
        format!("{:<8}= {:>20}", "NAXIS1", width),
        format!("{:<8}= {:>20}", "NAXIS2", height),
        "END".to_string(),
    ];
    let mut bytes = Vec::new();
    for card in &cards {
        bytes.extend_from_slice(format!("{:<80}", card).as_bytes());
    }
    bytes.resize(2880, b' ');
    for v in data {
        bytes.extend_from_slice(&v.to_be_bytes());
    }
    let padded = 2880 + (data.len() * 4).div_ceil(2880) * 2880;
    bytes.resize(padded, 0);
    std::fs::write(path, bytes).unwrap();
}

#[tokio::test]
#[ignore] // Requires live Redis and MinIO
async fn successful_job_uploads_tensor_and_cleans_scratch() {
    dotenvy::dotenv().ok();
    let config = Config::from_env();

    // Stage the source frame in the raw bucket.
    let dir = tempfile::tempdir().unwrap();
    let frame = dir.path().join("frame-g-001.fits");
    let data: Vec<f32> = (0..48).map(|v| v as f32).collect();
    write_test_fits(&frame, 8, 6, &data);
    let store = ObjectStoreGateway::from_config(&config);
    store
        .upload(&frame, "raw", "frame-g-001.fits")
        .await
        .unwrap();

    // Enqueue the job and run one worker iteration.
    let mut producer = RedisQueue::connect(&config).await.unwrap();
    producer
        .push_work(r#"{"userId":"u1","jobId":"j42","s3Address":"s3://raw/frame-g-001.fits"}"#)
        .await
        .unwrap();

    let queue = RedisQueue::connect(&config).await.unwrap();
    let processor = JobProcessor::new(ObjectStoreGateway::from_config(&config), &config);
    let mut runner = WorkerRunner::new(queue, processor, &config);

    let outcome = runner.run_once().await.unwrap();
    match outcome {
        JobOutcome::Completed { key } => assert_eq!(key, "u1/j42.npy"),
        other => panic!("unexpected outcome: {:?}", other),
    }

    // Scratch files are gone on the success path.
    assert!(!config.scratch_dir.join("j42.fits").exists());
    assert!(!config.scratch_dir.join("j42.npy").exists());

    // The artifact is fetchable at its deterministic key.
    let fetched = dir.path().join("fetched.npy");
    store
        .fetch(
            &format!("s3://{}/u1/j42.npy", config.output_bucket),
            &fetched,
        )
        .await
        .unwrap();
    assert!(fetched.exists());
}

#[tokio::test]
#[ignore] // Requires live Redis and MinIO
async fn missing_object_is_retried_with_bumped_counter() {
    dotenvy::dotenv().ok();
    let config = Config::from_env();

    let mut producer = RedisQueue::connect(&config).await.unwrap();
    producer
        .push_work(r#"{"userId":"u1","jobId":"j-missing","s3Address":"s3://raw/no-such.fits"}"#)
        .await
        .unwrap();

    let queue = RedisQueue::connect(&config).await.unwrap();
    let processor = JobProcessor::new(ObjectStoreGateway::from_config(&config), &config);
    let mut runner = WorkerRunner::new(queue, processor, &config);

    let outcome = runner.run_once().await.unwrap();
    assert_eq!(outcome, JobOutcome::Retried { attempt: 1 });

    // Drain the requeued message so the queue is left clean.
    let mut consumer = RedisQueue::connect(&config).await.unwrap();
    let requeued = consumer.pop_job().await.unwrap();
    assert!(requeued.contains("\"retries\":1"));
}
