//! End-to-end service tests
//!
//! Drive the full pipeline through a real watched directory: file creation,
//! upload, delete-on-success, deferred retry, and the shutdown report.

mod common;

use common::{drop_file, AcceptingUploader, FlakyUploader, RefusingUploader};
use shutterlift::config::{
    CloudinaryConfig, Config, MetricsConfig, RetryConfig, WatchConfig, WorkerConfig,
};
use shutterlift::service::{Service, ServiceState};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

fn test_config(directory: &Path, max_tries: u32, sweep_interval_ms: u64) -> Config {
    Config {
        watch: WatchConfig {
            directory: directory.to_path_buf(),
            pattern: "*.jpg".into(),
        },
        cloudinary: CloudinaryConfig {
            cloud_name: "demo".into(),
            api_key: "key".into(),
            api_secret: "secret".into(),
            api_base: None,
        },
        retry: RetryConfig {
            max_tries,
            sweep_interval_ms,
        },
        worker: WorkerConfig::default(),
        metrics: MetricsConfig {
            enabled: false,
            port: 0,
        },
    }
}

async fn wait_until<F: Fn() -> bool>(what: &str, condition: F) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    while !condition() {
        if tokio::time::Instant::now() > deadline {
            panic!("Timed out waiting for: {what}");
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
}

async fn start(service: &Arc<Service>) -> tokio::task::JoinHandle<()> {
    let runner = {
        let service = service.clone();
        tokio::spawn(async move {
            service.run().await.unwrap();
        })
    };
    let service = service.clone();
    wait_until("service to reach Running", move || {
        service.state() == ServiceState::Running
    })
    .await;
    // Let the watch backend settle before producing events
    tokio::time::sleep(Duration::from_millis(200)).await;
    runner
}

#[tokio::test]
async fn test_created_file_is_uploaded_and_deleted() {
    let dir = tempfile::tempdir().unwrap();
    let uploader = Arc::new(AcceptingUploader::new());
    let service = Arc::new(Service::with_uploader(
        test_config(dir.path(), 5, 300_000),
        uploader,
    ));
    let runner = start(&service).await;

    let path = drop_file(dir.path(), "a.jpg");
    wait_until("uploaded file to be deleted", || !path.exists()).await;

    service.shutdown_handle().shutdown();
    runner.await.unwrap();

    assert_eq!(service.coordinator().success_count(), 1);
    assert!(!service.coordinator().has_pending());
    assert_eq!(service.state(), ServiceState::Stopped);
}

#[tokio::test]
async fn test_deferred_file_recovers_on_sweep() {
    let dir = tempfile::tempdir().unwrap();
    // Both immediate attempts fail; the sweep attempt succeeds
    let uploader = Arc::new(FlakyUploader::failing(2));
    let service = Arc::new(Service::with_uploader(
        test_config(dir.path(), 2, 300),
        uploader,
    ));
    let runner = start(&service).await;

    let path = drop_file(dir.path(), "slow.jpg");
    wait_until("deferred file to be uploaded by the sweep", || {
        !path.exists()
    })
    .await;

    service.shutdown_handle().shutdown();
    runner.await.unwrap();

    assert_eq!(service.coordinator().success_count(), 1);
    assert!(!service.coordinator().has_pending());
}

#[tokio::test]
async fn test_shutdown_report_lists_failing_paths_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let uploader = Arc::new(RefusingUploader::new());
    // Long sweep interval keeps deferred entries parked during the test
    let service = Arc::new(Service::with_uploader(
        test_config(dir.path(), 2, 300_000),
        uploader,
    ));
    let runner = start(&service).await;

    let first = drop_file(dir.path(), "b.jpg");
    {
        let service = service.clone();
        let first = first.clone();
        wait_until("first file to be deferred", move || {
            service.coordinator().pending_paths() == vec![first.clone()]
        })
        .await;
    }
    let second = drop_file(dir.path(), "c.jpg");
    {
        let service = service.clone();
        wait_until("second file to be deferred", move || {
            service.coordinator().pending_paths().len() == 2
        })
        .await;
    }

    service.shutdown_handle().shutdown();
    runner.await.unwrap();

    // Still-failing files remain on disk and are reported in enqueue order
    assert_eq!(service.coordinator().pending_paths(), vec![first.clone(), second.clone()]);
    assert!(first.exists());
    assert!(second.exists());
    assert_eq!(service.coordinator().success_count(), 0);
    assert_eq!(service.state(), ServiceState::Stopped);
}
