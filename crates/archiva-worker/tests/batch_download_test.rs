mod helpers;

use std::sync::atomic::Ordering;

use archiva_core::AppError;
use archiva_worker::BatchDownloadRequest;
use helpers::{InMemoryDataManagement, TestBatch};

fn project_tree() -> InMemoryDataManagement {
    InMemoryDataManagement::new()
        .collection("/Tenant/project", &["/Tenant/project/sub"])
        .object("/Tenant/project", "/Tenant/project/a.dat", b"alpha")
        .object("/Tenant/project/sub", "/Tenant/project/sub/b.dat", b"bravo bytes")
        .object("/Tenant/project/sub", "/Tenant/project/sub/c.dat", b"charlie")
        .object("/Tenant/project", "/Tenant/project/d.dat", b"delta")
}

fn request(batch: &TestBatch, threads: Option<&str>) -> BatchDownloadRequest {
    BatchDownloadRequest {
        source_collection: "/Tenant/project".to_string(),
        destination_dir: batch.output_dir(),
        threads: threads.map(String::from),
    }
}

#[tokio::test]
async fn test_downloads_whole_tree_with_three_workers() {
    let batch = TestBatch::new(project_tree()).await;

    let report = batch.pipeline.run(&request(&batch, Some("3"))).await.unwrap();

    assert_eq!(report.total, 4);
    assert_eq!(report.succeeded, 4);
    assert_eq!(report.failed, 0);
    assert_eq!(batch.read("project/a.dat").await.unwrap(), b"alpha");
    assert_eq!(batch.read("project/sub/b.dat").await.unwrap(), b"bravo bytes");
    assert_eq!(batch.read("project/sub/c.dat").await.unwrap(), b"charlie");
    assert!(batch.read("project/a.dat_filepart").await.is_none());
    assert!(batch.failed_records().await.is_empty());
}

#[tokio::test]
async fn test_two_workers_leave_only_final_files() {
    let service = InMemoryDataManagement::new()
        .collection("/Proj/Run1", &["/Proj/Run1/A", "/Proj/Run1/B"])
        .object("/Proj/Run1", "/Proj/Run1/summary.txt", b"run one")
        .object("/Proj/Run1/A", "/Proj/Run1/A/a1.fastq", b"ACGTACGT")
        .object("/Proj/Run1/A", "/Proj/Run1/A/a2.fastq", b"TTGCA")
        .object("/Proj/Run1/B", "/Proj/Run1/B/b1.fastq", b"GGGCCCAAATTT")
        .object("/Proj/Run1/B", "/Proj/Run1/B/b2.fastq", b"");
    let batch = TestBatch::new(service).await;
    let request = BatchDownloadRequest {
        source_collection: "/Proj/Run1".to_string(),
        destination_dir: batch.output_dir(),
        threads: Some("2".to_string()),
    };

    let report = batch.pipeline.run(&request).await.unwrap();

    assert_eq!(report.total, 5);
    assert_eq!(report.succeeded, 5);
    assert_eq!(report.failed, 0);
    assert_eq!(
        batch.output_files(),
        vec![
            "Run1/A/a1.fastq",
            "Run1/A/a2.fastq",
            "Run1/B/b1.fastq",
            "Run1/B/b2.fastq",
            "Run1/summary.txt",
        ]
    );
    assert!(batch
        .output_files()
        .iter()
        .all(|f| !f.ends_with("_filepart")));
    assert_eq!(batch.read("Run1/B/b1.fastq").await.unwrap(), b"GGGCCCAAATTT");
    assert_eq!(batch.read("Run1/B/b2.fastq").await.unwrap(), b"");
}

#[tokio::test]
async fn test_failed_object_does_not_stop_siblings() {
    let service = project_tree().broken("/Tenant/project/d.dat");
    let batch = TestBatch::new(service).await;

    let report = batch.pipeline.run(&request(&batch, Some("2"))).await.unwrap();

    assert_eq!(report.total, 4);
    assert_eq!(report.succeeded, 3);
    assert_eq!(report.failed, 1);
    assert_eq!(
        report.failed_paths().collect::<Vec<_>>(),
        vec!["/Tenant/project/d.dat"]
    );
    assert_eq!(batch.failed_records().await, vec!["/Tenant/project/d.dat"]);

    let log = batch.error_log().await;
    assert_eq!(log.len(), 1);
    assert_eq!(log[0]["path"], "/Tenant/project/d.dat");
    assert_eq!(log[0]["error_code"], "DATA_TRANSFER_ERROR");
    assert_eq!(log[0]["recoverable"], true);
    assert!(log[0]["message"]
        .as_str()
        .unwrap()
        .contains("archive unavailable"));
    assert!(batch.read("project/d.dat").await.is_none());
}

#[tokio::test]
async fn test_refused_redirect_falls_back_to_stream() {
    let service = project_tree().stream_only("/Tenant/project/sub/c.dat");
    let batch = TestBatch::new(service).await;

    let report = batch.pipeline.run(&request(&batch, None)).await.unwrap();

    assert_eq!(report.failed, 0);
    assert_eq!(batch.service.stream_fallbacks.load(Ordering::SeqCst), 1);
    assert_eq!(batch.read("project/sub/c.dat").await.unwrap(), b"charlie");
}

#[tokio::test]
async fn test_stale_partial_file_is_replaced() {
    let batch = TestBatch::new(project_tree()).await;
    let stale = batch.output_dir().join("project/a.dat_filepart");
    tokio::fs::create_dir_all(stale.parent().unwrap()).await.unwrap();
    tokio::fs::write(&stale, b"stale partial content").await.unwrap();

    batch.pipeline.run(&request(&batch, Some("1"))).await.unwrap();

    assert!(!stale.exists());
    assert_eq!(batch.read("project/a.dat").await.unwrap(), b"alpha");
}

#[tokio::test]
async fn test_single_worker_keeps_listing_order() {
    let batch = TestBatch::new(project_tree()).await;

    let report = batch.pipeline.run(&request(&batch, Some("1"))).await.unwrap();

    let paths: Vec<&str> = report.records.iter().map(|r| r.path.as_str()).collect();
    assert_eq!(
        paths,
        vec![
            "/Tenant/project/a.dat",
            "/Tenant/project/d.dat",
            "/Tenant/project/sub/b.dat",
            "/Tenant/project/sub/c.dat",
        ]
    );
}

#[tokio::test]
async fn test_listing_failure_aborts_before_downloads() {
    let service = InMemoryDataManagement::new()
        .collection("/Tenant/project", &["/Tenant/project/missing"])
        .object("/Tenant/project", "/Tenant/project/a.dat", b"alpha");
    let batch = TestBatch::new(service).await;

    let result = batch.pipeline.run(&request(&batch, Some("2"))).await;

    assert!(matches!(result, Err(AppError::NotFound(_))));
    assert!(batch.read("project/a.dat").await.is_none());
    assert!(batch.failed_records().await.is_empty());
}

#[tokio::test]
async fn test_invalid_thread_count_aborts_before_listing() {
    let batch = TestBatch::new(project_tree()).await;

    let result = batch.pipeline.run(&request(&batch, Some("many"))).await;

    assert!(matches!(result, Err(AppError::InvalidInput(_))));
    assert_eq!(batch.service.list_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_empty_collection_reports_nothing() {
    let service = InMemoryDataManagement::new().collection("/Tenant/project", &[]);
    let batch = TestBatch::new(service).await;

    let report = batch.pipeline.run(&request(&batch, Some("4"))).await.unwrap();

    assert_eq!(report.total, 0);
    assert!(report.records.is_empty());
}
