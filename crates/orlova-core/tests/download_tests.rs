//! Asset downloads against a mock file server.

use orlova_core::download::{DownloadJob, DownloadManager, JobState, ModelStore};
use orlova_core::registry::RegistryClient;
use orlova_core::{DestinationKind, MemoryCache, OrlovaError};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const FILE_PATH: &str = "/stabilityai/sdxl-vae/resolve/main/sdxl_vae.safetensors";

fn manager(server: &MockServer, root: &TempDir) -> DownloadManager {
    let registry = RegistryClient::new(Arc::new(MemoryCache::new()), Duration::from_secs(60))
        .unwrap()
        .with_base_urls(format!("{}/api", server.uri()), server.uri());
    DownloadManager::new(Arc::new(registry), ModelStore::with_root(root.path()))
}

fn vae_job() -> DownloadJob {
    DownloadJob::new("stabilityai/sdxl-vae", "sdxl_vae.safetensors", DestinationKind::Vae)
}

fn vae_target(root: &TempDir) -> std::path::PathBuf {
    root.path().join("models/vae/sdxl_vae.safetensors")
}

fn part_file(root: &TempDir) -> std::path::PathBuf {
    root.path().join("models/vae/sdxl_vae.safetensors.part")
}

#[tokio::test]
async fn test_download_writes_target_and_reports_progress() {
    let server = MockServer::start().await;
    let body = vec![7u8; 64 * 1024];
    Mock::given(method("GET"))
        .and(path(FILE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.clone()))
        .expect(1)
        .mount(&server)
        .await;

    let root = TempDir::new().unwrap();
    let mut job = vae_job();
    let mut events = Vec::new();

    let outcome = manager(&server, &root)
        .start(&mut job, |p| events.push(p))
        .await
        .unwrap();

    assert!(outcome.success);
    assert_eq!(outcome.path.as_deref(), Some(vae_target(&root).as_path()));
    assert!(outcome.message.starts_with("Downloaded to "));
    assert_eq!(std::fs::read(vae_target(&root)).unwrap(), body);
    assert!(!part_file(&root).exists());

    assert_eq!(job.state(), JobState::Completed);
    assert_eq!(job.downloaded_bytes, body.len() as u64);
    assert_eq!(job.total_bytes, Some(body.len() as u64));

    let last = events.last().unwrap();
    assert_eq!(last.percent, Some(100));
    assert_eq!(last.status, "Downloading: 64.0 KB / 64.0 KB");
    let mut previous = 0;
    for event in &events {
        let done = event.downloaded_bytes.unwrap();
        assert!(done >= previous);
        previous = done;
    }
}

#[tokio::test]
async fn test_existing_target_rejected_without_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"new".to_vec()))
        .expect(0)
        .mount(&server)
        .await;

    let root = TempDir::new().unwrap();
    std::fs::create_dir_all(root.path().join("models/vae")).unwrap();
    std::fs::write(vae_target(&root), b"old").unwrap();

    let mut job = vae_job();
    let outcome = manager(&server, &root).start(&mut job, |_| {}).await.unwrap();

    assert!(!outcome.success);
    assert!(outcome.message.starts_with("File already exists: "));
    assert_eq!(std::fs::read(vae_target(&root)).unwrap(), b"old");
    assert_eq!(job.state(), JobState::Failed);
}

#[tokio::test]
async fn test_cancel_during_stream_leaves_no_files() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(FILE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8; 256 * 1024]))
        .mount(&server)
        .await;

    let root = TempDir::new().unwrap();
    let mut job = vae_job();
    let handle = job.cancel_handle();

    let outcome = manager(&server, &root)
        .start(&mut job, move |_| handle.cancel())
        .await
        .unwrap();

    assert!(!outcome.success);
    assert_eq!(outcome.message, "Download cancelled");
    assert_eq!(job.state(), JobState::Cancelled);
    assert!(!vae_target(&root).exists());
    assert!(!part_file(&root).exists());
}

#[tokio::test]
async fn test_cancel_before_start_makes_no_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let root = TempDir::new().unwrap();
    let mut job = vae_job();
    job.cancel_handle().cancel();

    let outcome = manager(&server, &root).start(&mut job, |_| {}).await.unwrap();

    assert!(!outcome.success);
    assert_eq!(job.state(), JobState::Cancelled);
}

#[tokio::test]
async fn test_server_error_fails_without_partial_file() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(FILE_PATH))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let root = TempDir::new().unwrap();
    let mut job = vae_job();

    let err = manager(&server, &root).start(&mut job, |_| {}).await.unwrap_err();

    assert!(matches!(err, OrlovaError::Registry { status: 500, .. }));
    assert_eq!(job.state(), JobState::Failed);
    assert!(!part_file(&root).exists());
    assert!(!vae_target(&root).exists());
}

#[tokio::test]
async fn test_missing_root_is_rejected() {
    let server = MockServer::start().await;
    let registry = RegistryClient::new(Arc::new(MemoryCache::new()), Duration::from_secs(60))
        .unwrap()
        .with_base_urls(format!("{}/api", server.uri()), server.uri());
    let manager = DownloadManager::new(Arc::new(registry), ModelStore::default());

    let mut job = vae_job();
    let outcome = manager.start(&mut job, |_| {}).await.unwrap();

    assert!(!outcome.success);
    assert_eq!(
        outcome.message,
        orlova_core::download::store::ROOT_NOT_CONFIGURED
    );
}

#[tokio::test]
async fn test_job_cannot_be_restarted() {
    let server = MockServer::start().await;
    let root = TempDir::new().unwrap();
    let mut job = vae_job();
    job.cancel_handle().cancel();
    let manager = manager(&server, &root);

    manager.start(&mut job, |_| {}).await.unwrap();
    let err = manager.start(&mut job, |_| {}).await.unwrap_err();

    assert!(matches!(err, OrlovaError::Validation { .. }));
}

#[tokio::test]
async fn test_truncated_body_fails_and_removes_partial() {
    // Announces 100000 bytes, sends 1000 and hangs up.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = [0u8; 4096];
        let _ = socket.read(&mut request).await;
        socket
            .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 100000\r\n\r\n")
            .await
            .unwrap();
        socket.write_all(&[1u8; 1000]).await.unwrap();
        socket.flush().await.unwrap();
        let _ = socket.shutdown().await;
    });

    let root = TempDir::new().unwrap();
    let registry = RegistryClient::new(Arc::new(MemoryCache::new()), Duration::from_secs(60))
        .unwrap()
        .with_base_urls(format!("http://{}/api", addr), format!("http://{}", addr));
    let manager = DownloadManager::new(Arc::new(registry), ModelStore::with_root(root.path()));
    let mut job = vae_job();

    let result = manager.start(&mut job, |_| {}).await;

    assert!(result.is_err());
    assert_eq!(job.state(), JobState::Failed);
    assert!(!part_file(&root).exists());
    assert!(!vae_target(&root).exists());
}
