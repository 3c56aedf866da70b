//! End-to-end harvest runs against a mock server

use page_harvest::config::{Config, OutputConfig, ScraperConfig};
use page_harvest::harvester::{filename_for, Harvester};
use page_harvest::state::DownloadStatus;
use page_harvest::storage::{SqliteStorage, StateStore};
use page_harvest::HarvestError;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\n\x00\x00\x00\rIHDR\x00\x00\x00\x01";
const JPEG_BYTES: &[u8] = b"\xff\xd8\xff\xe0\x00\x10JFIF\x00\x01";

/// Creates a test configuration harvesting `base_url` into `dir`
fn create_test_config(base_url: &str, dir: &Path, workers: u32) -> Config {
    Config {
        scraper: ScraperConfig {
            base_url: base_url.to_string(),
            max_concurrent_downloads: workers,
            request_timeout: 5,
            user_agent: None,
        },
        output: OutputConfig {
            directory: dir.join("output").display().to_string(),
            database_path: None,
        },
    }
}

async fn mount_page(server: &MockServer, html: String) {
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(html.into_bytes(), "text/html"))
        .mount(server)
        .await;
}

async fn mount_image(server: &MockServer, image_path: &str, body: &[u8], mime: &str, hits: u64) {
    Mock::given(method("GET"))
        .and(path(image_path))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body.to_vec(), mime))
        .expect(hits)
        .mount(server)
        .await;
}

fn open_state(config: &Config) -> SqliteStorage {
    SqliteStorage::new(&config.output.database_path()).expect("Failed to open DB")
}

#[tokio::test]
async fn test_full_harvest() {
    let server = MockServer::start().await;
    let base_url = server.uri();

    mount_page(
        &server,
        format!(
            r#"<html><head><title>Home</title><style>p {{ color: red; }}</style></head><body>
            <h1>Welcome</h1>
            <script>console.log("hidden");</script>
            <p>Some text</p>
            <img src="/a.png">
            <img src="/a.png">
            <img data-src="{}/b.jpg">
            <img src="data:image/png;base64,iVBORw0KGgo=">
            </body></html>"#,
            base_url
        ),
    )
    .await;
    mount_image(&server, "/a.png", PNG_BYTES, "image/jpeg", 1).await;
    mount_image(&server, "/b.jpg", JPEG_BYTES, "image/jpeg", 1).await;

    let dir = tempfile::tempdir().unwrap();
    let config = Arc::new(create_test_config(&format!("{}/", base_url), dir.path(), 4));

    let harvester = Harvester::new(Arc::clone(&config))
        .await
        .expect("Failed to create harvester");
    let report = harvester.run().await.expect("Harvest failed");

    assert_eq!(report.discovered, 2);
    assert_eq!(report.newly_queued, 2);
    assert_eq!(report.pending, 2);
    assert_eq!(report.completed, 2);
    assert_eq!(report.failed, 0);

    let text = std::fs::read_to_string(config.output.text_path()).unwrap();
    assert_eq!(text, "Welcome\nSome text");

    let a_url = format!("{}/a.png", base_url);
    let b_url = format!("{}/b.jpg", base_url);
    let storage = open_state(&config);

    let a = storage.get_record(&a_url).unwrap().expect("a.png recorded");
    assert_eq!(a.status, DownloadStatus::Completed);
    // Sniffed PNG signature beats the image/jpeg header
    assert_eq!(a.filename, Some(filename_for(&a_url, "png")));

    let b = storage.get_record(&b_url).unwrap().expect("b.jpg recorded");
    assert_eq!(b.status, DownloadStatus::Completed);
    assert_eq!(b.filename, Some(filename_for(&b_url, "jpeg")));

    let images_dir = config.output.images_dir();
    assert_eq!(
        std::fs::read(images_dir.join(filename_for(&a_url, "png"))).unwrap(),
        PNG_BYTES
    );
    assert_eq!(std::fs::read_dir(&images_dir).unwrap().count(), 2);
}

#[tokio::test]
async fn test_second_run_resumes_only_pending() {
    let server = MockServer::start().await;
    let base_url = server.uri();

    mount_page(
        &server,
        r#"<html><body><img src="/a.png"><img src="/b.png"></body></html>"#.to_string(),
    )
    .await;
    // a.png was finished by an earlier run and must not be fetched again
    mount_image(&server, "/a.png", PNG_BYTES, "image/png", 0).await;
    mount_image(&server, "/b.png", PNG_BYTES, "image/png", 1).await;

    let dir = tempfile::tempdir().unwrap();
    let config = Arc::new(create_test_config(&format!("{}/", base_url), dir.path(), 2));
    let a_url = format!("{}/a.png", base_url);
    let b_url = format!("{}/b.png", base_url);

    let harvester = Harvester::new(Arc::clone(&config)).await.unwrap();

    // State left behind by an interrupted run: a completed, b still pending
    let before = {
        let storage = harvester.storage();
        let mut storage = storage.lock().unwrap();
        storage.enqueue(&[a_url.clone(), b_url.clone()]).unwrap();
        storage
            .mark(&a_url, DownloadStatus::Completed, Some("earlier.png"))
            .unwrap();
        storage.get_record(&a_url).unwrap().unwrap()
    };

    let report = harvester.run().await.expect("Harvest failed");

    assert_eq!(report.discovered, 2);
    assert_eq!(report.newly_queued, 0);
    assert_eq!(report.pending, 1);
    assert_eq!(report.completed, 1);

    let storage = harvester.storage();
    let storage = storage.lock().unwrap();
    assert_eq!(storage.get_record(&a_url).unwrap().unwrap(), before);
    assert_eq!(
        storage.get_record(&b_url).unwrap().unwrap().status,
        DownloadStatus::Completed
    );
    assert_eq!(storage.count_total().unwrap(), 2);
}

#[tokio::test]
async fn test_failed_download_is_recorded_and_not_retried() {
    let server = MockServer::start().await;
    let base_url = server.uri();

    mount_page(
        &server,
        r#"<html><body><img src="/ok.png"><img src="/broken.png"></body></html>"#.to_string(),
    )
    .await;
    mount_image(&server, "/ok.png", PNG_BYTES, "image/png", 1).await;
    Mock::given(method("GET"))
        .and(path("/broken.png"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config = Arc::new(create_test_config(&format!("{}/", base_url), dir.path(), 2));
    let harvester = Harvester::new(Arc::clone(&config)).await.unwrap();

    let first = harvester.run().await.expect("Harvest failed");
    assert_eq!(first.completed, 1);
    assert_eq!(first.failed, 1);

    // Nothing is pending any more; the failed URL stays failed
    let second = harvester.run().await.expect("Second harvest failed");
    assert_eq!(second.pending, 0);
    assert_eq!(second.completed, 0);

    let storage = open_state(&config);
    let broken = storage
        .get_record(&format!("{}/broken.png", base_url))
        .unwrap()
        .unwrap();
    assert_eq!(broken.status, DownloadStatus::Failed);
    assert_eq!(broken.filename, None);
    assert_eq!(broken.retries, 0);
}

#[tokio::test]
async fn test_requeued_failure_is_downloaded_again() {
    let server = MockServer::start().await;
    let base_url = server.uri();

    mount_page(
        &server,
        r#"<html><body><img src="/flaky.png"></body></html>"#.to_string(),
    )
    .await;
    mount_image(&server, "/flaky.png", PNG_BYTES, "image/png", 1).await;

    let dir = tempfile::tempdir().unwrap();
    let config = Arc::new(create_test_config(&format!("{}/", base_url), dir.path(), 1));
    let url = format!("{}/flaky.png", base_url);

    let harvester = Harvester::new(Arc::clone(&config)).await.unwrap();
    {
        let storage = harvester.storage();
        let mut storage = storage.lock().unwrap();
        storage.enqueue(&[url.clone()]).unwrap();
        storage.mark(&url, DownloadStatus::Failed, None).unwrap();
        assert_eq!(storage.requeue_failed().unwrap(), 1);
    }

    let report = harvester.run().await.expect("Harvest failed");
    assert_eq!(report.completed, 1);

    let storage = harvester.storage();
    let record = storage.lock().unwrap().get_record(&url).unwrap().unwrap();
    assert_eq!(record.status, DownloadStatus::Completed);
    assert_eq!(record.retries, 1);
}

#[tokio::test]
async fn test_page_fetch_failure_aborts_run() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config = Arc::new(create_test_config(&format!("{}/", server.uri()), dir.path(), 2));

    let harvester = Harvester::new(Arc::clone(&config)).await.unwrap();
    let result = harvester.run().await;

    assert!(matches!(result, Err(HarvestError::PageFetch { .. })));
    assert!(!config.output.text_path().exists());
    assert_eq!(open_state(&config).count_total().unwrap(), 0);
    assert_eq!(
        std::fs::read_dir(config.output.images_dir()).unwrap().count(),
        0
    );
}

#[tokio::test]
async fn test_page_without_images_skips_workers() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "<html><body><p>Only words here</p></body></html>".to_string(),
    )
    .await;

    let dir = tempfile::tempdir().unwrap();
    let config = Arc::new(create_test_config(&format!("{}/", server.uri()), dir.path(), 2));

    let harvester = Harvester::new(Arc::clone(&config)).await.unwrap();
    let report = harvester.run().await.expect("Harvest failed");

    assert_eq!(report.discovered, 0);
    assert_eq!(report.pending, 0);
    assert_eq!(report.completed + report.failed, 0);
    assert_eq!(
        std::fs::read_to_string(config.output.text_path()).unwrap(),
        "Only words here"
    );
}

#[tokio::test]
async fn test_user_agent_sent_on_every_request() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .and(header("user-agent", "HarvestBot/1.0"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            br#"<html><body><img src="/a.png"></body></html>"#.to_vec(),
            "text/html",
        ))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/a.png"))
        .and(header("user-agent", "HarvestBot/1.0"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(PNG_BYTES.to_vec(), "image/png"))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let mut config = create_test_config(&format!("{}/", server.uri()), dir.path(), 1);
    config.scraper.user_agent = Some("HarvestBot/1.0".to_string());

    let harvester = Harvester::new(Arc::new(config)).await.unwrap();
    let report = harvester.run().await.expect("Harvest failed");

    assert_eq!(report.completed, 1);
}

#[tokio::test]
async fn test_concurrency_is_bounded_by_worker_count() {
    let server = MockServer::start().await;
    let images: Vec<String> = (0..6).map(|i| format!("/img{}.png", i)).collect();

    let html = images
        .iter()
        .map(|p| format!(r#"<img src="{}">"#, p))
        .collect::<String>();
    mount_page(&server, format!("<html><body>{}</body></html>", html)).await;

    Mock::given(method("GET"))
        .and(wiremock::matchers::path_regex(r"^/img\d\.png$"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(PNG_BYTES.to_vec(), "image/png")
                .set_delay(Duration::from_millis(200)),
        )
        .expect(6)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config = Arc::new(create_test_config(&format!("{}/", server.uri()), dir.path(), 2));
    let harvester = Harvester::new(Arc::clone(&config)).await.unwrap();

    let start = Instant::now();
    let report = harvester.run().await.expect("Harvest failed");
    let elapsed = start.elapsed();

    assert_eq!(report.completed, 6);
    // Six 200ms responses through two workers take at least three rounds
    assert!(
        elapsed >= Duration::from_millis(550),
        "finished too fast for 2 workers: {:?}",
        elapsed
    );
}

#[tokio::test]
async fn test_workers_download_in_parallel() {
    let server = MockServer::start().await;
    let html = (0..6)
        .map(|i| format!(r#"<img src="/img{}.png">"#, i))
        .collect::<String>();
    mount_page(&server, format!("<html><body>{}</body></html>", html)).await;

    Mock::given(method("GET"))
        .and(wiremock::matchers::path_regex(r"^/img\d\.png$"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(PNG_BYTES.to_vec(), "image/png")
                .set_delay(Duration::from_millis(200)),
        )
        .expect(6)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config = Arc::new(create_test_config(&format!("{}/", server.uri()), dir.path(), 6));
    let harvester = Harvester::new(Arc::clone(&config)).await.unwrap();

    let start = Instant::now();
    let report = harvester.run().await.expect("Harvest failed");
    let elapsed = start.elapsed();

    assert_eq!(report.completed, 6);
    // One at a time would need at least 1200ms
    assert!(
        elapsed < Duration::from_millis(900),
        "six workers did not overlap downloads: {:?}",
        elapsed
    );
}

#[tokio::test]
async fn test_relative_images_resolve_against_redirected_page() {
    let server = MockServer::start().await;
    let base_url = server.uri();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", "/en/home"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/en/home"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            br#"<html><body><img src="img/a.png"></body></html>"#.to_vec(),
            "text/html",
        ))
        .mount(&server)
        .await;
    mount_image(&server, "/en/img/a.png", PNG_BYTES, "image/png", 1).await;

    let dir = tempfile::tempdir().unwrap();
    let config = Arc::new(create_test_config(&format!("{}/", base_url), dir.path(), 1));
    let harvester = Harvester::new(Arc::clone(&config)).await.unwrap();

    let report = harvester.run().await.expect("Harvest failed");
    assert_eq!(report.completed, 1);

    let storage = open_state(&config);
    assert!(storage
        .get_record(&format!("{}/en/img/a.png", base_url))
        .unwrap()
        .is_some());
    assert!(storage
        .get_record(&format!("{}/img/a.png", base_url))
        .unwrap()
        .is_none());
}
