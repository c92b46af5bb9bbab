//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and test
//! the full crawl cycle end-to-end, from a TOML config file to the
//! checkpoint and dump directory it leaves behind.

use flate2::write::GzEncoder;
use flate2::Compression;
use harvester::config::{load_config, load_config_with_overrides, Config, FetcherConfig, ScraperApiConfig};
use harvester::crawler::{run_crawl, Fetch, FetchError, HttpFetcher};
use harvester::dispatcher::{DispatchSettings, DispatchState};
use harvester::download::{run_download, DownloadJob};
use harvester::frontier::FrontierState;
use harvester::storage::file_name_for;
use harvester::HarvestError;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Writes a config file into `dir` and loads it
fn write_config(dir: &TempDir, content: &str) -> Config {
    let config_path = dir.path().join("crawl.toml");
    std::fs::write(&config_path, content).expect("Failed to write config");
    load_config(&config_path).expect("Failed to load config")
}

fn gzip(data: &str) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data.as_bytes()).unwrap();
    encoder.finish().unwrap()
}

fn sitemap_index(locs: &[String]) -> String {
    let entries: String = locs
        .iter()
        .map(|loc| format!("<sitemap><loc>{}</loc></sitemap>", loc))
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><sitemapindex xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">{}</sitemapindex>"#,
        entries
    )
}

fn product_sitemap(locs: &[String]) -> String {
    let entries: String = locs
        .iter()
        .map(|loc| format!("<url><loc>{}</loc></url>", loc))
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">{}</urlset>"#,
        entries
    )
}

fn load_state(dir: &TempDir) -> FrontierState {
    FrontierState::load(&dir.path().join("state.toml"))
        .expect("Failed to read checkpoint")
        .expect("Checkpoint was not written")
}

#[tokio::test]
async fn test_sitemap_seed_fills_frontier() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/sitemap_index.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(sitemap_index(&[
            format!("{}/sitemap_1.xml", base_url),
            format!("{}/sitemap_2.xml", base_url),
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = write_config(
        &dir,
        &format!(
            r#"
seeds = ["{base}/sitemap_index.xml"]

[frontier]
state-file = "state.toml"
max-pages = 1

[[handlers]]
pattern = "sitemap"
kind = "sitemap"
xpath = '//sm:sitemap/sm:loc/text()'
"#,
            base = base_url
        ),
    );

    let report = run_crawl(config, dir.path(), std::future::pending())
        .await
        .expect("Crawl failed");
    assert_eq!(report.processed, 1);
    assert_eq!(report.discovered, 2);

    let state = load_state(&dir);
    assert_eq!(state.processed_count, 1);
    assert_eq!(
        state.queues,
        vec![vec![
            format!("{}/sitemap_1.xml", base_url),
            format!("{}/sitemap_2.xml", base_url),
        ]]
    );
    assert!(state.in_flight.is_empty());
    assert!(state.saved_at.is_some());
}

#[tokio::test]
async fn test_full_crawl_sitemaps_to_dump() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    let products_1: Vec<String> = (1..=3)
        .map(|i| format!("{}/products/{}.html", base_url, i))
        .collect();
    let products_2: Vec<String> = (4..=5)
        .map(|i| format!("{}/products/{}.html", base_url, i))
        .collect();

    Mock::given(method("GET"))
        .and(path("/sitemap_index.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(sitemap_index(&[
            format!("{}/sitemap_products_1.xml.gz", base_url),
            format!("{}/sitemap_products_2.xml.gz", base_url),
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    // Served as a gzip file
    Mock::given(method("GET"))
        .and(path("/sitemap_products_1.xml.gz"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(gzip(&product_sitemap(&products_1)))
                .insert_header("content-type", "application/x-gzip"),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    // Served with a content encoding, so the client hands over plain XML
    Mock::given(method("GET"))
        .and(path("/sitemap_products_2.xml.gz"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(gzip(&product_sitemap(&products_2)))
                .insert_header("content-type", "application/xml")
                .insert_header("content-encoding", "gzip"),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    for i in 1..=5 {
        Mock::given(method("GET"))
            .and(path(format!("/products/{}.html", i)))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(format!("<html><body>Product {}</body></html>", i))
                    .insert_header("content-type", "text/html"),
            )
            .expect(1)
            .mount(&mock_server)
            .await;
    }

    let dir = TempDir::new().unwrap();
    let config = write_config(
        &dir,
        &format!(
            r#"
seeds = ["{base}/sitemap_index.xml"]

[frontier]
state-file = "state.toml"
priorities = ['{base}/sitemap']

[crawler]
concurrency = 3
dump-dir = "dump"

[fetcher]
throttle-per-second = 200.0

[[handlers]]
pattern = "sitemap_index"
kind = "sitemap"
xpath = '//sm:sitemap/sm:loc/text()'

[[handlers]]
pattern = 'sitemap_products_\d+\.xml\.gz'
kind = "products-gz"
xpath = '//sm:url'
url-xpath = 'sm:loc/text()'

[[handlers]]
pattern = "/products/"
kind = "dump"
"#,
            base = base_url
        ),
    );

    let report = run_crawl(config, dir.path(), std::future::pending())
        .await
        .expect("Crawl failed");

    assert_eq!(report.processed, 8);
    assert_eq!(report.failed, 0);
    assert_eq!(report.unhandled, 0);
    mock_server.verify().await;

    let dump = dir.path().join("dump");
    let index = std::fs::read_to_string(dump.join("index.txt")).unwrap();
    let mut indexed: Vec<&str> = index.lines().collect();
    indexed.sort();
    let mut expected: Vec<String> = products_1.iter().chain(&products_2).cloned().collect();
    expected.sort();
    assert_eq!(indexed, expected);

    let first = &products_1[0];
    let file_name = file_name_for(first);
    assert!(file_name.ends_with(".html"));
    assert_eq!(
        std::fs::read_to_string(dump.join(file_name)).unwrap(),
        "<html><body>Product 1</body></html>"
    );

    let state = load_state(&dir);
    assert_eq!(state.processed_count, 8);
    assert_eq!(state.added.len(), 8);
    assert!(state.queues.iter().all(Vec::is_empty));
}

#[tokio::test]
async fn test_resume_never_refetches() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    let page = |links: &[&str]| {
        let anchors: String = links
            .iter()
            .map(|l| format!(r#"<a href="{}">x</a>"#, l))
            .collect();
        ResponseTemplate::new(200)
            .set_body_string(format!("<html><body>{}</body></html>", anchors))
            .insert_header("content-type", "text/html")
    };

    for (route, links) in [
        ("/c/1", vec!["/c/2", "/c/3", "/about"]),
        ("/c/2", vec!["/c/1", "/c/3#top"]),
        ("/c/3", vec!["/c/1"]),
    ] {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(page(&links))
            .expect(1)
            .mount(&mock_server)
            .await;
    }

    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("crawl.toml");
    std::fs::write(
        &config_path,
        format!(
            r#"
seeds = ["{base}/c/1"]

[frontier]
state-file = "state.toml"

[[handlers]]
pattern = "/c/"
kind = "links"
base-url = "{base}/c/"
"#,
            base = base_url
        ),
    )
    .unwrap();

    let first_config =
        load_config_with_overrides(&config_path, &["frontier.max-pages=2".to_string()]).unwrap();
    let first = run_crawl(first_config, dir.path(), std::future::pending())
        .await
        .expect("First run failed");
    assert_eq!(first.processed, 2);
    assert_eq!(load_state(&dir).pending(), 1);

    let second_config = load_config(&config_path).unwrap();
    let second = run_crawl(second_config, dir.path(), std::future::pending())
        .await
        .expect("Second run failed");
    assert_eq!(second.processed, 1);
    assert_eq!(second.discovered, 0);

    let state = load_state(&dir);
    assert_eq!(state.processed_count, 3);
    assert_eq!(state.pending(), 0);

    // Every page was requested exactly once across both runs
    mock_server.verify().await;
}

#[tokio::test]
async fn test_failures_do_not_stop_the_crawl() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/p/broken"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/p/moved"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", "/p/ok"))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/p/ok"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = write_config(
        &dir,
        &format!(
            r#"
seeds = ["{base}/p/broken", "{base}/p/moved", "{base}/p/ok", "{base}/other"]

[[handlers]]
pattern = "/p/"
kind = "dump"
"#,
            base = base_url
        ),
    );

    let report = run_crawl(config, dir.path(), std::future::pending())
        .await
        .expect("Crawl failed");

    assert_eq!(report.processed, 4);
    // 500 and the redirected page
    assert_eq!(report.failed, 2);
    assert_eq!(report.unhandled, 1);

    let index = std::fs::read_to_string(dir.path().join("dump").join("index.txt")).unwrap();
    assert_eq!(index, format!("{}/p/ok\n", base_url));
}

#[tokio::test]
async fn test_interrupt_drains_and_checkpoints() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("slow")
                .set_delay(Duration::from_millis(400)),
        )
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = write_config(
        &dir,
        &format!(
            r#"
seeds = ["{base}/p/1", "{base}/p/2", "{base}/p/3", "{base}/p/4", "{base}/p/5"]

[frontier]
state-file = "state.toml"

[crawler]
concurrency = 2

[[handlers]]
pattern = "/p/"
kind = "dump"
"#,
            base = base_url
        ),
    );

    let shutdown = tokio::time::sleep(Duration::from_millis(100));
    let result = run_crawl(config, dir.path(), shutdown).await;
    assert!(
        matches!(result, Err(HarvestError::Interrupted { processed: 2 })),
        "unexpected result: {:?}",
        result
    );

    // Both in-flight pages finished before the checkpoint
    let state = load_state(&dir);
    assert_eq!(state.processed_count, 2);
    assert!(state.in_flight.is_empty());
    assert_eq!(state.pending(), 3);

    let index = std::fs::read_to_string(dir.path().join("dump").join("index.txt")).unwrap();
    assert_eq!(index.lines().count(), 2);
}

#[tokio::test]
async fn test_in_flight_checkpoint_is_redispatched() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/p/1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("one"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let state = FrontierState {
        processed_count: 1,
        saved_at: None,
        added: vec![format!("{}/p/1", base_url)],
        in_flight: vec![format!("{}/p/1", base_url)],
        queues: vec![vec![]],
    };
    state.save(&dir.path().join("state.toml")).unwrap();

    let config = write_config(
        &dir,
        &format!(
            r#"
seeds = ["{base}/p/1"]

[frontier]
state-file = "state.toml"
max-pages = 1

[[handlers]]
pattern = "/p/"
kind = "dump"
"#,
            base = base_url
        ),
    );

    let report = run_crawl(config, dir.path(), std::future::pending())
        .await
        .expect("Crawl failed");
    assert_eq!(report.processed, 1);

    let state = load_state(&dir);
    assert_eq!(state.processed_count, 1);
    assert!(state.in_flight.is_empty());
    mock_server.verify().await;
}

#[tokio::test]
async fn test_fetcher_headers_and_scraper_api() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .and(query_param("api_key", "secret"))
        .and(query_param("render", "false"))
        .and(query_param("country_code", "us"))
        .and(query_param("url", "https://shop.example/p/1"))
        .and(header("user-agent", "HarvesterTest/1.0"))
        .respond_with(ResponseTemplate::new(200).set_body_string("rendered"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut scraper_api = ScraperApiConfig::with_key("secret");
    scraper_api.endpoint = format!("{}/", mock_server.uri());
    let config = FetcherConfig {
        headers: [("User-Agent".to_string(), "HarvesterTest/1.0".to_string())]
            .into_iter()
            .collect(),
        scraper_api: Some(scraper_api),
        ..FetcherConfig::default()
    };

    let fetcher = HttpFetcher::new(&config).unwrap();
    let page = fetcher.fetch("https://shop.example/p/1").await.unwrap();
    assert_eq!(page.body, b"rendered");
    assert_eq!(page.final_url, "https://shop.example/p/1");
    assert!(!page.was_redirected());
}

#[tokio::test]
async fn test_fetcher_status_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let fetcher = HttpFetcher::new(&FetcherConfig::default()).unwrap();
    let result = fetcher.fetch(&format!("{}/missing", mock_server.uri())).await;
    assert!(matches!(result, Err(FetchError::Status { status: 404, .. })));
}

fn download_job(dir: &Path, urls: &[String], num_retries: u32) -> DownloadJob {
    let urls_file = dir.join("urls.txt");
    std::fs::write(&urls_file, urls.join("\n")).unwrap();
    DownloadJob {
        urls_file,
        state_file: dir.join("download-state.toml"),
        dump_dir: dir.join("dump"),
        settings: DispatchSettings {
            num_retries,
            parallelism: 2,
            task_timeout: Some(Duration::from_secs(5)),
            backoff_base: Duration::from_millis(10),
        },
    }
}

#[tokio::test]
async fn test_download_retries_flaky_urls() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    // First request fails, the next one succeeds
    Mock::given(method("GET"))
        .and(path("/p/flaky.html"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/p/flaky.html"))
        .respond_with(ResponseTemplate::new(200).set_body_string("flaky"))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/p/steady.html"))
        .respond_with(ResponseTemplate::new(200).set_body_string("steady"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let urls = vec![
        format!("{}/p/flaky.html", base_url),
        format!("{}/p/steady.html", base_url),
    ];
    let job = download_job(dir.path(), &urls, 3);

    let fetcher = Arc::new(HttpFetcher::new(&FetcherConfig::default()).unwrap());
    let report = run_download(&job, fetcher, std::future::pending())
        .await
        .expect("Download failed");

    assert_eq!(report.succeeded, 2);
    assert_eq!(report.retried, 1);
    assert_eq!(report.failed, 0);

    let stored = std::fs::read_to_string(job.dump_dir.join(file_name_for(&urls[0]))).unwrap();
    assert_eq!(stored, "flaky");

    let state: DispatchState<String> = DispatchState::load(&job.state_file).unwrap().unwrap();
    assert!(state.tasks.is_empty());
}

#[tokio::test]
async fn test_download_gives_up_after_retries() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/p/gone"))
        .respond_with(ResponseTemplate::new(404))
        .expect(3)
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let job = download_job(dir.path(), &[format!("{}/p/gone", mock_server.uri())], 2);

    let fetcher = Arc::new(HttpFetcher::new(&FetcherConfig::default()).unwrap());
    let report = run_download(&job, fetcher, std::future::pending())
        .await
        .expect("Download failed");

    assert_eq!(report.failed, 1);
    assert_eq!(report.succeeded, 0);
    assert!(!job.dump_dir.join("index.txt").exists());
    mock_server.verify().await;
}

#[tokio::test]
async fn test_download_resumes_from_state_file() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/p/left.html"))
        .respond_with(ResponseTemplate::new(200).set_body_string("left"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    // The URL list names two pages but the saved state only has one left
    let job = download_job(
        dir.path(),
        &[
            format!("{}/p/done.html", base_url),
            format!("{}/p/left.html", base_url),
        ],
        1,
    );
    std::fs::write(
        &job.state_file,
        format!("[[tasks]]\nobject = \"{}/p/left.html\"\nattempt = 1\n", base_url),
    )
    .unwrap();

    let fetcher = Arc::new(HttpFetcher::new(&FetcherConfig::default()).unwrap());
    let report = run_download(&job, fetcher, std::future::pending())
        .await
        .expect("Download failed");

    assert_eq!(report.succeeded, 1);
    mock_server.verify().await;
}
