use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tiny_http::{Header, Response, Server};

use formpack_pdf::{AssetFetcher, AssetRef, Error, FetchOptions, FetcherConfig, StaticToken};

struct TestServer {
    base_url: String,
    /// (url, authorization header) of every request seen.
    seen: Arc<Mutex<Vec<(String, Option<String>)>>>,
}

/// Serve PNG bytes for any path containing "ok", 500 otherwise — except
/// "/flaky", which fails `flaky_failures` times before succeeding.
fn start_server(flaky_failures: usize) -> TestServer {
    let server = Server::http("127.0.0.1:0").expect("bind test server");
    let addr = server.server_addr().to_ip().expect("tcp listener");
    let base_url = format!("http://{addr}");
    let seen: Arc<Mutex<Vec<(String, Option<String>)>>> = Arc::new(Mutex::new(Vec::new()));

    let seen_clone = Arc::clone(&seen);
    std::thread::spawn(move || {
        let flaky_count = AtomicUsize::new(0);
        for request in server.incoming_requests() {
            let url = request.url().to_string();
            let auth = request
                .headers()
                .iter()
                .find(|h| h.field.as_str().as_str().eq_ignore_ascii_case("authorization"))
                .map(|h| h.value.as_str().to_string());
            seen_clone.lock().unwrap().push((url.clone(), auth));

            let succeed = if url.starts_with("/flaky") {
                flaky_count.fetch_add(1, Ordering::SeqCst) >= flaky_failures
            } else {
                url.contains("ok")
            };

            let response = if succeed {
                Response::from_data(png_fixture()).with_header(
                    "Content-Type: image/png".parse::<Header>().unwrap(),
                )
            } else {
                Response::from_data(b"upstream error".to_vec()).with_status_code(500)
            };
            let _ = request.respond(response);
        }
    });

    TestServer { base_url, seen }
}

fn png_fixture() -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(4, 4, image::Rgba([1, 2, 3, 255]));
    let mut out = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut std::io::Cursor::new(&mut out), image::ImageFormat::Png)
        .unwrap();
    out
}

fn quick_opts() -> FetchOptions {
    FetchOptions {
        max_retries: 3,
        retry_delay: Duration::from_millis(10),
        fallback_url: None,
    }
}

#[tokio::test]
async fn third_attempt_succeeds_within_max_retries() {
    let server = start_server(2);
    let fetcher = AssetFetcher::new(FetcherConfig::default());

    let asset = AssetRef::new(format!("{}/flaky", server.base_url));
    let fetched = fetcher.fetch(&asset, &quick_opts()).await.expect("retries exhaust failures");

    assert_eq!(fetched.bytes, png_fixture());
    assert_eq!(fetched.content_type, "image/png");
    assert_eq!(server.seen.lock().unwrap().len(), 3);
}

#[tokio::test]
async fn exhausted_primary_falls_back_to_fallback_url() {
    let server = start_server(0);
    let fetcher = AssetFetcher::new(FetcherConfig::default());

    let asset = AssetRef::new(format!("{}/always-fail", server.base_url));
    let opts = FetchOptions {
        fallback_url: Some(format!("{}/ok-archive", server.base_url)),
        ..quick_opts()
    };
    let fetched = fetcher.fetch(&asset, &opts).await.expect("fallback responds");

    assert_eq!(fetched.bytes, png_fixture());
    // Three failed primary attempts, then the fallback.
    assert_eq!(server.seen.lock().unwrap().len(), 4);
}

#[tokio::test]
async fn exhausted_retries_without_fallback_fail() {
    let server = start_server(0);
    let fetcher = AssetFetcher::new(FetcherConfig::default());

    let asset = AssetRef::new(format!("{}/always-fail", server.base_url));
    let err = fetcher.fetch(&asset, &quick_opts()).await.unwrap_err();

    assert!(matches!(err, Error::AssetFetch { .. }));
    assert_eq!(server.seen.lock().unwrap().len(), 3);
}

#[tokio::test]
async fn private_urls_are_proxied_with_bearer_token() {
    let server = start_server(0);
    let fetcher = AssetFetcher::new(FetcherConfig {
        base_url: server.base_url.clone(),
        proxy_path: "/api/storage/proxy-ok".to_string(),
        ..FetcherConfig::default()
    })
    .with_credentials(Box::new(StaticToken("secret-token".to_string())));

    let original = "https://files.example.com/storage/private/u1/sig.png";
    let fetched = fetcher
        .fetch(&AssetRef::new(original), &quick_opts())
        .await
        .expect("proxy responds");
    assert_eq!(fetched.bytes, png_fixture());

    let seen = server.seen.lock().unwrap();
    let (url, auth) = &seen[0];
    assert!(url.starts_with("/api/storage/proxy-ok?"));
    assert!(url.contains("mode=stream"));
    assert!(
        url.contains("sig.png"),
        "proxy query should carry the original path: {url}"
    );
    assert_eq!(auth.as_deref(), Some("Bearer secret-token"));
}

#[tokio::test]
async fn public_urls_are_requested_without_credentials() {
    let server = start_server(0);
    let fetcher = AssetFetcher::new(FetcherConfig {
        base_url: server.base_url.clone(),
        ..FetcherConfig::default()
    })
    .with_credentials(Box::new(StaticToken("secret-token".to_string())));

    let asset = AssetRef::new(format!("{}/public/ok-logo.png", server.base_url));
    fetcher.fetch(&asset, &quick_opts()).await.expect("direct fetch");

    let seen = server.seen.lock().unwrap();
    let (url, auth) = &seen[0];
    assert!(url.starts_with("/public/ok-logo.png"));
    assert_eq!(auth.as_deref(), None);
}
