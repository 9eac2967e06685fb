use signage_player::cache::{asset_client, AssetCache, CacheStats};
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn text_url(body: &str) -> String {
    format!("data:text/plain,{}", body)
}

#[tokio::test]
async fn data_urls_are_stored_as_files() {
    let dir = TempDir::new().unwrap();
    let cache = AssetCache::new(dir.path().to_path_buf(), 1024).unwrap();
    let client = reqwest::Client::new();

    let url = "data:image/png;base64,aGVsbG8=";
    let path = cache.fetch(&client, "c1", url).await.unwrap();

    assert!(path.starts_with(dir.path().join("c1")));
    assert_eq!(path.extension().and_then(|e| e.to_str()), Some("png"));
    assert_eq!(std::fs::read(&path).unwrap(), b"hello");
    assert_eq!(cache.get_cached_path("c1", url), Some(path));
    assert_eq!(
        cache.stats(),
        CacheStats {
            current_size: 5,
            max_size: 1024,
            item_count: 1
        }
    );
}

#[tokio::test]
async fn evicts_least_recently_used_when_full() {
    let dir = TempDir::new().unwrap();
    let cache = AssetCache::new(dir.path().to_path_buf(), 12).unwrap();
    let client = reqwest::Client::new();

    let a = cache.fetch(&client, "a", &text_url("aaaaa")).await.unwrap();
    let b = cache.fetch(&client, "b", &text_url("bbbbb")).await.unwrap();
    // Touch a so b becomes the eviction candidate.
    cache.fetch(&client, "a", &text_url("aaaaa")).await.unwrap();
    let c = cache.fetch(&client, "c", &text_url("ccccc")).await.unwrap();

    assert!(a.exists());
    assert!(!b.exists());
    assert!(c.exists());
    assert_eq!(cache.get_cached_path("b", &text_url("bbbbb")), None);
    assert_eq!(cache.stats().current_size, 10);
    assert_eq!(cache.stats().item_count, 2);
}

#[tokio::test]
async fn restart_reindexes_existing_files() {
    let dir = TempDir::new().unwrap();
    let client = reqwest::Client::new();
    let url = text_url("persisted");

    let stored = {
        let cache = AssetCache::new(dir.path().to_path_buf(), 1024).unwrap();
        cache.fetch(&client, "c1", &url).await.unwrap()
    };

    let cache = AssetCache::new(dir.path().to_path_buf(), 1024).unwrap();
    assert_eq!(cache.get_cached_path("c1", &url), Some(stored));
    assert_eq!(cache.stats().current_size, 9);
}

#[tokio::test]
async fn retain_drops_unreferenced_content() {
    let dir = TempDir::new().unwrap();
    let cache = AssetCache::new(dir.path().to_path_buf(), 1024).unwrap();
    let client = reqwest::Client::new();

    let keep = cache.fetch(&client, "c1", &text_url("one")).await.unwrap();
    let gone = cache.fetch(&client, "c2", &text_url("two")).await.unwrap();

    cache.retain_content(["c1"]);

    assert!(keep.exists());
    assert!(!gone.exists());
    assert!(!dir.path().join("c2").exists());
    assert_eq!(cache.stats().item_count, 1);
}

#[tokio::test]
async fn downloads_once_then_serves_from_disk() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/uploads/welcome.png"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8, 2, 3, 4]))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let cache = AssetCache::new(dir.path().to_path_buf(), 1024).unwrap();
    let client = reqwest::Client::new();
    let url = format!("{}/uploads/welcome.png?v=3", server.uri());

    let first = cache.fetch(&client, "c1", &url).await.unwrap();
    let second = cache.fetch(&client, "c1", &url).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(first.extension().and_then(|e| e.to_str()), Some("png"));
    assert_eq!(std::fs::read(&first).unwrap(), vec![1u8, 2, 3, 4]);
}

#[tokio::test]
async fn failed_download_is_not_cached() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let cache = AssetCache::new(dir.path().to_path_buf(), 1024).unwrap();
    let client = reqwest::Client::new();
    let url = format!("{}/uploads/missing.png", server.uri());

    assert!(cache.fetch(&client, "c1", &url).await.is_err());
    assert_eq!(cache.get_cached_path("c1", &url), None);
    assert_eq!(cache.stats().item_count, 0);
}

/// Serve one response whose body arrives in `chunks` pieces, `gap` apart.
async fn trickle_server(chunks: usize, gap: Duration) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = [0u8; 1024];
        let _ = socket.read(&mut request).await.unwrap();
        let head = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: video/mp4\r\nContent-Length: {}\r\n\r\n",
            chunks
        );
        socket.write_all(head.as_bytes()).await.unwrap();
        for _ in 0..chunks {
            tokio::time::sleep(gap).await;
            // The client may already have given up.
            if socket.write_all(b"x").await.is_err() || socket.flush().await.is_err() {
                return;
            }
        }
    });
    format!("http://{}/media/clip.mp4", addr)
}

#[tokio::test]
async fn slow_transfer_outlasting_the_timeout_still_completes() {
    // Six 150 ms gaps: the whole body takes ~900 ms, each read well under 500 ms.
    let url = trickle_server(6, Duration::from_millis(150)).await;
    let dir = TempDir::new().unwrap();
    let cache = AssetCache::new(dir.path().to_path_buf(), 1024).unwrap();
    let client = asset_client(Duration::from_millis(500)).unwrap();

    let path = cache.fetch(&client, "c1", &url).await.unwrap();

    assert_eq!(std::fs::read(&path).unwrap(), b"xxxxxx");
}

#[tokio::test]
async fn stalled_transfer_times_out() {
    let url = trickle_server(2, Duration::from_secs(2)).await;
    let dir = TempDir::new().unwrap();
    let cache = AssetCache::new(dir.path().to_path_buf(), 1024).unwrap();
    let client = asset_client(Duration::from_millis(300)).unwrap();

    assert!(cache.fetch(&client, "c1", &url).await.is_err());
    assert_eq!(cache.stats().item_count, 0);
}
