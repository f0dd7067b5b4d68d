//! Track fetching against a mock HTTP server and the local filesystem

use marquee_core::{MarqueeError, TrackFetcher};
use marquee_playback::HttpFetcher;
use std::time::Duration;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn http_body_is_returned() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/audio/lobby.mp3"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8, 2, 3, 4]))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = HttpFetcher::new();
    let bytes = fetcher
        .fetch(&format!("{}/audio/lobby.mp3", server.uri()))
        .await
        .unwrap();
    assert_eq!(bytes, vec![1, 2, 3, 4]);
}

#[tokio::test]
async fn non_success_status_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let url = format!("{}/audio/gone.mp3", server.uri());
    let err = HttpFetcher::new().fetch(&url).await.unwrap_err();
    match err {
        MarqueeError::HttpStatus { url: failed, status } => {
            assert_eq!(status, 503);
            assert_eq!(failed, url);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn relative_urls_join_the_base() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/kiosk/audio/a.mp3"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"abc".to_vec()))
        .mount(&server)
        .await;

    let base = Url::parse(&format!("{}/kiosk/", server.uri())).unwrap();
    let fetcher = HttpFetcher::with_settings(Some(base), Some(Duration::from_secs(5))).unwrap();
    assert_eq!(fetcher.fetch("audio/a.mp3").await.unwrap(), b"abc");
}

#[tokio::test]
async fn local_files_are_read_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("chime.wav");
    std::fs::write(&file, b"RIFF").unwrap();

    let fetcher = HttpFetcher::new();
    assert_eq!(fetcher.fetch(file.to_str().unwrap()).await.unwrap(), b"RIFF");

    let file_url = Url::from_file_path(&file).unwrap();
    assert_eq!(fetcher.fetch(file_url.as_str()).await.unwrap(), b"RIFF");

    let missing = dir.path().join("missing.wav");
    let err = fetcher.fetch(missing.to_str().unwrap()).await.unwrap_err();
    assert!(matches!(err, MarqueeError::Io(_)));
}

#[tokio::test]
async fn unsupported_scheme_is_rejected() {
    let err = HttpFetcher::new()
        .fetch("ftp://example.com/a.mp3")
        .await
        .unwrap_err();
    assert!(matches!(err, MarqueeError::InvalidInput(_)));
}
