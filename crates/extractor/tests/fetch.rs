#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Fetching from a local HTTP responder.

use std::time::Duration;

use {
    tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::TcpListener,
    },
    tryon_extractor::{ExtractError, LocatorKind, PageFetcher, default_locators},
};

/// Serve one canned HTTP response and return the base URL.
async fn respond_once(status_line: &'static str, body: &'static str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut buf = [0u8; 4096];
        let _ = stream.read(&mut buf).await.unwrap();
        let response = format!(
            "{status_line}\r\ncontent-type: text/html\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        );
        stream.write_all(response.as_bytes()).await.unwrap();
        stream.shutdown().await.unwrap();
    });
    format!("http://{addr}")
}

fn fetcher() -> PageFetcher {
    PageFetcher::new(Duration::from_secs(5), "tryon-test", default_locators()).unwrap()
}

#[tokio::test]
async fn extracts_from_served_page() {
    let base = respond_once(
        "HTTP/1.1 200 OK",
        r#"<html><body><img id="landingImage" src="/images/shirt.jpg" alt="Shirt"></body></html>"#,
    )
    .await;

    let found = fetcher().extract(&format!("{base}/dp/B0001")).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].locator_kind, LocatorKind::Id);
    assert_eq!(found[0].source_url, format!("{base}/images/shirt.jpg"));
}

#[tokio::test]
async fn http_error_status_is_reported() {
    let base = respond_once("HTTP/1.1 404 Not Found", "gone").await;
    let err = fetcher().fetch(&base).await.unwrap_err();
    assert!(matches!(err, ExtractError::Status { status: 404, .. }));
}
