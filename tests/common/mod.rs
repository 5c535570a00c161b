//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;

use storybook::config::{ConverterKind, Secrets, StorybookConfig};

/// One canned HTTP response.
#[derive(Debug, Clone)]
pub struct MockResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl MockResponse {
    pub fn json(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: vec![("Content-Type".into(), "application/json".into())],
            body: body.into().into_bytes(),
        }
    }

    pub fn bytes(status: u16, body: Vec<u8>) -> Self {
        Self {
            status,
            headers: vec![("Content-Type".into(), "image/png".into())],
            body,
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// A request as seen by the mock.
#[derive(Debug, Clone)]
pub struct MockRequest {
    /// Zero-based index of this request across the server's lifetime.
    pub index: usize,
    pub path: String,
    pub body: String,
}

/// Handle to a running mock server.
#[derive(Debug, Clone)]
pub struct MockServer {
    pub addr: SocketAddr,
    hits: Arc<AtomicUsize>,
}

impl MockServer {
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

/// Start a programmable mock backend on an ephemeral port.
pub async fn start_programmable_backend<F, Fut>(f: F) -> MockServer
where
    F: Fn(MockRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = MockResponse> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let f = Arc::new(f);

    let counter = Arc::clone(&hits);
    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((socket, _)) => {
                    let f = f.clone();
                    let counter = Arc::clone(&counter);
                    tokio::spawn(async move {
                        let (read_half, mut write_half) = socket.into_split();
                        let mut reader = BufReader::new(read_half);

                        let Some((path, body)) = read_request(&mut reader).await else {
                            return;
                        };
                        let index = counter.fetch_add(1, Ordering::SeqCst);
                        let response = f(MockRequest { index, path, body }).await;

                        let mut head = format!(
                            "HTTP/1.1 {} {}\r\nContent-Length: {}\r\nConnection: close\r\n",
                            response.status,
                            reason(response.status),
                            response.body.len()
                        );
                        for (name, value) in &response.headers {
                            head.push_str(&format!("{name}: {value}\r\n"));
                        }
                        head.push_str("\r\n");

                        let _ = write_half.write_all(head.as_bytes()).await;
                        let _ = write_half.write_all(&response.body).await;
                        let _ = write_half.shutdown().await;
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    MockServer { addr, hits }
}

async fn read_request<R>(reader: &mut BufReader<R>) -> Option<(String, String)>
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut request_line = String::new();
    reader.read_line(&mut request_line).await.ok()?;
    let path = request_line.split_whitespace().nth(1)?.to_string();

    let mut content_length = 0usize;
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).await.ok()? == 0 {
            break;
        }
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            if name.eq_ignore_ascii_case("content-length") {
                content_length = value.trim().parse().unwrap_or(0);
            }
        }
    }

    let mut body = vec![0u8; content_length];
    reader.read_exact(&mut body).await.ok()?;
    Some((path, String::from_utf8_lossy(&body).into_owned()))
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        _ => "Unknown",
    }
}

/// Gemini `generateContent` success body.
pub fn gemini_text(text: &str) -> MockResponse {
    let body = serde_json::json!({
        "candidates": [{
            "content": { "parts": [{ "text": text }], "role": "model" },
            "finishReason": "STOP"
        }]
    });
    MockResponse::json(200, body.to_string())
}

/// Gemini quota error with a retry hint in the body.
pub fn gemini_quota_exceeded(retry_secs: u64) -> MockResponse {
    let body = serde_json::json!({
        "error": {
            "code": 429,
            "status": "RESOURCE_EXHAUSTED",
            "details": [{
                "@type": "type.googleapis.com/google.rpc.RetryInfo",
                "retryDelay": format!("{retry_secs}s")
            }]
        }
    });
    MockResponse::json(429, body.to_string())
}

/// Smallest byte string the generator accepts as a PNG.
pub fn png_bytes() -> Vec<u8> {
    let mut bytes = b"\x89PNG\r\n\x1a\n".to_vec();
    bytes.extend_from_slice(&[0u8; 32]);
    bytes
}

pub fn test_secrets() -> Secrets {
    Secrets {
        text_api_key: "text-key".into(),
        image_api_key: "image-key".into(),
    }
}

/// Config aimed at mock servers: millisecond backoff, no padding, HTML
/// conversion only.
pub fn test_config(text_base: &str, image_url: &str, output_dir: &std::path::Path) -> StorybookConfig {
    let mut config = StorybookConfig::default();
    config.text.api_base = text_base.to_string();
    config.text.models = vec!["primary".into(), "fallback".into()];
    config.text.request_timeout_secs = 5;
    config.image.api_url = image_url.to_string();
    config.image.request_timeout_secs = 5;

    config.rate_limits.text.padding_ms = 0;
    config.rate_limits.image.padding_ms = 0;

    for retry in [&mut config.retries.text, &mut config.retries.image] {
        retry.max_attempts = 2;
        retry.base_delay_ms = 1;
        retry.max_delay_ms = 5;
    }

    config.convert.methods = vec![ConverterKind::Html];
    config.story.chapters = 3;
    config.story.output_dir = output_dir.to_path_buf();
    config
}

/// Outline response for a story with `chapters` chapters.
pub fn outline_text(chapters: usize) -> String {
    let mut text = String::from("TITLE: Pip and the Moon Garden\n");
    for n in 1..=chapters {
        text.push_str(&format!("CHAPTER {n}: Adventure number {n}\n"));
    }
    text.push_str("CHARACTERS: Pip, a small fox with a blue scarf.\n");
    text
}
