//! HTTP image source backed by a shared pooled client.
//!
//! Gallery candidates usually live behind URLs. `HttpSource` resolves
//! relative locators against an optional base URL and fetches with bounded
//! timeouts so one stalled download cannot hold a worker forever (pair with
//! `per_candidate_timeout` for a hard cap).

use std::time::Duration;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use once_cell::sync::Lazy;

use crate::config::{ConfigError, SourceConfig};
use crate::error::SourceError;
use crate::source::ImageSource;

// Default client with connection pooling; instances built via `new` share it.
static HTTP_CLIENT: Lazy<reqwest::Client> = Lazy::new(|| {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .connect_timeout(Duration::from_secs(10))
        .pool_max_idle_per_host(32)
        .build()
        .expect("failed to build HTTP client")
});

/// HTTP-backed [`ImageSource`].
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: reqwest::Client,
    base_url: Option<String>,
    max_bytes: usize,
}

impl HttpSource {
    /// Source using the shared default client (30s request, 10s connect).
    pub fn new() -> Self {
        HttpSource {
            client: HTTP_CLIENT.clone(),
            base_url: None,
            max_bytes: SourceConfig::default_max_bytes(),
        }
    }

    /// Base URL prepended to relative locators. Absolute `http(s)://`
    /// locators bypass it.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    /// Build a source from config, with a dedicated client honoring the
    /// configured timeouts.
    pub fn from_config(cfg: &SourceConfig) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .connect_timeout(Duration::from_secs(cfg.connect_timeout_secs))
            .pool_max_idle_per_host(32)
            .build()
            .map_err(|err| ConfigError::Validation(format!("http client: {err}")))?;

        Ok(HttpSource {
            client,
            base_url: cfg.base_url.clone(),
            max_bytes: cfg.max_bytes,
        })
    }

    fn resolve(&self, locator: &str) -> String {
        if locator.starts_with("http://") || locator.starts_with("https://") {
            return locator.to_string();
        }
        match &self.base_url {
            Some(base) => format!(
                "{}/{}",
                base.trim_end_matches('/'),
                locator.trim_start_matches('/')
            ),
            None => locator.to_string(),
        }
    }
}

impl Default for HttpSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ImageSource for HttpSource {
    async fn load(&self, locator: &str) -> Result<Bytes, SourceError> {
        let url = self.resolve(locator);

        let mut response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|err| SourceError::Request {
                locator: locator.to_string(),
                reason: err.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                locator: locator.to_string(),
                status: status.as_u16(),
            });
        }

        if let Some(length) = response.content_length() {
            if length > self.max_bytes as u64 {
                return Err(SourceError::TooLarge {
                    locator: locator.to_string(),
                    limit: self.max_bytes,
                });
            }
        }

        // EOF-framed bodies advertise no length, so the cap is enforced
        // while streaming; exceeding it drops the connection instead of
        // buffering the rest.
        let mut body = BytesMut::with_capacity(
            response.content_length().map_or(0, |length| length as usize),
        );
        while let Some(chunk) = response.chunk().await.map_err(|err| SourceError::Request {
            locator: locator.to_string(),
            reason: err.to_string(),
        })? {
            if body.len() + chunk.len() > self.max_bytes {
                return Err(SourceError::TooLarge {
                    locator: locator.to_string(),
                    limit: self.max_bytes,
                });
            }
            body.extend_from_slice(&chunk);
        }

        Ok(body.freeze())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_locators_join_the_base_url() {
        let source = HttpSource::new().with_base_url("https://photos.example.com/gallery/");
        assert_eq!(
            source.resolve("42.jpg"),
            "https://photos.example.com/gallery/42.jpg"
        );
        assert_eq!(
            source.resolve("/42.jpg"),
            "https://photos.example.com/gallery/42.jpg"
        );
    }

    #[test]
    fn absolute_locators_bypass_the_base_url() {
        let source = HttpSource::new().with_base_url("https://photos.example.com");
        assert_eq!(
            source.resolve("https://cdn.example.com/a.png"),
            "https://cdn.example.com/a.png"
        );
    }

    #[test]
    fn without_base_url_locators_pass_through() {
        let source = HttpSource::new();
        assert_eq!(
            source.resolve("http://example.com/x.png"),
            "http://example.com/x.png"
        );
        assert_eq!(source.resolve("x.png"), "x.png");
    }

    #[test]
    fn from_config_honors_limits() {
        let cfg = SourceConfig {
            kind: "http".to_string(),
            base_url: Some("https://example.com".to_string()),
            max_bytes: 1024,
            ..SourceConfig::default()
        };

        let source = HttpSource::from_config(&cfg).expect("client builds");
        assert_eq!(source.max_bytes, 1024);
        assert_eq!(source.base_url.as_deref(), Some("https://example.com"));
    }

    // Multi-thread flavor: the body blocks on `recv_timeout`, and reqwest's
    // background connection task must keep running to hang up the socket.
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn unsized_body_over_the_cap_aborts_the_download_early() {
        use std::io::{Read, Write};
        use std::net::TcpListener;

        const CHUNK: usize = 64 * 1024;
        const TOTAL: usize = 64 * 1024 * 1024;

        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("local addr");
        let (sent_tx, sent_rx) = std::sync::mpsc::channel();

        std::thread::spawn(move || {
            let (mut conn, _) = listener.accept().expect("accept");
            let mut head = [0u8; 1024];
            let _ = conn.read(&mut head);

            // No Content-Length: the body is framed by connection close.
            conn.write_all(b"HTTP/1.0 200 OK\r\nConnection: close\r\n\r\n")
                .expect("response head");
            let chunk = vec![0u8; CHUNK];
            let mut sent = 0usize;
            while sent < TOTAL {
                match conn.write_all(&chunk) {
                    Ok(()) => sent += CHUNK,
                    Err(_) => break,
                }
            }
            let _ = sent_tx.send(sent);
        });

        let source = HttpSource::new().with_max_bytes(1024);
        let url = format!("http://{addr}/huge.bin");

        let err = source.load(&url).await.expect_err("cap must fire");
        assert!(matches!(err, SourceError::TooLarge { limit: 1024, .. }));

        // The client hangs up once the cap trips, so the server cannot push
        // anywhere near the full body.
        let sent = sent_rx
            .recv_timeout(std::time::Duration::from_secs(30))
            .expect("server thread reports bytes written");
        assert!(
            sent < TOTAL / 2,
            "download should stop near the cap, server pushed {sent} bytes"
        );
    }
}
