//! Blocking HTTP transport shared by every backend.

use std::io::Read;
use std::time::Duration;

use reqwest::blocking::{Client, Response};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use thicket_core::config::HttpConfig;
use thicket_resolver::ResolveError;
use thicket_util::errors::ThicketError;
use thicket_util::progress;

const RETRY_DELAY: Duration = Duration::from_millis(500);
/// Bodies larger than this get a progress bar.
const PROGRESS_THRESHOLD: u64 = 100_000;
/// Upper bound on the buffer reserved from a server-declared length.
const MAX_PREALLOCATION: u64 = PROGRESS_THRESHOLD * 100;

#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    retries: u32,
}

impl HttpClient {
    pub fn new(config: &HttpConfig) -> miette::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| ThicketError::Network {
                message: format!("Failed to create HTTP client: {e}"),
            })?;
        Ok(Self {
            client,
            retries: config.retries.max(1),
        })
    }

    /// GET `url`, retrying server errors, timeouts and refused connections.
    ///
    /// Returns `Ok(None)` on 404.
    fn send(&self, url: &str) -> Result<Option<Response>, ResolveError> {
        let mut last_err = String::new();

        for attempt in 0..self.retries {
            if attempt > 0 {
                std::thread::sleep(RETRY_DELAY * attempt);
            }
            tracing::debug!("GET {url}");

            match self.client.get(url).send() {
                Ok(resp) => {
                    let status = resp.status();
                    if status == StatusCode::NOT_FOUND {
                        tracing::debug!("404 {url}");
                        return Ok(None);
                    }
                    if status.is_server_error() {
                        last_err = format!("HTTP {status}");
                        continue;
                    }
                    if !status.is_success() {
                        return Err(ResolveError::Transport {
                            url: url.to_string(),
                            message: format!("HTTP {status}"),
                        });
                    }
                    return Ok(Some(resp));
                }
                Err(e) if e.is_timeout() || e.is_connect() => {
                    last_err = e.to_string();
                    continue;
                }
                Err(e) => {
                    return Err(ResolveError::Transport {
                        url: url.to_string(),
                        message: e.to_string(),
                    });
                }
            }
        }

        Err(ResolveError::Transport {
            url: url.to_string(),
            message: format!("failed after {} attempts: {last_err}", self.retries),
        })
    }

    /// Download a body, showing a progress bar for large ones.
    pub fn get_bytes(&self, url: &str) -> Result<Option<Vec<u8>>, ResolveError> {
        let Some(mut resp) = self.send(url)? else {
            return Ok(None);
        };
        let total = resp.content_length().unwrap_or(0);
        let bar = (total > PROGRESS_THRESHOLD).then(|| progress::download_bar(total, url));

        let mut body = Vec::with_capacity(body_capacity(total));
        let mut buf = [0u8; 8192];
        loop {
            let n = resp.read(&mut buf).map_err(|e| ResolveError::Transport {
                url: url.to_string(),
                message: format!("read error: {e}"),
            })?;
            if n == 0 {
                break;
            }
            body.extend_from_slice(&buf[..n]);
            if let Some(bar) = &bar {
                bar.inc(n as u64);
            }
        }
        if let Some(bar) = bar {
            bar.finish_and_clear();
        }
        Ok(Some(body))
    }

    pub fn get_text(&self, url: &str) -> Result<Option<String>, ResolveError> {
        let Some(resp) = self.send(url)? else {
            return Ok(None);
        };
        resp.text().map(Some).map_err(|e| ResolveError::Transport {
            url: url.to_string(),
            message: format!("failed to read response: {e}"),
        })
    }

    /// GET and deserialize a JSON document.
    pub fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<Option<T>, ResolveError> {
        let Some(text) = self.get_text(url)? else {
            return Ok(None);
        };
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|e| ResolveError::Metadata {
                url: url.to_string(),
                message: e.to_string(),
            })
    }

    /// Like [`get_bytes`](Self::get_bytes) but a 404 is a [`ResolveError::NotFound`].
    pub fn require_bytes(&self, url: &str) -> Result<Vec<u8>, ResolveError> {
        self.get_bytes(url)?.ok_or_else(|| not_found(url))
    }

    pub fn require_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, ResolveError> {
        self.get_json(url)?.ok_or_else(|| not_found(url))
    }
}

/// Bytes to reserve for a body whose `Content-Length` is `declared`.
fn body_capacity(declared: u64) -> usize {
    declared.min(MAX_PREALLOCATION) as usize
}

fn not_found(url: &str) -> ResolveError {
    ResolveError::NotFound {
        url: url.to_string(),
    }
}

/// Join a base URL and a path without doubling the slash.
pub fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
