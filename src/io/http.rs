use async_trait::async_trait;
use reqwest::header::{ACCEPT_RANGES, CONTENT_LENGTH, RANGE};
use reqwest::{Client, StatusCode};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use super::ReadAt;
use crate::error::{Result, ZimError};

/// Delay before the first retry; doubles on every further attempt.
const BASE_BACKOFF: Duration = Duration::from_millis(250);
const MAX_BACKOFF: Duration = Duration::from_secs(8);

/// One archive part served over HTTP, read with `Range` requests.
///
/// The part is probed once with `HEAD` for its length and range support.
/// Every `read_at` then becomes one (or, after a short body, a few) ranged
/// `GET`s. Connection failures and timeouts are retried with backoff.
pub struct HttpRangeReader {
    client: Client,
    url: String,
    size: u64,
    transferred_bytes: AtomicU64,
    max_retry: u32,
}

impl HttpRangeReader {
    pub async fn new(url: String) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Self::with_client(client, url).await
    }

    /// Probe `url` with an existing client (shared connection pool, custom
    /// timeouts or proxies).
    pub async fn with_client(client: Client, url: String) -> Result<Self> {
        let resp = client.head(&url).send().await?.error_for_status()?;
        let headers = resp.headers();

        let ranged = headers
            .get(ACCEPT_RANGES)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.contains("bytes"));
        if !ranged {
            return Err(unsupported(format!("{} does not accept byte ranges", url)));
        }

        let size = headers
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
            .ok_or_else(|| unsupported(format!("{} did not report its length", url)))?;

        tracing::debug!("Remote part {} is {} bytes", url, size);

        Ok(Self {
            client,
            url,
            size,
            transferred_bytes: AtomicU64::new(0),
            max_retry: 10,
        })
    }

    /// Attempts per range request before a connection error is returned.
    pub fn max_retry(mut self, max_retry: u32) -> Self {
        self.max_retry = max_retry.max(1);
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Bytes received from the network so far.
    pub fn transferred_bytes(&self) -> u64 {
        self.transferred_bytes.load(Ordering::Relaxed)
    }

    /// Fetch the inclusive byte range `start..=end`.
    async fn fetch(&self, start: u64, end: u64) -> Result<impl AsRef<[u8]>> {
        let range = format!("bytes={}-{}", start, end);
        let mut attempt = 0;

        loop {
            let sent = self
                .client
                .get(&self.url)
                .header(RANGE, &range)
                .send()
                .await;

            let err = match sent {
                Ok(resp) if resp.status() == StatusCode::PARTIAL_CONTENT => {
                    match resp.bytes().await {
                        Ok(body) => return Ok(body),
                        Err(e) => e,
                    }
                }
                // A 200 here would be the whole part, not the range
                Ok(resp) => {
                    return Err(ZimError::Io(std::io::Error::other(format!(
                        "{} answered {} to range {}",
                        self.url,
                        resp.status(),
                        range
                    ))));
                }
                Err(e) => e,
            };

            attempt += 1;
            if !(err.is_timeout() || err.is_connect() || err.is_body()) || attempt >= self.max_retry
            {
                return Err(err.into());
            }

            let delay = BASE_BACKOFF
                .saturating_mul(1u32 << (attempt - 1).min(6))
                .min(MAX_BACKOFF);
            tracing::warn!(
                "Range {} of {} failed, retry {}/{} in {:?}: {}",
                range,
                self.url,
                attempt,
                self.max_retry,
                delay,
                err
            );
            tokio::time::sleep(delay).await;
        }
    }
}

fn unsupported(msg: String) -> ZimError {
    ZimError::Io(std::io::Error::new(std::io::ErrorKind::Unsupported, msg))
}

#[async_trait]
impl ReadAt for HttpRangeReader {
    async fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() || offset >= self.size {
            return Ok(0);
        }

        let want = (buf.len() as u64).min(self.size - offset) as usize;
        let mut filled = 0;

        // Servers may cut a body short; ask again for the remainder
        while filled < want {
            let start = offset + filled as u64;
            let end = offset + want as u64 - 1;
            let body = self.fetch(start, end).await?;
            let body = body.as_ref();
            if body.is_empty() {
                break;
            }

            let n = body.len().min(want - filled);
            buf[filled..filled + n].copy_from_slice(&body[..n]);
            filled += n;
            self.transferred_bytes.fetch_add(n as u64, Ordering::Relaxed);
        }

        tracing::trace!("Fetched {} bytes at {} from {}", filled, offset, self.url);
        Ok(filled)
    }

    fn size(&self) -> u64 {
        self.size
    }
}
