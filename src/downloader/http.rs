//! Plain HTTP(S) downloads streamed to disk

use crate::downloader::traits::Downloader;
use crate::extractor::models::{Format, VideoInfo};
use crate::utils::config::Params;
use crate::utils::error::GrabError;
use anyhow::Result;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::COOKIE;
use reqwest::Client;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

/// Streams a format's URL into `<path>.part`, renaming on success
pub struct HttpDownloader {
    client: Client,
    retries: usize,
    retry_delay: Duration,
}

impl HttpDownloader {
    pub fn new(params: &Params) -> crate::utils::Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| GrabError::Download(format!("failed to create HTTP client: {}", e)))?;
        Ok(Self {
            client,
            retries: params.retries,
            retry_delay: Duration::from_secs(1),
        })
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Single attempt; returns the number of bytes written
    async fn download_attempt(&self, part_path: &Path, format: &Format) -> Result<u64> {
        let mut request = self.client.get(&format.url);
        for (name, value) in &format.http_headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if let Some(cookie) = format.cookie_header_for(&format.url) {
            request = request.header(COOKIE, cookie);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(anyhow::anyhow!("HTTP error: {}", response.status()));
        }
        let expected = response.content_length();

        let mut file = BufWriter::new(File::create(part_path).await?);
        let mut downloaded = 0u64;
        let start_time = Instant::now();
        let mut last_update = start_time;

        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            downloaded += chunk.len() as u64;

            let now = Instant::now();
            if now.duration_since(last_update) >= Duration::from_secs(1) {
                let elapsed = now.duration_since(start_time).as_secs_f64();
                let speed = if elapsed > 0.0 {
                    downloaded as f64 / elapsed
                } else {
                    0.0
                };
                debug!(
                    "[download] {}: {} of {:?} bytes at {:.0} B/s",
                    format.format_id, downloaded, expected, speed
                );
                last_update = now;
            }
        }
        file.flush().await?;

        if let Some(expected) = expected {
            if downloaded != expected {
                return Err(anyhow::anyhow!(
                    "Content too short: got {} of {} bytes",
                    downloaded,
                    expected
                ));
            }
        }
        Ok(downloaded)
    }
}

/// `<path>.part`
pub fn part_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".part");
    PathBuf::from(name)
}

#[async_trait]
impl Downloader for HttpDownloader {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn download(&self, path: &Path, _info: &VideoInfo, format: &Format) -> Result<bool> {
        match format.protocol.as_deref() {
            None | Some("http") | Some("https") => {}
            Some(other) => {
                return Err(GrabError::Download(format!(
                    "{}: protocol {} is not supported by the HTTP downloader",
                    format.format_id, other
                ))
                .into())
            }
        }

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let part = part_path(path);

        let mut attempts = 0;
        loop {
            match self.download_attempt(&part, format).await {
                Ok(bytes) => {
                    tokio::fs::rename(&part, path).await?;
                    info!("[download] {} ({} bytes) has finished", path.display(), bytes);
                    return Ok(true);
                }
                Err(e) if attempts < self.retries => {
                    attempts += 1;
                    warn!(
                        "Download of {} failed (attempt {} of {}): {}",
                        format.format_id,
                        attempts,
                        self.retries + 1,
                        e
                    );
                    sleep(self.retry_delay).await;
                }
                Err(e) => {
                    error!(
                        "Download of {} failed after {} attempts: {}",
                        format.format_id,
                        attempts + 1,
                        e
                    );
                    return Err(e);
                }
            }
        }
    }
}
