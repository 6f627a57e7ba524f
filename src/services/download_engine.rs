use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures_util::StreamExt;
use tokio::io::AsyncWriteExt;

use crate::config::PatcherConfig;
use crate::errors::{PatcherError, Result};
use crate::models::{ProgressEvent, ProgressPhase};
use crate::services::collaborators::ArtifactFetcher;
use crate::services::events::EventSink;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const REPORT_INTERVAL: Duration = Duration::from_millis(250);

/// Streams artifacts to disk under a hard wall-clock timeout.
#[derive(Clone)]
pub struct DownloadEngine {
    client: reqwest::Client,
    timeout: Duration,
}

impl DownloadEngine {
    pub fn new(config: &PatcherConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;
        Ok(Self::with_client(client, config.download_timeout()))
    }

    pub fn with_client(client: reqwest::Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    /// Downloads `url` into `dest`. A failed transfer leaves whatever landed on disk in place.
    pub async fn download(
        &self,
        url: &str,
        dest: &Path,
        phase: ProgressPhase,
        sink: &dyn EventSink,
    ) -> Result<PathBuf> {
        match tokio::time::timeout(self.timeout, self.transfer(url, dest, phase, sink)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!("download of {} aborted after {:?}", url, self.timeout);
                Err(PatcherError::Timeout(self.timeout.as_secs()))
            }
        }
    }

    async fn transfer(
        &self,
        url: &str,
        dest: &Path,
        phase: ProgressPhase,
        sink: &dyn EventSink,
    ) -> Result<PathBuf> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| PatcherError::Download(format!("{} -> {}", url, err)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let snippet = trim_text_snippet(&body);
            return Err(PatcherError::Download(if snippet.is_empty() {
                format!("{} -> HTTP {}", url, status)
            } else {
                format!("{} -> HTTP {} ({})", url, status, snippet)
            }));
        }

        let total = response.content_length().filter(|len| *len > 0);
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::File::create(dest).await?;

        tracing::info!(
            "downloading {} -> {} ({})",
            url,
            dest.display(),
            total.map(format_bytes).unwrap_or_else(|| "unknown size".to_string())
        );
        sink.progress(ProgressEvent::bytes(phase, 0, total));

        let mut reporter = ProgressReporter::new(phase, total);
        let mut received = 0u64;
        let mut stream = response.bytes_stream();
        while let Some(next) = stream.next().await {
            let bytes = next.map_err(|err| {
                PatcherError::Download(format!(
                    "{} -> stream failed after {}: {}",
                    url,
                    format_bytes(received),
                    err
                ))
            })?;
            file.write_all(&bytes).await?;
            received = received.saturating_add(bytes.len() as u64);
            reporter.maybe_report(sink, received);
        }
        file.flush().await?;
        drop(file);

        if received == 0 {
            return Err(PatcherError::Download(format!(
                "{} -> response carried no body",
                url
            )));
        }
        if let Some(expected) = total {
            if received < expected {
                return Err(PatcherError::Download(format!(
                    "{} -> truncated transfer ({} of {})",
                    url,
                    format_bytes(received),
                    format_bytes(expected)
                )));
            }
        }

        sink.progress(ProgressEvent::complete(
            phase,
            Some(received),
            Some(total.unwrap_or(received)),
        ));
        tracing::info!("downloaded {} ({})", dest.display(), format_bytes(received));
        Ok(dest.to_path_buf())
    }
}

#[async_trait]
impl ArtifactFetcher for DownloadEngine {
    async fn fetch(
        &self,
        url: &str,
        dest: &Path,
        phase: ProgressPhase,
        sink: &dyn EventSink,
    ) -> Result<PathBuf> {
        self.download(url, dest, phase, sink).await
    }
}

/// Throttles byte-level progress to percent changes, or one event per interval when the
/// total is unknown.
struct ProgressReporter {
    phase: ProgressPhase,
    total: Option<u64>,
    last_sent: Instant,
    last_percent: i32,
}

impl ProgressReporter {
    fn new(phase: ProgressPhase, total: Option<u64>) -> Self {
        Self {
            phase,
            total,
            last_sent: Instant::now(),
            last_percent: 0,
        }
    }

    fn maybe_report(&mut self, sink: &dyn EventSink, received: u64) {
        let event = ProgressEvent::bytes(self.phase, received, self.total);
        // 100 is reserved for the completion event.
        if event.percent >= 100 {
            return;
        }
        let now = Instant::now();
        let due = now.duration_since(self.last_sent) >= REPORT_INTERVAL;
        if event.percent > self.last_percent || (due && event.percent == -1) {
            self.last_percent = event.percent.max(self.last_percent);
            self.last_sent = now;
            sink.progress(event);
        }
    }
}

fn trim_text_snippet(value: &str) -> String {
    value.chars().take(300).collect::<String>().trim().to_string()
}

fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[unit])
    } else {
        format!("{:.2} {}", value, UNITS[unit])
    }
}
