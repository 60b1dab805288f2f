//! Artifact download with timeout, bounded retry and cancellation

use crate::cancel::CancelSignal;
use crate::error::{Result, TransportError, UpdateError};
use crate::releases::AssetLink;
use crate::transport::ReleaseTransport;
use futures_util::StreamExt;
use hoist_core::retry::{ClosurePredicate, RetryError, RetryExecutor, TracingObserver};
use hoist_core::types::RetryPolicy;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// Upper bound for sidecar files (checksums, signature envelopes)
const MAX_SIDECAR_BYTES: usize = 1024 * 1024;

/// Streams release assets to disk
#[derive(Debug, Clone)]
pub struct Downloader {
    timeout: Duration,
    retry_policy: RetryPolicy,
    show_progress: bool,
}

impl Downloader {
    /// `timeout` bounds each attempt; `retry_policy` bounds the attempts
    pub fn new(timeout: Duration, retry_policy: RetryPolicy) -> Self {
        Self {
            timeout,
            retry_policy,
            show_progress: false,
        }
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Download `link` to `dest`
    ///
    /// The body is written to `<dest>.part` and renamed into place once the
    /// declared size has been received, so `dest` only ever holds a complete
    /// download. Nothing is left behind on failure or cancellation.
    pub async fn download_to(
        &self,
        transport: &dyn ReleaseTransport,
        link: &AssetLink,
        dest: &Path,
        cancel: &CancelSignal,
    ) -> Result<u64> {
        let partial = dest.with_extension(match dest.extension() {
            Some(ext) => format!("{}.part", ext.to_string_lossy()),
            None => "part".to_string(),
        });

        let executor = RetryExecutor::<UpdateError, _, _>::new(self.retry_policy.clone())
            .with_predicate(ClosurePredicate::new(|e: &UpdateError| e.is_retryable()))
            .with_observer(TracingObserver::new(format!("download {}", link.name)));

        let result = executor
            .execute(|| self.attempt(transport, link, &partial, cancel))
            .await
            .map_err(RetryError::into_source);

        match result {
            Ok(size) => {
                tokio::fs::rename(&partial, dest).await?;
                info!("Downloaded {} ({} bytes)", link.name, size);
                Ok(size)
            }
            Err(e) => {
                let _ = tokio::fs::remove_file(&partial).await;
                Err(e)
            }
        }
    }

    /// Fetch a small file (checksum listing, signature envelope) into memory
    pub async fn fetch_bytes(
        &self,
        transport: &dyn ReleaseTransport,
        link: &AssetLink,
        cancel: &CancelSignal,
    ) -> Result<Vec<u8>> {
        let executor = RetryExecutor::<UpdateError, _, _>::new(self.retry_policy.clone())
            .with_predicate(ClosurePredicate::new(|e: &UpdateError| e.is_retryable()))
            .with_observer(TracingObserver::new(format!("fetch {}", link.name)));

        executor
            .execute(|| self.guarded(cancel, self.read_to_memory(transport, link)))
            .await
            .map_err(RetryError::into_source)
    }

    async fn attempt(
        &self,
        transport: &dyn ReleaseTransport,
        link: &AssetLink,
        partial: &Path,
        cancel: &CancelSignal,
    ) -> Result<u64> {
        self.guarded(cancel, self.stream_to_file(transport, link, partial))
            .await
    }

    /// Run `work` under the per-attempt timeout, abandoning it on cancellation
    async fn guarded<T, F>(&self, cancel: &CancelSignal, work: F) -> Result<T>
    where
        F: std::future::Future<Output = Result<T>>,
    {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(UpdateError::Cancelled),
            result = tokio::time::timeout(self.timeout, work) => match result {
                Ok(result) => result,
                Err(_) => Err(TransportError::Timeout { timeout: self.timeout }.into()),
            },
        }
    }

    async fn stream_to_file(
        &self,
        transport: &dyn ReleaseTransport,
        link: &AssetLink,
        partial: &Path,
    ) -> Result<u64> {
        let download = transport.fetch_asset(link).await?;
        let expected = download.declared_size;
        let mut stream = download.stream;

        let mut file = tokio::fs::File::create(partial).await?;
        let progress = self.progress_bar(expected, &link.name);
        let mut written = 0u64;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
            if let Some(pb) = &progress {
                pb.set_position(written);
            }
        }
        file.flush().await?;
        file.sync_all().await?;

        if let Some(pb) = progress {
            pb.finish_and_clear();
        }

        if let Some(expected) = expected {
            if written != expected {
                return Err(UpdateError::IncompleteDownload {
                    asset: link.name.clone(),
                    expected,
                    actual: written,
                });
            }
        }

        debug!("Received {} bytes for {}", written, link.name);
        Ok(written)
    }

    async fn read_to_memory(
        &self,
        transport: &dyn ReleaseTransport,
        link: &AssetLink,
    ) -> Result<Vec<u8>> {
        let download = transport.fetch_asset(link).await?;
        let mut stream = download.stream;
        let mut body = Vec::new();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            if body.len() + chunk.len() > MAX_SIDECAR_BYTES {
                return Err(TransportError::network(format!(
                    "{} exceeds {} bytes",
                    link.name, MAX_SIDECAR_BYTES
                ))
                .into());
            }
            body.extend_from_slice(&chunk);
        }
        Ok(body)
    }

    fn progress_bar(&self, total: Option<u64>, name: &str) -> Option<ProgressBar> {
        if !self.show_progress {
            return None;
        }
        let pb = match total {
            Some(total) => ProgressBar::new(total),
            None => ProgressBar::new_spinner(),
        };
        if let Ok(style) = ProgressStyle::default_bar().template(
            "{msg}\n{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})",
        ) {
            pb.set_style(style.progress_chars("#>-"));
        }
        pb.set_message(format!("Downloading {}", name));
        Some(pb)
    }
}

/// Format a byte count for display
pub fn human_readable_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.2} {}", size, UNITS[unit])
    }
}
