//! Cancellable, progress-reporting byte download.
//!
//! A [`DownloadRequest`] drives the chunk stream produced by the host's
//! [`HttpClient`] seam. Cancellation is cooperative: the token is checked at
//! every chunk boundary, so a cancel becomes visible within roughly one
//! network read rather than instantly. The timeout is a deadline raced
//! against each read; whichever side finishes first cancels the other, and
//! the two outcomes stay distinct error kinds so callers can tell "retry
//! later" from "stop asking".

use crate::error::ResolutionError;
use bridge_traits::http::HttpClient;
use bytes::{Bytes, BytesMut};
use futures_util::StreamExt;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Minimum progress delta between callbacks, as a fraction of total size.
///
/// Bounds callback volume on large files without losing monotonic progress.
const PROGRESS_GRANULARITY: f64 = 0.002;

/// Callback granularity in bytes when the server reports no content length.
const UNKNOWN_SIZE_GRANULARITY: u64 = 64 * 1024;

/// Snapshot handed to the progress callback.
#[derive(Debug, Clone, Copy)]
pub struct TransferProgress {
    /// Bytes received so far.
    pub completed: u64,
    /// Total bytes, when the server reported one.
    pub total: Option<u64>,
}

impl TransferProgress {
    /// Completed fraction in `[0.0, 1.0]`, when the total is known.
    pub fn fraction(&self) -> Option<f64> {
        match self.total {
            Some(total) if total > 0 => Some(self.completed as f64 / total as f64),
            _ => None,
        }
    }
}

/// One in-flight (or pending) transfer with an externally triggerable
/// cancellation flag.
#[derive(Debug)]
pub struct DownloadRequest {
    url: String,
    cancel: CancellationToken,
}

impl DownloadRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Handle that cancels this request when triggered.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Request cancellation. In-flight reads observe the flag at the next
    /// chunk boundary.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Run the transfer against `http`, bounded by `timeout`.
    ///
    /// `on_progress` fires when the delta since the last report exceeds
    /// ~0.2% of the total size (64 KiB when the size is unknown), and once
    /// on completion.
    ///
    /// # Errors
    ///
    /// - [`ResolutionError::Canceled`] when the token fired. An explicit
    ///   cancel observed at a chunk boundary wins over an elapsed deadline.
    /// - [`ResolutionError::Timeout`] when the deadline elapsed; the
    ///   in-flight transfer is canceled as the losing side of the race.
    /// - [`ResolutionError::Io`] for transport failures.
    pub async fn fetch<F>(
        &self,
        http: &dyn HttpClient,
        timeout: Duration,
        mut on_progress: F,
    ) -> Result<Bytes, ResolutionError>
    where
        F: FnMut(TransferProgress),
    {
        let deadline = Instant::now() + timeout;

        debug!(url = %self.url, "starting download");

        // Opening the connection participates in the same race as the reads.
        let mut handle = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(ResolutionError::Canceled),
            _ = tokio::time::sleep_until(deadline) => return Err(ResolutionError::Timeout),
            opened = http.download_stream(&self.url) => opened.map_err(ResolutionError::from)?,
        };

        let total = handle.total_bytes;
        let mut data = match total {
            Some(total) => BytesMut::with_capacity(total as usize),
            None => BytesMut::new(),
        };

        let granularity = total
            .map(|t| ((t as f64 * PROGRESS_GRANULARITY) as u64).max(1))
            .unwrap_or(UNKNOWN_SIZE_GRANULARITY);
        let mut last_reported: u64 = 0;

        loop {
            // `biased` keeps the check order: an explicit cancel is reported
            // as Canceled even when the deadline has also elapsed.
            let chunk = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    debug!(url = %self.url, received = data.len(), "download canceled");
                    return Err(ResolutionError::Canceled);
                }
                _ = tokio::time::sleep_until(deadline) => {
                    // Deadline won: cancel the losing transfer.
                    self.cancel.cancel();
                    debug!(url = %self.url, received = data.len(), "download timed out");
                    return Err(ResolutionError::Timeout);
                }
                chunk = handle.stream.next() => chunk,
            };

            match chunk {
                None => break,
                Some(Err(e)) => return Err(ResolutionError::from(e)),
                Some(Ok(bytes)) => {
                    data.extend_from_slice(&bytes);
                    let completed = data.len() as u64;
                    let finished = total.is_some_and(|t| completed >= t);
                    if completed - last_reported > granularity || finished {
                        last_reported = completed;
                        on_progress(TransferProgress { completed, total });
                    }
                }
            }
        }

        info!(url = %self.url, kb = data.len() / 1024, "download finished");

        Ok(data.freeze())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fraction_requires_known_total() {
        let progress = TransferProgress {
            completed: 512,
            total: None,
        };
        assert_eq!(progress.fraction(), None);

        let progress = TransferProgress {
            completed: 512,
            total: Some(2048),
        };
        assert_eq!(progress.fraction(), Some(0.25));
    }

    #[test]
    fn cancel_is_observable_before_fetch() {
        let request = DownloadRequest::new("https://cdn.example.com/a.mp3");
        assert!(!request.cancellation_token().is_cancelled());
        request.cancel();
        assert!(request.cancellation_token().is_cancelled());
    }
}
