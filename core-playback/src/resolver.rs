//! Per-track resolution: turn a track reference into local, playable bytes.
//!
//! The resolver consults the [`FileCache`] first and only reaches for the
//! network on a miss. Download lifecycle (`Started` → `Progress` →
//! `Completed` / `Failed`) is published on the event bus so observers (UI
//! badges, pre-downloaders) can follow along without holding a reference to
//! the transfer.
//!
//! Resolving a track that is already being resolved is rejected with
//! [`ResolutionError::AlreadyInProgress`] — a membership check, not a lock,
//! since a double request is a rare caller error rather than a hot path.

use crate::cache::FileCache;
use crate::download::DownloadRequest;
use crate::error::ResolutionError;
use crate::model::{Track, TrackId};
use bridge_traits::http::HttpClient;
use bytes::Bytes;
use core_runtime::events::{CoreEvent, DownloadEvent, DownloadFailureReason, EventBus};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Orchestrates cache consultation and downloads for individual tracks.
pub struct TrackResolver {
    http: Arc<dyn HttpClient>,
    cache: Arc<FileCache>,
    events: EventBus,
    download_timeout: Duration,
    /// Tracks with a resolution in flight, with the handle to cancel it.
    in_flight: parking_lot::Mutex<HashMap<TrackId, CancellationToken>>,
}

impl TrackResolver {
    pub fn new(
        http: Arc<dyn HttpClient>,
        cache: Arc<FileCache>,
        events: EventBus,
        download_timeout: Duration,
    ) -> Self {
        Self {
            http,
            cache,
            events,
            download_timeout,
            in_flight: parking_lot::Mutex::new(HashMap::new()),
        }
    }

    /// Whether a resolution for the given track is currently in flight.
    pub fn is_resolving(&self, track_id: TrackId) -> bool {
        self.in_flight.lock().contains_key(&track_id)
    }

    /// Cancel an in-flight resolution.
    ///
    /// Returns `false` when nothing was in flight for the track. The
    /// canceled task observes the flag at its next chunk boundary and fails
    /// with [`ResolutionError::Canceled`].
    pub fn cancel(&self, track_id: TrackId) -> bool {
        match self.in_flight.lock().get(&track_id) {
            Some(token) => {
                debug!(track_id, "canceling in-flight resolution");
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Resolve the track to local bytes.
    ///
    /// Cache hits return immediately and never touch the network. On a miss
    /// the bytes are downloaded within the configured deadline, persisted
    /// under the track's stable cache key, and returned.
    ///
    /// # Errors
    ///
    /// See [`ResolutionError`]; cancellation and timeout are distinct
    /// outcomes.
    #[instrument(skip(self, track), fields(track_id = track.res_id))]
    pub async fn resolve(&self, track: &Track) -> Result<Bytes, ResolutionError> {
        let url = track
            .url
            .clone()
            .ok_or_else(|| ResolutionError::InvalidUrl("track has no URL".to_string()))?;

        // Cache consult comes before the single-flight guard: hits are
        // side-effect free and must not be rejected while a pre-download of
        // the same track is running.
        if track.use_cache {
            if let Some(data) = self.cache.lookup(&url).await {
                info!(track_id = track.res_id, bytes = data.len(), "resolved from cache");
                self.emit(DownloadEvent::Completed {
                    track_id: track.res_id,
                    bytes: data.len() as u64,
                });
                return Ok(data);
            }
        }

        url::Url::parse(&url)
            .map_err(|e| ResolutionError::InvalidUrl(format!("{}: {}", url, e)))?;

        let request = {
            let mut in_flight = self.in_flight.lock();
            if in_flight.contains_key(&track.res_id) {
                warn!(track_id = track.res_id, "resolution already in progress");
                return Err(ResolutionError::AlreadyInProgress(track.res_id));
            }
            let request = DownloadRequest::new(url.clone());
            in_flight.insert(track.res_id, request.cancellation_token());
            request
        };

        self.emit(DownloadEvent::Started {
            track_id: track.res_id,
        });
        self.emit(DownloadEvent::Progress {
            track_id: track.res_id,
            fraction: 0.0,
        });

        let events = self.events.clone();
        let track_id = track.res_id;
        let result = request
            .fetch(self.http.as_ref(), self.download_timeout, |progress| {
                if let Some(fraction) = progress.fraction() {
                    events
                        .emit(CoreEvent::Download(DownloadEvent::Progress {
                            track_id,
                            fraction,
                        }))
                        .ok();
                }
            })
            .await;

        self.in_flight.lock().remove(&track.res_id);

        match result {
            Ok(data) => {
                // Persist regardless of `use_cache`: the flag gates reads,
                // not writes, so flipping it on later finds the file.
                self.cache
                    .store(&url, &track.cache_key(), data.clone())
                    .await
                    .map_err(|e| ResolutionError::Io(e.to_string()))?;

                self.emit(DownloadEvent::Completed {
                    track_id: track.res_id,
                    bytes: data.len() as u64,
                });
                Ok(data)
            }
            Err(err) => {
                let reason = match &err {
                    ResolutionError::Canceled => DownloadFailureReason::Canceled,
                    ResolutionError::Timeout => DownloadFailureReason::Timeout,
                    _ => DownloadFailureReason::Network,
                };
                self.emit(DownloadEvent::Failed {
                    track_id: track.res_id,
                    reason,
                });
                Err(err)
            }
        }
    }

    fn emit(&self, event: DownloadEvent) {
        // No subscribers is fine; lifecycle events are best-effort.
        self.events.emit(CoreEvent::Download(event)).ok();
    }
}

impl std::fmt::Debug for TrackResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackResolver")
            .field("download_timeout", &self.download_timeout)
            .field("in_flight", &self.in_flight.lock().len())
            .finish()
    }
}
