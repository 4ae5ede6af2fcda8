//! Core data model for the two-level playback queue.
//!
//! Albums own tracks; a [`Position`] addresses one queue slot. Track resource
//! ids are NOT unique across the queue: the synthetic favorites album
//! deliberately duplicates tracks owned by other albums, so any "by id"
//! operation is a broadcast over every occurrence.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Resource id of a track. Not unique across the queue (favorites duplicate).
pub type TrackId = i64;

/// Id of an album. Unique across the queue, favorites album excepted.
pub type AlbumId = i64;

/// Position of one queue slot: (album index, track index).
///
/// A position is only meaningful against a concrete queue shape; the queue
/// keeps the current position and the shuffle hint valid across mutations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    /// Album (section) index.
    pub album: usize,
    /// Track (row) index within the album.
    pub track: usize,
}

impl Position {
    pub fn new(album: usize, track: usize) -> Self {
        Self { album, track }
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{} - {}]", self.album, self.track)
    }
}

/// Loop policy governing next/previous navigation.
///
/// The mode only affects navigation; it never changes which tracks exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoopMode {
    /// No loop: stop at the forward boundary, wrap backwards.
    #[serde(rename = "none")]
    Off,
    /// Wrap across the whole queue in both directions.
    Order,
    /// Wrap within the current track's album only.
    Album,
    /// Stay on the current track.
    Single,
    /// Random playable position; `next` honors a pre-computed hint.
    Shuffle,
}

impl Default for LoopMode {
    fn default() -> Self {
        LoopMode::Order
    }
}

/// Player state machine value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerStatus {
    Stopped,
    Preparing,
    Playing,
    Paused,
    Finished,
    Error,
}

impl PlayerStatus {
    /// Wire name used in published events.
    pub fn as_str(&self) -> &'static str {
        match self {
            PlayerStatus::Stopped => "stopped",
            PlayerStatus::Preparing => "preparing",
            PlayerStatus::Playing => "playing",
            PlayerStatus::Paused => "paused",
            PlayerStatus::Finished => "finished",
            PlayerStatus::Error => "error",
        }
    }
}

/// Per-occurrence track status.
///
/// Independent of [`PlayerStatus`] except that the current track's
/// occurrences are kept in sync with the player while it is the active
/// selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackStatus {
    Idle,
    Downloading,
    Preparing,
    Playing,
    Paused,
    Stopped,
    Error,
}

/// Volume fade behaviour on playback start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FadeMode {
    /// Start at full volume.
    Off,
    /// Ramp in once per session; later starts are immediate until the
    /// faded flag is reset.
    RampOnce(Duration),
    /// Ramp in on every start.
    RampEachTime(Duration),
}

/// Direction of the last navigation command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayDirection {
    /// An explicitly addressed position.
    Specified,
    Next,
    Previous,
}

/// Caller-provided entitlement state consulted by the playable predicate.
///
/// Injected explicitly (never read from process-wide state) so tests can
/// pin entitlements deterministically.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Entitlements {
    /// Whether subscription-gated tracks may play.
    pub subscribed: bool,
}

impl Entitlements {
    pub fn subscriber() -> Self {
        Self { subscribed: true }
    }
}

/// One track as it sits in the queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Track {
    /// Resource id; duplicated across occurrences of the same track.
    pub res_id: TrackId,
    /// Remote URL of the playable file, when known.
    pub url: Option<String>,
    /// Name shown in UI.
    pub display_name: String,
    /// Requires an active subscription to be playable.
    pub requires_subscription: bool,
    /// Whether resolution may serve this track from the disk cache.
    pub use_cache: bool,
    /// Per-occurrence playback status.
    pub status: TrackStatus,
}

impl Track {
    pub fn new(res_id: TrackId, url: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            res_id,
            url: Some(url.into()),
            display_name: display_name.into(),
            requires_subscription: false,
            use_cache: true,
            status: TrackStatus::Idle,
        }
    }

    /// Mark the track as subscription-gated.
    pub fn with_subscription_gate(mut self, gated: bool) -> Self {
        self.requires_subscription = gated;
        self
    }

    /// Navigation-facing predicate: gated tracks are skipped unless the
    /// caller's entitlements allow them.
    pub fn is_playable(&self, entitlements: &Entitlements) -> bool {
        !self.requires_subscription || entitlements.subscribed
    }

    /// Stable cache key for this track's bytes: `resID_<id>.<ext>`.
    ///
    /// The extension comes from the URL's last path component; unknown or
    /// missing extensions fall back to `mp3`.
    pub fn cache_key(&self) -> String {
        let ext = self
            .url
            .as_deref()
            .and_then(|u| u.split(['?', '#']).next())
            .and_then(|path| path.rsplit('/').next())
            .and_then(|name| name.rsplit_once('.').map(|(_, e)| e))
            .filter(|e| !e.is_empty() && e.len() <= 4 && e.chars().all(|c| c.is_ascii_alphanumeric()))
            .unwrap_or("mp3");
        format!("resID_{}.{}", self.res_id, ext)
    }
}

/// Ordered collection of tracks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Album {
    pub id: AlbumId,
    pub name: String,
    pub tracks: Vec<Track>,
}

impl Album {
    pub fn new(id: AlbumId, name: impl Into<String>, tracks: Vec<Track>) -> Self {
        Self {
            id,
            name: name.into(),
            tracks,
        }
    }

    /// Build the synthetic favorites album.
    ///
    /// Takes the first occurrence of every listed id from `albums`, in the
    /// order of `ids`. The clones keep their original ids, so the result
    /// deliberately duplicates tracks owned by other albums.
    pub fn favorites(
        id: AlbumId,
        name: impl Into<String>,
        ids: &[TrackId],
        albums: &[Album],
    ) -> Self {
        let tracks = ids
            .iter()
            .filter_map(|fav| {
                albums
                    .iter()
                    .flat_map(|a| a.tracks.iter())
                    .find(|t| t.res_id == *fav)
                    .cloned()
            })
            .collect();
        Self::new(id, name, tracks)
    }
}

/// Append-only record of a playback that actually started.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub track_id: TrackId,
    pub display_name: String,
    pub position: Position,
    pub at: DateTime<Utc>,
}

impl HistoryEntry {
    pub fn new(track: &Track, position: Position) -> Self {
        Self {
            track_id: track.res_id,
            display_name: track.display_name.clone(),
            position,
            at: Utc::now(),
        }
    }
}
