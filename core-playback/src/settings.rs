//! Persisted player settings and the resume-by-settings operation.
//!
//! Settings serialize as one JSON document per scheme through the host's
//! [`SettingsStore`] seam, so different product surfaces (background music,
//! pose library, ...) keep independent player state under their own key.

use crate::error::Result;
use crate::model::{Album, AlbumId, Entitlements, LoopMode, Position, Track, TrackId};
use crate::player::BgmPlayer;
use crate::queue::PlaybackQueue;
use bridge_traits::storage::SettingsStore;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Persisted player state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlayerSettings {
    /// Business scheme this settings document belongs to.
    pub scheme: String,
    /// Whether the player may start playback at all.
    pub enabled: bool,
    /// Whether resolution may serve tracks from the disk cache.
    pub cache_enabled: bool,
    /// Output volume in `[0.0, 1.0]`.
    pub volume: f32,
    /// Resource id of the last playing track.
    pub current_track_id: Option<TrackId>,
    /// Persisted loop mode.
    pub loop_mode: LoopMode,
    /// Track designated for single-track loop.
    pub loop_track_id: Option<TrackId>,
    /// Album designated for album loop.
    pub loop_album_id: Option<AlbumId>,
    /// Favorite track ids, in the order they were added.
    pub favorites: Vec<TrackId>,
}

impl PlayerSettings {
    pub fn new(scheme: impl Into<String>) -> Self {
        Self {
            scheme: scheme.into(),
            enabled: true,
            cache_enabled: true,
            volume: 1.0,
            current_track_id: None,
            loop_mode: LoopMode::Off,
            loop_track_id: None,
            loop_album_id: None,
            favorites: Vec::new(),
        }
    }

    fn storage_key(scheme: &str) -> String {
        format!("player.settings.{}", scheme)
    }

    /// Load the settings document for `scheme`, falling back to defaults
    /// when it is absent or unreadable.
    pub async fn load(store: &dyn SettingsStore, scheme: &str) -> Self {
        match store.get_string(&Self::storage_key(scheme)).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(settings) => settings,
                Err(e) => {
                    warn!(scheme, error = %e, "settings document unreadable, using defaults");
                    Self::new(scheme)
                }
            },
            Ok(None) => Self::new(scheme),
            Err(e) => {
                warn!(scheme, error = %e, "settings store unavailable, using defaults");
                Self::new(scheme)
            }
        }
    }

    /// Persist this document under its scheme.
    pub async fn save(&self, store: &dyn SettingsStore) -> bridge_traits::error::Result<()> {
        let raw = serde_json::to_string(self).map_err(|e| {
            bridge_traits::BridgeError::OperationFailed(format!("settings encode: {}", e))
        })?;
        store.set_string(&Self::storage_key(&self.scheme), &raw).await
    }

    // ===== Favorites =====

    pub fn is_favorite(&self, id: TrackId) -> bool {
        self.favorites.contains(&id)
    }

    /// Add or remove a favorite. Returns whether anything changed.
    pub fn set_favorite(&mut self, id: TrackId, favorite: bool) -> bool {
        if favorite {
            if self.favorites.contains(&id) {
                return false;
            }
            self.favorites.push(id);
            true
        } else {
            let before = self.favorites.len();
            self.favorites.retain(|f| *f != id);
            before != self.favorites.len()
        }
    }

    /// Clone the favorite tracks out of the live albums, in favorites order.
    pub fn select_favorites(&self, albums: &[Album]) -> Vec<Track> {
        self.favorites
            .iter()
            .filter_map(|id| {
                albums
                    .iter()
                    .flat_map(|a| a.tracks.iter())
                    .find(|t| t.res_id == *id)
                    .cloned()
            })
            .collect()
    }

    /// Build the synthetic favorites album from the live albums.
    pub fn favorites_album(
        &self,
        id: AlbumId,
        name: impl Into<String>,
        albums: &[Album],
    ) -> Album {
        Album::favorites(id, name, &self.favorites, albums)
    }

    // ===== Designated loops =====

    pub fn is_loop_track(&self, id: TrackId) -> bool {
        self.loop_track_id == Some(id)
    }

    pub fn set_loop_track(&mut self, id: Option<TrackId>) {
        self.loop_track_id = id;
    }

    pub fn is_loop_album(&self, id: AlbumId) -> bool {
        self.loop_album_id == Some(id)
    }

    pub fn set_loop_album(&mut self, id: Option<AlbumId>) {
        self.loop_album_id = id;
    }
}

impl BgmPlayer {
    /// Sync the player's mutable state from a settings document.
    ///
    /// Restores the current position from `current_track_id` when the track
    /// is still present; playback itself is not started (see
    /// [`resume_with_settings`](Self::resume_with_settings)).
    pub async fn apply_settings(&self, settings: &PlayerSettings) {
        self.set_enabled(settings.enabled).await;
        self.set_volume(settings.volume).await;
        self.set_loop_mode(settings.loop_mode).await;
        self.set_use_cache(settings.cache_enabled).await;

        if let Some(id) = settings.current_track_id {
            self.select_by_id(id).await;
        }
    }

    /// Resume playback from a settings document.
    ///
    /// Priority:
    /// 1. Single loop with a designated track: play it — unless it is not
    ///    playable, which cancels the resume entirely.
    /// 2. Album loop with a designated album: the last played track when it
    ///    sits inside that album, else the album's first playable track.
    /// 3. The last played track, when still present and playable.
    ///
    /// Returns `false` when nothing matched, so the caller can fall through
    /// to a plain `next`.
    pub async fn resume_with_settings(
        &self,
        settings: &PlayerSettings,
        auto_play: bool,
    ) -> Result<bool> {
        let target = self
            .with_queue(|queue, entitlements| resume_target(queue, entitlements, settings))
            .await;

        match target {
            Some(position) => {
                debug!(position = %position, "resuming playback from settings");
                self.load(position, auto_play).await?;
                Ok(true)
            }
            None => {
                debug!("settings named no resumable track");
                Ok(false)
            }
        }
    }

    /// Play the first occurrence of the given track id, when present.
    pub async fn play_if_exists(&self, id: TrackId) -> Result<bool> {
        let target = self.with_queue(|queue, _| queue.first_position_of(id)).await;
        match target {
            Some(position) => {
                self.load(position, true).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Jump to the designated loop target when the active loop mode names
    /// one and the player is not already inside it.
    pub async fn play_designated_loop_if_needed(&self, settings: &PlayerSettings) -> Result<()> {
        match self.loop_mode().await {
            LoopMode::Single => {
                let Some(id) = settings.loop_track_id else {
                    return Ok(());
                };
                let current = self.current_track().await.map(|t| t.res_id);
                if current != Some(id) {
                    self.play_if_exists(id).await?;
                }
            }
            LoopMode::Album => {
                let Some(album_id) = settings.loop_album_id else {
                    return Ok(());
                };
                let (current_album, target) = self
                    .with_queue(|queue, _| {
                        let current_album = queue
                            .current()
                            .and_then(|p| queue.album(p.album))
                            .map(|a| a.id);
                        let target = queue
                            .albums()
                            .iter()
                            .position(|a| a.id == album_id && !a.tracks.is_empty())
                            .map(|ix| Position::new(ix, 0));
                        (current_album, target)
                    })
                    .await;
                if current_album != Some(album_id) {
                    if let Some(position) = target {
                        self.load(position, true).await?;
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }
}

/// Pure resume-target resolution, shared with tests.
fn resume_target(
    queue: &PlaybackQueue,
    entitlements: &Entitlements,
    settings: &PlayerSettings,
) -> Option<Position> {
    // Priority 1: designated single-track loop.
    if settings.loop_mode == LoopMode::Single {
        if let Some(id) = settings.loop_track_id {
            if let Some(position) = queue.first_position_of(id) {
                // An unplayable designated track cancels the resume.
                return queue
                    .track(position)
                    .filter(|t| t.is_playable(entitlements))
                    .map(|_| position);
            }
        }
    }

    // Priority 2: designated album loop.
    if settings.loop_mode == LoopMode::Album {
        if let Some(album_id) = settings.loop_album_id {
            if let Some(album_ix) = queue
                .albums()
                .iter()
                .position(|a| a.id == album_id && !a.tracks.is_empty())
            {
                // The last played track wins when it sits inside the album.
                if let Some(song_id) = settings.current_track_id {
                    if let Some(position) = queue.first_position_of(song_id) {
                        if position.album == album_ix {
                            return Some(position);
                        }
                    }
                }
                // Else the album's first playable track; a fully gated
                // album resumes nothing.
                return queue
                    .playable_positions_in(album_ix, entitlements)
                    .into_iter()
                    .next();
            }
        }
    }

    // Priority 3: the last played track.
    if let Some(id) = settings.current_track_id {
        if let Some(position) = queue.first_position_of(id) {
            if queue
                .track(position)
                .is_some_and(|t| t.is_playable(entitlements))
            {
                return Some(position);
            }
        }
    }

    None
}
