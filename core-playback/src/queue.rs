//! Two-level playback queue: albums containing tracks, a current-position
//! cursor, the loop-mode navigation algorithms, and the playback history.
//!
//! All mutations and position reads happen on the player's single control
//! sequence; the queue itself is a plain data structure with no interior
//! locking.
//!
//! Navigation always operates over the *playable subset* of the queue,
//! computed by filtering in stable (album, track) order; "first" and "last"
//! always refer to that stable order. Non-playable tracks stay visible and
//! remain addressable by explicit position.

use crate::model::{
    Album, Entitlements, HistoryEntry, LoopMode, Position, Track, TrackId, TrackStatus,
};
use rand::Rng;
use std::collections::HashMap;
use tracing::{debug, warn};

/// The ordered, mutable two-level collection plus navigation state.
#[derive(Debug)]
pub struct PlaybackQueue {
    albums: Vec<Album>,
    /// Current playback slot; `None` means stopped / no selection.
    current: Option<Position>,
    loop_mode: LoopMode,
    /// Pre-computed next position for shuffle mode, consumed by `next`.
    shuffle_hint: Option<Position>,
    history: Vec<HistoryEntry>,
    /// Occurrence index: res id -> every position holding that id.
    /// Rebuilt on every mutation; "by id" operations broadcast through it.
    occurrences: HashMap<TrackId, Vec<Position>>,
}

impl Default for PlaybackQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackQueue {
    pub fn new() -> Self {
        Self {
            albums: Vec::new(),
            current: None,
            loop_mode: LoopMode::Order,
            shuffle_hint: None,
            history: Vec::new(),
            occurrences: HashMap::new(),
        }
    }

    // ===== Accessors =====

    pub fn albums(&self) -> &[Album] {
        &self.albums
    }

    pub fn album(&self, index: usize) -> Option<&Album> {
        self.albums.get(index)
    }

    pub fn album_count(&self) -> usize {
        self.albums.len()
    }

    pub fn track_count(&self) -> usize {
        self.albums.iter().map(|a| a.tracks.len()).sum()
    }

    pub fn track(&self, position: Position) -> Option<&Track> {
        self.albums
            .get(position.album)
            .and_then(|a| a.tracks.get(position.track))
    }

    fn track_mut(&mut self, position: Position) -> Option<&mut Track> {
        self.albums
            .get_mut(position.album)
            .and_then(|a| a.tracks.get_mut(position.track))
    }

    pub fn current(&self) -> Option<Position> {
        self.current
    }

    pub fn current_track(&self) -> Option<&Track> {
        self.current.and_then(|p| self.track(p))
    }

    /// Set the current position. An out-of-range position is rejected and
    /// the cursor left unchanged.
    pub fn set_current(&mut self, position: Option<Position>) {
        match position {
            Some(p) if !self.is_valid(p) => {
                warn!(position = %p, "rejecting out-of-range current position");
            }
            other => self.current = other,
        }
    }

    pub fn loop_mode(&self) -> LoopMode {
        self.loop_mode
    }

    pub fn set_loop_mode(&mut self, mode: LoopMode) {
        self.loop_mode = mode;
    }

    /// Whether the position addresses a slot of the live queue shape.
    pub fn is_valid(&self, position: Position) -> bool {
        self.albums
            .get(position.album)
            .is_some_and(|a| position.track < a.tracks.len())
    }

    /// Whether the position is the very last slot of the collection.
    pub fn is_last_position(&self, position: Position) -> bool {
        position.album + 1 == self.albums.len()
            && self
                .albums
                .last()
                .is_some_and(|a| position.track + 1 == a.tracks.len())
    }

    // ===== Occurrence index =====

    fn rebuild_occurrences(&mut self) {
        self.occurrences.clear();
        for (album_ix, album) in self.albums.iter().enumerate() {
            for (track_ix, track) in album.tracks.iter().enumerate() {
                self.occurrences
                    .entry(track.res_id)
                    .or_default()
                    .push(Position::new(album_ix, track_ix));
            }
        }
    }

    /// Every position holding the given resource id, in stable order.
    pub fn positions_of(&self, id: TrackId) -> Vec<Position> {
        self.occurrences.get(&id).cloned().unwrap_or_default()
    }

    /// First position holding the given resource id.
    pub fn first_position_of(&self, id: TrackId) -> Option<Position> {
        self.occurrences.get(&id).and_then(|v| v.first().copied())
    }

    /// Broadcast a status to every occurrence of the resource id.
    ///
    /// Returns how many occurrences were updated. This is deliberately a
    /// broadcast, not a single-entity mutation: favorites duplicate ids.
    pub fn set_status_by_id(&mut self, id: TrackId, status: TrackStatus) -> usize {
        let positions = self.positions_of(id);
        for position in &positions {
            if let Some(track) = self.track_mut(*position) {
                track.status = status;
            }
        }
        positions.len()
    }

    /// Fan a cache-usage flag out to every track.
    pub fn set_use_cache_all(&mut self, use_cache: bool) {
        for album in &mut self.albums {
            for track in &mut album.tracks {
                track.use_cache = use_cache;
            }
        }
    }

    // ===== Mutations =====

    /// Replace the entire collection.
    ///
    /// Clears history, re-locates the current position by the previously
    /// playing track's id (first match wins), and recomputes the shuffle
    /// hint if one existed. When the previous track is gone,
    /// `select_first` decides between the first playable position and no
    /// selection.
    pub fn reload(&mut self, albums: Vec<Album>, entitlements: &Entitlements, select_first: bool) {
        self.history.clear();

        let playing_id = self.current_track().map(|t| t.res_id);

        self.albums = albums;
        self.rebuild_occurrences();

        if self.shuffle_hint.is_some() {
            self.shuffle_hint = self.random_playable(entitlements);
        }

        self.current = playing_id.and_then(|id| self.first_position_of(id));
        if self.current.is_none() && select_first {
            self.current = self.playable_positions(entitlements).into_iter().next();
        }

        debug!(
            albums = self.albums.len(),
            tracks = self.track_count(),
            current = ?self.current,
            "queue reloaded"
        );
    }

    /// Insert an album, shifting the current position and shuffle hint when
    /// the insertion lands at or before their album index. Out-of-range
    /// indices are a logged no-op.
    pub fn insert_album(&mut self, index: usize, album: Album) -> bool {
        if index > self.albums.len() {
            warn!(index, len = self.albums.len(), "insert_album out of range");
            return false;
        }

        if let Some(current) = self.current {
            if index <= current.album {
                let shifted = Position::new(current.album + 1, current.track);
                debug!(from = %current, to = %shifted, "corrected current position");
                self.current = Some(shifted);
            }
        }

        if let Some(hint) = self.shuffle_hint {
            if index <= hint.album {
                self.shuffle_hint = Some(Position::new(hint.album + 1, hint.track));
            }
        }

        self.albums.insert(index, album);
        self.rebuild_occurrences();
        true
    }

    /// Remove an album. The current position and shuffle hint shift down
    /// when the removal is before their album; removing their own album
    /// clears them (a cleared hint forces recomputation on next use).
    /// Out-of-range indices are a logged no-op.
    pub fn remove_album(&mut self, index: usize) -> Option<Album> {
        if index >= self.albums.len() {
            warn!(index, len = self.albums.len(), "remove_album out of range");
            return None;
        }

        if let Some(current) = self.current {
            if current.album == index {
                self.current = None;
                debug!(position = %current, "current album removed, clearing selection");
            } else if current.album > index {
                self.current = Some(Position::new(current.album - 1, current.track));
            }
        }

        if let Some(hint) = self.shuffle_hint {
            if hint.album == index {
                self.shuffle_hint = None;
            } else if hint.album > index {
                self.shuffle_hint = Some(Position::new(hint.album - 1, hint.track));
            }
        }

        let removed = self.albums.remove(index);
        self.rebuild_occurrences();
        Some(removed)
    }

    /// Refresh one album in place. A shuffle hint pointing into the
    /// replaced album is cleared; one pointing past it is recomputed against
    /// the new contents. The current position is cleared only if the new
    /// contents leave it out of range.
    pub fn replace_album(
        &mut self,
        index: usize,
        album: Album,
        entitlements: &Entitlements,
    ) -> bool {
        if index >= self.albums.len() {
            warn!(index, len = self.albums.len(), "replace_album out of range");
            return false;
        }

        self.albums[index] = album;
        self.rebuild_occurrences();

        if let Some(hint) = self.shuffle_hint {
            if hint.album == index {
                self.shuffle_hint = None;
            } else if hint.album > index {
                self.shuffle_hint = self.random_playable(entitlements);
            }
        }

        if let Some(current) = self.current {
            if !self.is_valid(current) {
                self.current = None;
            }
        }
        true
    }

    // ===== Playable subset =====

    /// Positions of every playable track, in stable (album, track) order.
    pub fn playable_positions(&self, entitlements: &Entitlements) -> Vec<Position> {
        (0..self.albums.len())
            .flat_map(|ix| self.playable_positions_in(ix, entitlements))
            .collect()
    }

    /// Playable positions within one album.
    pub fn playable_positions_in(
        &self,
        album_index: usize,
        entitlements: &Entitlements,
    ) -> Vec<Position> {
        let Some(album) = self.albums.get(album_index) else {
            return Vec::new();
        };
        album
            .tracks
            .iter()
            .enumerate()
            .filter(|(_, t)| t.is_playable(entitlements))
            .map(|(ix, _)| Position::new(album_index, ix))
            .collect()
    }

    pub fn playable_count(&self, entitlements: &Entitlements) -> usize {
        self.albums
            .iter()
            .flat_map(|a| a.tracks.iter())
            .filter(|t| t.is_playable(entitlements))
            .count()
    }

    pub fn has_playable(&self, entitlements: &Entitlements) -> bool {
        self.albums
            .iter()
            .any(|a| a.tracks.iter().any(|t| t.is_playable(entitlements)))
    }

    /// Uniformly random playable position.
    pub fn random_playable(&self, entitlements: &Entitlements) -> Option<Position> {
        let list = self.playable_positions(entitlements);
        if list.is_empty() {
            return None;
        }
        let pick = rand::thread_rng().gen_range(0..list.len());
        Some(list[pick])
    }

    // ===== Shuffle hint =====

    pub fn shuffle_hint(&self) -> Option<Position> {
        self.shuffle_hint
    }

    /// Pre-set the hinted next shuffle position explicitly.
    pub fn set_shuffle_hint(&mut self, position: Position) -> bool {
        if !self.is_valid(position) {
            warn!(position = %position, "rejecting out-of-range shuffle hint");
            return false;
        }
        self.shuffle_hint = Some(position);
        true
    }

    /// Pre-compute a random hinted position so observers can know the next
    /// shuffle target before it is requested.
    pub fn preset_shuffle_hint(&mut self, entitlements: &Entitlements) -> Option<Position> {
        self.shuffle_hint = self.random_playable(entitlements);
        self.shuffle_hint
    }

    pub fn clear_shuffle_hint(&mut self) {
        self.shuffle_hint = None;
    }

    // ===== Navigation =====

    /// Compute the next playback position under the active loop mode.
    ///
    /// `None` means "stop, do not advance": either no playable track exists,
    /// or loop mode `Off` reached the forward boundary.
    pub fn next_position(&self, entitlements: &Entitlements) -> Option<Position> {
        if !self.has_playable(entitlements) {
            debug!("no playable track in queue");
            return None;
        }

        let Some(current) = self.current else {
            // No selection yet: start at the first playable slot.
            return self.playable_positions(entitlements).into_iter().next();
        };

        match self.loop_mode {
            LoopMode::Single => Some(current),

            LoopMode::Shuffle => self
                .shuffle_hint
                .or_else(|| self.random_playable(entitlements)),

            LoopMode::Album => {
                let list = self.playable_positions_in(current.album, entitlements);
                let index = list.iter().position(|p| *p == current).unwrap_or(0);
                if index + 1 < list.len() {
                    Some(list[index + 1])
                } else {
                    // Boundary: wrap to the start of this same album.
                    list.first().copied()
                }
            }

            LoopMode::Order => {
                let list = self.playable_positions(entitlements);
                let index = list.iter().position(|p| *p == current).unwrap_or(0);
                if index + 1 < list.len() {
                    Some(list[index + 1])
                } else {
                    list.first().copied()
                }
            }

            LoopMode::Off => {
                let list = self.playable_positions(entitlements);
                let index = list.iter().position(|p| *p == current).unwrap_or(0);
                if index + 1 < list.len() {
                    Some(list[index + 1])
                } else {
                    // Forward boundary without loop: stop.
                    None
                }
            }
        }
    }

    /// Compute the previous playback position under the active loop mode.
    ///
    /// Backward navigation wraps in every mode except `Shuffle`, which has
    /// no meaningful "previous" and returns a fresh random position.
    pub fn previous_position(&self, entitlements: &Entitlements) -> Option<Position> {
        if !self.has_playable(entitlements) {
            debug!("no playable track in queue");
            return None;
        }

        let Some(current) = self.current else {
            return self.playable_positions(entitlements).into_iter().next();
        };

        match self.loop_mode {
            LoopMode::Single => Some(current),

            LoopMode::Shuffle => self.random_playable(entitlements),

            LoopMode::Album => {
                let list = self.playable_positions_in(current.album, entitlements);
                let index = list.iter().position(|p| *p == current).unwrap_or(0);
                if index > 0 {
                    Some(list[index - 1])
                } else {
                    list.last().copied()
                }
            }

            LoopMode::Order | LoopMode::Off => {
                let list = self.playable_positions(entitlements);
                let index = list.iter().position(|p| *p == current).unwrap_or(0);
                if index > 0 {
                    Some(list[index - 1])
                } else {
                    list.last().copied()
                }
            }
        }
    }

    // ===== History =====

    /// Record a playback that actually started. Requested-but-never-played
    /// positions are never recorded.
    pub fn push_history(&mut self, entry: HistoryEntry) {
        self.history.push(entry);
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    pub fn last_history(&self) -> Option<&HistoryEntry> {
        self.history.last()
    }
}
