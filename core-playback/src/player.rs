//! Player state machine.
//!
//! [`BgmPlayer`] accepts navigation commands, asks the queue for target
//! positions, drives the [`TrackResolver`], hands resolved bytes to the host
//! [`AudioEngine`], and publishes status transitions to its delegate and the
//! event bus.
//!
//! ## Concurrency model
//!
//! All queue and status state lives in one `tokio::sync::Mutex<PlayerCore>`
//! — the single logical control sequence. The lock is NOT held across the
//! resolver suspension; a newer load may take the current position while an
//! older resolution is in flight. The only authority for "is this result
//! still relevant" is comparing the resolved track's id against the live
//! current track at the moment the resolution completes — never completion
//! order, and never cancellation alone (cancellation of async work is
//! best-effort).

use crate::config::PlayerConfig;
use crate::error::{PlayerError, QueueError, ResolutionError, Result};
use crate::model::{
    Album, Entitlements, FadeMode, HistoryEntry, LoopMode, PlayDirection, PlayerStatus, Position,
    Track, TrackId, TrackStatus,
};
use crate::queue::PlaybackQueue;
use crate::resolver::TrackResolver;
use bridge_traits::audio::{AudioEngine, EngineEvent, PreparedHandle};
use core_runtime::events::{CoreEvent, EventBus, PlayerEvent, QueueEvent, RecvError};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

/// Observer hooks for the player.
///
/// Every method has a default no-op body; implementors override only what
/// they need. Callbacks are invoked synchronously on the player's control
/// flow and must not call back into the player.
pub trait PlayerDelegate: Send + Sync {
    /// Veto or redirect a load request. Returning `None` cancels the load;
    /// returning a different position redirects it (e.g. "confirm before
    /// switching while downloading").
    fn should_play(&self, requested: Position, current: Option<Position>) -> Option<Position> {
        let _ = current;
        Some(requested)
    }

    /// The player committed to the position and is about to resolve it.
    fn will_play(&self, position: Position) {
        let _ = position;
    }

    /// Playback of the position actually started.
    fn did_start_playing(&self, position: Position) {
        let _ = position;
    }

    /// The player status changed.
    fn status_changed(&self, status: PlayerStatus) {
        let _ = status;
    }

    /// A playback command failed. `position` is the position the failure
    /// relates to, when one was determined.
    fn playback_failed(&self, position: Option<Position>, error: &PlayerError) {
        let _ = (position, error);
    }
}

/// Mutable player state guarded by the control-sequence mutex.
struct PlayerCore {
    queue: PlaybackQueue,
    status: PlayerStatus,
    enabled: bool,
    entitlements: Entitlements,
    volume: f32,
    fade_mode: FadeMode,
    /// Set after the first fade of the session; caller-resettable.
    is_faded: bool,
    /// Prepared item currently held by the engine.
    engine_handle: Option<PreparedHandle>,
    /// Track the engine handle was built from.
    loaded_track: Option<TrackId>,
    /// Track with a resolution in flight on behalf of this player.
    resolving: Option<TrackId>,
    last_direction: PlayDirection,
}

/// Background-music player: queue + state machine + resolution.
pub struct BgmPlayer {
    core: Mutex<PlayerCore>,
    engine: Arc<dyn AudioEngine>,
    resolver: Arc<TrackResolver>,
    events: EventBus,
    delegate: parking_lot::RwLock<Option<Arc<dyn PlayerDelegate>>>,
    config: PlayerConfig,
}

impl BgmPlayer {
    /// Create a player.
    ///
    /// # Errors
    ///
    /// Returns [`PlayerError::InvalidConfig`] when the configuration fails
    /// validation.
    pub fn new(
        config: PlayerConfig,
        engine: Arc<dyn AudioEngine>,
        resolver: Arc<TrackResolver>,
        events: EventBus,
    ) -> Result<Arc<Self>> {
        config.validate().map_err(PlayerError::InvalidConfig)?;

        Ok(Arc::new(Self {
            core: Mutex::new(PlayerCore {
                queue: PlaybackQueue::new(),
                status: PlayerStatus::Stopped,
                enabled: true,
                entitlements: Entitlements::default(),
                volume: 1.0,
                fade_mode: config.fade_mode,
                is_faded: false,
                engine_handle: None,
                loaded_track: None,
                resolving: None,
                last_direction: PlayDirection::Next,
            }),
            engine,
            resolver,
            events,
            delegate: parking_lot::RwLock::new(None),
            config,
        }))
    }

    /// Spawn the task that consumes engine events (finished / decode error)
    /// to drive auto-advance and error transitions. Call once after
    /// construction.
    pub fn start_engine_listener(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let player = Arc::clone(self);
        let mut rx = player.engine.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => player.handle_engine_event(event).await,
                    Err(RecvError::Lagged(missed)) => {
                        warn!(missed, "engine event stream lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }

    // ===== Observers =====

    pub fn set_delegate(&self, delegate: Option<Arc<dyn PlayerDelegate>>) {
        *self.delegate.write() = delegate;
    }

    fn delegate(&self) -> Option<Arc<dyn PlayerDelegate>> {
        self.delegate.read().clone()
    }

    // ===== State queries =====

    pub async fn status(&self) -> PlayerStatus {
        self.core.lock().await.status
    }

    pub async fn current_position(&self) -> Option<Position> {
        self.core.lock().await.queue.current()
    }

    pub async fn current_track(&self) -> Option<Track> {
        self.core.lock().await.queue.current_track().cloned()
    }

    pub async fn track_at(&self, position: Position) -> Option<Track> {
        self.core.lock().await.queue.track(position).cloned()
    }

    pub async fn albums(&self) -> Vec<Album> {
        self.core.lock().await.queue.albums().to_vec()
    }

    pub async fn history(&self) -> Vec<HistoryEntry> {
        self.core.lock().await.queue.history().to_vec()
    }

    pub async fn loop_mode(&self) -> LoopMode {
        self.core.lock().await.queue.loop_mode()
    }

    pub async fn set_loop_mode(&self, mode: LoopMode) {
        self.core.lock().await.queue.set_loop_mode(mode);
    }

    pub async fn last_play_direction(&self) -> PlayDirection {
        self.core.lock().await.last_direction
    }

    pub async fn playable_count(&self) -> usize {
        let core = self.core.lock().await;
        core.queue.playable_count(&core.entitlements)
    }

    pub async fn is_enabled(&self) -> bool {
        self.core.lock().await.enabled
    }

    pub async fn set_enabled(&self, enabled: bool) {
        self.core.lock().await.enabled = enabled;
    }

    /// Inject the caller's entitlement state consulted by navigation.
    pub async fn set_entitlements(&self, entitlements: Entitlements) {
        self.core.lock().await.entitlements = entitlements;
    }

    pub async fn volume(&self) -> f32 {
        self.core.lock().await.volume
    }

    /// Set the output volume, applying it to the engine when an item is
    /// loaded.
    pub async fn set_volume(&self, volume: f32) {
        let volume = volume.clamp(0.0, 1.0);
        let handle = {
            let mut core = self.core.lock().await;
            core.volume = volume;
            core.engine_handle
        };
        if let Some(handle) = handle {
            self.engine.set_volume(&handle, volume, None).await.ok();
        }
    }

    pub async fn fade_mode(&self) -> FadeMode {
        self.core.lock().await.fade_mode
    }

    pub async fn set_fade_mode(&self, mode: FadeMode) {
        self.core.lock().await.fade_mode = mode;
    }

    /// Reset the per-session "already faded" flag so the next start ramps
    /// again under [`FadeMode::RampOnce`].
    pub async fn reset_faded_flag(&self) {
        self.core.lock().await.is_faded = false;
    }

    // ===== Queue management =====

    /// Replace the whole collection.
    ///
    /// The current position is re-located by the previously playing track's
    /// id; history is cleared; an existing shuffle hint is recomputed.
    pub async fn reload(&self, albums: Vec<Album>) {
        let (album_count, track_count, hint_before, hint_after) = {
            let mut core = self.core.lock().await;
            let hint_before = core.queue.shuffle_hint();
            let entitlements = core.entitlements;
            core.queue
                .reload(albums, &entitlements, self.config.select_first_on_reload);
            (
                core.queue.album_count(),
                core.queue.track_count(),
                hint_before,
                core.queue.shuffle_hint(),
            )
        };

        self.emit(CoreEvent::Queue(QueueEvent::Reloaded {
            album_count,
            track_count,
        }));
        self.emit_hint_change(hint_before, hint_after);
    }

    /// Insert an album at `index`. Out-of-range is a logged no-op.
    pub async fn insert_album(&self, index: usize, album: Album) -> bool {
        let album_id = album.id;
        let (inserted, hint_before, hint_after) = {
            let mut core = self.core.lock().await;
            let hint_before = core.queue.shuffle_hint();
            let inserted = core.queue.insert_album(index, album);
            (inserted, hint_before, core.queue.shuffle_hint())
        };

        if inserted {
            self.emit(CoreEvent::Queue(QueueEvent::AlbumInserted {
                album_id,
                index,
            }));
            self.emit_hint_change(hint_before, hint_after);
        }
        inserted
    }

    /// Remove the album at `index`. Out-of-range is a logged no-op.
    pub async fn remove_album(&self, index: usize) -> bool {
        let (removed, hint_before, hint_after) = {
            let mut core = self.core.lock().await;
            let hint_before = core.queue.shuffle_hint();
            let removed = core.queue.remove_album(index);
            (removed, hint_before, core.queue.shuffle_hint())
        };

        match removed {
            Some(album) => {
                self.emit(CoreEvent::Queue(QueueEvent::AlbumRemoved {
                    album_id: album.id,
                    index,
                }));
                self.emit_hint_change(hint_before, hint_after);
                true
            }
            None => false,
        }
    }

    /// Refresh one album in place.
    pub async fn replace_album(&self, index: usize, album: Album) -> bool {
        let (replaced, hint_before, hint_after) = {
            let mut core = self.core.lock().await;
            let hint_before = core.queue.shuffle_hint();
            let entitlements = core.entitlements;
            let replaced = core.queue.replace_album(index, album, &entitlements);
            (replaced, hint_before, core.queue.shuffle_hint())
        };
        if replaced {
            self.emit_hint_change(hint_before, hint_after);
        }
        replaced
    }

    pub async fn shuffle_hint(&self) -> Option<Position> {
        self.core.lock().await.queue.shuffle_hint()
    }

    /// Pre-compute a random shuffle target so observers can prefetch it.
    pub async fn preset_shuffle_hint(&self) -> Option<Position> {
        let hint = {
            let mut core = self.core.lock().await;
            let entitlements = core.entitlements;
            core.queue.preset_shuffle_hint(&entitlements)
        };
        self.emit(CoreEvent::Queue(QueueEvent::ShuffleHintChanged {
            hint: hint.map(|p| (p.album, p.track)),
        }));
        hint
    }

    /// Pin the shuffle target explicitly.
    pub async fn set_shuffle_hint(&self, position: Position) -> bool {
        let set = self.core.lock().await.queue.set_shuffle_hint(position);
        if set {
            self.emit(CoreEvent::Queue(QueueEvent::ShuffleHintChanged {
                hint: Some((position.album, position.track)),
            }));
        }
        set
    }

    /// Every queue position holding the given resource id.
    pub async fn positions_of(&self, id: TrackId) -> Vec<Position> {
        self.core.lock().await.queue.positions_of(id)
    }

    /// Move the cursor to the first occurrence of the given track id
    /// without touching playback. Returns whether the id was found.
    pub async fn select_by_id(&self, id: TrackId) -> bool {
        let mut core = self.core.lock().await;
        match core.queue.first_position_of(id) {
            Some(position) => {
                core.queue.set_current(Some(position));
                true
            }
            None => false,
        }
    }

    /// Fan the cache-usage flag out to every track in the queue.
    pub async fn set_use_cache(&self, use_cache: bool) {
        self.core.lock().await.queue.set_use_cache_all(use_cache);
    }

    /// Run a read-only closure against the queue and entitlements under the
    /// control lock.
    pub(crate) async fn with_queue<R>(
        &self,
        f: impl FnOnce(&PlaybackQueue, &Entitlements) -> R,
    ) -> R {
        let core = self.core.lock().await;
        f(&core.queue, &core.entitlements)
    }

    // ===== Playback commands =====

    /// Advance to the next position under the active loop mode.
    #[instrument(skip(self))]
    pub async fn next(&self) -> Result<()> {
        let (target, hint_before) = {
            let mut core = self.core.lock().await;
            core.last_direction = PlayDirection::Next;
            let entitlements = core.entitlements;
            let target = core.queue.next_position(&entitlements);
            let hint_before = core.queue.shuffle_hint();
            if target.is_some() {
                // The hinted position is consumed by this advance.
                core.queue.clear_shuffle_hint();
            }
            (target, hint_before)
        };

        if target.is_some() {
            self.emit_hint_change(hint_before, None);
        }

        match target {
            Some(position) => self.load(position, true).await,
            None => self.handle_no_playable().await,
        }
    }

    /// Retreat to the previous position under the active loop mode.
    #[instrument(skip(self))]
    pub async fn previous(&self) -> Result<()> {
        let target = {
            let mut core = self.core.lock().await;
            core.last_direction = PlayDirection::Previous;
            let entitlements = core.entitlements;
            core.queue.previous_position(&entitlements)
        };

        match target {
            Some(position) => self.load(position, true).await,
            None => self.handle_no_playable().await,
        }
    }

    /// Play an explicitly addressed position, ignoring the loop mode.
    #[instrument(skip(self))]
    pub async fn play_at(&self, position: Position) -> Result<()> {
        {
            let mut core = self.core.lock().await;
            core.last_direction = PlayDirection::Specified;
            if !core.queue.is_valid(position) {
                drop(core);
                let err = PlayerError::Queue(QueueError::InvalidPosition(position));
                self.notify_failure(Some(position), None, &err);
                return Err(err);
            }
        }
        self.load(position, true).await
    }

    /// Load a position without starting playback.
    pub async fn load_at(&self, position: Position) -> Result<()> {
        {
            let mut core = self.core.lock().await;
            core.last_direction = PlayDirection::Specified;
            if !core.queue.is_valid(position) {
                drop(core);
                let err = PlayerError::Queue(QueueError::InvalidPosition(position));
                self.notify_failure(Some(position), None, &err);
                return Err(err);
            }
        }
        self.load(position, false).await
    }

    /// Start or resume playback.
    ///
    /// No-op when already playing. With a prepared item, resumes it; with
    /// nothing loaded, behaves like [`next`](Self::next).
    pub async fn play(&self) -> Result<()> {
        let (status, has_handle, position) = {
            let core = self.core.lock().await;
            (core.status, core.engine_handle.is_some(), core.queue.current())
        };

        if status == PlayerStatus::Playing {
            debug!("ignoring play, already playing");
            return Ok(());
        }

        match (has_handle, position) {
            (true, Some(position)) => self.start_playback(position).await,
            _ => self.next().await,
        }
    }

    /// Pause playback. No-op unless currently playing.
    pub async fn pause(&self) {
        let (handle, track_id) = {
            let core = self.core.lock().await;
            if core.status != PlayerStatus::Playing {
                debug!("ignoring pause, not playing");
                return;
            }
            (core.engine_handle, core.loaded_track)
        };

        if let Some(handle) = handle {
            self.engine.pause(&handle).await.ok();
        }

        {
            let mut core = self.core.lock().await;
            core.status = PlayerStatus::Paused;
            if let Some(id) = track_id {
                core.queue.set_status_by_id(id, TrackStatus::Paused);
            }
        }
        self.notify_status(PlayerStatus::Paused);
    }

    /// Stop playback. Always succeeds: releases the prepared item, cancels
    /// any in-flight resolution, and clears the current position.
    pub async fn stop(&self) {
        let (handle, resolving, current_id) = {
            let mut core = self.core.lock().await;
            let current_id = core.queue.current_track().map(|t| t.res_id);
            core.status = PlayerStatus::Stopped;
            core.queue.set_current(None);
            core.loaded_track = None;
            if let Some(id) = current_id {
                core.queue.set_status_by_id(id, TrackStatus::Stopped);
            }
            (core.engine_handle.take(), core.resolving.take(), current_id)
        };

        if let Some(id) = resolving {
            self.resolver.cancel(id);
        }
        if let Some(handle) = handle {
            self.engine.stop(&handle).await.ok();
        }

        debug!(track_id = ?current_id, "player stopped");
        self.notify_status(PlayerStatus::Stopped);
    }

    // ===== Load pipeline =====

    /// Load position `requested`; `auto_play` starts playback on success.
    ///
    /// Delegate consultation, slot takeover, resolution, staleness
    /// verification, hand-off to the engine.
    #[instrument(skip(self), fields(position = %requested))]
    pub async fn load(&self, requested: Position, auto_play: bool) -> Result<()> {
        // Preflight: enabled check and same-track fast path.
        {
            let mut core = self.core.lock().await;
            if !core.enabled {
                drop(core);
                warn!("load rejected, player is disabled");
                let err = PlayerError::Disabled;
                self.notify_failure(Some(requested), None, &err);
                return Err(err);
            }

            let Some(track) = core.queue.track(requested) else {
                drop(core);
                let err = PlayerError::Queue(QueueError::InvalidPosition(requested));
                self.notify_failure(Some(requested), None, &err);
                return Err(err);
            };
            let requested_id = track.res_id;

            if core.loaded_track == Some(requested_id)
                && core.engine_handle.is_some()
                && core.queue.loop_mode() != LoopMode::Single
            {
                // Same file is already prepared: position update only, no
                // re-download, no re-decode.
                debug!(track_id = requested_id, "same track requested, updating position");
                core.queue.set_current(Some(requested));
                return Ok(());
            }
        }

        // Delegate may veto or redirect the request.
        let current = self.core.lock().await.queue.current();
        let target = match self.delegate() {
            Some(delegate) => delegate.should_play(requested, current),
            None => Some(requested),
        };
        let Some(target) = target else {
            debug!("delegate vetoed load");
            let err = PlayerError::Queue(QueueError::NoPlayableItem);
            self.notify_failure(None, None, &err);
            return Err(err);
        };

        // Take the slot: stop what is playing, record the new current
        // position, enter Preparing.
        let (track, prev_handle, prior_resolving) = {
            let mut core = self.core.lock().await;
            let Some(track) = core.queue.track(target).cloned() else {
                drop(core);
                let err = PlayerError::Queue(QueueError::InvalidPosition(target));
                self.notify_failure(Some(target), None, &err);
                return Err(err);
            };

            let prev_handle = core.engine_handle.take();
            let prev_loaded = core.loaded_track.take();
            let prior_resolving = core.resolving.replace(track.res_id);

            core.queue.set_current(Some(target));
            core.status = PlayerStatus::Preparing;
            if let Some(prev_id) = prev_loaded {
                if prev_id != track.res_id {
                    core.queue.set_status_by_id(prev_id, TrackStatus::Stopped);
                }
            }
            (track, prev_handle, prior_resolving)
        };

        info!(track_id = track.res_id, position = %target, name = %track.display_name, "loading track");

        // A newer load supersedes the older in-flight resolution.
        if let Some(prior) = prior_resolving {
            if prior != track.res_id {
                self.resolver.cancel(prior);
            }
        }
        if let Some(handle) = prev_handle {
            self.engine.stop(&handle).await.ok();
        }

        self.notify_status(PlayerStatus::Preparing);
        if let Some(delegate) = self.delegate() {
            delegate.will_play(target);
        }
        self.broadcast_track_status(track.res_id, TrackStatus::Downloading)
            .await;

        // Suspension point: the control lock is NOT held here.
        let resolved = self.resolver.resolve(&track).await;

        {
            let mut core = self.core.lock().await;
            if core.resolving == Some(track.res_id) {
                core.resolving = None;
            }
        }

        let bytes = match resolved {
            Ok(bytes) => bytes,
            Err(err) => return Err(self.fail_load(target, track.res_id, err.into()).await),
        };

        // Verify the result is still relevant before touching the engine.
        if !self.is_still_current(track.res_id).await {
            debug!(track_id = track.res_id, "resolution superseded, discarding result");
            self.broadcast_track_status(track.res_id, TrackStatus::Stopped)
                .await;
            return Err(PlayerError::Superseded);
        }
        self.broadcast_track_status(track.res_id, TrackStatus::Preparing)
            .await;

        let handle = match self.engine.load(bytes).await {
            Ok(handle) => handle,
            Err(e) => {
                return Err(self
                    .fail_load(target, track.res_id, PlayerError::Engine(e.to_string()))
                    .await)
            }
        };

        // Re-verify: the engine hand-off itself suspended.
        let auto = {
            let mut core = self.core.lock().await;
            let still_current =
                core.queue.current_track().map(|t| t.res_id) == Some(track.res_id);
            if !still_current {
                drop(core);
                self.engine.stop(&handle).await.ok();
                self.broadcast_track_status(track.res_id, TrackStatus::Stopped)
                    .await;
                return Err(PlayerError::Superseded);
            }

            core.engine_handle = Some(handle);
            core.loaded_track = Some(track.res_id);
            // Only a playback that actually got this far enters history.
            core.queue.push_history(HistoryEntry::new(&track, target));
            auto_play && core.status == PlayerStatus::Preparing
        };

        if auto {
            self.start_playback(target).await
        } else {
            {
                let mut core = self.core.lock().await;
                core.status = PlayerStatus::Paused;
                core.queue.set_status_by_id(track.res_id, TrackStatus::Paused);
            }
            self.notify_status(PlayerStatus::Paused);
            Ok(())
        }
    }

    /// Begin audible playback of the prepared item, applying the fade mode.
    async fn start_playback(&self, position: Position) -> Result<()> {
        let (handle, track_id, fade, volume) = {
            let mut core = self.core.lock().await;
            let Some(handle) = core.engine_handle else {
                let err = PlayerError::Engine("no prepared item to play".to_string());
                drop(core);
                self.notify_failure(Some(position), None, &err);
                return Err(err);
            };
            let fade = match core.fade_mode {
                FadeMode::Off => None,
                FadeMode::RampOnce(d) => (!core.is_faded).then_some(d),
                FadeMode::RampEachTime(d) => Some(d),
            };
            core.is_faded = true;
            (handle, core.loaded_track, fade, core.volume)
        };

        if let Some(duration) = fade {
            self.engine.set_volume(&handle, 0.0, None).await.ok();
            if let Err(e) = self.engine.play(&handle).await {
                let err = PlayerError::Engine(e.to_string());
                return Err(self.fail_start(position, track_id, err).await);
            }
            self.engine
                .set_volume(&handle, volume, Some(duration))
                .await
                .ok();
        } else {
            self.engine.set_volume(&handle, volume, None).await.ok();
            if let Err(e) = self.engine.play(&handle).await {
                let err = PlayerError::Engine(e.to_string());
                return Err(self.fail_start(position, track_id, err).await);
            }
        }

        {
            let mut core = self.core.lock().await;
            core.status = PlayerStatus::Playing;
            if let Some(id) = track_id {
                core.queue.set_status_by_id(id, TrackStatus::Playing);
            }
        }

        info!(position = %position, track_id = ?track_id, "playback started");
        self.notify_status(PlayerStatus::Playing);
        if let Some(delegate) = self.delegate() {
            delegate.did_start_playing(position);
        }
        if let Some(id) = track_id {
            self.emit(CoreEvent::Player(PlayerEvent::Started {
                track_id: id,
                album_index: position.album,
                track_index: position.track,
            }));
        }
        Ok(())
    }

    // ===== Failure paths =====

    /// Apply a load failure's side effects only when the failing position is
    /// still current; stale failures are swallowed as superseded.
    async fn fail_load(
        &self,
        position: Position,
        track_id: TrackId,
        err: PlayerError,
    ) -> PlayerError {
        if !self.is_still_current(track_id).await {
            debug!(track_id, error = %err, "stale load failure, swallowing");
            self.broadcast_track_status(track_id, TrackStatus::Stopped)
                .await;
            return PlayerError::Superseded;
        }

        // A rejected duplicate request leaves the track merely stopped; real
        // failures mark it errored.
        let track_status = match &err {
            PlayerError::Resolution(ResolutionError::AlreadyInProgress(_)) => TrackStatus::Stopped,
            _ => TrackStatus::Error,
        };

        {
            let mut core = self.core.lock().await;
            core.status = PlayerStatus::Error;
            core.queue.set_status_by_id(track_id, track_status);
        }

        warn!(track_id, error = %err, "load failed");
        self.notify_status(PlayerStatus::Error);
        self.notify_failure(Some(position), Some(track_id), &err);
        err
    }

    async fn fail_start(
        &self,
        position: Position,
        track_id: Option<TrackId>,
        err: PlayerError,
    ) -> PlayerError {
        {
            let mut core = self.core.lock().await;
            core.status = PlayerStatus::Error;
            if let Some(id) = track_id {
                core.queue.set_status_by_id(id, TrackStatus::Error);
            }
        }
        self.notify_status(PlayerStatus::Error);
        self.notify_failure(Some(position), track_id, &err);
        err
    }

    /// Navigation found nothing playable: stop and report.
    async fn handle_no_playable(&self) -> Result<()> {
        warn!("no playable item, stopping");
        self.stop().await;
        let err = PlayerError::Queue(QueueError::NoPlayableItem);
        self.notify_failure(None, None, &err);
        Err(err)
    }

    // ===== Engine events =====

    async fn handle_engine_event(&self, event: EngineEvent) {
        match event {
            EngineEvent::PlaybackFinished { handle } => {
                let relevant = {
                    let core = self.core.lock().await;
                    core.engine_handle == Some(handle)
                };
                if !relevant {
                    debug!(%handle, "ignoring finish event for stale handle");
                    return;
                }

                {
                    let mut core = self.core.lock().await;
                    core.status = PlayerStatus::Finished;
                }
                self.notify_status(PlayerStatus::Finished);

                // Auto-advance; loop mode Off stops at the boundary.
                if let Err(e) = self.next().await {
                    debug!(error = %e, "auto-advance ended");
                }
            }
            EngineEvent::DecodeError { handle, message } => {
                let (relevant, position, track_id) = {
                    let core = self.core.lock().await;
                    (
                        core.engine_handle == Some(handle),
                        core.queue.current(),
                        core.queue.current_track().map(|t| t.res_id),
                    )
                };
                if !relevant {
                    debug!(%handle, "ignoring decode error for stale handle");
                    return;
                }

                {
                    let mut core = self.core.lock().await;
                    core.status = PlayerStatus::Error;
                    if let Some(id) = track_id {
                        core.queue.set_status_by_id(id, TrackStatus::Error);
                    }
                }
                self.notify_status(PlayerStatus::Error);
                self.notify_failure(position, track_id, &PlayerError::Engine(message));
            }
        }
    }

    // ===== Helpers =====

    async fn is_still_current(&self, track_id: TrackId) -> bool {
        let core = self.core.lock().await;
        core.queue.current_track().map(|t| t.res_id) == Some(track_id)
    }

    async fn broadcast_track_status(&self, track_id: TrackId, status: TrackStatus) {
        let mut core = self.core.lock().await;
        core.queue.set_status_by_id(track_id, status);
    }

    fn notify_status(&self, status: PlayerStatus) {
        if let Some(delegate) = self.delegate() {
            delegate.status_changed(status);
        }
        self.emit(CoreEvent::Player(PlayerEvent::StatusChanged {
            status: status.as_str().to_string(),
        }));
    }

    fn notify_failure(
        &self,
        position: Option<Position>,
        track_id: Option<TrackId>,
        error: &PlayerError,
    ) {
        // Supersession is an internal outcome, never a user-visible failure.
        if error.is_superseded() {
            return;
        }
        if let Some(delegate) = self.delegate() {
            delegate.playback_failed(position, error);
        }
        self.emit(CoreEvent::Player(PlayerEvent::Failed {
            track_id,
            message: error.to_string(),
        }));
    }

    fn emit(&self, event: CoreEvent) {
        self.events.emit(event).ok();
    }

    fn emit_hint_change(&self, before: Option<Position>, after: Option<Position>) {
        if before != after {
            self.emit(CoreEvent::Queue(QueueEvent::ShuffleHintChanged {
                hint: after.map(|p| (p.album, p.track)),
            }));
        }
    }
}

impl std::fmt::Debug for BgmPlayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BgmPlayer")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
