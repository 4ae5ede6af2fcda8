//! Tests for the player state machine: navigation commands, the load
//! pipeline, supersession races, fades, auto-advance, and delegate hooks.

use async_trait::async_trait;
use bridge_traits::audio::{AudioEngine, EngineEvent, PreparedHandle};
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::http::{DownloadStream, HttpClient, HttpRequest, HttpResponse};
use bridge_traits::storage::{FileMetadata, FileSystemAccess};
use bytes::Bytes;
use core_playback::{
    Album, BgmPlayer, FadeMode, FileCache, LoopMode, PlayerConfig, PlayerDelegate, PlayerError,
    PlayerSettings, PlayerStatus, Position, QueueError, Track, TrackResolver, TrackStatus,
};
use core_runtime::events::{CoreEvent, EventBus, PlayerEvent, QueueEvent};
use futures_util::StreamExt;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;

// ============================================================================
// Mock FileSystemAccess Implementation
// ============================================================================

#[derive(Default)]
struct MemoryFileSystem {
    files: Mutex<HashMap<PathBuf, Bytes>>,
}

#[async_trait]
impl FileSystemAccess for MemoryFileSystem {
    async fn get_cache_directory(&self) -> BridgeResult<PathBuf> {
        Ok(PathBuf::from("/cache"))
    }

    async fn get_data_directory(&self) -> BridgeResult<PathBuf> {
        Ok(PathBuf::from("/data"))
    }

    async fn exists(&self, path: &Path) -> BridgeResult<bool> {
        Ok(self.files.lock().unwrap().contains_key(path))
    }

    async fn metadata(&self, path: &Path) -> BridgeResult<FileMetadata> {
        let files = self.files.lock().unwrap();
        let data = files
            .get(path)
            .ok_or_else(|| BridgeError::OperationFailed("no such file".to_string()))?;
        Ok(FileMetadata {
            size: data.len() as u64,
            modified_at: None,
            is_directory: false,
        })
    }

    async fn create_dir_all(&self, _path: &Path) -> BridgeResult<()> {
        Ok(())
    }

    async fn read_file(&self, path: &Path) -> BridgeResult<Bytes> {
        self.files
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| BridgeError::OperationFailed("no such file".to_string()))
    }

    async fn write_file(&self, path: &Path, data: Bytes) -> BridgeResult<()> {
        self.files.lock().unwrap().insert(path.to_path_buf(), data);
        Ok(())
    }

    async fn delete_file(&self, path: &Path) -> BridgeResult<()> {
        self.files
            .lock()
            .unwrap()
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| BridgeError::OperationFailed("no such file".to_string()))
    }
}

// ============================================================================
// Mock HttpClient Implementation
// ============================================================================

/// Serves per-URL bodies as chunked streams with per-URL delays.
#[derive(Default)]
struct MockHttpClient {
    bodies: Mutex<HashMap<String, (Bytes, Duration)>>,
    calls: AtomicUsize,
}

impl MockHttpClient {
    fn serve(&self, url: &str, body: &[u8]) {
        self.serve_slow(url, body, Duration::ZERO);
    }

    fn serve_slow(&self, url: &str, body: &[u8], chunk_delay: Duration) {
        self.bodies.lock().unwrap().insert(
            url.to_string(),
            (Bytes::copy_from_slice(body), chunk_delay),
        );
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HttpClient for MockHttpClient {
    async fn execute(&self, _request: HttpRequest) -> BridgeResult<HttpResponse> {
        Err(BridgeError::NotAvailable("not used by these tests".to_string()))
    }

    async fn download_stream(&self, url: &str) -> BridgeResult<DownloadStream> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let (body, delay) = self
            .bodies
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| BridgeError::OperationFailed(format!("404: {}", url)))?;

        let chunks: Vec<BridgeResult<Bytes>> = body
            .chunks(256)
            .map(|c| Ok(Bytes::copy_from_slice(c)))
            .collect();

        let stream = futures_util::stream::iter(chunks)
            .then(move |chunk| async move {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                chunk
            })
            .boxed();

        Ok(DownloadStream {
            total_bytes: Some(body.len() as u64),
            stream,
        })
    }
}

// ============================================================================
// Mock AudioEngine Implementation
// ============================================================================

struct MockEngine {
    tx: broadcast::Sender<EngineEvent>,
    handles: Mutex<Vec<PreparedHandle>>,
    commands: Mutex<Vec<String>>,
    fail_load: AtomicBool,
}

impl MockEngine {
    fn new() -> Arc<Self> {
        let (tx, _) = broadcast::channel(64);
        Arc::new(Self {
            tx,
            handles: Mutex::new(Vec::new()),
            commands: Mutex::new(Vec::new()),
            fail_load: AtomicBool::new(false),
        })
    }

    fn loaded_count(&self) -> usize {
        self.handles.lock().unwrap().len()
    }

    fn last_handle(&self) -> Option<PreparedHandle> {
        self.handles.lock().unwrap().last().copied()
    }

    fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }

    fn command_count(&self, name: &str) -> usize {
        self.commands
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.as_str() == name)
            .count()
    }

    fn set_fail_load(&self, fail: bool) {
        self.fail_load.store(fail, Ordering::SeqCst);
    }

    /// Emit "finished playing" for the most recently loaded item.
    fn finish_current(&self) {
        if let Some(handle) = self.last_handle() {
            self.tx.send(EngineEvent::PlaybackFinished { handle }).ok();
        }
    }

    fn fail_decode(&self, message: &str) {
        if let Some(handle) = self.last_handle() {
            self.tx
                .send(EngineEvent::DecodeError {
                    handle,
                    message: message.to_string(),
                })
                .ok();
        }
    }
}

#[async_trait]
impl AudioEngine for MockEngine {
    async fn load(&self, data: Bytes) -> BridgeResult<PreparedHandle> {
        if self.fail_load.load(Ordering::SeqCst) {
            return Err(BridgeError::OperationFailed("unparsable media".to_string()));
        }
        let handle = PreparedHandle::new();
        self.handles.lock().unwrap().push(handle);
        self.commands
            .lock()
            .unwrap()
            .push(format!("load {}B", data.len()));
        Ok(handle)
    }

    async fn play(&self, _handle: &PreparedHandle) -> BridgeResult<()> {
        self.commands.lock().unwrap().push("play".to_string());
        Ok(())
    }

    async fn pause(&self, _handle: &PreparedHandle) -> BridgeResult<()> {
        self.commands.lock().unwrap().push("pause".to_string());
        Ok(())
    }

    async fn stop(&self, _handle: &PreparedHandle) -> BridgeResult<()> {
        self.commands.lock().unwrap().push("stop".to_string());
        Ok(())
    }

    async fn set_volume(
        &self,
        _handle: &PreparedHandle,
        volume: f32,
        fade: Option<Duration>,
    ) -> BridgeResult<()> {
        self.commands
            .lock()
            .unwrap()
            .push(format!("volume {:.1} fade={}", volume, fade.is_some()));
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.tx.subscribe()
    }
}

// ============================================================================
// Recording delegate
// ============================================================================

#[derive(Default)]
struct RecordingDelegate {
    veto: AtomicBool,
    redirect: Mutex<Option<Position>>,
    statuses: Mutex<Vec<PlayerStatus>>,
    started: Mutex<Vec<Position>>,
    failures: Mutex<Vec<(Option<Position>, String)>>,
}

impl RecordingDelegate {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn statuses(&self) -> Vec<PlayerStatus> {
        self.statuses.lock().unwrap().clone()
    }

    fn started(&self) -> Vec<Position> {
        self.started.lock().unwrap().clone()
    }

    fn failures(&self) -> Vec<(Option<Position>, String)> {
        self.failures.lock().unwrap().clone()
    }
}

impl PlayerDelegate for RecordingDelegate {
    fn should_play(&self, requested: Position, _current: Option<Position>) -> Option<Position> {
        if self.veto.load(Ordering::SeqCst) {
            return None;
        }
        Some(self.redirect.lock().unwrap().unwrap_or(requested))
    }

    fn did_start_playing(&self, position: Position) {
        self.started.lock().unwrap().push(position);
    }

    fn status_changed(&self, status: PlayerStatus) {
        self.statuses.lock().unwrap().push(status);
    }

    fn playback_failed(&self, position: Option<Position>, error: &PlayerError) {
        self.failures
            .lock()
            .unwrap()
            .push((position, error.to_string()));
    }
}

// ============================================================================
// Harness
// ============================================================================

struct Harness {
    player: Arc<BgmPlayer>,
    engine: Arc<MockEngine>,
    http: Arc<MockHttpClient>,
    events: EventBus,
    delegate: Arc<RecordingDelegate>,
}

fn url_for(id: i64) -> String {
    format!("https://cdn.example.com/media/{}.mp3", id)
}

fn track(id: i64) -> Track {
    Track::new(id, url_for(id), format!("Track {}", id))
}

fn pos(album: usize, track: usize) -> Position {
    Position::new(album, track)
}

/// Queue = [AlbumA: [T1, T2], AlbumB: [T3]], every track served instantly.
fn standard_albums() -> Vec<Album> {
    vec![
        Album::new(1, "A", vec![track(1), track(2)]),
        Album::new(2, "B", vec![track(3)]),
    ]
}

async fn harness_with(config: PlayerConfig, albums: Vec<Album>) -> Harness {
    let http = Arc::new(MockHttpClient::default());
    for album in &albums {
        for t in &album.tracks {
            http.serve(t.url.as_deref().unwrap(), format!("bytes-{}", t.res_id).as_bytes());
        }
    }

    let fs = Arc::new(MemoryFileSystem::default());
    let cache = Arc::new(FileCache::new(fs).await.unwrap());
    let events = EventBus::new(4096);
    let resolver = Arc::new(TrackResolver::new(
        http.clone(),
        cache,
        events.clone(),
        config.download_timeout,
    ));
    let engine = MockEngine::new();
    let player = BgmPlayer::new(config, engine.clone(), resolver, events.clone()).unwrap();
    let _listener = player.start_engine_listener();

    let delegate = RecordingDelegate::new();
    player.set_delegate(Some(delegate.clone()));

    player.reload(albums).await;

    Harness {
        player,
        engine,
        http,
        events,
        delegate,
    }
}

async fn harness() -> Harness {
    harness_with(PlayerConfig::default(), standard_albums()).await
}

// ============================================================================
// Basic commands
// ============================================================================

#[tokio::test]
async fn play_at_resolves_and_starts_playback() {
    let h = harness().await;

    h.player.play_at(pos(0, 0)).await.unwrap();

    assert_eq!(h.player.status().await, PlayerStatus::Playing);
    assert_eq!(h.player.current_position().await, Some(pos(0, 0)));
    assert_eq!(h.engine.loaded_count(), 1);
    assert_eq!(h.engine.command_count("play"), 1);
    assert_eq!(h.delegate.started(), vec![pos(0, 0)]);

    // The playback entered history and the track status follows the player.
    let history = h.player.history().await;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].track_id, 1);
    assert_eq!(
        h.player.track_at(pos(0, 0)).await.unwrap().status,
        TrackStatus::Playing
    );
}

#[tokio::test]
async fn order_mode_walks_forward_and_wraps() {
    let h = harness().await;
    h.player.set_loop_mode(LoopMode::Order).await;

    h.player.play_at(pos(0, 1)).await.unwrap();
    h.player.next().await.unwrap();
    assert_eq!(h.player.current_position().await, Some(pos(1, 0)));

    h.player.next().await.unwrap();
    assert_eq!(h.player.current_position().await, Some(pos(0, 0)));

    assert_eq!(h.player.history().await.len(), 3);
}

#[tokio::test]
async fn off_mode_boundary_stops_the_machine() {
    let h = harness().await;
    h.player.set_loop_mode(LoopMode::Off).await;

    h.player.play_at(pos(1, 0)).await.unwrap();
    let err = h.player.next().await.unwrap_err();

    assert!(matches!(
        err,
        PlayerError::Queue(QueueError::NoPlayableItem)
    ));
    assert_eq!(h.player.status().await, PlayerStatus::Stopped);
    assert_eq!(h.player.current_position().await, None);
    assert!(matches!(h.delegate.failures().as_slice(), [(None, _)]));
}

#[tokio::test]
async fn invalid_position_is_reported() {
    let h = harness().await;

    let err = h.player.play_at(pos(7, 0)).await.unwrap_err();

    assert!(matches!(
        err,
        PlayerError::Queue(QueueError::InvalidPosition(_))
    ));
    assert_eq!(h.player.status().await, PlayerStatus::Stopped);
}

#[tokio::test]
async fn disabled_player_rejects_loads() {
    let h = harness().await;
    h.player.set_enabled(false).await;

    let err = h.player.play_at(pos(0, 0)).await.unwrap_err();

    assert!(matches!(err, PlayerError::Disabled));
    assert_eq!(h.engine.loaded_count(), 0);
    assert_eq!(h.delegate.failures().len(), 1);
}

#[tokio::test]
async fn stop_clears_position_and_releases_engine() {
    let h = harness().await;
    h.player.play_at(pos(0, 0)).await.unwrap();

    h.player.stop().await;

    assert_eq!(h.player.status().await, PlayerStatus::Stopped);
    assert_eq!(h.player.current_position().await, None);
    assert_eq!(h.engine.command_count("stop"), 1);
    assert_eq!(
        h.player.track_at(pos(0, 0)).await.unwrap().status,
        TrackStatus::Stopped
    );
}

#[tokio::test]
async fn pause_is_noop_unless_playing_and_resume_works() {
    let h = harness().await;

    // Not playing yet: pause is a no-op.
    h.player.pause().await;
    assert_eq!(h.engine.command_count("pause"), 0);

    h.player.play_at(pos(0, 0)).await.unwrap();
    h.player.pause().await;
    assert_eq!(h.player.status().await, PlayerStatus::Paused);
    assert_eq!(h.engine.command_count("pause"), 1);

    // Second pause changes nothing.
    h.player.pause().await;
    assert_eq!(h.engine.command_count("pause"), 1);

    // Resume without re-resolving.
    h.player.play().await.unwrap();
    assert_eq!(h.player.status().await, PlayerStatus::Playing);
    assert_eq!(h.engine.loaded_count(), 1);
    assert_eq!(h.engine.command_count("play"), 2);
}

#[tokio::test]
async fn play_while_playing_is_a_noop() {
    let h = harness().await;
    h.player.play_at(pos(0, 0)).await.unwrap();

    h.player.play().await.unwrap();

    assert_eq!(h.engine.command_count("play"), 1);
}

#[tokio::test]
async fn play_from_stopped_advances_into_the_queue() {
    let h = harness().await;

    h.player.play().await.unwrap();

    assert_eq!(h.player.current_position().await, Some(pos(0, 0)));
    assert_eq!(h.player.status().await, PlayerStatus::Playing);
}

#[tokio::test]
async fn load_at_prepares_without_autoplay() {
    let h = harness().await;

    h.player.load_at(pos(0, 0)).await.unwrap();

    assert_eq!(h.player.status().await, PlayerStatus::Paused);
    assert_eq!(h.engine.loaded_count(), 1);
    assert_eq!(h.engine.command_count("play"), 0);
    // Prepared playback still enters history once resolution succeeded.
    assert_eq!(h.player.history().await.len(), 1);
}

// ============================================================================
// Same-track and duplicate-id behaviour
// ============================================================================

#[tokio::test]
async fn same_track_request_updates_position_only() {
    // T1 appears in its own album and in a favorites-style album.
    let albums = vec![
        Album::new(1, "A", vec![track(1), track(2)]),
        Album::new(-1, "Favorites", vec![track(1)]),
    ];
    let h = harness_with(PlayerConfig::default(), albums).await;

    h.player.play_at(pos(0, 0)).await.unwrap();
    h.player.play_at(pos(1, 0)).await.unwrap();

    // Same resource id: no re-download, no re-decode, cursor moved.
    assert_eq!(h.player.current_position().await, Some(pos(1, 0)));
    assert_eq!(h.engine.loaded_count(), 1);
    assert_eq!(h.http.calls(), 1);
    assert_eq!(h.player.status().await, PlayerStatus::Playing);
}

#[tokio::test]
async fn single_loop_reloads_the_same_file() {
    let h = harness().await;
    h.player.set_loop_mode(LoopMode::Single).await;

    h.player.play_at(pos(0, 0)).await.unwrap();
    h.player.play_at(pos(0, 0)).await.unwrap();

    // Single loop restarts the file instead of treating it as a no-op;
    // the second resolution is served from cache.
    assert_eq!(h.engine.loaded_count(), 2);
    assert_eq!(h.http.calls(), 1);
}

#[tokio::test]
async fn status_broadcast_covers_duplicate_occurrences() {
    let albums = vec![
        Album::new(1, "A", vec![track(1), track(2)]),
        Album::new(-1, "Favorites", vec![track(1)]),
    ];
    let h = harness_with(PlayerConfig::default(), albums).await;

    h.player.play_at(pos(0, 0)).await.unwrap();

    assert_eq!(
        h.player.track_at(pos(0, 0)).await.unwrap().status,
        TrackStatus::Playing
    );
    assert_eq!(
        h.player.track_at(pos(1, 0)).await.unwrap().status,
        TrackStatus::Playing
    );
}

// ============================================================================
// Delegate hooks
// ============================================================================

#[tokio::test]
async fn delegate_veto_cancels_the_load() {
    let h = harness().await;
    h.delegate.veto.store(true, Ordering::SeqCst);

    let err = h.player.play_at(pos(0, 0)).await.unwrap_err();

    assert!(matches!(
        err,
        PlayerError::Queue(QueueError::NoPlayableItem)
    ));
    assert_eq!(h.engine.loaded_count(), 0);
    assert!(h.delegate.started().is_empty());
}

#[tokio::test]
async fn delegate_redirect_is_honored() {
    let h = harness().await;
    *h.delegate.redirect.lock().unwrap() = Some(pos(0, 1));

    h.player.play_at(pos(0, 0)).await.unwrap();

    assert_eq!(h.player.current_position().await, Some(pos(0, 1)));
    assert_eq!(h.delegate.started(), vec![pos(0, 1)]);
    assert_eq!(h.player.history().await[0].track_id, 2);
}

// ============================================================================
// Supersession
// ============================================================================

#[tokio::test(start_paused = true)]
async fn newer_load_supersedes_older_resolution() {
    let h = harness().await;
    // Make T1 slow to resolve so T2 can overtake it.
    h.http.serve_slow(&url_for(1), &vec![0u8; 4096], Duration::from_millis(50));

    let first = {
        let player = h.player.clone();
        tokio::spawn(async move { player.play_at(pos(0, 0)).await })
    };

    // Give the first load time to enter resolution, then supersede it.
    tokio::time::sleep(Duration::from_millis(20)).await;
    h.player.play_at(pos(0, 1)).await.unwrap();

    let first_result = first.await.unwrap();
    assert!(matches!(first_result, Err(PlayerError::Superseded)));

    // The newer request owns the player; the stale result left no trace.
    assert_eq!(h.player.current_position().await, Some(pos(0, 1)));
    assert_eq!(h.player.status().await, PlayerStatus::Playing);
    assert_eq!(h.engine.loaded_count(), 1);
    assert!(h.delegate.failures().is_empty());

    let history = h.player.history().await;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].track_id, 2);
}

// ============================================================================
// Engine events
// ============================================================================

#[tokio::test(start_paused = true)]
async fn finished_track_auto_advances() {
    let h = harness().await;
    h.player.set_loop_mode(LoopMode::Order).await;
    h.player.play_at(pos(0, 0)).await.unwrap();

    h.engine.finish_current();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(h.player.current_position().await, Some(pos(0, 1)));
    assert_eq!(h.player.status().await, PlayerStatus::Playing);
    assert!(h.delegate.statuses().contains(&PlayerStatus::Finished));
}

#[tokio::test(start_paused = true)]
async fn finish_at_boundary_without_loop_stops() {
    let h = harness().await;
    h.player.set_loop_mode(LoopMode::Off).await;
    h.player.play_at(pos(1, 0)).await.unwrap();

    h.engine.finish_current();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(h.player.status().await, PlayerStatus::Stopped);
    assert!(matches!(h.delegate.failures().as_slice(), [(None, _)]));
}

#[tokio::test(start_paused = true)]
async fn decode_error_reports_against_current_position() {
    let h = harness().await;
    h.player.play_at(pos(0, 0)).await.unwrap();

    h.engine.fail_decode("bad frame");
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(h.player.status().await, PlayerStatus::Error);
    let failures = h.delegate.failures();
    assert!(matches!(failures.as_slice(), [(Some(p), _)] if *p == pos(0, 0)));
}

#[tokio::test]
async fn engine_load_failure_surfaces_as_error() {
    let h = harness().await;
    h.engine.set_fail_load(true);

    let err = h.player.play_at(pos(0, 0)).await.unwrap_err();

    assert!(matches!(err, PlayerError::Engine(_)));
    assert_eq!(h.player.status().await, PlayerStatus::Error);
    assert_eq!(
        h.player.track_at(pos(0, 0)).await.unwrap().status,
        TrackStatus::Error
    );
    // The failing position stays addressable for retry.
    assert_eq!(h.player.current_position().await, Some(pos(0, 0)));
}

// ============================================================================
// Fades
// ============================================================================

fn fade_ramp_count(commands: &[String]) -> usize {
    commands.iter().filter(|c| c.contains("fade=true")).count()
}

#[tokio::test]
async fn ramp_once_fades_only_the_first_start() {
    let config = PlayerConfig {
        fade_mode: FadeMode::RampOnce(Duration::from_secs(2)),
        ..PlayerConfig::default()
    };
    let h = harness_with(config, standard_albums()).await;

    h.player.play_at(pos(0, 0)).await.unwrap();
    assert_eq!(fade_ramp_count(&h.engine.commands()), 1);

    h.player.play_at(pos(0, 1)).await.unwrap();
    assert_eq!(fade_ramp_count(&h.engine.commands()), 1);

    // The flag is caller-resettable.
    h.player.reset_faded_flag().await;
    h.player.play_at(pos(1, 0)).await.unwrap();
    assert_eq!(fade_ramp_count(&h.engine.commands()), 2);
}

#[tokio::test]
async fn ramp_each_time_fades_every_start() {
    let config = PlayerConfig {
        fade_mode: FadeMode::RampEachTime(Duration::from_secs(1)),
        ..PlayerConfig::default()
    };
    let h = harness_with(config, standard_albums()).await;

    h.player.play_at(pos(0, 0)).await.unwrap();
    h.player.play_at(pos(0, 1)).await.unwrap();

    assert_eq!(fade_ramp_count(&h.engine.commands()), 2);
}

// ============================================================================
// Settings integration
// ============================================================================

#[tokio::test]
async fn resume_with_settings_prefers_designated_single_loop() {
    let h = harness().await;

    let mut settings = PlayerSettings::new("bgm");
    settings.loop_mode = LoopMode::Single;
    settings.loop_track_id = Some(3);
    settings.current_track_id = Some(1);

    h.player.apply_settings(&settings).await;
    let resumed = h.player.resume_with_settings(&settings, true).await.unwrap();

    assert!(resumed);
    assert_eq!(h.player.current_position().await, Some(pos(1, 0)));
    assert_eq!(h.player.status().await, PlayerStatus::Playing);
}

#[tokio::test]
async fn resume_with_settings_reports_nothing_to_resume() {
    let h = harness().await;

    let settings = PlayerSettings::new("bgm");
    let resumed = h.player.resume_with_settings(&settings, true).await.unwrap();

    assert!(!resumed);
    assert_eq!(h.player.status().await, PlayerStatus::Stopped);
}

// ============================================================================
// Events
// ============================================================================

#[tokio::test]
async fn bus_publishes_queue_and_player_events() {
    let h = harness().await;
    let mut rx = h.events.subscribe();

    h.player.reload(standard_albums()).await;
    h.player.play_at(pos(0, 0)).await.unwrap();

    let mut saw_reloaded = false;
    let mut saw_started = false;
    while let Ok(event) = rx.try_recv() {
        match event {
            CoreEvent::Queue(QueueEvent::Reloaded { album_count: 2, .. }) => saw_reloaded = true,
            CoreEvent::Player(PlayerEvent::Started { track_id: 1, .. }) => saw_started = true,
            _ => {}
        }
    }

    assert!(saw_reloaded);
    assert!(saw_started);
}
