//! # Background-Music Playback Core
//!
//! Orchestrates *which* track plays *when*, and makes sure its bytes are
//! locally available. This crate owns:
//!
//! - The two-level playback queue (albums containing tracks), the
//!   current-position cursor, loop-mode navigation, and playback history
//! - The player state machine that drives resolution and hands bytes to the
//!   host [`AudioEngine`](bridge_traits::audio::AudioEngine)
//! - Track resolution through a disk cache backed by a cancellable,
//!   progress-reporting download
//! - Persisted player settings and the resume-by-settings operation
//!
//! Audio decoding, UI, and the metadata API client live behind the
//! `bridge-traits` seams; this crate never renders a sample.

pub mod cache;
pub mod config;
pub mod download;
pub mod error;
pub mod model;
pub mod player;
pub mod queue;
pub mod resolver;
pub mod settings;

pub use cache::FileCache;
pub use config::PlayerConfig;
pub use download::{DownloadRequest, TransferProgress};
pub use error::{PlayerError, QueueError, ResolutionError, Result};
pub use model::{
    Album, AlbumId, Entitlements, FadeMode, HistoryEntry, LoopMode, PlayDirection, PlayerStatus,
    Position, Track, TrackId, TrackStatus,
};
pub use player::{BgmPlayer, PlayerDelegate};
pub use queue::PlaybackQueue;
pub use resolver::TrackResolver;
pub use settings::PlayerSettings;
