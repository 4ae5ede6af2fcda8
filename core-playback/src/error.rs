//! # Playback Error Types
//!
//! Error taxonomy for queue navigation, track resolution, and the player
//! state machine.

use crate::model::{Position, TrackId};
use bridge_traits::BridgeError;
use thiserror::Error;

/// Queue navigation and addressing errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    /// The queue holds no playable track under the caller's entitlements.
    #[error("No valid playable item for now")]
    NoPlayableItem,

    /// The position does not address a slot of the live queue shape.
    #[error("Position {0} is out of range")]
    InvalidPosition(Position),
}

/// Errors turning a track reference into local bytes.
#[derive(Error, Debug)]
pub enum ResolutionError {
    /// A resolution for the same track is still in flight.
    #[error("Resolution already in progress for track {0}")]
    AlreadyInProgress(TrackId),

    /// The transfer was canceled while in flight.
    #[error("Download canceled")]
    Canceled,

    /// The deadline elapsed before the transfer finished.
    #[error("Download timed out")]
    Timeout,

    /// The track carries no URL, or the URL does not parse.
    #[error("Track URL missing or invalid: {0}")]
    InvalidUrl(String),

    /// Transport or storage failure.
    #[error("I/O failure during resolution: {0}")]
    Io(String),
}

impl ResolutionError {
    /// Distinguishes "retry later" from "this track is broken".
    pub fn is_timeout(&self) -> bool {
        matches!(self, ResolutionError::Timeout)
    }

    pub fn is_canceled(&self) -> bool {
        matches!(self, ResolutionError::Canceled)
    }
}

impl From<BridgeError> for ResolutionError {
    fn from(err: BridgeError) -> Self {
        match err {
            BridgeError::Timeout => ResolutionError::Timeout,
            other => ResolutionError::Io(other.to_string()),
        }
    }
}

/// Errors surfaced by the player state machine.
#[derive(Error, Debug)]
pub enum PlayerError {
    /// The player configuration failed validation.
    #[error("Invalid player configuration: {0}")]
    InvalidConfig(String),

    /// The player was disabled through settings.
    #[error("Player is not enabled")]
    Disabled,

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    /// Opaque failure reported by the host audio engine.
    #[error("Audio engine error: {0}")]
    Engine(String),

    /// A completed asynchronous operation no longer matches the live
    /// current position. Internal short-circuit; never surfaced to
    /// delegates.
    #[error("Operation superseded by a newer request")]
    Superseded,
}

impl PlayerError {
    pub fn is_superseded(&self) -> bool {
        matches!(self, PlayerError::Superseded)
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, PlayerError::Resolution(e) if e.is_timeout())
    }

    pub fn is_canceled(&self) -> bool {
        matches!(self, PlayerError::Resolution(e) if e.is_canceled())
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlayerError>;
