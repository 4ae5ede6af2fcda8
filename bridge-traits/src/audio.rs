//! Audio engine bridge trait and supporting types.
//!
//! The playback core never decodes or renders audio itself. It resolves a
//! track to raw bytes and hands them to the host's [`AudioEngine`], which
//! owns decoding, output routing, and fade ramps. The engine reports
//! completion and decode failures back through a broadcast channel that the
//! core consumes to drive auto-advance and error transitions.

use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::error::Result;

/// Unique identifier for a prepared playback item held by the host engine.
///
/// Handles are opaque; the core only stores and compares them. A stale
/// handle (one the engine no longer knows) must be rejected with
/// [`BridgeError::NotAvailable`](crate::error::BridgeError::NotAvailable).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PreparedHandle(Uuid);

impl PreparedHandle {
    /// Generate a fresh handle. Called by engine implementations on `load`.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PreparedHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PreparedHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Events emitted by the host audio engine.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// The item finished playing to its natural end.
    PlaybackFinished { handle: PreparedHandle },
    /// The engine failed to decode the item mid-playback.
    DecodeError {
        handle: PreparedHandle,
        message: String,
    },
}

/// Host audio capability.
///
/// The engine accepts whole-file bytes (never a partial stream) and exposes
/// transport controls against the returned handle. Volume changes may ramp
/// over `fade` when the host supports it; hosts without fade support apply
/// the target volume immediately.
#[async_trait]
pub trait AudioEngine: Send + Sync {
    /// Prepare the given bytes for playback and return a handle to them.
    ///
    /// # Errors
    ///
    /// Returns error if the bytes cannot be parsed as playable media.
    async fn load(&self, data: Bytes) -> Result<PreparedHandle>;

    /// Start or resume playback of a prepared item.
    async fn play(&self, handle: &PreparedHandle) -> Result<()>;

    /// Pause playback, keeping the item prepared.
    async fn pause(&self, handle: &PreparedHandle) -> Result<()>;

    /// Stop playback and release the prepared item.
    async fn stop(&self, handle: &PreparedHandle) -> Result<()>;

    /// Set the output volume for a prepared item.
    ///
    /// `volume` is linear gain in `[0.0, 1.0]`. When `fade` is set, the
    /// engine ramps from the current volume to the target over that duration.
    async fn set_volume(
        &self,
        handle: &PreparedHandle,
        volume: f32,
        fade: Option<Duration>,
    ) -> Result<()>;

    /// Subscribe to engine events.
    ///
    /// Every subscriber receives every event emitted after the call; past
    /// events are not replayed.
    fn subscribe(&self) -> broadcast::Receiver<EngineEvent>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_are_unique() {
        let a = PreparedHandle::new();
        let b = PreparedHandle::new();
        assert_ne!(a, b);
    }
}
