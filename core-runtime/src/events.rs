//! # Event Bus System
//!
//! Provides an event-driven architecture for the playback core using
//! `tokio::sync::broadcast`. Core modules publish typed events; observers
//! (UI layers, pre-downloaders, diagnostics) subscribe independently.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐     emit      ┌───────────┐
//! │ Player       ├──────────────>│           │
//! └──────────────┘               │           │
//!                                │ EventBus  │     subscribe    ┌────────────┐
//! ┌──────────────┐     emit      │ (broadcast├─────────────────>│ Subscriber │
//! │ Queue        ├──────────────>│  channel) │                  └────────────┘
//! └──────────────┘               │           │     subscribe    ┌────────────┐
//! ┌──────────────┐     emit      │           ├─────────────────>│ Subscriber │
//! │ Resolver     ├──────────────>│           │                  └────────────┘
//! └──────────────┘               └───────────┘
//! ```
//!
//! Event payloads carry plain identifiers and indices so the bus stays
//! decoupled from the playback crate's domain types.
//!
//! ## Error Handling
//!
//! `tokio::sync::broadcast` produces two error kinds on the receive side:
//!
//! - **`RecvError::Lagged(n)`**: the subscriber was too slow and missed `n`
//!   events. Non-fatal; the subscriber continues with newer events.
//! - **`RecvError::Closed`**: all senders dropped; treat as shutdown.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

// Re-export commonly used types
pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
///
/// Balances memory usage with the ability to absorb bursts (download
/// progress ticks are the high-volume producer). Subscribers that can't keep
/// up receive `RecvError::Lagged`.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 128;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum encompassing all event categories.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Player state machine events
    Player(PlayerEvent),
    /// Queue shape and navigation events
    Queue(QueueEvent),
    /// Track download lifecycle events
    Download(DownloadEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Player(e) => e.description(),
            CoreEvent::Queue(e) => e.description(),
            CoreEvent::Download(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Player(PlayerEvent::Failed { .. }) => EventSeverity::Error,
            CoreEvent::Download(DownloadEvent::Failed { .. }) => EventSeverity::Error,
            CoreEvent::Player(PlayerEvent::Started { .. }) => EventSeverity::Info,
            CoreEvent::Queue(QueueEvent::Reloaded { .. }) => EventSeverity::Info,
            CoreEvent::Download(DownloadEvent::Completed { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    /// Debug-level events (verbose)
    Debug,
    /// Informational events
    Info,
    /// Warning events
    Warning,
    /// Error events
    Error,
}

// ============================================================================
// Player Events
// ============================================================================

/// Events emitted by the player state machine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event")]
pub enum PlayerEvent {
    /// The player status changed (stopped/preparing/playing/...).
    StatusChanged {
        /// New status as its wire name (e.g. "playing").
        status: String,
    },
    /// Playback of a track actually started.
    Started {
        /// Resource id of the track.
        track_id: i64,
        /// Album index of the played position.
        album_index: usize,
        /// Track index of the played position.
        track_index: usize,
    },
    /// A playback command failed.
    Failed {
        /// Resource id of the failing track, when one was determined.
        track_id: Option<i64>,
        /// Human-readable error message.
        message: String,
    },
}

impl PlayerEvent {
    fn description(&self) -> &str {
        match self {
            PlayerEvent::StatusChanged { .. } => "Player status changed",
            PlayerEvent::Started { .. } => "Playback started",
            PlayerEvent::Failed { .. } => "Playback failed",
        }
    }
}

// ============================================================================
// Queue Events
// ============================================================================

/// Events emitted when the queue shape changes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event")]
pub enum QueueEvent {
    /// The whole collection was replaced.
    Reloaded {
        /// Number of albums after the reload.
        album_count: usize,
        /// Number of tracks after the reload.
        track_count: usize,
    },
    /// An album was inserted.
    AlbumInserted {
        /// Id of the inserted album.
        album_id: i64,
        /// Index it was inserted at.
        index: usize,
    },
    /// An album was removed.
    AlbumRemoved {
        /// Id of the removed album.
        album_id: i64,
        /// Index it was removed from.
        index: usize,
    },
    /// The pre-computed shuffle position changed (or was cleared).
    ShuffleHintChanged {
        /// New hinted position, if any.
        hint: Option<(usize, usize)>,
    },
}

impl QueueEvent {
    fn description(&self) -> &str {
        match self {
            QueueEvent::Reloaded { .. } => "Queue reloaded",
            QueueEvent::AlbumInserted { .. } => "Album inserted",
            QueueEvent::AlbumRemoved { .. } => "Album removed",
            QueueEvent::ShuffleHintChanged { .. } => "Shuffle hint changed",
        }
    }
}

// ============================================================================
// Download Events
// ============================================================================

/// Why a download failed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum DownloadFailureReason {
    /// Explicitly canceled by the caller or superseded by a newer request.
    Canceled,
    /// The configured deadline elapsed before the transfer finished.
    Timeout,
    /// Transport or storage failure.
    Network,
}

/// Events describing a track download lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event")]
pub enum DownloadEvent {
    /// A download started for the given track.
    Started {
        /// Resource id of the track.
        track_id: i64,
    },
    /// Incremental progress update.
    Progress {
        /// Resource id of the track.
        track_id: i64,
        /// Completed fraction in `[0.0, 1.0]`.
        fraction: f64,
    },
    /// The track's bytes are available locally.
    Completed {
        /// Resource id of the track.
        track_id: i64,
        /// Size of the downloaded payload in bytes.
        bytes: u64,
    },
    /// The download failed.
    Failed {
        /// Resource id of the track.
        track_id: i64,
        /// Failure classification.
        reason: DownloadFailureReason,
    },
}

impl DownloadEvent {
    fn description(&self) -> &str {
        match self {
            DownloadEvent::Started { .. } => "Download started",
            DownloadEvent::Progress { .. } => "Download in progress",
            DownloadEvent::Completed { .. } => "Download completed",
            DownloadEvent::Failed { .. } => "Download failed",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for publishing and subscribing to events.
///
/// Uses `tokio::sync::broadcast` internally, which provides:
/// - Multiple producers (clone the `EventBus`)
/// - Multiple consumers (each `subscribe()` creates a new receiver)
/// - Non-blocking sends (events are cloned per subscriber)
/// - Lagging detection (slow subscribers get `RecvError::Lagged`)
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer size.
    ///
    /// # Arguments
    ///
    /// * `capacity` - Maximum number of events buffered per subscriber.
    ///   A subscriber falling behind by more than this receives
    ///   `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an
    /// error if there are no active subscribers.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber to receive events.
    ///
    /// Each call creates an independent receiver that will receive all
    /// future events. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

/// Type alias for event filter functions.
type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A wrapper around `broadcast::Receiver` with filtering capabilities.
///
/// # Example
///
/// ```rust
/// use core_runtime::events::{EventBus, EventStream, CoreEvent};
///
/// let event_bus = EventBus::default();
/// let stream = EventStream::new(event_bus.subscribe())
///     .filter(|event| matches!(event, CoreEvent::Download(_)));
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    /// Creates a new event stream from a receiver.
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Adds a filter function to this stream.
    ///
    /// Only events that match the filter will be returned by `recv()`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    /// Receives the next event that passes the filter (if any).
    ///
    /// # Errors
    ///
    /// Returns `RecvError::Lagged(n)` if the subscriber fell behind by `n`
    /// events, or `RecvError::Closed` if all senders have been dropped.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;

            let Some(filter) = &self.filter else {
                return Ok(event);
            };

            if filter(&event) {
                return Ok(event);
            }
        }
    }

    /// Attempts to receive an event without blocking.
    ///
    /// Returns `None` if no matching events are currently available.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    let Some(filter) = &self.filter else {
                        return Some(Ok(event));
                    };

                    if filter(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
