#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! Dispatch event bus for dropwatch.
//!
//! The bus provides a typed event enum and sequential identifiers on top of
//! `tokio::broadcast`. Subscribers see events published after they subscribe.
//! Publishing never blocks and never fails from the publisher's point of view,
//! so subscribers (such as the desktop notifier) can never stall a dispatch.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tokio::sync::broadcast::{Receiver, Sender};

/// Identifier assigned to each event emitted by the dispatcher.
pub type EventId = u64;

/// Default broadcast capacity per subscriber.
const DEFAULT_CAPACITY: usize = 256;

/// Typed dispatch events surfaced to subscribers.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A file was moved or copied to its rule destination.
    FileDispatched {
        /// Original path of the file.
        path: String,
        /// Final, collision-resolved destination path.
        destination: String,
        /// Name of the rule that matched.
        rule: String,
        /// Transfer action (`move` or `copy`).
        action: String,
    },
    /// A duplicate was detected at the destination.
    DuplicateResolved {
        /// Path of the duplicate source.
        path: String,
        /// Name of the rule that matched.
        rule: String,
        /// Whether the source was deleted (`move`) or left in place (`copy`).
        removed_source: bool,
    },
    /// A file was skipped without side effects.
    FileSkipped {
        /// Path of the skipped file.
        path: String,
        /// Machine-readable skip reason.
        reason: String,
    },
    /// A dispatch stage failed; the file is left in its last safe state.
    DispatchFailed {
        /// Path being dispatched.
        path: String,
        /// Stage that failed.
        stage: String,
        /// Rendered error chain.
        message: String,
    },
    /// The transferred file reached the remote sink.
    UploadCompleted {
        /// Local destination that was uploaded.
        destination: String,
        /// Remote path written.
        remote_path: String,
    },
    /// The remote upload failed or timed out; the local transfer stands.
    UploadFailed {
        /// Local destination that was uploaded.
        destination: String,
        /// Rendered error chain.
        message: String,
    },
}

impl Event {
    /// Machine-friendly discriminator for logs and metrics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::FileDispatched { .. } => "file_dispatched",
            Self::DuplicateResolved { .. } => "duplicate_resolved",
            Self::FileSkipped { .. } => "file_skipped",
            Self::DispatchFailed { .. } => "dispatch_failed",
            Self::UploadCompleted { .. } => "upload_completed",
            Self::UploadFailed { .. } => "upload_failed",
        }
    }
}

/// Metadata wrapper around events. Each envelope tracks the event id and
/// emission timestamp.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct EventEnvelope {
    /// Sequential identifier.
    pub id: EventId,
    /// Emission time.
    pub timestamp: DateTime<Utc>,
    /// Event payload.
    pub event: Event,
}

/// Shared event bus built on top of `tokio::broadcast`.
#[derive(Clone)]
pub struct EventBus {
    sender: Sender<EventEnvelope>,
    next_id: Arc<AtomicU64>,
}

impl EventBus {
    /// Construct a new bus with the provided broadcast capacity.
    ///
    /// A subscriber that falls more than `capacity` events behind skips the
    /// overwritten ones.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > 0, "event bus capacity must be positive");
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Construct a bus with the default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Publish a new event to the bus, assigning it a sequential identifier.
    ///
    /// Having no live subscribers is not an error; the event is dropped.
    #[must_use]
    pub fn publish(&self, event: Event) -> EventId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let envelope = EventEnvelope {
            id,
            timestamp: Utc::now(),
            event,
        };
        let _ = self.sender.send(envelope);
        id
    }

    /// Subscribe to events published from now on.
    #[must_use]
    pub fn subscribe(&self) -> EventStream {
        EventStream {
            receiver: self.sender.subscribe(),
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Live view of the bus for a single subscriber.
pub struct EventStream {
    receiver: Receiver<EventEnvelope>,
}

impl EventStream {
    /// Receive the next event.
    ///
    /// Returns `None` once every bus handle has been dropped. Lagging receivers
    /// skip the overwritten events and continue with the oldest retained one.
    pub async fn next(&mut self) -> Option<EventEnvelope> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
