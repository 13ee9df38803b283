//! Resolution instrumentation events
//!
//! Every scope resolution is wrapped in a `resolve` event so that external
//! observers (metrics, tracing exporters, debug tooling) can measure it
//! without the engine depending on them. The [`EventBus`] uses
//! `tokio::sync::broadcast`, so publishing never blocks resolution.
//!
//! # Usage
//!
//! ```rust,ignore
//! let bus = EventBus::new(1024);
//! let mut rx = bus.subscribe();
//!
//! let runtime = Runtime::builder().with_event_bus(bus.clone()).build()?;
//!
//! if let Ok(envelope) = rx.recv().await {
//!     println!("{} resolved {} records", envelope.event.resource, envelope.event.result_count);
//! }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Payload of a `resolve` event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolveEvent {
    /// Resource that was resolved
    pub resource: String,

    /// The query that drove the resolution
    pub params: serde_json::Value,

    /// Logical sideload name when the scope was created for a sideload
    pub sideload: Option<String>,

    /// Resource that owns the parent records, for sideload scopes
    pub parent: Option<String>,

    /// Number of records after holes were dropped
    pub result_count: usize,

    /// Wall time of the adapter call and post-processing
    pub elapsed_ms: u64,
}

impl ResolveEvent {
    /// Event name, matching the tracing span name
    pub fn name(&self) -> &'static str {
        "resolve"
    }
}

/// Envelope wrapping an event with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Unique event ID
    pub id: Uuid,
    /// When the event was published
    pub timestamp: DateTime<Utc>,
    pub event: ResolveEvent,
}

impl EventEnvelope {
    pub fn new(event: ResolveEvent) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            event,
        }
    }
}

/// Broadcast-based event bus
///
/// The bus is cheap to clone and can be shared across tasks.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EventEnvelope>,
}

impl EventBus {
    /// Create a new EventBus with the given channel capacity
    ///
    /// The capacity determines how many events can be buffered before
    /// slow receivers start losing events (lagged).
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers
    ///
    /// Returns the number of receivers that will receive the event.
    pub fn publish(&self, event: ResolveEvent) -> usize {
        let envelope = EventEnvelope::new(event);
        // send() returns Err only if there are no receivers, which is fine
        self.sender.send(envelope).unwrap_or(0)
    }

    /// Subscribe to events published from now on
    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.sender.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}
