//! Domain event system — observe the control loop without coupling to it.
//!
//! The loop publishes an event at each transition. Front-ends subscribe to
//! show progress; tests subscribe to assert on the path taken.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// A user turn entered the loop
    TurnReceived {
        conversation_id: String,
        content_preview: String,
        timestamp: DateTime<Utc>,
    },

    /// The decision step produced an outcome
    DecisionMade {
        conversation_id: String,
        /// `None` for a direct answer
        capability: Option<String>,
        timestamp: DateTime<Utc>,
    },

    /// A capability was invoked
    CapabilityInvoked {
        identifier: String,
        success: bool,
        attempts: u32,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// The model returned a response
    ResponseGenerated {
        conversation_id: String,
        model: String,
        tokens_used: u32,
        timestamp: DateTime<Utc>,
    },

    /// A failure was turned into a fallback turn
    FallbackIssued {
        conversation_id: String,
        kind: String,
        detail: String,
        timestamp: DateTime<Utc>,
    },

    /// The loop reached its terminal state
    LoopFinished {
        conversation_id: String,
        invocations: u32,
        turns_added: usize,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for domain events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
