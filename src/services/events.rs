//! Event system for ledger operations
//!
//! Provides an event bus for notifying listeners about ledger operations.
//! Useful for:
//! - Audit logging
//! - User notifications (rebalances, reviews, certificate changes)
//! - Dashboard refresh triggers
//!
//! Events are emitted after the owning transaction commits. Delivery is
//! fire-and-forget; a missing subscriber never fails the operation.

use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, trace};

/// Ledger events emitted by services
#[derive(Debug, Clone)]
pub enum LedgerEvent {
    // User events
    UserCreated {
        user_id: String,
        display_name: String,
    },
    UserDeleted {
        user_id: String,
    },
    LevelGranted {
        user_id: String,
        level: String,
    },
    LevelRevoked {
        user_id: String,
        level: String,
    },

    // Ledger events
    SubmissionRecorded {
        submission_id: String,
        user_id: String,
        entry_count: usize,
    },
    EntryReviewed {
        entry_id: String,
        user_id: String,
        status: String,
        reviewer_id: String,
    },
    SubmissionReviewed {
        submission_id: String,
        user_id: String,
        status: String,
        entry_count: usize,
    },
    CellRebalanced {
        user_id: String,
        kind: String,
        category: String,
        status: String,
        previous_value: f32,
        new_value: f32,
    },

    // Certificate events
    CertificateIssued {
        certificate_id: String,
        user_id: String,
        level: String,
    },
    CertificateUpdated {
        certificate_id: String,
        user_id: String,
        level: String,
    },
    CertificateRevoked {
        certificate_id: String,
        user_id: String,
        level: String,
    },

    // Target level events
    TargetLevelSet {
        user_id: String,
        level: String,
        set_by: String,
    },
    TargetLevelCleared {
        user_id: String,
        cleared_by: String,
    },
}

/// Trait for event listeners
pub trait EventListener: Send + Sync {
    /// Handle an event
    fn on_event(&self, event: &LedgerEvent);
}

/// Event bus for broadcasting ledger events
pub struct EventBus {
    sender: broadcast::Sender<LedgerEvent>,
}

impl EventBus {
    /// Create a new event bus with default capacity
    pub fn new() -> Self {
        Self::with_capacity(1024)
    }

    /// Create a new event bus with specified capacity
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Emit an event to all subscribers
    pub fn emit(&self, event: LedgerEvent) {
        trace!(event = ?event, "Emitting ledger event");
        // Ignore send errors (no subscribers)
        let _ = self.sender.send(event);
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> broadcast::Receiver<LedgerEvent> {
        self.sender.subscribe()
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Logging event listener for audit trails
pub struct LoggingEventListener;

impl EventListener for LoggingEventListener {
    fn on_event(&self, event: &LedgerEvent) {
        match event {
            LedgerEvent::CellRebalanced {
                user_id,
                kind,
                category,
                status,
                previous_value,
                new_value,
            } => {
                debug!(
                    user = %user_id,
                    cell = %format!("{}/{}/{}", kind, category, status),
                    from = %previous_value,
                    to = %new_value,
                    "Cell rebalanced"
                );
            }
            LedgerEvent::CertificateIssued {
                certificate_id,
                user_id,
                level,
            } => {
                debug!(id = %certificate_id, user = %user_id, level = %level, "Certificate issued");
            }
            LedgerEvent::CertificateRevoked {
                certificate_id,
                user_id,
                level,
            } => {
                debug!(id = %certificate_id, user = %user_id, level = %level, "Certificate revoked");
            }
            LedgerEvent::TargetLevelSet {
                user_id,
                level,
                set_by,
            } => {
                debug!(user = %user_id, level = %level, set_by = %set_by, "Target level set");
            }
            LedgerEvent::UserDeleted { user_id } => {
                debug!(user = %user_id, "User deleted");
            }
            _ => {
                trace!(event = ?event, "Ledger event");
            }
        }
    }
}

/// Spawn a background task that logs all events
pub fn spawn_logging_listener(event_bus: Arc<EventBus>) -> tokio::task::JoinHandle<()> {
    let mut receiver = event_bus.subscribe();
    let listener = LoggingEventListener;

    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(event) => listener.on_event(&event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    debug!(skipped = n, "Event listener lagged, skipped events");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Event bus closed, stopping listener");
                    break;
                }
            }
        }
    })
}
