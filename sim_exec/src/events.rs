//! # Event sink
//!
//! An append-only log of operator-visible events. Every pipeline component
//! reports status here, and the presentation layer is the sole consumer. The
//! sink has no causal effect on the computation: entries are never removed
//! or edited, and live for the whole session.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A single timestamped operator-visible event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEvent {
    /// When the event was recorded
    pub timestamp: DateTime<Utc>,

    /// The operator-facing message
    pub message: String,
}

/// The append-only event log.
#[derive(Debug, Default)]
pub struct EventSink {
    entries: Vec<LogEvent>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl EventSink {
    /// Create a new empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message with the current timestamp.
    pub fn record<S: Into<String>>(&mut self, message: S) {
        self.entries.push(LogEvent {
            timestamp: Utc::now(),
            message: message.into(),
        });
    }

    /// Iterate the recorded events in insertion order.
    ///
    /// Each call starts a fresh pass over the log.
    pub fn entries(&self) -> impl Iterator<Item = &LogEvent> {
        self.entries.iter()
    }

    /// Number of events recorded so far.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
