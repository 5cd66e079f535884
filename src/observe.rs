// Structured monitor events and the observer seam.
//
// Components never log domain events through a global logger. They are
// handed an observer at construction and report what happened as a
// `MonitorEvent`; the caller decides where those events go. The production
// sink is `TracingObserver`, which turns each event into a `tracing` event.

use std::time::Duration;

use chrono::NaiveDateTime;
use tracing::{debug, info, warn};

use crate::feed::collector::StopReason;
use crate::monitor::RoundPhase;
use crate::output::truncate_chars;

/// Everything the monitor reports while it works.
#[derive(Debug, Clone, PartialEq)]
pub enum MonitorEvent {
    RoundStarted {
        round: u64,
    },
    PhaseChanged {
        round: u64,
        phase: RoundPhase,
    },
    CollectionStarted {
        source: String,
        days_limit: i64,
        max_items: usize,
    },
    NavigationTimedOut {
        source: String,
        url: String,
    },
    /// The first candidate element never rendered; the source yields nothing.
    NoItemsRendered {
        source: String,
        detail: String,
    },
    ItemSkipped {
        source: String,
        position: usize,
        error: String,
    },
    /// Neither an absolute nor a relative timestamp could be read.
    TimeFallback {
        source: String,
        raw: String,
    },
    BatchScanned {
        source: String,
        enumerated: usize,
        fresh: usize,
        total: usize,
    },
    CollectionStopped {
        source: String,
        reason: StopReason,
        collected: usize,
        newest: Option<NaiveDateTime>,
        oldest: Option<NaiveDateTime>,
    },
    CollectionFailed {
        source: String,
        error: String,
        collected: usize,
    },
    CaptureSaved {
        source: String,
        path: String,
    },
    CaptureFailed {
        source: String,
        error: String,
    },
    ItemDetected {
        source: String,
        id: String,
        timestamp: NaiveDateTime,
        text: String,
        is_new: bool,
    },
    SourceChecked {
        source: String,
        collected: usize,
        in_window: usize,
        fresh: usize,
    },
    DispatchPlanned {
        count: usize,
    },
    NotificationSent {
        source: String,
        id: String,
        delivered: bool,
    },
    PlainTextFallback {
        source: String,
        id: String,
        reason: String,
    },
    TransportFailed {
        source: String,
        id: String,
        error: String,
    },
    StoreCorrupt {
        path: String,
        error: String,
    },
    StoreSaved {
        path: String,
        count: usize,
    },
    RoundFinished {
        round: u64,
        new_items: usize,
        next_check: Duration,
    },
    RoundAborted {
        round: u64,
        error: String,
    },
    CancelRequested {
        round: u64,
    },
}

/// Receiver for monitor events.
pub trait MonitorObserver: Send + Sync {
    fn on_event(&self, event: &MonitorEvent);
}

/// Observer that forwards every event to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl MonitorObserver for TracingObserver {
    fn on_event(&self, event: &MonitorEvent) {
        match event {
            MonitorEvent::RoundStarted { round } => {
                info!(round = *round, "Starting monitor round");
            }
            MonitorEvent::PhaseChanged { round, phase } => {
                debug!(round = *round, phase = ?phase, "Round phase changed");
            }
            MonitorEvent::CollectionStarted {
                source,
                days_limit,
                max_items,
            } => {
                info!(
                    source = %source,
                    days_limit = *days_limit,
                    max_items = *max_items,
                    "Collecting items for {}",
                    source
                );
            }
            MonitorEvent::NavigationTimedOut { source, url } => {
                warn!(source = %source, url = %url, "Navigation timed out, continuing anyway");
            }
            MonitorEvent::NoItemsRendered { source, detail } => {
                warn!(
                    source = %source,
                    detail = %detail,
                    "No feed items rendered; page may not have loaded"
                );
            }
            MonitorEvent::ItemSkipped {
                source,
                position,
                error,
            } => {
                warn!(source = %source, position = *position, error = %error, "Skipping item");
            }
            MonitorEvent::TimeFallback { source, raw } => {
                warn!(source = %source, raw = %raw, "Unreadable timestamp, using current time");
            }
            MonitorEvent::BatchScanned {
                source,
                enumerated,
                fresh,
                total,
            } => {
                debug!(
                    source = %source,
                    enumerated = *enumerated,
                    fresh = *fresh,
                    total = *total,
                    "Scanned rendered items"
                );
            }
            MonitorEvent::CollectionStopped {
                source,
                reason,
                collected,
                newest,
                oldest,
            } => {
                info!(
                    source = %source,
                    reason = ?reason,
                    collected = *collected,
                    newest = ?newest,
                    oldest = ?oldest,
                    "Collection finished for {}",
                    source
                );
            }
            MonitorEvent::CollectionFailed {
                source,
                error,
                collected,
            } => {
                warn!(
                    source = %source,
                    error = %error,
                    collected = *collected,
                    "Collection aborted, keeping partial results"
                );
            }
            MonitorEvent::CaptureSaved { source, path } => {
                info!(source = %source, path = %path, "Saved failure capture");
            }
            MonitorEvent::CaptureFailed { source, error } => {
                warn!(source = %source, error = %error, "Could not save failure capture");
            }
            MonitorEvent::ItemDetected {
                source,
                id,
                timestamp,
                text,
                is_new,
            } => {
                debug!(
                    source = %source,
                    id = %id,
                    timestamp = %timestamp,
                    is_new = *is_new,
                    text = %truncate_chars(text, 100),
                    "Item detected"
                );
            }
            MonitorEvent::SourceChecked {
                source,
                collected,
                in_window,
                fresh,
            } => {
                info!(
                    source = %source,
                    collected = *collected,
                    in_window = *in_window,
                    fresh = *fresh,
                    "Checked {}",
                    source
                );
            }
            MonitorEvent::DispatchPlanned { count } => {
                info!(count = *count, "Sending notifications, newest first");
            }
            MonitorEvent::NotificationSent {
                source,
                id,
                delivered,
            } => {
                if *delivered {
                    info!(source = %source, id = %id, "Notification delivered");
                } else {
                    warn!(source = %source, id = %id, "Notification not delivered");
                }
            }
            MonitorEvent::PlainTextFallback { source, id, reason } => {
                info!(source = %source, id = %id, reason = %reason, "Retrying as plain text");
            }
            MonitorEvent::TransportFailed { source, id, error } => {
                warn!(source = %source, id = %id, error = %error, "Notification transport failed");
            }
            MonitorEvent::StoreCorrupt { path, error } => {
                warn!(path = %path, error = %error, "Seen-item store unreadable, starting empty");
            }
            MonitorEvent::StoreSaved { path, count } => {
                debug!(path = %path, count = *count, "Seen-item store saved");
            }
            MonitorEvent::RoundFinished {
                round,
                new_items,
                next_check,
            } => {
                info!(
                    round = *round,
                    new_items = *new_items,
                    next_check_secs = next_check.as_secs(),
                    "Round complete"
                );
            }
            MonitorEvent::RoundAborted { round, error } => {
                warn!(round = *round, error = %error, "Round aborted, nothing persisted");
            }
            MonitorEvent::CancelRequested { round } => {
                info!(round = *round, "Stop requested, exiting monitor loop");
            }
        }
    }
}
