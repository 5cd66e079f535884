// Notification dispatch: transport seam and delivery policy.
//
// The dispatcher turns an item into a rich message, paces sends, and falls
// back to a plain-text rendition exactly once when the transport refuses the
// markup. Transports only move an already-formatted message.

pub mod format;
pub mod pacer;
pub mod telegram;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

use crate::feed::Item;
use crate::observe::{MonitorEvent, MonitorObserver};
use crate::output::truncate_chars;

use self::format::{rich_message, strip_markup};
use self::pacer::Pacer;

/// Markup dialect a message body is written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RichFormat {
    Html,
}

/// A message ready for a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub recipient: String,
    pub text: String,
    /// `None` means plain text.
    pub rich_format: Option<RichFormat>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The transport refused the message as malformed (bad markup).
    #[error("message rejected: {0}")]
    Rejected(String),

    #[error("delivery failed: {0}")]
    Failed(String),

    #[error("transport is not configured")]
    NotConfigured,
}

/// Something that can deliver one message to one recipient.
#[async_trait]
pub trait NotificationTransport: Send + Sync {
    async fn send(&self, message: &OutboundMessage) -> Result<(), TransportError>;
}

/// Transport for dry runs: logs the message instead of delivering it.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogTransport;

#[async_trait]
impl NotificationTransport for LogTransport {
    async fn send(&self, message: &OutboundMessage) -> Result<(), TransportError> {
        info!(
            recipient = %message.recipient,
            rich = message.rich_format.is_some(),
            "[dry run] {}",
            truncate_chars(&message.text, 200)
        );
        Ok(())
    }
}

pub struct Dispatcher {
    transport: Box<dyn NotificationTransport>,
    recipient: String,
    pacer: Pacer,
    observer: Arc<dyn MonitorObserver>,
}

impl Dispatcher {
    pub fn new(
        transport: Box<dyn NotificationTransport>,
        recipient: impl Into<String>,
        min_interval: Duration,
        observer: Arc<dyn MonitorObserver>,
    ) -> Self {
        Self {
            transport,
            recipient: recipient.into(),
            pacer: Pacer::new(min_interval),
            observer,
        }
    }

    /// Deliver a notification for `item`. Returns whether it got through;
    /// failures are reported to the observer, never raised.
    pub async fn send(&self, item: &Item) -> bool {
        self.pacer.acquire().await;

        let rich = OutboundMessage {
            recipient: self.recipient.clone(),
            text: rich_message(item),
            rich_format: Some(RichFormat::Html),
        };

        let delivered = match self.transport.send(&rich).await {
            Ok(()) => true,
            Err(TransportError::Rejected(reason)) => {
                self.observer.on_event(&MonitorEvent::PlainTextFallback {
                    source: item.source().to_string(),
                    id: item.id().to_string(),
                    reason,
                });
                let plain = OutboundMessage {
                    text: strip_markup(&rich.text),
                    rich_format: None,
                    ..rich
                };
                match self.transport.send(&plain).await {
                    Ok(()) => true,
                    Err(e) => {
                        self.report_failure(item, &e);
                        false
                    }
                }
            }
            Err(e) => {
                self.report_failure(item, &e);
                false
            }
        };

        self.observer.on_event(&MonitorEvent::NotificationSent {
            source: item.source().to_string(),
            id: item.id().to_string(),
            delivered,
        });
        delivered
    }

    fn report_failure(&self, item: &Item, error: &TransportError) {
        self.observer.on_event(&MonitorEvent::TransportFailed {
            source: item.source().to_string(),
            id: item.id().to_string(),
            error: error.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    struct NullObserver;
    impl MonitorObserver for NullObserver {
        fn on_event(&self, _event: &MonitorEvent) {}
    }

    struct Unconfigured;
    #[async_trait]
    impl NotificationTransport for Unconfigured {
        async fn send(&self, _message: &OutboundMessage) -> Result<(), TransportError> {
            Err(TransportError::NotConfigured)
        }
    }

    fn item() -> Item {
        let ts = NaiveDate::from_ymd_opt(2025, 5, 1)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        Item::new("1", "hi", "https://x.com/a/status/1", "a", ts).unwrap()
    }

    #[tokio::test]
    async fn log_transport_always_delivers() {
        let d = Dispatcher::new(
            Box::new(LogTransport),
            "chat",
            Duration::ZERO,
            Arc::new(NullObserver),
        );
        assert!(d.send(&item()).await);
    }

    #[tokio::test]
    async fn unconfigured_transport_is_not_delivered() {
        let d = Dispatcher::new(
            Box::new(Unconfigured),
            "chat",
            Duration::ZERO,
            Arc::new(NullObserver),
        );
        assert!(!d.send(&item()).await);
    }
}
