// Shared fixtures: a scripted page session backed by HTML snapshots, a
// recording notification transport, and an event recorder.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};

use feedwatch::notify::{NotificationTransport, OutboundMessage, TransportError};
use feedwatch::observe::{MonitorEvent, MonitorObserver};
use feedwatch::session::snapshot::{select_document, SnapshotElement};
use feedwatch::session::{PageElement, PageSession, SessionError, SessionResult, WaitMode};

pub const BASE_URL: &str = "https://feed.test";

/// Fixed reference time for every test.
pub fn now() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 6, 10)
        .unwrap()
        .and_hms_opt(12, 0, 0)
        .unwrap()
}

pub fn hours_ago(hours: i64) -> NaiveDateTime {
    now() - chrono::Duration::hours(hours)
}

/// One feed entry as the site renders it.
pub fn entry(source: &str, id: &str, at: NaiveDateTime, text: &str) -> String {
    format!(
        "<article data-testid=\"tweet\">\
           <a href=\"/{source}\">{source}</a>\
           <a href=\"/{source}/status/{id}\"><time datetime=\"{ts}\">1h</time></a>\
           <div data-testid=\"tweetText\">{text}</div>\
           <a href=\"/{source}/status/{id}/analytics\">stats</a>\
         </article>",
        ts = at.format("%Y-%m-%dT%H:%M:%S.000Z"),
    )
}

/// An entry with only a relative time label.
pub fn relative_entry(source: &str, id: &str, label: &str) -> String {
    format!(
        "<article data-testid=\"tweet\">\
           <a href=\"/{source}/status/{id}\"><time>{label}</time></a>\
           <div data-testid=\"tweetText\">relative</div>\
         </article>"
    )
}

/// An entry with no time element at all.
pub fn untimed_entry(source: &str, id: &str) -> String {
    format!(
        "<article data-testid=\"tweet\">\
           <a href=\"/{source}/status/{id}\">link</a>\
           <div data-testid=\"tweetText\">no time</div>\
         </article>"
    )
}

/// An entry without any item link (a promoted card, say).
pub fn linkless_entry() -> String {
    "<article data-testid=\"tweet\"><div data-testid=\"tweetText\">ad</div></article>".to_string()
}

pub fn page(entries: &[String]) -> String {
    format!("<html><body><main>{}</main></body></html>", entries.concat())
}

/// How one URL behaves. Frame `n` is what is rendered after `n` scrolls;
/// scrolling past the last frame keeps showing it.
#[derive(Debug, Clone, Default)]
pub struct FeedScript {
    pub frames: Vec<String>,
    pub navigation_times_out: bool,
    /// Enumerating at this scroll depth fails with a network error.
    pub fail_at_depth: Option<usize>,
}

impl FeedScript {
    pub fn frames(frames: Vec<String>) -> Self {
        Self {
            frames,
            ..Self::default()
        }
    }
}

#[derive(Default)]
pub struct ScriptedSession {
    scripts: HashMap<String, FeedScript>,
    current: Option<(String, usize)>,
    pub navigations: Vec<String>,
    pub enumerations: usize,
    pub scrolls: usize,
    pub captures: usize,
}

impl ScriptedSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_feed(mut self, source: &str, script: FeedScript) -> Self {
        self.scripts.insert(format!("{BASE_URL}/{source}"), script);
        self
    }

    fn frame(&self) -> SessionResult<(&FeedScript, &str, usize)> {
        let (url, depth) = self.current.as_ref().ok_or(SessionError::NoPage)?;
        let script = self.scripts.get(url).ok_or(SessionError::NoPage)?;
        let idx = (*depth).min(script.frames.len().saturating_sub(1));
        let html = script.frames.get(idx).map(String::as_str).unwrap_or("");
        Ok((script, html, *depth))
    }
}

#[async_trait]
impl PageSession for ScriptedSession {
    async fn navigate(&mut self, url: &str, _wait: WaitMode, timeout: Duration) -> SessionResult<()> {
        self.navigations.push(url.to_string());
        if !self.scripts.contains_key(url) {
            return Err(SessionError::Navigation {
                url: url.to_string(),
                message: "no such page".into(),
            });
        }
        self.current = Some((url.to_string(), 0));
        if self.scripts[url].navigation_times_out {
            return Err(SessionError::timeout(format!("navigation to {url}"), timeout));
        }
        Ok(())
    }

    async fn wait_for_selector(&mut self, selector: &str, timeout: Duration) -> SessionResult<()> {
        let (_, html, _) = self.frame()?;
        if select_document(html, selector)?.is_empty() {
            Err(SessionError::timeout(format!("selector {selector}"), timeout))
        } else {
            Ok(())
        }
    }

    async fn locate_all(&mut self, selector: &str) -> SessionResult<Vec<Box<dyn PageElement>>> {
        self.enumerations += 1;
        let (script, html, depth) = self.frame()?;
        if script.fail_at_depth == Some(depth) {
            return Err(SessionError::Network("connection reset".into()));
        }
        Ok(select_document(html, selector)?
            .into_iter()
            .map(SnapshotElement::boxed)
            .collect())
    }

    async fn scroll_to_bottom(&mut self) -> SessionResult<()> {
        self.scrolls += 1;
        match self.current.as_mut() {
            Some((_, depth)) => {
                *depth += 1;
                Ok(())
            }
            None => Err(SessionError::NoPage),
        }
    }

    async fn capture(&mut self) -> SessionResult<Vec<u8>> {
        self.captures += 1;
        Ok(b"\x89PNG".to_vec())
    }
}

/// Transport that records every message and answers from a script
/// (`Ok` once the script runs out).
#[derive(Clone, Default)]
pub struct RecordingTransport {
    pub sent: Arc<Mutex<Vec<OutboundMessage>>>,
    replies: Arc<Mutex<VecDeque<Result<(), TransportError>>>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replying(replies: Vec<Result<(), TransportError>>) -> Self {
        Self {
            sent: Arc::default(),
            replies: Arc::new(Mutex::new(replies.into())),
        }
    }

    pub fn messages(&self) -> Vec<OutboundMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationTransport for RecordingTransport {
    async fn send(&self, message: &OutboundMessage) -> Result<(), TransportError> {
        self.sent.lock().unwrap().push(message.clone());
        self.replies.lock().unwrap().pop_front().unwrap_or(Ok(()))
    }
}

#[derive(Default)]
pub struct EventLog {
    events: Mutex<Vec<MonitorEvent>>,
}

impl EventLog {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<MonitorEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, pred: impl Fn(&MonitorEvent) -> bool) -> usize {
        self.events().iter().filter(|e| pred(e)).count()
    }
}

impl MonitorObserver for EventLog {
    fn on_event(&self, event: &MonitorEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}
