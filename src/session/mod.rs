// Page automation seam.
//
// The collector only needs a page-like handle that can navigate, wait for an
// element, enumerate elements, scroll, and read attributes and text. How the
// page is rendered (and how the session keeps its identity) lives behind
// these traits.

pub mod browserless;
pub mod snapshot;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub type SessionResult<T> = std::result::Result<T, SessionError>;

/// When navigation is considered finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WaitMode {
    Load,
    DomContentLoaded,
    /// No network activity for a short while.
    #[default]
    NetworkIdle,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("timed out after {}ms waiting for {what}", .timeout.as_millis())]
    Timeout { what: String, timeout: Duration },

    #[error("navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },

    #[error("invalid selector `{selector}`: {message}")]
    InvalidSelector { selector: String, message: String },

    #[error("no page has been loaded")]
    NoPage,

    #[error("network error: {0}")]
    Network(String),

    #[error("automation API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("operation not supported by this session: {0}")]
    Unsupported(&'static str),
}

impl SessionError {
    pub fn timeout(what: impl Into<String>, timeout: Duration) -> Self {
        SessionError::Timeout {
            what: what.into(),
            timeout,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, SessionError::Timeout { .. })
    }
}

/// One element on the rendered page.
#[async_trait]
pub trait PageElement: Send + Sync {
    /// Attribute value, or `None` when the attribute is absent.
    async fn attribute(&self, name: &str) -> SessionResult<Option<String>>;

    /// Rendered text of the element and its descendants.
    async fn inner_text(&self) -> SessionResult<String>;

    /// Descendant elements matching a CSS selector, in document order.
    async fn locate_all(&self, selector: &str) -> SessionResult<Vec<Box<dyn PageElement>>>;

    async fn locate_first(&self, selector: &str) -> SessionResult<Option<Box<dyn PageElement>>> {
        Ok(self.locate_all(selector).await?.into_iter().next())
    }
}

/// A page-automation session. One session is driven by one caller at a time.
#[async_trait]
pub trait PageSession: Send {
    async fn navigate(&mut self, url: &str, wait: WaitMode, timeout: Duration)
        -> SessionResult<()>;

    /// Wait until at least one element matches `selector`.
    async fn wait_for_selector(&mut self, selector: &str, timeout: Duration) -> SessionResult<()>;

    /// All currently rendered elements matching `selector`, in document order.
    async fn locate_all(&mut self, selector: &str) -> SessionResult<Vec<Box<dyn PageElement>>>;

    async fn scroll_to_bottom(&mut self) -> SessionResult<()>;

    /// Image of the current page, used as a failure capture.
    async fn capture(&mut self) -> SessionResult<Vec<u8>> {
        Err(SessionError::Unsupported("capture"))
    }
}
