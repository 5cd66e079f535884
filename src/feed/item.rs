// Feed item model.
//
// An item is immutable once built. Its id always comes from the item's own
// canonical link, never from position or content.

use chrono::NaiveDateTime;
use thiserror::Error;

/// Path marker that precedes the item id in a canonical item link.
pub const ID_MARKER: &str = "/status/";

/// Why an item could not be built.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ItemError {
    #[error("item field `{0}` is empty")]
    EmptyField(&'static str),
}

/// One entry of a source's feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    id: String,
    text: String,
    url: String,
    source: String,
    timestamp: NaiveDateTime,
}

impl Item {
    /// Build an item. `id`, `url`, and `source` must be non-blank; `text`
    /// may be empty (media-only entries have no text).
    pub fn new(
        id: impl Into<String>,
        text: impl Into<String>,
        url: impl Into<String>,
        source: impl Into<String>,
        timestamp: NaiveDateTime,
    ) -> Result<Self, ItemError> {
        let id = id.into();
        let url = url.into();
        let source = source.into();

        if id.trim().is_empty() {
            return Err(ItemError::EmptyField("id"));
        }
        if url.trim().is_empty() {
            return Err(ItemError::EmptyField("url"));
        }
        if source.trim().is_empty() {
            return Err(ItemError::EmptyField("source"));
        }

        Ok(Self {
            id,
            text: text.into(),
            url,
            source,
            timestamp,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn timestamp(&self) -> NaiveDateTime {
        self.timestamp
    }
}

/// Extract the item id from a canonical item link.
///
/// The id is the segment right after `/status/`, cut at the first `?`, `#`
/// or `/`. Returns `None` when the link has no marker or the segment is empty.
///
/// ```
/// use feedwatch::feed::item::extract_item_id;
/// assert_eq!(extract_item_id("/someone/status/1789?s=20"), Some("1789"));
/// assert_eq!(extract_item_id("/someone/likes"), None);
/// ```
pub fn extract_item_id(href: &str) -> Option<&str> {
    let (_, tail) = href.rsplit_once(ID_MARKER)?;
    let id = tail
        .split(['?', '#', '/'])
        .next()
        .unwrap_or_default()
        .trim();
    if id.is_empty() {
        None
    } else {
        Some(id)
    }
}

/// Links to an item's analytics view share the `/status/` marker but are not
/// the item's canonical link.
pub fn is_canonical_item_link(href: &str) -> bool {
    href.contains(ID_MARKER) && !href.trim_end_matches('/').ends_with("/analytics")
}

/// Resolve a possibly relative item link against the feed's base URL.
pub fn absolute_url(base_url: &str, href: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
        href.to_string()
    } else if href.starts_with('/') {
        format!("{}{}", base_url.trim_end_matches('/'), href)
    } else {
        format!("{}/{}", base_url.trim_end_matches('/'), href)
    }
}
