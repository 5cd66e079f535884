// Paginated collection over one source's rendered feed.
//
// The page only renders a slice of the feed at a time; scrolling to the
// bottom loads more. Each pass enumerates what is currently rendered, picks
// up items not seen earlier in this call, then decides whether to keep
// scrolling. The loop is bounded by the scroll budget, so a call performs at
// most `max_scroll_attempts + 1` enumerations.
//
// Output is deduplicated by id within the call but is NOT filtered by time
// window or against the persisted seen set; callers do that.

use std::collections::HashSet;
use std::time::Duration;

use chrono::NaiveDateTime;
use thiserror::Error;

use super::item::{absolute_url, extract_item_id, is_canonical_item_link, Item, ItemError};
use super::time::{parse_time, ParsedTime, TimeSignal};
use crate::observe::{MonitorEvent, MonitorObserver};
use crate::session::{PageElement, PageSession, SessionError, WaitMode};

/// Consecutive passes without a new item before the feed is considered exhausted.
pub const STALL_LIMIT: usize = 2;

pub const DEFAULT_NAVIGATION_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_SELECTOR_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(3);

/// Where a source's feed lives and how its items are marked up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedLayout {
    pub base_url: String,
    /// One rendered feed entry.
    pub item_selector: String,
    /// Links inside an entry; the canonical one carries the item id.
    pub link_selector: String,
    pub time_selector: String,
    pub text_selector: String,
}

impl Default for FeedLayout {
    fn default() -> Self {
        Self::with_base_url("https://x.com")
    }
}

impl FeedLayout {
    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            item_selector: "article[data-testid='tweet']".to_string(),
            link_selector: "a[href*='/status/']".to_string(),
            time_selector: "time".to_string(),
            text_selector: "[data-testid='tweetText']".to_string(),
        }
    }

    pub fn source_url(&self, source: &str) -> String {
        format!("{}/{}", self.base_url, source.trim_start_matches('@'))
    }
}

/// Per-call limits and timing.
#[derive(Debug, Clone)]
pub struct CollectOptions {
    pub max_items: usize,
    pub max_scroll_attempts: usize,
    /// Items older than this signal the end of in-window content.
    pub cutoff: NaiveDateTime,
    /// Reference time for relative timestamps.
    pub now: NaiveDateTime,
    pub wait_mode: WaitMode,
    pub navigation_timeout: Duration,
    pub selector_timeout: Duration,
    pub settle_delay: Duration,
}

impl CollectOptions {
    pub fn new(now: NaiveDateTime, cutoff: NaiveDateTime) -> Self {
        Self {
            max_items: 50,
            max_scroll_attempts: 5,
            cutoff,
            now,
            wait_mode: WaitMode::NetworkIdle,
            navigation_timeout: DEFAULT_NAVIGATION_TIMEOUT,
            selector_timeout: DEFAULT_SELECTOR_TIMEOUT,
            settle_delay: DEFAULT_SETTLE_DELAY,
        }
    }
}

/// Why a collection call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// An item older than the cutoff appeared after at least one was collected.
    OutOfWindow,
    /// `STALL_LIMIT` consecutive passes found nothing new.
    Stalled,
    /// The per-source item cap was reached.
    Saturated,
    /// The scroll budget ran out.
    ScrollLimit,
    /// No feed entry rendered before the selector wait timed out.
    NothingRendered,
    /// A session error aborted the call.
    Failed,
}

/// A session error that cut a collection short, plus a capture of the page
/// when one could be taken.
#[derive(Debug)]
pub struct CollectionFailure {
    pub error: SessionError,
    pub capture: Option<Vec<u8>>,
}

/// Result of one `collect` call.
#[derive(Debug)]
pub struct Collection {
    pub source: String,
    pub items: Vec<Item>,
    pub stop: StopReason,
    pub enumerations: usize,
    pub scrolls: usize,
    pub skipped: usize,
    pub failure: Option<CollectionFailure>,
}

impl Collection {
    fn empty(source: &str, stop: StopReason) -> Self {
        Self {
            source: source.to_string(),
            items: Vec::new(),
            stop,
            enumerations: 0,
            scrolls: 0,
            skipped: 0,
            failure: None,
        }
    }

    pub fn newest(&self) -> Option<NaiveDateTime> {
        self.items.iter().map(Item::timestamp).max()
    }

    pub fn oldest(&self) -> Option<NaiveDateTime> {
        self.items.iter().map(Item::timestamp).min()
    }
}

/// Why one rendered entry could not become an item.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("entry has no canonical item link")]
    MissingLink,

    #[error("item link `{0}` carries no id")]
    MalformedLink(String),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Invalid(#[from] ItemError),
}

/// Collect candidate items for `source`.
///
/// Never fails outright: a timeout while waiting for the first entry yields
/// an empty collection, and a session error mid-way returns what was
/// gathered so far with the failure attached.
pub async fn collect(
    session: &mut dyn PageSession,
    layout: &FeedLayout,
    source: &str,
    options: &CollectOptions,
    observer: &dyn MonitorObserver,
) -> Collection {
    let url = layout.source_url(source);

    match session
        .navigate(&url, options.wait_mode, options.navigation_timeout)
        .await
    {
        Ok(()) => {}
        Err(e) if e.is_timeout() => {
            // The page often finishes rendering entries even when the
            // network never goes idle.
            observer.on_event(&MonitorEvent::NavigationTimedOut {
                source: source.to_string(),
                url: url.clone(),
            });
        }
        Err(e) => {
            let empty = Collection::empty(source, StopReason::Failed);
            return abort(session, empty, e, observer).await;
        }
    }

    match session
        .wait_for_selector(&layout.item_selector, options.selector_timeout)
        .await
    {
        Ok(()) => {}
        Err(e) if e.is_timeout() => {
            observer.on_event(&MonitorEvent::NoItemsRendered {
                source: source.to_string(),
                detail: e.to_string(),
            });
            return finish(Collection::empty(source, StopReason::NothingRendered), observer);
        }
        Err(e) => {
            let empty = Collection::empty(source, StopReason::Failed);
            return abort(session, empty, e, observer).await;
        }
    }

    let mut collection = Collection::empty(source, StopReason::ScrollLimit);
    let mut seen_in_call: HashSet<String> = HashSet::new();
    let mut stalls = 0usize;
    // Items at or after the cutoff collected so far.
    let mut in_window = 0usize;

    let stop = loop {
        collection.enumerations += 1;

        let elements = match session.locate_all(&layout.item_selector).await {
            Ok(elements) => elements,
            Err(e) => return abort(session, collection, e, observer).await,
        };

        let mut fresh = 0usize;
        let mut found_old = false;

        for (position, element) in elements.iter().enumerate() {
            if collection.items.len() >= options.max_items {
                break;
            }

            let candidate =
                extract_candidate(element.as_ref(), layout, source, options.now, &seen_in_call)
                    .await;
            match candidate {
                Ok(None) => {}
                Ok(Some(Candidate { item, parsed, raw_time })) => {
                    if parsed.is_fallback() {
                        observer.on_event(&MonitorEvent::TimeFallback {
                            source: source.to_string(),
                            raw: raw_time,
                        });
                    }
                    if item.timestamp() >= options.cutoff {
                        in_window += 1;
                    } else if in_window > 0 {
                        found_old = true;
                    }
                    seen_in_call.insert(item.id().to_string());
                    collection.items.push(item);
                    fresh += 1;
                }
                Err(e) => {
                    collection.skipped += 1;
                    observer.on_event(&MonitorEvent::ItemSkipped {
                        source: source.to_string(),
                        position,
                        error: e.to_string(),
                    });
                }
            }
        }

        observer.on_event(&MonitorEvent::BatchScanned {
            source: source.to_string(),
            enumerated: elements.len(),
            fresh,
            total: collection.items.len(),
        });

        // Feeds render newest first, so anything older below the fold is
        // out of window too.
        if found_old {
            break StopReason::OutOfWindow;
        }

        if fresh == 0 {
            stalls += 1;
            if stalls >= STALL_LIMIT {
                break StopReason::Stalled;
            }
        } else {
            stalls = 0;
        }

        if collection.items.len() >= options.max_items {
            break StopReason::Saturated;
        }

        if collection.scrolls >= options.max_scroll_attempts {
            break StopReason::ScrollLimit;
        }

        if let Err(e) = session.scroll_to_bottom().await {
            return abort(session, collection, e, observer).await;
        }
        collection.scrolls += 1;
        tokio::time::sleep(options.settle_delay).await;
    };

    collection.stop = stop;
    finish(collection, observer)
}

struct Candidate {
    item: Item,
    parsed: ParsedTime,
    raw_time: String,
}

/// Turn one rendered entry into an item. `Ok(None)` means the entry was
/// already picked up earlier in this call.
async fn extract_candidate(
    element: &dyn PageElement,
    layout: &FeedLayout,
    source: &str,
    now: NaiveDateTime,
    seen_in_call: &HashSet<String>,
) -> Result<Option<Candidate>, ExtractionError> {
    let href = canonical_link(element, layout).await?;
    let id = extract_item_id(&href).ok_or_else(|| ExtractionError::MalformedLink(href.clone()))?;
    if seen_in_call.contains(id) {
        return Ok(None);
    }

    let signal = match element.locate_first(&layout.time_selector).await? {
        Some(time) => TimeSignal {
            absolute: time.attribute("datetime").await?,
            relative: Some(time.inner_text().await?).filter(|t| !t.is_empty()),
        },
        None => TimeSignal::default(),
    };
    let parsed = parse_time(&signal, now);

    let text = match element.locate_first(&layout.text_selector).await? {
        Some(text) => text.inner_text().await?,
        None => String::new(),
    };

    let item = Item::new(
        id,
        text,
        absolute_url(&layout.base_url, &href),
        source,
        parsed.instant(),
    )?;
    Ok(Some(Candidate {
        item,
        parsed,
        raw_time: signal.describe(),
    }))
}

async fn canonical_link(
    element: &dyn PageElement,
    layout: &FeedLayout,
) -> Result<String, ExtractionError> {
    for link in element.locate_all(&layout.link_selector).await? {
        if let Some(href) = link.attribute("href").await? {
            if is_canonical_item_link(&href) {
                return Ok(href);
            }
        }
    }
    Err(ExtractionError::MissingLink)
}

async fn abort(
    session: &mut dyn PageSession,
    mut collection: Collection,
    error: SessionError,
    observer: &dyn MonitorObserver,
) -> Collection {
    observer.on_event(&MonitorEvent::CollectionFailed {
        source: collection.source.clone(),
        error: error.to_string(),
        collected: collection.items.len(),
    });
    let capture = session.capture().await.ok();
    collection.stop = StopReason::Failed;
    collection.failure = Some(CollectionFailure { error, capture });
    finish(collection, observer)
}

fn finish(collection: Collection, observer: &dyn MonitorObserver) -> Collection {
    observer.on_event(&MonitorEvent::CollectionStopped {
        source: collection.source.clone(),
        reason: collection.stop,
        collected: collection.items.len(),
        newest: collection.newest(),
        oldest: collection.oldest(),
    });
    collection
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_url_strips_at_sign() {
        let layout = FeedLayout::with_base_url("https://x.com/");
        assert_eq!(layout.source_url("@alice"), "https://x.com/alice");
        assert_eq!(layout.source_url("bob"), "https://x.com/bob");
    }

    #[test]
    fn default_options_match_feed_defaults() {
        let now = chrono::NaiveDate::from_ymd_opt(2025, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let opts = CollectOptions::new(now, now);
        assert_eq!(opts.max_scroll_attempts, 5);
        assert_eq!(opts.wait_mode, WaitMode::NetworkIdle);
        assert_eq!(opts.selector_timeout, DEFAULT_SELECTOR_TIMEOUT);
    }
}
