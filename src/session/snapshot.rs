// Elements backed by a static HTML snapshot.
//
// Rendering services hand back the page as serialized HTML. Each matched
// element keeps its own outer HTML and is re-parsed on demand, so handles are
// plain owned strings that can cross await points.

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};

use super::{PageElement, SessionError, SessionResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotElement {
    html: String,
}

impl SnapshotElement {
    pub fn new(outer_html: impl Into<String>) -> Self {
        Self {
            html: outer_html.into(),
        }
    }

    pub fn boxed(self) -> Box<dyn PageElement> {
        Box::new(self)
    }
}

pub fn parse_selector(selector: &str) -> SessionResult<Selector> {
    Selector::parse(selector).map_err(|e| SessionError::InvalidSelector {
        selector: selector.to_string(),
        message: format!("{e:?}"),
    })
}

/// Every element of a full document matching `selector`.
pub fn select_document(html: &str, selector: &str) -> SessionResult<Vec<SnapshotElement>> {
    let selector = parse_selector(selector)?;
    let document = Html::parse_document(html);
    Ok(document
        .select(&selector)
        .map(|el| SnapshotElement::new(el.html()))
        .collect())
}

fn select_fragment(html: &str, selector: &str) -> SessionResult<Vec<SnapshotElement>> {
    let selector = parse_selector(selector)?;
    let fragment = Html::parse_fragment(html);
    let Some(own) = first_element(&fragment) else {
        return Ok(Vec::new());
    };
    // Descendants only: the element itself is not part of its own subtree.
    Ok(own
        .select(&selector)
        .filter(|el| el.id() != own.id())
        .map(|el| SnapshotElement::new(el.html()))
        .collect())
}

fn first_element(fragment: &Html) -> Option<ElementRef<'_>> {
    fragment.root_element().children().find_map(ElementRef::wrap)
}

fn read_attribute(html: &str, name: &str) -> Option<String> {
    let fragment = Html::parse_fragment(html);
    first_element(&fragment).and_then(|el| el.value().attr(name).map(str::to_string))
}

fn read_text(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    first_element(&fragment)
        .map(|el| el.text().collect::<String>())
        .unwrap_or_default()
        .trim()
        .to_string()
}

#[async_trait]
impl PageElement for SnapshotElement {
    async fn attribute(&self, name: &str) -> SessionResult<Option<String>> {
        Ok(read_attribute(&self.html, name))
    }

    async fn inner_text(&self) -> SessionResult<String> {
        Ok(read_text(&self.html))
    }

    async fn locate_all(&self, selector: &str) -> SessionResult<Vec<Box<dyn PageElement>>> {
        Ok(select_fragment(&self.html, selector)?
            .into_iter()
            .map(SnapshotElement::boxed)
            .collect())
    }
}
