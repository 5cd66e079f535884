// Message formatting: the rich (HTML) notification for an item and the
// plain-text rendition used when the transport refuses the markup.

use std::sync::OnceLock;

use regex_lite::Regex;

use crate::feed::Item;
use crate::output::truncate_chars;

/// Item text beyond this many characters is cut to keep messages short.
pub const MAX_TEXT_CHARS: usize = 1000;

/// Build the HTML message for one item, ending with the source tag.
pub fn rich_message(item: &Item) -> String {
    let text = truncate_chars(item.text(), MAX_TEXT_CHARS);
    format!(
        "<b>New post!</b>\n\n<b>Source:</b> {source}\n<b>Content:</b>\n{text}\n\n\
         <a href='{url}'>View original</a>\n\n{tag}",
        source = html_escape::encode_text(item.source()),
        text = html_escape::encode_text(&text),
        url = html_escape::encode_single_quoted_attribute(item.url()),
        tag = source_tag(item.source()),
    )
}

/// Hashtag naming the source. Characters a hashtag can't hold become `_`.
pub fn source_tag(source: &str) -> String {
    let cleaned: String = source
        .trim_start_matches('@')
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    format!("#{cleaned}")
}

/// Remove markup: bold text keeps its content, links become `text (url)`,
/// any other tag is dropped, and entities are decoded.
pub fn strip_markup(html: &str) -> String {
    static LINK: OnceLock<Regex> = OnceLock::new();
    static TAG: OnceLock<Regex> = OnceLock::new();
    let link = LINK.get_or_init(|| {
        Regex::new(r#"(?s)<a\s+href=['"]([^'"]*)['"][^>]*>(.*?)</a>"#).expect("link pattern is valid")
    });
    let tag = TAG.get_or_init(|| Regex::new(r"</?[a-zA-Z][^>]*>").expect("tag pattern is valid"));

    let out = link.replace_all(html, "$2 ($1)");
    let out = tag.replace_all(&out, "");
    html_escape::decode_html_entities(&out).into_owned()
}
