use chrono::{DateTime, Utc};
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;

use crate::models::NewPost;

use super::text::display_text;

const POST_SELECTOR: &str = "section > article";
const METADATA_ATTR: &str = "data-ft";
const ID_FIELD: &str = "top_level_post_id";

/// Extract the posts of one feed page, in page order (newest first).
///
/// Pure: no I/O. Fragments without usable metadata are skipped rather than
/// failing the page. `feed_position` is left at the index within the page;
/// the walker renumbers it across pages.
pub fn extract_posts(markup: &str, extracted_at: DateTime<Utc>) -> Vec<NewPost> {
    let document = Html::parse_document(markup);
    let Ok(selector) = Selector::parse(POST_SELECTOR) else {
        return Vec::new();
    };

    document
        .select(&selector)
        .filter_map(|article| parse_article(article, extracted_at))
        .enumerate()
        .map(|(index, mut post)| {
            post.feed_position = index as i64;
            post
        })
        .collect()
}

fn parse_article(article: ElementRef, extracted_at: DateTime<Utc>) -> Option<NewPost> {
    let Some(raw_metadata) = article.value().attr(METADATA_ATTR) else {
        tracing::debug!("Skipping article without {} attribute", METADATA_ATTR);
        return None;
    };

    let metadata: Value = match serde_json::from_str(raw_metadata) {
        Ok(v) => v,
        Err(e) => {
            tracing::debug!("Skipping article with malformed metadata: {}", e);
            return None;
        }
    };

    let Some(id) = post_id(&metadata) else {
        tracing::debug!("Skipping article without a post id");
        return None;
    };

    let raw_content = markup_without_footer(article);
    let display_text = display_text(&raw_content);

    Some(NewPost {
        id,
        raw_content,
        metadata,
        display_text,
        extracted_at,
        feed_position: 0,
    })
}

/// Ids end up as the path of the post's link, so only plain tokens pass.
fn post_id(metadata: &Value) -> Option<String> {
    let id = match metadata.get(ID_FIELD)? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };

    let plain = !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    plain.then_some(id)
}

/// The article's markup with its `<footer>` (reactions, share links) left out.
fn markup_without_footer(article: ElementRef) -> String {
    article
        .children()
        .filter_map(ElementRef::wrap)
        .filter(|child| child.value().name() == "footer")
        .fold(article.html(), |markup, footer| {
            markup.replacen(&footer.html(), "", 1)
        })
}
