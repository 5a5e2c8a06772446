use url::Url;

use crate::error::Result;
use crate::models::Post;

/// Telegram rejects longer messages outright.
pub const MAX_MESSAGE_CHARS: usize = 4096;

/// Canonical address of a post: the site root joined with its id.
pub fn post_link(base_url: &Url, post_id: &str) -> Result<Url> {
    Ok(base_url.join(post_id)?)
}

/// The post's display text followed by a markdown link back to it,
/// shortened so the whole message fits in one chat message.
pub fn render_message(post: &Post, base_url: &Url, link_text: &str) -> Result<String> {
    let link = format!("[{}]({})", link_text, post_link(base_url, &post.id)?);

    if post.display_text.is_empty() {
        return Ok(link);
    }

    // Room left for the text once the newline and link are accounted for.
    let room = MAX_MESSAGE_CHARS.saturating_sub(link.chars().count() + 1);
    let text = truncate(&post.display_text, room);

    Ok(format!("{}\n{}", text, link))
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut shortened: String = text.chars().take(max_chars.saturating_sub(1)).collect();
    shortened.push('…');
    shortened
}
