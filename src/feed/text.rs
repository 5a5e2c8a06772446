use std::sync::OnceLock;

use regex::Regex;

// Wide enough that html2text never wraps a paragraph.
const TEXT_WIDTH: usize = 4096;

static FOOTNOTE_LINE: OnceLock<Regex> = OnceLock::new();
static FOOTNOTE_REF: OnceLock<Regex> = OnceLock::new();

/// Convert post markup into plain text fit for a chat message.
///
/// Link targets, images and markdown decoration are dropped, as are
/// characters outside letters, digits, whitespace and ASCII punctuation.
/// Lines without any letter or digit are removed.
pub fn display_text(html: &str) -> String {
    let text = match html2text::from_read(html.as_bytes(), TEXT_WIDTH) {
        Ok(t) => t,
        Err(e) => {
            tracing::debug!("Failed to convert HTML to text: {}", e);
            return String::new();
        }
    };

    let footnote_line = FOOTNOTE_LINE
        .get_or_init(|| Regex::new(r"(?m)^\s*\[\d+\]:.*$").expect("valid footnote pattern"));
    let footnote_ref =
        FOOTNOTE_REF.get_or_init(|| Regex::new(r"\[\d+\]").expect("valid footnote pattern"));

    let text = footnote_line.replace_all(&text, "");
    let text = footnote_ref.replace_all(&text, "");

    let text: String = text
        .chars()
        .filter(|c| !matches!(*c, '#' | '*' | '_' | '[' | ']' | '`'))
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || c.is_ascii_punctuation())
        .collect();

    text.lines()
        .map(str::trim)
        .filter(|line| line.chars().any(char::is_alphanumeric))
        .collect::<Vec<_>>()
        .join("\n")
}
