//! Text cleanup applied to stored content before it can become a description.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use scraper::Html;

static SCRIPT_STYLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<script\b[^>]*>.*?</script\s*>|<style\b[^>]*>.*?</style\s*>|<!--.*?-->")
        .expect("script/style pattern")
});

static BLOCK_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)</?(?:p|div|br|hr|li|ul|ol|h[1-6]|tr|td|th|table|blockquote|section|article|figure|figcaption|pre)\b[^>]*>",
    )
    .expect("block tag pattern")
});

static ANY_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("tag pattern"));

static SHORTCODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[/?[A-Za-z][\w-]*(?:\s[^\]]*)?/?\]").expect("shortcode pattern"));

static URL_PARAGRAPH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<p\b[^>]*>\s*(\S+?)\s*</p\s*>").expect("paragraph pattern"));

static ENTITY_AT_START: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^&(?:#[xX][0-9a-fA-F]{1,6}|#[0-9]{1,7}|[a-zA-Z][a-zA-Z0-9]{1,31});")
        .expect("entity prefix pattern")
});

/// Removes tags. Script and style blocks lose their contents too; block-level
/// tags leave a space behind so adjacent paragraphs don't fuse into one word.
pub fn strip_tags(html: &str) -> String {
    let s = SCRIPT_STYLE.replace_all(html, " ");
    let s = BLOCK_TAG.replace_all(&s, " ");
    ANY_TAG.replace_all(&s, "").into_owned()
}

pub fn strip_shortcodes(text: &str) -> String {
    SHORTCODE.replace_all(text, "").into_owned()
}

pub fn is_url(candidate: &str) -> bool {
    match url::Url::parse(candidate) {
        Ok(u) => matches!(u.scheme(), "http" | "https") && u.host().is_some(),
        Err(_) => false,
    }
}

/// Drops lines that hold nothing but a URL (auto-embeds).
pub fn strip_newline_urls(text: &str) -> String {
    text.lines()
        .filter(|line| !is_url(line.trim()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Drops paragraphs whose only content is a URL.
pub fn strip_paragraph_urls(html: &str) -> String {
    URL_PARAGRAPH
        .replace_all(html, |caps: &Captures| {
            if is_url(&caps[1]) {
                String::new()
            } else {
                caps[0].to_string()
            }
        })
        .into_owned()
}

pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Decodes numeric and named character references, the whole HTML5 table
/// included. Literal `<` is escaped first so markup stays text. Unknown
/// references are kept as-is.
pub fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    let fragment = Html::parse_fragment(&text.replace('<', "&lt;"));
    fragment.root_element().text().collect()
}

/// Character length as a reader would see it, entities counting as one.
pub fn decoded_len(text: &str) -> usize {
    decode_entities(text).chars().count()
}

/// Plain text for excerpts that may carry markup: post bodies, excerpts and bios.
pub fn excerpt_text(raw: &str) -> String {
    let s = strip_shortcodes(raw);
    let s = strip_tags(&s);
    normalize_whitespace(&decode_entities(&s))
}

/// Term and archive descriptions. Markup isn't expected here but is still removed.
pub fn description_text(raw: &str) -> String {
    normalize_whitespace(&decode_entities(&strip_tags(raw)))
}

/// HTML-escapes a description for attribute output. Existing entities are left intact.
pub fn escape_description(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for (i, c) in text.char_indices() {
        match c {
            '&' if ENTITY_AT_START.is_match(&text[i..]) => out.push('&'),
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            _ => out.push(c),
        }
    }
    out
}
