//! Sentence-boundary trimming.
//!
//! Cuts text to a character budget without splitting words, then cleans up
//! the tail: short clauses trailing off after a punctuation mark are dropped,
//! a dangling semicolon becomes a period, and an unfinished tail gets an
//! ellipsis. Lengths are counted in Unicode scalar values.

use once_cell::sync::Lazy;
use regex::Regex;
use unicode_segmentation::UnicodeSegmentation;

/// One boundary character: other-punctuation or any separator.
static BOUNDARY: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\p{Po}\p{Z}]").expect("boundary pattern"));

static PUNCT_BEFORE_WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\p{Po}\p{Z}?\w").expect("punct-word pattern"));

/// Group 1: everything up to the last punctuation mark followed by a word.
/// Group 2: that mark. Group 3: whatever follows the first three words.
static TRAILING_CLAUSE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)(.+)(\p{Po})\p{Z}?(?:\w+\p{Z}?){1,3}(.+)?").expect("trailing clause pattern")
});

/// A semicolon followed by at most three words and closing punctuation.
static SEMICOLON_AFTERTHOUGHT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^(.+;)\p{Z}?(?:\w+\p{Z}?){1,3}\p{Po}{1,3}$").expect("afterthought pattern")
});

static ENDS_IN_PUNCT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\p{Po}$").expect("end punct pattern"));

const ELLIPSIS: &str = "...";

/// Marks pulled in after a boundary mark, so `...` and `?!` stay whole.
const MAX_TRAILING_MARKS: usize = 2;

fn is_comma_or_space(c: char) -> bool {
    c == ',' || c.is_whitespace()
}

fn is_connector(c: char) -> bool {
    matches!(c, '\\' | '/' | ',' | '.' | '?' | '!' | ';') || c.is_whitespace()
}

fn is_punct(c: char) -> bool {
    let mut buf = [0u8; 4];
    ENDS_IN_PUNCT.is_match(c.encode_utf8(&mut buf))
}

/// Longest prefix of at most `max_chars` characters that is followed by a
/// boundary character, that character included. Falls back to a hard cut at
/// the last grapheme boundary within budget.
fn boundary_prefix(text: &str, max_chars: usize) -> &str {
    // Byte offset of the first character past the budget.
    let limit = match text.char_indices().nth(max_chars) {
        Some((byte, _)) => byte,
        None => return text,
    };

    let found = BOUNDARY
        .find_iter(text)
        .take_while(|m| m.start() <= limit)
        .last();

    match found {
        Some(m) => {
            let mut end = m.end();
            if is_punct(text[m.start()..].chars().next().unwrap_or(' ')) {
                for c in text[end..].chars().take(MAX_TRAILING_MARKS) {
                    if !is_punct(c) {
                        break;
                    }
                    end += c.len_utf8();
                }
            }
            &text[..end]
        }
        None => {
            let end = text
                .grapheme_indices(true)
                .map(|(i, _)| i)
                .take_while(|&i| i <= limit)
                .last()
                .filter(|&i| i > 0)
                .unwrap_or(limit);
            &text[..end]
        }
    }
}

/// Drops a clause of one to three words trailing the last punctuation mark,
/// keeping the mark itself. Longer tails are kept.
fn drop_trailing_clause(text: &str) -> String {
    if !PUNCT_BEFORE_WORD.is_match(text) {
        return text.to_string();
    }
    match TRAILING_CLAUSE.captures(text) {
        Some(caps) if caps.get(3).map_or(true, |m| m.as_str().is_empty()) => {
            let start = caps.get(0).map_or(0, |m| m.start());
            format!("{}{}{}", &text[..start], &caps[1], &caps[2])
        }
        _ => text.to_string(),
    }
}

/// Semicolons read as unfinished; everything else without a closing mark
/// gets an ellipsis.
fn close(text: &str) -> String {
    if text.ends_with(';') {
        let head = text.trim_end_matches(is_connector);
        if head.is_empty() {
            String::new()
        } else {
            format!("{head}.")
        }
    } else if !text.is_empty() && !ENDS_IN_PUNCT.is_match(text) {
        format!("{text}{ELLIPSIS}")
    } else {
        text.to_string()
    }
}

/// Trims `text` to roughly `max_chars` characters at a word or punctuation
/// boundary. The result never exceeds `max_chars + 3` characters.
pub fn trim_to_boundary(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    if text.is_empty() || max_chars == 0 {
        return String::new();
    }

    let prefix = boundary_prefix(text, max_chars);
    let trimmed = prefix.trim_matches(is_comma_or_space);
    let pruned = drop_trailing_clause(trimmed);
    let mut excerpt = close(pruned.trim_end_matches(is_comma_or_space));

    // A short afterthought behind a semicolon at the very end of the budget
    // is cut off as well.
    while excerpt.chars().count() >= max_chars {
        let Some(head) = SEMICOLON_AFTERTHOUGHT
            .captures(&excerpt)
            .map(|caps| caps[1].to_string())
        else {
            break;
        };
        excerpt = close(&head);
    }

    excerpt.trim().to_string()
}
