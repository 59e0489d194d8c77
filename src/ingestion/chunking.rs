//! Fixed-window chunking with overlap (§4.4). A leading `key: value` block
//! (category/price/city/operation, one per line, terminated by a blank
//! line) is parsed once per revision and copied onto every chunk's `meta`
//! so retrieval's slot-derived filters (§4.3) have something to match on.

use serde_json::{Map, Value};
use unicode_normalization::UnicodeNormalization;

pub struct ChunkPlan {
    pub position: i32,
    pub text: String,
}

pub fn plan_chunks(content: &str, window: usize, overlap: usize) -> Vec<ChunkPlan> {
    let body = strip_meta_block(content);
    let chars: Vec<char> = body.chars().collect();
    if chars.is_empty() {
        return vec![];
    }

    let stride = window.saturating_sub(overlap).max(1);
    let mut plans = Vec::new();
    let mut start = 0usize;
    let mut position = 0i32;

    while start < chars.len() {
        let end = (start + window).min(chars.len());
        let text: String = chars[start..end].iter().collect();
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            plans.push(ChunkPlan { position, text: trimmed.to_string() });
            position += 1;
        }
        if end == chars.len() {
            break;
        }
        start += stride;
    }

    plans
}

/// Parses the leading `key: value` block, if present, returning it as a
/// `meta` jsonb object alongside the remaining body text.
pub fn extract_meta_block(content: &str) -> (Value, &str) {
    let mut meta = Map::new();
    let mut consumed_lines = 0;

    for line in content.lines() {
        if line.trim().is_empty() {
            break;
        }
        match line.split_once(':') {
            Some((key, value)) if is_meta_key(key.trim()) => {
                meta.insert(key.trim().to_lowercase(), Value::String(value.trim().to_string()));
                consumed_lines += 1;
            }
            _ => break,
        }
    }

    if consumed_lines == 0 {
        return (Value::Object(meta), content);
    }

    let body = content
        .lines()
        .skip(consumed_lines)
        .skip_while(|l| l.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n");
    let body_start = content.find(&body).unwrap_or(0);
    (Value::Object(meta), &content[body_start..])
}

fn strip_meta_block(content: &str) -> String {
    let (_, body) = extract_meta_block(content);
    // Accent-fold so a chunk's text participates in the same accent-blind
    // lexical search as the tsv column (§4.3).
    body.nfc().collect()
}

fn is_meta_key(key: &str) -> bool {
    matches!(key, "category" | "categoria" | "price" | "city" | "zone" | "operation")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_leading_meta_block() {
        let content = "category: menu\nprice: 12.50\n\nActual body text here.";
        let (meta, body) = extract_meta_block(content);
        assert_eq!(meta["category"], "menu");
        assert_eq!(meta["price"], "12.50");
        assert_eq!(body.trim(), "Actual body text here.");
    }

    #[test]
    fn no_meta_block_leaves_body_untouched() {
        let content = "Just a plain document with no header.";
        let (meta, body) = extract_meta_block(content);
        assert!(meta.as_object().unwrap().is_empty());
        assert_eq!(body, content);
    }

    #[test]
    fn overlapping_windows_cover_whole_document() {
        let body = "a".repeat(2000);
        let plans = plan_chunks(&body, 800, 150);
        assert!(plans.len() >= 3);
        assert_eq!(plans[0].position, 0);
    }
}
