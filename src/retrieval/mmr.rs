//! MMR-light diversity rerank (§4.3): greedily walks the fused ranking,
//! dropping a hit if it is too textually similar to one already kept or if
//! its document has already contributed its cap of hits. Similarity is
//! Jaccard over the first 40 whitespace tokens, not a full MMR optimization
//! over embeddings — cheap enough to run on every request.

use crate::models::SearchHit;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

const TOKEN_WINDOW: usize = 40;
const SIMILARITY_THRESHOLD: f64 = 0.6;
const PER_DOCUMENT_CAP: usize = 2;

fn token_set(text: &str) -> HashSet<String> {
    text.split_whitespace().take(TOKEN_WINDOW).map(|t| t.to_lowercase()).collect()
}

fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count() as f64;
    let union = a.union(b).count() as f64;
    if union == 0.0 {
        0.0
    } else {
        intersection / union
    }
}

pub fn diversify(ranked: Vec<SearchHit>, pool_size: usize) -> Vec<SearchHit> {
    let mut kept: Vec<SearchHit> = Vec::new();
    let mut kept_tokens: Vec<HashSet<String>> = Vec::new();
    let mut per_document: HashMap<Uuid, usize> = HashMap::new();

    for hit in ranked {
        if kept.len() >= pool_size {
            break;
        }
        let doc_count = per_document.get(&hit.document_id).copied().unwrap_or(0);
        if doc_count >= PER_DOCUMENT_CAP {
            continue;
        }
        let tokens = token_set(&hit.text);
        let too_similar = kept_tokens.iter().any(|existing| jaccard(existing, &tokens) > SIMILARITY_THRESHOLD);
        if too_similar {
            continue;
        }
        *per_document.entry(hit.document_id).or_insert(0) += 1;
        kept_tokens.push(tokens);
        kept.push(hit);
    }

    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SearchMethod;
    use serde_json::json;

    fn hit(document_id: Uuid, text: &str) -> SearchHit {
        SearchHit {
            chunk_id: Uuid::now_v7(),
            document_id,
            text: text.to_string(),
            meta: json!({}),
            score: 1.0,
            rank: 1,
            search_method: SearchMethod::Hybrid,
        }
    }

    #[test]
    fn caps_hits_per_document() {
        let doc = Uuid::now_v7();
        let hits = vec![
            hit(doc, "alpha beta gamma"),
            hit(doc, "delta epsilon zeta"),
            hit(doc, "eta theta iota"),
        ];
        let diversified = diversify(hits, 10);
        assert_eq!(diversified.len(), 2);
    }

    #[test]
    fn drops_near_duplicate_text() {
        let hits = vec![
            hit(Uuid::now_v7(), "the quick brown fox jumps over the lazy dog"),
            hit(Uuid::now_v7(), "the quick brown fox jumps over the lazy cat"),
        ];
        let diversified = diversify(hits, 10);
        assert_eq!(diversified.len(), 1);
    }
}
