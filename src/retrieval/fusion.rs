//! Reciprocal Rank Fusion of the lexical and vector candidate lists (§4.3).

use crate::models::{SearchHit, SearchMethod};
use std::collections::HashMap;

/// Combines two ranked lists with RRF: `score = sum(1 / (k + rank))` over
/// whichever lists a chunk appears in. `k` dampens the influence of the
/// top rank so a single list's #1 hit doesn't dominate.
pub fn reciprocal_rank_fusion(lexical: &[SearchHit], vector: &[SearchHit], k: u32) -> Vec<SearchHit> {
    let k = k as f64;
    let mut scored: HashMap<uuid::Uuid, (f64, SearchHit)> = HashMap::new();

    for hit in lexical {
        let entry = scored.entry(hit.chunk_id).or_insert_with(|| (0.0, hit.clone()));
        entry.0 += 1.0 / (k + hit.rank as f64);
    }
    for hit in vector {
        let entry = scored.entry(hit.chunk_id).or_insert_with(|| (0.0, hit.clone()));
        entry.0 += 1.0 / (k + hit.rank as f64);
    }

    let mut fused: Vec<(f64, SearchHit)> = scored.into_values().collect();
    fused.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

    fused
        .into_iter()
        .enumerate()
        .map(|(i, (score, mut hit))| {
            hit.score = score;
            hit.rank = i + 1;
            hit.search_method = SearchMethod::Hybrid;
            hit
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;

    fn hit(id: Uuid, rank: usize, method: SearchMethod) -> SearchHit {
        SearchHit {
            chunk_id: id,
            document_id: Uuid::now_v7(),
            text: "text".to_string(),
            meta: json!({}),
            score: 0.0,
            rank,
            search_method: method,
        }
    }

    #[test]
    fn chunk_present_in_both_lists_outranks_single_list_hits() {
        let shared = Uuid::now_v7();
        let lexical_only = Uuid::now_v7();
        let vector_only = Uuid::now_v7();

        let lexical = vec![hit(shared, 2, SearchMethod::Bm25), hit(lexical_only, 1, SearchMethod::Bm25)];
        let vector = vec![hit(shared, 2, SearchMethod::Vector), hit(vector_only, 1, SearchMethod::Vector)];

        let fused = reciprocal_rank_fusion(&lexical, &vector, 60);
        assert_eq!(fused[0].chunk_id, shared);
    }
}
