// Hybrid search
// Fuses BM25 and vector rankings into one scored list, promotes a
// root-cause chunk from query cues, and groups results per file.

pub mod expand;


use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::chunker::ChunkMeta;
use crate::index::{Bm25Index, VectorIndex};
use crate::search::expand::query_file_basenames;

/// Boost for results whose file is named in the query.
const FILENAME_MATCH_BOOST: f64 = 1.5;
/// Boost for chunks that carry import lines.
const IMPORT_BOOST: f64 = 1.2;

/// Weights and depths for hybrid ranking.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HybridConfig {
    pub bm25_weight: f64,
    pub vector_weight: f64,
    /// Results returned to the caller.
    pub top_k: usize,
    /// Each side of the search fetches `expansion_factor * top_k` candidates
    /// before fusion.
    pub expansion_factor: usize,
}

impl Default for HybridConfig {
    #[inline]
    fn default() -> Self {
        Self {
            bm25_weight: 0.3,
            vector_weight: 0.7,
            top_k: 5,
            expansion_factor: 3,
        }
    }
}

/// One fused search hit.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SearchResult {
    pub chunk_id: String,
    pub bm25_score: f64,
    pub vector_score: f64,
    pub combined_score: f64,
    pub meta: ChunkMeta,
}

/// Results for one file, carrying its best and cumulative chunk scores.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FileGroup {
    pub file_path: String,
    pub max_score: f64,
    pub total_score: f64,
    pub chunks: Vec<SearchResult>,
}

/// Run both searches and merge their rankings by chunk id.
///
/// A chunk found by only one side keeps a zero contribution from the other.
/// Output is sorted by combined score descending, ties by chunk id, at most
/// `top_k` entries.
#[inline]
pub fn hybrid_search(
    bm25: &Bm25Index,
    vectors: &VectorIndex,
    query_text: &str,
    query_vector: &[f32],
    config: &HybridConfig,
) -> Vec<SearchResult> {
    let corpus_size = bm25.len().max(vectors.len());
    if corpus_size == 0 {
        return Vec::new();
    }

    let k = config.top_k.min(corpus_size);
    let expanded_k = (config.top_k.saturating_mul(config.expansion_factor)).min(corpus_size);

    let weight_sum = config.bm25_weight + config.vector_weight;
    let (w_bm25, w_vector) = if weight_sum > 0.0 {
        (config.bm25_weight / weight_sum, config.vector_weight / weight_sum)
    } else {
        (0.5, 0.5)
    };

    let bm25_hits = bm25.search(query_text, expanded_k);
    let vector_hits = vectors.search(query_vector, expanded_k);
    debug!(
        "Fusing {} BM25 hits with {} vector hits",
        bm25_hits.len(),
        vector_hits.len()
    );

    fuse(bm25_hits, vector_hits, w_bm25, w_vector, k)
}

/// Merge the two ranked lists by chunk id and apply the weighted sum.
fn fuse(
    bm25_hits: Vec<(String, f64, ChunkMeta)>,
    vector_hits: Vec<(u32, f64, ChunkMeta)>,
    w_bm25: f64,
    w_vector: f64,
    k: usize,
) -> Vec<SearchResult> {
    let mut merged: HashMap<String, SearchResult> = HashMap::new();

    for (chunk_id, score, meta) in bm25_hits {
        merged.insert(
            chunk_id.clone(),
            SearchResult {
                chunk_id,
                bm25_score: score,
                vector_score: 0.0,
                combined_score: 0.0,
                meta,
            },
        );
    }

    for (_, score, meta) in vector_hits {
        let chunk_id = meta.chunk_id();
        merged
            .entry(chunk_id.clone())
            .or_insert_with(|| SearchResult {
                chunk_id,
                bm25_score: 0.0,
                vector_score: 0.0,
                combined_score: 0.0,
                meta,
            })
            .vector_score = score;
    }

    let mut results: Vec<SearchResult> = merged
        .into_values()
        .map(|mut result| {
            result.combined_score =
                w_bm25 * result.bm25_score + w_vector * result.vector_score;
            result
        })
        .collect();

    results.sort_by(|a, b| {
        b.combined_score
            .partial_cmp(&a.combined_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.chunk_id.cmp(&b.chunk_id))
    });
    results.truncate(k);
    results
}

/// Pick the single result most likely to contain the error's origin.
///
/// Results whose file is named in the raw query are boosted, as are chunks
/// carrying import lines; the highest boosted score wins.
#[inline]
pub fn identify_root_cause(results: &[SearchResult], raw_query: &str) -> Option<SearchResult> {
    if results.is_empty() {
        return None;
    }

    let mentioned: HashSet<String> = query_file_basenames(raw_query).into_iter().collect();

    results
        .iter()
        .map(|result| {
            let mut score = result.combined_score;
            if mentioned.contains(&result.meta.file_name) {
                score *= FILENAME_MATCH_BOOST;
            }
            if result.meta.has_imports {
                score *= IMPORT_BOOST;
            }
            (result, score)
        })
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(result, _)| result.clone())
}

/// Bucket results per file, keeping input order inside each group. Groups
/// sort by their best chunk score.
#[inline]
pub fn group_by_file(results: &[SearchResult]) -> Vec<FileGroup> {
    let mut groups: Vec<FileGroup> = Vec::new();
    let mut index_by_path: HashMap<String, usize> = HashMap::new();

    for result in results {
        let path = result.meta.file_path.clone();
        let idx = *index_by_path.entry(path.clone()).or_insert_with(|| {
            groups.push(FileGroup {
                file_path: path,
                max_score: f64::NEG_INFINITY,
                total_score: 0.0,
                chunks: Vec::new(),
            });
            groups.len() - 1
        });

        let group = &mut groups[idx];
        group.max_score = group.max_score.max(result.combined_score);
        group.total_score += result.combined_score;
        group.chunks.push(result.clone());
    }

    groups.sort_by(|a, b| {
        b.max_score
            .partial_cmp(&a.max_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    groups
}
