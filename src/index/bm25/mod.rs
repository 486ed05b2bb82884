// BM25 inverted index
// Okapi BM25 scoring over tokenized chunk text, with a JSON snapshot that
// round-trips the full index state.


use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::chunker::ChunkMeta;
use crate::text::{TokenizerOptions, preprocess_code, tokenize};
use crate::{RagError, Result};

const SNAPSHOT_VERSION: u32 = 1;

/// Okapi BM25 parameters, fixed for the life of an index.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Bm25Params {
    pub k1: f64,
    pub b: f64,
    pub epsilon: f64,
}

impl Default for Bm25Params {
    #[inline]
    fn default() -> Self {
        Self {
            k1: 1.2,
            b: 0.75,
            epsilon: 0.25,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredDocument {
    chunk_id: String,
    content: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct Posting {
    doc: u32,
    tf: u32,
}

/// Summary counters for diagnostics and indexing results.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Bm25Stats {
    pub document_count: usize,
    pub vocab_size: usize,
    pub avg_doc_len: f64,
}

/// Inverted index with Okapi BM25 scoring.
///
/// Documents are chunks; insertion order is the tie-break order for equal
/// scores. `add` is idempotent on chunk id.
#[derive(Debug)]
pub struct Bm25Index {
    params: Bm25Params,
    tokenizer: TokenizerOptions,
    documents: Vec<StoredDocument>,
    doc_meta: HashMap<String, ChunkMeta>,
    doc_len: Vec<usize>,
    avg_dl: f64,
    postings: HashMap<String, Vec<Posting>>,
    vocab: HashSet<String>,
}

impl Bm25Index {
    #[inline]
    pub fn new(params: Bm25Params, tokenizer: TokenizerOptions) -> Self {
        Self {
            params,
            tokenizer,
            documents: Vec::new(),
            doc_meta: HashMap::new(),
            doc_len: Vec::new(),
            avg_dl: 0.0,
            postings: HashMap::new(),
            vocab: HashSet::new(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    #[inline]
    pub fn params(&self) -> Bm25Params {
        self.params
    }

    #[inline]
    pub fn stats(&self) -> Bm25Stats {
        Bm25Stats {
            document_count: self.documents.len(),
            vocab_size: self.vocab.len(),
            avg_doc_len: self.avg_dl,
        }
    }

    /// Add one chunk to the index. Returns `false` without touching any
    /// state when the chunk id is already present.
    #[inline]
    pub fn add(&mut self, chunk_id: &str, content: &str, meta: ChunkMeta) -> bool {
        if self.doc_meta.contains_key(chunk_id) {
            debug!("Chunk already indexed, skipping: {}", chunk_id);
            return false;
        }

        let tokens = tokenize(&preprocess_code(content), &self.tokenizer);
        let doc_index = self.documents.len() as u32;

        let mut term_freq: HashMap<&str, u32> = HashMap::new();
        for token in &tokens {
            *term_freq.entry(token.as_str()).or_insert(0) += 1;
        }

        for (term, tf) in term_freq {
            self.postings
                .entry(term.to_string())
                .or_default()
                .push(Posting { doc: doc_index, tf });
            self.vocab.insert(term.to_string());
        }

        // Running mean, no re-scan of existing lengths
        let n = self.doc_len.len() as f64;
        self.avg_dl = (self.avg_dl * n + tokens.len() as f64) / (n + 1.0);

        self.doc_len.push(tokens.len());
        self.doc_meta.insert(chunk_id.to_string(), meta);
        self.documents.push(StoredDocument {
            chunk_id: chunk_id.to_string(),
            content: content.to_string(),
        });

        true
    }

    /// Score the query against every document sharing at least one term and
    /// return the top `k`, ties broken by insertion order.
    #[inline]
    pub fn search(&self, query: &str, k: usize) -> Vec<(String, f64, ChunkMeta)> {
        let n = self.documents.len();
        if n == 0 || k == 0 {
            return Vec::new();
        }

        let tokens = tokenize(query, &self.tokenizer);
        // Sorted unique terms keep the floating-point accumulation order
        // stable across index instances
        let mut unique_terms: Vec<&str> = tokens.iter().map(String::as_str).collect();
        unique_terms.sort_unstable();
        unique_terms.dedup();

        let mut scores = vec![0.0_f64; n];
        for term in unique_terms {
            let Some(postings) = self.postings.get(term) else {
                continue;
            };

            let n_t = postings.len() as f64;
            let idf =
                (1.0 + (n as f64 - n_t + 0.5) / (n_t + 0.5) + self.params.epsilon).ln();

            for posting in postings {
                let f = posting.tf as f64;
                let dl = self.doc_len[posting.doc as usize] as f64;
                let denom = f
                    + self.params.k1 * (1.0 - self.params.b + self.params.b * dl / self.avg_dl);
                scores[posting.doc as usize] += idf * (f * (self.params.k1 + 1.0)) / denom;
            }
        }

        let mut hits: Vec<(usize, f64)> = scores
            .into_iter()
            .enumerate()
            .filter(|(_, score)| *score > 0.0)
            .collect();
        hits.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        hits.truncate(k.min(n));

        hits.into_iter()
            .map(|(doc, score)| {
                let chunk_id = self.documents[doc].chunk_id.clone();
                let meta = self.doc_meta[&chunk_id].clone();
                (chunk_id, score, meta)
            })
            .collect()
    }

    /// Write the full index state to `<dir>/<name>.json` via temp file and
    /// atomic rename.
    #[inline]
    pub fn save(&self, dir: &Path, name: &str) -> Result<()> {
        let snapshot = Bm25Snapshot {
            version: SNAPSHOT_VERSION,
            saved_at: Utc::now().to_rfc3339(),
            params: self.params,
            tokenizer: self.tokenizer.clone(),
            documents: &self.documents,
            doc_meta: &self.doc_meta,
            doc_len: &self.doc_len,
            avg_dl: self.avg_dl,
            postings: &self.postings,
        };

        let path = dir.join(format!("{name}.json"));
        let tmp_path = dir.join(format!("{name}.json.tmp"));
        let data = serde_json::to_string(&snapshot)
            .map_err(|e| RagError::Corrupt(format!("Failed to serialize BM25 snapshot: {e}")))?;
        fs::write(&tmp_path, data)?;
        fs::rename(&tmp_path, &path)?;

        info!(
            "Saved BM25 index with {} documents to {}",
            self.documents.len(),
            path.display()
        );
        Ok(())
    }

    /// Load a snapshot written by [`Bm25Index::save`].
    #[inline]
    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)?;
        let snapshot: OwnedBm25Snapshot = serde_json::from_str(&data)
            .map_err(|e| RagError::Corrupt(format!("Unparseable BM25 snapshot: {e}")))?;

        if snapshot.version != SNAPSHOT_VERSION {
            return Err(RagError::Corrupt(format!(
                "Unsupported BM25 snapshot version: {}",
                snapshot.version
            )));
        }

        let n = snapshot.documents.len();
        if snapshot.doc_len.len() != n || snapshot.doc_meta.len() != n {
            return Err(RagError::Corrupt(format!(
                "Inconsistent BM25 snapshot: {} documents, {} lengths, {} metadata entries",
                n,
                snapshot.doc_len.len(),
                snapshot.doc_meta.len()
            )));
        }
        for postings in snapshot.postings.values() {
            if postings.iter().any(|p| p.doc as usize >= n) {
                return Err(RagError::Corrupt(
                    "BM25 posting references a missing document".to_string(),
                ));
            }
        }

        let vocab = snapshot.postings.keys().cloned().collect();

        debug!("Loaded BM25 index with {} documents", n);
        Ok(Self {
            params: snapshot.params,
            tokenizer: snapshot.tokenizer,
            documents: snapshot.documents,
            doc_meta: snapshot.doc_meta,
            doc_len: snapshot.doc_len,
            avg_dl: snapshot.avg_dl,
            postings: snapshot.postings,
            vocab,
        })
    }

    /// Load from `path` when present, otherwise construct an empty index.
    #[inline]
    pub fn load_or_new(path: &Path, params: Bm25Params, tokenizer: TokenizerOptions) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            debug!("No BM25 snapshot at {}, starting empty", path.display());
            Ok(Self::new(params, tokenizer))
        }
    }
}

#[derive(Serialize)]
struct Bm25Snapshot<'a> {
    version: u32,
    saved_at: String,
    params: Bm25Params,
    tokenizer: TokenizerOptions,
    documents: &'a [StoredDocument],
    doc_meta: &'a HashMap<String, ChunkMeta>,
    doc_len: &'a [usize],
    avg_dl: f64,
    postings: &'a HashMap<String, Vec<Posting>>,
}

#[derive(Deserialize)]
struct OwnedBm25Snapshot {
    version: u32,
    #[allow(dead_code)]
    saved_at: String,
    params: Bm25Params,
    tokenizer: TokenizerOptions,
    documents: Vec<StoredDocument>,
    doc_meta: HashMap<String, ChunkMeta>,
    doc_len: Vec<usize>,
    avg_dl: f64,
    postings: HashMap<String, Vec<Posting>>,
}
