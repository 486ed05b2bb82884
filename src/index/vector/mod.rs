// Exact L2 vector index
// Append-only flat-buffer store over fixed-dimension embeddings with a
// linear nearest-neighbor scan and a two-file on-disk snapshot.


use std::collections::HashMap;
use std::fs;
use std::path::Path;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::chunker::ChunkMeta;
use crate::embedder::normalize_embedding;
use crate::{RagError, Result};

/// Rough per-record metadata overhead used by [`VectorIndex::stats`].
const META_BYTES_ESTIMATE: usize = 200;

/// Summary counters for diagnostics and indexing results.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VectorStats {
    pub vector_count: usize,
    pub dimension: usize,
    pub file_count: usize,
    pub memory_usage: usize,
}

#[derive(Serialize, Deserialize)]
struct VectorIndexMetadata {
    dimension: usize,
    size: usize,
    metadata: Vec<(u32, ChunkMeta)>,
    #[serde(default)]
    saved_at: Option<String>,
}

/// Append-only exact-L2 store over vectors of one fixed dimension.
///
/// Vector ids are a dense 0-based counter in insertion order. Every stored
/// vector is normalized (padded/truncated to the index dimension, non-finite
/// components replaced) so a mis-sized record can never exist.
#[derive(Debug)]
pub struct VectorIndex {
    dimension: usize,
    vectors: Vec<f32>,
    id_to_meta: HashMap<u32, ChunkMeta>,
}

impl VectorIndex {
    #[inline]
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            vectors: Vec::new(),
            id_to_meta: HashMap::new(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.id_to_meta.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.id_to_meta.is_empty()
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Append embeddings with their chunk metadata, assigning dense ids in
    /// input order. Returns the number of records stored.
    #[inline]
    pub fn add(&mut self, records: Vec<(Vec<f32>, ChunkMeta)>) -> usize {
        let mut added = 0;
        for (vector, meta) in records {
            let vector = normalize_embedding(vector, self.dimension);
            let vector_id = self.len() as u32;
            self.vectors.extend_from_slice(&vector);
            self.id_to_meta.insert(vector_id, meta);
            added += 1;
        }

        debug!("Stored {} vectors, index size now {}", added, self.len());
        added
    }

    /// Exact L2 scan: the `k` nearest stored vectors by squared Euclidean
    /// distance, ties broken by smaller vector id. Distances convert to a
    /// similarity score clamped at zero.
    #[inline]
    pub fn search(&self, query: &[f32], k: usize) -> Vec<(u32, f64, ChunkMeta)> {
        let size = self.len();
        if size == 0 || k == 0 {
            return Vec::new();
        }

        let query = normalize_embedding(query.to_vec(), self.dimension);

        let mut distances: Vec<(u32, f64)> = (0..size)
            .map(|i| {
                let start = i * self.dimension;
                let stored = &self.vectors[start..start + self.dimension];
                let d: f64 = stored
                    .iter()
                    .zip(query.iter())
                    .map(|(v, q)| {
                        let diff = f64::from(*v) - f64::from(*q);
                        diff * diff
                    })
                    .sum();
                (i as u32, d)
            })
            .collect();

        distances.sort_by(|a, b| {
            a.1.partial_cmp(&b.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        distances.truncate(k.min(size));

        distances
            .into_iter()
            .map(|(id, d)| {
                let score = (1.0 - d / 100.0).max(0.0);
                (id, score, self.id_to_meta[&id].clone())
            })
            .collect()
    }

    /// Persist the index as `<name>.bin` (raw little-endian f32 payload) and
    /// `<name>.metadata.json`, each replaced atomically.
    ///
    /// A payload write failure is downgraded to a warning and the in-memory
    /// state is left intact; a later load will start empty.
    #[inline]
    pub fn save(&self, dir: &Path, name: &str) -> Result<()> {
        let mut pairs: Vec<(u32, ChunkMeta)> = self
            .id_to_meta
            .iter()
            .map(|(id, meta)| (*id, meta.clone()))
            .collect();
        pairs.sort_by_key(|(id, _)| *id);

        let metadata = VectorIndexMetadata {
            dimension: self.dimension,
            size: self.len(),
            metadata: pairs,
            saved_at: Some(Utc::now().to_rfc3339()),
        };

        let meta_path = dir.join(format!("{name}.metadata.json"));
        let meta_tmp = dir.join(format!("{name}.metadata.json.tmp"));
        let data = serde_json::to_string(&metadata)
            .map_err(|e| RagError::Corrupt(format!("Failed to serialize vector metadata: {e}")))?;
        fs::write(&meta_tmp, data)?;
        fs::rename(&meta_tmp, &meta_path)?;

        let mut payload = Vec::with_capacity(self.vectors.len() * 4);
        for value in &self.vectors {
            payload.extend_from_slice(&value.to_le_bytes());
        }

        let bin_path = dir.join(format!("{name}.bin"));
        let bin_tmp = dir.join(format!("{name}.bin.tmp"));
        if let Err(e) = fs::write(&bin_tmp, payload).and_then(|()| fs::rename(&bin_tmp, &bin_path))
        {
            warn!(
                "Failed to write vector payload {}: {}. Keeping in-memory index; the saved index will load empty.",
                bin_path.display(),
                e
            );
            return Ok(());
        }

        info!(
            "Saved vector index with {} vectors to {}",
            self.len(),
            bin_path.display()
        );
        Ok(())
    }

    /// Load a snapshot written by [`VectorIndex::save`].
    ///
    /// A present metadata file with a missing payload yields an empty index
    /// of the recorded dimension.
    #[inline]
    pub fn load(dir: &Path, name: &str) -> Result<Self> {
        let meta_path = dir.join(format!("{name}.metadata.json"));
        let data = fs::read_to_string(&meta_path)?;
        let metadata: VectorIndexMetadata = serde_json::from_str(&data)
            .map_err(|e| RagError::Corrupt(format!("Unparseable vector metadata: {e}")))?;

        if metadata.metadata.len() != metadata.size {
            return Err(RagError::Corrupt(format!(
                "Vector metadata records {} entries but declares size {}",
                metadata.metadata.len(),
                metadata.size
            )));
        }

        let bin_path = dir.join(format!("{name}.bin"));
        let payload = match fs::read(&bin_path) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(
                    "Vector payload missing at {} ({}), starting empty at dimension {}",
                    bin_path.display(),
                    e,
                    metadata.dimension
                );
                return Ok(Self::new(metadata.dimension));
            }
        };

        let expected = metadata.size * metadata.dimension * 4;
        if payload.len() != expected {
            return Err(RagError::Corrupt(format!(
                "Vector payload is {} bytes, expected {} for {} vectors of dimension {}",
                payload.len(),
                expected,
                metadata.size,
                metadata.dimension
            )));
        }

        let vectors: Vec<f32> = payload
            .chunks_exact(4)
            .map(|bytes| f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
            .collect();

        debug!(
            "Loaded vector index with {} vectors of dimension {}",
            metadata.size, metadata.dimension
        );
        Ok(Self {
            dimension: metadata.dimension,
            vectors,
            id_to_meta: metadata.metadata.into_iter().collect(),
        })
    }

    #[inline]
    pub fn stats(&self) -> VectorStats {
        let file_count = self
            .id_to_meta
            .values()
            .map(|meta| meta.file_path.as_str())
            .collect::<std::collections::HashSet<_>>()
            .len();

        VectorStats {
            vector_count: self.len(),
            dimension: self.dimension,
            file_count,
            memory_usage: self.len() * self.dimension * 4 + self.len() * META_BYTES_ESTIMATE,
        }
    }
}
