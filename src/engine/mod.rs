// Retrieval engine coordinator
// Owns the per-project BM25 and vector indices, drives the index pipeline
// (walk, chunk, embed, insert, save), and answers retrieval queries.


use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::chunker::{Chunk, chunk_file};
use crate::config::RagConfig;
use crate::embedder::Embedder;
use crate::index::{Bm25Index, Bm25Stats, VectorIndex, VectorStats};
use crate::search::expand::expand_error_query;
use crate::search::{
    FileGroup, HybridConfig, SearchResult, group_by_file, hybrid_search, identify_root_cause,
};
use crate::walker::walk_source_files;
use crate::{RagError, Result};

const DATA_DIR: &str = ".terminal_helper";
const RAG_SUBDIR: &str = "rag-data";
const VECTOR_INDEX_NAME: &str = "code_vectors";
const BM25_INDEX_NAME: &str = "code_bm25";

const DEFAULT_MAX_FILES: usize = 1000;
const DEFAULT_BATCH_SIZE: usize = 20;

/// Caps applied when retrieval has to index on demand.
const AUTO_INDEX_MAX_FILES: usize = 100;
const AUTO_INDEX_BATCH_SIZE: usize = 10;

/// Cooperative cancellation token for long-running entry points.
///
/// Cancellation is observed between batches: the batch in flight finishes
/// and partially built indices are not saved.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Options for one indexing run.
#[derive(Debug, Clone)]
pub struct IndexingOptions {
    /// Directory names to exclude on top of the built-in set.
    pub exclude_dirs: Vec<String>,
    pub max_files: usize,
    pub batch_size: usize,
    /// Drop both indices and rebuild from scratch.
    pub force_reindex: bool,
}

impl Default for IndexingOptions {
    #[inline]
    fn default() -> Self {
        Self {
            exclude_dirs: Vec::new(),
            max_files: DEFAULT_MAX_FILES,
            batch_size: DEFAULT_BATCH_SIZE,
            force_reindex: false,
        }
    }
}

/// Counters returned by [`RagEngine::index_codebase`].
#[derive(Debug, Clone, Serialize)]
pub struct IndexingResult {
    pub file_count: usize,
    pub chunk_count: usize,
    pub vector_stats: VectorStats,
    pub bm25_stats: Bm25Stats,
}

/// Counters returned by [`RagEngine::index_single_file`].
#[derive(Debug, Clone, Serialize)]
pub struct SingleFileIndexResult {
    pub chunk_count: usize,
    pub vector_stats: VectorStats,
    pub bm25_stats: Bm25Stats,
}

/// Everything retrieval produces for one query.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RetrieveResult {
    pub results: Vec<SearchResult>,
    pub grouped_results: Vec<FileGroup>,
    pub root_cause: Option<SearchResult>,
}

/// Index and ranking diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct RagStats {
    pub vector_stats: VectorStats,
    pub bm25_stats: Bm25Stats,
    pub hybrid_config: HybridConfig,
}

/// Where a project's index data lives.
#[inline]
pub fn rag_data_dir(project_root: &Path) -> PathBuf {
    project_root.join(DATA_DIR).join(RAG_SUBDIR)
}

/// Per-project retrieval engine owning both indices for the lifetime of a
/// session. Queries take `&self`; any mutation takes `&mut self`.
pub struct RagEngine {
    project_root: PathBuf,
    data_dir: PathBuf,
    config: RagConfig,
    embedder: Box<dyn Embedder>,
    bm25: Bm25Index,
    vectors: VectorIndex,
}

impl RagEngine {
    /// Open or create the index pair under `<project_root>/.terminal_helper/rag-data/`.
    ///
    /// Present snapshots are loaded; a corrupt snapshot surfaces as
    /// [`RagError::Corrupt`].
    #[inline]
    pub fn init(
        project_root: impl AsRef<Path>,
        config: RagConfig,
        embedder: Box<dyn Embedder>,
    ) -> Result<Self> {
        config.validate()?;

        let project_root = project_root.as_ref().canonicalize()?;
        let data_dir = rag_data_dir(&project_root);
        fs::create_dir_all(&data_dir)?;

        let bm25 = Bm25Index::load_or_new(
            &data_dir.join(format!("{BM25_INDEX_NAME}.json")),
            config.bm25,
            config.tokenizer.clone(),
        )?;

        let vectors = if data_dir
            .join(format!("{VECTOR_INDEX_NAME}.metadata.json"))
            .exists()
        {
            let loaded = VectorIndex::load(&data_dir, VECTOR_INDEX_NAME)?;
            if loaded.dimension() != embedder.dimension() {
                warn!(
                    "Stored vectors have dimension {} but the embedder produces {}; starting empty",
                    loaded.dimension(),
                    embedder.dimension()
                );
                VectorIndex::new(embedder.dimension())
            } else {
                loaded
            }
        } else {
            VectorIndex::new(embedder.dimension())
        };

        info!(
            "RAG engine ready for {} ({} documents, {} vectors)",
            project_root.display(),
            bm25.len(),
            vectors.len()
        );

        Ok(Self {
            project_root,
            data_dir,
            config,
            embedder,
            bm25,
            vectors,
        })
    }

    #[inline]
    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bm25.is_empty() && self.vectors.is_empty()
    }

    /// Walk the project, chunk every source file, embed and insert the
    /// chunks batch by batch, then save both indices.
    ///
    /// Per-file failures are logged and skipped. A batch in which every
    /// embedding fails aborts the run. Cancellation between batches leaves
    /// the last saved snapshots untouched.
    #[inline]
    pub fn index_codebase(
        &mut self,
        opts: &IndexingOptions,
        cancel: Option<&CancelFlag>,
    ) -> Result<IndexingResult> {
        if opts.force_reindex {
            info!("Force reindex: dropping existing indices");
            self.bm25 = Bm25Index::new(self.config.bm25, self.config.tokenizer.clone());
            self.vectors = VectorIndex::new(self.embedder.dimension());
        }

        let files = walk_source_files(&self.project_root, &opts.exclude_dirs, opts.max_files)?;
        info!(
            "Indexing {} files under {}",
            files.len(),
            self.project_root.display()
        );

        let mut pending: Vec<Chunk> = Vec::new();
        let mut file_count = 0;
        for path in &files {
            match chunk_file(path, &self.config.chunking) {
                Ok(chunks) => {
                    file_count += 1;
                    pending.extend(chunks);
                }
                Err(e) => {
                    warn!("Skipping unreadable file {}: {}", path.display(), e);
                }
            }
        }

        let mut chunk_count = 0;
        let batch_size = opts.batch_size.max(1);
        for batch in pending.chunks(batch_size) {
            if let Some(flag) = cancel
                && flag.is_cancelled()
            {
                info!("Indexing cancelled; partial indices are not saved");
                return Err(RagError::Cancelled);
            }

            chunk_count += self.insert_batch(batch)?;
        }

        self.bm25.save(&self.data_dir, BM25_INDEX_NAME)?;
        self.vectors.save(&self.data_dir, VECTOR_INDEX_NAME)?;

        info!(
            "Indexed {} chunks from {} files",
            chunk_count, file_count
        );
        Ok(IndexingResult {
            file_count,
            chunk_count,
            vector_stats: self.vectors.stats(),
            bm25_stats: self.bm25.stats(),
        })
    }

    /// Run the chunk/embed/insert pipeline for one file and save.
    #[inline]
    pub fn index_single_file(&mut self, path: impl AsRef<Path>) -> Result<SingleFileIndexResult> {
        let path = path.as_ref().canonicalize()?;
        let chunks = chunk_file(&path, &self.config.chunking)?;

        let mut chunk_count = 0;
        for batch in chunks.chunks(DEFAULT_BATCH_SIZE) {
            chunk_count += self.insert_batch(batch)?;
        }

        self.bm25.save(&self.data_dir, BM25_INDEX_NAME)?;
        self.vectors.save(&self.data_dir, VECTOR_INDEX_NAME)?;

        debug!("Indexed {} chunks from {}", chunk_count, path.display());
        Ok(SingleFileIndexResult {
            chunk_count,
            vector_stats: self.vectors.stats(),
            bm25_stats: self.bm25.stats(),
        })
    }

    /// Rank source regions likely to contain the root cause of `error_log`.
    ///
    /// Never fails: with nothing indexed it first attempts a bounded
    /// on-demand indexing pass, and any error leaves the caller with an
    /// empty result.
    #[inline]
    pub fn retrieve_relevant_files(
        &mut self,
        error_log: &str,
        cancel: Option<&CancelFlag>,
    ) -> RetrieveResult {
        if self.is_empty() {
            info!("Indices are empty, indexing on demand");
            let opts = IndexingOptions {
                max_files: AUTO_INDEX_MAX_FILES,
                batch_size: AUTO_INDEX_BATCH_SIZE,
                ..IndexingOptions::default()
            };
            if let Err(e) = self.index_codebase(&opts, cancel) {
                warn!("On-demand indexing failed: {}", e);
            }
        }

        if self.is_empty() {
            return RetrieveResult::default();
        }

        let expanded = expand_error_query(error_log);
        debug!("Expanded query: {}", expanded);

        let query_vector = match self.embedder.embed(&expanded) {
            Ok(vector) => vector,
            Err(e) => {
                warn!("Query embedding failed, returning empty result: {}", e);
                return RetrieveResult::default();
            }
        };

        let results = hybrid_search(
            &self.bm25,
            &self.vectors,
            &expanded,
            &query_vector,
            &self.config.hybrid,
        );
        let grouped_results = group_by_file(&results);
        let root_cause = identify_root_cause(&results, error_log);

        RetrieveResult {
            results,
            grouped_results,
            root_cause,
        }
    }

    #[inline]
    pub fn rag_stats(&self) -> RagStats {
        RagStats {
            vector_stats: self.vectors.stats(),
            bm25_stats: self.bm25.stats(),
            hybrid_config: self.config.hybrid.clone(),
        }
    }

    /// Embed and insert one batch of chunks into both indices, keeping
    /// their chunk-id order aligned. Returns how many chunks were added.
    fn insert_batch(&mut self, batch: &[Chunk]) -> Result<usize> {
        if batch.is_empty() {
            return Ok(0);
        }

        let mut embedded: Vec<(&Chunk, Vec<f32>)> = Vec::with_capacity(batch.len());
        for chunk in batch {
            match self.embedder.embed(&chunk.content) {
                Ok(vector) => embedded.push((chunk, vector)),
                Err(e) => {
                    warn!("Failed to embed chunk {}: {}", chunk.id(), e);
                }
            }
        }

        if embedded.is_empty() {
            return Err(RagError::Embedder(format!(
                "All {} chunks in batch failed to embed",
                batch.len()
            )));
        }

        let mut added = 0;
        for (chunk, vector) in embedded {
            // Insertion into both indices is keyed on the BM25 duplicate
            // check so their record order stays aligned.
            if self.bm25.add(&chunk.id(), &chunk.content, chunk.meta()) {
                self.vectors.add(vec![(vector, chunk.meta())]);
                added += 1;
            }
        }

        debug!("Inserted batch of {} chunks", added);
        Ok(added)
    }
}
