mod common;

use common::{MockEmbedder, fixture_project, init_tracing};
use terminal_helper_rag::config::RagConfig;
use terminal_helper_rag::{IndexingOptions, RagEngine};

fn indexed_engine(dir: &tempfile::TempDir) -> RagEngine {
    init_tracing();
    let mut engine = RagEngine::init(
        dir.path(),
        RagConfig::default(),
        Box::new(MockEmbedder::new()),
    )
    .unwrap();
    engine
        .index_codebase(&IndexingOptions::default(), None)
        .unwrap();
    engine
}

#[test]
fn traceback_retrieval_promotes_the_named_file() {
    let dir = fixture_project();
    let mut engine = indexed_engine(&dir);

    let result = engine.retrieve_relevant_files(
        "Error: missing path\n    at handleRoute (src/router.ts:5:15)\n    at processTicksAndRejections",
        None,
    );

    assert!(!result.results.is_empty());
    for pair in result.results.windows(2) {
        assert!(pair[0].combined_score >= pair[1].combined_score);
    }

    let root = result.root_cause.expect("root cause expected");
    assert_eq!(root.meta.file_name, "router.ts");
    assert!(root.meta.has_imports);
}

#[test]
fn grouping_covers_every_result() {
    let dir = fixture_project();
    let mut engine = indexed_engine(&dir);

    let result = engine.retrieve_relevant_files("error: connect failed in database", None);

    let grouped_total: usize = result.grouped_results.iter().map(|g| g.chunks.len()).sum();
    assert_eq!(grouped_total, result.results.len());

    for group in &result.grouped_results {
        assert!(group.chunks.iter().all(|c| c.meta.file_path == group.file_path));
        let best = group
            .chunks
            .iter()
            .map(|c| c.combined_score)
            .fold(f64::NEG_INFINITY, f64::max);
        assert_eq!(best, group.max_score);
    }
}

#[test]
fn retrieval_auto_indexes_a_fresh_project() {
    let dir = fixture_project();
    let mut engine = RagEngine::init(
        dir.path(),
        RagConfig::default(),
        Box::new(MockEmbedder::new()),
    )
    .unwrap();

    let result = engine.retrieve_relevant_files("sqlite3 row_factory error in connect()", None);
    assert!(!result.results.is_empty());
    assert!(engine.rag_stats().bm25_stats.document_count > 0);
}

#[test]
fn empty_project_yields_an_empty_result() {
    let dir = tempfile::tempdir().unwrap();
    let mut engine = RagEngine::init(
        dir.path(),
        RagConfig::default(),
        Box::new(MockEmbedder::new()),
    )
    .unwrap();

    let result = engine.retrieve_relevant_files("Error: nothing to find", None);
    assert!(result.results.is_empty());
    assert!(result.root_cause.is_none());
}

#[test]
fn unavailable_embedder_degrades_to_empty_results() {
    let dir = fixture_project();
    {
        indexed_engine(&dir);
    }

    let mut engine = RagEngine::init(
        dir.path(),
        RagConfig::default(),
        Box::new(MockEmbedder::failing()),
    )
    .unwrap();

    let result = engine.retrieve_relevant_files("error: dispatch failed", None);
    assert!(result.results.is_empty());
}

#[test]
fn stats_report_both_indices() {
    let dir = fixture_project();
    let engine = indexed_engine(&dir);

    let stats = engine.rag_stats();
    assert_eq!(stats.bm25_stats.document_count, 3);
    assert_eq!(stats.vector_stats.vector_count, 3);
    assert_eq!(stats.vector_stats.file_count, 3);
    assert!(stats.vector_stats.memory_usage > 0);
    assert!(stats.bm25_stats.avg_doc_len > 0.0);
    assert!((stats.hybrid_config.bm25_weight - 0.3).abs() < 1e-12);
}
