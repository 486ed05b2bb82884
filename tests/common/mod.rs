use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use terminal_helper_rag::embedder::Embedder;
use terminal_helper_rag::{RagError, Result};

pub const MOCK_DIMENSION: usize = 24;

/// Install a test subscriber once so RUST_LOG surfaces engine traces.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Deterministic token-hash embedder so tests run without an embedding
/// server.
pub struct MockEmbedder {
    dimension: usize,
    fail: bool,
}

impl MockEmbedder {
    pub fn new() -> Self {
        Self {
            dimension: MOCK_DIMENSION,
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            dimension: MOCK_DIMENSION,
            fail: true,
        }
    }
}

impl Default for MockEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

impl Embedder for MockEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if self.fail {
            return Err(RagError::Embedder("mock embedder offline".to_string()));
        }

        let mut vector = vec![0.0_f32; self.dimension];
        for token in text.split_whitespace() {
            let mut hasher = DefaultHasher::new();
            token.hash(&mut hasher);
            let bucket = (hasher.finish() as usize) % self.dimension;
            vector[bucket] += 1.0;
        }
        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// A small project tree with a handful of source files and the usual noise.
pub fn fixture_project() -> tempfile::TempDir {
    let dir = tempfile::tempdir().expect("can create tempdir");
    let root = dir.path();

    std::fs::create_dir_all(root.join("src")).unwrap();
    std::fs::create_dir_all(root.join("node_modules/pkg")).unwrap();

    std::fs::write(
        root.join("src/router.ts"),
        concat!(
            "import { dispatch } from './dispatch';\n",
            "\n",
            "export function handleRoute(req) {\n",
            "    if (!req.path) {\n",
            "        throw new Error('missing path');\n",
            "    }\n",
            "    return dispatch(req);\n",
            "}\n",
        ),
    )
    .unwrap();

    std::fs::write(
        root.join("src/database.py"),
        concat!(
            "import sqlite3\n",
            "\n",
            "def connect(path):\n",
            "    conn = sqlite3.connect(path)\n",
            "    conn.row_factory = sqlite3.Row\n",
            "    return conn\n",
        ),
    )
    .unwrap();

    std::fs::write(
        root.join("src/retry.rs"),
        concat!(
            "use std::time::Duration;\n",
            "\n",
            "pub fn backoff(attempt: u32) -> Duration {\n",
            "    Duration::from_millis(100 * 2_u64.pow(attempt))\n",
            "}\n",
        ),
    )
    .unwrap();

    std::fs::write(root.join("README.md"), "docs, not code\n").unwrap();
    std::fs::write(root.join("node_modules/pkg/index.js"), "module.exports = 1;\n").unwrap();

    dir
}
