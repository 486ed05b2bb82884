// Source file chunking
// Splits file text into overlapping, line-addressable regions that are the
// unit of indexing for both the BM25 and vector indices.


use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Lines that mark a chunk as containing import/include statements.
static IMPORT_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(import|from|#include|require\s*\(|use\s+)").expect("valid regex")
});

/// How many leading bytes of a file are inspected for binary content.
const BINARY_SNIFF_BYTES: usize = 8192;

/// Configuration for source chunking.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum lines per chunk.
    pub max_lines: usize,
    /// Lines shared between successive chunks of the same file.
    pub overlap_lines: usize,
    /// Maximum characters per chunk; a full window is cut at the last line
    /// boundary that fits.
    pub max_chars: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            max_lines: 50,
            overlap_lines: 10,
            max_chars: 3000,
        }
    }
}

/// An immutable region of one source file.
///
/// `start_line`/`end_line` are 1-based and inclusive, and map exactly into
/// the original text so a snippet can be re-read with a line-range read.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    pub file_path: String,
    pub start_line: usize,
    pub end_line: usize,
    pub content: String,
    pub has_imports: bool,
    pub file_ext: String,
}

impl Chunk {
    /// Identity of this chunk, globally unique within one project index.
    #[inline]
    pub fn id(&self) -> String {
        format!("{}:{}-{}", self.file_path, self.start_line, self.end_line)
    }

    /// Metadata record stored alongside this chunk in both indices.
    #[inline]
    pub fn meta(&self) -> ChunkMeta {
        ChunkMeta {
            file_path: self.file_path.clone(),
            file_name: Path::new(&self.file_path)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            start_line: self.start_line,
            end_line: self.end_line,
            file_ext: self.file_ext.clone(),
            has_imports: self.has_imports,
        }
    }
}

/// Chunk metadata as persisted in index snapshots.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChunkMeta {
    pub file_path: String,
    pub file_name: String,
    pub start_line: usize,
    pub end_line: usize,
    pub file_ext: String,
    pub has_imports: bool,
}

impl ChunkMeta {
    /// The chunk identity this metadata belongs to.
    #[inline]
    pub fn chunk_id(&self) -> String {
        format!("{}:{}-{}", self.file_path, self.start_line, self.end_line)
    }
}

/// Whether the leading bytes of a file look like binary content.
#[inline]
pub fn is_binary(bytes: &[u8]) -> bool {
    bytes.iter().take(BINARY_SNIFF_BYTES).any(|&b| b == 0)
}

/// Read and chunk a single file. Binary files yield zero chunks.
#[inline]
pub fn chunk_file(path: &Path, config: &ChunkingConfig) -> std::io::Result<Vec<Chunk>> {
    let bytes = fs::read(path)?;
    if is_binary(&bytes) {
        debug!("Skipping binary file: {}", path.display());
        return Ok(Vec::new());
    }

    let content = String::from_utf8_lossy(&bytes);
    Ok(chunk_source(&path.to_string_lossy(), &content, config))
}

/// Split file text into overlapping line-window chunks.
///
/// Deterministic: the same (content, config) pair always produces the same
/// chunks. Empty or whitespace-only content yields zero chunks.
#[inline]
pub fn chunk_source(file_path: &str, content: &str, config: &ChunkingConfig) -> Vec<Chunk> {
    if content.trim().is_empty() {
        return Vec::new();
    }

    let lines: Vec<&str> = content.lines().collect();
    let total_lines = lines.len();
    let file_ext = extension_of(file_path);
    let max_lines = config.max_lines.max(1);
    let step_base = max_lines.saturating_sub(config.overlap_lines).max(1);

    let mut chunks = Vec::new();
    let mut start = 0;

    while start < total_lines {
        let hard_end = (start + max_lines).min(total_lines);

        // Cut at the last line boundary under the character bound, but
        // always take at least one line.
        let mut end = start;
        let mut chars = 0;
        while end < hard_end {
            let line_chars = lines[end].chars().count() + 1;
            if end > start && chars + line_chars > config.max_chars {
                break;
            }
            chars += line_chars;
            end += 1;
        }

        let window = &lines[start..end];
        let chunk_content = window.join("\n");
        let has_imports = window.iter().any(|line| IMPORT_LINE.is_match(line));

        chunks.push(Chunk {
            file_path: file_path.to_string(),
            start_line: start + 1,
            end_line: end,
            content: chunk_content,
            has_imports,
            file_ext: file_ext.clone(),
        });

        if end >= total_lines {
            break;
        }

        start += step_base.min((end - start).saturating_sub(config.overlap_lines).max(1));
    }

    chunks
}

/// Lowercase file extension with a leading dot, or empty when absent.
fn extension_of(file_path: &str) -> String {
    Path::new(file_path)
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()))
        .unwrap_or_default()
}
