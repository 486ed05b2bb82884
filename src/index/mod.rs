// Index module
// On-disk hybrid search indices: a BM25 inverted index over chunk text and
// an exact-L2 vector index over chunk embeddings.

pub mod bm25;
pub mod vector;

pub use bm25::{Bm25Index, Bm25Params, Bm25Stats};
pub use vector::{VectorIndex, VectorStats};
