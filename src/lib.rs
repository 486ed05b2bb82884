use thiserror::Error;

pub type Result<T> = std::result::Result<T, RagError>;

#[derive(Error, Debug)]
pub enum RagError {
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("Embedder error: {0}")]
    Embedder(String),

    #[error("Corrupt index: {0}")]
    Corrupt(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Operation cancelled")]
    Cancelled,
}

pub mod chunker;
pub mod config;
pub mod embedder;
pub mod engine;
pub mod index;
pub mod search;
pub mod text;
pub mod walker;

pub use engine::{
    CancelFlag, IndexingOptions, IndexingResult, RagEngine, RetrieveResult, SingleFileIndexResult,
};
