// Embedding client
// Talks to the out-of-process embedding server over HTTP JSON and
// normalizes every response to the index dimension.


use std::process::{Command, Stdio};
use std::time::Duration;

use anyhow::{Context, Result as AnyResult};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use url::Url;

use crate::config::EmbedderConfig;
use crate::{RagError, Result};

/// Embedding dimension of the default embedder.
pub const DEFAULT_EMBEDDING_DIMENSION: usize = 768;

/// Replacement for missing or non-finite embedding components.
const FILL_VALUE: f32 = 0.1;

/// How long and how often to poll `/health` after starting the embedder.
const STARTUP_POLL_ATTEMPTS: u32 = 10;
const STARTUP_POLL_INTERVAL: Duration = Duration::from_millis(300);

/// A pure text-to-vector function of fixed dimension.
pub trait Embedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    fn dimension(&self) -> usize;
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

/// HTTP client for the embedding server.
///
/// One request, one retry. Before the retry, a failed health check
/// optionally launches the configured embedder process and waits for it to
/// come up.
#[derive(Debug, Clone)]
pub struct HttpEmbedder {
    base_url: Url,
    dimension: usize,
    agent: ureq::Agent,
    startup_command: Option<Vec<String>>,
}

impl HttpEmbedder {
    #[inline]
    pub fn new(config: &EmbedderConfig) -> Result<Self> {
        let base_url = config.base_url()?;

        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(config.timeout_secs)))
            .build()
            .into();

        Ok(Self {
            base_url,
            dimension: config.dimension,
            agent,
            startup_command: config.startup_command.clone(),
        })
    }

    /// Whether the embedding server answers its health endpoint.
    #[inline]
    pub fn health_check(&self) -> bool {
        let Ok(url) = self.base_url.join("/health") else {
            return false;
        };
        self.agent.get(url.as_str()).call().is_ok()
    }

    fn request_embedding(&self, text: &str) -> AnyResult<Vec<f32>> {
        let url = self
            .base_url
            .join("/embed")
            .context("Failed to build embed URL")?;

        let request = EmbedRequest { text };
        let request_json =
            serde_json::to_string(&request).context("Failed to serialize embed request")?;

        let response_text = self
            .agent
            .post(url.as_str())
            .header("Content-Type", "application/json")
            .send(&request_json)
            .and_then(|mut resp| resp.body_mut().read_to_string())
            .context("Embed request failed")?;

        let response: EmbedResponse =
            serde_json::from_str(&response_text).context("Failed to parse embed response")?;

        debug!(
            "Received embedding with {} dimensions",
            response.embedding.len()
        );
        Ok(response.embedding)
    }

    /// Launch the configured embedder process, detached, and wait briefly
    /// for it to answer health checks.
    fn try_start_embedder(&self) {
        let Some(command) = self.startup_command.as_deref() else {
            return;
        };
        let Some((program, args)) = command.split_first() else {
            return;
        };

        info!("Starting embedder process: {}", program);
        match Command::new(program)
            .args(args)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
        {
            Ok(child) => {
                debug!("Embedder process spawned with pid {}", child.id());
                for _ in 0..STARTUP_POLL_ATTEMPTS {
                    std::thread::sleep(STARTUP_POLL_INTERVAL);
                    if self.health_check() {
                        info!("Embedder came up at {}", self.base_url);
                        return;
                    }
                }
                warn!("Embedder did not answer health checks after startup");
            }
            Err(e) => warn!("Failed to start embedder process {}: {}", program, e),
        }
    }
}

impl Embedder for HttpEmbedder {
    #[inline]
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        match self.request_embedding(text) {
            Ok(embedding) => Ok(normalize_embedding(embedding, self.dimension)),
            Err(first) => {
                warn!("Embedding request failed, retrying once: {first:#}");
                if !self.health_check() {
                    self.try_start_embedder();
                }

                let embedding = self.request_embedding(text).map_err(|e| {
                    RagError::Embedder(format!("Embedding failed after retry: {e:#}"))
                })?;
                Ok(normalize_embedding(embedding, self.dimension))
            }
        }
    }

    #[inline]
    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Force a raw embedding into shape: truncate or right-pad to `dimension`,
/// then replace non-finite components.
#[inline]
pub fn normalize_embedding(mut embedding: Vec<f32>, dimension: usize) -> Vec<f32> {
    embedding.truncate(dimension);
    embedding.resize(dimension, FILL_VALUE);

    for value in &mut embedding {
        if !value.is_finite() {
            *value = FILL_VALUE;
        }
    }

    embedding
}
