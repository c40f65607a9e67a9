//! Embedding model wrapper for fastembed.
//!
//! Converts text into fixed-length unit vectors:
//! - Model loads once at construction, with a configurable cache directory
//! - Blank query text maps to `None` instead of an error
//! - Every returned vector is explicitly L2-normalized

use fastembed::{InitOptions, TextEmbedding};
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

/// Default download timeout for model files (5 minutes)
const DEFAULT_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(300);

/// Wrapper around fastembed's TextEmbedding model.
/// Uses a Mutex because fastembed's embed() requires &mut self.
pub struct Embedder {
    model: Mutex<TextEmbedding>,
    model_name: String,
    dimensions: usize,
}

/// Error type for embedding operations
#[derive(Debug, thiserror::Error)]
pub enum EmbedderError {
    #[error("Model initialization failed: {0}")]
    InitFailed(String),

    #[error("Embedding generation failed: {0}")]
    EmbedFailed(String),

    #[error("Invalid model name: {0}")]
    InvalidModel(String),
}

impl Embedder {
    /// Create a new embedder with the given model name.
    ///
    /// The model will be downloaded on first use if not cached.
    /// Models are cached in the `models/` subdirectory of `cache_dir`.
    pub fn new(
        model_name: &str,
        cache_dir: PathBuf,
        download_timeout: Option<Duration>,
    ) -> Result<Self, EmbedderError> {
        let model_enum = Self::parse_model_name(model_name)?;
        let _timeout = download_timeout.unwrap_or(DEFAULT_DOWNLOAD_TIMEOUT);

        let models_dir = cache_dir.join("models");
        std::fs::create_dir_all(&models_dir).map_err(|e| {
            EmbedderError::InitFailed(format!("Failed to create models directory: {}", e))
        })?;

        let options = InitOptions::new(model_enum)
            .with_cache_dir(models_dir)
            .with_show_download_progress(true);

        let mut model = TextEmbedding::try_new(options)
            .map_err(|e| EmbedderError::InitFailed(e.to_string()))?;

        let dimensions = Self::probe_dimensions(&mut model)?;

        Ok(Self {
            model: Mutex::new(model),
            model_name: model_name.to_string(),
            dimensions,
        })
    }

    /// Get the model name
    pub fn name(&self) -> &str {
        &self.model_name
    }

    /// Get the embedding dimensions for this model
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Embed one query. Blank text (empty or whitespace-only) means "no
    /// query possible" and returns `None` without touching the model.
    pub fn embed_query(&self, text: &str) -> Result<Option<Vec<f32>>, EmbedderError> {
        if text.trim().is_empty() {
            return Ok(None);
        }

        let mut model = self.model.lock().map_err(|e| {
            EmbedderError::EmbedFailed(format!("Failed to acquire model lock: {}", e))
        })?;

        let embeddings = model
            .embed(vec![text], None)
            .map_err(|e| EmbedderError::EmbedFailed(e.to_string()))?;

        let mut embedding = embeddings
            .into_iter()
            .next()
            .ok_or_else(|| EmbedderError::EmbedFailed("No embedding returned".to_string()))?;

        normalize(&mut embedding);

        Ok(Some(embedding))
    }

    /// Embed a batch of texts, one output per input, same order.
    /// An empty input returns an empty output without a model invocation.
    pub fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedderError> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let mut model = self.model.lock().map_err(|e| {
            EmbedderError::EmbedFailed(format!("Failed to acquire model lock: {}", e))
        })?;

        let mut embeddings = model
            .embed(texts.to_vec(), None)
            .map_err(|e| EmbedderError::EmbedFailed(e.to_string()))?;

        for embedding in embeddings.iter_mut() {
            normalize(embedding);
        }

        Ok(embeddings)
    }

    /// Compute SHA256 hash of the model name for cache identification.
    pub fn model_id_hash(&self) -> [u8; 32] {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(self.model_name.as_bytes());
        hasher.finalize().into()
    }

    /// Parse model name string to fastembed enum.
    fn parse_model_name(name: &str) -> Result<fastembed::EmbeddingModel, EmbedderError> {
        match name.to_lowercase().as_str() {
            "all-minilm-l6-v2" | "allminiml6v2" => Ok(fastembed::EmbeddingModel::AllMiniLML6V2),
            "all-minilm-l6-v2-q" | "allminiml6v2q" => {
                Ok(fastembed::EmbeddingModel::AllMiniLML6V2Q)
            }
            "bge-small-en-v1.5" | "bgesmallenv15" => Ok(fastembed::EmbeddingModel::BGESmallENV15),
            "bge-small-en-v1.5-q" | "bgesmallenv15q" => {
                Ok(fastembed::EmbeddingModel::BGESmallENV15Q)
            }
            "bge-base-en-v1.5" | "bgebaseenv15" => Ok(fastembed::EmbeddingModel::BGEBaseENV15),
            "bge-base-en-v1.5-q" | "bgebaseenv15q" => Ok(fastembed::EmbeddingModel::BGEBaseENV15Q),
            "bge-large-en-v1.5" | "bgelargeenv15" => Ok(fastembed::EmbeddingModel::BGELargeENV15),
            "bge-large-en-v1.5-q" | "bgelargeenv15q" => {
                Ok(fastembed::EmbeddingModel::BGELargeENV15Q)
            }
            _ => Err(EmbedderError::InvalidModel(format!(
                "Unknown model: {}. Supported models: all-MiniLM-L6-v2, bge-small-en-v1.5, bge-base-en-v1.5, bge-large-en-v1.5 (add -q suffix for quantized)",
                name
            ))),
        }
    }

    /// Probe the model to determine embedding dimensions.
    fn probe_dimensions(model: &mut TextEmbedding) -> Result<usize, EmbedderError> {
        let test_embeddings = model
            .embed(vec!["test"], None)
            .map_err(|e| EmbedderError::InitFailed(format!("Failed to probe dimensions: {}", e)))?;

        test_embeddings
            .first()
            .map(|v| v.len())
            .ok_or_else(|| EmbedderError::InitFailed("Model returned no embedding".to_string()))
    }
}

/// Scale a vector to unit length. Vectors with an effectively zero norm
/// are left untouched so a degenerate input cannot produce NaN.
fn normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 1e-10 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_to_unit_length() {
        let mut v = vec![3.0, 4.0];
        normalize(&mut v);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);

        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_normalize_zero_vector_untouched() {
        let mut v = vec![0.0, 0.0, 0.0];
        normalize(&mut v);
        assert_eq!(v, vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_invalid_model_name() {
        let temp_dir = std::env::temp_dir().join("mm-embed-invalid");
        let result = Embedder::new("nonexistent-model", temp_dir, None);
        assert!(matches!(result, Err(EmbedderError::InvalidModel(_))));
    }

    // Integration tests require model download - run with --ignored
    #[test]
    #[ignore = "requires model download"]
    fn test_model_creation() {
        let temp_dir = std::env::temp_dir().join("mm-embed-test");
        let embedder = Embedder::new("all-MiniLM-L6-v2", temp_dir.clone(), None);
        assert!(embedder.is_ok());

        let embedder = embedder.unwrap();
        assert_eq!(embedder.name(), "all-MiniLM-L6-v2");
        assert_eq!(embedder.dimensions(), 384); // MiniLM produces 384-dim embeddings

        let _ = std::fs::remove_dir_all(&temp_dir);
    }

    #[test]
    #[ignore = "requires model download"]
    fn test_query_embedding_is_normalized() {
        let temp_dir = std::env::temp_dir().join("mm-embed-test-norm");
        let embedder = Embedder::new("all-MiniLM-L6-v2", temp_dir.clone(), None).unwrap();

        let embedding = embedder.embed_query("mountain trip photos").unwrap().unwrap();
        assert_eq!(embedding.len(), 384);

        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);

        let _ = std::fs::remove_dir_all(&temp_dir);
    }

    #[test]
    #[ignore = "requires model download"]
    fn test_blank_query_returns_none() {
        let temp_dir = std::env::temp_dir().join("mm-embed-test-blank");
        let embedder = Embedder::new("all-MiniLM-L6-v2", temp_dir.clone(), None).unwrap();

        assert!(embedder.embed_query("").unwrap().is_none());
        assert!(embedder.embed_query("   ").unwrap().is_none());
        assert!(embedder.embed_query("\n\t").unwrap().is_none());

        let _ = std::fs::remove_dir_all(&temp_dir);
    }

    #[test]
    #[ignore = "requires model download"]
    fn test_batch_preserves_order() {
        let temp_dir = std::env::temp_dir().join("mm-embed-test-batch");
        let embedder = Embedder::new("all-MiniLM-L6-v2", temp_dir.clone(), None).unwrap();

        let texts = vec![
            "beach vacation".to_string(),
            "mountain hike".to_string(),
            "city lights".to_string(),
        ];
        let batch = embedder.embed_texts(&texts).unwrap();
        assert_eq!(batch.len(), 3);

        // Each batch output must match the corresponding single embedding
        for (text, batch_embedding) in texts.iter().zip(batch.iter()) {
            let single = embedder.embed_query(text).unwrap().unwrap();
            let dot: f32 = single
                .iter()
                .zip(batch_embedding.iter())
                .map(|(a, b)| a * b)
                .sum();
            assert!((dot - 1.0).abs() < 1e-4, "order mismatch for '{text}'");
        }

        assert!(embedder.embed_texts(&[]).unwrap().is_empty());

        let _ = std::fs::remove_dir_all(&temp_dir);
    }
}
