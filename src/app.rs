use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use anyhow::{bail, Context};
use homedir::my_home;
use serde::{Deserialize, Serialize};

use crate::config::{Config, RetrievalConfig};
use crate::decision::{self, Bounds, Decision, IntentAnalysis, Policy};
use crate::memories::{Memory, MemoryStore};
use crate::retrieval::{
    corpus_hash, Candidate, Embedder, EmbedderError, IndexError, MemoryIndex, VectorStorage,
    VectorStorageError,
};

/// How many texts go to the model per embedding call during index builds
const EMBED_BATCH_SIZE: usize = 64;

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("embedding error: {0:?}")]
    Embedding(#[from] EmbedderError),

    #[error("index error: {0:?}")]
    Index(#[from] IndexError),

    #[error("vector storage error: {0:?}")]
    Storage(#[from] VectorStorageError),

    #[error("unexpected error: {0:?}")]
    Other(#[from] anyhow::Error),
}

/// Filesystem layout for the application.
#[derive(Debug, Clone)]
pub struct Paths {
    pub base_path: String,
    pub memories_path: String,
    pub images_path: String,
}

impl Paths {
    /// `MM_BASE_PATH` overrides the default of `~/.local/share/mm`.
    pub fn resolve() -> anyhow::Result<Paths> {
        let base_path = match std::env::var("MM_BASE_PATH") {
            Ok(path) => path,
            Err(_) => {
                let home = my_home()
                    .context("could not determine home directory")?
                    .context("home directory path is empty")?;
                format!("{}/.local/share/mm", home.to_string_lossy())
            }
        };

        std::fs::create_dir_all(&base_path)
            .context("failed to create application base directory")?;

        Ok(Paths {
            memories_path: format!("{base_path}/memories.csv"),
            images_path: format!("{base_path}/images"),
            base_path,
        })
    }
}

/// One ranked search result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryHit {
    pub index: usize,
    pub similarity_score: f32,
    pub memory: Memory,
}

/// Everything the presentation layer needs to render one query's outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    pub query: String,
    pub decision: Decision,
    pub results: Vec<MemoryHit>,
    pub results_count: usize,
    pub total_memories: usize,
    pub has_results: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bounds: Option<Bounds>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stats {
    pub total_memories: usize,
    pub indexed_vectors: usize,
    pub embedding_dimensions: usize,
    pub model_name: String,
    pub system_ready: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigureRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity_threshold: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_top_n: Option<usize>,
}

/// Application orchestrator. Owns the memory collection, the embedding
/// model, the vector index and the decision policy.
///
/// Construction is eager: without memories and an index there is nothing
/// to serve, so load and model failures surface at startup. Per-query
/// conditions (blank query, nothing above threshold) are normal outcomes
/// handled by the policy, never errors.
pub struct App {
    config: Arc<RwLock<Config>>,
    store: MemoryStore,
    embedder: Embedder,
    index: MemoryIndex,
    storage: VectorStorage,
    policy: Policy,
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App").finish_non_exhaustive()
    }
}

impl App {
    pub fn new(config: Arc<RwLock<Config>>, paths: &Paths) -> anyhow::Result<App> {
        let store = MemoryStore::load(&paths.memories_path);
        if !store.is_loaded() {
            bail!(
                "failed to load memories from {} (missing, malformed, or empty)",
                store.path()
            );
        }

        let retrieval = config.read().unwrap().retrieval.clone();

        log::info!(
            "initializing retrieval pipeline with model \"{}\"",
            retrieval.model
        );

        let embedder = Embedder::new(
            &retrieval.model,
            PathBuf::from(&paths.base_path),
            Some(Duration::from_secs(retrieval.download_timeout_secs)),
        )?;

        let texts = store.corpus_texts();
        let hash = corpus_hash(&texts);
        let storage = VectorStorage::new(PathBuf::from(&paths.base_path).join("vectors.bin"));

        let index = Self::load_or_build_index(&embedder, &texts, &storage, hash)?;

        let policy = Policy::new(retrieval.default_top_n, retrieval.similarity_threshold);

        Ok(App {
            config,
            store,
            embedder,
            index,
            storage,
            policy,
        })
    }

    /// Reuse the embedding cache when it still matches the model and the
    /// corpus. Expected lifecycle mismatches fall back to a rebuild; a
    /// corrupt or unreadable cache is propagated.
    fn load_or_build_index(
        embedder: &Embedder,
        texts: &[String],
        storage: &VectorStorage,
        hash: u64,
    ) -> Result<MemoryIndex, AppError> {
        let model_id = embedder.model_id_hash();

        if !storage.exists() {
            log::info!("no embedding cache found, building index");
            return Self::build_index(embedder, texts, storage, hash);
        }

        match storage.load(&model_id, embedder.dimensions(), hash) {
            Ok(index) => {
                log::info!("loaded {} vectors from cache", index.len());
                Ok(index)
            }
            Err(VectorStorageError::ModelMismatch) => {
                log::warn!("embedding model changed, rebuilding index");
                Self::build_index(embedder, texts, storage, hash)
            }
            Err(VectorStorageError::CorpusMismatch) => {
                log::warn!("memories changed since last index, rebuilding");
                Self::build_index(embedder, texts, storage, hash)
            }
            Err(VectorStorageError::VersionMismatch(found, _)) => {
                log::warn!("cache format version {found} unsupported, rebuilding index");
                Self::build_index(embedder, texts, storage, hash)
            }
            Err(err) => {
                log::error!("failed to load embedding cache: {err}");
                Err(err.into())
            }
        }
    }

    fn build_index(
        embedder: &Embedder,
        texts: &[String],
        storage: &VectorStorage,
        hash: u64,
    ) -> Result<MemoryIndex, AppError> {
        let mut index = MemoryIndex::new(embedder.dimensions());

        let progress = indicatif::ProgressBar::new(texts.len() as u64);
        for chunk in texts.chunks(EMBED_BATCH_SIZE) {
            let embeddings = embedder.embed_texts(chunk)?;
            for embedding in embeddings {
                index.push(embedding)?;
            }
            progress.inc(chunk.len() as u64);
        }
        progress.finish_and_clear();

        storage.save(&index, &embedder.model_id_hash(), hash)?;
        log::info!("indexed {} memories", index.len());

        Ok(index)
    }

    /// The full pipeline for one query: embed, retrieve, decide.
    pub fn respond_to_query(&self, query: &str) -> Result<QueryResponse, AppError> {
        let search_k = self.config.read().unwrap().retrieval.search_k;

        let mut ranked = self.ranked_candidates(query, search_k)?;
        ranked.truncate(self.policy.default_top_n());

        let decision = self.policy.decide(query, &ranked);
        let results = self.resolve_hits(&ranked);

        let bounds = if decision.zoom_to_results {
            let memories: Vec<Memory> = results.iter().map(|hit| hit.memory.clone()).collect();
            decision::determine_bounds(&memories)
        } else {
            None
        };

        Ok(QueryResponse {
            query: query.to_string(),
            decision,
            has_results: !results.is_empty(),
            results_count: results.len(),
            total_memories: self.store.count(),
            results,
            bounds,
        })
    }

    /// Ranked hits without a display decision attached.
    pub fn search(&self, query: &str, k: usize) -> Result<Vec<MemoryHit>, AppError> {
        let ranked = self.ranked_candidates(query, k)?;
        Ok(self.resolve_hits(&ranked))
    }

    fn ranked_candidates(&self, query: &str, k: usize) -> Result<Vec<Candidate>, AppError> {
        // a blank query embeds to nothing, which means no candidates
        let Some(query_vector) = self.embedder.embed_query(query)? else {
            return Ok(vec![]);
        };

        Ok(self.index.search(&query_vector, k)?)
    }

    fn resolve_hits(&self, candidates: &[Candidate]) -> Vec<MemoryHit> {
        candidates
            .iter()
            .filter_map(|candidate| {
                self.store.get(candidate.index).map(|memory| MemoryHit {
                    index: candidate.index,
                    similarity_score: candidate.score,
                    memory: memory.clone(),
                })
            })
            .collect()
    }

    pub fn stats(&self) -> Stats {
        Stats {
            total_memories: self.store.count(),
            indexed_vectors: self.index.len(),
            embedding_dimensions: self.embedder.dimensions(),
            model_name: self.embedder.name().to_string(),
            system_ready: self.is_ready(),
        }
    }

    /// Memories whose location contains `location`, case-insensitive.
    pub fn memories_by_location(&self, location: &str) -> Vec<Memory> {
        self.store.find_by_location(location)
    }

    pub fn analyze_query(&self, query: &str) -> IntentAnalysis {
        decision::analyze_intent(query)
    }

    /// Snapshot of the whole collection, in record order.
    pub fn all_memories(&self) -> Vec<Memory> {
        self.store.all().to_vec()
    }

    pub fn is_ready(&self) -> bool {
        self.store.is_loaded() && !self.index.is_empty()
    }

    pub fn retrieval_config(&self) -> RetrievalConfig {
        self.config.read().unwrap().retrieval.clone()
    }

    /// Apply runtime tuning through the clamping setters, then persist
    /// whatever values actually took effect.
    pub fn configure(&mut self, req: ConfigureRequest) -> Result<RetrievalConfig, AppError> {
        if let Some(threshold) = req.similarity_threshold {
            self.policy.set_similarity_threshold(threshold);
        }

        if let Some(top_n) = req.default_top_n {
            self.policy.set_default_top_n(top_n);
        }

        let mut config = self.config.write().unwrap();
        config.retrieval.similarity_threshold = self.policy.similarity_threshold();
        config.retrieval.default_top_n = self.policy.default_top_n();
        config.save()?;

        Ok(config.retrieval.clone())
    }

    /// Re-embed the whole corpus and rewrite the cache.
    pub fn rebuild_index(&mut self) -> Result<usize, AppError> {
        let texts = self.store.corpus_texts();
        let hash = corpus_hash(&texts);

        self.index = Self::build_index(&self.embedder, &texts, &self.storage, hash)?;

        Ok(self.index.len())
    }
}
