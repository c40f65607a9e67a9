use crate::storage::{self, StorageManager};
use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};

/// Default embedding model, 384 dimensions
const DEFAULT_MODEL: &str = "all-MiniLM-L6-v2";
/// Default similarity threshold. 0.0 keeps every candidate.
const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.0;
/// Default number of results to highlight
const DEFAULT_TOP_N: usize = 3;
/// How many candidates the index is asked for per query
const DEFAULT_SEARCH_K: usize = 10;
/// Default model download timeout in seconds
const DEFAULT_DOWNLOAD_TIMEOUT_SECS: u64 = 300;

/// Configuration for the retrieval pipeline
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Model name for embeddings (e.g., "all-MiniLM-L6-v2")
    #[serde(default = "default_model")]
    pub model: String,

    /// Minimum similarity score a candidate needs to count as a match [0.0, 1.0]
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,

    /// How many results get highlighted on the map
    #[serde(default = "default_top_n")]
    pub default_top_n: usize,

    /// How many candidates to pull from the index before deciding
    #[serde(default = "default_search_k")]
    pub search_k: usize,

    /// Timeout for model download in seconds
    #[serde(default = "default_download_timeout_secs")]
    pub download_timeout_secs: u64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            default_top_n: DEFAULT_TOP_N,
            search_k: DEFAULT_SEARCH_K,
            download_timeout_secs: DEFAULT_DOWNLOAD_TIMEOUT_SECS,
        }
    }
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_similarity_threshold() -> f32 {
    DEFAULT_SIMILARITY_THRESHOLD
}

fn default_top_n() -> usize {
    DEFAULT_TOP_N
}

fn default_search_k() -> usize {
    DEFAULT_SEARCH_K
}

fn default_download_timeout_secs() -> u64 {
    DEFAULT_DOWNLOAD_TIMEOUT_SECS
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    #[serde(skip_serializing, skip_deserializing)]
    base_path: String,
}

impl Config {
    fn validate(&self) -> anyhow::Result<()> {
        let ret = &self.retrieval;

        if ret.model.trim().is_empty() {
            bail!("retrieval.model must not be empty");
        }

        if !(0.0..=1.0).contains(&ret.similarity_threshold) {
            bail!(
                "retrieval.similarity_threshold must be between 0.0 and 1.0, got {}",
                ret.similarity_threshold
            );
        }

        if ret.default_top_n == 0 {
            bail!("retrieval.default_top_n must be greater than 0");
        }

        if ret.search_k == 0 {
            bail!("retrieval.search_k must be greater than 0");
        }

        if ret.download_timeout_secs == 0 {
            bail!("retrieval.download_timeout_secs must be greater than 0");
        }

        Ok(())
    }

    pub fn load_with(base_path: &str) -> anyhow::Result<Self> {
        let store = storage::BackendLocal::new(base_path)
            .context("failed to create config directory")?;

        // create new if does not exist
        if !store.exists("config.yaml") {
            store.write(
                "config.yaml",
                serde_yml::to_string(&Self::default())?.as_bytes(),
            )?;
        }

        let config_str = String::from_utf8(store.read("config.yaml")?)
            .context("config file is not valid utf8")?;
        let mut config: Self =
            serde_yml::from_str(&config_str).context("config is malformed")?;

        config.base_path = base_path.to_string();

        config.validate()?;

        // resave in case config version needs an upgrade
        if config_str != serde_yml::to_string(&config)? {
            config.save()?;
        }

        Ok(config)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let store = storage::BackendLocal::new(&self.base_path)
            .context("failed to create config directory")?;

        let config_str = serde_yml::to_string(&self)?;
        store.write("config.yaml", config_str.as_bytes())?;

        Ok(())
    }
}
