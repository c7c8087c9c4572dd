use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Where the corpus, indexes, and prompt overrides are stored
    pub data_dir: PathBuf,
    /// Server bind address
    pub bind_addr: String,
    /// Primary LLM provider configuration
    pub llm: LlmConfig,
    /// Optional fallback provider tried when the primary fails
    pub fallback_llm: Option<LlmConfig>,
    /// Cross-encoder reranker configuration
    pub reranker: RerankerConfig,
    /// Retrieval pipeline tuning
    pub retrieval: RetrievalConfig,
    /// Wall-clock budget for one chat turn, in seconds
    pub turn_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// "ollama" or "openai"
    pub provider: String,
    /// Base URL for the LLM API
    pub base_url: String,
    /// Model name for chat generation
    pub chat_model: String,
    /// Model name for embeddings
    pub embedding_model: String,
    /// API key (only needed for cloud providers)
    pub api_key: Option<String>,
}

/// Configuration for the cross-encoder reranker sidecar
/// (e.g. llama-server with a Qwen3-Reranker model).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RerankerConfig {
    /// Base URL for the reranker API (e.g. "http://127.0.0.1:8082").
    /// If None, reranking degrades to fusion order.
    pub base_url: Option<String>,
    /// Model name to send in the rerank request.
    pub model: Option<String>,
    /// Request timeout in seconds (capped at 30).
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Chunks fetched from each index and kept after re-ranking
    pub top_k: usize,
    /// Rank fusion tuning
    pub fusion: FusionConfig,
}

/// Tunable rank-fusion law. The merged order is advisory input to the
/// re-ranker, so the exact formula is configuration rather than a fixed
/// algorithm.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FusionConfig {
    /// RRF smoothing constant
    pub rrf_k: f32,
    /// Weight applied to lexical ranks
    pub lexical_weight: f32,
    /// Weight applied to dense ranks
    pub dense_weight: f32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            bind_addr: "127.0.0.1:8600".to_string(),
            llm: LlmConfig::default(),
            fallback_llm: None,
            reranker: RerankerConfig::default(),
            retrieval: RetrievalConfig::default(),
            turn_timeout_secs: 120,
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            base_url: "http://localhost:11434".to_string(),
            chat_model: "llama3.2".to_string(),
            embedding_model: "nomic-embed-text".to_string(),
            api_key: None,
        }
    }
}

impl Default for RerankerConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            model: None,
            timeout_secs: 10,
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            fusion: FusionConfig::default(),
        }
    }
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            rrf_k: 60.0,
            lexical_weight: 0.5,
            dense_weight: 0.5,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(dir) = std::env::var("COURSE_CHAT_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Ok(addr) = std::env::var("COURSE_CHAT_BIND_ADDR") {
            config.bind_addr = addr;
        }
        if let Ok(provider) = std::env::var("LLM_PROVIDER") {
            config.llm.provider = provider;
        }
        if let Ok(url) = std::env::var("LLM_BASE_URL") {
            config.llm.base_url = url;
        }
        if let Ok(model) = std::env::var("LLM_CHAT_MODEL") {
            config.llm.chat_model = model;
        }
        if let Ok(model) = std::env::var("LLM_EMBEDDING_MODEL") {
            config.llm.embedding_model = model;
        }
        if let Ok(key) = std::env::var("LLM_API_KEY") {
            config.llm.api_key = Some(key);
        }

        // Fallback provider is enabled by naming its provider kind
        if let Ok(provider) = std::env::var("LLM_FALLBACK_PROVIDER") {
            let mut fallback = config.llm.clone();
            fallback.provider = provider;
            if let Ok(url) = std::env::var("LLM_FALLBACK_BASE_URL") {
                fallback.base_url = url;
            }
            if let Ok(model) = std::env::var("LLM_FALLBACK_CHAT_MODEL") {
                fallback.chat_model = model;
            }
            if let Ok(key) = std::env::var("LLM_FALLBACK_API_KEY") {
                fallback.api_key = Some(key);
            }
            config.fallback_llm = Some(fallback);
        }

        if let Ok(url) = std::env::var("RERANKER_BASE_URL") {
            config.reranker.base_url = Some(url);
        }
        if let Ok(model) = std::env::var("RERANKER_MODEL") {
            config.reranker.model = Some(model);
        }
        if let Ok(val) = std::env::var("RERANKER_TIMEOUT_SECS") {
            if let Ok(v) = val.parse::<u64>() {
                config.reranker.timeout_secs = v.min(30); // Cap at 30s
            }
        }

        if let Ok(val) = std::env::var("COURSE_CHAT_TOP_K") {
            if let Ok(v) = val.parse() {
                config.retrieval.top_k = v;
            }
        }
        if let Ok(val) = std::env::var("COURSE_CHAT_RRF_K") {
            if let Ok(v) = val.parse() {
                config.retrieval.fusion.rrf_k = v;
            }
        }
        if let Ok(val) = std::env::var("COURSE_CHAT_LEXICAL_WEIGHT") {
            if let Ok(v) = val.parse() {
                config.retrieval.fusion.lexical_weight = v;
            }
        }
        if let Ok(val) = std::env::var("COURSE_CHAT_DENSE_WEIGHT") {
            if let Ok(v) = val.parse() {
                config.retrieval.fusion.dense_weight = v;
            }
        }
        if let Ok(val) = std::env::var("COURSE_CHAT_TURN_TIMEOUT_SECS") {
            if let Ok(v) = val.parse() {
                config.turn_timeout_secs = v;
            }
        }

        config
    }

    pub fn corpus_dir(&self) -> PathBuf {
        self.data_dir.join("corpus")
    }

    pub fn index_dir(&self) -> PathBuf {
        self.data_dir.join("index")
    }

    pub fn vector_dir(&self) -> PathBuf {
        self.data_dir.join("vectors")
    }

    pub fn prompts_path(&self) -> PathBuf {
        self.data_dir.join("prompts.json")
    }
}
