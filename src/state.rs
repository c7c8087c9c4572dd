use anyhow::{Context, Result};
use std::sync::Arc;

use crate::chat::pipeline::ChatEngine;
use crate::chat::prompts::PromptSet;
use crate::config::Config;
use crate::corpus::load_corpus;
use crate::llm::embeddings::embed_batch;
use crate::llm::provider::ProviderChain;
use crate::search::dense::DenseIndex;
use crate::search::hybrid::HybridRetriever;
use crate::search::lexical::LexicalIndex;

/// Shared application state. Constructed once at startup; the indexes are
/// loaded here and shared read-only across concurrent requests.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub engine: Arc<ChatEngine>,
}

impl AppState {
    /// Load indexes from the durable store, building them from the corpus
    /// when empty. A missing store AND missing corpus is a fatal
    /// initialization error, never a per-query one.
    pub async fn load(config: Config) -> Result<Self> {
        std::fs::create_dir_all(config.index_dir())?;
        std::fs::create_dir_all(config.vector_dir())?;

        let client = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(10))
            .timeout(std::time::Duration::from_secs(120))
            .build()?;

        let lexical = LexicalIndex::open_or_create(&config.index_dir())?;
        let dense = DenseIndex::open_or_create(&config.vector_dir())?;

        let lexical_docs = lexical.doc_count()?;
        if lexical_docs == 0 || dense.entry_count() == 0 {
            let chunks = load_corpus(&config.corpus_dir())
                .context("No persisted indexes and no corpus to build them from")?;
            anyhow::ensure!(
                !chunks.is_empty(),
                "corpus at {} contains no documents",
                config.corpus_dir().display()
            );

            if lexical_docs == 0 {
                lexical.index_chunks(&chunks)?;
            }
            if dense.entry_count() == 0 {
                let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
                let embeddings = embed_batch(&client, &config.llm, &texts)
                    .await
                    .context("Failed to embed the corpus at startup")?;
                dense.add_chunks(&chunks, embeddings)?;
            }
            tracing::info!("Built indexes from corpus: {} chunks", chunks.len());
        } else {
            tracing::info!(
                "Loaded persisted indexes: {} lexical docs, {} vectors",
                lexical_docs,
                dense.entry_count()
            );
        }

        let engine = ChatEngine {
            client,
            llm: config.llm.clone(),
            chain: ProviderChain::new(config.llm.clone(), config.fallback_llm.clone()),
            reranker: config.reranker.clone(),
            retriever: HybridRetriever {
                lexical: Arc::new(lexical),
                dense: Arc::new(dense),
                fusion: config.retrieval.fusion,
                top_k: config.retrieval.top_k,
            },
            prompts: PromptSet::load_or_default(&config.prompts_path()),
        };

        Ok(Self {
            config,
            engine: Arc::new(engine),
        })
    }
}
