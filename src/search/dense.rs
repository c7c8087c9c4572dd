use anyhow::{Context, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::models::DocChunk;

/// A stored chunk embedding
#[derive(Debug, Clone, Serialize, Deserialize)]
struct DenseEntry {
    source_id: String,
    chunk_index: usize,
    text: String,
    embedding: Vec<f32>,
}

/// In-memory vector store over the chunk corpus with disk persistence and
/// cosine similarity search. Safe for concurrent read-only queries.
pub struct DenseIndex {
    entries: RwLock<Vec<DenseEntry>>,
    persist_path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct DenseHit {
    pub chunk: DocChunk,
    pub score: f32,
}

impl DenseIndex {
    /// Open the store at `vector_dir`, loading persisted entries if present.
    pub fn open_or_create(vector_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(vector_dir)?;
        let persist_path = vector_dir.join("vectors.json");

        let entries = if persist_path.exists() {
            let data =
                std::fs::read_to_string(&persist_path).context("Failed to read vector store")?;
            serde_json::from_str(&data).unwrap_or_default()
        } else {
            Vec::new()
        };

        Ok(Self {
            entries: RwLock::new(entries),
            persist_path,
        })
    }

    /// Add embedded chunks. `embeddings` must be parallel with `chunks`.
    pub fn add_chunks(&self, chunks: &[DocChunk], embeddings: Vec<Vec<f32>>) -> Result<()> {
        anyhow::ensure!(
            chunks.len() == embeddings.len(),
            "chunk/embedding count mismatch: {} vs {}",
            chunks.len(),
            embeddings.len()
        );

        let mut entries = self.entries.write();
        for (chunk, embedding) in chunks.iter().zip(embeddings) {
            entries.push(DenseEntry {
                source_id: chunk.source_id.clone(),
                chunk_index: chunk.chunk_index,
                text: chunk.text.clone(),
                embedding,
            });
        }

        let data = serde_json::to_string(&*entries)?;
        std::fs::write(&self.persist_path, data)?;
        Ok(())
    }

    /// Search by cosine similarity against a query embedding.
    pub fn search(&self, query_embedding: &[f32], limit: usize) -> Vec<DenseHit> {
        let entries = self.entries.read();

        let mut scored: Vec<(f32, &DenseEntry)> = entries
            .iter()
            .map(|e| (cosine_similarity(query_embedding, &e.embedding), e))
            .collect();

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);

        scored
            .into_iter()
            .map(|(score, e)| DenseHit {
                chunk: DocChunk {
                    source_id: e.source_id.clone(),
                    chunk_index: e.chunk_index,
                    text: e.text.clone(),
                },
                score,
            })
            .collect()
    }

    pub fn entry_count(&self) -> usize {
        self.entries.read().len()
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for i in 0..a.len() {
        dot += a[i] * b[i];
        norm_a += a[i] * a[i];
        norm_b += b[i] * b[i];
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        0.0
    } else {
        dot / denom
    }
}
