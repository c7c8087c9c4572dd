//! Corpus loading: walks a directory of course documents and produces the
//! fixed chunk set both indexes are built from.

use anyhow::{Context, Result};
use std::path::Path;
use walkdir::WalkDir;

use crate::chunking::split_text;
use crate::models::DocChunk;

/// File extensions treated as corpus documents.
const TEXT_EXTENSIONS: &[&str] = &["txt", "md", "markdown"];

/// Load every text document under `dir` and split it into chunks.
/// The chunk's `source_id` is the file path relative to the corpus root.
/// Files are visited in sorted order so a rebuild over an unchanged corpus
/// produces the same chunk set.
pub fn load_corpus(dir: &Path) -> Result<Vec<DocChunk>> {
    if !dir.exists() {
        anyhow::bail!("corpus directory {} does not exist", dir.display());
    }

    let mut chunks = Vec::new();

    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.context("Failed to walk corpus directory")?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let is_text = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| TEXT_EXTENSIONS.contains(&e.to_lowercase().as_str()))
            .unwrap_or(false);
        if !is_text {
            continue;
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read corpus file {}", path.display()))?;

        let source_id = path
            .strip_prefix(dir)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/");

        for (chunk_index, text) in split_text(&content).into_iter().enumerate() {
            chunks.push(DocChunk {
                source_id: source_id.clone(),
                chunk_index,
                text,
            });
        }
    }

    tracing::info!("Loaded {} chunks from {}", chunks.len(), dir.display());
    Ok(chunks)
}
