use anyhow::{Context, Result};
use std::path::Path;
use tantivy::collector::TopDocs;
use tantivy::query::QueryParser;
use tantivy::schema::*;
use tantivy::{doc, Index, IndexWriter, ReloadPolicy, TantivyDocument};

use crate::models::DocChunk;

/// BM25 index over the document chunk corpus, built on tantivy.
pub struct LexicalIndex {
    index: Index,
    f_source_id: Field,
    f_chunk_index: Field,
    f_text: Field,
}

#[derive(Debug, Clone)]
pub struct LexicalHit {
    pub chunk: DocChunk,
    pub score: f32,
}

impl LexicalIndex {
    /// Create or open the index at the given directory. Idempotent: opening
    /// an existing store reuses it unchanged.
    pub fn open_or_create(index_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(index_dir)?;

        let mut schema_builder = Schema::builder();
        let f_source_id = schema_builder.add_text_field("source_id", STRING | STORED);
        let f_chunk_index =
            schema_builder.add_u64_field("chunk_index", NumericOptions::default() | STORED);
        let f_text = schema_builder.add_text_field("text", TEXT | STORED);
        let schema = schema_builder.build();

        let index = if index_dir.join("meta.json").exists() {
            Index::open_in_dir(index_dir).context("Failed to open existing tantivy index")?
        } else {
            Index::create_in_dir(index_dir, schema).context("Failed to create tantivy index")?
        };

        Ok(Self {
            index,
            f_source_id,
            f_chunk_index,
            f_text,
        })
    }

    /// Index a batch of chunks and commit.
    pub fn index_chunks(&self, chunks: &[DocChunk]) -> Result<()> {
        let mut writer: IndexWriter = self
            .index
            .writer(50_000_000)
            .context("Failed to create index writer")?;

        for chunk in chunks {
            writer.add_document(doc!(
                self.f_source_id => chunk.source_id.clone(),
                self.f_chunk_index => chunk.chunk_index as u64,
                self.f_text => chunk.text.clone(),
            ))?;
        }

        writer.commit().context("Failed to commit index")?;
        Ok(())
    }

    pub fn doc_count(&self) -> Result<u64> {
        let reader = self
            .index
            .reader_builder()
            .reload_policy(ReloadPolicy::OnCommitWithDelay)
            .try_into()
            .context("Failed to create reader")?;
        Ok(reader.searcher().num_docs())
    }

    /// Search the index and return up to `limit` scored hits.
    ///
    /// Query parsing is lenient so an arbitrary question string never fails
    /// the search. An empty index yields an empty list, not an error.
    pub fn search(&self, query_str: &str, limit: usize) -> Result<Vec<LexicalHit>> {
        let reader = self
            .index
            .reader_builder()
            .reload_policy(ReloadPolicy::OnCommitWithDelay)
            .try_into()
            .context("Failed to create reader")?;

        let searcher = reader.searcher();

        let query_parser = QueryParser::for_index(&self.index, vec![self.f_text]);
        let (query, _parse_errors) = query_parser.parse_query_lenient(query_str);

        let top_docs = searcher
            .search(&query, &TopDocs::with_limit(limit))
            .context("Search failed")?;

        let mut hits = Vec::with_capacity(top_docs.len());

        for (score, doc_address) in top_docs {
            let doc: TantivyDocument = searcher
                .doc(doc_address)
                .context("Failed to retrieve document")?;

            let source_id = doc
                .get_first(self.f_source_id)
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();

            let chunk_index = doc
                .get_first(self.f_chunk_index)
                .and_then(|v| v.as_u64())
                .unwrap_or(0) as usize;

            let text = doc
                .get_first(self.f_text)
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();

            hits.push(LexicalHit {
                chunk: DocChunk {
                    source_id,
                    chunk_index,
                    text,
                },
                score,
            });
        }

        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(source: &str, index: usize, text: &str) -> DocChunk {
        DocChunk {
            source_id: source.to_string(),
            chunk_index: index,
            text: text.to_string(),
        }
    }

    #[test]
    fn test_empty_index_returns_empty_list() {
        let dir = tempfile::tempdir().unwrap();
        let index = LexicalIndex::open_or_create(dir.path()).unwrap();
        let hits = index.search("anything at all", 5).unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn test_index_and_search_ranks_by_term_overlap() {
        let dir = tempfile::tempdir().unwrap();
        let index = LexicalIndex::open_or_create(dir.path()).unwrap();

        index
            .index_chunks(&[
                chunk("a.md", 0, "The NIST framework defines five security functions."),
                chunk("b.md", 0, "Grading policy and late submission rules."),
                chunk("c.md", 0, "Framework overview without the other keyword."),
            ])
            .unwrap();

        let hits = index.search("NIST framework", 5).unwrap();
        assert!(!hits.is_empty());
        assert_eq!(hits[0].chunk.source_id, "a.md");
    }

    #[test]
    fn test_search_is_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        let index = LexicalIndex::open_or_create(dir.path()).unwrap();
        index
            .index_chunks(&[
                chunk("a.md", 0, "hash tables and collisions"),
                chunk("b.md", 0, "hash functions in cryptography"),
            ])
            .unwrap();

        let first = index.search("hash", 5).unwrap();
        let second = index.search("hash", 5).unwrap();
        let keys_first: Vec<_> = first.iter().map(|h| h.chunk.key().1).collect();
        let keys_second: Vec<_> = second.iter().map(|h| h.chunk.key().1).collect();
        assert_eq!(
            first.iter().map(|h| h.chunk.source_id.clone()).collect::<Vec<_>>(),
            second.iter().map(|h| h.chunk.source_id.clone()).collect::<Vec<_>>()
        );
        assert_eq!(keys_first, keys_second);
    }

    #[test]
    fn test_lenient_parsing_tolerates_punctuation() {
        let dir = tempfile::tempdir().unwrap();
        let index = LexicalIndex::open_or_create(dir.path()).unwrap();
        index
            .index_chunks(&[chunk("a.md", 0, "operator precedence in expressions")])
            .unwrap();

        // Unbalanced quotes and operators must not error
        let result = index.search("what is \"operator precedence? (AND", 5);
        assert!(result.is_ok());
    }

    #[test]
    fn test_limit_respected() {
        let dir = tempfile::tempdir().unwrap();
        let index = LexicalIndex::open_or_create(dir.path()).unwrap();
        let chunks: Vec<DocChunk> = (0..20)
            .map(|i| chunk("big.md", i, "repeated lecture topic text"))
            .collect();
        index.index_chunks(&chunks).unwrap();

        let hits = index.search("lecture topic", 5).unwrap();
        assert!(hits.len() <= 5);
    }
}
