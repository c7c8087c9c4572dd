//! # course-chat
//!
//! A Rust backend for answering course-related questions with
//! retrieval-augmented generation: hybrid lexical + dense retrieval,
//! cross-encoder re-ranking, and a bounded self-correcting answer
//! generation loop.
//!
//! ## Architecture
//!
//! One chat turn is a sequential pipeline:
//!
//! ```text
//!                   ┌──────────────────┐
//!                   │  Raw question +  │
//!                   │  chat history    │
//!                   └────────┬─────────┘
//!                            │
//!                            ▼
//!                  ┌──────────────────┐
//!                  │ Question Resolver │  one LLM call, rewrites the
//!                  └────────┬─────────┘  question to stand alone
//!                           │ resolved question
//!              ┌────────────┴────────────┐
//!              ▼                         ▼
//!     ┌─────────────────┐      ┌─────────────────┐
//!     │  Lexical (BM25)  │      │  Dense (cosine)  │
//!     │  top-5, tantivy  │      │  top-5, embedded │
//!     └────────┬────────┘      └────────┬────────┘
//!              │                        │
//!              └───────────┬────────────┘
//!                          ▼
//!              ┌───────────────────────┐
//!              │  Rank fusion + dedup   │  weighted RRF (tunable),
//!              │  fails open per side   │  provenance per candidate
//!              └───────────┬───────────┘
//!                          ▼
//!              ┌───────────────────────┐
//!              │ Cross-encoder rerank   │  /v1/rerank, top-5 cut,
//!              │ falls back to fusion   │  degraded flag on failure
//!              │ order on failure       │
//!              └───────────┬───────────┘
//!                          ▼
//!              ┌───────────────────────┐
//!              │ Answer Generator       │  draft → validate → repair,
//!              │ 1 draft + 3 repairs,   │  fixed fallback answer on
//!              │ schema-checked JSON    │  exhaustion
//!              └───────────────────────┘
//! ```
//!
//! ## Module Overview
//!
//! - [`config`] - Environment-based configuration for server, data dirs, LLM
//!   providers, reranker, and fusion tuning
//! - [`models`] - Shared data types: `DocChunk`, `Candidate`,
//!   `StructuredAnswer`, chat request/response types
//! - [`error`] - Typed per-stage error taxonomy for a chat turn
//! - [`chunking`] - Overlapping character chunker for corpus documents
//! - [`corpus`] - Corpus directory loader producing document chunks
//! - [`search::lexical`] - BM25 index over chunks powered by tantivy
//! - [`search::dense`] - In-memory vector store with cosine similarity and
//!   disk persistence
//! - [`search::hybrid`] - Weighted reciprocal-rank fusion of both indexes
//!   with dedup and degraded-mode flags
//! - [`llm`] - Embedding, chat generation (provider chain with fallback), and
//!   cross-encoder rerank clients for Ollama / OpenAI-compatible APIs
//! - [`chat`] - Question resolution, the answer generation state machine, and
//!   the turn pipeline tying the stages together
//! - [`api`] - Axum HTTP handler exposing the chat turn
//! - [`state`] - Application state: indexes loaded once at startup and shared
//!   read-only across requests

pub mod api;
pub mod chat;
pub mod chunking;
pub mod config;
pub mod corpus;
pub mod error;
pub mod llm;
pub mod models;
pub mod search;
pub mod state;
