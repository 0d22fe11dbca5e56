//! # Contracts AI
//!
//! A question-answering assistant for legal contracts.
//!
//! A contract PDF is uploaded into a session, its text is extracted,
//! chunked and embedded, and a hosted language model answers from the
//! most similar chunks: a structured overview, a risk and compliance scan,
//! and free-form chat. Sessions, contracts, reports, transcripts and
//! embeddings all live in one SQLite database.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────┐   ┌─────────────┐   ┌──────────────┐
//! │   PDF   │──▶│  Extract    │──▶│    SQLite     │
//! │  bytes  │   │ Chunk+Embed │   │ sessions/vecs │
//! └─────────┘   └─────────────┘   └──────┬───────┘
//!                                        │
//!                          ┌─────────────┤ retrieve top-k
//!                          ▼             ▼
//!                     ┌─────────┐   ┌──────────┐
//!                     │   LLM   │◀──│  prompt  │
//!                     └────┬────┘   └──────────┘
//!                          │
//!                 ┌────────┴────────┐
//!                 ▼                 ▼
//!           ┌──────────┐      ┌──────────┐
//!           │   CLI    │      │   HTTP   │
//!           │(contracts)│     │  (axum)  │
//!           └──────────┘      └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! contracts init
//! contracts upload ./msa.pdf
//! contracts overview
//! contracts risks
//! contracts chat "What is the notice period for termination?"
//! contracts serve
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema creation and reset |
//! | [`sessions`] | Session, contract and chat persistence |
//! | [`extract`] | PDF text extraction |
//! | [`chunk`] | Recursive text splitting |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`llm`] | Language model provider abstraction |
//! | [`index`] | Per-contract vector index |
//! | [`rag`] | Prompt construction and retrieval-augmented answers |
//! | [`assistant`] | Session-level operations |
//! | [`server`] | HTTP API |
//! | [`commands`] | CLI command implementations |

pub mod assistant;
pub mod chunk;
pub mod commands;
pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod extract;
mod http;
pub mod index;
pub mod llm;
pub mod migrate;
pub mod models;
pub mod rag;
pub mod server;
pub mod sessions;
