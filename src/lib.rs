//! # ragdesk
//!
//! Retrieval-augmented question answering over uploaded documents, with
//! bounded per-session conversation memory.
//!
//! Documents are split into overlapping chunks, embedded in one batch per
//! document, and indexed for cosine similarity search. A question is
//! embedded, matched against the index, and answered by a chat model from
//! the retrieved chunks plus the session's recent turns. The exchange is
//! then appended to the session's history, which is trimmed to a fixed
//! number of turns and expires after a period of inactivity.
//!
//! ## Architecture
//!
//! ```text
//!  upload ─▶ extract ─▶ chunk ─▶ embed ─▶ ┌──────────────┐
//!                                         │ vector index │◀─┐
//!                                         └──────────────┘  │ top-k
//!  question ─▶ embed ───────────────────────────────────────┘
//!                 │
//!                 ▼
//!         context + history ─▶ generate ─▶ answer ─▶ session memory
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! ragd init                                   # create database
//! ragd ingest ./handbook.pdf                  # chunk, embed, index
//! ragd ask "How do I deploy?" --session me    # answer from the index
//! ragd history me                             # show the conversation
//! ragd book --name Ada --email ada@example.com --date 2025-11-01 --time 14:30
//! ragd serve                                  # start HTTP server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`error`] | Pipeline error taxonomy |
//! | [`models`] | Core data types |
//! | [`chunk`] | Fixed-window and recursive text chunking |
//! | [`extract`] | Text extraction from PDF and plain-text uploads |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`store`] | Document and chunk rows |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`vector`] | Cosine-similarity vector index |
//! | [`memory`] | Bounded, expiring session history |
//! | [`generation`] | Chat-completion backends and extractive fallback |
//! | [`pipeline`] | Ingest and query orchestration |
//! | [`app`] | Startup wiring |
//! | [`booking`] | Interview bookings |
//! | [`server`] | HTTP server |
//! | [`ingest`], [`ask`], [`get`] | CLI commands |

pub mod app;
pub mod ask;
pub mod booking;
pub mod chunk;
pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod generation;
pub mod get;
mod http;
pub mod ingest;
pub mod memory;
pub mod migrate;
pub mod models;
pub mod pipeline;
pub mod server;
pub mod store;
pub mod vector;
