//! # Synapse
//!
//! Backend for a systematic literature review workspace: projects, their
//! articles, links between related articles, and similarity-based
//! recommendations.
//!
//! Recommendations are scored by cosine similarity of remote embeddings
//! (Gemini or Ollama) when a provider is reachable, and by a weighted
//! token-overlap heuristic otherwise. The scoring logic itself lives in the
//! runtime-free `synapse-core` crate; this crate wires it to SQLite, HTTP
//! providers, authentication and an axum server.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────┐   ┌──────────────────┐
//! │   HTTP   │──▶│ synapse-core │──▶│ EmbeddingProvider │──▶ Gemini / Ollama
//! │  (axum)  │   │  Recommender │   └──────────────────┘
//! └────┬─────┘   └──────┬───────┘
//!      │                ▼
//!      │         ┌──────────────┐
//!      └────────▶│ SQLite store │
//!                └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! synapse init                      # create database
//! synapse token --user alice        # mint a bearer token
//! synapse serve                     # start HTTP server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`sqlite_store`] | SQLite implementation of the core `Store` |
//! | [`embedding`] | Gemini and Ollama embedding providers |
//! | [`auth`] | Bearer-token verification and issuance |
//! | [`server`] | Router, shared state, error contract |
//! | [`projects`] | Project endpoints and graph |
//! | [`articles`] | Article and relationship endpoints |
//! | [`recommendations`] | Recommendation, auto-relate and insight endpoints |

pub mod articles;
pub mod auth;
pub mod config;
pub mod db;
pub mod embedding;
pub mod migrate;
pub mod projects;
pub mod recommendations;
pub mod server;
pub mod sqlite_store;
