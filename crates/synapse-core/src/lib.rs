//! # Synapse Core
//!
//! Runtime-free logic for Synapse: the review data model, the embedding
//! trait, both similarity strategies, the embedding cache, the recommender
//! and the store abstraction.
//!
//! This crate holds no sqlx, HTTP client, or server dependencies; concrete
//! providers and the SQLite store live in the `synapse` app crate.

pub mod cache;
pub mod embedding;
pub mod error;
pub mod insights;
pub mod models;
pub mod recommend;
pub mod similarity;
pub mod store;
