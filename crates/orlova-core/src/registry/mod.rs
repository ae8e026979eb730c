//! Model registry (Hugging Face Hub) client.
//!
//! # Module Organization
//!
//! - [`types`] - Query shapes, normalization and the raw record schema
//! - `search` - Catalog search and model details with result caching
//! - `client` - HTTP clients, authentication and download requests

mod client;
mod search;
pub mod types;

pub use client::RegistryClient;
pub use types::{DiffusionQuery, RawRecord, SearchQuery, SortKey};
