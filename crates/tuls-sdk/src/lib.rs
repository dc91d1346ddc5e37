//! Tuls SDK - Knowledge and Memory Core
//!
//! This crate ties the shared chunk store to the agent layer:
//!
//! # Storage (from tuls-core)
//!
//! - **db** - SQLite chunk store with FTS5 keyword and cosine vector search
//! - **types** - Chunks and search results
//!
//! # SDK Modules
//!
//! - **memory** - Hybrid memory search with embedding and contention fallbacks
//! - **knowledge** - Knowledge index and LRU cache of agent records
//! - **intent** - Keyword intent classification boosted by historical memory
//! - **delegation** - Agent routing with at most two handoffs per request
//!
//! # Features
//!
//! - `http-embeddings` (default) - query embeddings from an OpenAI-compatible endpoint
//! - `embeddings` - local query embeddings via fastembed
//!
//! # Example
//!
//! ```rust,no_run
//! use tuls_sdk::{SDK, SDKConfig};
//! use tuls_sdk::memory::SearchRequest;
//!
//! async fn example() -> anyhow::Result<()> {
//!     let sdk = SDK::new(SDKConfig::load()?)?;
//!
//!     // Search historical memory
//!     let hits = sdk.search("graphql schema", SearchRequest::in_namespace("main")).await?;
//!
//!     // Route a request through the agents
//!     let outcome = sdk.process("research GraphQL then implement a sample API", None).await?;
//!     println!("{} hits, {} handoffs", hits.len(), outcome.handoffs.len());
//!
//!     Ok(())
//! }
//! ```

// ─────────────────────────────────────────────────────────────────────────────
// Re-export core modules from tuls-core
// ─────────────────────────────────────────────────────────────────────────────

/// Chunk store
pub use tuls_core::db;

/// Chunk and search result types
pub use tuls_core::types;

/// Error types from core
pub use tuls_core::error as core_error;

// ─────────────────────────────────────────────────────────────────────────────
// SDK-specific modules
// ─────────────────────────────────────────────────────────────────────────────

pub mod config;
pub mod delegation;
pub mod domain;
pub mod intent;
pub mod knowledge;
pub mod memory;
pub mod utils;

mod error;
mod sdk;

// Re-export main SDK types
pub use config::SDKConfig;
pub use domain::DomainKind;
pub use error::{SDKError, SDKResult};
pub use sdk::SDK;

pub use delegation::{
    AgentHandoff, DelegationEngine, DelegationOutcome, HandoffSuggestion, SubAgentResult,
};
pub use intent::{IntentAnalysis, IntentClassifier};
pub use knowledge::{AgentRecord, CacheHealth, CacheStats, KnowledgeCache, KnowledgeIndex};
pub use memory::{HybridSearchManager, MemorySearch, SearchRequest};
