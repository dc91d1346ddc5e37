//! Agent Knowledge Base
//!
//! A manifest (`index.json`) maps agent names to record files, capability
//! tags and trigger keywords. The manifest is loaded once into an in-memory
//! [`KnowledgeIndex`]; full [`AgentRecord`]s are hydrated on demand and kept
//! in a fixed-capacity LRU by [`KnowledgeCache`].
//!
//! Manifest format:
//! ```json
//! {
//!   "agents": [
//!     {
//!       "name": "coding-agent",
//!       "recordPath": "agents/coding-agent.json",
//!       "capabilities": ["coding"],
//!       "triggers": ["rust", "bug"],
//!       "sizeBytes": 2048
//!     }
//!   ]
//! }
//! ```

mod cache;
mod lru;
mod source;
mod types;

pub use cache::{
    AgentCursor, CacheHealth, CacheStats, EvictionCallback, HealthStatus, KnowledgeCache,
    PreloadReport,
};
pub use lru::EntryState;
pub use source::{FsKnowledgeSource, InMemoryKnowledgeSource, KnowledgeSource};
pub use types::{AgentRecord, KnowledgeIndex, KnowledgeIndexEntry, Manifest};
