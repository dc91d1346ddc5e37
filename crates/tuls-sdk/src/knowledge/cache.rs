//! Knowledge Cache
//!
//! Lazy, LRU-bounded hydration of agent records behind an in-memory index.
//!
//! Listing and tag lookups only touch the index. `get` hydrates a record
//! from its `recordPath` on a miss and promotes it on a hit. A missing
//! manifest is negatively cached for `negative_ttl_secs`, so repeated
//! lookups within that window fail without re-probing the source.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use super::lru::{EntryState, LruState};
use super::source::{FsKnowledgeSource, KnowledgeSource};
use super::types::{AgentRecord, KnowledgeIndex, KnowledgeIndexEntry, Manifest};
use crate::config::KnowledgeConfig;
use crate::{SDKError, SDKResult};

/// Called with the evicted agent name
pub type EvictionCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Overall cache health
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Warning,
    Critical,
}

/// Cache statistics snapshot
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStats {
    pub size: usize,
    pub capacity: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub loads: u64,
    /// hits / (hits + misses), 0 before the first lookup
    pub hit_rate: f64,
    /// size / capacity
    pub utilization: f64,
    /// evictions / (hits + misses)
    pub eviction_rate: f64,
    /// Average hydrate latency in milliseconds
    pub avg_load_ms: f64,
}

/// Result of `health()`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheHealth {
    pub status: HealthStatus,
    pub issues: Vec<String>,
    pub recommendations: Vec<String>,
    pub stats: CacheStats,
}

/// Outcome of a batch preload; individual failures do not abort the batch
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PreloadReport {
    pub loaded: Vec<String>,
    pub failed: Vec<(String, String)>,
}

#[derive(Default)]
struct Counters {
    hits: u64,
    misses: u64,
    evictions: u64,
    loads: u64,
    load_time: Duration,
    access_counts: HashMap<String, u64>,
}

struct NegativeEntry {
    path: String,
    at: Instant,
}

/// Index-backed, LRU-bounded cache of agent records
pub struct KnowledgeCache {
    source: Arc<dyn KnowledgeSource>,
    config: KnowledgeConfig,
    index: RwLock<Option<Arc<KnowledgeIndex>>>,
    negative: Mutex<Option<NegativeEntry>>,
    lru: Mutex<LruState<Arc<AgentRecord>>>,
    counters: Mutex<Counters>,
    on_evict: Option<EvictionCallback>,
}

impl KnowledgeCache {
    pub fn new(source: Arc<dyn KnowledgeSource>, config: KnowledgeConfig) -> Self {
        let lru = LruState::new(config.cache_capacity);
        Self {
            source,
            config,
            index: RwLock::new(None),
            negative: Mutex::new(None),
            lru: Mutex::new(lru),
            counters: Mutex::new(Counters::default()),
            on_evict: None,
        }
    }

    /// Cache over a knowledge directory on disk
    pub fn from_dir(dir: impl Into<PathBuf>, config: KnowledgeConfig) -> Self {
        let source = FsKnowledgeSource::new(dir, config.manifest_file.clone());
        Self::new(Arc::new(source), config)
    }

    /// Register a callback invoked with each evicted key
    pub fn with_eviction_callback(mut self, callback: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_evict = Some(Arc::new(callback));
        self
    }

    pub fn config(&self) -> &KnowledgeConfig {
        &self.config
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Index
    // ─────────────────────────────────────────────────────────────────────────

    /// Load the index once; later calls return the cached snapshot
    pub async fn load_index(&self) -> SDKResult<Arc<KnowledgeIndex>> {
        if let Some(index) = self.index.read().await.as_ref() {
            return Ok(Arc::clone(index));
        }
        if let Some(err) = self.negative_hit().await {
            return Err(err);
        }

        let mut slot = self.index.write().await;
        if let Some(index) = slot.as_ref() {
            return Ok(Arc::clone(index));
        }
        // Another caller may have recorded the failure while we waited
        if let Some(err) = self.negative_hit().await {
            return Err(err);
        }

        let text = match self.source.read_manifest().await {
            Ok(text) => text,
            Err(SDKError::KnowledgeSourceMissing { path }) => {
                warn!(
                    path = %path,
                    ttl_secs = self.config.negative_ttl_secs,
                    "Knowledge source missing, caching failure"
                );
                *self.negative.lock().await = Some(NegativeEntry {
                    path: path.clone(),
                    at: Instant::now(),
                });
                return Err(SDKError::knowledge_source_missing(path));
            }
            Err(e) => return Err(e),
        };

        let manifest: Manifest = serde_json::from_str(&text)?;
        let index = Arc::new(KnowledgeIndex::from_manifest(manifest));
        info!(
            agents = index.len(),
            source = %self.source.describe(),
            "Loaded knowledge index"
        );

        *slot = Some(Arc::clone(&index));
        Ok(index)
    }

    async fn negative_hit(&self) -> Option<SDKError> {
        let ttl = Duration::from_secs(self.config.negative_ttl_secs);
        let negative = self.negative.lock().await;
        negative
            .as_ref()
            .filter(|entry| entry.at.elapsed() < ttl)
            .map(|entry| {
                debug!(path = %entry.path, "Knowledge source missing (negative cache)");
                SDKError::knowledge_source_missing(entry.path.clone())
            })
    }

    /// Agent names, sorted
    pub async fn list_names(&self) -> SDKResult<Vec<String>> {
        Ok(self.load_index().await?.list_names())
    }

    pub async fn find_by_capability(&self, tag: &str) -> SDKResult<Vec<String>> {
        Ok(self.load_index().await?.find_by_capability(tag))
    }

    pub async fn find_by_trigger(&self, tag: &str) -> SDKResult<Vec<String>> {
        Ok(self.load_index().await?.find_by_trigger(tag))
    }

    /// Resolve a requested name to an index entry without hydrating it
    pub async fn resolve(&self, requested: &str) -> SDKResult<Option<KnowledgeIndexEntry>> {
        Ok(self.load_index().await?.resolve(requested).cloned())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Records
    // ─────────────────────────────────────────────────────────────────────────

    /// Get an agent record by name.
    ///
    /// Case-insensitive exact match first, then substring match against the
    /// sorted index keys. Fails with `AgentNotFound` naming the known agents.
    pub async fn get(&self, name: &str) -> SDKResult<Arc<AgentRecord>> {
        self.fetch(name, true).await
    }

    async fn fetch(&self, requested: &str, record_access: bool) -> SDKResult<Arc<AgentRecord>> {
        let index = self.load_index().await?;
        let entry = index
            .resolve(requested)
            .cloned()
            .ok_or_else(|| SDKError::agent_not_found(requested, index.list_names()))?;
        let key = entry.name.clone();

        let (cached, previous) = {
            let mut lru = self.lru.lock().await;
            let previous = lru.state(&key);
            let cached = lru.get(&key);
            if cached.is_none() {
                lru.mark_loading(&key);
            }
            (cached, previous)
        };

        if record_access {
            let mut counters = self.counters.lock().await;
            if cached.is_some() {
                counters.hits += 1;
            } else {
                counters.misses += 1;
            }
            *counters.access_counts.entry(key.clone()).or_default() += 1;
        }

        if let Some(record) = cached {
            debug!(agent = %key, "Knowledge cache hit");
            return Ok(record);
        }

        let started = Instant::now();
        let record = match self.hydrate(&entry).await {
            Ok(record) => Arc::new(record),
            Err(e) => {
                self.lru.lock().await.restore(&key, previous);
                warn!(agent = %key, error = %e, "Failed to hydrate agent record");
                return Err(e);
            }
        };
        let elapsed = started.elapsed();

        let evicted = self.lru.lock().await.insert(&key, Arc::clone(&record));
        {
            let mut counters = self.counters.lock().await;
            counters.loads += 1;
            counters.load_time += elapsed;
            if evicted.is_some() {
                counters.evictions += 1;
            }
        }

        debug!(agent = %key, elapsed_us = elapsed.as_micros() as u64, "Hydrated agent record");

        if let Some(evicted) = evicted {
            debug!(agent = %evicted, "Evicted agent record");
            if let Some(callback) = &self.on_evict {
                callback(&evicted);
            }
        }

        Ok(record)
    }

    async fn hydrate(&self, entry: &KnowledgeIndexEntry) -> SDKResult<AgentRecord> {
        let text = self.source.read_record(&entry.record_path).await?;
        let mut record = AgentRecord::parse(&text)
            .map_err(|e| SDKError::invalid_record(&entry.name, e.to_string()))?;

        if !record.name.eq_ignore_ascii_case(&entry.name) {
            return Err(SDKError::invalid_record(
                &entry.name,
                format!("record is named {:?}", record.name),
            ));
        }

        // Records may leave tags to the manifest
        if record.capabilities.is_empty() && !entry.capabilities.is_empty() {
            record.capabilities = entry.capabilities.clone();
            record.domain = crate::domain::DomainKind::for_agent(&record.name, &record.capabilities);
        }
        if record.triggers.is_empty() {
            record.triggers = entry.triggers.clone();
        }

        Ok(record)
    }

    /// Hydrate a batch concurrently. Preloads do not count as lookups.
    pub async fn preload(self: &Arc<Self>, names: &[String]) -> PreloadReport {
        let mut tasks = JoinSet::new();
        for name in names {
            let cache = Arc::clone(self);
            let name = name.clone();
            tasks.spawn(async move {
                let result = cache.fetch(&name, false).await;
                (name, result)
            });
        }

        let mut report = PreloadReport::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((name, Ok(_))) => report.loaded.push(name),
                Ok((name, Err(e))) => {
                    warn!(agent = %name, error = %e, "Preload failed");
                    report.failed.push((name, e.to_string()));
                }
                Err(e) => warn!(error = %e, "Preload task failed"),
            }
        }

        report.loaded.sort();
        report.failed.sort();
        info!(
            loaded = report.loaded.len(),
            failed = report.failed.len(),
            "Preloaded agent records"
        );
        report
    }

    /// Preload the `top_n` most frequently accessed agents seen so far
    pub async fn warm_from_access_history(self: &Arc<Self>, top_n: usize) -> PreloadReport {
        let names: Vec<String> = {
            let counters = self.counters.lock().await;
            let mut ranked: Vec<(&String, &u64)> = counters.access_counts.iter().collect();
            ranked.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
            ranked
                .into_iter()
                .take(top_n)
                .map(|(name, _)| name.clone())
                .collect()
        };

        if names.is_empty() {
            debug!("No access history to warm from");
            return PreloadReport::default();
        }
        self.preload(&names).await
    }

    /// Lazily hydrate the agents whose index entry matches `predicate`
    pub async fn for_each_agent<F>(&self, predicate: F) -> SDKResult<AgentCursor<'_>>
    where
        F: Fn(&KnowledgeIndexEntry) -> bool,
    {
        let index = self.load_index().await?;
        let names = index
            .entries()
            .filter(|e| predicate(e))
            .map(|e| e.name.clone())
            .collect();
        Ok(AgentCursor {
            cache: self,
            names,
            position: 0,
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Telemetry
    // ─────────────────────────────────────────────────────────────────────────

    pub async fn stats(&self) -> CacheStats {
        let (size, capacity) = {
            let lru = self.lru.lock().await;
            (lru.len(), lru.capacity())
        };
        let counters = self.counters.lock().await;

        let lookups = counters.hits + counters.misses;
        let ratio = |n: u64, d: u64| if d == 0 { 0.0 } else { n as f64 / d as f64 };

        CacheStats {
            size,
            capacity,
            hits: counters.hits,
            misses: counters.misses,
            evictions: counters.evictions,
            loads: counters.loads,
            hit_rate: ratio(counters.hits, lookups),
            utilization: size as f64 / capacity as f64,
            eviction_rate: ratio(counters.evictions, lookups),
            avg_load_ms: if counters.loads == 0 {
                0.0
            } else {
                counters.load_time.as_secs_f64() * 1000.0 / counters.loads as f64
            },
        }
    }

    /// Derive a health status from hit rate, utilization and load latency
    pub async fn health(&self) -> CacheHealth {
        let stats = self.stats().await;
        let mut status = HealthStatus::Healthy;
        let mut issues = Vec::new();
        let mut recommendations = Vec::new();
        let lookups = stats.hits + stats.misses;

        if lookups > 0 && stats.hit_rate < self.config.hit_rate_warning {
            status = status.max(HealthStatus::Warning);
            issues.push(format!("Low hit rate: {:.1}%", stats.hit_rate * 100.0));
            recommendations.push("Preload frequently used agents or warm from access history".into());
        }

        if lookups > 0
            && stats.utilization > self.config.utilization_critical
            && stats.eviction_rate > self.config.eviction_rate_critical
        {
            status = status.max(HealthStatus::Critical);
            issues.push(format!(
                "Cache {:.0}% full with {:.0}% of lookups evicting",
                stats.utilization * 100.0,
                stats.eviction_rate * 100.0
            ));
            recommendations.push("Increase knowledge.cache_capacity".into());
        }

        if stats.loads > 0 && stats.avg_load_ms > self.config.slow_load_ms {
            status = status.max(HealthStatus::Warning);
            issues.push(format!("Slow record loads: {:.1}ms average", stats.avg_load_ms));
            recommendations.push("Keep agent records small or move the knowledge directory to faster storage".into());
        }

        CacheHealth {
            status,
            issues,
            recommendations,
            stats,
        }
    }

    /// Lifecycle state of one agent key
    pub async fn entry_state(&self, name: &str) -> EntryState {
        self.lru.lock().await.state(name)
    }

    /// Agent names currently cached, least recently used first
    pub async fn cached_names(&self) -> Vec<String> {
        self.lru.lock().await.keys_by_recency()
    }

    /// Drop cached records, the index snapshot and any negative cache entry.
    ///
    /// Statistics and access history survive.
    pub async fn clear_cache(&self) {
        self.lru.lock().await.clear();
        *self.index.write().await = None;
        *self.negative.lock().await = None;
        info!("Knowledge cache cleared");
    }

    /// Clear everything, including statistics and access history
    pub async fn reset(&self) {
        self.lru.lock().await.reset();
        *self.index.write().await = None;
        *self.negative.lock().await = None;
        *self.counters.lock().await = Counters::default();
    }
}

/// Finite, restartable sequence of agent records, hydrated on demand
pub struct AgentCursor<'a> {
    cache: &'a KnowledgeCache,
    names: Vec<String>,
    position: usize,
}

impl AgentCursor<'_> {
    /// Hydrate the next agent, None when exhausted
    pub async fn next_agent(&mut self) -> Option<SDKResult<Arc<AgentRecord>>> {
        let name = self.names.get(self.position)?.clone();
        self.position += 1;
        Some(self.cache.get(&name).await)
    }

    /// Restart from the first agent
    pub fn rewind(&mut self) {
        self.position = 0;
    }

    /// Names this cursor walks, in order
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
