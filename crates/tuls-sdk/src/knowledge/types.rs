//! Knowledge Base Types

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::DomainKind;

/// One agent in the knowledge index manifest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeIndexEntry {
    /// Unique agent name
    pub name: String,
    /// Record location, relative to the knowledge directory
    pub record_path: String,
    #[serde(default)]
    pub capabilities: Vec<String>,
    #[serde(default)]
    pub triggers: Vec<String>,
    #[serde(default)]
    pub size_bytes: u64,
}

impl KnowledgeIndexEntry {
    pub fn has_capability(&self, tag: &str) -> bool {
        self.capabilities.iter().any(|c| c.eq_ignore_ascii_case(tag))
    }

    pub fn has_trigger(&self, tag: &str) -> bool {
        self.triggers.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }
}

/// On-disk manifest produced by the knowledge build step
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub agents: Vec<KnowledgeIndexEntry>,
}

/// Immutable in-memory snapshot of the manifest.
///
/// Keys are kept sorted so substring resolution is deterministic.
#[derive(Debug, Clone, Default)]
pub struct KnowledgeIndex {
    entries: BTreeMap<String, KnowledgeIndexEntry>,
}

impl KnowledgeIndex {
    /// Build from a manifest. Later duplicates of a name replace earlier ones.
    pub fn from_manifest(manifest: Manifest) -> Self {
        let entries = manifest
            .agents
            .into_iter()
            .map(|entry| (entry.name.clone(), entry))
            .collect();
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Agent names, sorted
    pub fn list_names(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn find_by_capability(&self, tag: &str) -> Vec<String> {
        self.entries
            .values()
            .filter(|e| e.has_capability(tag))
            .map(|e| e.name.clone())
            .collect()
    }

    pub fn find_by_trigger(&self, tag: &str) -> Vec<String> {
        self.entries
            .values()
            .filter(|e| e.has_trigger(tag))
            .map(|e| e.name.clone())
            .collect()
    }

    /// Exact lookup by name
    pub fn get(&self, name: &str) -> Option<&KnowledgeIndexEntry> {
        self.entries.get(name)
    }

    /// Resolve a requested name: case-insensitive exact match first, then
    /// the first key (in sorted order) containing the request.
    pub fn resolve(&self, requested: &str) -> Option<&KnowledgeIndexEntry> {
        let needle = requested.trim().to_lowercase();
        if needle.is_empty() {
            return None;
        }

        self.entries
            .values()
            .find(|e| e.name.to_lowercase() == needle)
            .or_else(|| {
                self.entries
                    .values()
                    .find(|e| e.name.to_lowercase().contains(&needle))
            })
    }

    /// Entries in key order
    pub fn entries(&self) -> impl Iterator<Item = &KnowledgeIndexEntry> {
        self.entries.values()
    }
}

/// A hydrated agent profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentRecord {
    pub name: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub capabilities: Vec<String>,
    #[serde(default)]
    pub triggers: Vec<String>,
    #[serde(default)]
    pub system_prompt: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Resolved once at hydrate time
    #[serde(skip)]
    pub domain: DomainKind,
}

impl AgentRecord {
    /// Parse a record and resolve its domain
    pub fn parse(json: &str) -> serde_json::Result<Self> {
        let mut record: AgentRecord = serde_json::from_str(json)?;
        record.domain = DomainKind::for_agent(&record.name, &record.capabilities);
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, capabilities: &[&str], triggers: &[&str]) -> KnowledgeIndexEntry {
        KnowledgeIndexEntry {
            name: name.into(),
            record_path: format!("agents/{}.json", name),
            capabilities: capabilities.iter().map(|s| s.to_string()).collect(),
            triggers: triggers.iter().map(|s| s.to_string()).collect(),
            size_bytes: 0,
        }
    }

    fn index() -> KnowledgeIndex {
        KnowledgeIndex::from_manifest(Manifest {
            agents: vec![
                entry("research-agent", &["research"], &["investigate"]),
                entry("orchestrator", &["routing"], &[]),
                entry("coding-agent", &["coding"], &["Rust", "bug"]),
            ],
        })
    }

    #[test]
    fn test_names_are_sorted() {
        assert_eq!(
            index().list_names(),
            vec!["coding-agent", "orchestrator", "research-agent"]
        );
    }

    #[test]
    fn test_find_by_tags_is_case_insensitive() {
        let index = index();
        assert_eq!(index.find_by_capability("CODING"), vec!["coding-agent"]);
        assert_eq!(index.find_by_trigger("rust"), vec!["coding-agent"]);
        assert!(index.find_by_trigger("nothing").is_empty());
    }

    #[test]
    fn test_resolve_exact_then_substring() {
        let index = index();
        assert_eq!(index.resolve("Orchestrator").unwrap().name, "orchestrator");
        assert_eq!(index.resolve("coding").unwrap().name, "coding-agent");
        // Ambiguous fragments resolve to the first sorted key
        assert_eq!(index.resolve("agent").unwrap().name, "coding-agent");
        assert!(index.resolve("NonExistentAgent12345").is_none());
        assert!(index.resolve("  ").is_none());
    }

    #[test]
    fn test_manifest_uses_camel_case() {
        let manifest: Manifest = serde_json::from_str(
            r#"{"agents":[{"name":"a","recordPath":"agents/a.json","sizeBytes":12}]}"#,
        )
        .unwrap();
        assert_eq!(manifest.agents[0].record_path, "agents/a.json");
        assert_eq!(manifest.agents[0].size_bytes, 12);
        assert!(manifest.agents[0].capabilities.is_empty());
    }

    #[test]
    fn test_record_domain_resolved_on_parse() {
        let record = AgentRecord::parse(
            r#"{"name":"analytics-agent","capabilities":["analysis"],"systemPrompt":"You analyze."}"#,
        )
        .unwrap();
        assert_eq!(record.domain, DomainKind::Analysis);
        assert_eq!(record.system_prompt, "You analyze.");
    }
}
