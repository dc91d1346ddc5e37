//! Intent Classifier
//!
//! Keyword classification with an optional boost from historical memory.
//!
//! ```text
//! base       = 0.3                    (no domain)
//!            = 0.4 + 0.2 * |domains|  (otherwise)
//! relevance  = min(0.2, 0.2 * avg score of similar history)
//! agreement  = 0.1 if a historical agent's domain was also detected
//! confidence = min(0.9, base + relevance + agreement)
//! ```

use std::sync::Arc;

use tracing::debug;
use tuls_core::SearchResult;

use super::types::{IntentAnalysis, IntentContext};
use crate::domain::DomainKind;
use crate::memory::{MemorySearch, SearchRequest};
use crate::utils::{extract_keywords, tokenize};

const BASE_CONFIDENCE: f64 = 0.3;
const DOMAIN_CONFIDENCE: f64 = 0.4;
const PER_DOMAIN: f64 = 0.2;
const MAX_RELEVANCE_BOOST: f64 = 0.2;
const AGREEMENT_BOOST: f64 = 0.1;
const MAX_CONFIDENCE: f64 = 0.9;

/// Default number of historical results consulted
pub const DEFAULT_HISTORY_LIMIT: usize = 5;

/// Classifies messages into domains
#[derive(Clone)]
pub struct IntentClassifier {
    memory: Option<Arc<dyn MemorySearch>>,
    history_limit: usize,
}

impl Default for IntentClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl IntentClassifier {
    /// Keyword-only classifier
    pub fn new() -> Self {
        Self {
            memory: None,
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }

    /// Consult historical memory for confidence boosts
    pub fn with_memory(mut self, memory: Arc<dyn MemorySearch>, history_limit: usize) -> Self {
        self.memory = Some(memory);
        self.history_limit = history_limit.max(1);
        self
    }

    /// Classify a message. Never fails: memory problems only skip the boost.
    pub async fn analyze(&self, message: &str, context: Option<&IntentContext>) -> IntentAnalysis {
        let tokens = tokenize(message);
        let keywords = extract_keywords(&tokens);
        let domains = DomainKind::classify(&tokens);

        let base = if domains.is_empty() {
            BASE_CONFIDENCE
        } else {
            DOMAIN_CONFIDENCE + PER_DOMAIN * domains.len() as f64
        };

        let mut boost = 0.0;
        let mut historical_agents = None;

        if let Some(history) = self.history(message, context).await {
            if !history.is_empty() {
                let avg = history.iter().map(|r| r.score).sum::<f64>() / history.len() as f64;
                boost += (MAX_RELEVANCE_BOOST * avg).clamp(0.0, MAX_RELEVANCE_BOOST);

                let agents = agent_mentions(&history);
                let agrees = agents
                    .iter()
                    .map(|name| DomainKind::for_agent::<&str>(name, &[]))
                    .any(|d| domains.contains(&d));
                if agrees {
                    boost += AGREEMENT_BOOST;
                }
                if !agents.is_empty() {
                    historical_agents = Some(agents);
                }
            }
        }

        let confidence = (base + boost).min(MAX_CONFIDENCE);
        let primary_intent = domains
            .first()
            .copied()
            .unwrap_or(DomainKind::General)
            .as_str()
            .to_string();

        debug!(
            primary_intent = %primary_intent,
            domains = ?domains,
            confidence,
            "Classified intent"
        );

        IntentAnalysis {
            primary_intent,
            keywords,
            domains,
            confidence,
            historical_agents,
        }
    }

    async fn history(&self, message: &str, context: Option<&IntentContext>) -> Option<Vec<SearchResult>> {
        let memory = self.memory.as_ref()?;
        let request = SearchRequest {
            namespace: context.and_then(|c| c.namespace.clone()),
            max_results: Some(self.history_limit),
            min_score: None,
            session_key: context.and_then(|c| c.session_key.clone()),
        };

        match memory.search(message, &request).await {
            Ok(results) => Some(results),
            Err(e) => {
                debug!(error = %e, "Memory lookup failed, classifying on keywords alone");
                None
            }
        }
    }
}

/// Agent names mentioned in historical snippets, first-seen order
fn agent_mentions(history: &[SearchResult]) -> Vec<String> {
    let mut agents: Vec<String> = Vec::new();
    for token in history.iter().flat_map(|r| tokenize(&r.snippet)) {
        let is_agent = token.ends_with("-agent") || token == "orchestrator";
        if is_agent && !agents.contains(&token) {
            agents.push(token);
        }
    }
    agents
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SDKResult;
    use async_trait::async_trait;
    use chrono::Utc;
    use tuls_core::MatchKind;

    struct FixedHistory(Vec<(f64, &'static str)>);

    #[async_trait]
    impl MemorySearch for FixedHistory {
        async fn search(&self, _text: &str, _request: &SearchRequest) -> SDKResult<Vec<SearchResult>> {
            Ok(self
                .0
                .iter()
                .enumerate()
                .map(|(i, (score, snippet))| SearchResult {
                    chunk_id: format!("c{}", i),
                    snippet: snippet.to_string(),
                    score: *score,
                    namespace: "main".into(),
                    source_file: "sessions/1.jsonl".into(),
                    created_at: Utc::now(),
                    match_kind: MatchKind::Keyword,
                })
                .collect())
        }
    }

    struct BrokenHistory;

    #[async_trait]
    impl MemorySearch for BrokenHistory {
        async fn search(&self, _text: &str, _request: &SearchRequest) -> SDKResult<Vec<SearchResult>> {
            Err(tuls_core::Error::StoreCorrupt("bad page".into()).into())
        }
    }

    #[tokio::test]
    async fn test_graphql_message_classifies_research_and_coding() {
        let intent = IntentClassifier::new()
            .analyze("research GraphQL then implement a sample API", None)
            .await;

        assert_eq!(intent.domains, vec![DomainKind::Research, DomainKind::Coding]);
        assert_eq!(intent.primary_intent, "research");
        assert!((intent.confidence - 0.8).abs() < 1e-9);
        assert!(intent.keywords.contains(&"graphql".to_string()));
        assert!(!intent.keywords.contains(&"api".to_string()));
        assert!(intent.historical_agents.is_none());
    }

    #[tokio::test]
    async fn test_no_domain_gets_base_confidence() {
        let intent = IntentClassifier::new().analyze("xyz abc qwerty", None).await;

        assert!(intent.domains.is_empty());
        assert_eq!(intent.primary_intent, "general");
        assert!(intent.confidence <= 0.4);
        assert!(intent.keywords.contains(&"qwerty".to_string()));
    }

    #[tokio::test]
    async fn test_words_sharing_a_keyword_prefix_stay_general() {
        let intent = IntentClassifier::new()
            .analyze("tell me about the planet mars and its codename", None)
            .await;

        assert!(intent.domains.is_empty());
        assert_eq!(intent.primary_intent, "general");
        assert!(intent.confidence <= 0.4);
    }

    #[tokio::test]
    async fn test_confidence_is_capped() {
        let intent = IntentClassifier::new()
            .analyze("research and implement a plan, then analyze it", None)
            .await;
        assert!(intent.domains.len() >= 3);
        assert!((intent.confidence - 0.9).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_history_boosts_confidence() {
        let history = FixedHistory(vec![
            (0.5, "User asked about caching; handled by research-agent"),
            (0.5, "Follow-up answered by research-agent and orchestrator"),
        ]);
        let classifier = IntentClassifier::new().with_memory(Arc::new(history), 5);

        let intent = classifier
            .analyze("research cache invalidation", Some(&IntentContext::in_namespace("main")))
            .await;

        // 0.6 base + 0.1 relevance + 0.1 agreement
        assert!((intent.confidence - 0.8).abs() < 1e-9);
        assert_eq!(
            intent.historical_agents,
            Some(vec!["research-agent".to_string(), "orchestrator".to_string()])
        );
    }

    #[tokio::test]
    async fn test_history_without_agreement() {
        let history = FixedHistory(vec![(1.0, "coding-agent fixed the build")]);
        let classifier = IntentClassifier::new().with_memory(Arc::new(history), 5);

        let intent = classifier.analyze("schedule the roadmap", None).await;

        // 0.6 base + 0.2 relevance, no agreement
        assert_eq!(intent.domains, vec![DomainKind::Planning]);
        assert!((intent.confidence - 0.8).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_memory_failure_skips_boost() {
        let classifier = IntentClassifier::new().with_memory(Arc::new(BrokenHistory), 5);
        let intent = classifier.analyze("debug the parser", None).await;

        assert_eq!(intent.domains, vec![DomainKind::Coding]);
        assert!((intent.confidence - 0.6).abs() < 1e-9);
        assert!(intent.historical_agents.is_none());
    }
}
