//! Delegation Engine
//!
//! Routes a classified message to an agent, runs that agent's domain
//! executor and follows at most two handoffs.
//!
//! Routing order:
//! 1. historical agents from memory, matched by domain
//! 2. the top classified domain, matched against capabilities then agent names
//! 3. agent trigger keywords
//! 4. the default agent ("orchestrator"), else the first agent in the index

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::executors::ExecutorRegistry;
use super::types::{
    AgentHandoff, DelegationOutcome, ExecutionContext, HandoffSuggestion, ResultStatus,
    SubAgentResult,
};
use crate::config::{DelegationConfig, MAX_HANDOFFS};
use crate::domain::DomainKind;
use crate::intent::IntentAnalysis;
use crate::knowledge::{AgentRecord, KnowledgeCache, KnowledgeIndex, KnowledgeIndexEntry};
use crate::{SDKError, SDKResult};

/// Routes messages to agents and runs the bounded handoff loop
pub struct DelegationEngine {
    registry: ExecutorRegistry,
    config: DelegationConfig,
}

impl Default for DelegationEngine {
    fn default() -> Self {
        Self::new(DelegationConfig::default())
    }
}

impl DelegationEngine {
    pub fn new(config: DelegationConfig) -> Self {
        Self {
            registry: ExecutorRegistry::with_defaults(),
            config,
        }
    }

    /// Replace the executor registry
    pub fn with_registry(mut self, registry: ExecutorRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Effective handoff limit, never above two
    pub fn max_handoffs(&self) -> usize {
        self.config.max_handoffs.min(MAX_HANDOFFS)
    }

    /// Pick and hydrate the agent for `intent`
    pub async fn route(&self, intent: &IntentAnalysis, cache: &KnowledgeCache) -> SDKResult<Arc<AgentRecord>> {
        let index = cache.load_index().await?;
        let name = self.route_name(intent, &index).ok_or_else(|| {
            SDKError::agent_not_found(self.config.default_agent.clone(), index.list_names())
        })?;
        cache.get(&name).await
    }

    fn route_name(&self, intent: &IntentAnalysis, index: &KnowledgeIndex) -> Option<String> {
        for historical in intent.historical_agents() {
            let domain = DomainKind::for_agent::<&str>(historical, &[]);
            let entry = match domain {
                DomainKind::General => index.resolve(historical),
                domain => find_for_domain(index, domain),
            };
            if let Some(entry) = entry {
                debug!(agent = %entry.name, historical = %historical, "Routed by history");
                return Some(entry.name.clone());
            }
        }

        if let Some(domain) = intent.top_domain() {
            if let Some(entry) = find_for_domain(index, domain) {
                debug!(agent = %entry.name, domain = %domain, "Routed by domain");
                return Some(entry.name.clone());
            }
        }

        for keyword in &intent.keywords {
            if let Some(name) = index.find_by_trigger(keyword).into_iter().next() {
                debug!(agent = %name, trigger = %keyword, "Routed by trigger");
                return Some(name);
            }
        }

        let default = &self.config.default_agent;
        index
            .entries()
            .find(|e| e.name.eq_ignore_ascii_case(default))
            .or_else(|| index.entries().next())
            .map(|e| {
                debug!(agent = %e.name, "Routed to default agent");
                e.name.clone()
            })
    }

    /// Run the executor for `agent`'s domain
    pub fn execute(&self, agent: &AgentRecord, message: &str, context: &ExecutionContext) -> SubAgentResult {
        let executor = self.registry.executor_for(agent.domain);
        let result = executor.execute(agent, message, context);
        debug!(
            agent = %agent.name,
            domain = %executor.domain(),
            hop = context.hop,
            handoff = ?result.suggested_handoff.as_ref().map(|s| &s.target_agent),
            "Executed agent step"
        );
        result
    }

    /// Route `message`, execute it and follow suggested handoffs.
    ///
    /// Handoff failures end the chain with a `handoff-failed` result rather
    /// than an error. When the knowledge base is missing or empty, a built-in
    /// general agent answers instead.
    pub async fn process(
        &self,
        message: &str,
        intent: IntentAnalysis,
        cache: &KnowledgeCache,
        namespace: Option<String>,
    ) -> SDKResult<DelegationOutcome> {
        let (initial, used_fallback_agent) = match self.route(&intent, cache).await {
            Ok(agent) => (agent, false),
            Err(e) if e.is_knowledge_source_missing() || e.is_agent_not_found() => {
                warn!(error = %e, "Knowledge base unavailable, using built-in agent");
                (Arc::new(self.fallback_agent()), true)
            }
            Err(e) => return Err(e),
        };

        info!(
            agent = %initial.name,
            confidence = intent.confidence,
            domains = ?intent.domains,
            "Delegating request"
        );

        let context = ExecutionContext::new(namespace.clone());
        let mut result = self.execute(&initial, message, &context);
        let mut chain = vec![result.clone()];
        let mut handoffs: Vec<AgentHandoff> = Vec::new();
        let limit = self.max_handoffs();

        while handoffs.len() < limit {
            let Some(suggestion) = result.suggested_handoff.clone() else {
                break;
            };

            // Recorded before resolution so a failed attempt still counts
            handoffs.push(AgentHandoff::new(&result, &suggestion, message));
            let hop = handoffs.len();

            let target = match self.resolve_handoff(&suggestion, cache).await {
                Ok(target) => target,
                Err(e) => {
                    let known = match &e {
                        SDKError::AgentNotFound { known, .. } => known.clone(),
                        _ => cache.list_names().await.unwrap_or_default(),
                    };
                    warn!(
                        from = %result.agent,
                        target = %suggestion.target_agent,
                        error = %e,
                        "Handoff target unresolved"
                    );
                    result = SubAgentResult::handoff_failed(
                        &result.agent,
                        &suggestion.target_agent,
                        &known,
                        &e.to_string(),
                    );
                    chain.push(result.clone());
                    break;
                }
            };

            let handoff = &mut handoffs[hop - 1];
            handoff.resolved_agent = Some(target.name.clone());
            info!(
                from = %handoff.source_agent,
                to = %target.name,
                priority = handoff.priority,
                hop,
                "Handing off"
            );

            let context = ExecutionContext::from_handoff(handoff, namespace.clone(), hop);
            result = self.execute(&target, message, &context);
            chain.push(result.clone());
        }

        let handoff_limit_reached =
            result.status == ResultStatus::Completed && result.suggested_handoff.is_some();
        if handoff_limit_reached {
            debug!(limit, "Handoff limit reached, ignoring further suggestion");
        }

        Ok(DelegationOutcome {
            intent,
            initial_agent: initial.name.clone(),
            result,
            handoffs,
            chain,
            handoff_limit_reached,
            used_fallback_agent,
        })
    }

    /// Hydrate the agent a suggestion points at. Domain suggestions go
    /// through the same capability-first lookup as initial routing. The
    /// bare name hint is the last resort.
    async fn resolve_handoff(
        &self,
        suggestion: &HandoffSuggestion,
        cache: &KnowledgeCache,
    ) -> SDKResult<Arc<AgentRecord>> {
        if let Some(domain) = suggestion.target_domain {
            if let Ok(index) = cache.load_index().await {
                if let Some(entry) = find_for_domain(&index, domain) {
                    return cache.get(&entry.name).await;
                }
            }
        }
        cache.get(&suggestion.target_agent).await
    }

    fn fallback_agent(&self) -> AgentRecord {
        AgentRecord {
            name: self.config.default_agent.clone(),
            id: None,
            capabilities: Vec::new(),
            triggers: Vec::new(),
            system_prompt: String::new(),
            description: Some("Built-in agent (knowledge base unavailable)".into()),
            domain: DomainKind::General,
        }
    }
}

/// First agent declaring the domain as a capability, else the first whose
/// name carries the domain hint
fn find_for_domain(index: &KnowledgeIndex, domain: DomainKind) -> Option<&KnowledgeIndexEntry> {
    let hint = domain.agent_hint();
    index
        .entries()
        .find(|e| e.has_capability(domain.as_str()))
        .or_else(|| index.entries().find(|e| e.name.to_lowercase().contains(hint)))
}
