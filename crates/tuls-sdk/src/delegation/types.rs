//! Delegation Types

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::domain::DomainKind;
use crate::intent::IntentAnalysis;

/// Handoff context key: the part of the request still to be done
pub const REMAINING_TASK: &str = "remaining_task";
/// Handoff context key: the step the target should handle first
pub const NEXT_STEP: &str = "next_step";
/// Handoff context key: agent that requested the handoff
pub const FROM_AGENT: &str = "from_agent";
/// Handoff context key: domain of the requesting agent
pub const FROM_DOMAIN: &str = "from_domain";

/// A builder's request to pass the rest of the work to another agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandoffSuggestion {
    /// Agent name or name fragment, resolved against the knowledge cache
    pub target_agent: String,
    /// Domain of the next step. When set, agents declaring it as a
    /// capability are preferred over name matches.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_domain: Option<DomainKind>,
    pub reason: String,
    /// 1 (low) to 10 (high)
    pub priority: u8,
}

/// Outcome of one agent step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResultStatus {
    Completed,
    HandoffFailed,
}

/// Result produced by a domain executor
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubAgentResult {
    pub agent: String,
    pub domain: DomainKind,
    pub status: ResultStatus,
    pub response: String,
    pub reasoning: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_handoff: Option<HandoffSuggestion>,
    #[serde(default)]
    pub handoff_context: HashMap<String, Value>,
}

impl SubAgentResult {
    /// Terminal result for a handoff whose target could not be resolved
    pub fn handoff_failed(source_agent: &str, requested: &str, known: &[String], cause: &str) -> Self {
        Self {
            agent: source_agent.to_string(),
            domain: DomainKind::General,
            status: ResultStatus::HandoffFailed,
            response: format!(
                "Could not hand off to \"{}\". Known agents: {}.",
                requested,
                if known.is_empty() {
                    "none".to_string()
                } else {
                    known.join(", ")
                }
            ),
            reasoning: format!("Handoff target unresolved: {}", cause),
            suggested_handoff: None,
            handoff_context: HashMap::new(),
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == ResultStatus::Completed
    }
}

/// One recorded delegation between agents
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentHandoff {
    pub id: Uuid,
    pub source_agent: String,
    /// Target as requested by the source agent
    pub target_agent: String,
    /// Agent the target resolved to, None when resolution failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_agent: Option<String>,
    pub context: HashMap<String, Value>,
    pub original_message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partial_result: Option<String>,
    pub reason: String,
    pub priority: u8,
    pub timestamp: DateTime<Utc>,
}

impl AgentHandoff {
    /// Record a handoff suggested by `from`
    pub fn new(from: &SubAgentResult, suggestion: &HandoffSuggestion, original_message: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            source_agent: from.agent.clone(),
            target_agent: suggestion.target_agent.clone(),
            resolved_agent: None,
            context: from.handoff_context.clone(),
            original_message: original_message.to_string(),
            partial_result: Some(from.response.clone()),
            reason: suggestion.reason.clone(),
            priority: suggestion.priority.clamp(1, 10),
            timestamp: Utc::now(),
        }
    }
}

/// Input carried into one executor call
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    pub namespace: Option<String>,
    /// Handoff context from the previous step
    pub carried: HashMap<String, Value>,
    /// Agent that handed off to this one
    pub previous_agent: Option<String>,
    /// Response produced so far
    pub partial_result: Option<String>,
    /// Handoffs already taken in this request
    pub hop: usize,
}

impl ExecutionContext {
    pub fn new(namespace: Option<String>) -> Self {
        Self {
            namespace,
            ..Default::default()
        }
    }

    /// Context for the target of `handoff`
    pub fn from_handoff(handoff: &AgentHandoff, namespace: Option<String>, hop: usize) -> Self {
        Self {
            namespace,
            carried: handoff.context.clone(),
            previous_agent: Some(handoff.source_agent.clone()),
            partial_result: handoff.partial_result.clone(),
            hop,
        }
    }

    /// String value carried under `key`
    pub fn carried_str(&self, key: &str) -> Option<&str> {
        self.carried.get(key).and_then(Value::as_str)
    }
}

/// Full result of processing one message
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelegationOutcome {
    pub intent: IntentAnalysis,
    pub initial_agent: String,
    /// Last step's result
    pub result: SubAgentResult,
    /// At most two entries
    pub handoffs: Vec<AgentHandoff>,
    /// Every step's result, in order
    pub chain: Vec<SubAgentResult>,
    /// The last step still asked for a handoff when the limit was hit
    pub handoff_limit_reached: bool,
    /// The knowledge base was unavailable and the built-in fallback agent answered
    pub used_fallback_agent: bool,
}

impl DelegationOutcome {
    /// Responses of every step, joined in order
    pub fn combined_response(&self) -> String {
        self.chain
            .iter()
            .map(|r| r.response.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn completed(agent: &str) -> SubAgentResult {
        let mut handoff_context = HashMap::new();
        handoff_context.insert(REMAINING_TASK.to_string(), Value::from("implement it"));
        SubAgentResult {
            agent: agent.into(),
            domain: DomainKind::Research,
            status: ResultStatus::Completed,
            response: "found three sources".into(),
            reasoning: String::new(),
            suggested_handoff: None,
            handoff_context,
        }
    }

    #[test]
    fn test_handoff_preserves_context_and_partial_result() {
        let from = completed("research-agent");
        let suggestion = HandoffSuggestion {
            target_agent: "coding".into(),
            target_domain: Some(DomainKind::Coding),
            reason: "next step is coding".into(),
            priority: 42,
        };

        let handoff = AgentHandoff::new(&from, &suggestion, "research then implement it");
        assert_eq!(handoff.source_agent, "research-agent");
        assert_eq!(handoff.priority, 10);
        assert_eq!(handoff.partial_result.as_deref(), Some("found three sources"));

        let context = ExecutionContext::from_handoff(&handoff, Some("main".into()), 1);
        assert_eq!(context.carried_str(REMAINING_TASK), Some("implement it"));
        assert_eq!(context.previous_agent.as_deref(), Some("research-agent"));
        assert_eq!(context.hop, 1);
    }

    #[test]
    fn test_handoff_failed_names_known_agents() {
        let result = SubAgentResult::handoff_failed(
            "research-agent",
            "coding",
            &["orchestrator".into(), "research-agent".into()],
            "agent not found",
        );
        assert_eq!(result.status, ResultStatus::HandoffFailed);
        assert!(result.response.contains("\"coding\""));
        assert!(result.response.contains("orchestrator, research-agent"));
    }

    #[test]
    fn test_status_serializes_kebab_case() {
        assert_eq!(
            serde_json::to_string(&ResultStatus::HandoffFailed).unwrap(),
            "\"handoff-failed\""
        );
    }
}
