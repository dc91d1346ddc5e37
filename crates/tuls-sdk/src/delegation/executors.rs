//! Domain Executors
//!
//! One response builder per [`DomainKind`]. An agent's domain is resolved
//! once when its record is hydrated, so dispatch is a table lookup.
//!
//! A builder suggests a handoff only when the task in front of it contains
//! a sequential step ("... then implement X") belonging to another domain.

use std::collections::HashMap;

use serde_json::Value;

use super::types::{
    ExecutionContext, HandoffSuggestion, ResultStatus, SubAgentResult, FROM_AGENT, FROM_DOMAIN,
    NEXT_STEP, REMAINING_TASK,
};
use crate::domain::DomainKind;
use crate::knowledge::AgentRecord;
use crate::utils::{extract_keywords, split_steps, tokenize};

/// Builds a response for one domain
pub trait DomainExecutor: Send + Sync {
    fn domain(&self) -> DomainKind;

    fn execute(&self, agent: &AgentRecord, message: &str, context: &ExecutionContext) -> SubAgentResult;
}

/// What an executor is working on in this step
pub(crate) struct Task {
    /// Text of this agent's own step
    pub step: String,
    /// Key terms of this step
    pub terms: Vec<String>,
    /// First step belonging to another domain
    pub handoff: Option<(HandoffSuggestion, HashMap<String, Value>)>,
}

impl Task {
    /// Split the task in front of `agent` into its own step and the next
    /// step that belongs elsewhere.
    pub fn plan(own: DomainKind, agent: &AgentRecord, message: &str, context: &ExecutionContext) -> Self {
        let focus = context.carried_str(REMAINING_TASK).unwrap_or(message);
        let (leading, follow_ups) = split_steps(focus);

        let mut parts = vec![leading];
        let mut handoff = None;
        for follow_up in follow_ups {
            if follow_up.domain == own || follow_up.domain == DomainKind::General {
                parts.push(follow_up.clause);
                continue;
            }

            let suggestion = HandoffSuggestion {
                target_agent: follow_up.domain.agent_hint().to_string(),
                target_domain: Some(follow_up.domain),
                reason: format!(
                    "Step \"{}\" is {} work",
                    follow_up.clause,
                    follow_up.domain
                ),
                priority: follow_up.domain.handoff_priority(),
            };
            let mut carried = HashMap::new();
            carried.insert(REMAINING_TASK.to_string(), Value::from(follow_up.remainder));
            carried.insert(NEXT_STEP.to_string(), Value::from(follow_up.clause));
            carried.insert(FROM_AGENT.to_string(), Value::from(agent.name.clone()));
            carried.insert(FROM_DOMAIN.to_string(), Value::from(own.as_str()));
            handoff = Some((suggestion, carried));
            break;
        }

        let step = parts
            .into_iter()
            .filter(|p| !p.is_empty())
            .collect::<Vec<_>>()
            .join(", then ");
        let terms = extract_keywords(&tokenize(&step));
        Self {
            step,
            terms,
            handoff,
        }
    }

    fn terms_or(&self, fallback: &str) -> String {
        if self.terms.is_empty() {
            fallback.to_string()
        } else {
            self.terms.join(", ")
        }
    }
}

fn finish(
    domain: DomainKind,
    agent: &AgentRecord,
    context: &ExecutionContext,
    task: Task,
    response: String,
    approach: &str,
) -> SubAgentResult {
    let mut reasoning = format!("{} handled by {} ({})", domain, agent.name, approach);
    if let Some(previous) = &context.previous_agent {
        reasoning.push_str(&format!("; continues from {}", previous));
    }
    if let Some(namespace) = &context.namespace {
        reasoning.push_str(&format!("; memory namespace {}", namespace));
    }

    let (suggested_handoff, handoff_context) = match task.handoff {
        Some((suggestion, carried)) => {
            reasoning.push_str(&format!("; handing off: {}", suggestion.reason));
            (Some(suggestion), carried)
        }
        None => (None, HashMap::new()),
    };

    let response = match (&context.previous_agent, &context.partial_result) {
        (Some(previous), Some(partial)) => format!(
            "Building on {}'s work. {} Prior result: {}",
            previous,
            response,
            excerpt(partial, EXCERPT_CHARS)
        ),
        (Some(previous), None) => format!("Building on {}'s work. {}", previous, response),
        _ => response,
    };

    SubAgentResult {
        agent: agent.name.clone(),
        domain,
        status: ResultStatus::Completed,
        response,
        reasoning,
        suggested_handoff,
        handoff_context,
    }
}

/// Longest prior-result excerpt quoted in a follow-up response
const EXCERPT_CHARS: usize = 80;

fn excerpt(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => format!("{}...", text[..end].trim_end()),
        None => text.to_string(),
    }
}

macro_rules! executor {
    ($name:ident, $domain:expr, |$agent:ident, $task:ident| $body:expr, $approach:expr) => {
        #[derive(Debug, Default, Clone, Copy)]
        pub struct $name;

        impl DomainExecutor for $name {
            fn domain(&self) -> DomainKind {
                $domain
            }

            fn execute(&self, agent: &AgentRecord, message: &str, context: &ExecutionContext) -> SubAgentResult {
                let task = Task::plan($domain, agent, message, context);
                let response = {
                    let $agent = agent;
                    let $task = &task;
                    $body
                };
                finish($domain, agent, context, task, response, $approach)
            }
        }
    };
}

executor!(
    ResearchExecutor,
    DomainKind::Research,
    |agent, task| format!(
        "[{}] Research brief: {}. Key terms: {}. Survey primary sources, compare findings and summarize the trade-offs.",
        agent.name,
        task.step,
        task.terms_or("the request")
    ),
    "source survey"
);

executor!(
    CodingExecutor,
    DomainKind::Coding,
    |agent, task| format!(
        "[{}] Implementation plan: {}. 1) Define the interface for {}. 2) Implement it in small steps. 3) Add tests for the edge cases.",
        agent.name,
        task.step,
        task.terms_or("the change")
    ),
    "implementation plan"
);

executor!(
    KnowledgeExecutor,
    DomainKind::KnowledgeBase,
    |agent, task| format!(
        "[{}] Knowledge lookup: {}. Capabilities on record: {}.",
        agent.name,
        task.step,
        if agent.capabilities.is_empty() {
            "none".to_string()
        } else {
            agent.capabilities.join(", ")
        }
    ),
    "capability lookup"
);

executor!(
    MemoryExecutor,
    DomainKind::Memory,
    |agent, task| format!(
        "[{}] Memory recall: {}. Searching history for: {}.",
        agent.name,
        task.step,
        task.terms_or("recent conversations")
    ),
    "history recall"
);

executor!(
    PlanningExecutor,
    DomainKind::Planning,
    |agent, task| {
        let milestones = task
            .terms
            .iter()
            .enumerate()
            .map(|(i, t)| format!("{}) {}", i + 1, t))
            .collect::<Vec<_>>()
            .join(" ");
        format!(
            "[{}] Plan: {}. Milestones: {}.",
            agent.name,
            task.step,
            if milestones.is_empty() { "to be defined".to_string() } else { milestones }
        )
    },
    "milestone plan"
);

executor!(
    AnalysisExecutor,
    DomainKind::Analysis,
    |agent, task| format!(
        "[{}] Analysis: {}. Dimensions to evaluate: {}.",
        agent.name,
        task.step,
        task.terms_or("scope, cost, risk")
    ),
    "structured evaluation"
);

executor!(
    GeneralExecutor,
    DomainKind::General,
    |agent, task| match agent.description.as_deref() {
        Some(description) => format!("[{}] {}: {}.", agent.name, description, task.step),
        None => format!("[{}] Handling request: {}.", agent.name, task.step),
    },
    "general handling"
);

/// Maps each domain to its executor
pub struct ExecutorRegistry {
    executors: HashMap<DomainKind, Box<dyn DomainExecutor>>,
    fallback: GeneralExecutor,
}

impl Default for ExecutorRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl ExecutorRegistry {
    /// Registry holding only the general fallback
    pub fn new() -> Self {
        Self {
            executors: HashMap::new(),
            fallback: GeneralExecutor,
        }
    }

    /// Registry with a builder for every domain
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(ResearchExecutor));
        registry.register(Box::new(CodingExecutor));
        registry.register(Box::new(KnowledgeExecutor));
        registry.register(Box::new(MemoryExecutor));
        registry.register(Box::new(PlanningExecutor));
        registry.register(Box::new(AnalysisExecutor));
        registry.register(Box::new(GeneralExecutor));
        registry
    }

    /// Register or replace the executor for its domain
    pub fn register(&mut self, executor: Box<dyn DomainExecutor>) {
        self.executors.insert(executor.domain(), executor);
    }

    /// Executor for `domain`, falling back to the general one
    pub fn executor_for(&self, domain: DomainKind) -> &dyn DomainExecutor {
        self.executors
            .get(&domain)
            .map(|e| e.as_ref())
            .unwrap_or(&self.fallback)
    }

    pub fn len(&self) -> usize {
        self.executors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.executors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agent(name: &str, capabilities: &[&str]) -> AgentRecord {
        let capabilities: Vec<String> = capabilities.iter().map(|c| c.to_string()).collect();
        AgentRecord {
            name: name.into(),
            id: None,
            domain: DomainKind::for_agent(name, &capabilities),
            capabilities,
            triggers: vec![],
            system_prompt: String::new(),
            description: None,
        }
    }

    #[test]
    fn test_research_suggests_coding_handoff() {
        let research = agent("research-agent", &["research"]);
        let result = ResearchExecutor.execute(
            &research,
            "research GraphQL then implement a sample API",
            &ExecutionContext::default(),
        );

        assert_eq!(result.domain, DomainKind::Research);
        assert!(result.response.contains("research graphql"));
        let suggestion = result.suggested_handoff.unwrap();
        assert_eq!(suggestion.target_agent, "coding");
        assert_eq!(suggestion.priority, DomainKind::Coding.handoff_priority());
        assert_eq!(
            result.handoff_context.get(REMAINING_TASK),
            Some(&Value::from("implement a sample api"))
        );
        assert_eq!(
            result.handoff_context.get(FROM_AGENT),
            Some(&Value::from("research-agent"))
        );
    }

    #[test]
    fn test_no_handoff_without_sequential_pattern() {
        let coding = agent("coding-agent", &["coding"]);
        let result = CodingExecutor.execute(
            &coding,
            "implement a parser and analysis tooling",
            &ExecutionContext::default(),
        );
        assert!(result.suggested_handoff.is_none());
        assert!(result.handoff_context.is_empty());
    }

    #[test]
    fn test_same_domain_steps_stay_local() {
        let research = agent("research-agent", &["research"]);
        let result = ResearchExecutor.execute(
            &research,
            "research caching then investigate eviction",
            &ExecutionContext::default(),
        );
        assert!(result.suggested_handoff.is_none());
        assert!(result.response.contains("investigate eviction"));
    }

    #[test]
    fn test_carried_remaining_task_is_the_focus() {
        let coding = agent("coding-agent", &["coding"]);
        let mut context = ExecutionContext::default();
        context
            .carried
            .insert(REMAINING_TASK.into(), Value::from("implement a sample api"));
        context.previous_agent = Some("research-agent".into());

        let result = CodingExecutor.execute(
            &coding,
            "research GraphQL then implement a sample API",
            &context,
        );

        assert!(result.suggested_handoff.is_none());
        assert!(result.response.starts_with("Building on research-agent's work."));
        assert!(result.response.contains("implement a sample api"));
        assert!(result.reasoning.contains("continues from research-agent"));
    }

    #[test]
    fn test_follow_up_quotes_prior_result_and_namespace() {
        let coding = agent("coding-agent", &["coding"]);
        let mut context = ExecutionContext::new(Some("team-a".into()));
        context.previous_agent = Some("research-agent".into());
        context.partial_result = Some(format!("[research-agent] Research brief: {}", "x".repeat(200)));

        let result = CodingExecutor.execute(&coding, "implement the cache", &context);

        assert!(result.response.contains("Prior result: [research-agent] Research brief:"));
        assert!(result.response.ends_with("..."));
        assert!(result.reasoning.contains("memory namespace team-a"));
    }

    #[test]
    fn test_excerpt_respects_char_boundaries() {
        assert_eq!(excerpt("  short  ", 10), "short");
        assert_eq!(excerpt("héllo wörld", 5), "héllo...");
    }

    #[test]
    fn test_registry_dispatch_and_fallback() {
        let registry = ExecutorRegistry::with_defaults();
        assert_eq!(registry.len(), 7);
        for domain in DomainKind::CLASSIFIED {
            assert_eq!(registry.executor_for(domain).domain(), domain);
        }

        let empty = ExecutorRegistry::new();
        assert!(empty.is_empty());
        assert_eq!(empty.executor_for(DomainKind::Coding).domain(), DomainKind::General);
    }
}
