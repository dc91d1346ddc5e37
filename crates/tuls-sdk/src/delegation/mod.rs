//! Delegation
//!
//! Routes a classified message to a specialist agent and follows the
//! agent's suggested handoffs, at most two per request. Each agent's
//! domain picks the [`DomainExecutor`] that builds its response.

mod engine;
mod executors;
mod types;

pub use engine::DelegationEngine;
pub use executors::{
    AnalysisExecutor, CodingExecutor, DomainExecutor, ExecutorRegistry, GeneralExecutor,
    KnowledgeExecutor, MemoryExecutor, PlanningExecutor, ResearchExecutor,
};
pub use types::{
    AgentHandoff, DelegationOutcome, ExecutionContext, HandoffSuggestion, ResultStatus,
    SubAgentResult, FROM_AGENT, FROM_DOMAIN, NEXT_STEP, REMAINING_TASK,
};
