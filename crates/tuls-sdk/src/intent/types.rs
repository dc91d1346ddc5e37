//! Intent Types

use serde::{Deserialize, Serialize};

use crate::domain::DomainKind;

/// Classification of one user message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentAnalysis {
    /// Top domain name, or "general"
    pub primary_intent: String,
    /// Tokens longer than three characters
    pub keywords: Vec<String>,
    /// Detected domains, in table order
    pub domains: Vec<DomainKind>,
    /// Confidence in [0, 0.9]
    pub confidence: f64,
    /// Agent names seen in similar historical requests
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub historical_agents: Option<Vec<String>>,
}

impl IntentAnalysis {
    pub fn top_domain(&self) -> Option<DomainKind> {
        self.domains.first().copied()
    }

    pub fn historical_agents(&self) -> &[String] {
        self.historical_agents.as_deref().unwrap_or_default()
    }
}

/// Optional scope for the historical lookup
#[derive(Debug, Clone, Default)]
pub struct IntentContext {
    pub namespace: Option<String>,
    pub session_key: Option<String>,
}

impl IntentContext {
    pub fn in_namespace(namespace: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            session_key: None,
        }
    }
}
