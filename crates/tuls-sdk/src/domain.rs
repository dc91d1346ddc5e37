//! Specialist domains.
//!
//! One table drives intent classification, agent routing and executor
//! dispatch, so the three never disagree about what a domain is.

use serde::{Deserialize, Serialize};

/// A specialist domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DomainKind {
    Research,
    Coding,
    KnowledgeBase,
    Memory,
    Planning,
    Analysis,
    /// Fallback for agents and messages with no specialist domain
    General,
}

impl Default for DomainKind {
    fn default() -> Self {
        Self::General
    }
}

impl DomainKind {
    /// Domains a message can be classified into, in reporting order
    pub const CLASSIFIED: [DomainKind; 6] = [
        Self::Research,
        Self::Coding,
        Self::KnowledgeBase,
        Self::Memory,
        Self::Planning,
        Self::Analysis,
    ];

    /// Convert to string
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Research => "research",
            Self::Coding => "coding",
            Self::KnowledgeBase => "knowledge-base",
            Self::Memory => "memory",
            Self::Planning => "planning",
            Self::Analysis => "analysis",
            Self::General => "general",
        }
    }

    /// Convert from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "research" => Some(Self::Research),
            "coding" | "code" => Some(Self::Coding),
            "knowledge-base" | "knowledge_base" | "knowledge" => Some(Self::KnowledgeBase),
            "memory" => Some(Self::Memory),
            "planning" | "plan" => Some(Self::Planning),
            "analysis" | "analytics" => Some(Self::Analysis),
            "general" => Some(Self::General),
            _ => None,
        }
    }

    /// Message keywords that signal this domain
    pub fn keywords(&self) -> &'static [&'static str] {
        match self {
            Self::Research => &[
                "research", "investigate", "search", "find", "explore", "study", "discover",
                "lookup", "sources", "survey",
            ],
            Self::Coding => &[
                "code", "coding", "implement", "build", "debug", "program", "function", "api",
                "refactor", "script", "compile", "bug", "deploy", "rust", "python",
                "typescript", "javascript",
            ],
            Self::KnowledgeBase => &[
                "knowledge", "agent", "documentation", "docs", "wiki", "reference",
                "capability", "capabilities",
            ],
            Self::Memory => &[
                "remember", "recall", "memory", "history", "previous", "earlier", "forget",
                "conversation",
            ],
            Self::Planning => &[
                "plan", "planning", "roadmap", "schedule", "milestone", "strategy", "organize",
                "prioritize", "steps", "timeline",
            ],
            Self::Analysis => &[
                "analyze", "analyse", "analysis", "evaluate", "assess", "metrics", "statistics",
                "trend", "insight", "compare", "review",
            ],
            Self::General => &[],
        }
    }

    /// Verbs that open a follow-up step in this domain ("... then implement")
    pub fn follow_up_verbs(&self) -> &'static [&'static str] {
        match self {
            Self::Research => &["research", "investigate", "explore", "find", "look"],
            Self::Coding => &[
                "implement", "build", "code", "write", "develop", "fix", "create", "deploy",
            ],
            Self::KnowledgeBase => &["document", "catalog"],
            Self::Memory => &["remember", "save", "store", "record"],
            Self::Planning => &["plan", "schedule", "organize", "prioritize"],
            Self::Analysis => &[
                "analyze", "analyse", "evaluate", "assess", "compare", "review", "summarize",
            ],
            Self::General => &[],
        }
    }

    /// Agent-name substring used when routing to this domain
    pub fn agent_hint(&self) -> &'static str {
        match self {
            Self::Research => "research",
            Self::Coding => "coding",
            Self::KnowledgeBase => "knowledge",
            Self::Memory => "memory",
            Self::Planning => "plan",
            Self::Analysis => "analy",
            Self::General => "orchestrator",
        }
    }

    /// Priority attached to handoffs into this domain (1-10)
    pub fn handoff_priority(&self) -> u8 {
        match self {
            Self::Coding => 7,
            Self::Analysis | Self::Planning => 6,
            Self::Research => 5,
            Self::Memory | Self::KnowledgeBase => 4,
            Self::General => 3,
        }
    }

    /// True when `token` is one of this domain's keywords.
    ///
    /// Plain inflections also match, so "implementing" counts for
    /// "implement" and "analyzing" for "analyze". Other words that merely
    /// start with a keyword do not.
    pub fn matches_token(&self, token: &str) -> bool {
        matches_word(self.keywords(), token)
    }

    /// Domain whose follow-up verbs include `token`
    pub fn for_follow_up_verb(token: &str) -> Option<Self> {
        Self::CLASSIFIED
            .into_iter()
            .find(|d| matches_word(d.follow_up_verbs(), token))
    }

    /// Classify tokens into domains, in `CLASSIFIED` order
    pub fn classify<S: AsRef<str>>(tokens: &[S]) -> Vec<Self> {
        Self::CLASSIFIED
            .into_iter()
            .filter(|d| tokens.iter().any(|t| d.matches_token(t.as_ref())))
            .collect()
    }

    /// Resolve an agent's domain from its declared capabilities, then its name.
    ///
    /// Computed once when a record is hydrated.
    pub fn for_agent<S: AsRef<str>>(name: &str, capabilities: &[S]) -> Self {
        if let Some(domain) = capabilities
            .iter()
            .find_map(|c| Self::from_str(c.as_ref()).filter(|d| *d != Self::General))
        {
            return domain;
        }

        let name = name.to_lowercase();
        Self::CLASSIFIED
            .into_iter()
            .find(|d| name.contains(d.agent_hint()))
            .unwrap_or(Self::General)
    }
}

impl std::fmt::Display for DomainKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

const SUFFIXES: [&str; 6] = ["s", "es", "ed", "er", "ers", "ing"];

fn matches_word(words: &[&str], token: &str) -> bool {
    words.iter().any(|w| token == *w || is_inflection(w, token))
}

fn is_inflection(word: &str, token: &str) -> bool {
    if word.len() < 3 {
        return false;
    }
    if let Some(rest) = token.strip_prefix(word) {
        return SUFFIXES.contains(&rest);
    }
    // analyze -> analyzing, analyzed
    match word.strip_suffix('e') {
        Some(stem) => token
            .strip_prefix(stem)
            .is_some_and(|rest| matches!(rest, "ing" | "ed" | "er" | "ers")),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_in_table_order() {
        let tokens = ["research", "graphql", "then", "implement", "a", "sample", "api"];
        assert_eq!(
            DomainKind::classify(&tokens),
            vec![DomainKind::Research, DomainKind::Coding]
        );
    }

    #[test]
    fn test_classify_nothing() {
        let tokens = ["xyz", "abc", "qwerty"];
        assert!(DomainKind::classify(&tokens).is_empty());
    }

    #[test]
    fn test_prefix_matching() {
        assert!(DomainKind::Coding.matches_token("implementing"));
        assert!(DomainKind::Planning.matches_token("plans"));
        // Short keywords only match exactly
        assert!(DomainKind::Coding.matches_token("api"));
        assert!(!DomainKind::Coding.matches_token("apiary"));
    }

    #[test]
    fn test_inflections_match_but_unrelated_words_do_not() {
        assert!(DomainKind::Analysis.matches_token("analyzing"));
        assert!(DomainKind::Coding.matches_token("builds"));
        assert!(DomainKind::Research.matches_token("searches"));
        assert!(!DomainKind::Planning.matches_token("planet"));
        assert!(!DomainKind::Coding.matches_token("codename"));
        assert!(!DomainKind::Coding.matches_token("builder's"));

        let tokens = ["tell", "me", "about", "the", "planet", "mars", "and", "its", "codename"];
        assert!(DomainKind::classify(&tokens).is_empty());
    }

    #[test]
    fn test_for_agent_prefers_capabilities() {
        assert_eq!(
            DomainKind::for_agent("helper", &["analysis", "coding"]),
            DomainKind::Analysis
        );
        assert_eq!(
            DomainKind::for_agent("coding-agent", &["general"]),
            DomainKind::Coding
        );
        assert_eq!(
            DomainKind::for_agent("orchestrator", &["routing"]),
            DomainKind::General
        );
    }

    #[test]
    fn test_follow_up_verbs() {
        assert_eq!(DomainKind::for_follow_up_verb("implement"), Some(DomainKind::Coding));
        assert_eq!(DomainKind::for_follow_up_verb("analyze"), Some(DomainKind::Analysis));
        assert_eq!(DomainKind::for_follow_up_verb("sleep"), None);
    }

    #[test]
    fn test_string_roundtrip() {
        for domain in DomainKind::CLASSIFIED {
            assert_eq!(DomainKind::from_str(domain.as_str()), Some(domain));
        }
    }
}
