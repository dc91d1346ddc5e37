//! Message Text Utilities

use crate::domain::DomainKind;

/// Words between a connector and the verb that opens the next step
const FILLERS: &[&str] = &[
    "then", "also", "please", "to", "we", "i", "you", "should", "can", "could", "will", "let",
    "s", "us", "finally", "go", "ahead", "and",
];

/// A follow-up step detected after a sequential connector ("... then implement X")
#[derive(Debug, Clone, PartialEq)]
pub struct FollowUp {
    /// Domain of the verb opening the step
    pub domain: DomainKind,
    /// The step itself, up to the next follow-up
    pub clause: String,
    /// The step and everything after it
    pub remainder: String,
}

/// Lowercase the text and split it into words.
///
/// Punctuation is stripped; inner hyphens survive so "coding-agent" stays
/// one token.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !(c.is_alphanumeric() || c == '-'))
        .map(|t| t.trim_matches('-'))
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Tokens longer than three characters, first occurrence order, no duplicates
pub fn extract_keywords(tokens: &[String]) -> Vec<String> {
    let mut keywords: Vec<String> = Vec::new();
    for token in tokens {
        if token.chars().count() > 3 && !keywords.contains(token) {
            keywords.push(token.clone());
        }
    }
    keywords
}

/// Find sequential-workflow steps in a message.
///
/// A step starts at a connector (then, and, next, afterwards, after that,
/// followed by) whose next non-filler word is a follow-up verb of some
/// domain.
pub fn detect_follow_ups(text: &str) -> Vec<FollowUp> {
    split_steps(text).1
}

/// Split a message into its leading step and the follow-up steps after it
pub fn split_steps(text: &str) -> (String, Vec<FollowUp>) {
    let tokens = tokenize(text);

    // (connector index, verb index, domain)
    let mut starts: Vec<(usize, usize, DomainKind)> = Vec::new();
    let mut i = 0;
    while i < tokens.len() {
        let width = connector_width(&tokens, i);
        if width == 0 {
            i += 1;
            continue;
        }

        let mut j = i + width;
        while j < tokens.len() && FILLERS.contains(&tokens[j].as_str()) {
            j += 1;
        }

        match tokens.get(j).and_then(|t| DomainKind::for_follow_up_verb(t)) {
            Some(domain) => {
                starts.push((i, j, domain));
                i = j + 1;
            }
            None => i += width,
        }
    }

    let leading_end = starts.first().map(|s| s.0).unwrap_or(tokens.len());
    let follow_ups = starts
        .iter()
        .enumerate()
        .map(|(n, &(_, verb, domain))| {
            let end = starts.get(n + 1).map(|s| s.0).unwrap_or(tokens.len());
            FollowUp {
                domain,
                clause: tokens[verb..end].join(" "),
                remainder: tokens[verb..].join(" "),
            }
        })
        .collect();

    (tokens[..leading_end].join(" "), follow_ups)
}

fn connector_width(tokens: &[String], i: usize) -> usize {
    let next = tokens.get(i + 1).map(String::as_str);
    match (tokens[i].as_str(), next) {
        ("after", Some("that")) | ("followed", Some("by")) => 2,
        ("then", _) | ("and", _) | ("next", _) | ("afterwards", _) => 1,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_strips_punctuation() {
        assert_eq!(
            tokenize("Research GraphQL, then implement a sample API!"),
            vec!["research", "graphql", "then", "implement", "a", "sample", "api"]
        );
        assert_eq!(tokenize("ask the coding-agent -- now"), vec!["ask", "the", "coding-agent", "now"]);
        assert!(tokenize("?!...").is_empty());
    }

    #[test]
    fn test_extract_keywords() {
        let tokens = tokenize("Find the API docs and the API code docs");
        assert_eq!(extract_keywords(&tokens), vec!["find", "docs", "code"]);
    }

    #[test]
    fn test_detect_then_implement() {
        let follow_ups = detect_follow_ups("research GraphQL then implement a sample API");
        assert_eq!(follow_ups.len(), 1);
        assert_eq!(follow_ups[0].domain, DomainKind::Coding);
        assert_eq!(follow_ups[0].clause, "implement a sample api");
    }

    #[test]
    fn test_detect_chain_with_fillers() {
        let follow_ups = detect_follow_ups(
            "Look into caching, and then please implement it. After that, analyze the latency.",
        );
        let domains: Vec<DomainKind> = follow_ups.iter().map(|f| f.domain).collect();
        assert_eq!(domains, vec![DomainKind::Coding, DomainKind::Analysis]);
        assert_eq!(follow_ups[0].clause, "implement it");
        assert_eq!(follow_ups[0].remainder, "implement it after that analyze the latency");
        assert_eq!(follow_ups[1].clause, "analyze the latency");
    }

    #[test]
    fn test_split_steps_leading_clause() {
        let (leading, follow_ups) = split_steps("Research GraphQL then implement a sample API");
        assert_eq!(leading, "research graphql");
        assert_eq!(follow_ups.len(), 1);

        let (leading, follow_ups) = split_steps("debug the parser");
        assert_eq!(leading, "debug the parser");
        assert!(follow_ups.is_empty());
    }

    #[test]
    fn test_plain_conjunction_is_not_a_step() {
        assert!(detect_follow_ups("salt and pepper then nothing").is_empty());
        assert!(detect_follow_ups("implement the parser").is_empty());
    }
}
