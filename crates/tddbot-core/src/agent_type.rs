use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse agent persona requested in free text.
///
/// `review` and `reviewer` are folded into [`AgentType::Architect`]; there is
/// no separate reviewer persona.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentType {
    Developer,
    Tester,
    Architect,
}

const DEVELOPER_KEYWORDS: &[&str] = &["developer", "dev", "implement", "code"];
const TESTER_KEYWORDS: &[&str] = &["tester", "test", "qa"];
const ARCHITECT_KEYWORDS: &[&str] = &["architect", "architecture", "design", "review", "reviewer"];

impl AgentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentType::Developer => "developer",
            AgentType::Tester => "tester",
            AgentType::Architect => "architect",
        }
    }

    /// Canonical mention handle for this persona.
    pub fn mention(&self) -> &'static str {
        match self {
            AgentType::Developer => "@developer",
            AgentType::Tester => "@tester",
            AgentType::Architect => "@architect",
        }
    }

    /// Parse a type token. Unknown tokens yield `None`.
    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "developer" => Some(AgentType::Developer),
            "tester" => Some(AgentType::Tester),
            "architect" | "reviewer" => Some(AgentType::Architect),
            _ => None,
        }
    }
}

impl fmt::Display for AgentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Guess the requested persona from free text.
///
/// Keyword sets are matched as case-insensitive substrings and checked in
/// priority order developer, tester, architect. Substring matching means
/// `"code"` inside `"barcode"` counts.
pub fn infer_agent_type(text: &str) -> Option<AgentType> {
    let lower = text.to_lowercase();
    let hit = |words: &[&str]| words.iter().any(|w| lower.contains(w));

    if hit(DEVELOPER_KEYWORDS) {
        Some(AgentType::Developer)
    } else if hit(TESTER_KEYWORDS) {
        Some(AgentType::Tester)
    } else if hit(ARCHITECT_KEYWORDS) {
        Some(AgentType::Architect)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn developer_keywords() {
        assert_eq!(infer_agent_type("please IMPLEMENT this"), Some(AgentType::Developer));
        assert_eq!(infer_agent_type("dev needed"), Some(AgentType::Developer));
    }

    #[test]
    fn tester_keywords() {
        assert_eq!(infer_agent_type("Tester: run QA"), Some(AgentType::Tester));
    }

    #[test]
    fn review_maps_to_architect() {
        assert_eq!(infer_agent_type("please review ABC-1"), Some(AgentType::Architect));
        assert_eq!(infer_agent_type("the architecture"), Some(AgentType::Architect));
    }

    #[test]
    fn developer_wins_over_tester() {
        assert_eq!(infer_agent_type("developer write a test"), Some(AgentType::Developer));
    }

    #[test]
    fn no_keywords() {
        assert_eq!(infer_agent_type("hello there"), None);
    }

    #[test]
    fn tokens_map_to_canonical_mentions() {
        assert_eq!(AgentType::from_token("developer").map(|t| t.mention()), Some("@developer"));
        assert_eq!(AgentType::from_token("Tester").map(|t| t.mention()), Some("@tester"));
        assert_eq!(AgentType::from_token("reviewer").map(|t| t.mention()), Some("@architect"));
        assert_eq!(AgentType::from_token("architect").map(|t| t.mention()), Some("@architect"));
        assert_eq!(AgentType::from_token("manager"), None);
    }
}
