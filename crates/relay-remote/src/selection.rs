//! Remote endpoints and deterministic endpoint selection

use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

use crate::card::AgentCard;

static WORD: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\w+").ok());

/// Address of a remote worker service plus its descriptor, when known
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEndpoint {
    /// URL tasks are posted to
    pub url: String,
    /// `None` when discovery failed; such endpoints are never selected
    pub card: Option<AgentCard>,
}

impl RemoteEndpoint {
    pub fn new(url: impl Into<String>, card: AgentCard) -> Self {
        Self {
            url: url.into(),
            card: Some(card),
        }
    }

    pub fn unresolved(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            card: None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.card.is_some()
    }

    /// Card name, or the URL for unresolved endpoints
    pub fn name(&self) -> &str {
        self.card.as_ref().map_or(self.url.as_str(), |c| c.name.as_str())
    }
}

/// Why an endpoint was chosen
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MatchReason {
    Skill,
    Similarity(f64),
}

/// Pick the endpoint for a subtask
///
/// An exact skill id match wins, first in declaration order. Otherwise the
/// endpoint whose card text overlaps most with the intent is chosen; ties go
/// to the lower index and a zero score is no match.
pub fn select_endpoint(
    endpoints: &[RemoteEndpoint],
    skill: Option<&str>,
    intent: &str,
) -> Option<(usize, MatchReason)> {
    let resolved = || {
        endpoints
            .iter()
            .enumerate()
            .filter_map(|(i, e)| e.card.as_ref().map(|card| (i, card)))
    };

    if let Some(skill) = skill {
        if let Some((i, _)) = resolved().find(|(_, card)| card.has_skill(skill)) {
            return Some((i, MatchReason::Skill));
        }
    }

    let wanted = tokens(intent);
    let mut best: Option<(usize, f64)> = None;
    for (i, card) in resolved() {
        let score = jaccard(&wanted, &tokens(&card.profile_text()));
        if score > best.map_or(0.0, |(_, s)| s) {
            best = Some((i, score));
        }
    }
    best.map(|(i, score)| (i, MatchReason::Similarity(score)))
}

/// Lowercased words of three or more characters
fn tokens(text: &str) -> HashSet<String> {
    let words: Box<dyn Iterator<Item = &str> + '_> = match WORD.as_ref() {
        Some(re) => Box::new(re.find_iter(text).map(|m| m.as_str())),
        None => Box::new(text.split(|c: char| !c.is_alphanumeric())),
    };
    words
        .map(str::to_lowercase)
        .filter(|t| t.chars().count() >= 3)
        .collect()
}

fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::AgentSkill;

    fn endpoints() -> Vec<RemoteEndpoint> {
        vec![
            RemoteEndpoint::unresolved("http://127.0.0.1:1/offline"),
            RemoteEndpoint::new(
                "http://localhost:11000/research_agent",
                AgentCard::new("research_agent", "Pesquisa de mercado e concorrentes", "http://localhost:11000")
                    .skill(AgentSkill::new("WEB_RESEARCH", "web_research", "Pesquisa produtos na web")),
            ),
            RemoteEndpoint::new(
                "http://localhost:12000/content_agent",
                AgentCard::new("content_agent", "Criação de copy persuasivo", "http://localhost:12000")
                    .skill(AgentSkill::new("COPYWRITING", "copywriting", "Cria copy persuasivo baseado em pesquisa")),
            ),
        ]
    }

    #[test]
    fn test_skill_match_first() {
        let selected = select_endpoint(&endpoints(), Some("COPYWRITING"), "anything");
        assert_eq!(selected, Some((2, MatchReason::Skill)));
    }

    #[test]
    fn test_similarity_fallback() {
        let (index, reason) =
            select_endpoint(&endpoints(), Some("UNKNOWN"), "pesquisa de concorrentes do mercado").unwrap();
        assert_eq!(index, 1);
        assert!(matches!(reason, MatchReason::Similarity(s) if s > 0.0));
    }

    #[test]
    fn test_no_overlap_is_no_match() {
        assert_eq!(select_endpoint(&endpoints(), None, "xyz qwerty"), None);
    }

    #[test]
    fn test_unresolved_never_selected() {
        let only_unresolved = vec![RemoteEndpoint::unresolved("http://x/offline")];
        assert_eq!(select_endpoint(&only_unresolved, None, "offline"), None);
    }

    #[test]
    fn test_ties_go_to_lower_index() {
        let card = |name: &str| AgentCard::new(name, "análise de fundos", "http://h");
        let twins = vec![
            RemoteEndpoint::new("http://a", card("a")),
            RemoteEndpoint::new("http://b", card("b")),
        ];
        let (index, _) = select_endpoint(&twins, None, "análise").unwrap();
        assert_eq!(index, 0);
    }
}
