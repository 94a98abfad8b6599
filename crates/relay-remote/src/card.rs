//! Capability descriptors of remote worker services

use serde::{Deserialize, Serialize};

/// Path of the capability descriptor, relative to the service origin
pub const CARD_PATH: &str = "/.well-known/agent.json";

/// A skill advertised by a remote worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentSkill {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

impl AgentSkill {
    pub fn new(id: impl Into<String>, name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: description.into(),
        }
    }
}

/// Identity, address and skills of a remote worker service
///
/// # Example
///
/// ```
/// use relay_remote::{AgentCard, AgentSkill};
///
/// let card = AgentCard::new("research_agent", "Pesquisa de mercado", "http://localhost:11000")
///     .skill(AgentSkill::new("WEB_RESEARCH", "web_research", "Pesquisa produtos e nichos"));
///
/// assert!(card.has_skill("WEB_RESEARCH"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentCard {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub url: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub skills: Vec<AgentSkill>,
}

fn default_version() -> String {
    "1.0.0".to_string()
}

impl AgentCard {
    pub fn new(name: impl Into<String>, description: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            url: url.into(),
            version: default_version(),
            skills: Vec::new(),
        }
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn skill(mut self, skill: AgentSkill) -> Self {
        self.skills.push(skill);
        self
    }

    pub fn has_skill(&self, id: &str) -> bool {
        self.skills.iter().any(|s| s.id == id)
    }

    /// Description text used for similarity matching
    pub fn profile_text(&self) -> String {
        let mut text = self.description.clone();
        for skill in &self.skills {
            text.push(' ');
            text.push_str(&skill.name);
            text.push(' ');
            text.push_str(&skill.description);
        }
        text
    }
}
