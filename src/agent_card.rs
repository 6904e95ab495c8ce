//! Agent Card service: compose, validate, cache, serve, fetch, and
//! diff the public identity document at `/.well-known/agent.json`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use crate::skills::Skill;

pub const CACHE_TTL: Duration = Duration::from_secs(300);
const FETCH_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Capabilities {
    pub streaming: bool,
    #[serde(rename = "pushNotifications")]
    pub push_notifications: bool,
    #[serde(rename = "stateTransitionHistory")]
    pub state_transition_history: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            streaming: true,
            push_notifications: true,
            state_transition_history: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AuthenticationBlock {
    pub schemes: Vec<String>,
    #[serde(rename = "credentialsUrl", skip_serializing_if = "Option::is_none")]
    pub credentials_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Provider {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentCard {
    pub name: String,
    pub description: String,
    pub url: String,
    pub version: String,
    pub capabilities: Capabilities,
    pub skills: Vec<Skill>,
    pub authentication: AuthenticationBlock,
    #[serde(rename = "defaultInputModes")]
    pub default_input_modes: Vec<String>,
    #[serde(rename = "defaultOutputModes")]
    pub default_output_modes: Vec<String>,
    pub provider: Provider,
}

#[derive(Debug, Clone)]
pub struct AgentCardOptions {
    pub name: String,
    pub description: String,
    pub base_url: String,
    pub version: String,
    pub capabilities: Capabilities,
    pub auth_schemes: Vec<String>,
    pub credentials_url: Option<String>,
    pub category_filter: Option<String>,
    pub provider: Provider,
}

impl Default for AgentCardOptions {
    fn default() -> Self {
        Self {
            name: "xactions-a2a-agent".to_string(),
            description: "A2A agent exposing the XActions social-automation toolset.".to_string(),
            base_url: "http://localhost:3100".to_string(),
            version: "0.1.0".to_string(),
            capabilities: Capabilities::default(),
            auth_schemes: vec!["ApiKey".to_string(), "Bearer".to_string()],
            credentials_url: None,
            category_filter: None,
            provider: Provider::default(),
        }
    }
}

#[derive(Debug)]
pub struct ValidationError(pub String);

/// Validates the required-field invariants of a served agent card.
pub fn validate_agent_card(card: &AgentCard) -> Result<(), ValidationError> {
    if card.name.is_empty() {
        return Err(ValidationError("name must not be empty".to_string()));
    }
    if card.url.is_empty() {
        return Err(ValidationError("url must not be empty".to_string()));
    }
    if card.version.is_empty() {
        return Err(ValidationError("version must not be empty".to_string()));
    }
    for skill in &card.skills {
        if skill.id.is_empty() || skill.name.is_empty() {
            return Err(ValidationError(format!("skill missing id or name: {skill:?}")));
        }
    }
    // authentication.schemes is a Vec by construction; nothing further to check.
    Ok(())
}

pub fn generate_agent_card(options: &AgentCardOptions, skills: Vec<Skill>) -> AgentCard {
    let skills = match &options.category_filter {
        Some(category) => skills
            .into_iter()
            .filter(|s| s.tags.iter().any(|t| t == category))
            .collect(),
        None => skills,
    };
    AgentCard {
        name: options.name.clone(),
        description: options.description.clone(),
        url: options.base_url.clone(),
        version: options.version.clone(),
        capabilities: options.capabilities.clone(),
        skills,
        authentication: AuthenticationBlock {
            schemes: options.auth_schemes.clone(),
            credentials_url: options.credentials_url.clone(),
        },
        default_input_modes: vec!["text".to_string(), "data".to_string()],
        default_output_modes: vec!["text".to_string(), "data".to_string()],
        provider: options.provider.clone(),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CardDiff {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub changed: Vec<FieldChange>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FieldChange {
    pub field: String,
    pub from: String,
    pub to: String,
}

/// Diffs two cards for monitoring purposes.
pub fn diff_cards(a: &AgentCard, b: &AgentCard) -> CardDiff {
    let a_ids: std::collections::HashSet<&str> = a.skills.iter().map(|s| s.id.as_str()).collect();
    let b_ids: std::collections::HashSet<&str> = b.skills.iter().map(|s| s.id.as_str()).collect();

    let added = b_ids.difference(&a_ids).map(|s| s.to_string()).collect();
    let removed = a_ids.difference(&b_ids).map(|s| s.to_string()).collect();

    let mut changed = Vec::new();
    macro_rules! field_diff {
        ($name:literal, $a:expr, $b:expr) => {
            if $a != $b {
                changed.push(FieldChange {
                    field: $name.to_string(),
                    from: $a.to_string(),
                    to: $b.to_string(),
                });
            }
        };
    }
    field_diff!("name", a.name, b.name);
    field_diff!("description", a.description, b.description);
    field_diff!("url", a.url, b.url);
    field_diff!("version", a.version, b.version);

    CardDiff {
        added,
        removed,
        changed,
    }
}

struct CacheEntry {
    card: AgentCard,
    fetched_at: Instant,
}

/// Owns this agent's card cache and fetches + caches remote cards.
pub struct AgentCardService {
    options: AgentCardOptions,
    local_cache: RwLock<Option<CacheEntry>>,
    remote_cache: RwLock<HashMap<String, CacheEntry>>,
    http: reqwest::Client,
}

impl AgentCardService {
    pub fn new(options: AgentCardOptions) -> Self {
        Self {
            options,
            local_cache: RwLock::new(None),
            remote_cache: RwLock::new(HashMap::new()),
            http: reqwest::Client::new(),
        }
    }

    /// Returns the cached card, regenerating it on cache miss or TTL expiry.
    pub fn get_card(&self, skills: Vec<Skill>) -> AgentCard {
        {
            let cache = self.local_cache.read().unwrap();
            if let Some(entry) = cache.as_ref() {
                if entry.fetched_at.elapsed() < CACHE_TTL {
                    return entry.card.clone();
                }
            }
        }
        self.refresh(skills)
    }

    pub fn refresh(&self, skills: Vec<Skill>) -> AgentCard {
        let card = generate_agent_card(&self.options, skills);
        let mut cache = self.local_cache.write().unwrap();
        *cache = Some(CacheEntry {
            card: card.clone(),
            fetched_at: Instant::now(),
        });
        card
    }

    /// `GET {url}/.well-known/agent.json` with a 5s timeout, validated
    /// before being cached or returned.
    pub async fn fetch_remote_agent_card(&self, url: &str) -> Option<AgentCard> {
        {
            let cache = self.remote_cache.read().unwrap();
            if let Some(entry) = cache.get(url) {
                if entry.fetched_at.elapsed() < CACHE_TTL {
                    return Some(entry.card.clone());
                }
            }
        }

        let endpoint = format!("{}/.well-known/agent.json", url.trim_end_matches('/'));
        let response = self
            .http
            .get(&endpoint)
            .header("Accept", "application/json")
            .timeout(FETCH_TIMEOUT)
            .send()
            .await;

        let card: AgentCard = match response {
            Ok(resp) => match resp.json().await {
                Ok(card) => card,
                Err(e) => {
                    log::warn!("agent card from {url} was not valid JSON: {e}");
                    return None;
                }
            },
            Err(e) => {
                log::warn!("failed to fetch agent card from {url}: {e}");
                return None;
            }
        };

        if let Err(e) = validate_agent_card(&card) {
            log::warn!("agent card from {url} failed validation: {}", e.0);
            return None;
        }

        self.remote_cache.write().unwrap().insert(
            url.to_string(),
            CacheEntry {
                card: card.clone(),
                fetched_at: Instant::now(),
            },
        );
        Some(card)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skills::{convert_tool_to_skill, StaticCatalog, ToolCatalogSource};

    fn sample_skills() -> Vec<Skill> {
        StaticCatalog.load_tools().iter().map(convert_tool_to_skill).collect()
    }

    #[test]
    fn default_options_generate_a_valid_card() {
        let card = generate_agent_card(&AgentCardOptions::default(), sample_skills());
        assert!(validate_agent_card(&card).is_ok());
    }

    #[test]
    fn empty_name_fails_validation() {
        let mut card = generate_agent_card(&AgentCardOptions::default(), sample_skills());
        card.name = String::new();
        assert!(validate_agent_card(&card).is_err());
    }

    #[test]
    fn category_filter_restricts_skills() {
        let mut options = AgentCardOptions::default();
        options.category_filter = Some("posting".to_string());
        let card = generate_agent_card(&options, sample_skills());
        assert!(card.skills.iter().all(|s| s.tags.contains(&"posting".to_string())));
        assert!(!card.skills.is_empty());
    }

    #[test]
    fn diff_detects_added_and_removed_skills() {
        let mut skills = sample_skills();
        let a = generate_agent_card(&AgentCardOptions::default(), skills.clone());
        skills.pop();
        let b = generate_agent_card(&AgentCardOptions::default(), skills);
        let diff = diff_cards(&a, &b);
        assert_eq!(diff.removed.len(), 1);
        assert!(diff.added.is_empty());
    }

    #[test]
    fn service_caches_local_card() {
        let service = AgentCardService::new(AgentCardOptions::default());
        let first = service.get_card(sample_skills());
        let second = service.get_card(vec![]);
        // Cache hit: the (empty) skills passed on the second call are ignored.
        assert_eq!(first.skills.len(), second.skills.len());
    }
}
