//! Persisted registry of remote agents: register/unregister, filtered
//! listing, periodic card refresh, and health checks.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::agent_card::{AgentCard, AgentCardService};
use crate::storage::SharedRepository;

const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);
pub const AUTO_REFRESH_INTERVAL: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub url: String,
    pub card: AgentCard,
    pub registered_at: chrono::DateTime<chrono::Utc>,
    pub last_healthy: Option<chrono::DateTime<chrono::Utc>>,
    pub healthy: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentRegistryStore {
    pub agents: HashMap<String, RegistryEntry>,
}

#[derive(Debug, Clone, Default)]
pub struct RegistryFilters {
    pub skill_id: Option<String>,
    pub tag: Option<String>,
    pub healthy_only: bool,
    pub provider_contains: Option<String>,
}

pub struct AgentRegistry {
    repo: SharedRepository<AgentRegistryStore>,
    cards: Arc<AgentCardService>,
    http: reqwest::Client,
}

impl AgentRegistry {
    pub fn new(repo: SharedRepository<AgentRegistryStore>, cards: Arc<AgentCardService>) -> Self {
        Self {
            repo,
            cards,
            http: reqwest::Client::new(),
        }
    }

    /// Fetches the remote card and stores the entry; refuses registration
    /// entirely when the fetch or validation fails.
    pub async fn register(&self, url: &str) -> std::io::Result<bool> {
        let Some(card) = self.cards.fetch_remote_agent_card(url).await else {
            return Ok(false);
        };
        let mut store = self.repo.load().await?;
        let now = chrono::Utc::now();
        store.agents.insert(
            url.to_string(),
            RegistryEntry {
                url: url.to_string(),
                card,
                registered_at: now,
                last_healthy: Some(now),
                healthy: true,
            },
        );
        self.repo.save(&store).await?;
        Ok(true)
    }

    pub async fn unregister(&self, url: &str) -> std::io::Result<bool> {
        let mut store = self.repo.load().await?;
        let removed = store.agents.remove(url).is_some();
        if removed {
            self.repo.save(&store).await?;
        }
        Ok(removed)
    }

    pub async fn list(&self, filters: &RegistryFilters) -> std::io::Result<Vec<RegistryEntry>> {
        let store = self.repo.load().await?;
        Ok(store
            .agents
            .values()
            .filter(|entry| {
                if filters.healthy_only && !entry.healthy {
                    return false;
                }
                if let Some(skill_id) = &filters.skill_id {
                    if !entry.card.skills.iter().any(|s| &s.id == skill_id) {
                        return false;
                    }
                }
                if let Some(tag) = &filters.tag {
                    if !entry.card.skills.iter().any(|s| s.tags.contains(tag)) {
                        return false;
                    }
                }
                if let Some(substr) = &filters.provider_contains {
                    let org = entry.card.provider.organization.as_deref().unwrap_or("");
                    if !org.to_lowercase().contains(&substr.to_lowercase()) {
                        return false;
                    }
                }
                true
            })
            .cloned()
            .collect())
    }

    /// Refetches one agent's card (or all, if `url` is `None`), marking
    /// `healthy=false` on failure without removing the entry.
    pub async fn refresh(&self, url: Option<&str>) -> std::io::Result<()> {
        let mut store = self.repo.load().await?;
        let urls: Vec<String> = match url {
            Some(u) => vec![u.to_string()],
            None => store.agents.keys().cloned().collect(),
        };
        for target in urls {
            match self.cards.fetch_remote_agent_card(&target).await {
                Some(card) => {
                    if let Some(entry) = store.agents.get_mut(&target) {
                        entry.card = card;
                        entry.healthy = true;
                        entry.last_healthy = Some(chrono::Utc::now());
                    }
                }
                None => {
                    if let Some(entry) = store.agents.get_mut(&target) {
                        entry.healthy = false;
                    }
                }
            }
        }
        self.repo.save(&store).await
    }

    /// `GET {url}/a2a/health` with a 5s timeout and, when available, the
    /// outbound credential for `url`; updates the stored entry's health
    /// flag and, on success, `last_healthy`.
    pub async fn health(&self, url: &str, auth_header: Option<String>) -> std::io::Result<bool> {
        let endpoint = format!("{}/a2a/health", url.trim_end_matches('/'));
        let mut request = self.http.get(&endpoint).timeout(HEALTH_TIMEOUT);
        if let Some(header) = auth_header {
            request = request.header("Authorization", header);
        }
        let healthy = request.send().await.map(|r| r.status().is_success()).unwrap_or(false);

        let mut store = self.repo.load().await?;
        if let Some(entry) = store.agents.get_mut(url) {
            entry.healthy = healthy;
            if healthy {
                entry.last_healthy = Some(chrono::Utc::now());
            }
            self.repo.save(&store).await?;
        }
        Ok(healthy)
    }
}

/// Spawns a background task that calls [`AgentRegistry::refresh`] every
/// [`AUTO_REFRESH_INTERVAL`] until the returned handle is dropped/aborted.
pub fn start_auto_refresh(registry: Arc<AgentRegistry>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(AUTO_REFRESH_INTERVAL);
        loop {
            ticker.tick().await;
            if let Err(e) = registry.refresh(None).await {
                log::warn!("periodic agent registry refresh failed: {e}");
            }
        }
    })
}
