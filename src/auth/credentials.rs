//! Outbound credential store: applies stored per-agent credentials to
//! requests this agent makes to other agents.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::storage::SharedRepository;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialKind {
    Bearer,
    ApiKey,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundCredential {
    #[serde(rename = "type")]
    pub kind: CredentialKind,
    pub value: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutboundCredentialStore {
    pub credentials: HashMap<String, OutboundCredential>,
}

pub struct CredentialService {
    repo: SharedRepository<OutboundCredentialStore>,
}

impl CredentialService {
    pub fn new(repo: SharedRepository<OutboundCredentialStore>) -> Self {
        Self { repo }
    }

    pub async fn set(&self, agent_url: &str, credential: OutboundCredential) -> std::io::Result<()> {
        let mut store = self.repo.load().await?;
        store.credentials.insert(agent_url.to_string(), credential);
        self.repo.save(&store).await
    }

    pub async fn remove(&self, agent_url: &str) -> std::io::Result<()> {
        let mut store = self.repo.load().await?;
        store.credentials.remove(agent_url);
        self.repo.save(&store).await
    }

    /// Returns the `Authorization` header value for `agent_url`, if a
    /// credential is stored. Missing credentials simply pass through —
    /// callers should send the request unauthenticated in that case.
    pub async fn authorization_header(&self, agent_url: &str) -> std::io::Result<Option<String>> {
        let store = self.repo.load().await?;
        Ok(store.credentials.get(agent_url).map(|c| match c.kind {
            CredentialKind::Bearer => format!("Bearer {}", c.value),
            CredentialKind::ApiKey => format!("ApiKey {}", c.value),
        }))
    }
}
