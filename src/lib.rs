//! Agent-to-Agent (A2A) runtime for the XActions social-automation
//! toolset: task lifecycle engine, SSE streaming, HMAC push
//! notifications, a skill registry, agent discovery with trust scoring,
//! an orchestrator, authentication, and the HTTP/JSON-RPC surface that
//! ties them together.
//!
//! [`AppState`] is the single composition root: every module is wired
//! here once, at startup, and shared behind `Arc` by both the HTTP
//! server ([`server`]) and the CLI binary.

pub mod agent_card;
pub mod auth;
pub mod bridge;
pub mod config;
pub mod discovery;
pub mod error;
pub mod orchestrator;
pub mod push;
pub mod server;
pub mod skills;
pub mod sse;
pub mod storage;
pub mod tasks;
pub mod types;

use rand::RngCore;
use std::sync::Arc;
use std::time::Instant;

use crate::agent_card::{AgentCardOptions, AgentCardService};
use crate::auth::credentials::{CredentialService, OutboundCredentialStore};
use crate::auth::keys::{ApiKeyStore, KeyService};
use crate::bridge::{Bridge, LocalBridge};
use crate::config::Config;
use crate::discovery::registry::AgentRegistryStore;
use crate::discovery::trust::TrustStore;
use crate::discovery::{start_auto_refresh, AgentRegistry, TrustScorer};
use crate::orchestrator::Orchestrator;
use crate::push::SubscriptionManager;
use crate::skills::{SkillRegistry, StaticCatalog};
use crate::storage::FileRepository;
use crate::tasks::{Executor, TaskStore};

/// Everything the HTTP surface and the CLI need, constructed once at
/// startup and shared behind `Arc`.
pub struct AppState {
    pub config: Config,
    pub store: Arc<TaskStore>,
    pub executor: Arc<Executor>,
    pub bridge: Arc<dyn Bridge>,
    pub skills: Arc<SkillRegistry>,
    pub cards: Arc<AgentCardService>,
    pub registry: Arc<AgentRegistry>,
    pub trust: Arc<TrustScorer>,
    pub orchestrator: Arc<Orchestrator>,
    pub subscriptions: Arc<SubscriptionManager>,
    pub keys: Arc<KeyService>,
    pub credentials: Arc<CredentialService>,
    pub token_secret: Vec<u8>,
    pub started_at: Instant,
}

impl AppState {
    /// Wires every module from `config`, generating the on-disk signing
    /// secret on first run. Persisted stores live under
    /// `config.data_dir`; nothing here talks to the network.
    pub async fn bootstrap(config: Config) -> std::io::Result<Arc<Self>> {
        let secret = load_or_generate_secret(&config.secret_path()).await?;

        let store = Arc::new(TaskStore::new(config.max_tasks));
        let bridge: Arc<dyn Bridge> = Arc::new(LocalBridge);
        let executor = Arc::new(Executor::new(store.clone(), bridge.clone()));

        let skills = Arc::new(SkillRegistry::new(Arc::new(StaticCatalog)));

        let card_options = AgentCardOptions {
            base_url: config.base_url.clone(),
            ..AgentCardOptions::default()
        };
        let cards = Arc::new(AgentCardService::new(card_options));

        let registry_repo: crate::storage::SharedRepository<AgentRegistryStore> =
            Arc::new(FileRepository::new(config.registry_path()));
        let registry = Arc::new(AgentRegistry::new(registry_repo, cards.clone()));
        start_auto_refresh(registry.clone());

        let trust_repo: crate::storage::SharedRepository<TrustStore> =
            Arc::new(FileRepository::new(config.trust_path()));
        let trust = Arc::new(TrustScorer::new(trust_repo));

        let orchestrator = Arc::new(Orchestrator::new(
            skills.clone(),
            bridge.clone(),
            registry.clone(),
            trust.clone(),
        ));

        let subscriptions = Arc::new(SubscriptionManager::new(secret.clone()));

        let keys_repo: crate::storage::SharedRepository<ApiKeyStore> =
            Arc::new(FileRepository::new(config.keys_path()));
        let keys = Arc::new(KeyService::new(keys_repo));

        let credentials_repo: crate::storage::SharedRepository<OutboundCredentialStore> =
            Arc::new(FileRepository::new(config.outbound_auth_path()));
        let credentials = Arc::new(CredentialService::new(credentials_repo));

        Ok(Arc::new(Self {
            config,
            store,
            executor,
            bridge,
            skills,
            cards,
            registry,
            trust,
            orchestrator,
            subscriptions,
            keys,
            credentials,
            token_secret: secret,
            started_at: Instant::now(),
        }))
    }
}

/// Reads the 64-byte hex signing secret from `path`, generating and
/// persisting one with `0600` permissions on first run.
async fn load_or_generate_secret(path: &std::path::Path) -> std::io::Result<Vec<u8>> {
    match tokio::fs::read_to_string(path).await {
        Ok(hex_str) => hex::decode(hex_str.trim())
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            let mut raw = [0u8; 64];
            rand::thread_rng().fill_bytes(&mut raw);
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            let hex_str = hex::encode(raw);
            tokio::fs::write(path, &hex_str).await?;
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).await?;
            }
            Ok(raw.to_vec())
        }
        Err(e) => Err(e),
    }
}
