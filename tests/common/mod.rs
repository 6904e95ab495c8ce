//! Shared fixture for the end-to-end HTTP tests in this directory: an
//! `AppState` wired entirely with in-memory repositories, no disk I/O.

use std::sync::Arc;
use std::time::Instant;

use xactions_a2a::agent_card::{AgentCardOptions, AgentCardService};
use xactions_a2a::auth::credentials::{CredentialService, OutboundCredentialStore};
use xactions_a2a::auth::keys::{ApiKeyStore, KeyService};
use xactions_a2a::bridge::{Bridge, LocalBridge};
use xactions_a2a::config::Config;
use xactions_a2a::discovery::registry::AgentRegistryStore;
use xactions_a2a::discovery::trust::TrustStore;
use xactions_a2a::discovery::{AgentRegistry, TrustScorer};
use xactions_a2a::orchestrator::Orchestrator;
use xactions_a2a::push::SubscriptionManager;
use xactions_a2a::skills::{SkillRegistry, StaticCatalog};
use xactions_a2a::storage::InMemoryRepository;
use xactions_a2a::tasks::{Executor, TaskStore};
use xactions_a2a::AppState;

pub fn test_state() -> Arc<AppState> {
    let store = Arc::new(TaskStore::new(100));
    let bridge: Arc<dyn Bridge> = Arc::new(LocalBridge);
    let executor = Arc::new(Executor::new(store.clone(), bridge.clone()));
    let skills = Arc::new(SkillRegistry::new(Arc::new(StaticCatalog)));
    let cards = Arc::new(AgentCardService::new(AgentCardOptions::default()));
    let registry = Arc::new(AgentRegistry::new(
        Arc::new(InMemoryRepository::<AgentRegistryStore>::new()),
        cards.clone(),
    ));
    let trust = Arc::new(TrustScorer::new(Arc::new(InMemoryRepository::<TrustStore>::new())));
    let orchestrator = Arc::new(Orchestrator::new(skills.clone(), bridge.clone(), registry.clone(), trust.clone()));
    let subscriptions = Arc::new(SubscriptionManager::new(b"test-secret".to_vec()));
    let keys = Arc::new(KeyService::new(Arc::new(InMemoryRepository::<ApiKeyStore>::new())));
    let credentials = Arc::new(CredentialService::new(Arc::new(InMemoryRepository::<OutboundCredentialStore>::new())));

    Arc::new(AppState {
        config: Config::default(),
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
        token_secret: b"test-secret".to_vec(),
        started_at: Instant::now(),
    })
}

pub fn router(state: Arc<AppState>) -> axum::Router {
    xactions_a2a::server::router(state)
}
