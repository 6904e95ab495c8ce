//! Agent discovery: persisted registry, skill matching, and trust
//! scoring for remote agents.

pub mod matcher;
pub mod registry;
pub mod trust;

pub use matcher::{find_agent_for_skill, find_agents_for_task, find_complementary_agents, ComplementaryMatch, TaskMatch};
pub use registry::{start_auto_refresh, AgentRegistry, AgentRegistryStore, RegistryEntry, RegistryFilters};
pub use trust::{InteractionEvent, InteractionKind, TrustRecord, TrustScorer, TrustStore};
