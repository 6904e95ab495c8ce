//! Multi-factor trust scoring for remote agents: success ratio,
//! longevity, recency, and volume, each weighted and summed to a score
//! in `[0, 100]`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::storage::SharedRepository;

const MAX_EVENTS_PER_AGENT: usize = 1000;
const RECENT_WINDOW: chrono::Duration = chrono::Duration::hours(24);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InteractionKind {
    Success,
    Failure,
    Timeout,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionEvent {
    #[serde(rename = "type")]
    pub kind: InteractionKind,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrustRecord {
    pub first_seen: chrono::DateTime<chrono::Utc>,
    pub events: Vec<InteractionEvent>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrustStore {
    pub records: HashMap<String, TrustRecord>,
}

pub struct TrustScorer {
    repo: SharedRepository<TrustStore>,
}

impl TrustScorer {
    pub fn new(repo: SharedRepository<TrustStore>) -> Self {
        Self { repo }
    }

    /// Appends an interaction event for `agent_url`, creating the record
    /// on first contact. The event list is capped at
    /// [`MAX_EVENTS_PER_AGENT`]; the oldest events are dropped first.
    pub async fn record(
        &self,
        agent_url: &str,
        kind: InteractionKind,
        duration_ms: Option<u64>,
    ) -> std::io::Result<()> {
        let mut store = self.repo.load().await?;
        let now = chrono::Utc::now();
        let record = store.records.entry(agent_url.to_string()).or_insert_with(|| TrustRecord {
            first_seen: now,
            events: Vec::new(),
        });
        record.events.push(InteractionEvent {
            kind,
            timestamp: now,
            duration_ms,
        });
        if record.events.len() > MAX_EVENTS_PER_AGENT {
            let overflow = record.events.len() - MAX_EVENTS_PER_AGENT;
            record.events.drain(0..overflow);
        }
        self.repo.save(&store).await
    }

    /// Computes the `[0, 100]` trust score for `agent_url`. An agent
    /// with no record at all returns the neutral 50.
    pub async fn score(&self, agent_url: &str) -> std::io::Result<u32> {
        let store = self.repo.load().await?;
        let Some(record) = store.records.get(agent_url) else {
            return Ok(50);
        };
        Ok(score_record(record))
    }
}

fn score_record(record: &TrustRecord) -> u32 {
    let total = record.events.len();
    let successes = record
        .events
        .iter()
        .filter(|e| e.kind == InteractionKind::Success)
        .count();

    let success_ratio = if total == 0 {
        20.0
    } else {
        (successes as f64 / total as f64) * 40.0
    };

    let days_known = (chrono::Utc::now() - record.first_seen).num_days().max(0) as f64;
    let longevity = (days_known / 30.0).min(1.0) * 20.0;

    let cutoff = chrono::Utc::now() - RECENT_WINDOW;
    let recent: Vec<&InteractionEvent> = record.events.iter().filter(|e| e.timestamp >= cutoff).collect();
    let recency = if recent.is_empty() {
        10.0
    } else {
        let recent_successes = recent.iter().filter(|e| e.kind == InteractionKind::Success).count();
        (recent_successes as f64 / recent.len() as f64) * 20.0
    };

    let volume = (total as f64 / 100.0).min(1.0) * 20.0;

    let sum = success_ratio + longevity + recency + volume;
    sum.clamp(0.0, 100.0).round() as u32
}
