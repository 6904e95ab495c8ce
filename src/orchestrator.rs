//! Decomposes a composite task into ordered steps, resolves cross-step
//! references, selects a local or remote agent per step, and drives
//! execution to a bundled result.
//!
//! The round/step bookkeeping and progress-callback shape are grounded
//! in the base crate's `Orchestration::run` (per-round message
//! accumulation, a final bundled response struct) and `planner.rs`'s
//! decomposition of a goal into discrete actionable steps.

use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::bridge::{Bridge, CancellationToken};
use crate::discovery::{AgentRegistry, RegistryFilters, TrustScorer};
use crate::discovery::trust::InteractionKind;
use crate::skills::SkillRegistry;
use crate::types::{Message, Part};

const DELEGATION_POLL_INTERVAL: Duration = Duration::from_secs(2);
const DELEGATION_POLL_TIMEOUT: Duration = Duration::from_secs(120);
const DELEGATION_MAX_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone)]
pub struct StepDescriptor {
    pub skill: String,
    pub label: String,
    pub params: HashMap<String, Value>,
    pub deps: Vec<usize>,
}

/// Matches `text` against an ordered list of decomposition patterns,
/// each yielding a list of steps. Falls back to a single
/// natural-language step when nothing matches.
pub fn decompose(text: &str) -> Vec<StepDescriptor> {
    if let Some(steps) = decompose_compare(text) {
        return steps;
    }
    vec![StepDescriptor {
        skill: "xactions.nlp_dispatch".to_string(),
        label: text.to_string(),
        params: HashMap::from([("text".to_string(), Value::String(text.to_string()))]),
        deps: Vec::new(),
    }]
}

/// `"compare <a> and <b>"` → fetch both profiles, then compare them
/// with references to the two fetch steps' results.
fn decompose_compare(text: &str) -> Option<Vec<StepDescriptor>> {
    let lower = text.to_lowercase();
    let rest = lower.strip_prefix("compare ")?;
    let (a, b) = rest.split_once(" and ")?;
    let a = a.trim().to_string();
    let b = b.trim().to_string();
    if a.is_empty() || b.is_empty() {
        return None;
    }

    Some(vec![
        StepDescriptor {
            skill: "xactions.x_get_profile".to_string(),
            label: format!("fetch profile for {a}"),
            params: HashMap::from([("username".to_string(), Value::String(a))]),
            deps: Vec::new(),
        },
        StepDescriptor {
            skill: "xactions.x_get_profile".to_string(),
            label: format!("fetch profile for {b}"),
            params: HashMap::from([("username".to_string(), Value::String(b))]),
            deps: Vec::new(),
        },
        StepDescriptor {
            skill: "xactions.x_compare_profiles".to_string(),
            label: "compare profiles".to_string(),
            params: HashMap::from([
                ("a".to_string(), Value::String("$step0".to_string())),
                ("b".to_string(), Value::String("$step1".to_string())),
            ]),
            deps: vec![0, 1],
        },
    ])
}

/// Replaces `$stepN` or `$stepN.path` string values with the result of
/// the N-th previously executed step; unresolved references pass
/// through unchanged.
pub fn resolve_references(params: &HashMap<String, Value>, context: &HashMap<usize, Value>) -> HashMap<String, Value> {
    params
        .iter()
        .map(|(k, v)| (k.clone(), resolve_value(v, context)))
        .collect()
}

fn resolve_value(value: &Value, context: &HashMap<usize, Value>) -> Value {
    let Value::String(s) = value else {
        return value.clone();
    };
    let Some(rest) = s.strip_prefix("$step") else {
        return value.clone();
    };
    let (index_str, path) = match rest.split_once('.') {
        Some((i, p)) => (i, Some(p)),
        None => (rest, None),
    };
    let Ok(index) = index_str.parse::<usize>() else {
        return value.clone();
    };
    let Some(result) = context.get(&index) else {
        return value.clone();
    };
    match path {
        None => result.clone(),
        Some(path) => path
            .split('.')
            .try_fold(result.clone(), |acc, segment| acc.get(segment).cloned())
            .unwrap_or_else(|| value.clone()),
    }
}

/// Groups contiguous dependency-free steps into parallel batches and
/// lists dependency-bearing steps separately. Reported to plan-preview
/// callers in this split shape; [`execution_groups`] derives the actual
/// run order from the same rule, interleaved.
pub fn classify_parallelism(steps: &[StepDescriptor]) -> (Vec<Vec<usize>>, Vec<usize>) {
    let mut parallel = Vec::new();
    let mut sequential = Vec::new();
    let mut batch = Vec::new();

    for (index, step) in steps.iter().enumerate() {
        if step.deps.is_empty() {
            batch.push(index);
        } else {
            if !batch.is_empty() {
                parallel.push(std::mem::take(&mut batch));
            }
            sequential.push(index);
        }
    }
    if !batch.is_empty() {
        parallel.push(batch);
    }
    (parallel, sequential)
}

/// Groups steps into ordered execution units: contiguous dependency-free
/// steps share a unit that runs concurrently; a step with dependencies
/// gets its own unit, run only after every earlier unit has completed.
fn execution_groups(steps: &[StepDescriptor]) -> Vec<Vec<usize>> {
    let mut groups = Vec::new();
    let mut batch = Vec::new();
    for (index, step) in steps.iter().enumerate() {
        if step.deps.is_empty() {
            batch.push(index);
        } else {
            if !batch.is_empty() {
                groups.push(std::mem::take(&mut batch));
            }
            groups.push(vec![index]);
        }
    }
    if !batch.is_empty() {
        groups.push(batch);
    }
    groups
}

#[derive(Debug, Clone, Serialize)]
pub struct PlanPreview {
    pub total_steps: usize,
    pub parallel: Vec<Vec<usize>>,
    pub sequential: Vec<usize>,
}

pub fn plan(text: &str) -> PlanPreview {
    let steps = decompose(text);
    let (parallel, sequential) = classify_parallelism(&steps);
    PlanPreview {
        total_steps: steps.len(),
        parallel,
        sequential,
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum OrchestrationEvent {
    Start { total_steps: usize },
    StepStart { index: usize, label: String },
    StepComplete { index: usize, label: String },
    StepError { index: usize, label: String, error: String },
    Complete { success: bool },
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct OrchestrationResult {
    pub success: bool,
    pub results: Vec<Value>,
    pub artifacts: Vec<Part>,
    pub errors: Vec<String>,
}

enum Selection {
    Local,
    Remote(String),
}

/// Drives composite-task execution: per-step agent selection (local
/// bridge or remote delegation), reference resolution, and progress
/// reporting.
pub struct Orchestrator {
    skills: Arc<SkillRegistry>,
    bridge: Arc<dyn Bridge>,
    registry: Arc<AgentRegistry>,
    trust: Arc<TrustScorer>,
    http: reqwest::Client,
}

impl Orchestrator {
    pub fn new(
        skills: Arc<SkillRegistry>,
        bridge: Arc<dyn Bridge>,
        registry: Arc<AgentRegistry>,
        trust: Arc<TrustScorer>,
    ) -> Self {
        Self {
            skills,
            bridge,
            registry,
            trust,
            http: reqwest::Client::new(),
        }
    }

    async fn select_agent(&self, skill_id: &str) -> Option<Selection> {
        if self.skills.get_skill_by_id(skill_id).is_some() {
            return Some(Selection::Local);
        }
        let candidates = self
            .registry
            .list(&RegistryFilters {
                skill_id: Some(skill_id.to_string()),
                healthy_only: true,
                ..Default::default()
            })
            .await
            .ok()?;
        if candidates.is_empty() {
            return None;
        }
        let mut scored = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let score = self.trust.score(&candidate.url).await.unwrap_or(50);
            scored.push((score, candidate.url));
        }
        scored.sort_by(|a, b| b.0.cmp(&a.0));
        scored.into_iter().next().map(|(_, url)| Selection::Remote(url))
    }

    /// Runs `text`'s decomposed steps to completion, executing each
    /// contiguous batch of dependency-free steps concurrently and each
    /// dependency-bearing step only after its unit's predecessors have
    /// all committed, invoking `on_event` at each lifecycle point.
    pub async fn run(&self, text: &str, mut on_event: impl FnMut(OrchestrationEvent)) -> OrchestrationResult {
        let steps = decompose(text);
        on_event(OrchestrationEvent::Start { total_steps: steps.len() });

        let mut context: HashMap<usize, Value> = HashMap::new();
        let mut result = OrchestrationResult::default();
        result.results = vec![Value::Null; steps.len()];

        for group in execution_groups(&steps) {
            for &index in &group {
                on_event(OrchestrationEvent::StepStart {
                    index,
                    label: steps[index].label.clone(),
                });
            }

            let outcomes = futures_util::future::join_all(group.iter().map(|&index| {
                let step = &steps[index];
                let resolved = resolve_references(&step.params, &context);
                async move {
                    let outcome = match self.select_agent(&step.skill).await {
                        Some(Selection::Local) => self.run_local(&step.skill, &resolved).await,
                        Some(Selection::Remote(url)) => self.delegate_with_retry(&url, &step.skill, &resolved).await,
                        None => Err(format!("no agent available for skill {}", step.skill)),
                    };
                    (index, outcome)
                }
            }))
            .await;

            for (index, outcome) in outcomes {
                match outcome {
                    Ok(value) => {
                        context.insert(index, value.clone());
                        result.results[index] = value;
                        on_event(OrchestrationEvent::StepComplete {
                            index,
                            label: steps[index].label.clone(),
                        });
                    }
                    Err(error) => {
                        result.errors.push(format!("step {index} ({}): {error}", steps[index].label));
                        on_event(OrchestrationEvent::StepError {
                            index,
                            label: steps[index].label.clone(),
                            error,
                        });
                    }
                }
            }
        }

        result.success = result.errors.is_empty();
        on_event(OrchestrationEvent::Complete { success: result.success });
        result
    }

    async fn run_local(&self, skill_id: &str, params: &HashMap<String, Value>) -> Result<Value, String> {
        let outcome = self
            .bridge
            .invoke(skill_id, Vec::new(), params.clone(), CancellationToken::new())
            .await
            .map_err(|e| e.to_string())?;
        Ok(Value::Array(
            outcome
                .artifacts
                .iter()
                .map(|p| serde_json::to_value(p).unwrap_or(Value::Null))
                .collect(),
        ))
    }

    /// Retries [`Self::delegate`] on failure with exponential backoff
    /// (1, 2, 4 seconds) up to [`DELEGATION_MAX_ATTEMPTS`] attempts.
    async fn delegate_with_retry(&self, url: &str, skill_id: &str, params: &HashMap<String, Value>) -> Result<Value, String> {
        let mut last_error = String::new();
        for attempt in 0..DELEGATION_MAX_ATTEMPTS {
            match self.delegate(url, skill_id, params).await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    last_error = e;
                    if attempt + 1 < DELEGATION_MAX_ATTEMPTS {
                        tokio::time::sleep(Duration::from_secs(1u64 << attempt)).await;
                    }
                }
            }
        }
        Err(last_error)
    }

    /// Tries each agent in sequence until one succeeds.
    pub async fn delegate_with_fallback(&self, urls: &[String], skill_id: &str, params: &HashMap<String, Value>) -> Result<Value, String> {
        let mut last_error = "no agents provided".to_string();
        for url in urls {
            match self.delegate_with_retry(url, skill_id, params).await {
                Ok(value) => return Ok(value),
                Err(e) => last_error = e,
            }
        }
        Err(last_error)
    }

    /// Posts `tasks/send` to the remote agent, polls until terminal, and
    /// credits the trust scorer with the outcome.
    async fn delegate(&self, url: &str, skill_id: &str, params: &HashMap<String, Value>) -> Result<Value, String> {
        let started = std::time::Instant::now();
        let message = Message {
            role: crate::types::Role::User,
            parts: vec![Part::data(serde_json::json!({ "skill": skill_id, "params": params }))],
            metadata: HashMap::new(),
        };

        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "method": "tasks/send",
            "params": { "message": message, "skill": skill_id, "params": params },
            "id": 1,
        });

        let endpoint = format!("{}/a2a/tasks", url.trim_end_matches('/'));
        let response = self
            .http
            .post(&endpoint)
            .json(&body)
            .timeout(Duration::from_secs(30))
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let envelope: Value = response.json().await.map_err(|e| e.to_string())?;
        let task_id = envelope
            .pointer("/result/id")
            .and_then(|v| v.as_str())
            .ok_or("remote response missing task id")?
            .to_string();

        let outcome = self.poll_until_terminal(url, &task_id).await;
        let duration_ms = started.elapsed().as_millis() as u64;
        match &outcome {
            Ok(_) => {
                let _ = self.trust.record(url, InteractionKind::Success, Some(duration_ms)).await;
            }
            Err(_) => {
                let _ = self.trust.record(url, InteractionKind::Failure, Some(duration_ms)).await;
            }
        }
        outcome
    }

    async fn poll_until_terminal(&self, url: &str, task_id: &str) -> Result<Value, String> {
        let deadline = std::time::Instant::now() + DELEGATION_POLL_TIMEOUT;
        let endpoint = format!("{}/a2a/tasks/{task_id}", url.trim_end_matches('/'));

        loop {
            let response = self
                .http
                .get(&endpoint)
                .send()
                .await
                .map_err(|e| e.to_string())?;
            let task: Value = response.json().await.map_err(|e| e.to_string())?;
            let state = task.pointer("/status/state").and_then(|v| v.as_str()).unwrap_or("");

            match state {
                "completed" => return Ok(task.get("artifacts").cloned().unwrap_or(Value::Null)),
                "failed" | "canceled" => return Err(format!("remote task ended in state {state}")),
                _ => {
                    if std::time::Instant::now() >= deadline {
                        return Err("delegation poll timed out".to_string());
                    }
                    tokio::time::sleep(DELEGATION_POLL_INTERVAL).await;
                }
            }
        }
    }
}
