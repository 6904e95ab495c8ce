//! Skill-based matching over the registered remote agents.

use serde::Serialize;
use std::collections::HashSet;

use crate::discovery::registry::RegistryEntry;

#[derive(Debug, Clone, Serialize)]
pub struct TaskMatch {
    pub agent_url: String,
    pub agent_name: String,
    pub matching_skills: Vec<String>,
    pub score: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComplementaryMatch {
    pub agent_url: String,
    pub agent_name: String,
    pub complement: Vec<String>,
}

fn tokenize(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|t| t.to_lowercase())
        .filter(|t| t.len() >= 3)
        .collect()
}

/// Tokenizes `text`, then for each healthy agent scores each of its
/// skills by how many task tokens appear in
/// `"{id} {name} {description} {tags}"` lowercased. A skill contributes
/// to the agent's total iff at least one token matched. Results are
/// sorted by total score descending.
pub fn find_agents_for_task(agents: &[RegistryEntry], text: &str) -> Vec<TaskMatch> {
    let tokens = tokenize(text);
    let mut matches = Vec::new();

    for agent in agents.iter().filter(|a| a.healthy) {
        let mut matching_skills = Vec::new();
        let mut score = 0u32;

        for skill in &agent.card.skills {
            let haystack = format!(
                "{} {} {} {}",
                skill.id,
                skill.name,
                skill.description,
                skill.tags.join(" ")
            )
            .to_lowercase();

            let hits = tokens.iter().filter(|t| haystack.contains(t.as_str())).count();
            if hits > 0 {
                matching_skills.push(skill.id.clone());
                score += hits as u32;
            }
        }

        if !matching_skills.is_empty() {
            matches.push(TaskMatch {
                agent_url: agent.url.clone(),
                agent_name: agent.card.name.clone(),
                matching_skills,
                score,
            });
        }
    }

    matches.sort_by(|a, b| b.score.cmp(&a.score));
    matches
}

/// Healthy agents advertising the exact `skill_id`.
pub fn find_agent_for_skill<'a>(agents: &'a [RegistryEntry], skill_id: &str) -> Vec<&'a RegistryEntry> {
    agents
        .iter()
        .filter(|a| a.healthy && a.card.skills.iter().any(|s| s.id == skill_id))
        .collect()
}

/// Agents whose skill set minus `my_skill_ids` is non-empty, sorted by
/// the size of that complement descending.
pub fn find_complementary_agents(agents: &[RegistryEntry], my_skill_ids: &[String]) -> Vec<ComplementaryMatch> {
    let mine: HashSet<&str> = my_skill_ids.iter().map(|s| s.as_str()).collect();
    let mut complementary: Vec<ComplementaryMatch> = agents
        .iter()
        .filter(|a| a.healthy)
        .filter_map(|agent| {
            let complement: Vec<String> = agent
                .card
                .skills
                .iter()
                .map(|s| s.id.clone())
                .filter(|id| !mine.contains(id.as_str()))
                .collect();
            if complement.is_empty() {
                None
            } else {
                Some(ComplementaryMatch {
                    agent_url: agent.url.clone(),
                    agent_name: agent.card.name.clone(),
                    complement,
                })
            }
        })
        .collect();

    complementary.sort_by(|a, b| b.complement.len().cmp(&a.complement.len()));
    complementary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent_card::{generate_agent_card, AgentCardOptions};
    use crate::skills::Skill;
    use serde_json::json;

    fn entry(url: &str, skills: Vec<Skill>, healthy: bool) -> RegistryEntry {
        let mut options = AgentCardOptions::default();
        options.base_url = url.to_string();
        RegistryEntry {
            url: url.to_string(),
            card: generate_agent_card(&options, skills),
            registered_at: chrono::Utc::now(),
            last_healthy: None,
            healthy,
        }
    }

    fn skill(id: &str, description: &str) -> Skill {
        Skill {
            id: id.to_string(),
            name: id.to_string(),
            description: description.to_string(),
            tags: vec![],
            input_schema: json!({}),
            output_schema: json!({}),
        }
    }

    #[test]
    fn unhealthy_agents_are_excluded() {
        let agents = vec![entry(
            "https://down.example",
            vec![skill("xactions.x_post_tweet", "publish a tweet about cats")],
            false,
        )];
        assert!(find_agents_for_task(&agents, "post a tweet about cats").is_empty());
    }

    #[test]
    fn matches_are_sorted_by_score_descending() {
        let agents = vec![
            entry(
                "https://weak.example",
                vec![skill("xactions.x_get_profile", "fetch a profile")],
                true,
            ),
            entry(
                "https://strong.example",
                vec![
                    skill("xactions.x_post_tweet", "publish tweet about cats and dogs"),
                    skill("xactions.x_reply", "reply about cats"),
                ],
                true,
            ),
        ];
        let matches = find_agents_for_task(&agents, "post tweet about cats");
        assert_eq!(matches[0].agent_url, "https://strong.example");
    }

    #[test]
    fn find_agent_for_skill_matches_exact_id() {
        let agents = vec![entry(
            "https://a.example",
            vec![skill("xactions.x_post_tweet", "publish")],
            true,
        )];
        assert_eq!(find_agent_for_skill(&agents, "xactions.x_post_tweet").len(), 1);
        assert_eq!(find_agent_for_skill(&agents, "xactions.x_unknown").len(), 0);
    }

    #[test]
    fn complementary_agents_exclude_shared_skills() {
        let agents = vec![entry(
            "https://a.example",
            vec![skill("xactions.x_post_tweet", "publish"), skill("xactions.x_reply", "reply")],
            true,
        )];
        let complements = find_complementary_agents(&agents, &["xactions.x_post_tweet".to_string()]);
        assert_eq!(complements[0].complement, vec!["xactions.x_reply".to_string()]);
    }
}
