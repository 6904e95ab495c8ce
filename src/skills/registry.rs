//! Projects the tool catalog into A2A skills and answers
//! search/category queries.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::skills::catalog::{infer_category, infer_platforms, ToolCatalogSource, ToolDescriptor};

/// An A2A skill.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Skill {
    pub id: String,
    pub name: String,
    pub description: String,
    pub tags: Vec<String>,
    pub input_schema: serde_json::Value,
    pub output_schema: serde_json::Value,
}

/// Converts a raw tool descriptor into an A2A skill.
///
/// The id is namespaced with `xactions.`; the display name is derived by
/// title-casing the tokens of the tool name after a leading `x_` prefix;
/// tags combine name tokens, inferred category, and inferred platforms.
pub fn convert_tool_to_skill(tool: &ToolDescriptor) -> Skill {
    let id = format!("xactions.{}", tool.name);
    let stripped = tool.name.strip_prefix("x_").unwrap_or(&tool.name);
    let tokens: Vec<&str> = stripped.split('_').filter(|t| !t.is_empty()).collect();
    let name = tokens
        .iter()
        .map(|t| title_case(t))
        .collect::<Vec<_>>()
        .join(" ");

    let category = infer_category(&tool.name);
    let platforms = infer_platforms(&tool.description, &tool.input_schema);

    let mut tags: Vec<String> = tokens.iter().map(|t| t.to_string()).collect();
    tags.push(category.to_string());
    tags.extend(platforms.iter().map(|p| p.to_string()));
    tags.dedup();

    Skill {
        id,
        name,
        description: tool.description.clone(),
        tags,
        input_schema: tool.input_schema.clone(),
        output_schema: tool.output_schema.clone(),
    }
}

fn title_case(token: &str) -> String {
    let mut chars = token.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// The canonical skill catalog. Rebuildable from its
/// [`ToolCatalogSource`] via [`SkillRegistry::refresh_skills`].
pub struct SkillRegistry {
    source: Arc<dyn ToolCatalogSource>,
    skills: RwLock<Vec<Skill>>,
}

impl SkillRegistry {
    pub fn new(source: Arc<dyn ToolCatalogSource>) -> Self {
        let skills = source.load_tools().iter().map(convert_tool_to_skill).collect();
        Self {
            source,
            skills: RwLock::new(skills),
        }
    }

    pub fn refresh_skills(&self) -> usize {
        let skills: Vec<Skill> = self.source.load_tools().iter().map(convert_tool_to_skill).collect();
        let count = skills.len();
        *self.skills.write().unwrap() = skills;
        count
    }

    pub fn get_all_skills(&self) -> Vec<Skill> {
        self.skills.read().unwrap().clone()
    }

    pub fn get_skill_by_id(&self, id: &str) -> Option<Skill> {
        self.skills.read().unwrap().iter().find(|s| s.id == id).cloned()
    }

    pub fn get_skill_categories(&self) -> HashMap<String, Vec<Skill>> {
        let mut by_category: HashMap<String, Vec<Skill>> = HashMap::new();
        for skill in self.skills.read().unwrap().iter() {
            let category = skill
                .tags
                .iter()
                .find(|t| {
                    matches!(
                        t.as_str(),
                        "scraping" | "posting" | "social" | "analytics" | "other"
                    )
                })
                .cloned()
                .unwrap_or_else(|| "other".to_string());
            by_category.entry(category).or_default().push(skill.clone());
        }
        by_category
    }

    /// Case-insensitive substring match on id/name/description, OR-matched
    /// against tags. Empty query and empty tags yields everything.
    pub fn search_skills(&self, query: &str, tags: &[String]) -> Vec<Skill> {
        let query_lower = query.to_lowercase();
        let tags_lower: Vec<String> = tags.iter().map(|t| t.to_lowercase()).collect();

        self.skills
            .read()
            .unwrap()
            .iter()
            .filter(|skill| {
                let text_match = query_lower.is_empty()
                    || skill.id.to_lowercase().contains(&query_lower)
                    || skill.name.to_lowercase().contains(&query_lower)
                    || skill.description.to_lowercase().contains(&query_lower);

                let tag_match = tags_lower.is_empty()
                    || skill
                        .tags
                        .iter()
                        .any(|t| tags_lower.contains(&t.to_lowercase()));

                text_match && tag_match
            })
            .cloned()
            .collect()
    }
}
