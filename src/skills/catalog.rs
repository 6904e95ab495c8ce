//! The injected tool-catalog source and category/platform inference.
//!
//! Tools are exposed through an injected [`ToolCatalogSource`] trait
//! object rather than a hardcoded list, so the registry stays
//! deterministic and testable and a future plugin system can supply
//! tools without the core depending on it.

use serde::{Deserialize, Serialize};
use serde_json::json;

/// A raw tool descriptor as it would be reported by the downstream MCP
/// tool-server (out of scope; seeded here as a static default catalog,
/// grounded in the base crate's `ToolMetadata`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
    pub output_schema: serde_json::Value,
}

/// Injected catalog loader.
pub trait ToolCatalogSource: Send + Sync {
    fn load_tools(&self) -> Vec<ToolDescriptor>;
}

/// The base catalog of X/Twitter-automation tools this agent advertises.
pub struct StaticCatalog;

impl ToolCatalogSource for StaticCatalog {
    fn load_tools(&self) -> Vec<ToolDescriptor> {
        vec![
            tool(
                "x_get_profile",
                "Fetch a user's public profile information.",
                json!({"type": "object", "properties": {"username": {"type": "string"}}, "required": ["username"]}),
            ),
            tool(
                "x_get_tweets",
                "Fetch recent tweets from a user's timeline.",
                json!({"type": "object", "properties": {"username": {"type": "string"}, "limit": {"type": "integer"}}}),
            ),
            tool(
                "x_scrape_followers",
                "Scrape the follower list of a given account.",
                json!({"type": "object", "properties": {"username": {"type": "string"}}}),
            ),
            tool(
                "x_post_tweet",
                "Publish a new tweet to the authenticated account's timeline.",
                json!({"type": "object", "properties": {"text": {"type": "string"}}, "required": ["text"]}),
            ),
            tool(
                "x_reply",
                "Reply to an existing tweet.",
                json!({"type": "object", "properties": {"tweet_id": {"type": "string"}, "text": {"type": "string"}}}),
            ),
            tool(
                "x_retweet",
                "Retweet an existing tweet.",
                json!({"type": "object", "properties": {"tweet_id": {"type": "string"}}}),
            ),
            tool(
                "x_follow_user",
                "Follow a user account.",
                json!({"type": "object", "properties": {"username": {"type": "string"}}}),
            ),
            tool(
                "x_analytics_summary",
                "Summarize engagement analytics for an account, also available on bluesky and mastodon.",
                json!({"type": "object", "properties": {"username": {"type": "string"}, "platform": {"type": "string"}}}),
            ),
            tool(
                "x_compare_profiles",
                "Compare two profiles' follower counts and engagement.",
                json!({"type": "object", "properties": {"a": {"type": "string"}, "b": {"type": "string"}}}),
            ),
        ]
    }
}

fn tool(name: &str, description: &str, input_schema: serde_json::Value) -> ToolDescriptor {
    ToolDescriptor {
        name: name.to_string(),
        description: description.to_string(),
        input_schema,
        output_schema: json!({"type": "object"}),
    }
}

/// Name-pattern based category inference. The first matching category
/// wins; unmatched tools fall into `other`.
pub fn infer_category(tool_name: &str) -> &'static str {
    const RULES: &[(&str, &[&str])] = &[
        ("scraping", &["x_get_", "x_scrape_"]),
        ("posting", &["x_post_", "x_reply", "x_retweet"]),
        ("social", &["x_follow_", "x_like_", "x_unfollow_"]),
        ("analytics", &["x_analytics_", "x_compare_"]),
    ];
    for (category, prefixes) in RULES {
        if prefixes.iter().any(|p| tool_name.starts_with(p)) {
            return category;
        }
    }
    "other"
}

/// Platform inference: `twitter` is always advertised; other platforms
/// are appended when the description or input schema mentions them.
pub fn infer_platforms(description: &str, input_schema: &serde_json::Value) -> Vec<&'static str> {
    const CANDIDATES: &[&str] = &["bluesky", "mastodon", "threads"];
    let haystack = format!("{description} {input_schema}").to_lowercase();
    let mut platforms = vec!["twitter"];
    for candidate in CANDIDATES {
        if haystack.contains(candidate) {
            platforms.push(candidate);
        }
    }
    platforms
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_inference_matches_known_prefixes() {
        assert_eq!(infer_category("x_get_profile"), "scraping");
        assert_eq!(infer_category("x_post_tweet"), "posting");
        assert_eq!(infer_category("x_follow_user"), "social");
        assert_eq!(infer_category("x_analytics_summary"), "analytics");
        assert_eq!(infer_category("x_unrelated_thing"), "other");
    }

    #[test]
    fn platform_inference_always_includes_primary() {
        let platforms = infer_platforms("simple tool", &json!({}));
        assert_eq!(platforms, vec!["twitter"]);
    }

    #[test]
    fn platform_inference_detects_secondary_platforms() {
        let platforms = infer_platforms("also works on bluesky and mastodon", &json!({}));
        assert!(platforms.contains(&"bluesky"));
        assert!(platforms.contains(&"mastodon"));
        assert!(!platforms.contains(&"threads"));
    }
}
