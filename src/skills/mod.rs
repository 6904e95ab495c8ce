//! Skill registry: converts the tool catalog into A2A-shaped skills.

pub mod catalog;
pub mod registry;

pub use catalog::{StaticCatalog, ToolCatalogSource, ToolDescriptor};
pub use registry::{convert_tool_to_skill, Skill, SkillRegistry};
