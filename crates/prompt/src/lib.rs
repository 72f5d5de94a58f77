//! Prompt system for SENSAI.
//!
//! - YAML prompt definitions, built in or overridden per workspace
//! - Handlebars rendering of system and user messages

pub mod builder;
pub mod loader;
pub mod types;

pub use builder::build_prompt;
pub use loader::{list_prompts, load_prompt, ANSWER_PROMPT_ID, KEY_POINTS_PROMPT_ID};
pub use types::{BuiltPrompt, BuiltPromptMetadata, PromptDefinition, PromptOutputSpec};
