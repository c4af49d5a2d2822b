pub mod env;
pub mod loader;
pub mod schema;

pub use env::AgentConfig;
pub use loader::{load_from_path, load_from_str, load_or_standard, ConfigError};
pub use schema::{RuleDefinition, RuleProfile, Target, ValidationError, ValidationIssue};
