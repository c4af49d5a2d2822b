pub mod engine;
pub mod filter;
pub mod rules;

pub use engine::{PatchEngine, PatchReport, RuleOutcome, RuleReport};
pub use filter::{ClassFilter, ExactNameFilter};
pub use rules::{
    PatchRule, RuleSet, CONSTRUCTOR, DEFAULT_NAME_FIELD, DEFAULT_TARGET_CLASS, SETTER_METHOD,
    STRING_DESCRIPTOR,
};
