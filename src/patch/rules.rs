use std::fmt;

/// Class the agent patches unless a rule profile says otherwise.
pub const DEFAULT_TARGET_CLASS: &str = "com/sun/glass/ui/Application";
pub const DEFAULT_NAME_FIELD: &str = "DEFAULT_NAME";
pub const SETTER_METHOD: &str = "setName";
pub const CONSTRUCTOR: &str = "<init>";
pub const STRING_DESCRIPTOR: &str = "Ljava/lang/String;";

/// One declarative edit.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PatchRule {
    /// Set the named `String` field's constant to the configured value.
    InjectConstant { field: String },
    /// Replace every body of the named method with a bare `return`.
    EraseBody { method: String },
    /// Inside the named method, turn every `ldc` into a read of `field`.
    RedirectConstantLoads { method: String, field: String },
}

impl PatchRule {
    /// Position in the fixed application order.
    fn rank(&self) -> u8 {
        match self {
            PatchRule::InjectConstant { .. } => 0,
            PatchRule::EraseBody { .. } => 1,
            PatchRule::RedirectConstantLoads { .. } => 2,
        }
    }
}

impl fmt::Display for PatchRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatchRule::InjectConstant { field } => write!(f, "inject-constant {field}"),
            PatchRule::EraseBody { method } => write!(f, "erase-body {method}"),
            PatchRule::RedirectConstantLoads { method, field } => {
                write!(f, "redirect-constant-loads {method} -> {field}")
            }
        }
    }
}

/// The immutable rule set: which class, which value, which edits.
///
/// Rules are kept in application order (injection, erasure, redirection)
/// regardless of the order they were supplied in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleSet {
    target: String,
    value: String,
    rules: Vec<PatchRule>,
}

impl RuleSet {
    pub fn new(target: impl Into<String>, value: impl Into<String>, rules: Vec<PatchRule>) -> Self {
        let mut rules = rules;
        rules.sort_by_key(PatchRule::rank);
        Self {
            target: target.into(),
            value: value.into(),
            rules,
        }
    }

    /// The three edits against the JavaFX application class.
    pub fn standard(value: impl Into<String>) -> Self {
        Self::new(
            DEFAULT_TARGET_CLASS,
            value,
            vec![
                PatchRule::InjectConstant {
                    field: DEFAULT_NAME_FIELD.to_string(),
                },
                PatchRule::EraseBody {
                    method: SETTER_METHOD.to_string(),
                },
                PatchRule::RedirectConstantLoads {
                    method: CONSTRUCTOR.to_string(),
                    field: DEFAULT_NAME_FIELD.to_string(),
                },
            ],
        )
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn rules(&self) -> &[PatchRule] {
        &self.rules
    }
}
