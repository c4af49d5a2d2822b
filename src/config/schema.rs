use crate::patch::rules::{
    PatchRule, RuleSet, CONSTRUCTOR, DEFAULT_NAME_FIELD, DEFAULT_TARGET_CLASS, SETTER_METHOD,
};
use serde::Deserialize;
use std::fmt;

/// A rule profile: which class to patch and which edits to make.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct RuleProfile {
    #[serde(default)]
    pub target: Target,
    #[serde(default)]
    pub rules: Vec<RuleDefinition>,
}

impl Default for RuleProfile {
    fn default() -> Self {
        Self::standard()
    }
}

impl RuleProfile {
    /// The JavaFX application-name profile.
    pub fn standard() -> Self {
        Self {
            target: Target::default(),
            rules: vec![
                RuleDefinition::InjectConstant {
                    field: DEFAULT_NAME_FIELD.to_string(),
                },
                RuleDefinition::EraseBody {
                    method: SETTER_METHOD.to_string(),
                },
                RuleDefinition::RedirectConstantLoads {
                    method: CONSTRUCTOR.to_string(),
                    field: DEFAULT_NAME_FIELD.to_string(),
                },
            ],
        }
    }

    /// Builds the immutable rule set for `value`.
    pub fn rule_set(&self, value: impl Into<String>) -> RuleSet {
        RuleSet::new(
            self.target.class.replace('.', "/"),
            value,
            self.rules.iter().map(RuleDefinition::to_rule).collect(),
        )
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut issues = Vec::new();

        if self.target.class.trim().is_empty() {
            issues.push(ValidationIssue::MissingField {
                rule: None,
                field: "target.class",
            });
        }

        if self.rules.is_empty() {
            issues.push(ValidationIssue::EmptyRuleList);
        }

        for (idx, rule) in self.rules.iter().enumerate() {
            match rule {
                RuleDefinition::InjectConstant { field } => {
                    if field.trim().is_empty() {
                        issues.push(ValidationIssue::MissingField {
                            rule: Some(idx),
                            field: "field",
                        });
                    }
                }
                RuleDefinition::EraseBody { method } => {
                    if method.trim().is_empty() {
                        issues.push(ValidationIssue::MissingField {
                            rule: Some(idx),
                            field: "method",
                        });
                    }
                }
                RuleDefinition::RedirectConstantLoads { method, field } => {
                    if method.trim().is_empty() {
                        issues.push(ValidationIssue::MissingField {
                            rule: Some(idx),
                            field: "method",
                        });
                    }
                    if field.trim().is_empty() {
                        issues.push(ValidationIssue::MissingField {
                            rule: Some(idx),
                            field: "field",
                        });
                    } else if !self.injects(field) {
                        issues.push(ValidationIssue::InvalidCombo {
                            rule: Some(idx),
                            message: format!(
                                "redirect-constant-loads reads field '{field}' but no \
                                 inject-constant rule sets it"
                            ),
                        });
                    }
                }
            }
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { issues })
        }
    }

    fn injects(&self, name: &str) -> bool {
        self.rules
            .iter()
            .any(|rule| matches!(rule, RuleDefinition::InjectConstant { field } if field == name))
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct Target {
    /// Internal or dotted binary name.
    #[serde(default = "default_target_class")]
    pub class: String,
}

impl Default for Target {
    fn default() -> Self {
        Self {
            class: default_target_class(),
        }
    }
}

fn default_target_class() -> String {
    DEFAULT_TARGET_CLASS.to_string()
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum RuleDefinition {
    InjectConstant { field: String },
    EraseBody { method: String },
    RedirectConstantLoads { method: String, field: String },
}

impl RuleDefinition {
    pub fn to_rule(&self) -> PatchRule {
        match self {
            RuleDefinition::InjectConstant { field } => PatchRule::InjectConstant {
                field: field.clone(),
            },
            RuleDefinition::EraseBody { method } => PatchRule::EraseBody {
                method: method.clone(),
            },
            RuleDefinition::RedirectConstantLoads { method, field } => {
                PatchRule::RedirectConstantLoads {
                    method: method.clone(),
                    field: field.clone(),
                }
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, issue) in self.issues.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    EmptyRuleList,
    MissingField {
        rule: Option<usize>,
        field: &'static str,
    },
    InvalidCombo {
        rule: Option<usize>,
        message: String,
    },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::EmptyRuleList => write!(f, "rule profile contains no rules"),
            ValidationIssue::MissingField { rule, field } => match rule {
                Some(idx) => write!(f, "rule #{} missing required field '{field}'", idx + 1),
                None => write!(f, "rule profile missing required field '{field}'"),
            },
            ValidationIssue::InvalidCombo { rule, message } => match rule {
                Some(idx) => write!(f, "rule #{} has invalid configuration: {message}", idx + 1),
                None => write!(f, "invalid rule profile: {message}"),
            },
        }
    }
}
