//! Integration tests for rule profile loading
//!
//! Tests TOML parsing, validation, and the mapping onto rule sets

use george_agent::config::{
    load_from_path, load_from_str, load_or_standard, ConfigError, RuleDefinition, RuleProfile,
    ValidationIssue,
};
use george_agent::patch::PatchRule;
use std::fs;
use tempfile::TempDir;

const STANDARD_TOML: &str = r#"
[target]
class = "com.sun.glass.ui.Application"

[[rules]]
type = "redirect-constant-loads"
method = "<init>"
field = "DEFAULT_NAME"

[[rules]]
type = "erase-body"
method = "setName"

[[rules]]
type = "inject-constant"
field = "DEFAULT_NAME"
"#;

fn issues(input: &str) -> Vec<ValidationIssue> {
    match load_from_str(input) {
        Err(ConfigError::Validation { source, .. }) => source.issues,
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[test]
fn test_toml_profile_matches_the_standard_one() {
    let profile = load_from_str(STANDARD_TOML).unwrap();
    let standard = RuleProfile::standard();

    assert_eq!(
        profile.rule_set("MyApp"),
        standard.rule_set("MyApp"),
        "rule order in the file does not matter"
    );
    assert_eq!(profile.rule_set("MyApp").target(), "com/sun/glass/ui/Application");
}

#[test]
fn test_rules_are_applied_in_fixed_order() {
    let set = load_from_str(STANDARD_TOML).unwrap().rule_set("v");
    let kinds: Vec<_> = set
        .rules()
        .iter()
        .map(|rule| match rule {
            PatchRule::InjectConstant { .. } => "inject",
            PatchRule::EraseBody { .. } => "erase",
            PatchRule::RedirectConstantLoads { .. } => "redirect",
        })
        .collect();
    assert_eq!(kinds, ["inject", "erase", "redirect"]);
}

#[test]
fn test_target_defaults_when_omitted() {
    let profile = load_from_str(
        r#"
[[rules]]
type = "erase-body"
method = "setName"
"#,
    )
    .unwrap();
    assert_eq!(profile.target.class, "com/sun/glass/ui/Application");
    assert_eq!(
        profile.rules,
        [RuleDefinition::EraseBody {
            method: "setName".into()
        }]
    );
}

#[test]
fn test_empty_profile_is_rejected() {
    assert_eq!(issues(""), [ValidationIssue::EmptyRuleList]);
}

#[test]
fn test_every_issue_is_reported_at_once() {
    let found = issues(
        r#"
[target]
class = " "

[[rules]]
type = "inject-constant"
field = ""

[[rules]]
type = "redirect-constant-loads"
method = "<init>"
field = "OTHER"
"#,
    );

    assert_eq!(found.len(), 3);
    assert!(found.contains(&ValidationIssue::MissingField {
        rule: None,
        field: "target.class",
    }));
    assert!(found.contains(&ValidationIssue::MissingField {
        rule: Some(0),
        field: "field",
    }));
    assert!(found
        .iter()
        .any(|issue| matches!(issue, ValidationIssue::InvalidCombo { rule: Some(1), .. })));
}

#[test]
fn test_unknown_rule_type_is_a_parse_error() {
    let err = load_from_str(
        r#"
[[rules]]
type = "rename-class"
to = "x"
"#,
    )
    .unwrap_err();
    assert!(matches!(err, ConfigError::Toml { path: None, .. }));
}

#[test]
fn test_errors_carry_the_file_path() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("broken.toml");
    fs::write(&file, "[[rules]]\ntype = \"erase-body\"\nmethod = \"\"\n").unwrap();

    let err = load_from_path(&file).unwrap_err();
    assert!(matches!(err, ConfigError::Validation { path: Some(ref p), .. } if p == &file));
    assert!(err.to_string().contains("rule #1 missing required field 'method'"));

    let missing = dir.path().join("absent.toml");
    assert!(matches!(
        load_from_path(&missing),
        Err(ConfigError::Io { .. })
    ));
}

#[test]
fn test_load_or_standard() {
    assert_eq!(load_or_standard(None).unwrap(), RuleProfile::standard());

    let dir = TempDir::new().unwrap();
    let file = dir.path().join("rules.toml");
    fs::write(&file, STANDARD_TOML).unwrap();
    let loaded = load_or_standard(Some(file.as_path())).unwrap();
    assert_eq!(loaded.rules.len(), 3);
}
