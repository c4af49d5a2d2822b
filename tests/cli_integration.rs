//! Integration tests for the command-line interface
//!
//! Tests the patch, inspect, extract, and checksum commands

use george_agent::classfile::{decode, ConstantValue};
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

const APPLICATION: &[u8] = include_bytes!("fixtures/classes/com/sun/glass/ui/Application.class");
const PROBE: &[u8] = include_bytes!("fixtures/classes/probe/Probe.class");

fn agent() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_george-agent"));
    cmd.env_remove("APPLICATION_NAME")
        .env_remove("DEBUG")
        .env_remove("debug")
        .env("NO_COLOR", "1");
    cmd
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn default_name(path: &Path) -> Option<ConstantValue> {
    decode(&fs::read(path).unwrap())
        .unwrap()
        .field("DEFAULT_NAME")
        .unwrap()
        .constant_value
        .clone()
}

/// Lays out the target class the way an extracted jar would.
fn setup_class_tree() -> TempDir {
    let dir = TempDir::new().unwrap();
    let ui = dir.path().join("com/sun/glass/ui");
    fs::create_dir_all(&ui).unwrap();
    fs::write(ui.join("Application.class"), APPLICATION).unwrap();
    fs::create_dir_all(dir.path().join("probe")).unwrap();
    fs::write(dir.path().join("probe/Probe.class"), PROBE).unwrap();
    dir
}

#[test]
fn test_patch_file_to_output() {
    let dir = setup_class_tree();
    let input = dir.path().join("com/sun/glass/ui/Application.class");
    let output_path = dir.path().join("Patched.class");

    let output = agent()
        .arg("patch")
        .arg(&input)
        .arg("--name")
        .arg("MyApp")
        .arg("--output")
        .arg(&output_path)
        .output()
        .unwrap();

    assert!(output.status.success(), "{output:?}");
    let text = stdout(&output);
    assert!(text.contains("inject-constant DEFAULT_NAME: applied"));
    assert!(text.contains("erase-body setName: applied"));
    assert!(text.contains("3 changes written"));

    assert_eq!(
        default_name(&output_path),
        Some(ConstantValue::String("MyApp".into()))
    );
    assert_eq!(fs::read(&input).unwrap(), APPLICATION, "input left alone");
}

#[test]
fn test_patch_directory_in_place_from_env() {
    let dir = setup_class_tree();

    let output = agent()
        .env("APPLICATION_NAME", "FromEnv")
        .arg("patch")
        .arg(dir.path())
        .output()
        .unwrap();

    assert!(output.status.success(), "{output:?}");
    assert_eq!(
        default_name(&dir.path().join("com/sun/glass/ui/Application.class")),
        Some(ConstantValue::String("FromEnv".into()))
    );
    assert_eq!(fs::read(dir.path().join("probe/Probe.class")).unwrap(), PROBE);
}

#[test]
fn test_patch_twice_reports_already_applied() {
    let dir = setup_class_tree();
    let run = || {
        agent()
            .args(["patch", "--name", "MyApp"])
            .arg(dir.path())
            .output()
            .unwrap()
    };

    assert!(run().status.success());
    let target = dir.path().join("com/sun/glass/ui/Application.class");
    let after_first = fs::read(&target).unwrap();

    let second = run();
    assert!(second.status.success());
    let text = stdout(&second);
    assert!(text.contains("already applied"));
    assert!(text.contains("Nothing to change."));
    assert_eq!(fs::read(&target).unwrap(), after_first);
}

#[test]
fn test_patch_requires_a_name() {
    let dir = setup_class_tree();
    let output = agent().arg("patch").arg(dir.path()).output().unwrap();

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("No application name configured"));
}

#[test]
fn test_patch_unrelated_class_writes_nothing() {
    let dir = setup_class_tree();
    let probe = dir.path().join("probe/Probe.class");

    let output = agent()
        .args(["patch", "--name", "MyApp"])
        .arg(&probe)
        .output()
        .unwrap();

    assert!(output.status.success());
    assert!(stdout(&output).contains("not the target class"));
    assert_eq!(fs::read(&probe).unwrap(), PROBE);
}

#[test]
fn test_patch_missing_target_in_directory() {
    let dir = TempDir::new().unwrap();
    let output = agent()
        .args(["patch", "--name", "MyApp"])
        .arg(dir.path())
        .output()
        .unwrap();

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("not found"));
}

#[test]
fn test_patch_with_diff() {
    let dir = setup_class_tree();
    let output = agent()
        .args(["patch", "--name", "MyApp", "--diff"])
        .arg(dir.path())
        .output()
        .unwrap();

    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("(original)"));
    assert!(text.lines().any(|l| l.starts_with('-') && l.contains("= \"java\"")));
    assert!(text.lines().any(|l| l.starts_with('+') && l.contains("= \"MyApp\"")));
}

#[test]
fn test_patch_with_rules_file() {
    let dir = setup_class_tree();
    let rules = dir.path().join("rules.toml");
    fs::write(
        &rules,
        r#"
[[rules]]
type = "inject-constant"
field = "DEFAULT_NAME"
"#,
    )
    .unwrap();

    let output = agent()
        .args(["patch", "--name", "OnlyInject", "--rules"])
        .arg(&rules)
        .arg(dir.path())
        .output()
        .unwrap();

    assert!(output.status.success(), "{output:?}");
    let text = stdout(&output);
    assert!(text.contains("inject-constant"));
    assert!(!text.contains("erase-body"));
}

#[test]
fn test_invalid_rules_file_fails() {
    let dir = setup_class_tree();
    let rules = dir.path().join("rules.toml");
    fs::write(&rules, "rules = []\n").unwrap();

    let output = agent()
        .args(["patch", "--name", "x", "--rules"])
        .arg(&rules)
        .arg(dir.path())
        .output()
        .unwrap();

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("contains no rules"));
}

#[test]
fn test_inspect_prints_listing() {
    let dir = setup_class_tree();
    let output = agent()
        .arg("inspect")
        .arg(dir.path().join("com/sun/glass/ui/Application.class"))
        .output()
        .unwrap();

    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.starts_with("class com/sun/glass/ui/Application extends java/lang/Object"));
    assert!(text.contains("field DEFAULT_NAME Ljava/lang/String;"));
    assert!(text.contains("method setName(Ljava/lang/String;)V"));
}

#[test]
fn test_inspect_rejects_non_class() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("notes.txt");
    fs::write(&file, "hello").unwrap();

    let output = agent().arg("inspect").arg(&file).output().unwrap();
    assert!(!output.status.success());
}

#[test]
fn test_extract_and_checksum() {
    let dir = TempDir::new().unwrap();
    let jar = dir.path().join("app.jar");
    let mut zip = zip::ZipWriter::new(File::create(&jar).unwrap());
    zip.start_file("probe/Probe.class", zip::write::FileOptions::default())
        .unwrap();
    zip.write_all(PROBE).unwrap();
    zip.finish().unwrap();

    let dest = dir.path().join("out");
    let output = agent().arg("extract").arg(&jar).arg(&dest).output().unwrap();
    assert!(output.status.success(), "{output:?}");
    assert!(stdout(&output).contains("1 files"));

    let extracted = dest.join("probe/Probe.class");
    assert_eq!(fs::read(&extracted).unwrap(), PROBE);

    let output = agent().arg("checksum").arg(&extracted).output().unwrap();
    assert!(output.status.success());
    let expected = george_agent::checksum::checksum_reader(PROBE).unwrap();
    assert!(stdout(&output).starts_with(&format!("{expected:08x}")));
}
