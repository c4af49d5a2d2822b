//! Integration tests for the patch engine on a javac-built target class

use george_agent::classfile::{decode, encode, ConstantValue, Instruction, MemberRef, Opcode};
use george_agent::patch::{PatchEngine, RuleOutcome, RuleSet, STRING_DESCRIPTOR};

const APPLICATION: &[u8] = include_bytes!("fixtures/classes/com/sun/glass/ui/Application.class");
const SHAPES: &[u8] = include_bytes!("fixtures/classes/probe/Shapes.class");
const CLASS: &str = "com/sun/glass/ui/Application";

fn engine(value: &str) -> PatchEngine {
    PatchEngine::new(RuleSet::standard(value))
}

fn default_name_load() -> Instruction {
    Instruction::get_static(MemberRef::new(CLASS, "DEFAULT_NAME", STRING_DESCRIPTOR))
}

#[test]
fn test_patch_bytes_applies_every_rule() {
    let (bytes, report) = engine("MyApp").patch_bytes(APPLICATION).unwrap();
    assert_eq!(report.class, CLASS);
    assert!(report.changed());
    assert!(report
        .rules
        .iter()
        .all(|rule| matches!(rule.outcome, RuleOutcome::Applied { .. })));
    // DEFAULT_NAME, setName, and the single ldc in <init>.
    assert_eq!(report.total_changes(), 3);

    let patched = decode(&bytes).unwrap();
    assert_eq!(
        patched.field("DEFAULT_NAME").unwrap().constant_value,
        Some(ConstantValue::String("MyApp".into()))
    );

    let setter = patched.methods_named("setName").next().unwrap();
    let code = setter.code.as_ref().unwrap();
    assert_eq!(code.instructions, [Instruction::Simple(Opcode::Return)]);
    assert!(code.exception_table.is_empty());
    assert!(code.line_numbers.is_empty());
    assert!(code.local_variables.is_empty());
    assert!(code.frames.is_empty());
}

#[test]
fn test_constructor_substitution_keeps_positions() {
    let original = decode(APPLICATION).unwrap();
    let (bytes, _) = engine("MyApp").patch_bytes(APPLICATION).unwrap();
    let patched = decode(&bytes).unwrap();

    let before = original.methods_named("<init>").next().unwrap();
    let after = patched.methods_named("<init>").next().unwrap();
    let (before, after) = (before.code.as_ref().unwrap(), after.code.as_ref().unwrap());

    assert_eq!(before.instructions.len(), after.instructions.len());
    assert_eq!(after.instructions[3], default_name_load());
    for (index, (old, new)) in before.instructions.iter().zip(&after.instructions).enumerate() {
        if index != 3 {
            assert_eq!(old, new, "instruction {index} changed");
        }
    }

    // getstatic is one byte longer than ldc; frames and tables follow.
    assert_eq!(after.frames, before.frames);
    assert_eq!(after.line_numbers, before.line_numbers);
    assert_eq!(after.local_variables, before.local_variables);
}

#[test]
fn test_other_methods_are_untouched() {
    let original = decode(APPLICATION).unwrap();
    let (bytes, _) = engine("MyApp").patch_bytes(APPLICATION).unwrap();
    let patched = decode(&bytes).unwrap();

    for name in ["getApplication", "getName", "getLaunches"] {
        let before = original.methods_named(name).next().unwrap();
        let after = patched.methods_named(name).next().unwrap();
        assert_eq!(before.code, after.code, "{name}");
    }
    assert_eq!(original.fields.len(), patched.fields.len());
    assert_eq!(original.methods.len(), patched.methods.len());
}

#[test]
fn test_repatching_is_idempotent() {
    let engine = engine("MyApp");
    let (once, _) = engine.patch_bytes(APPLICATION).unwrap();
    let (twice, report) = engine.patch_bytes(&once).unwrap();

    assert!(!report.changed());
    assert!(report
        .rules
        .iter()
        .all(|rule| rule.outcome == RuleOutcome::AlreadyApplied));
    assert_eq!(decode(&twice).unwrap(), decode(&once).unwrap());
}

#[test]
fn test_second_value_replaces_the_first() {
    let (first, _) = engine("One").patch_bytes(APPLICATION).unwrap();
    let (second, report) = engine("Two").patch_bytes(&first).unwrap();

    assert_eq!(report.rules[0].outcome, RuleOutcome::Applied { changes: 1 });
    assert_eq!(
        decode(&second).unwrap().field("DEFAULT_NAME").unwrap().constant_value,
        Some(ConstantValue::String("Two".into()))
    );
}

#[test]
fn test_class_without_targets_is_unchanged() {
    let mut model = decode(SHAPES).unwrap();
    let before = model.clone();
    let report = engine("MyApp").apply(&mut model);

    assert!(!report.changed());
    assert!(report
        .rules
        .iter()
        .all(|rule| matches!(rule.outcome, RuleOutcome::Skipped { .. })));
    assert_eq!(model, before);
    assert_eq!(encode(&model).unwrap(), encode(&before).unwrap());
}
