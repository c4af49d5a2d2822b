//! Applies a [`RuleSet`] to a decoded class.
//!
//! Every rule is a total function over the model. A missing field or method
//! is recorded as skipped, never raised.

use crate::classfile::{
    self, ClassFileResult, ClassModel, ConstantValue, Instruction, MemberRef, Opcode,
};
use crate::patch::rules::{PatchRule, RuleSet, STRING_DESCRIPTOR};
use std::fmt;
use tracing::debug;

/// Code attributes whose contents carry bytecode offsets the codec does not
/// interpret. They are dropped once the layout of a method changes.
const OFFSET_BEARING_ATTRIBUTES: &[&str] = &[
    "RuntimeVisibleTypeAnnotations",
    "RuntimeInvisibleTypeAnnotations",
];

/// Result of applying one rule.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "RuleOutcome should be checked to see whether the class changed"]
pub enum RuleOutcome {
    /// The model was edited in `changes` places.
    Applied { changes: usize },
    /// The model already has the rule's effect.
    AlreadyApplied,
    /// The rule's target is absent or has an unexpected shape.
    Skipped { reason: String },
}

impl fmt::Display for RuleOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleOutcome::Applied { changes: 1 } => write!(f, "applied (1 change)"),
            RuleOutcome::Applied { changes } => write!(f, "applied ({changes} changes)"),
            RuleOutcome::AlreadyApplied => write!(f, "already applied"),
            RuleOutcome::Skipped { reason } => write!(f, "skipped: {reason}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleReport {
    pub rule: PatchRule,
    pub outcome: RuleOutcome,
}

/// What the engine did to one class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchReport {
    pub class: String,
    pub rules: Vec<RuleReport>,
}

impl PatchReport {
    /// True when at least one rule edited the model.
    pub fn changed(&self) -> bool {
        self.rules
            .iter()
            .any(|report| matches!(report.outcome, RuleOutcome::Applied { .. }))
    }

    pub fn total_changes(&self) -> usize {
        self.rules
            .iter()
            .map(|report| match report.outcome {
                RuleOutcome::Applied { changes } => changes,
                _ => 0,
            })
            .sum()
    }
}

#[derive(Debug, Clone)]
pub struct PatchEngine {
    rules: RuleSet,
}

impl PatchEngine {
    pub fn new(rules: RuleSet) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Applies every rule in order, editing `model` in place.
    pub fn apply(&self, model: &mut ClassModel) -> PatchReport {
        let rules = self
            .rules
            .rules()
            .iter()
            .map(|rule| RuleReport {
                rule: rule.clone(),
                outcome: self.apply_rule(rule, model),
            })
            .collect();
        PatchReport {
            class: model.name.clone(),
            rules,
        }
    }

    /// Consuming variant of [`PatchEngine::apply`].
    pub fn patched(&self, mut model: ClassModel) -> ClassModel {
        let _ = self.apply(&mut model);
        model
    }

    /// Decodes, patches, and re-encodes one class file.
    pub fn patch_bytes(&self, original: &[u8]) -> ClassFileResult<(Vec<u8>, PatchReport)> {
        let mut model = classfile::decode(original)?;
        let report = self.apply(&mut model);
        let bytes = classfile::encode(&model)?;
        Ok((bytes, report))
    }

    fn apply_rule(&self, rule: &PatchRule, model: &mut ClassModel) -> RuleOutcome {
        match rule {
            PatchRule::InjectConstant { field } => inject_constant(model, field, self.rules.value()),
            PatchRule::EraseBody { method } => erase_body(model, method),
            PatchRule::RedirectConstantLoads { method, field } => {
                redirect_constant_loads(model, method, field)
            }
        }
    }
}

fn skipped(reason: impl Into<String>) -> RuleOutcome {
    RuleOutcome::Skipped {
        reason: reason.into(),
    }
}

fn inject_constant(model: &mut ClassModel, name: &str, value: &str) -> RuleOutcome {
    let Some(field) = model.field_mut(name) else {
        return skipped(format!("field {name} not present"));
    };
    if field.descriptor != STRING_DESCRIPTOR {
        return skipped(format!(
            "field {name} has descriptor {}, not a String",
            field.descriptor
        ));
    }
    match &field.constant_value {
        Some(ConstantValue::String(current)) if current == value => {
            return RuleOutcome::AlreadyApplied
        }
        Some(ConstantValue::String(_)) | Some(ConstantValue::Pooled(_)) | None => {}
        Some(other) => {
            return skipped(format!("field {name} holds a non-string constant {other:?}"));
        }
    }

    debug!(field = name, value, "setting field constant");
    field.constant_value = Some(ConstantValue::String(value.to_string()));
    RuleOutcome::Applied { changes: 1 }
}

fn erase_body(model: &mut ClassModel, name: &str) -> RuleOutcome {
    let mut found = false;
    let mut erased = 0;
    let mut already = 0;

    for method in model.methods_named_mut(name) {
        found = true;
        let descriptor = method.descriptor.clone();
        let Some(code) = method.code.as_mut() else {
            continue;
        };
        let bare = code.instructions == [Instruction::Simple(Opcode::Return)]
            && code.exception_table.is_empty()
            && code.line_numbers.is_empty()
            && code.local_variables.is_empty()
            && code.local_variable_types.is_empty()
            && code.frames.is_empty()
            && code.attributes.is_empty();
        if bare {
            already += 1;
            continue;
        }
        debug!(
            method = name,
            descriptor = descriptor.as_str(),
            removed = code.instructions.len(),
            "erasing method body"
        );
        code.replace_body(vec![Instruction::Simple(Opcode::Return)]);
        erased += 1;
    }

    match (found, erased, already) {
        (false, _, _) => skipped(format!("method {name} not present")),
        (true, 0, 0) => skipped(format!("method {name} has no body")),
        (true, 0, _) => RuleOutcome::AlreadyApplied,
        (true, changes, _) => RuleOutcome::Applied { changes },
    }
}

fn redirect_constant_loads(model: &mut ClassModel, method_name: &str, field: &str) -> RuleOutcome {
    match model.field(field) {
        Some(target) if target.descriptor == STRING_DESCRIPTOR => {}
        Some(target) => {
            return skipped(format!(
                "field {field} has descriptor {}, not a String",
                target.descriptor
            ))
        }
        None => return skipped(format!("field {field} not present")),
    }

    let field_ref = MemberRef::new(model.name.clone(), field, STRING_DESCRIPTOR);
    let replacement = Instruction::get_static(field_ref);
    let mut found = false;
    let mut replaced = 0;
    let mut already = false;

    for method in model.methods_named_mut(method_name) {
        found = true;
        let Some(code) = method.code.as_mut() else {
            continue;
        };
        already |= code.instructions.contains(&replacement);

        let before = replaced;
        code.instructions = std::mem::take(&mut code.instructions)
            .into_iter()
            .enumerate()
            .map(|(index, insn)| {
                if insn.is_constant_load() {
                    debug!(index, replaced = %insn, with = %replacement, "substituting instruction");
                    replaced += 1;
                    replacement.clone()
                } else {
                    insn
                }
            })
            .collect();

        if replaced > before {
            code.attributes.retain(|attribute| {
                let keep = !OFFSET_BEARING_ATTRIBUTES.contains(&attribute.name.as_str());
                if !keep {
                    debug!(attribute = attribute.name.as_str(), "dropping offset-bearing code attribute");
                }
                keep
            });
        }
    }

    match (found, replaced, already) {
        (false, _, _) => skipped(format!("method {method_name} not present")),
        (true, 0, true) => RuleOutcome::AlreadyApplied,
        (true, 0, false) => skipped(format!("method {method_name} loads no constants")),
        (true, changes, _) => RuleOutcome::Applied { changes },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classfile::{
        ClassAccess, Code, ConstantPool, FieldAccess, FieldModel, Loadable, MethodAccess,
        MethodModel, RawAttribute,
    };

    const CLASS: &str = "com/sun/glass/ui/Application";

    fn ldc(text: &str) -> Instruction {
        Instruction::Constant {
            opcode: Opcode::Ldc,
            value: Loadable::String(text.into()),
        }
    }

    fn method(name: &str, instructions: Vec<Instruction>) -> MethodModel {
        MethodModel {
            access: MethodAccess::PUBLIC,
            name: name.into(),
            descriptor: "()V".into(),
            code: Some(Code {
                max_stack: 2,
                max_locals: 2,
                instructions,
                ..Code::default()
            }),
            attributes: Vec::new(),
        }
    }

    fn string_field(name: &str, value: &str) -> FieldModel {
        FieldModel {
            access: FieldAccess::PUBLIC | FieldAccess::STATIC | FieldAccess::FINAL,
            name: name.into(),
            descriptor: STRING_DESCRIPTOR.into(),
            constant_value: Some(ConstantValue::String(value.into())),
            attributes: Vec::new(),
        }
    }

    fn model(fields: Vec<FieldModel>, methods: Vec<MethodModel>) -> ClassModel {
        ClassModel {
            minor_version: 0,
            major_version: 55,
            pool: ConstantPool::new(),
            access: ClassAccess::PUBLIC | ClassAccess::SUPER,
            name: CLASS.into(),
            super_name: Some("java/lang/Object".into()),
            interfaces: Vec::new(),
            fields,
            methods,
            attributes: Vec::new(),
        }
    }

    fn javafx_like() -> ClassModel {
        model(
            vec![string_field("DEFAULT_NAME", "Foo")],
            vec![
                method(
                    "<init>",
                    vec![
                        Instruction::Local {
                            opcode: Opcode::Aload,
                            index: 0,
                        },
                        ldc("Foo"),
                        ldc("x"),
                        Instruction::Simple(Opcode::Pop),
                        Instruction::Simple(Opcode::Return),
                    ],
                ),
                method(
                    "setName",
                    vec![
                        Instruction::Simple(Opcode::Aload0),
                        Instruction::Simple(Opcode::Aload1),
                        Instruction::Field {
                            opcode: Opcode::Putfield,
                            field: MemberRef::new(CLASS, "name", STRING_DESCRIPTOR),
                        },
                        Instruction::Simple(Opcode::Return),
                    ],
                ),
            ],
        )
    }

    fn engine() -> PatchEngine {
        PatchEngine::new(RuleSet::standard("Bar"))
    }

    #[test]
    fn injects_the_configured_value() {
        let patched = engine().patched(javafx_like());
        assert_eq!(
            patched.field("DEFAULT_NAME").unwrap().constant_value,
            Some(ConstantValue::String("Bar".into()))
        );
    }

    #[test]
    fn non_string_field_is_left_alone() {
        let mut class = javafx_like();
        let field = &mut class.fields[0];
        field.descriptor = "I".into();
        field.constant_value = Some(ConstantValue::Int(3));
        let report = engine().apply(&mut class);
        assert!(matches!(
            report.rules[0].outcome,
            RuleOutcome::Skipped { .. }
        ));
        assert_eq!(class.fields[0].constant_value, Some(ConstantValue::Int(3)));
    }

    #[test]
    fn setter_body_becomes_a_bare_return() {
        let patched = engine().patched(javafx_like());
        let setter = patched.methods_named("setName").next().unwrap();
        assert_eq!(
            setter.instructions(),
            &[Instruction::Simple(Opcode::Return)]
        );
    }

    #[test]
    fn constructor_loads_are_redirected_in_place() {
        let original = javafx_like();
        let patched = engine().patched(original.clone());
        let before = original.methods_named("<init>").next().unwrap().instructions();
        let after = patched.methods_named("<init>").next().unwrap().instructions();
        let expected = Instruction::get_static(MemberRef::new(
            CLASS,
            "DEFAULT_NAME",
            STRING_DESCRIPTOR,
        ));

        assert_eq!(before.len(), after.len());
        for (old, new) in before.iter().zip(after) {
            if old.is_constant_load() {
                assert_eq!(new, &expected);
            } else {
                assert_eq!(new, old);
            }
        }
    }

    #[test]
    fn second_application_changes_nothing() {
        let engine = engine();
        let once = engine.patched(javafx_like());
        let mut twice = once.clone();
        let report = engine.apply(&mut twice);
        assert_eq!(twice, once);
        assert!(!report.changed());
        assert!(report
            .rules
            .iter()
            .all(|r| r.outcome == RuleOutcome::AlreadyApplied));
    }

    #[test]
    fn missing_targets_leave_the_model_untouched() {
        let original = model(
            Vec::new(),
            vec![method("<init>", vec![ldc("java"), Instruction::Simple(Opcode::Return)])],
        );
        let mut class = original.clone();
        let report = engine().apply(&mut class);
        assert_eq!(class, original);
        assert!(report
            .rules
            .iter()
            .all(|r| matches!(r.outcome, RuleOutcome::Skipped { .. })));
    }

    #[test]
    fn abstract_setter_is_skipped() {
        let mut class = javafx_like();
        class.methods[1].code = None;
        let report = engine().apply(&mut class);
        assert_eq!(
            report.rules[1].outcome,
            RuleOutcome::Skipped {
                reason: "method setName has no body".into()
            }
        );
    }

    #[test]
    fn type_annotations_are_dropped_when_loads_are_redirected() {
        let mut class = javafx_like();
        if let Some(code) = class.methods[0].code.as_mut() {
            code.attributes.push(RawAttribute {
                name: "RuntimeInvisibleTypeAnnotations".into(),
                info: vec![0, 0],
            });
            code.attributes.push(RawAttribute {
                name: "Custom".into(),
                info: vec![1],
            });
        }
        let patched = engine().patched(class);
        let names: Vec<&str> = patched.methods[0]
            .code
            .as_ref()
            .unwrap()
            .attributes
            .iter()
            .map(|a| a.name.as_str())
            .collect();
        assert_eq!(names, vec!["Custom"]);
    }

    #[test]
    fn report_counts_changes() {
        let mut class = javafx_like();
        let report = engine().apply(&mut class);
        assert_eq!(report.class, CLASS);
        assert!(report.changed());
        // One field, one setter, two constant loads.
        assert_eq!(report.total_changes(), 4);
    }
}
