//! Human-readable listing of a class model, used by `inspect` and `--diff`.

use crate::classfile::model::{ClassModel, Code, ConstantValue, FieldModel, MethodModel};
use std::fmt::Write;

pub fn render(model: &ClassModel) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = write_class(&mut out, model);
    out
}

fn write_class(out: &mut String, model: &ClassModel) -> std::fmt::Result {
    write!(out, "class {}", model.name)?;
    if let Some(super_name) = &model.super_name {
        write!(out, " extends {super_name}")?;
    }
    if !model.interfaces.is_empty() {
        write!(out, " implements {}", model.interfaces.join(", "))?;
    }
    writeln!(
        out,
        " [version {}.{}, flags 0x{:04x}, {} pool slots]",
        model.major_version,
        model.minor_version,
        model.access.bits(),
        model.pool.slot_count()
    )?;

    for field in &model.fields {
        write_field(out, field)?;
    }
    for method in &model.methods {
        write_method(out, method)?;
    }
    for attribute in &model.attributes {
        writeln!(out, "  attribute {} ({} bytes)", attribute.name, attribute.info.len())?;
    }
    Ok(())
}

fn write_field(out: &mut String, field: &FieldModel) -> std::fmt::Result {
    write!(
        out,
        "  field {} {} [flags 0x{:04x}]",
        field.name,
        field.descriptor,
        field.access.bits()
    )?;
    match &field.constant_value {
        Some(ConstantValue::Int(value)) => write!(out, " = {value}")?,
        Some(ConstantValue::Long(value)) => write!(out, " = {value}L")?,
        Some(ConstantValue::Float(bits)) => write!(out, " = {}f", f32::from_bits(*bits))?,
        Some(ConstantValue::Double(bits)) => write!(out, " = {}d", f64::from_bits(*bits))?,
        Some(ConstantValue::String(text)) => write!(out, " = {text:?}")?,
        Some(ConstantValue::Pooled(index)) => write!(out, " = #{index}")?,
        None => {}
    }
    writeln!(out)
}

fn write_method(out: &mut String, method: &MethodModel) -> std::fmt::Result {
    writeln!(
        out,
        "  method {}{} [flags 0x{:04x}]",
        method.name,
        method.descriptor,
        method.access.bits()
    )?;
    if let Some(code) = &method.code {
        write_code(out, code)?;
    }
    Ok(())
}

fn write_code(out: &mut String, code: &Code) -> std::fmt::Result {
    writeln!(
        out,
        "    stack {} locals {}",
        code.max_stack, code.max_locals
    )?;
    for (index, insn) in code.instructions.iter().enumerate() {
        writeln!(out, "    {index:>4}: {insn}")?;
    }
    for handler in &code.exception_table {
        writeln!(
            out,
            "    try @{}..@{} catch {} -> @{}",
            handler.start,
            handler.end,
            handler.catch_type.as_deref().unwrap_or("any"),
            handler.handler
        )?;
    }
    if !code.frames.is_empty() {
        let targets: Vec<String> = code
            .frames
            .iter()
            .map(|frame| format!("@{}", frame.target))
            .collect();
        writeln!(out, "    frames {}", targets.join(" "))?;
    }
    Ok(())
}
