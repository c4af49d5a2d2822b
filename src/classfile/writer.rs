use crate::classfile::bytecode::{encode_code, OffsetMap};
use crate::classfile::bytes::ByteWriter;
use crate::classfile::errors::{ClassFileResult, MalformedInputError};
use crate::classfile::frames::write_stack_map;
use crate::classfile::model::{
    ClassModel, Code, ConstantValue, FieldModel, LineNumber, LocalVariable, MethodModel,
    RawAttribute,
};
use crate::classfile::pool::{Constant, PoolBuilder, PoolIndex};
use crate::classfile::MAGIC;

/// Serializes a class model.
///
/// The model's pool is copied and only appended to, so every index a raw
/// attribute carries still points at the same entry.
pub fn encode(model: &ClassModel) -> ClassFileResult<Vec<u8>> {
    let mut pool = PoolBuilder::new(&model.pool);

    // The body is staged first: interning while writing it may grow the pool,
    // which precedes it in the file.
    let mut body = ByteWriter::new();
    body.u16(model.access.bits());
    body.u16(pool.class(&model.name)?);
    match &model.super_name {
        Some(name) => body.u16(pool.class(name)?),
        None => body.u16(0),
    }
    body.count("interface", model.interfaces.len())?;
    for interface in &model.interfaces {
        body.u16(pool.class(interface)?);
    }

    body.count("field", model.fields.len())?;
    for field in &model.fields {
        write_field(&mut body, field, &mut pool)?;
    }

    body.count("method", model.methods.len())?;
    for method in &model.methods {
        write_method(&mut body, method, &mut pool)?;
    }

    write_attributes(&mut body, Vec::new(), &model.attributes, &mut pool)?;

    let pool = pool.into_pool();
    let body = body.into_inner();
    let mut out = ByteWriter::with_capacity(body.len() + 16 * pool.slot_count());
    out.u32(MAGIC);
    out.u16(model.minor_version);
    out.u16(model.major_version);
    pool.write(&mut out)?;
    out.bytes(&body);
    Ok(out.into_inner())
}

/// Writes interpreted attributes (already encoded) followed by raw ones.
fn write_attributes(
    out: &mut ByteWriter,
    encoded: Vec<(&'static str, ByteWriter)>,
    raw: &[RawAttribute],
    pool: &mut PoolBuilder,
) -> ClassFileResult<()> {
    out.count("attribute", encoded.len() + raw.len())?;
    for (name, info) in encoded {
        out.u16(pool.utf8(name)?);
        out.length_prefixed(info)?;
    }
    for attribute in raw {
        out.u16(pool.utf8(&attribute.name)?);
        let mut info = ByteWriter::with_capacity(attribute.info.len());
        info.bytes(&attribute.info);
        out.length_prefixed(info)?;
    }
    Ok(())
}

fn write_field(
    out: &mut ByteWriter,
    field: &FieldModel,
    pool: &mut PoolBuilder,
) -> ClassFileResult<()> {
    out.u16(field.access.bits());
    out.u16(pool.utf8(&field.name)?);
    out.u16(pool.utf8(&field.descriptor)?);

    let mut encoded = Vec::new();
    if let Some(value) = &field.constant_value {
        let mut info = ByteWriter::new();
        info.u16(intern_constant_value(value, pool)?);
        encoded.push(("ConstantValue", info));
    }
    write_attributes(out, encoded, &field.attributes, pool)
}

fn intern_constant_value(
    value: &ConstantValue,
    pool: &mut PoolBuilder,
) -> ClassFileResult<PoolIndex> {
    match value {
        ConstantValue::Int(value) => pool.intern(Constant::Integer(*value)),
        ConstantValue::Long(value) => pool.intern(Constant::Long(*value)),
        ConstantValue::Float(bits) => pool.intern(Constant::Float(*bits)),
        ConstantValue::Double(bits) => pool.intern(Constant::Double(*bits)),
        ConstantValue::String(text) => pool.string(text),
        ConstantValue::Pooled(index) => {
            pool.check(*index, "String", |c| matches!(c, Constant::String(_)))
        }
    }
}

fn write_method(
    out: &mut ByteWriter,
    method: &MethodModel,
    pool: &mut PoolBuilder,
) -> ClassFileResult<()> {
    out.u16(method.access.bits());
    out.u16(pool.utf8(&method.name)?);
    out.u16(pool.utf8(&method.descriptor)?);

    let mut encoded = Vec::new();
    if let Some(code) = &method.code {
        encoded.push(("Code", write_code(code, pool)?));
    }
    write_attributes(out, encoded, &method.attributes, pool)
}

fn write_code(code: &Code, pool: &mut PoolBuilder) -> ClassFileResult<ByteWriter> {
    let (bytes, offsets) = encode_code(&code.instructions, pool)?;

    let mut out = ByteWriter::with_capacity(bytes.len() + 64);
    out.u16(code.max_stack);
    out.u16(code.max_locals);
    out.u32(bytes.len() as u32);
    out.bytes(&bytes);

    out.count("exception handler", code.exception_table.len())?;
    for handler in &code.exception_table {
        out.u16(offsets.insn_offset(handler.start)? as u16);
        out.u16(offsets.position_offset(handler.end)? as u16);
        out.u16(offsets.insn_offset(handler.handler)? as u16);
        match &handler.catch_type {
            Some(class) => out.u16(pool.class(class)?),
            None => out.u16(0),
        }
    }

    let mut encoded = Vec::new();
    if !code.line_numbers.is_empty() {
        encoded.push((
            "LineNumberTable",
            write_line_numbers(&code.line_numbers, &offsets)?,
        ));
    }
    if !code.local_variables.is_empty() {
        encoded.push((
            "LocalVariableTable",
            write_local_variables(&code.local_variables, &offsets, pool)?,
        ));
    }
    if !code.local_variable_types.is_empty() {
        encoded.push((
            "LocalVariableTypeTable",
            write_local_variables(&code.local_variable_types, &offsets, pool)?,
        ));
    }
    if !code.frames.is_empty() {
        encoded.push(("StackMapTable", write_stack_map(&code.frames, pool, &offsets)?));
    }
    write_attributes(&mut out, encoded, &code.attributes, pool)?;
    Ok(out)
}

fn write_line_numbers(lines: &[LineNumber], offsets: &OffsetMap) -> ClassFileResult<ByteWriter> {
    let mut out = ByteWriter::with_capacity(2 + 4 * lines.len());
    out.count("line number", lines.len())?;
    for line in lines {
        out.u16(offsets.insn_offset(line.start)? as u16);
        out.u16(line.line);
    }
    Ok(out)
}

fn write_local_variables(
    vars: &[LocalVariable],
    offsets: &OffsetMap,
    pool: &PoolBuilder,
) -> ClassFileResult<ByteWriter> {
    let mut out = ByteWriter::with_capacity(2 + 10 * vars.len());
    out.count("local variable", vars.len())?;
    let is_utf8 = |c: &Constant| matches!(c, Constant::Utf8(_));
    for var in vars {
        let start = offsets.position_offset(var.start)?;
        let end = offsets.position_offset(var.end)?;
        if end < start {
            return Err(MalformedInputError::BadAttribute {
                attribute: "LocalVariableTable",
                reason: format!("range {}..{} is reversed", var.start, var.end),
            });
        }
        out.u16(start as u16);
        out.u16((end - start) as u16);
        out.u16(pool.check(var.name, "Utf8", is_utf8)?);
        out.u16(pool.check(var.descriptor, "Utf8", is_utf8)?);
        out.u16(var.index);
    }
    Ok(out)
}
