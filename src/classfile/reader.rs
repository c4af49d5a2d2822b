use crate::classfile::bytecode::{decode_code, OffsetMap};
use crate::classfile::bytes::ByteReader;
use crate::classfile::errors::{ClassFileResult, MalformedInputError};
use crate::classfile::frames::read_stack_map;
use crate::classfile::model::{
    ClassAccess, ClassModel, Code, ConstantValue, ExceptionHandler, FieldAccess, FieldModel,
    LineNumber, LocalVariable, MethodAccess, MethodModel, RawAttribute,
};
use crate::classfile::pool::{Constant, ConstantPool};
use crate::classfile::{MAGIC, SUPPORTED_MAJOR_VERSIONS};

/// Parses a class file into its tree model.
pub fn decode(bytes: &[u8]) -> ClassFileResult<ClassModel> {
    let mut reader = ByteReader::new(bytes);

    let magic = reader.u32()?;
    if magic != MAGIC {
        return Err(MalformedInputError::BadMagic { found: magic });
    }
    let minor_version = reader.u16()?;
    let major_version = reader.u16()?;
    if !SUPPORTED_MAJOR_VERSIONS.contains(&major_version) {
        return Err(MalformedInputError::UnsupportedVersion {
            major: major_version,
            minor: minor_version,
        });
    }

    let pool = ConstantPool::read(&mut reader)?;
    let access = ClassAccess::from_bits_retain(reader.u16()?);
    let name = pool.class_name(reader.u16()?)?;
    let super_name = pool.optional_class_name(reader.u16()?)?;

    let interface_count = reader.u16()?;
    let interfaces = (0..interface_count)
        .map(|_| pool.class_name(reader.u16()?))
        .collect::<ClassFileResult<Vec<_>>>()?;

    let field_count = reader.u16()?;
    let fields = (0..field_count)
        .map(|_| read_field(&mut reader, &pool))
        .collect::<ClassFileResult<Vec<_>>>()?;

    let method_count = reader.u16()?;
    let methods = (0..method_count)
        .map(|_| read_method(&mut reader, &pool))
        .collect::<ClassFileResult<Vec<_>>>()?;

    let attributes = read_raw_attributes(&mut reader, &pool)?;
    reader.finish("class file")?;

    Ok(ClassModel {
        minor_version,
        major_version,
        pool,
        access,
        name,
        super_name,
        interfaces,
        fields,
        methods,
        attributes,
    })
}

/// Reads one attribute header, returning its name and body.
fn read_attribute<'a>(
    reader: &mut ByteReader<'a>,
    pool: &ConstantPool,
) -> ClassFileResult<(String, &'a [u8])> {
    let name = pool.utf8(reader.u16()?)?;
    let len = reader.u32()? as usize;
    Ok((name, reader.bytes(len)?))
}

fn read_raw_attributes(
    reader: &mut ByteReader<'_>,
    pool: &ConstantPool,
) -> ClassFileResult<Vec<RawAttribute>> {
    let count = reader.u16()?;
    (0..count)
        .map(|_| {
            read_attribute(reader, pool).map(|(name, info)| RawAttribute {
                name,
                info: info.to_vec(),
            })
        })
        .collect()
}

fn read_field(reader: &mut ByteReader<'_>, pool: &ConstantPool) -> ClassFileResult<FieldModel> {
    let access = FieldAccess::from_bits_retain(reader.u16()?);
    let name = pool.utf8(reader.u16()?)?;
    let descriptor = pool.utf8(reader.u16()?)?;

    let mut constant_value = None;
    let mut attributes = Vec::new();
    for _ in 0..reader.u16()? {
        let (attr_name, info) = read_attribute(reader, pool)?;
        if attr_name == "ConstantValue" && constant_value.is_none() {
            let mut body = ByteReader::new(info);
            constant_value = Some(read_constant_value(pool, body.u16()?)?);
            body.finish("ConstantValue")?;
        } else {
            attributes.push(RawAttribute {
                name: attr_name,
                info: info.to_vec(),
            });
        }
    }

    Ok(FieldModel {
        access,
        name,
        descriptor,
        constant_value,
        attributes,
    })
}

fn read_constant_value(pool: &ConstantPool, index: u16) -> ClassFileResult<ConstantValue> {
    let constant = pool.expect(index, "field constant", Constant::is_field_constant)?;
    Ok(match constant {
        Constant::Integer(value) => ConstantValue::Int(*value),
        Constant::Long(value) => ConstantValue::Long(*value),
        Constant::Float(bits) => ConstantValue::Float(*bits),
        Constant::Double(bits) => ConstantValue::Double(*bits),
        Constant::String(utf8) => match pool.canonical_text(*utf8)? {
            Some(text) => ConstantValue::String(text),
            None => ConstantValue::Pooled(index),
        },
        _ => unreachable!("kind checked by expect"),
    })
}

fn read_method(reader: &mut ByteReader<'_>, pool: &ConstantPool) -> ClassFileResult<MethodModel> {
    let access = MethodAccess::from_bits_retain(reader.u16()?);
    let name = pool.utf8(reader.u16()?)?;
    let descriptor = pool.utf8(reader.u16()?)?;

    let mut code = None;
    let mut attributes = Vec::new();
    for _ in 0..reader.u16()? {
        let (attr_name, info) = read_attribute(reader, pool)?;
        if attr_name == "Code" && code.is_none() {
            code = Some(read_code(info, pool)?);
        } else {
            attributes.push(RawAttribute {
                name: attr_name,
                info: info.to_vec(),
            });
        }
    }

    Ok(MethodModel {
        access,
        name,
        descriptor,
        code,
        attributes,
    })
}

fn read_code(info: &[u8], pool: &ConstantPool) -> ClassFileResult<Code> {
    let mut reader = ByteReader::new(info);
    let max_stack = reader.u16()?;
    let max_locals = reader.u16()?;
    let code_len = reader.u32()? as usize;
    let (instructions, offsets) = decode_code(reader.bytes(code_len)?, pool)?;

    let handler_count = reader.u16()?;
    let exception_table = (0..handler_count)
        .map(|_| {
            Ok(ExceptionHandler {
                start: offsets.insn_at(reader.u16()? as usize)?,
                end: offsets.position_at(reader.u16()? as usize)?,
                handler: offsets.insn_at(reader.u16()? as usize)?,
                catch_type: pool.optional_class_name(reader.u16()?)?,
            })
        })
        .collect::<ClassFileResult<Vec<_>>>()?;

    let mut code = Code {
        max_stack,
        max_locals,
        instructions,
        exception_table,
        ..Code::default()
    };

    for _ in 0..reader.u16()? {
        let (name, info) = read_attribute(&mut reader, pool)?;
        match name.as_str() {
            "LineNumberTable" => code.line_numbers.extend(read_line_numbers(info, &offsets)?),
            "LocalVariableTable" => code
                .local_variables
                .extend(read_local_variables(info, &offsets)?),
            "LocalVariableTypeTable" => code
                .local_variable_types
                .extend(read_local_variables(info, &offsets)?),
            "StackMapTable" if code.frames.is_empty() => {
                code.frames = read_stack_map(info, pool, &offsets)?;
            }
            _ => code.attributes.push(RawAttribute {
                name,
                info: info.to_vec(),
            }),
        }
    }

    reader.finish("Code")?;
    Ok(code)
}

fn read_line_numbers(info: &[u8], offsets: &OffsetMap) -> ClassFileResult<Vec<LineNumber>> {
    let mut reader = ByteReader::new(info);
    let count = reader.u16()?;
    let lines = (0..count)
        .map(|_| {
            Ok(LineNumber {
                start: offsets.insn_at(reader.u16()? as usize)?,
                line: reader.u16()?,
            })
        })
        .collect::<ClassFileResult<Vec<_>>>()?;
    reader.finish("LineNumberTable")?;
    Ok(lines)
}

fn read_local_variables(info: &[u8], offsets: &OffsetMap) -> ClassFileResult<Vec<LocalVariable>> {
    let mut reader = ByteReader::new(info);
    let count = reader.u16()?;
    let vars = (0..count)
        .map(|_| {
            let start_offset = reader.u16()? as usize;
            let length = reader.u16()? as usize;
            Ok(LocalVariable {
                start: offsets.position_at(start_offset)?,
                end: offsets.position_at(start_offset + length)?,
                name: reader.u16()?,
                descriptor: reader.u16()?,
                index: reader.u16()?,
            })
        })
        .collect::<ClassFileResult<Vec<_>>>()?;
    reader.finish("LocalVariableTable")?;
    Ok(vars)
}
