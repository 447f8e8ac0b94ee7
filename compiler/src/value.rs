use serde::Serialize;
use sigil_wire::{WireReader, WireWriter};

use crate::error::SchemaError;
use crate::types::{ConstValue, DefId, DefKind, Registry};
use crate::utils::quote;

/// A dynamic value shaped by some definition in a [`Registry`]. Struct
/// entries are kept in field order; absent optional fields are simply
/// omitted from the entry list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Value {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    Array(Vec<Value>),
    Struct(Vec<(String, Value)>),
    Union {
        discr: i64,
        value: Option<Box<Value>>,
    },
}

fn truncated() -> SchemaError {
    SchemaError::Decode("unexpected end of input".to_string())
}

fn mismatch(def_name: &str, value: &Value) -> SchemaError {
    SchemaError::Encode(format!(
        "value {:?} does not fit type {}",
        value,
        quote(def_name)
    ))
}

/// Serialize `value` as the type `def` into `writer`. Aliases are resolved
/// first, so an alias encodes exactly as its base type.
pub fn encode(
    registry: &Registry,
    def: DefId,
    value: &Value,
    writer: &mut WireWriter,
) -> Result<(), SchemaError> {
    let def = registry.resolve(def);
    let definition = registry.get(def);

    match (&definition.kind, value) {
        (DefKind::Int { size, signed }, Value::Int(v)) => {
            check_int_range(&definition.name, *v, *size, *signed)?;
            match (*signed, *size) {
                (true, 1) => writer.write_i8(*v as i8),
                (true, 2) => writer.write_i16(*v as i16),
                (true, 4) => writer.write_i32(*v as i32),
                (true, 8) => writer.write_i64(*v),
                (false, 1) => writer.write_u8(*v as u8),
                (false, 2) => writer.write_u16(*v as u16),
                (false, 4) => writer.write_u32(*v as u32),
                (false, 8) => writer.write_u64(*v as u64),
                _ => unreachable!("builtin integer sizes are 1, 2, 4 and 8"),
            }
            Ok(())
        }
        (DefKind::Float { size: 4 }, Value::Float(v)) => {
            writer.write_f32(*v as f32);
            Ok(())
        }
        (DefKind::Float { .. }, Value::Float(v)) => {
            writer.write_f64(*v);
            Ok(())
        }
        (DefKind::Bool, Value::Bool(v)) => {
            writer.write_bool(*v);
            Ok(())
        }
        (DefKind::AString, Value::Str(s)) => {
            writer.write_astring(s);
            Ok(())
        }
        (DefKind::WString, Value::Str(s)) => {
            writer.write_wstring(s);
            Ok(())
        }
        (DefKind::Enum { width, .. }, Value::Int(v)) => {
            let limit = 1i64 << (8 * width);
            if *v < 0 || *v >= limit {
                return Err(SchemaError::Encode(format!(
                    "{} does not fit enum {}",
                    v,
                    quote(&definition.name)
                )));
            }
            writer.write_uint(*v as u32, *width);
            Ok(())
        }
        (DefKind::Array { item, .. }, Value::Array(elements)) => {
            writer.write_u32(elements.len() as u32);
            for element in elements {
                encode(registry, *item, element, writer)?;
            }
            Ok(())
        }
        (DefKind::Struct { fields }, Value::Struct(entries)) => {
            for field in fields {
                let entry = entries
                    .iter()
                    .find(|(name, _)| name == &field.name)
                    .map(|(_, v)| v);
                match (field.optional, entry) {
                    (true, Some(v)) => {
                        writer.write_bool(true);
                        encode(registry, field.def, v, writer)?;
                    }
                    (true, None) => writer.write_bool(false),
                    (false, Some(v)) => encode(registry, field.def, v, writer)?,
                    (false, None) => {
                        return Err(SchemaError::Encode(format!(
                            "missing field {} of struct {}",
                            quote(&field.name),
                            quote(&definition.name)
                        )));
                    }
                }
            }
            Ok(())
        }
        (DefKind::Union { discr, arms, .. }, Value::Union { discr: d, value }) => {
            encode(registry, *discr, &Value::Int(*d), writer)?;
            let arm = arms
                .iter()
                .find(|arm| arm_number(registry, *discr, &arm.value) == Some(*d))
                .ok_or_else(|| {
                    SchemaError::Encode(format!(
                        "{} is not a discriminator of union {}",
                        d,
                        quote(&definition.name)
                    ))
                })?;
            match (&arm.name, value) {
                (Some(_), Some(payload)) => encode(registry, arm.def, payload, writer),
                (None, None) => Ok(()),
                (Some(name), None) => Err(SchemaError::Encode(format!(
                    "missing payload {} of union {}",
                    quote(name),
                    quote(&definition.name)
                ))),
                (None, Some(_)) => Err(SchemaError::Encode(format!(
                    "unexpected payload for void arm {} of union {}",
                    quote(&arm.value),
                    quote(&definition.name)
                ))),
            }
        }
        (DefKind::Const { .. }, _) => Err(SchemaError::Encode(format!(
            "constant {} is never serialized",
            quote(&definition.name)
        ))),
        (DefKind::Void, _) => Err(SchemaError::Encode(format!(
            "can not encode {}",
            quote(&definition.name)
        ))),
        _ => Err(mismatch(&definition.name, value)),
    }
}

/// Deserialize one value of the type `def` from `reader`.
pub fn decode(
    registry: &Registry,
    def: DefId,
    reader: &mut WireReader,
) -> Result<Value, SchemaError> {
    let def = registry.resolve(def);
    let definition = registry.get(def);

    match &definition.kind {
        DefKind::Int { size, signed } => {
            let v = match (*signed, *size) {
                (true, 1) => reader.read_i8().map_err(|_| truncated())? as i64,
                (true, 2) => reader.read_i16().map_err(|_| truncated())? as i64,
                (true, 4) => reader.read_i32().map_err(|_| truncated())? as i64,
                (true, 8) => reader.read_i64().map_err(|_| truncated())?,
                (false, 1) => reader.read_u8().map_err(|_| truncated())? as i64,
                (false, 2) => reader.read_u16().map_err(|_| truncated())? as i64,
                (false, 4) => reader.read_u32().map_err(|_| truncated())? as i64,
                (false, 8) => reader.read_u64().map_err(|_| truncated())? as i64,
                _ => unreachable!("builtin integer sizes are 1, 2, 4 and 8"),
            };
            Ok(Value::Int(v))
        }
        DefKind::Float { size: 4 } => Ok(Value::Float(
            reader.read_f32().map_err(|_| truncated())? as f64
        )),
        DefKind::Float { .. } => Ok(Value::Float(reader.read_f64().map_err(|_| truncated())?)),
        DefKind::Bool => Ok(Value::Bool(reader.read_bool().map_err(|_| {
            SchemaError::Decode("invalid boolean byte".to_string())
        })?)),
        DefKind::AString => Ok(Value::Str(
            reader.read_astring().map_err(|_| truncated())?.into_owned(),
        )),
        DefKind::WString => Ok(Value::Str(
            reader.read_wstring().map_err(|_| truncated())?.into_owned(),
        )),
        DefKind::Enum { width, .. } => Ok(Value::Int(
            reader.read_uint(*width).map_err(|_| truncated())? as i64,
        )),
        DefKind::Array { item, .. } => {
            let count = reader.read_u32().map_err(|_| truncated())? as usize;
            // The count is untrusted input. Every element takes at least one
            // byte, so never reserve more than the bytes left in the buffer;
            // an oversized count then fails as a normal truncation.
            let remaining = reader.data().len() - reader.index();
            let mut elements = Vec::with_capacity(count.min(remaining));
            for _ in 0..count {
                elements.push(decode(registry, *item, reader)?);
            }
            Ok(Value::Array(elements))
        }
        DefKind::Struct { fields } => {
            let mut entries = Vec::with_capacity(fields.len());
            for field in fields {
                let present = if field.optional {
                    reader.read_bool().map_err(|_| {
                        SchemaError::Decode("invalid presence byte".to_string())
                    })?
                } else {
                    true
                };
                if present {
                    let v = decode(registry, field.def, reader)?;
                    entries.push((field.name.clone(), v));
                }
            }
            Ok(Value::Struct(entries))
        }
        DefKind::Union { discr, arms, .. } => {
            let d = match decode(registry, *discr, reader)? {
                Value::Int(d) => d,
                _ => unreachable!("discriminators are integers or enums"),
            };
            let arm = arms
                .iter()
                .find(|arm| arm_number(registry, *discr, &arm.value) == Some(d))
                .ok_or_else(|| {
                    SchemaError::Decode(format!(
                        "{} is not a discriminator of union {}",
                        d,
                        quote(&definition.name)
                    ))
                })?;
            let value = if arm.name.is_some() {
                Some(Box::new(decode(registry, arm.def, reader)?))
            } else {
                None
            };
            Ok(Value::Union { discr: d, value })
        }
        DefKind::Const { .. } => Err(SchemaError::Decode(format!(
            "constant {} is never serialized",
            quote(&definition.name)
        ))),
        DefKind::Void | DefKind::Include { .. } => Err(SchemaError::Decode(format!(
            "can not decode {}",
            quote(&definition.name)
        ))),
        DefKind::Alias { .. } => unreachable!("aliases are resolved before dispatch"),
    }
}

/// The concrete value of a constant, useful to callers that want to fold
/// named constants into values of their own.
pub fn const_value(registry: &Registry, def: DefId) -> Option<&ConstValue> {
    match &registry.get(def).kind {
        DefKind::Const { value, .. } => Some(value),
        _ => None,
    }
}

/// Numeric value of a union arm literal. For enum discriminators the literal
/// names an item of that enum; for integer discriminators it names an integer
/// constant.
fn arm_number(registry: &Registry, discr: DefId, literal: &str) -> Option<i64> {
    match &registry.get(registry.resolve(discr)).kind {
        DefKind::Enum { items, .. } => items
            .iter()
            .find(|item| item.name == literal)
            .map(|item| item.value),
        DefKind::Int { .. } => match registry.lookup(literal).map(|id| &registry.get(id).kind) {
            Some(DefKind::Const {
                value: ConstValue::Int(v),
                ..
            }) => Some(*v),
            _ => None,
        },
        _ => None,
    }
}

fn check_int_range(name: &str, v: i64, size: usize, signed: bool) -> Result<(), SchemaError> {
    let ok = if signed {
        size == 8 || {
            let bits = 8 * size as u32;
            let max = (1i64 << (bits - 1)) - 1;
            v >= -max - 1 && v <= max
        }
    } else {
        v >= 0 && (size == 8 || v < (1i64 << (8 * size)))
    };
    if ok {
        Ok(())
    } else {
        Err(SchemaError::Encode(format!(
            "{} does not fit {}",
            v,
            quote(name)
        )))
    }
}
