//! JSON to protobuf binary encoding.
//!
//! The inverse of decode-and-render: takes the JSON form produced by
//! [`JsonRenderer`](crate::proto::render::JsonRenderer) (or hand-written JSON
//! in the same shape) and writes proto3 wire format against a message
//! descriptor. Fields are written in declaration order, repeated scalars
//! unpacked, `null` values skipped. Map entries follow the key order of the
//! JSON document.

use crate::error::EncodeError;
use crate::proto::decoder::MAX_NESTING_DEPTH;
use base64::Engine;
use lens_types::{ProtoFieldDescriptor, ProtoMessageDescriptor, ProtoSchema, ProtoType};
use protobuf::CodedOutputStream;
use serde_json::Value;

/// Schema-driven JSON encoder.
#[derive(Debug, Clone, Copy)]
pub struct ProtoEncoder<'a> {
    schema: &'a ProtoSchema,
}

impl<'a> ProtoEncoder<'a> {
    pub fn new(schema: &'a ProtoSchema) -> Self {
        Self { schema }
    }

    /// Encode `json` as a message of the named type.
    pub fn encode(&self, message_type: &str, json: &Value) -> Result<Vec<u8>, EncodeError> {
        let descriptor = self
            .schema
            .get_message(message_type)
            .ok_or_else(|| EncodeError::MessageTypeNotFound(message_type.to_string()))?;
        self.encode_with(descriptor, json)
    }

    /// Encode `json` against `descriptor`.
    pub fn encode_with(
        &self,
        descriptor: &ProtoMessageDescriptor,
        json: &Value,
    ) -> Result<Vec<u8>, EncodeError> {
        self.encode_message(descriptor, json, 0)
    }

    fn encode_message(
        &self,
        descriptor: &ProtoMessageDescriptor,
        json: &Value,
        depth: usize,
    ) -> Result<Vec<u8>, EncodeError> {
        if depth > MAX_NESTING_DEPTH {
            return Err(EncodeError::ProtobufEncode(format!(
                "message nesting exceeds {MAX_NESTING_DEPTH} levels"
            )));
        }
        let object = json
            .as_object()
            .ok_or_else(|| EncodeError::NotAnObject(descriptor.name.clone()))?;

        if let Some(key) = object.keys().find(|k| descriptor.get_field(k).is_none()) {
            return Err(EncodeError::UnknownField {
                message: descriptor.name.clone(),
                field: key.clone(),
            });
        }

        let mut buffer = Vec::new();
        {
            let mut stream = CodedOutputStream::vec(&mut buffer);
            for field in descriptor.fields() {
                let value = object
                    .get(&field.json_name)
                    .or_else(|| object.get(&field.name));
                match value {
                    None | Some(Value::Null) => {}
                    Some(value) if field.is_map => {
                        self.write_map(&mut stream, field, value, depth)?
                    }
                    Some(Value::Array(elements)) if field.is_repeated => {
                        for element in elements {
                            self.write_value(&mut stream, field, element, depth)?;
                        }
                    }
                    Some(other) if field.is_repeated => {
                        return Err(invalid(field, "array", other));
                    }
                    Some(value) => self.write_value(&mut stream, field, value, depth)?,
                }
            }
            stream.flush()?;
        }
        Ok(buffer)
    }

    fn write_map(
        &self,
        stream: &mut CodedOutputStream,
        field: &ProtoFieldDescriptor,
        value: &Value,
        depth: usize,
    ) -> Result<(), EncodeError> {
        let Value::Object(entries) = value else {
            return Err(invalid(field, "object", value));
        };
        let entry_descriptor = self.message_descriptor(&field.field_type)?;
        let (Some(key_field), Some(value_field)) = (
            entry_descriptor.field_by_number(1),
            entry_descriptor.field_by_number(2),
        ) else {
            return Err(EncodeError::ProtobufEncode(format!(
                "map entry {} lacks key or value",
                entry_descriptor.name
            )));
        };

        for (key, value) in entries {
            let mut entry = Vec::new();
            {
                let mut entry_stream = CodedOutputStream::vec(&mut entry);
                let key = map_key_value(key_field, key);
                self.write_value(&mut entry_stream, key_field, &key, depth + 1)?;
                if !value.is_null() {
                    self.write_value(&mut entry_stream, value_field, value, depth + 1)?;
                }
                entry_stream.flush()?;
            }
            stream.write_bytes(field.number, &entry)?;
        }
        Ok(())
    }

    /// Write one non-repeated value of `field`.
    fn write_value(
        &self,
        stream: &mut CodedOutputStream,
        field: &ProtoFieldDescriptor,
        value: &Value,
        depth: usize,
    ) -> Result<(), EncodeError> {
        let n = field.number;
        match &field.field_type {
            ProtoType::Double => stream.write_double(n, as_f64(field, value)?)?,
            ProtoType::Float => stream.write_float(n, as_f64(field, value)? as f32)?,
            ProtoType::Int32 => stream.write_int32(n, as_i32(field, value)?)?,
            ProtoType::Sint32 => stream.write_sint32(n, as_i32(field, value)?)?,
            ProtoType::Sfixed32 => stream.write_sfixed32(n, as_i32(field, value)?)?,
            ProtoType::Int64 => stream.write_int64(n, as_i64(field, value)?)?,
            ProtoType::Sint64 => stream.write_sint64(n, as_i64(field, value)?)?,
            ProtoType::Sfixed64 => stream.write_sfixed64(n, as_i64(field, value)?)?,
            ProtoType::Uint32 => stream.write_uint32(n, as_u32(field, value)?)?,
            ProtoType::Fixed32 => stream.write_fixed32(n, as_u32(field, value)?)?,
            ProtoType::Uint64 => stream.write_uint64(n, as_u64(field, value)?)?,
            ProtoType::Fixed64 => stream.write_fixed64(n, as_u64(field, value)?)?,
            ProtoType::Bool => {
                let b = value.as_bool().ok_or_else(|| invalid(field, "bool", value))?;
                stream.write_bool(n, b)?
            }
            ProtoType::String => {
                let s = value.as_str().ok_or_else(|| invalid(field, "string", value))?;
                stream.write_string(n, s)?
            }
            ProtoType::Bytes => {
                let bytes = value
                    .as_str()
                    .and_then(|s| base64::engine::general_purpose::STANDARD.decode(s).ok())
                    .ok_or_else(|| invalid(field, "base64 string", value))?;
                stream.write_bytes(n, &bytes)?
            }
            ProtoType::Enum(enum_name) => {
                let number = match value {
                    Value::String(name) => self
                        .schema
                        .get_enum(enum_name)
                        .and_then(|e| e.value_number(name)),
                    Value::Number(_) => as_i32(field, value).ok(),
                    _ => None,
                }
                .ok_or_else(|| invalid(field, &format!("{enum_name} value"), value))?;
                stream.write_enum(n, number)?
            }
            ProtoType::Message(_) => {
                let descriptor = self.message_descriptor(&field.field_type)?;
                let nested = self.encode_message(descriptor, value, depth + 1)?;
                stream.write_bytes(n, &nested)?
            }
            ProtoType::Group(_) => return Err(EncodeError::Unsupported(field.name.clone())),
        }
        Ok(())
    }

    fn message_descriptor(
        &self,
        field_type: &ProtoType,
    ) -> Result<&'a ProtoMessageDescriptor, EncodeError> {
        match field_type {
            ProtoType::Message(name) => self
                .schema
                .get_message(name)
                .ok_or_else(|| EncodeError::MessageTypeNotFound(name.clone())),
            other => Err(EncodeError::ProtobufEncode(format!(
                "{other} is not a message type"
            ))),
        }
    }
}

/// JSON object keys are strings; integer keys go through the numeric-string
/// path, bool keys are converted here.
fn map_key_value(key_field: &ProtoFieldDescriptor, key: &str) -> Value {
    match (&key_field.field_type, key) {
        (ProtoType::Bool, "true") => Value::Bool(true),
        (ProtoType::Bool, "false") => Value::Bool(false),
        _ => Value::String(key.to_string()),
    }
}

fn invalid(field: &ProtoFieldDescriptor, expected: &str, actual: &Value) -> EncodeError {
    EncodeError::InvalidValue {
        field: field.name.clone(),
        expected: expected.to_string(),
        actual: describe(actual),
    }
}

fn describe(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => format!("\"{s}\""),
        Value::Array(_) => "array".to_string(),
        Value::Object(_) => "object".to_string(),
    }
}

fn as_f64(field: &ProtoFieldDescriptor, value: &Value) -> Result<f64, EncodeError> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => match s.as_str() {
            "NaN" => Some(f64::NAN),
            "Infinity" => Some(f64::INFINITY),
            "-Infinity" => Some(f64::NEG_INFINITY),
            other => other.parse().ok(),
        },
        _ => None,
    }
    .ok_or_else(|| invalid(field, "number", value))
}

/// Integers may arrive as JSON numbers or numeric strings.
fn as_integer<T>(
    field: &ProtoFieldDescriptor,
    value: &Value,
    expected: &str,
) -> Result<T, EncodeError>
where
    T: std::str::FromStr + TryFrom<i64> + TryFrom<u64>,
{
    let parsed = match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                <T as TryFrom<i64>>::try_from(i).ok()
            } else if let Some(u) = n.as_u64() {
                <T as TryFrom<u64>>::try_from(u).ok()
            } else {
                // Integral floats such as 2018.0 within the exact f64 range
                n.as_f64()
                    .filter(|f| f.fract() == 0.0 && f.abs() < 9.007_199_254_740_992e15)
                    .and_then(|f| <T as TryFrom<i64>>::try_from(f as i64).ok())
            }
        }
        Value::String(s) => s.parse().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| invalid(field, expected, value))
}

fn as_i32(field: &ProtoFieldDescriptor, value: &Value) -> Result<i32, EncodeError> {
    as_integer(field, value, "int32")
}

fn as_i64(field: &ProtoFieldDescriptor, value: &Value) -> Result<i64, EncodeError> {
    as_integer(field, value, "int64")
}

fn as_u32(field: &ProtoFieldDescriptor, value: &Value) -> Result<u32, EncodeError> {
    as_integer(field, value, "uint32")
}

fn as_u64(field: &ProtoFieldDescriptor, value: &Value) -> Result<u64, EncodeError> {
    as_integer(field, value, "uint64")
}
