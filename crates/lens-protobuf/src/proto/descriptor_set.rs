//! Descriptor-set loading.
//!
//! Parses `FileDescriptorSet` bytes (as written by `protoc --descriptor_set_out`)
//! into a [`ProtoSchema`]. Every message and enum in the set is indexed by its
//! fully-qualified name, nested types included, and every field's type
//! reference is linked against that index.

use crate::error::LoadError;
use lens_types::{
    to_json_name, ProtoEnumDescriptor, ProtoEnumValue, ProtoFieldDescriptor,
    ProtoMessageDescriptor, ProtoSchema, ProtoType,
};
use protobuf::descriptor::field_descriptor_proto::{Label, Type};
use protobuf::descriptor::{DescriptorProto, FieldDescriptorProto, FileDescriptorSet};
use protobuf::Message;
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// Parse raw descriptor-set bytes into an indexed schema.
pub fn parse_descriptor_set(bytes: &[u8]) -> Result<ProtoSchema, LoadError> {
    let set = FileDescriptorSet::parse_from_bytes(bytes)
        .map_err(|e| LoadError::DescriptorParse(e.to_string()))?;
    schema_from_file_set(&set)
}

/// Index an already-parsed descriptor set.
pub fn schema_from_file_set(set: &FileDescriptorSet) -> Result<ProtoSchema, LoadError> {
    // First pass: collect every message and enum name so that field types can
    // refer to types declared later in the set or in other files.
    let mut message_protos: Vec<(String, &DescriptorProto)> = Vec::new();
    let mut enums = HashMap::new();
    let mut top_level = Vec::new();

    for file in &set.file {
        let package = file.package.clone().unwrap_or_default();
        for message in &file.message_type {
            let full_name = qualify(&package, message.name());
            top_level.push(full_name.clone());
            collect_message(&full_name, message, &mut message_protos, &mut enums);
        }
        for enum_type in &file.enum_type {
            let full_name = qualify(&package, enum_type.name());
            enums.insert(full_name.clone(), enum_descriptor(full_name, enum_type));
        }
    }

    let map_entries: HashSet<&str> = message_protos
        .iter()
        .filter(|(_, m)| m.options.as_ref().is_some_and(|o| o.map_entry()))
        .map(|(name, _)| name.as_str())
        .collect();
    let message_names: HashSet<&str> = message_protos.iter().map(|(n, _)| n.as_str()).collect();
    let enum_names: HashSet<&str> = enums.keys().map(String::as_str).collect();

    // Second pass: build field descriptors with linked types
    let mut messages = HashMap::new();
    for (full_name, message) in &message_protos {
        let mut fields = Vec::with_capacity(message.field.len());
        for field in &message.field {
            if field.name().is_empty() {
                continue;
            }
            let field_type = link_field_type(field, full_name, &message_names, &enum_names)?;
            let is_repeated = field.label == Some(Label::LABEL_REPEATED.into());
            let is_map = is_repeated
                && matches!(&field_type, ProtoType::Message(target) if map_entries.contains(target.as_str()));
            let json_name = match field.json_name() {
                "" => to_json_name(field.name()),
                name => name.to_string(),
            };

            let number = field_number(field, full_name)?;
            // proto3 `optional` fields sit in a synthetic oneof of their own
            let oneof = match field.oneof_index {
                Some(i) if !field.proto3_optional() => usize::try_from(i).ok(),
                _ => None,
            };

            fields.push(ProtoFieldDescriptor {
                name: field.name().to_string(),
                json_name,
                number,
                index: fields.len(),
                field_type,
                is_repeated,
                is_map,
                oneof,
            });
        }

        let is_map_entry = map_entries.contains(full_name.as_str());
        if messages
            .insert(
                full_name.clone(),
                ProtoMessageDescriptor::new(full_name.clone(), fields, is_map_entry),
            )
            .is_some()
        {
            warn!(
                "Message type {} is defined more than once; keeping the last definition",
                full_name
            );
        }
    }

    debug!(
        "Loaded descriptor set: {} files, {} messages, {} enums",
        set.file.len(),
        messages.len(),
        enums.len()
    );

    Ok(ProtoSchema::new(messages, enums, top_level))
}

fn collect_message<'a>(
    full_name: &str,
    message: &'a DescriptorProto,
    out: &mut Vec<(String, &'a DescriptorProto)>,
    enums: &mut HashMap<String, ProtoEnumDescriptor>,
) {
    out.push((full_name.to_string(), message));
    for nested in &message.nested_type {
        let nested_name = qualify(full_name, nested.name());
        collect_message(&nested_name, nested, out, enums);
    }
    for enum_type in &message.enum_type {
        let enum_name = qualify(full_name, enum_type.name());
        enums.insert(enum_name.clone(), enum_descriptor(enum_name, enum_type));
    }
}

fn enum_descriptor(
    full_name: String,
    enum_type: &protobuf::descriptor::EnumDescriptorProto,
) -> ProtoEnumDescriptor {
    ProtoEnumDescriptor {
        name: full_name,
        values: enum_type
            .value
            .iter()
            .map(|v| ProtoEnumValue {
                name: v.name().to_string(),
                number: v.number(),
            })
            .collect(),
    }
}

fn qualify(scope: &str, name: &str) -> String {
    if scope.is_empty() {
        name.to_string()
    } else {
        format!("{scope}.{name}")
    }
}

/// Largest field number protobuf allows (2^29 - 1).
const MAX_FIELD_NUMBER: u32 = (1 << 29) - 1;

fn field_number(field: &FieldDescriptorProto, scope: &str) -> Result<u32, LoadError> {
    match u32::try_from(field.number()) {
        Ok(number) if (1..=MAX_FIELD_NUMBER).contains(&number) => Ok(number),
        _ => Err(LoadError::InvalidFieldNumber {
            field: format!("{scope}.{}", field.name()),
            number: field.number(),
        }),
    }
}

/// Map a field's declared type to a [`ProtoType`], linking named types.
///
/// Descriptors produced by `protoc` always carry `type` and fully-qualified
/// `type_name`; hand-built ones may omit `type` for named types or use
/// relative names, both of which are resolved here.
fn link_field_type(
    field: &FieldDescriptorProto,
    scope: &str,
    messages: &HashSet<&str>,
    enums: &HashSet<&str>,
) -> Result<ProtoType, LoadError> {
    let field_path = format!("{scope}.{}", field.name());
    let unresolved = || LoadError::UnresolvedType {
        field: field_path.clone(),
        type_name: field.type_name().to_string(),
    };

    let declared = field.type_.map(|t| t.enum_value_or_default());
    let field_type = match declared {
        Some(Type::TYPE_DOUBLE) => ProtoType::Double,
        Some(Type::TYPE_FLOAT) => ProtoType::Float,
        Some(Type::TYPE_INT64) => ProtoType::Int64,
        Some(Type::TYPE_UINT64) => ProtoType::Uint64,
        Some(Type::TYPE_INT32) => ProtoType::Int32,
        Some(Type::TYPE_FIXED64) => ProtoType::Fixed64,
        Some(Type::TYPE_FIXED32) => ProtoType::Fixed32,
        Some(Type::TYPE_BOOL) => ProtoType::Bool,
        Some(Type::TYPE_STRING) => ProtoType::String,
        Some(Type::TYPE_BYTES) => ProtoType::Bytes,
        Some(Type::TYPE_UINT32) => ProtoType::Uint32,
        Some(Type::TYPE_SFIXED32) => ProtoType::Sfixed32,
        Some(Type::TYPE_SFIXED64) => ProtoType::Sfixed64,
        Some(Type::TYPE_SINT32) => ProtoType::Sint32,
        Some(Type::TYPE_SINT64) => ProtoType::Sint64,
        Some(Type::TYPE_MESSAGE) => ProtoType::Message(
            resolve_type_name(field.type_name(), scope, messages).ok_or_else(unresolved)?,
        ),
        Some(Type::TYPE_GROUP) => ProtoType::Group(
            resolve_type_name(field.type_name(), scope, messages).ok_or_else(unresolved)?,
        ),
        Some(Type::TYPE_ENUM) => ProtoType::Enum(
            resolve_type_name(field.type_name(), scope, enums).ok_or_else(unresolved)?,
        ),
        None if !field.type_name().is_empty() => {
            if let Some(name) = resolve_type_name(field.type_name(), scope, messages) {
                ProtoType::Message(name)
            } else if let Some(name) = resolve_type_name(field.type_name(), scope, enums) {
                ProtoType::Enum(name)
            } else {
                return Err(unresolved());
            }
        }
        None => return Err(LoadError::MissingFieldType(field_path)),
    };
    Ok(field_type)
}

/// Resolve a type reference following protobuf scoping: a leading dot means
/// fully-qualified, otherwise the innermost enclosing scope is searched first.
fn resolve_type_name(type_name: &str, scope: &str, known: &HashSet<&str>) -> Option<String> {
    if let Some(absolute) = type_name.strip_prefix('.') {
        return known.contains(absolute).then(|| absolute.to_string());
    }
    if type_name.is_empty() {
        return None;
    }

    let mut scope = scope;
    loop {
        let candidate = qualify(scope, type_name);
        if known.contains(candidate.as_str()) {
            return Some(candidate);
        }
        if scope.is_empty() {
            return None;
        }
        scope = scope.rsplit_once('.').map_or("", |(outer, _)| outer);
    }
}
