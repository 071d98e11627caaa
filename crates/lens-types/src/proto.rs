//! Protobuf schema types.
//!
//! A [`ProtoSchema`] is the indexed form of one descriptor set. Message-typed
//! and enum-typed fields refer to their target by fully-qualified name, so
//! recursive and mutually recursive messages need no special handling: the
//! decoder looks the target up in the owning schema when it gets there.

use std::collections::HashMap;

/// Protobuf field type enumeration.
///
/// `Message`, `Enum` and `Group` carry the fully-qualified type name without
/// a leading dot (e.g. `music.v1.Album`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtoType {
    Double,
    Float,
    Int32,
    Int64,
    Uint32,
    Uint64,
    Sint32,
    Sint64,
    Fixed32,
    Fixed64,
    Sfixed32,
    Sfixed64,
    Bool,
    String,
    Bytes,
    Message(String),
    Enum(String),
    Group(String),
}

impl std::fmt::Display for ProtoType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.type_name())
    }
}

impl ProtoType {
    /// Get the human-readable type name.
    pub fn type_name(&self) -> String {
        match self {
            ProtoType::Double => "double".to_string(),
            ProtoType::Float => "float".to_string(),
            ProtoType::Int32 => "int32".to_string(),
            ProtoType::Int64 => "int64".to_string(),
            ProtoType::Uint32 => "uint32".to_string(),
            ProtoType::Uint64 => "uint64".to_string(),
            ProtoType::Sint32 => "sint32".to_string(),
            ProtoType::Sint64 => "sint64".to_string(),
            ProtoType::Fixed32 => "fixed32".to_string(),
            ProtoType::Fixed64 => "fixed64".to_string(),
            ProtoType::Sfixed32 => "sfixed32".to_string(),
            ProtoType::Sfixed64 => "sfixed64".to_string(),
            ProtoType::Bool => "bool".to_string(),
            ProtoType::String => "string".to_string(),
            ProtoType::Bytes => "bytes".to_string(),
            ProtoType::Message(name) => format!("message:{name}"),
            ProtoType::Enum(name) => format!("enum:{name}"),
            ProtoType::Group(name) => format!("group:{name}"),
        }
    }

    /// Whether a repeated field of this type may use packed encoding.
    pub fn is_packable(&self) -> bool {
        !matches!(
            self,
            ProtoType::String | ProtoType::Bytes | ProtoType::Message(_) | ProtoType::Group(_)
        )
    }
}

/// Describes a single field in a protobuf message.
#[derive(Debug, Clone, PartialEq)]
pub struct ProtoFieldDescriptor {
    /// Field name as declared in the .proto source
    pub name: String,
    /// JSON name (descriptor `json_name`, or lowerCamelCase of `name`)
    pub json_name: String,
    /// Field number (tag)
    pub number: u32,
    /// Position of the field in its message's declaration order
    pub index: usize,
    /// Field type
    pub field_type: ProtoType,
    /// Whether the field is repeated
    pub is_repeated: bool,
    /// Whether the field is a map (repeated map-entry message)
    pub is_map: bool,
    /// Index of the real (non-synthetic) oneof this field belongs to
    pub oneof: Option<usize>,
}

/// Describes a protobuf message type (schema).
#[derive(Debug, Clone)]
pub struct ProtoMessageDescriptor {
    /// Fully qualified message name (e.g., "mypackage.MyMessage")
    pub name: String,
    /// Whether this is a synthesized map entry message (`key = 1`, `value = 2`)
    pub is_map_entry: bool,
    /// Fields in declaration order
    fields: Vec<ProtoFieldDescriptor>,
    /// Field number to declaration index
    by_number: HashMap<u32, usize>,
}

impl ProtoMessageDescriptor {
    /// Create a descriptor from fields listed in declaration order.
    ///
    /// Each field's `index` is rewritten to its position in `fields`.
    pub fn new(
        name: impl Into<String>,
        fields: Vec<ProtoFieldDescriptor>,
        is_map_entry: bool,
    ) -> Self {
        let fields: Vec<ProtoFieldDescriptor> = fields
            .into_iter()
            .enumerate()
            .map(|(index, field)| ProtoFieldDescriptor { index, ..field })
            .collect();
        let by_number = fields.iter().map(|f| (f.number, f.index)).collect();
        Self {
            name: name.into(),
            is_map_entry,
            fields,
            by_number,
        }
    }

    /// The last component of the fully-qualified name.
    pub fn simple_name(&self) -> &str {
        self.name.rsplit('.').next().unwrap_or(&self.name)
    }

    /// Get a field descriptor by declared name or JSON name.
    pub fn get_field(&self, name: &str) -> Option<&ProtoFieldDescriptor> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .or_else(|| self.fields.iter().find(|f| f.json_name == name))
    }

    /// Get a field descriptor by wire number.
    pub fn field_by_number(&self, number: u32) -> Option<&ProtoFieldDescriptor> {
        self.by_number.get(&number).map(|&i| &self.fields[i])
    }

    /// Get a field descriptor by declaration index.
    pub fn field_at(&self, index: usize) -> Option<&ProtoFieldDescriptor> {
        self.fields.get(index)
    }

    /// All fields in declaration order.
    pub fn fields(&self) -> &[ProtoFieldDescriptor] {
        &self.fields
    }

    /// List all field names in declaration order.
    pub fn list_fields(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    /// Other members of the oneof `field` belongs to, if any.
    pub fn oneof_siblings<'a>(
        &'a self,
        field: &'a ProtoFieldDescriptor,
    ) -> impl Iterator<Item = &'a ProtoFieldDescriptor> + 'a {
        self.fields.iter().filter(move |f| {
            field.oneof.is_some() && f.oneof == field.oneof && f.index != field.index
        })
    }
}

/// A single enum value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtoEnumValue {
    pub name: String,
    pub number: i32,
}

/// Describes a protobuf enum type.
#[derive(Debug, Clone)]
pub struct ProtoEnumDescriptor {
    /// Fully qualified enum name
    pub name: String,
    /// Values in declaration order
    pub values: Vec<ProtoEnumValue>,
}

impl ProtoEnumDescriptor {
    /// Name of the first value declared with `number` (aliases share numbers).
    pub fn value_name(&self, number: i32) -> Option<&str> {
        self.values
            .iter()
            .find(|v| v.number == number)
            .map(|v| v.name.as_str())
    }

    /// Number of the value called `name`.
    pub fn value_number(&self, name: &str) -> Option<i32> {
        self.values.iter().find(|v| v.name == name).map(|v| v.number)
    }
}

/// Represents a parsed descriptor set containing message and enum types.
#[derive(Debug, Clone, Default)]
pub struct ProtoSchema {
    /// Message descriptors by fully-qualified name
    messages: HashMap<String, ProtoMessageDescriptor>,
    /// Enum descriptors by fully-qualified name
    enums: HashMap<String, ProtoEnumDescriptor>,
    /// Fully-qualified names of top-level messages, in file then declaration order
    top_level: Vec<String>,
}

impl ProtoSchema {
    pub fn new(
        messages: HashMap<String, ProtoMessageDescriptor>,
        enums: HashMap<String, ProtoEnumDescriptor>,
        top_level: Vec<String>,
    ) -> Self {
        Self {
            messages,
            enums,
            top_level,
        }
    }

    /// Get a message descriptor by fully-qualified name (leading dot allowed).
    pub fn get_message(&self, name: &str) -> Option<&ProtoMessageDescriptor> {
        self.messages.get(name.strip_prefix('.').unwrap_or(name))
    }

    /// Get an enum descriptor by fully-qualified name (leading dot allowed).
    pub fn get_enum(&self, name: &str) -> Option<&ProtoEnumDescriptor> {
        self.enums.get(name.strip_prefix('.').unwrap_or(name))
    }

    /// Find a message by fully-qualified name, falling back to the simple name
    /// of a top-level message. The first top-level match in file order wins.
    pub fn find_message(&self, name: &str) -> Option<&ProtoMessageDescriptor> {
        self.get_message(name).or_else(|| {
            self.top_level
                .iter()
                .filter_map(|full| self.messages.get(full))
                .find(|m| m.simple_name() == name)
        })
    }

    /// Fully-qualified names of top-level messages sharing the simple name `name`.
    pub fn top_level_named(&self, name: &str) -> Vec<&str> {
        self.top_level
            .iter()
            .filter(|full| full.rsplit('.').next() == Some(name))
            .map(String::as_str)
            .collect()
    }

    /// List all message type names in the schema, sorted.
    pub fn list_messages(&self) -> Vec<String> {
        let mut names: Vec<String> = self.messages.keys().cloned().collect();
        names.sort();
        names
    }

    /// List all enum type names in the schema, sorted.
    pub fn list_enums(&self) -> Vec<String> {
        let mut names: Vec<String> = self.enums.keys().cloned().collect();
        names.sort();
        names
    }
}

/// Derive the protobuf JSON name of a field: underscores are dropped and the
/// character following each underscore is upper-cased.
pub fn to_json_name(field_name: &str) -> String {
    let mut out = String::with_capacity(field_name.len());
    let mut capitalize_next = false;
    for c in field_name.chars() {
        if c == '_' {
            capitalize_next = true;
        } else if capitalize_next {
            out.extend(c.to_uppercase());
            capitalize_next = false;
        } else {
            out.push(c);
        }
    }
    out
}
