//! Decoded protobuf values.
//!
//! A [`ProtoMessage`] only records fields that were present on the wire.
//! Field values are keyed by declaration index, so iterating a message yields
//! fields in the order the schema declares them regardless of wire numbers.

use crate::proto::ProtoMessageDescriptor;
use std::collections::BTreeMap;

/// Represents a field value in a decoded protobuf message.
#[derive(Debug, Clone, PartialEq)]
pub enum ProtoFieldValue {
    Double(f64),
    Float(f32),
    Int32(i32),
    Int64(i64),
    Uint32(u32),
    Uint64(u64),
    Bool(bool),
    String(String),
    Bytes(Vec<u8>),
    /// Enum value by number; the name is looked up at render time
    Enum(i32),
    Message(Box<ProtoMessage>),
    /// Repeated and map fields, elements in wire order
    Repeated(Vec<ProtoFieldValue>),
}

impl ProtoFieldValue {
    /// Short name of the value variant, for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            ProtoFieldValue::Double(_) => "double",
            ProtoFieldValue::Float(_) => "float",
            ProtoFieldValue::Int32(_) => "int32",
            ProtoFieldValue::Int64(_) => "int64",
            ProtoFieldValue::Uint32(_) => "uint32",
            ProtoFieldValue::Uint64(_) => "uint64",
            ProtoFieldValue::Bool(_) => "bool",
            ProtoFieldValue::String(_) => "string",
            ProtoFieldValue::Bytes(_) => "bytes",
            ProtoFieldValue::Enum(_) => "enum",
            ProtoFieldValue::Message(_) => "message",
            ProtoFieldValue::Repeated(_) => "repeated",
        }
    }
}

/// Represents a decoded protobuf message.
#[derive(Debug, Clone, PartialEq)]
pub struct ProtoMessage {
    /// Fully-qualified message type name (e.g., "mypackage.MyMessage")
    pub message_type: String,
    /// Present fields by declaration index
    fields: BTreeMap<usize, ProtoFieldValue>,
}

impl ProtoMessage {
    pub fn new(message_type: impl Into<String>) -> Self {
        Self {
            message_type: message_type.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Value of the field at declaration index `index`, if present.
    pub fn get_by_index(&self, index: usize) -> Option<&ProtoFieldValue> {
        self.fields.get(&index)
    }

    pub fn get_by_index_mut(&mut self, index: usize) -> Option<&mut ProtoFieldValue> {
        self.fields.get_mut(&index)
    }

    /// Value of the field called `name` in `descriptor`, if present.
    pub fn get(&self, descriptor: &ProtoMessageDescriptor, name: &str) -> Option<&ProtoFieldValue> {
        descriptor
            .get_field(name)
            .and_then(|f| self.fields.get(&f.index))
    }

    /// Set (or replace) the value at declaration index `index`.
    pub fn set(&mut self, index: usize, value: ProtoFieldValue) {
        self.fields.insert(index, value);
    }

    /// Remove the value at declaration index `index`, making it absent.
    pub fn clear(&mut self, index: usize) -> Option<ProtoFieldValue> {
        self.fields.remove(&index)
    }

    /// Append to the repeated field at `index`, making it present if needed.
    pub fn push_repeated(&mut self, index: usize, value: ProtoFieldValue) {
        if let ProtoFieldValue::Repeated(values) = self.repeated_mut(index) {
            values.push(value);
        }
    }

    /// Mark the repeated field at `index` present and return it.
    pub fn repeated_mut(&mut self, index: usize) -> &mut ProtoFieldValue {
        let entry = self
            .fields
            .entry(index)
            .or_insert_with(|| ProtoFieldValue::Repeated(Vec::new()));
        if !matches!(entry, ProtoFieldValue::Repeated(_)) {
            *entry = ProtoFieldValue::Repeated(Vec::new());
        }
        entry
    }

    /// Present fields as `(declaration index, value)` in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &ProtoFieldValue)> {
        self.fields.iter().map(|(i, v)| (*i, v))
    }

    /// Number of present fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
