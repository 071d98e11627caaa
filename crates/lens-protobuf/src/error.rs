use thiserror::Error;

/// Errors raised while building a schema registry.
///
/// These only surface at startup or on reload, never per message.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Invalid topic pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: Box<regex::Error>,
    },

    #[error("Descriptor set parse error: {0}")]
    DescriptorParse(String),

    #[error("Unresolved type '{type_name}' referenced by field '{field}'")]
    UnresolvedType { field: String, type_name: String },

    #[error("Field '{0}' has no type")]
    MissingFieldType(String),

    #[error("Field '{field}' has invalid number {number}")]
    InvalidFieldNumber { field: String, number: i32 },

    #[error("Message type not found: {0}")]
    MessageTypeNotFound(String),

    #[error("Mapping #{index} ('{pattern}'): {source}")]
    Mapping {
        index: usize,
        pattern: String,
        #[source]
        source: Box<LoadError>,
    },
}

/// Errors raised while decoding a payload.
///
/// Only structural corruption of the binary framing produces one of these.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Protobuf decode error: {0}")]
    ProtobufDecode(String),

    #[error("Invalid wire type {wire_type} for field number {field_number}")]
    InvalidWireType { field_number: u32, wire_type: u32 },

    #[error("Invalid tag: field number 0")]
    ZeroFieldNumber,

    #[error("Unbalanced group: {0}")]
    UnbalancedGroup(String),

    #[error("Message nesting exceeds {0} levels")]
    RecursionLimit(usize),

    #[error("Message type not found: {0}")]
    MessageTypeNotFound(String),
}

impl From<protobuf::Error> for DecodeError {
    fn from(e: protobuf::Error) -> Self {
        DecodeError::ProtobufDecode(e.to_string())
    }
}

/// Errors raised while encoding JSON to protobuf binary.
#[derive(Error, Debug)]
pub enum EncodeError {
    #[error("Protobuf encoding error: {0}")]
    ProtobufEncode(String),

    #[error("Expected a JSON object for message '{0}'")]
    NotAnObject(String),

    #[error("Unknown field '{field}' in message '{message}'")]
    UnknownField { message: String, field: String },

    #[error("Invalid value for field '{field}': expected {expected}, got {actual}")]
    InvalidValue {
        field: String,
        expected: String,
        actual: String,
    },

    #[error("Message type not found: {0}")]
    MessageTypeNotFound(String),

    #[error("Unsupported field '{0}'")]
    Unsupported(String),
}

impl From<protobuf::Error> for EncodeError {
    fn from(e: protobuf::Error) -> Self {
        EncodeError::ProtobufEncode(e.to_string())
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Encode(#[from] EncodeError),
}

pub type Result<T> = std::result::Result<T, Error>;
