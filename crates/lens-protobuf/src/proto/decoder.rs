//! Protobuf decoder implementation.
//!
//! Decodes binary protobuf payloads into [`ProtoMessage`] using a message
//! descriptor from a loaded [`ProtoSchema`]. Decoding is schema-driven: field
//! numbers the descriptor does not know are skipped, and a known field that
//! arrives with an unexpected wire type is skipped the same way. Errors are
//! only raised for structurally broken framing.

use crate::error::DecodeError;
use lens_types::{
    ProtoFieldDescriptor, ProtoFieldValue, ProtoMessage, ProtoMessageDescriptor, ProtoSchema,
    ProtoType,
};
use protobuf::CodedInputStream;
use tracing::trace;

/// Maximum depth of nested messages and groups.
pub const MAX_NESTING_DEPTH: usize = 100;

/// Wire types in protobuf encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WireType {
    Varint,
    Fixed64,
    LengthDelimited,
    StartGroup,
    EndGroup,
    Fixed32,
}

impl WireType {
    fn from_tag(tag: u32) -> Option<Self> {
        match tag & 0x7 {
            0 => Some(WireType::Varint),
            1 => Some(WireType::Fixed64),
            2 => Some(WireType::LengthDelimited),
            3 => Some(WireType::StartGroup),
            4 => Some(WireType::EndGroup),
            5 => Some(WireType::Fixed32),
            _ => None,
        }
    }

    /// The wire type a non-packed value of `field_type` is written with.
    fn for_type(field_type: &ProtoType) -> Self {
        match field_type {
            ProtoType::Int32
            | ProtoType::Int64
            | ProtoType::Uint32
            | ProtoType::Uint64
            | ProtoType::Sint32
            | ProtoType::Sint64
            | ProtoType::Bool
            | ProtoType::Enum(_) => WireType::Varint,
            ProtoType::Double | ProtoType::Fixed64 | ProtoType::Sfixed64 => WireType::Fixed64,
            ProtoType::Float | ProtoType::Fixed32 | ProtoType::Sfixed32 => WireType::Fixed32,
            ProtoType::String | ProtoType::Bytes | ProtoType::Message(_) => {
                WireType::LengthDelimited
            }
            ProtoType::Group(_) => WireType::StartGroup,
        }
    }
}

/// Runtime protobuf decoder.
///
/// Borrows the schema that owns the descriptors it decodes against; nested
/// message types are looked up there by name.
#[derive(Debug, Clone, Copy)]
pub struct ProtoDecoder<'a> {
    schema: &'a ProtoSchema,
}

impl<'a> ProtoDecoder<'a> {
    /// Create a new decoder from a schema.
    pub fn new(schema: &'a ProtoSchema) -> Self {
        Self { schema }
    }

    /// Get a reference to the schema.
    pub fn schema(&self) -> &'a ProtoSchema {
        self.schema
    }

    /// Decode a protobuf message of the named type from bytes.
    pub fn decode(&self, message_type: &str, data: &[u8]) -> Result<ProtoMessage, DecodeError> {
        let descriptor = self
            .schema
            .get_message(message_type)
            .ok_or_else(|| DecodeError::MessageTypeNotFound(message_type.to_string()))?;
        self.decode_with(descriptor, data)
    }

    /// Decode a protobuf message from bytes against `descriptor`.
    pub fn decode_with(
        &self,
        descriptor: &ProtoMessageDescriptor,
        data: &[u8],
    ) -> Result<ProtoMessage, DecodeError> {
        let mut stream = CodedInputStream::from_bytes(data);
        let mut message = ProtoMessage::new(descriptor.name.clone());
        self.merge_message(descriptor, &mut stream, &mut message, 0)?;
        Ok(message)
    }

    /// Read fields into `message` until the current limit is reached.
    fn merge_message(
        &self,
        descriptor: &ProtoMessageDescriptor,
        stream: &mut CodedInputStream,
        message: &mut ProtoMessage,
        depth: usize,
    ) -> Result<(), DecodeError> {
        if depth > MAX_NESTING_DEPTH {
            return Err(DecodeError::RecursionLimit(MAX_NESTING_DEPTH));
        }

        loop {
            if stream.eof()? {
                return Ok(());
            }

            let (field_number, wire_type) = read_tag(stream)?;
            if wire_type == WireType::EndGroup {
                return Err(DecodeError::UnbalancedGroup(format!(
                    "unexpected end of group {field_number}"
                )));
            }

            match descriptor.field_by_number(field_number) {
                Some(field) if accepts(field, wire_type) => {
                    self.merge_field(descriptor, field, wire_type, stream, message, depth)?;
                }
                Some(field) => {
                    trace!(
                        "Skipping field {}.{} with unexpected wire type {:?}",
                        descriptor.name,
                        field.name,
                        wire_type
                    );
                    skip_field(stream, field_number, wire_type, depth)?;
                }
                None => {
                    trace!(
                        "Skipping unknown field number {} in message {}",
                        field_number,
                        descriptor.name
                    );
                    skip_field(stream, field_number, wire_type, depth)?;
                }
            }
        }
    }

    fn merge_field(
        &self,
        descriptor: &ProtoMessageDescriptor,
        field: &ProtoFieldDescriptor,
        wire_type: WireType,
        stream: &mut CodedInputStream,
        message: &mut ProtoMessage,
        depth: usize,
    ) -> Result<(), DecodeError> {
        // Setting one member of a oneof clears the others
        for sibling in descriptor.oneof_siblings(field) {
            message.clear(sibling.index);
        }

        if let ProtoType::Message(type_name) = &field.field_type {
            let nested_descriptor = self
                .schema
                .get_message(type_name)
                .ok_or_else(|| DecodeError::MessageTypeNotFound(type_name.clone()))?;

            // read_bytes fails when the length prefix overruns the input
            let span = stream.read_bytes()?;
            let mut nested_stream = CodedInputStream::from_bytes(&span);
            if field.is_repeated {
                let mut nested = ProtoMessage::new(nested_descriptor.name.clone());
                self.merge_message(nested_descriptor, &mut nested_stream, &mut nested, depth + 1)?;
                message.push_repeated(field.index, ProtoFieldValue::Message(Box::new(nested)));
            } else {
                // A singular message seen twice is merged, not replaced
                match message.get_by_index_mut(field.index) {
                    Some(ProtoFieldValue::Message(existing)) => {
                        self.merge_message(
                            nested_descriptor,
                            &mut nested_stream,
                            existing,
                            depth + 1,
                        )?;
                    }
                    _ => {
                        let mut nested = ProtoMessage::new(nested_descriptor.name.clone());
                        self.merge_message(
                            nested_descriptor,
                            &mut nested_stream,
                            &mut nested,
                            depth + 1,
                        )?;
                        message.set(field.index, ProtoFieldValue::Message(Box::new(nested)));
                    }
                }
            }
            return Ok(());
        }

        if wire_type == WireType::LengthDelimited && field.field_type.is_packable() {
            // Packed run; a zero-length run still marks the field present
            let span = stream.read_bytes()?;
            let mut run = CodedInputStream::from_bytes(&span);
            message.repeated_mut(field.index);
            while !run.eof()? {
                let value = read_scalar(&field.field_type, &mut run)?;
                message.push_repeated(field.index, value);
            }
            return Ok(());
        }

        let value = read_scalar(&field.field_type, stream)?;
        if field.is_repeated {
            message.push_repeated(field.index, value);
        } else {
            message.set(field.index, value);
        }
        Ok(())
    }
}

/// Whether `wire_type` is a valid encoding for `field`.
fn accepts(field: &ProtoFieldDescriptor, wire_type: WireType) -> bool {
    if matches!(field.field_type, ProtoType::Group(_)) {
        // Groups are never decoded; the whole group is skipped as unknown
        return false;
    }
    let expected = WireType::for_type(&field.field_type);
    wire_type == expected
        || (field.is_repeated
            && field.field_type.is_packable()
            && wire_type == WireType::LengthDelimited)
}

fn read_tag(stream: &mut CodedInputStream) -> Result<(u32, WireType), DecodeError> {
    let tag = stream.read_raw_varint32()?;
    let field_number = tag >> 3;
    if field_number == 0 {
        return Err(DecodeError::ZeroFieldNumber);
    }
    let wire_type = WireType::from_tag(tag).ok_or(DecodeError::InvalidWireType {
        field_number,
        wire_type: tag & 0x7,
    })?;
    Ok((field_number, wire_type))
}

fn read_scalar(
    field_type: &ProtoType,
    stream: &mut CodedInputStream,
) -> Result<ProtoFieldValue, DecodeError> {
    let value = match field_type {
        ProtoType::Double => ProtoFieldValue::Double(stream.read_double()?),
        ProtoType::Float => ProtoFieldValue::Float(stream.read_float()?),
        ProtoType::Int32 => ProtoFieldValue::Int32(stream.read_int32()?),
        ProtoType::Int64 => ProtoFieldValue::Int64(stream.read_int64()?),
        ProtoType::Uint32 => ProtoFieldValue::Uint32(stream.read_uint32()?),
        ProtoType::Uint64 => ProtoFieldValue::Uint64(stream.read_uint64()?),
        ProtoType::Sint32 => ProtoFieldValue::Int32(stream.read_sint32()?),
        ProtoType::Sint64 => ProtoFieldValue::Int64(stream.read_sint64()?),
        ProtoType::Fixed32 => ProtoFieldValue::Uint32(stream.read_fixed32()?),
        ProtoType::Fixed64 => ProtoFieldValue::Uint64(stream.read_fixed64()?),
        ProtoType::Sfixed32 => ProtoFieldValue::Int32(stream.read_sfixed32()?),
        ProtoType::Sfixed64 => ProtoFieldValue::Int64(stream.read_sfixed64()?),
        ProtoType::Bool => ProtoFieldValue::Bool(stream.read_bool()?),
        ProtoType::String => ProtoFieldValue::String(stream.read_string()?),
        ProtoType::Bytes => ProtoFieldValue::Bytes(stream.read_bytes()?),
        ProtoType::Enum(_) => ProtoFieldValue::Enum(stream.read_int32()?),
        ProtoType::Message(name) | ProtoType::Group(name) => {
            return Err(DecodeError::ProtobufDecode(format!(
                "{name} is not a scalar type"
            )))
        }
    };
    Ok(value)
}

/// Skip one field value, including whole groups.
fn skip_field(
    stream: &mut CodedInputStream,
    field_number: u32,
    wire_type: WireType,
    depth: usize,
) -> Result<(), DecodeError> {
    match wire_type {
        WireType::Varint => {
            stream.read_raw_varint64()?;
        }
        WireType::Fixed64 => {
            stream.read_fixed64()?;
        }
        WireType::Fixed32 => {
            stream.read_fixed32()?;
        }
        WireType::LengthDelimited => {
            stream.read_bytes()?;
        }
        WireType::StartGroup => {
            if depth >= MAX_NESTING_DEPTH {
                return Err(DecodeError::RecursionLimit(MAX_NESTING_DEPTH));
            }
            loop {
                if stream.eof()? {
                    return Err(DecodeError::UnbalancedGroup(format!(
                        "missing end of group {field_number}"
                    )));
                }
                let (inner_number, inner_wire_type) = read_tag(stream)?;
                if inner_wire_type == WireType::EndGroup {
                    if inner_number == field_number {
                        break;
                    }
                    return Err(DecodeError::UnbalancedGroup(format!(
                        "unexpected end of group {inner_number}"
                    )));
                }
                skip_field(stream, inner_number, inner_wire_type, depth + 1)?;
            }
        }
        WireType::EndGroup => {
            return Err(DecodeError::UnbalancedGroup(format!(
                "unexpected end of group {field_number}"
            )));
        }
    }
    Ok(())
}
