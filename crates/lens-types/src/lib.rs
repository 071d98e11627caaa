//! Shared types for topic-lens.
//!
//! This crate holds the runtime representation of protobuf schemas and of
//! messages decoded against them. It has no protobuf dependency of its own:
//! descriptor-set loading, wire decoding and JSON rendering live in
//! `lens-protobuf`, which depends on this crate.
//!
//! # Architecture
//!
//! ```text
//! descriptor-set bytes → ProtoSchema (ProtoMessageDescriptor, ProtoEnumDescriptor)
//! payload bytes + ProtoMessageDescriptor → ProtoMessage (ProtoFieldValue tree)
//! ```
//!
//! # Modules
//!
//! - [`proto`] - schema types: field, message and enum descriptors
//! - [`value`] - decoded values: dynamic messages and field values

pub mod proto;
pub mod value;

// Re-export main types for convenient access
pub use proto::{
    ProtoEnumDescriptor, ProtoEnumValue, ProtoFieldDescriptor, ProtoMessageDescriptor,
    ProtoSchema, ProtoType, to_json_name,
};
pub use value::{ProtoFieldValue, ProtoMessage};
