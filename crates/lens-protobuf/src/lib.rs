//! Runtime protobuf-to-JSON decoding keyed by topic name.
//!
//! A [`SchemaRegistry`] maps topic-name patterns to descriptor sets compiled
//! with `protoc --descriptor_set_out`. Decoding a record looks up the first
//! mapping whose pattern matches the topic, decodes the binary payload against
//! the configured value (or key) message type, and renders it as JSON.
//!
//! # Architecture
//!
//! ```text
//! TopicMapping[] ──build──► SchemaRegistry ──resolve(topic, is_key)──► descriptor
//! payload bytes ──ProtoDecoder──► ProtoMessage ──JsonRenderer──► JSON text
//! JSON value ──ProtoEncoder──► payload bytes
//! ```
//!
//! # Modules
//!
//! - [`registry`] - topic mappings and pattern resolution
//! - [`shared`] - reloadable registry handle
//! - [`deserializer`] - topic-level decode entry points
//! - [`proto`] - descriptor-set loading, decoder, renderer and encoder
//! - [`error`] - error types
//! - [`testing`] - descriptor and payload fixtures for tests
//!
//! # Example
//!
//! ```ignore
//! use lens_protobuf::{decode, SchemaRegistry, TopicMapping};
//!
//! let registry = SchemaRegistry::build(&[
//!     TopicMapping::new("album.*", album_descriptor_bytes, "Album"),
//! ])?;
//! if let Some(json) = decode(&registry, "album.releases", &payload, false)? {
//!     println!("{json}");
//! }
//! ```

pub mod deserializer;
pub mod error;
pub mod proto;
pub mod registry;
pub mod shared;
pub mod testing;

pub use deserializer::{decode, decode_with_options, TopicDeserializer};
pub use error::{DecodeError, EncodeError, Error, LoadError, Result};
pub use proto::{JsonRenderer, ProtoDecoder, ProtoEncoder, RenderOptions};
pub use registry::{MappingEntry, Resolution, ResolvedSchema, SchemaRegistry, TopicMapping};
pub use shared::SharedRegistry;

// Schema and value types
pub use lens_types::{ProtoMessage, ProtoMessageDescriptor, ProtoSchema};
