//! topic-lens
//!
//! Decodes protobuf-encoded topic records to JSON. Topic names are mapped to
//! compiled descriptor sets by regular expression in a TOML or YAML config
//! file; the first matching mapping supplies the value (and optionally key)
//! message type.
//!
//! The decoding core lives in the `lens-protobuf` crate. This crate adds
//! configuration loading, payload I/O and the `topic-lens` CLI.
//!
//! # CLI Usage
//!
//! ```bash
//! # Decode a raw record value read from a file
//! topic-lens decode --config lens.toml --topic album.releases --input record.bin
//!
//! # Decode a base64 record key from stdin
//! echo CgdPcmlnaW5z | topic-lens decode --config lens.toml --topic orders --key --input-format base64
//!
//! # Encode JSON to base64 protobuf
//! topic-lens encode --config lens.toml --topic album.releases --output-format base64 < album.json
//!
//! # Show mappings in precedence order
//! topic-lens list --config lens.toml
//! ```

pub mod commands;
pub mod config;
pub mod payload;

pub use config::{ConfigFormat, LensConfig, TopicMappingConfig};
pub use payload::PayloadFormat;
