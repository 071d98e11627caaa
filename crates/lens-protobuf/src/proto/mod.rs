//! Schema loading, decoding, rendering and encoding.

pub mod decoder;
pub mod descriptor_set;
pub mod encoder;
pub mod render;

pub use decoder::{ProtoDecoder, MAX_NESTING_DEPTH};
pub use descriptor_set::{parse_descriptor_set, schema_from_file_set};
pub use encoder::ProtoEncoder;
pub use render::{JsonRenderer, RenderOptions};
