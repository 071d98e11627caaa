//! Topic-level decode entry points.
//!
//! `Ok(None)` means there is nothing to decode with: no mapping matched the
//! topic, or a key was requested from a mapping without a key type. Callers
//! fall back to their own rendering in that case.

use crate::error::{DecodeError, LoadError};
use crate::proto::decoder::ProtoDecoder;
use crate::proto::render::{JsonRenderer, RenderOptions};
use crate::registry::{Resolution, SchemaRegistry, TopicMapping};
use crate::shared::SharedRegistry;
use tracing::debug;

/// Decode `payload` from `topic` to JSON with default render options.
pub fn decode(
    registry: &SchemaRegistry,
    topic: &str,
    payload: &[u8],
    is_key: bool,
) -> Result<Option<String>, DecodeError> {
    decode_with_options(registry, topic, payload, is_key, &RenderOptions::default())
}

pub fn decode_with_options(
    registry: &SchemaRegistry,
    topic: &str,
    payload: &[u8],
    is_key: bool,
    options: &RenderOptions,
) -> Result<Option<String>, DecodeError> {
    let resolved = match registry.resolve(topic, is_key) {
        Resolution::Found(resolved) => resolved,
        Resolution::NoKeySchema => {
            debug!("Topic '{}' has no key message type", topic);
            return Ok(None);
        }
        Resolution::NoMatch => {
            debug!("No protobuf mapping for topic '{}'", topic);
            return Ok(None);
        }
    };

    let message = ProtoDecoder::new(resolved.schema).decode_with(resolved.descriptor, payload)?;
    let json = JsonRenderer::new(resolved.schema, options).render(resolved.descriptor, &message)?;
    Ok(Some(json))
}

/// Long-lived deserializer over a reloadable registry.
#[derive(Debug, Clone, Default)]
pub struct TopicDeserializer {
    registry: SharedRegistry,
    options: RenderOptions,
}

impl TopicDeserializer {
    pub fn new(registry: SharedRegistry, options: RenderOptions) -> Self {
        Self { registry, options }
    }

    pub fn from_mappings(mappings: &[TopicMapping]) -> Result<Self, LoadError> {
        Ok(Self::new(
            SharedRegistry::build(mappings)?,
            RenderOptions::default(),
        ))
    }

    /// Decode one record side against the current registry snapshot.
    pub fn deserialize(
        &self,
        topic: &str,
        payload: &[u8],
        is_key: bool,
    ) -> Result<Option<String>, DecodeError> {
        let registry = self.registry.snapshot();
        decode_with_options(&registry, topic, payload, is_key, &self.options)
    }

    /// Handle for reloading the mappings this deserializer uses.
    pub fn registry(&self) -> &SharedRegistry {
        &self.registry
    }

    pub fn options(&self) -> &RenderOptions {
        &self.options
    }
}
