//! Subcommand bodies that do not touch stdin/stdout.

use anyhow::{bail, Context};
use lens_protobuf::{ProtoEncoder, Resolution, SchemaRegistry};

/// Encode a JSON document for `topic` through the mapped schema.
pub fn encode_record(
    registry: &SchemaRegistry,
    topic: &str,
    is_key: bool,
    json: &str,
) -> anyhow::Result<Vec<u8>> {
    let resolved = match registry.resolve(topic, is_key) {
        Resolution::Found(resolved) => resolved,
        Resolution::NoKeySchema => bail!("Topic '{topic}' has no key message type"),
        Resolution::NoMatch => bail!("No protobuf mapping for topic '{topic}'"),
    };
    let value: serde_json::Value = serde_json::from_str(json).context("Input is not valid JSON")?;
    let payload = ProtoEncoder::new(resolved.schema)
        .encode_with(resolved.descriptor, &value)
        .with_context(|| format!("Failed to encode {}", resolved.descriptor.name))?;
    Ok(payload)
}

/// One line per mapping, in precedence order.
pub fn describe_mappings(registry: &SchemaRegistry) -> Vec<String> {
    registry
        .mappings()
        .enumerate()
        .map(|(index, entry)| {
            format!(
                "{index}\t{}\tvalue={}\tkey={}",
                entry.topic_regex(),
                entry.value_message_type(),
                entry.key_message_type().unwrap_or("-")
            )
        })
        .collect()
}
