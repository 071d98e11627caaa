//! Topic-pattern to schema registry.
//!
//! A [`SchemaRegistry`] is built once from an ordered list of
//! [`TopicMapping`]s and is immutable afterwards. Resolution walks the entries
//! in order and the first pattern that matches the whole topic name wins.

use crate::error::LoadError;
use crate::proto::descriptor_set::parse_descriptor_set;
use lens_types::{ProtoMessageDescriptor, ProtoSchema};
use regex::Regex;
use tracing::{debug, info, warn};

/// One configured topic mapping, with raw descriptor-set bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicMapping {
    /// Regular expression matched against the entire topic name
    pub topic_regex: String,
    /// Serialized `FileDescriptorSet`
    pub descriptor_set: Vec<u8>,
    /// Message type of record values
    pub value_message_type: String,
    /// Message type of record keys, if keys are protobuf-encoded
    pub key_message_type: Option<String>,
}

impl TopicMapping {
    pub fn new(
        topic_regex: impl Into<String>,
        descriptor_set: Vec<u8>,
        value_message_type: impl Into<String>,
    ) -> Self {
        Self {
            topic_regex: topic_regex.into(),
            descriptor_set,
            value_message_type: value_message_type.into(),
            key_message_type: None,
        }
    }

    pub fn with_key_message_type(mut self, key_message_type: impl Into<String>) -> Self {
        self.key_message_type = Some(key_message_type.into());
        self
    }
}

/// A validated mapping: compiled pattern, indexed schema and resolved
/// fully-qualified message names.
#[derive(Debug)]
pub struct MappingEntry {
    topic_regex: String,
    pattern: Regex,
    schema: ProtoSchema,
    value_type: String,
    key_type: Option<String>,
}

impl MappingEntry {
    fn build(mapping: &TopicMapping) -> Result<Self, LoadError> {
        let pattern = anchored(&mapping.topic_regex)?;
        let schema = parse_descriptor_set(&mapping.descriptor_set)?;
        let value_type = resolve_message_name(&schema, &mapping.value_message_type)?;
        let key_type = mapping
            .key_message_type
            .as_deref()
            .map(|name| resolve_message_name(&schema, name))
            .transpose()?;
        Ok(Self {
            topic_regex: mapping.topic_regex.clone(),
            pattern,
            schema,
            value_type,
            key_type,
        })
    }

    /// The pattern as configured, without anchors.
    pub fn topic_regex(&self) -> &str {
        &self.topic_regex
    }

    pub fn schema(&self) -> &ProtoSchema {
        &self.schema
    }

    /// Fully-qualified value message name.
    pub fn value_message_type(&self) -> &str {
        &self.value_type
    }

    /// Fully-qualified key message name, if configured.
    pub fn key_message_type(&self) -> Option<&str> {
        self.key_type.as_deref()
    }

    pub fn matches(&self, topic: &str) -> bool {
        self.pattern.is_match(topic)
    }
}

/// Schema selected for one topic and record side.
#[derive(Debug, Clone, Copy)]
pub struct ResolvedSchema<'a> {
    pub schema: &'a ProtoSchema,
    pub descriptor: &'a ProtoMessageDescriptor,
    /// Pattern of the entry that matched
    pub topic_regex: &'a str,
}

/// Outcome of [`SchemaRegistry::resolve`].
#[derive(Debug, Clone, Copy)]
pub enum Resolution<'a> {
    Found(ResolvedSchema<'a>),
    /// A mapping matched but has no key message type
    NoKeySchema,
    /// No mapping matched the topic
    NoMatch,
}

impl<'a> Resolution<'a> {
    pub fn found(self) -> Option<ResolvedSchema<'a>> {
        match self {
            Resolution::Found(resolved) => Some(resolved),
            Resolution::NoKeySchema | Resolution::NoMatch => None,
        }
    }
}

/// Ordered, immutable set of topic mappings.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    entries: Vec<MappingEntry>,
}

impl SchemaRegistry {
    /// Build a registry from mappings in precedence order.
    ///
    /// Fails on the first invalid mapping; the error carries its index and
    /// pattern.
    pub fn build(mappings: &[TopicMapping]) -> Result<Self, LoadError> {
        let entries = mappings
            .iter()
            .enumerate()
            .map(|(index, mapping)| {
                MappingEntry::build(mapping).map_err(|e| LoadError::Mapping {
                    index,
                    pattern: mapping.topic_regex.clone(),
                    source: Box::new(e),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        info!("Built schema registry with {} topic mappings", entries.len());
        for entry in &entries {
            debug!(
                "Topic pattern '{}' -> value {}, key {}",
                entry.topic_regex,
                entry.value_type,
                entry.key_type.as_deref().unwrap_or("<none>")
            );
        }
        Ok(Self { entries })
    }

    /// Find the schema for `topic`, choosing the key type when `is_key`.
    pub fn resolve(&self, topic: &str, is_key: bool) -> Resolution<'_> {
        let Some(entry) = self.entries.iter().find(|e| e.matches(topic)) else {
            return Resolution::NoMatch;
        };
        let message_type = if is_key {
            match &entry.key_type {
                Some(key_type) => key_type,
                None => return Resolution::NoKeySchema,
            }
        } else {
            &entry.value_type
        };
        // Names were resolved against this schema at build time
        match entry.schema.get_message(message_type) {
            Some(descriptor) => Resolution::Found(ResolvedSchema {
                schema: &entry.schema,
                descriptor,
                topic_regex: &entry.topic_regex,
            }),
            None => Resolution::NoMatch,
        }
    }

    /// Entries in precedence order.
    pub fn mappings(&self) -> impl Iterator<Item = &MappingEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn anchored(topic_regex: &str) -> Result<Regex, LoadError> {
    Regex::new(&format!("^(?:{topic_regex})$")).map_err(|e| LoadError::InvalidPattern {
        pattern: topic_regex.to_string(),
        source: Box::new(e),
    })
}

/// Resolve a configured message name to its fully-qualified form.
///
/// Accepts a fully-qualified name (leading dot optional) or the simple name
/// of a top-level message; the first top-level message in file order wins.
fn resolve_message_name(schema: &ProtoSchema, configured: &str) -> Result<String, LoadError> {
    if let Some(descriptor) = schema.get_message(configured) {
        return Ok(descriptor.name.clone());
    }
    let candidates = schema.top_level_named(configured);
    match candidates.as_slice() {
        [] => Err(LoadError::MessageTypeNotFound(configured.to_string())),
        [only] => Ok(only.to_string()),
        [first, ..] => {
            warn!(
                "Message name '{}' is ambiguous ({}), using {}",
                configured,
                candidates.join(", "),
                first
            );
            Ok(first.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{
        album_and_film_mappings, album_descriptor_set, descriptor_set, field, file, message,
        film_descriptor_set, shop_descriptor_set,
    };
    use protobuf::descriptor::field_descriptor_proto::Type;

    fn found<'a>(resolution: Resolution<'a>) -> ResolvedSchema<'a> {
        match resolution {
            Resolution::Found(resolved) => resolved,
            other => panic!("Expected a resolved schema, got {other:?}"),
        }
    }

    #[test]
    fn test_resolve_value_types() {
        let registry = SchemaRegistry::build(&album_and_film_mappings())
            .expect("Failed to build registry");
        assert_eq!(registry.len(), 2);

        let album = found(registry.resolve("album.topic.name", false));
        assert_eq!(album.descriptor.name, "Album");
        assert_eq!(album.topic_regex, "album.*");

        let film = found(registry.resolve("film.topic.name", false));
        assert_eq!(film.descriptor.name, "Film");
    }

    #[test]
    fn test_unmatched_topic() {
        let registry = SchemaRegistry::build(&album_and_film_mappings())
            .expect("Failed to build registry");
        assert!(matches!(
            registry.resolve("random.topic.name", false),
            Resolution::NoMatch
        ));
        assert!(matches!(
            registry.resolve("random.topic.name", true),
            Resolution::NoMatch
        ));
    }

    #[test]
    fn test_key_without_key_schema() {
        let registry = SchemaRegistry::build(&album_and_film_mappings())
            .expect("Failed to build registry");
        assert!(matches!(
            registry.resolve("film.topic.name", true),
            Resolution::NoKeySchema
        ));
    }

    #[test]
    fn test_key_schema_resolves() {
        let mappings = vec![TopicMapping::new("orders", shop_descriptor_set(), "shop.Order")
            .with_key_message_type("Customer")];
        let registry = SchemaRegistry::build(&mappings).expect("Failed to build registry");

        let key = found(registry.resolve("orders", true));
        assert_eq!(key.descriptor.name, "shop.Customer");
        let value = found(registry.resolve("orders", false));
        assert_eq!(value.descriptor.name, "shop.Order");
    }

    #[test]
    fn test_pattern_must_match_whole_topic() {
        let registry = SchemaRegistry::build(&album_and_film_mappings())
            .expect("Failed to build registry");
        // `album.*` must not match a topic that merely contains "album"
        assert!(matches!(
            registry.resolve("my.album.topic", false),
            Resolution::NoMatch
        ));

        let mappings = vec![TopicMapping::new("a|b", album_descriptor_set(), "Album")];
        let registry = SchemaRegistry::build(&mappings).expect("Failed to build registry");
        assert!(registry.resolve("a", false).found().is_some());
        assert!(registry.resolve("b", false).found().is_some());
        assert!(registry.resolve("ab", false).found().is_none());
    }

    #[test]
    fn test_first_match_wins() {
        let mappings = vec![
            TopicMapping::new("film\\..*", film_descriptor_set(), "Film"),
            TopicMapping::new(".*", album_descriptor_set(), "Album"),
        ];
        let registry = SchemaRegistry::build(&mappings).expect("Failed to build registry");
        assert_eq!(
            found(registry.resolve("film.releases", false)).descriptor.name,
            "Film"
        );
        assert_eq!(
            found(registry.resolve("anything.else", false)).descriptor.name,
            "Album"
        );

        let reversed: Vec<TopicMapping> = mappings.into_iter().rev().collect();
        let registry = SchemaRegistry::build(&reversed).expect("Failed to build registry");
        assert_eq!(
            found(registry.resolve("film.releases", false)).descriptor.name,
            "Album"
        );
    }

    #[test]
    fn test_fully_qualified_and_nested_names() {
        let mappings = vec![
            TopicMapping::new("items", shop_descriptor_set(), ".shop.Order.LineItem"),
            TopicMapping::new("orders", shop_descriptor_set(), "Order"),
        ];
        let registry = SchemaRegistry::build(&mappings).expect("Failed to build registry");
        let names: Vec<&str> = registry
            .mappings()
            .map(MappingEntry::value_message_type)
            .collect();
        assert_eq!(names, vec!["shop.Order.LineItem", "shop.Order"]);
    }

    #[test]
    fn test_ambiguous_simple_name_uses_first_file() {
        let set = descriptor_set(vec![
            file(
                "a.proto",
                Some("a"),
                vec![message("Event", vec![field("id", 1, Type::TYPE_STRING)])],
                vec![],
            ),
            file(
                "b.proto",
                Some("b"),
                vec![message("Event", vec![field("id", 1, Type::TYPE_INT64)])],
                vec![],
            ),
        ]);
        let registry = SchemaRegistry::build(&[TopicMapping::new("events", set, "Event")])
            .expect("Failed to build registry");
        assert_eq!(
            found(registry.resolve("events", false)).descriptor.name,
            "a.Event"
        );
    }

    #[test]
    fn test_invalid_pattern_fails_build() {
        let mut mappings = album_and_film_mappings();
        mappings.push(TopicMapping::new("(unclosed", album_descriptor_set(), "Album"));
        let err = SchemaRegistry::build(&mappings).expect_err("Invalid regex should fail");
        match err {
            LoadError::Mapping {
                index,
                pattern,
                source,
            } => {
                assert_eq!(index, 2);
                assert_eq!(pattern, "(unclosed");
                assert!(matches!(*source, LoadError::InvalidPattern { .. }));
            }
            other => panic!("Unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_missing_message_type_fails_build() {
        let mappings = vec![TopicMapping::new("film.*", film_descriptor_set(), "Album")];
        let err = SchemaRegistry::build(&mappings).expect_err("Missing type should fail");
        assert!(matches!(
            err,
            LoadError::Mapping { index: 0, ref source, .. }
                if matches!(**source, LoadError::MessageTypeNotFound(_))
        ));

        let mappings = vec![TopicMapping::new("film.*", film_descriptor_set(), "Film")
            .with_key_message_type("FilmKey")];
        assert!(SchemaRegistry::build(&mappings).is_err());
    }

    #[test]
    fn test_malformed_descriptor_fails_build() {
        let mappings = vec![TopicMapping::new("x", vec![0x0a, 0xff, 0x01], "X")];
        let err = SchemaRegistry::build(&mappings).expect_err("Malformed set should fail");
        assert!(matches!(
            err,
            LoadError::Mapping { ref source, .. }
                if matches!(**source, LoadError::DescriptorParse(_))
        ));
    }

    #[test]
    fn test_empty_registry_matches_nothing() {
        let registry = SchemaRegistry::default();
        assert!(registry.is_empty());
        assert!(matches!(
            registry.resolve("album.topic.name", false),
            Resolution::NoMatch
        ));
    }
}
