//! End-to-end tests: config file on disk -> registry -> decode/encode.

use base64::Engine;
use lens_protobuf::testing::{
    album_descriptor_set, film_descriptor_set, force_awakens_film, origins_album,
    shop_descriptor_set, FORCE_AWAKENS_FILM_JSON, ORIGINS_ALBUM_JSON,
};
use lens_protobuf::{decode, ProtoDecoder, SchemaRegistry};
use std::fs;
use tempfile::TempDir;
use topic_lens::commands::{describe_mappings, encode_record};
use topic_lens::LensConfig;

fn b64(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

/// Album descriptor inline, Film descriptor as a file next to the config.
fn write_toml_config(dir: &TempDir, render: &str) -> std::path::PathBuf {
    fs::create_dir_all(dir.path().join("descriptors")).expect("Failed to create dir");
    fs::write(
        dir.path().join("descriptors/film.desc"),
        film_descriptor_set(),
    )
    .expect("Failed to write descriptor");

    let config = format!(
        r#"
{render}

[[topics_mapping]]
topic_regex = "album.*"
descriptor_file_base64 = "{album}"
value_message_type = "Album"

[[topics_mapping]]
topic_regex = "film.*"
descriptor_file = "descriptors/film.desc"
value_message_type = "Film"
"#,
        album = b64(&album_descriptor_set()),
    );
    let path = dir.path().join("lens.toml");
    fs::write(&path, config).expect("Failed to write config");
    path
}

#[test]
fn test_decode_through_toml_config() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = write_toml_config(&dir, "");
    let config = LensConfig::from_file(&path).expect("Failed to load config");
    let deserializer = config.deserializer().expect("Failed to build deserializer");

    let album = deserializer
        .deserialize("album.topic.name", &origins_album(), false)
        .expect("Failed to decode album");
    assert_eq!(album.as_deref(), Some(ORIGINS_ALBUM_JSON));

    let film = deserializer
        .deserialize("film.topic.name", &force_awakens_film(), false)
        .expect("Failed to decode film");
    assert_eq!(film.as_deref(), Some(FORCE_AWAKENS_FILM_JSON));

    let key = deserializer
        .deserialize("film.topic.name", &force_awakens_film(), true)
        .expect("Missing key type should not fail");
    assert!(key.is_none());

    let unmapped = deserializer
        .deserialize("random.topic.name", &origins_album(), false)
        .expect("Unmapped topic should not fail");
    assert!(unmapped.is_none());
}

#[test]
fn test_render_section_applies() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = write_toml_config(
        &dir,
        "[render]\npreserve_proto_field_names = true\nomit_whitespace = true",
    );
    let config = LensConfig::from_file(&path).expect("Failed to load config");
    let json = config
        .deserializer()
        .expect("Failed to build deserializer")
        .deserialize("album.topic.name", &origins_album(), false)
        .expect("Failed to decode")
        .expect("Album should be mapped");
    assert_eq!(
        json,
        r#"{"title":"Origins","artist":["Imagine Dragons"],"release_year":2018,"song_title":["Birds","Zero","Natural","Machine"]}"#
    );
}

#[test]
fn test_yaml_config_with_key_type() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join("lens.yaml");
    fs::write(
        &path,
        format!(
            "topics_mapping:\n  - topic_regex: \"orders\\\\..*\"\n    descriptor_file_base64: \"{}\"\n    value_message_type: shop.Order\n    key_message_type: Customer\n",
            b64(&shop_descriptor_set())
        ),
    )
    .expect("Failed to write config");

    let config = LensConfig::from_file(&path).expect("Failed to load config");
    let registry = config
        .build_registry()
        .expect("Failed to build registry")
        .snapshot();
    assert_eq!(
        describe_mappings(&registry),
        vec!["0\torders\\..*\tvalue=shop.Order\tkey=shop.Customer".to_string()]
    );

    let key = encode_record(&registry, "orders.eu", true, r#"{"name": "Alice", "vip": true}"#)
        .expect("Failed to encode key");
    let json = decode(&registry, "orders.eu", &key, true)
        .expect("Failed to decode key")
        .expect("Key should be mapped");
    assert_eq!(json, "{\n  \"name\": \"Alice\",\n  \"vip\": true\n}");
}

#[test]
fn test_missing_descriptor_file_names_the_entry() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join("lens.toml");
    fs::write(
        &path,
        "[[topics_mapping]]\ntopic_regex = \"x\"\ndescriptor_file = \"missing.desc\"\nvalue_message_type = \"X\"\n",
    )
    .expect("Failed to write config");

    let config = LensConfig::from_file(&path).expect("Failed to load config");
    let err = config.build_registry().expect_err("Missing file should fail");
    let message = format!("{err:#}");
    assert!(message.contains("topics_mapping #0"), "{message}");
    assert!(message.contains("missing.desc"), "{message}");
}

#[test]
fn test_bad_entry_fails_whole_registry() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join("lens.toml");
    fs::write(
        &path,
        format!(
            "[[topics_mapping]]\ntopic_regex = \"album.*\"\ndescriptor_file_base64 = \"{}\"\nvalue_message_type = \"Album\"\n\n[[topics_mapping]]\ntopic_regex = \"film(\"\ndescriptor_file_base64 = \"{}\"\nvalue_message_type = \"Film\"\n",
            b64(&album_descriptor_set()),
            b64(&film_descriptor_set()),
        ),
    )
    .expect("Failed to write config");

    let config = LensConfig::from_file(&path).expect("Failed to load config");
    let err = config.build_registry().expect_err("Bad pattern should fail");
    let message = format!("{err:#}");
    assert!(message.contains("Mapping #1"), "{message}");
    assert!(message.contains("film("), "{message}");
}

#[test]
fn test_encode_then_decode_round_trip() {
    let registry = SchemaRegistry::build(&lens_protobuf::testing::album_and_film_mappings())
        .expect("Failed to build registry");

    let payload = encode_record(&registry, "album.topic.name", false, ORIGINS_ALBUM_JSON)
        .expect("Failed to encode");
    assert_eq!(payload, origins_album());

    let resolved = registry
        .resolve("album.topic.name", false)
        .found()
        .expect("Album should be mapped");
    let decoder = ProtoDecoder::new(resolved.schema);
    let original = decoder
        .decode_with(resolved.descriptor, &origins_album())
        .expect("Failed to decode original");
    let round_tripped = decoder
        .decode_with(resolved.descriptor, &payload)
        .expect("Failed to decode round trip");
    assert_eq!(original, round_tripped);
}

#[test]
fn test_encode_unmapped_topic_fails() {
    let registry = SchemaRegistry::build(&lens_protobuf::testing::album_and_film_mappings())
        .expect("Failed to build registry");
    assert!(encode_record(&registry, "random.topic.name", false, "{}").is_err());
    assert!(encode_record(&registry, "film.topic.name", true, "{}").is_err());
}

#[test]
fn test_unsupported_config_extension() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join("lens.json");
    fs::write(&path, "{}").expect("Failed to write config");
    assert!(LensConfig::from_file(&path).is_err());
}
