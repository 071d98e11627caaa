//! JSON rendering of decoded messages.
//!
//! Output layout:
//!
//! ```text
//! {
//!   "title": "Origins",
//!   "artist": ["Imagine Dragons"],
//!   "tracks": [{
//!     "name": "Birds"
//!   }, {
//!     "name": "Zero"
//!   }],
//!   "releaseYear": 2018
//! }
//! ```
//!
//! Objects put one field per line, indented two spaces per level; arrays stay
//! on the line that opens them. Keys follow declaration order and absent
//! fields are left out.

use crate::error::DecodeError;
use base64::Engine;
use lens_types::{
    ProtoFieldDescriptor, ProtoFieldValue, ProtoMessage, ProtoMessageDescriptor, ProtoSchema,
    ProtoType,
};
use serde::Deserialize;
use std::collections::HashMap;

/// Rendering switches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    /// Use field names as declared in the .proto file instead of JSON names
    pub preserve_proto_field_names: bool,
    /// Drop newlines, indentation and the spaces after `:` and `,`
    pub omit_whitespace: bool,
}

/// Renders [`ProtoMessage`] values to JSON text.
#[derive(Debug, Clone, Copy)]
pub struct JsonRenderer<'a> {
    schema: &'a ProtoSchema,
    options: &'a RenderOptions,
}

impl<'a> JsonRenderer<'a> {
    pub fn new(schema: &'a ProtoSchema, options: &'a RenderOptions) -> Self {
        Self { schema, options }
    }

    /// Render `message`, which must have been decoded against `descriptor`.
    pub fn render(
        &self,
        descriptor: &ProtoMessageDescriptor,
        message: &ProtoMessage,
    ) -> Result<String, DecodeError> {
        let mut writer = JsonWriter::new(self.options.omit_whitespace);
        self.write_message(&mut writer, descriptor, message)?;
        Ok(writer.finish())
    }

    fn write_message(
        &self,
        w: &mut JsonWriter,
        descriptor: &ProtoMessageDescriptor,
        message: &ProtoMessage,
    ) -> Result<(), DecodeError> {
        w.print("{");
        w.newline();
        w.indent();
        let mut printed_field = false;
        for (index, value) in message.iter() {
            let Some(field) = descriptor.field_at(index) else {
                continue;
            };
            if printed_field {
                w.print(",");
                w.newline();
            } else {
                printed_field = true;
            }
            let key = if self.options.preserve_proto_field_names {
                &field.name
            } else {
                &field.json_name
            };
            w.print(&quote(key));
            w.print(":");
            w.space();
            self.write_field(w, field, value)?;
        }
        if printed_field {
            w.newline();
        }
        w.outdent();
        w.print("}");
        Ok(())
    }

    fn write_field(
        &self,
        w: &mut JsonWriter,
        field: &ProtoFieldDescriptor,
        value: &ProtoFieldValue,
    ) -> Result<(), DecodeError> {
        match value {
            ProtoFieldValue::Repeated(elements) if field.is_map => {
                self.write_map(w, field, elements)
            }
            ProtoFieldValue::Repeated(elements) => {
                w.print("[");
                for (i, element) in elements.iter().enumerate() {
                    if i > 0 {
                        w.print(",");
                        w.space();
                    }
                    self.write_value(w, &field.field_type, element)?;
                }
                w.print("]");
                Ok(())
            }
            single => self.write_value(w, &field.field_type, single),
        }
    }

    fn write_map(
        &self,
        w: &mut JsonWriter,
        field: &ProtoFieldDescriptor,
        entries: &[ProtoFieldValue],
    ) -> Result<(), DecodeError> {
        let entry_descriptor = self.message_descriptor(&field.field_type)?;
        let (Some(key_field), Some(value_field)) = (
            entry_descriptor.field_by_number(1),
            entry_descriptor.field_by_number(2),
        ) else {
            return Err(DecodeError::ProtobufDecode(format!(
                "map entry {} lacks key or value",
                entry_descriptor.name
            )));
        };

        // Later duplicates replace the value but keep the first position
        let mut keys: Vec<String> = Vec::new();
        let mut values: Vec<ProtoFieldValue> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();
        for entry in entries {
            let ProtoFieldValue::Message(entry) = entry else {
                continue;
            };
            let key = match entry.get_by_index(key_field.index) {
                Some(value) => map_key(value),
                None => map_key(&self.default_value(&key_field.field_type)),
            };
            let value = entry
                .get_by_index(value_field.index)
                .cloned()
                .unwrap_or_else(|| self.default_value(&value_field.field_type));
            match positions.get(&key) {
                Some(&at) => values[at] = value,
                None => {
                    positions.insert(key.clone(), keys.len());
                    keys.push(key);
                    values.push(value);
                }
            }
        }

        w.print("{");
        w.newline();
        w.indent();
        for (i, (key, value)) in keys.iter().zip(&values).enumerate() {
            if i > 0 {
                w.print(",");
                w.newline();
            }
            w.print(&quote(key));
            w.print(":");
            w.space();
            self.write_value(w, &value_field.field_type, value)?;
        }
        if !keys.is_empty() {
            w.newline();
        }
        w.outdent();
        w.print("}");
        Ok(())
    }

    fn write_value(
        &self,
        w: &mut JsonWriter,
        field_type: &ProtoType,
        value: &ProtoFieldValue,
    ) -> Result<(), DecodeError> {
        match value {
            ProtoFieldValue::Message(nested) => {
                let descriptor = self.message_descriptor(field_type)?;
                self.write_message(w, descriptor, nested)?;
            }
            ProtoFieldValue::Enum(number) => {
                let name = match field_type {
                    ProtoType::Enum(enum_name) => self
                        .schema
                        .get_enum(enum_name)
                        .and_then(|e| e.value_name(*number)),
                    _ => None,
                };
                match name {
                    Some(name) => w.print(&quote(name)),
                    None => w.print(&number.to_string()),
                }
            }
            ProtoFieldValue::Double(v) => w.print(&format_double(*v)),
            ProtoFieldValue::Float(v) => w.print(&format_float(*v)),
            ProtoFieldValue::Int32(v) => w.print(&v.to_string()),
            ProtoFieldValue::Int64(v) => w.print(&v.to_string()),
            ProtoFieldValue::Uint32(v) => w.print(&v.to_string()),
            ProtoFieldValue::Uint64(v) => w.print(&v.to_string()),
            ProtoFieldValue::Bool(v) => w.print(if *v { "true" } else { "false" }),
            ProtoFieldValue::String(s) => w.print(&quote(s)),
            ProtoFieldValue::Bytes(b) => {
                // Base64 needs no escaping; `=` padding stays literal
                w.print(&format!(
                    "\"{}\"",
                    base64::engine::general_purpose::STANDARD.encode(b)
                ))
            }
            ProtoFieldValue::Repeated(elements) => {
                // Only reachable for malformed trees; render inline like a field
                w.print("[");
                for (i, element) in elements.iter().enumerate() {
                    if i > 0 {
                        w.print(",");
                        w.space();
                    }
                    self.write_value(w, field_type, element)?;
                }
                w.print("]");
            }
        }
        Ok(())
    }

    fn message_descriptor(
        &self,
        field_type: &ProtoType,
    ) -> Result<&'a ProtoMessageDescriptor, DecodeError> {
        match field_type {
            ProtoType::Message(name) => self
                .schema
                .get_message(name)
                .ok_or_else(|| DecodeError::MessageTypeNotFound(name.clone())),
            other => Err(DecodeError::ProtobufDecode(format!(
                "{other} is not a message type"
            ))),
        }
    }

    /// The value an unset field of `field_type` reads as.
    fn default_value(&self, field_type: &ProtoType) -> ProtoFieldValue {
        match field_type {
            ProtoType::Double => ProtoFieldValue::Double(0.0),
            ProtoType::Float => ProtoFieldValue::Float(0.0),
            ProtoType::Int32 | ProtoType::Sint32 | ProtoType::Sfixed32 => {
                ProtoFieldValue::Int32(0)
            }
            ProtoType::Int64 | ProtoType::Sint64 | ProtoType::Sfixed64 => {
                ProtoFieldValue::Int64(0)
            }
            ProtoType::Uint32 | ProtoType::Fixed32 => ProtoFieldValue::Uint32(0),
            ProtoType::Uint64 | ProtoType::Fixed64 => ProtoFieldValue::Uint64(0),
            ProtoType::Bool => ProtoFieldValue::Bool(false),
            ProtoType::String => ProtoFieldValue::String(String::new()),
            ProtoType::Bytes => ProtoFieldValue::Bytes(Vec::new()),
            ProtoType::Enum(name) => ProtoFieldValue::Enum(
                self.schema
                    .get_enum(name)
                    .and_then(|e| e.values.first())
                    .map_or(0, |v| v.number),
            ),
            ProtoType::Message(name) | ProtoType::Group(name) => {
                ProtoFieldValue::Message(Box::new(ProtoMessage::new(name.clone())))
            }
        }
    }
}

/// Map keys are always JSON strings.
fn map_key(value: &ProtoFieldValue) -> String {
    match value {
        ProtoFieldValue::String(s) => s.clone(),
        ProtoFieldValue::Int32(v) | ProtoFieldValue::Enum(v) => v.to_string(),
        ProtoFieldValue::Int64(v) => v.to_string(),
        ProtoFieldValue::Uint32(v) => v.to_string(),
        ProtoFieldValue::Uint64(v) => v.to_string(),
        ProtoFieldValue::Bool(v) => v.to_string(),
        other => other.kind().to_string(),
    }
}

/// JSON string literal with HTML-safe escaping: `<`, `>`, `&`, `=`, `'` and
/// the line/paragraph separators become `\uXXXX` escapes.
fn quote(s: &str) -> String {
    let json = serde_json::Value::String(s.to_string()).to_string();
    if !json.contains(['<', '>', '&', '=', '\'', '\u{2028}', '\u{2029}']) {
        return json;
    }
    let mut out = String::with_capacity(json.len() + 16);
    for c in json.chars() {
        match c {
            '<' | '>' | '&' | '=' | '\'' | '\u{2028}' | '\u{2029}' => {
                out.push_str(&format!("\\u{:04x}", u32::from(c)));
            }
            other => out.push(other),
        }
    }
    out
}

fn format_double(v: f64) -> String {
    if v.is_finite() {
        serde_json::Value::from(v).to_string()
    } else {
        quote(non_finite_name(v.is_nan(), v > 0.0))
    }
}

fn format_float(v: f32) -> String {
    if v.is_finite() {
        // Shortest representation that round-trips through f32
        serde_json::to_string(&v).unwrap_or_else(|_| f64::from(v).to_string())
    } else {
        quote(non_finite_name(v.is_nan(), v > 0.0))
    }
}

fn non_finite_name(is_nan: bool, positive: bool) -> &'static str {
    match (is_nan, positive) {
        (true, _) => "NaN",
        (false, true) => "Infinity",
        (false, false) => "-Infinity",
    }
}

/// Indentation-aware text sink: indentation is emitted lazily at the start of
/// each line, so nested writers never need to know their column.
struct JsonWriter {
    out: String,
    level: usize,
    at_line_start: bool,
    compact: bool,
}

impl JsonWriter {
    fn new(compact: bool) -> Self {
        Self {
            out: String::new(),
            level: 0,
            at_line_start: false,
            compact,
        }
    }

    fn print(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        if self.at_line_start {
            for _ in 0..self.level {
                self.out.push_str("  ");
            }
            self.at_line_start = false;
        }
        self.out.push_str(text);
    }

    fn newline(&mut self) {
        if !self.compact {
            self.out.push('\n');
            self.at_line_start = true;
        }
    }

    fn space(&mut self) {
        if !self.compact {
            self.print(" ");
        }
    }

    fn indent(&mut self) {
        self.level += 1;
    }

    fn outdent(&mut self) {
        self.level = self.level.saturating_sub(1);
    }

    fn finish(self) -> String {
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::decoder::ProtoDecoder;
    use crate::proto::descriptor_set::parse_descriptor_set;
    use crate::testing::{
        album_descriptor_set, choice_descriptor_set, encode_with, origins_album,
        shop_descriptor_set, ORIGINS_ALBUM_JSON,
    };

    fn render_payload(descriptor_set: &[u8], message_type: &str, payload: &[u8]) -> String {
        render_with(descriptor_set, message_type, payload, &RenderOptions::default())
    }

    fn render_with(
        descriptor_set: &[u8],
        message_type: &str,
        payload: &[u8],
        options: &RenderOptions,
    ) -> String {
        let schema = parse_descriptor_set(descriptor_set).expect("Failed to load schema");
        let descriptor = schema.get_message(message_type).expect("Unknown type");
        let message = ProtoDecoder::new(&schema)
            .decode_with(descriptor, payload)
            .expect("Failed to decode");
        JsonRenderer::new(&schema, options)
            .render(descriptor, &message)
            .expect("Failed to render")
    }

    #[test]
    fn test_render_album_golden() {
        let json = render_payload(&album_descriptor_set(), "Album", &origins_album());
        assert_eq!(json, ORIGINS_ALBUM_JSON);
    }

    #[test]
    fn test_render_preserving_field_names() {
        let options = RenderOptions {
            preserve_proto_field_names: true,
            omit_whitespace: false,
        };
        let json = render_with(&album_descriptor_set(), "Album", &origins_album(), &options);
        assert!(json.contains("\"release_year\": 2018"));
        assert!(json.contains("\"song_title\": [\"Birds\""));
    }

    #[test]
    fn test_render_compact() {
        let options = RenderOptions {
            preserve_proto_field_names: false,
            omit_whitespace: true,
        };
        let json = render_with(&album_descriptor_set(), "Album", &origins_album(), &options);
        assert_eq!(
            json,
            r#"{"title":"Origins","artist":["Imagine Dragons"],"releaseYear":2018,"songTitle":["Birds","Zero","Natural","Machine"]}"#
        );
    }

    #[test]
    fn test_absent_fields_are_omitted() {
        let payload = encode_with(|s| s.write_int32(3, 1999));
        let json = render_payload(&album_descriptor_set(), "Album", &payload);
        assert_eq!(json, "{\n  \"releaseYear\": 1999\n}");
    }

    #[test]
    fn test_render_empty_message() {
        let json = render_payload(&album_descriptor_set(), "Album", &[]);
        assert_eq!(json, "{\n}");
    }

    #[test]
    fn test_render_declaration_order_nested_enum_map_bytes() {
        let line_item = |sku: &str, count: u32| {
            encode_with(|s| {
                s.write_string(1, sku)?;
                s.write_uint32(2, count)
            })
        };
        let entry = |key: &str, value: i32| {
            encode_with(|s| {
                s.write_string(1, key)?;
                s.write_int32(2, value)
            })
        };
        let customer = encode_with(|s| {
            s.write_string(1, "Alice")?;
            s.write_sint64(2, -5)?;
            s.write_bool(3, true)?;
            s.write_float(5, 4.5)
        });

        // Written in ascending wire-number order, rendered in declaration order
        let payload = encode_with(|s| {
            s.write_double(1, 12.5)?;
            s.write_bytes(2, &line_item("A-1", 2))?;
            s.write_bytes(2, &line_item("B-2", 1))?;
            s.write_bytes(3, &customer)?;
            s.write_bytes(4, &entry("A-1", 2))?;
            s.write_bytes(4, &entry("B-2", 1))?;
            s.write_bytes(5, b"sig")?;
            s.write_int64(6, 7)?;
            s.write_string(7, "o-1")?;
            s.write_enum(15, 1)
        });

        let json = render_payload(&shop_descriptor_set(), "shop.Order", &payload);
        let expected = concat!(
            "{\n",
            "  \"orderId\": \"o-1\",\n",
            "  \"items\": [{\n",
            "    \"sku\": \"A-1\",\n",
            "    \"count\": 2\n",
            "  }, {\n",
            "    \"sku\": \"B-2\",\n",
            "    \"count\": 1\n",
            "  }],\n",
            "  \"status\": \"SHIPPED\",\n",
            "  \"quantities\": {\n",
            "    \"A-1\": 2,\n",
            "    \"B-2\": 1\n",
            "  },\n",
            "  \"signature\": \"c2ln\",\n",
            "  \"total\": 12.5,\n",
            "  \"customer\": {\n",
            "    \"name\": \"Alice\",\n",
            "    \"balance\": -5,\n",
            "    \"vip\": true,\n",
            "    \"rating\": 4.5\n",
            "  },\n",
            "  \"tags\": [7]\n",
            "}"
        );
        assert_eq!(json, expected);
    }

    #[test]
    fn test_render_unknown_enum_number_and_float_forms() {
        let payload = encode_with(|s| {
            s.write_double(1, 2.0)?;
            s.write_enum(15, 42)
        });
        let json = render_payload(&shop_descriptor_set(), "shop.Order", &payload);
        assert_eq!(json, "{\n  \"status\": 42,\n  \"total\": 2.0\n}");

        let payload = encode_with(|s| s.write_double(1, f64::NEG_INFINITY));
        let json = render_payload(&shop_descriptor_set(), "shop.Order", &payload);
        assert_eq!(json, "{\n  \"total\": \"-Infinity\"\n}");
    }

    #[test]
    fn test_render_map_duplicate_keys_and_defaults() {
        let entry = |key: &str, value: i32| {
            encode_with(|s| {
                s.write_string(1, key)?;
                s.write_int32(2, value)
            })
        };
        let key_only = encode_with(|s| s.write_string(1, "c"));
        let payload = encode_with(|s| {
            s.write_bytes(4, &entry("a", 1))?;
            s.write_bytes(4, &entry("b", 2))?;
            s.write_bytes(4, &entry("a", 3))?;
            s.write_bytes(4, &key_only)
        });
        let json = render_payload(&shop_descriptor_set(), "shop.Order", &payload);
        assert_eq!(
            json,
            "{\n  \"quantities\": {\n    \"a\": 3,\n    \"b\": 2,\n    \"c\": 0\n  }\n}"
        );
    }

    #[test]
    fn test_render_explicitly_empty_repeated() {
        let payload = encode_with(|s| s.write_bytes(6, &[]));
        let json = render_payload(&shop_descriptor_set(), "shop.Order", &payload);
        assert_eq!(json, "{\n  \"tags\": []\n}");
    }

    #[test]
    fn test_render_escapes_strings() {
        let payload = encode_with(|s| s.write_string(1, "Say \"hi\"\n\\"));
        let json = render_payload(&album_descriptor_set(), "Album", &payload);
        assert_eq!(json, "{\n  \"title\": \"Say \\\"hi\\\"\\n\\\\\"\n}");
    }

    #[test]
    fn test_render_html_safe_escapes() {
        let payload = encode_with(|s| s.write_string(1, "Rock & <Roll> = 'live'\u{2028}"));
        let json = render_payload(&album_descriptor_set(), "Album", &payload);
        assert_eq!(
            json,
            r#"{
  "title": "Rock \u0026 \u003cRoll\u003e \u003d \u0027live\u0027\u2028"
}"#
        );
        assert_eq!(quote("plain"), "\"plain\"");

        // Base64 padding is not escaped
        let payload = encode_with(|s| s.write_bytes(5, b"sig!"));
        let json = render_payload(&shop_descriptor_set(), "shop.Order", &payload);
        assert_eq!(json, "{\n  \"signature\": \"c2lnIQ==\"\n}");
    }

    #[test]
    fn test_render_only_last_oneof_member() {
        let payload = encode_with(|s| {
            s.write_string(1, "x")?;
            s.write_int32(2, 5)
        });
        let json = render_payload(&choice_descriptor_set(), "Choice", &payload);
        assert_eq!(json, "{\n  \"b\": 5\n}");
    }

    #[test]
    fn test_format_numbers() {
        assert_eq!(format_double(2018.5), "2018.5");
        assert_eq!(format_double(f64::NAN), "\"NaN\"");
        assert_eq!(format_float(0.1), "0.1");
        assert_eq!(format_float(f32::INFINITY), "\"Infinity\"");
    }
}
