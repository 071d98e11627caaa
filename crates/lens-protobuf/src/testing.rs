//! Test fixtures: descriptor sets and payloads built in code.
//!
//! Descriptor sets are assembled from `protobuf::descriptor` types exactly as
//! `protoc --descriptor_set_out` would emit them (fully-qualified type names,
//! `json_name` populated), so tests need neither `protoc` nor checked-in
//! binary files. Payloads are written with `CodedOutputStream`.

use protobuf::descriptor::field_descriptor_proto::{Label, Type};
use protobuf::descriptor::{
    DescriptorProto, EnumDescriptorProto, EnumValueDescriptorProto, FieldDescriptorProto,
    FileDescriptorProto, FileDescriptorSet, MessageOptions, OneofDescriptorProto,
};
use protobuf::{CodedOutputStream, Message, MessageField};

use crate::registry::TopicMapping;

/// A singular field descriptor with `json_name` derived the way protoc does.
pub fn field(name: &str, number: i32, type_: Type) -> FieldDescriptorProto {
    let mut f = FieldDescriptorProto::new();
    f.name = Some(name.to_string());
    f.json_name = Some(lens_types::to_json_name(name));
    f.number = Some(number);
    f.type_ = Some(type_.into());
    f.label = Some(Label::LABEL_OPTIONAL.into());
    f
}

/// A repeated field descriptor.
pub fn repeated(name: &str, number: i32, type_: Type) -> FieldDescriptorProto {
    let mut f = field(name, number, type_);
    f.label = Some(Label::LABEL_REPEATED.into());
    f
}

/// A message- or enum-typed field referring to `type_name` (e.g. `.shop.Customer`).
pub fn typed(name: &str, number: i32, type_: Type, type_name: &str) -> FieldDescriptorProto {
    let mut f = field(name, number, type_);
    f.type_name = Some(type_name.to_string());
    f
}

pub fn message(name: &str, fields: Vec<FieldDescriptorProto>) -> DescriptorProto {
    let mut m = DescriptorProto::new();
    m.name = Some(name.to_string());
    m.field = fields;
    m
}

/// A synthesized map entry message (`key = 1`, `value = 2`).
pub fn map_entry(
    name: &str,
    key: FieldDescriptorProto,
    value: FieldDescriptorProto,
) -> DescriptorProto {
    let mut m = message(name, vec![key, value]);
    let mut options = MessageOptions::new();
    options.map_entry = Some(true);
    m.options = MessageField::some(options);
    m
}

pub fn enumeration(name: &str, values: &[(&str, i32)]) -> EnumDescriptorProto {
    let mut e = EnumDescriptorProto::new();
    e.name = Some(name.to_string());
    e.value = values
        .iter()
        .map(|(value_name, number)| {
            let mut v = EnumValueDescriptorProto::new();
            v.name = Some(value_name.to_string());
            v.number = Some(*number);
            v
        })
        .collect();
    e
}

pub fn file(
    name: &str,
    package: Option<&str>,
    messages: Vec<DescriptorProto>,
    enums: Vec<EnumDescriptorProto>,
) -> FileDescriptorProto {
    let mut f = FileDescriptorProto::new();
    f.name = Some(name.to_string());
    f.package = package.map(str::to_string);
    f.syntax = Some("proto3".to_string());
    f.message_type = messages;
    f.enum_type = enums;
    f
}

/// Serialize files into `FileDescriptorSet` bytes.
pub fn descriptor_set(files: Vec<FileDescriptorProto>) -> Vec<u8> {
    let mut set = FileDescriptorSet::new();
    set.file = files;
    set.write_to_bytes().expect("Failed to serialize descriptor set")
}

/// `album.proto`:
///
/// ```proto
/// message Album {
///   string title = 1;
///   repeated string artist = 2;
///   int32 release_year = 3;
///   repeated string song_title = 4;
/// }
/// ```
pub fn album_descriptor_set() -> Vec<u8> {
    descriptor_set(vec![file(
        "album.proto",
        None,
        vec![message(
            "Album",
            vec![
                field("title", 1, Type::TYPE_STRING),
                repeated("artist", 2, Type::TYPE_STRING),
                field("release_year", 3, Type::TYPE_INT32),
                repeated("song_title", 4, Type::TYPE_STRING),
            ],
        )],
        vec![],
    )])
}

/// `film.proto`:
///
/// ```proto
/// message Film {
///   string name = 1;
///   string producer = 2;
///   int32 release_year = 3;
///   int32 duration = 4;
///   repeated string starring = 5;
/// }
/// ```
pub fn film_descriptor_set() -> Vec<u8> {
    descriptor_set(vec![file(
        "film.proto",
        None,
        vec![message(
            "Film",
            vec![
                field("name", 1, Type::TYPE_STRING),
                field("producer", 2, Type::TYPE_STRING),
                field("release_year", 3, Type::TYPE_INT32),
                field("duration", 4, Type::TYPE_INT32),
                repeated("starring", 5, Type::TYPE_STRING),
            ],
        )],
        vec![],
    )])
}

/// `shop.proto`, exercising nesting, enums, maps, packed fields and wire
/// numbers declared out of sequence:
///
/// ```proto
/// package shop;
/// enum Status { PENDING = 0; SHIPPED = 1; }
/// message Order {
///   message LineItem { string sku = 1; uint32 count = 2; }
///   string order_id = 7;
///   repeated LineItem items = 2;
///   Status status = 15;
///   map<string, int32> quantities = 4;
///   bytes signature = 5;
///   double total = 1;
///   Customer customer = 3;
///   repeated int64 tags = 6;
/// }
/// message Customer {
///   string name = 1;
///   sint64 balance = 2;
///   bool vip = 3;
///   Customer referrer = 4;
///   float rating = 5;
/// }
/// ```
pub fn shop_descriptor_set() -> Vec<u8> {
    let mut order = message(
        "Order",
        vec![
            field("order_id", 7, Type::TYPE_STRING),
            {
                let mut f = typed("items", 2, Type::TYPE_MESSAGE, ".shop.Order.LineItem");
                f.label = Some(Label::LABEL_REPEATED.into());
                f
            },
            typed("status", 15, Type::TYPE_ENUM, ".shop.Status"),
            {
                let mut f = typed(
                    "quantities",
                    4,
                    Type::TYPE_MESSAGE,
                    ".shop.Order.QuantitiesEntry",
                );
                f.label = Some(Label::LABEL_REPEATED.into());
                f
            },
            field("signature", 5, Type::TYPE_BYTES),
            field("total", 1, Type::TYPE_DOUBLE),
            typed("customer", 3, Type::TYPE_MESSAGE, ".shop.Customer"),
            repeated("tags", 6, Type::TYPE_INT64),
        ],
    );
    order.nested_type = vec![
        message(
            "LineItem",
            vec![
                field("sku", 1, Type::TYPE_STRING),
                field("count", 2, Type::TYPE_UINT32),
            ],
        ),
        map_entry(
            "QuantitiesEntry",
            field("key", 1, Type::TYPE_STRING),
            field("value", 2, Type::TYPE_INT32),
        ),
    ];

    let customer = message(
        "Customer",
        vec![
            field("name", 1, Type::TYPE_STRING),
            field("balance", 2, Type::TYPE_SINT64),
            field("vip", 3, Type::TYPE_BOOL),
            typed("referrer", 4, Type::TYPE_MESSAGE, ".shop.Customer"),
            field("rating", 5, Type::TYPE_FLOAT),
        ],
    );

    descriptor_set(vec![file(
        "shop.proto",
        Some("shop"),
        vec![order, customer],
        vec![enumeration("Status", &[("PENDING", 0), ("SHIPPED", 1)])],
    )])
}

/// `choice.proto`:
///
/// ```proto
/// message Choice {
///   oneof kind {
///     string a = 1;
///     int32 b = 2;
///   }
///   optional string note = 3;
///   string title = 4;
/// }
/// ```
///
/// `note` gets the synthetic oneof `_note` that protoc emits for proto3
/// `optional`.
pub fn choice_descriptor_set() -> Vec<u8> {
    let in_oneof = |mut f: FieldDescriptorProto, index: i32| {
        f.oneof_index = Some(index);
        f
    };
    let mut note = in_oneof(field("note", 3, Type::TYPE_STRING), 1);
    note.proto3_optional = Some(true);

    let mut choice = message(
        "Choice",
        vec![
            in_oneof(field("a", 1, Type::TYPE_STRING), 0),
            in_oneof(field("b", 2, Type::TYPE_INT32), 0),
            note,
            field("title", 4, Type::TYPE_STRING),
        ],
    );
    choice.oneof_decl = ["kind", "_note"]
        .iter()
        .map(|name| {
            let mut oneof = OneofDescriptorProto::new();
            oneof.name = Some(name.to_string());
            oneof
        })
        .collect();

    descriptor_set(vec![file("choice.proto", None, vec![choice], vec![])])
}

/// Run `write` against a fresh `CodedOutputStream` and return the bytes.
pub fn encode_with<F>(write: F) -> Vec<u8>
where
    F: FnOnce(&mut CodedOutputStream) -> protobuf::Result<()>,
{
    let mut buffer = Vec::new();
    {
        let mut stream = CodedOutputStream::vec(&mut buffer);
        write(&mut stream).expect("Failed to write payload");
        stream.flush().expect("Failed to flush payload");
    }
    buffer
}

pub fn encode_album(title: &str, artists: &[&str], release_year: i32, songs: &[&str]) -> Vec<u8> {
    encode_with(|stream| {
        stream.write_string(1, title)?;
        for artist in artists {
            stream.write_string(2, artist)?;
        }
        stream.write_int32(3, release_year)?;
        for song in songs {
            stream.write_string(4, song)?;
        }
        Ok(())
    })
}

pub fn encode_film(
    name: &str,
    producer: &str,
    release_year: i32,
    duration: i32,
    starring: &[&str],
) -> Vec<u8> {
    encode_with(|stream| {
        stream.write_string(1, name)?;
        stream.write_string(2, producer)?;
        stream.write_int32(3, release_year)?;
        stream.write_int32(4, duration)?;
        for star in starring {
            stream.write_string(5, star)?;
        }
        Ok(())
    })
}

/// The "Origins" album payload.
pub fn origins_album() -> Vec<u8> {
    encode_album(
        "Origins",
        &["Imagine Dragons"],
        2018,
        &["Birds", "Zero", "Natural", "Machine"],
    )
}

/// The "Star Wars: The Force Awakens" film payload.
pub fn force_awakens_film() -> Vec<u8> {
    encode_film(
        "Star Wars: The Force Awakens",
        "J. J. Abrams",
        2015,
        135,
        &[
            "Harrison Ford",
            "Mark Hamill",
            "Carrie Fisher",
            "Adam Driver",
            "Daisy Ridley",
        ],
    )
}

/// Mappings `album.*` → `Album` and `film.*` → `Film`, both without key types.
pub fn album_and_film_mappings() -> Vec<TopicMapping> {
    vec![
        TopicMapping::new("album.*", album_descriptor_set(), "Album"),
        TopicMapping::new("film.*", film_descriptor_set(), "Film"),
    ]
}

pub const ORIGINS_ALBUM_JSON: &str = "{\n  \"title\": \"Origins\",\n  \"artist\": [\"Imagine Dragons\"],\n  \"releaseYear\": 2018,\n  \"songTitle\": [\"Birds\", \"Zero\", \"Natural\", \"Machine\"]\n}";

pub const FORCE_AWAKENS_FILM_JSON: &str = "{\n  \"name\": \"Star Wars: The Force Awakens\",\n  \"producer\": \"J. J. Abrams\",\n  \"releaseYear\": 2015,\n  \"duration\": 135,\n  \"starring\": [\"Harrison Ford\", \"Mark Hamill\", \"Carrie Fisher\", \"Adam Driver\", \"Daisy Ridley\"]\n}";
