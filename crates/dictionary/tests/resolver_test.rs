use std::collections::BTreeMap;

use dictionary::{Context, EnumeratorRegistry};
use models::{EnumeratorSet, ErrorKind, Errors, Node, TypeDef};
use pretty_assertions::assert_eq;
use serde_json::json;

fn schemas(entries: &[(&str, &str)]) -> BTreeMap<String, Node> {
    entries
        .iter()
        .map(|(stem, yaml)| (stem.to_string(), serde_yaml::from_str(yaml).unwrap()))
        .collect()
}

fn types(entries: &[(&str, &str)]) -> BTreeMap<String, TypeDef> {
    entries
        .iter()
        .map(|(name, yaml)| (name.to_string(), serde_yaml::from_str(yaml).unwrap()))
        .collect()
}

fn enumerator_sets() -> Vec<EnumeratorSet> {
    serde_json::from_value(json!([
        {
            "name": "Enumerations",
            "status": "active",
            "version": 1,
            "enumerators": {
                "media_status": {"draft": "Not yet published", "published": "Live"},
                "media_tags": {"action": "Action", "comedy": "Comedy"}
            }
        }
    ]))
    .unwrap()
}

#[test]
fn test_object_with_custom_types() {
    let sets = enumerator_sets();
    let mut errors = Errors::new();
    let registry = EnumeratorRegistry::new(&sets, &mut errors);

    let types = types(&[
        ("word", "schema: {type: string, maxLength: 40}"),
        ("count", "schema: {type: integer, minimum: 0}"),
    ]);
    let schemas = schemas(&[(
        "users.1.0.0",
        r##"
description: A user of the platform
type: object
properties:
  userName: {type: word, description: Login name, required: true}
  visits: {type: count, description: Total visits}
"##,
    )]);

    let ctx = Context {
        registry: &registry,
        types: &types,
        schemas: &schemas,
        enumerator_version: Some(1),
    };
    let resolved = ctx.resolve_file("users.1.0.0", &mut errors).unwrap();
    assert!(errors.is_empty(), "{errors:?}");

    assert_eq!(
        resolved.json,
        json!({
            "description": "A user of the platform",
            "type": "object",
            "properties": {
                "userName": {"description": "Login name", "type": "string", "maxLength": 40},
                "visits": {"description": "Total visits", "type": "integer", "minimum": 0},
            },
            "required": ["userName"],
            "additionalProperties": false,
        })
    );
    assert_eq!(
        resolved.bson,
        json!({
            "description": "A user of the platform",
            "bsonType": "object",
            "properties": {
                "userName": {"description": "Login name", "bsonType": "string", "maxLength": 40},
                "visits": {"description": "Total visits", "bsonType": "int", "minimum": 0},
            },
            "required": ["userName"],
            "additionalProperties": false,
        })
    );
}

#[test]
fn test_enum_and_enum_array() {
    let sets = enumerator_sets();
    let mut errors = Errors::new();
    let registry = EnumeratorRegistry::new(&sets, &mut errors);

    let types = BTreeMap::new();
    let schemas = schemas(&[(
        "media.1.0.0",
        r##"
type: object
properties:
  status: {type: enum, enums: media_status, description: Publication status, required: true}
  tags: {type: enum_array, enums: media_tags, description: Applied tags}
"##,
    )]);

    let ctx = Context {
        registry: &registry,
        types: &types,
        schemas: &schemas,
        enumerator_version: Some(1),
    };
    let resolved = ctx.resolve_file("media.1.0.0", &mut errors).unwrap();
    assert!(errors.is_empty(), "{errors:?}");

    assert_eq!(
        resolved.json["properties"]["status"],
        json!({
            "description": "Publication status",
            "type": "string",
            "enum": ["draft", "published"],
        })
    );
    assert_eq!(
        resolved.bson["properties"]["tags"],
        json!({
            "description": "Applied tags",
            "bsonType": "array",
            "items": {"bsonType": "string", "enum": ["action", "comedy"]},
        })
    );
}

#[test]
fn test_one_of_rendering() {
    let sets = enumerator_sets();
    let mut errors = Errors::new();
    let registry = EnumeratorRegistry::new(&sets, &mut errors);

    let types = types(&[("word", "schema: {type: string}")]);
    let schemas = schemas(&[(
        "cards.1.0.0",
        r##"
type: one_of
type_property: card_type
properties:
  card_type: {type: word, description: Card discriminator, required: true}
  title: {type: word, description: Display title}
schemas:
  book:
    type: object
    properties:
      author: {type: word, description: Book author}
  movie:
    type: object
    properties:
      director: {type: word, description: Movie director}
"##,
    )]);

    let ctx = Context {
        registry: &registry,
        types: &types,
        schemas: &schemas,
        enumerator_version: Some(1),
    };
    let resolved = ctx.resolve_file("cards.1.0.0", &mut errors).unwrap();
    assert!(errors.is_empty(), "{errors:?}");

    assert_eq!(
        resolved.json["properties"]["card_type"],
        json!({
            "description": "Card discriminator",
            "type": "string",
            "enum": ["book", "movie"],
        })
    );
    assert_eq!(resolved.json["required"], json!(["card_type"]));

    let one_of = resolved.json["oneOf"].as_array().unwrap();
    assert_eq!(one_of.len(), 2);
    assert_eq!(
        one_of[0]["if"],
        json!({"properties": {"card_type": {"const": "book"}}})
    );
    assert_eq!(
        one_of[0]["then"],
        json!({
            "type": "object",
            "properties": {
                "author": {"description": "Book author", "type": "string"},
            },
            "additionalProperties": false,
        })
    );
    assert_eq!(
        one_of[1]["if"],
        json!({"properties": {"card_type": {"const": "movie"}}})
    );

    // The base object does not constrain additional properties, so branch
    // properties remain admissible.
    assert!(resolved.json.get("additionalProperties").is_none());

    // BSON form mirrors the construct with bsonType spellings.
    assert_eq!(
        resolved.bson["oneOf"][1]["then"]["properties"]["director"],
        json!({"description": "Movie director", "bsonType": "string"})
    );
}

#[test]
fn test_ref_resolution_and_cycles() {
    let sets = enumerator_sets();
    let mut errors = Errors::new();
    let registry = EnumeratorRegistry::new(&sets, &mut errors);

    let types = types(&[("word", "schema: {type: string}")]);
    let schemas = schemas(&[
        (
            "orders.1.0.0",
            r##"
type: object
properties:
  shipping: {$ref: address.1.0.0, description: Shipping address}
  billing: {$ref: address.1.0.0, description: Billing address}
"##,
        ),
        (
            "address.1.0.0",
            r##"
type: object
properties:
  street: {type: word, description: Street line, required: true}
"##,
        ),
        ("loop_a.1.0.0", "{$ref: loop_b.1.0.0}"),
        ("loop_b.1.0.0", "{$ref: loop_a.1.0.0}"),
        ("dangling.1.0.0", "{$ref: nonexistent.1.0.0}"),
    ]);

    let ctx = Context {
        registry: &registry,
        types: &types,
        schemas: &schemas,
        enumerator_version: Some(1),
    };

    // Both references expand to the same resolved file, each keeping its
    // own authored description.
    let resolved = ctx.resolve_file("orders.1.0.0", &mut errors).unwrap();
    assert!(errors.is_empty(), "{errors:?}");
    assert_eq!(
        resolved.json["properties"]["shipping"],
        json!({
            "description": "Shipping address",
            "type": "object",
            "properties": {"street": {"description": "Street line", "type": "string"}},
            "required": ["street"],
            "additionalProperties": false,
        })
    );
    assert_eq!(
        resolved.json["properties"]["billing"]["description"],
        json!("Billing address")
    );

    let mut errors = Errors::new();
    ctx.resolve_file("loop_a.1.0.0", &mut errors).unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].kind, ErrorKind::CircularReference);

    let mut errors = Errors::new();
    ctx.resolve_file("dangling.1.0.0", &mut errors).unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].kind, ErrorKind::UnknownRef);
    assert_eq!(errors[0].scope, "dictionary/dangling.1.0.0.yaml");
}

#[test]
fn test_circular_custom_type() {
    let sets = enumerator_sets();
    let mut errors = Errors::new();
    let registry = EnumeratorRegistry::new(&sets, &mut errors);

    let types = types(&[
        (
            "tree",
            r##"
type: object
properties:
  child: {type: tree, description: Recursive child}
"##,
        ),
    ]);
    let schemas = schemas(&[("t.1.0.0", "{type: tree}")]);

    let ctx = Context {
        registry: &registry,
        types: &types,
        schemas: &schemas,
        enumerator_version: Some(1),
    };
    ctx.resolve_file("t.1.0.0", &mut errors).unwrap();

    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].kind, ErrorKind::CircularTypeReference);
}

#[test]
fn test_errors_accumulate_without_aborting() {
    let sets = enumerator_sets();
    let mut errors = Errors::new();
    let registry = EnumeratorRegistry::new(&sets, &mut errors);

    let types = BTreeMap::new();
    let schemas = schemas(&[(
        "broken.1.0.0",
        r##"
type: object
properties:
  a: {type: mystery, description: Unknown type}
  b: {type: word}
  c: {type: enum, enums: missing, description: Unknown enumerator}
"##,
    )]);

    let ctx = Context {
        registry: &registry,
        types: &types,
        schemas: &schemas,
        enumerator_version: Some(1),
    };
    ctx.resolve_file("broken.1.0.0", &mut errors).unwrap();

    let kinds: Vec<ErrorKind> = errors.iter().map(|err| err.kind).collect();
    assert_eq!(
        kinds,
        vec![
            ErrorKind::UnknownType,
            ErrorKind::MissingDescription,
            ErrorKind::UnknownType,
            ErrorKind::UnknownEnumerator,
        ]
    );
    assert_eq!(
        errors[0].scope,
        "dictionary/broken.1.0.0.yaml#/properties/a"
    );
}

#[test]
fn test_resolution_is_deterministic() {
    let sets = enumerator_sets();
    let mut errors = Errors::new();
    let registry = EnumeratorRegistry::new(&sets, &mut errors);

    let types = types(&[("word", "schema: {type: string}")]);
    let schemas = schemas(&[(
        "users.1.0.0",
        r##"
type: object
properties:
  zeta: {type: word, description: Listed first}
  alpha: {type: word, description: Listed second}
"##,
    )]);

    let ctx = Context {
        registry: &registry,
        types: &types,
        schemas: &schemas,
        enumerator_version: Some(1),
    };

    let one = ctx.resolve_file("users.1.0.0", &mut errors).unwrap();
    let two = ctx.resolve_file("users.1.0.0", &mut errors).unwrap();
    assert_eq!(
        serde_json::to_string(&one.json).unwrap(),
        serde_json::to_string(&two.json).unwrap()
    );

    // Output preserves authored property order, not lexicographic order.
    let keys: Vec<&String> = one.json["properties"].as_object().unwrap().keys().collect();
    assert_eq!(keys, vec!["zeta", "alpha"]);
}
