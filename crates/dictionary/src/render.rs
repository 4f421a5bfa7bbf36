use serde_json::{Map, Value};

use crate::resolver::Resolved;

/// Draft tag stamped onto rendered JSON-Schema documents.
pub const JSON_SCHEMA_DRAFT: &str = "https://json-schema.org/draft/2020-12/schema";

/// Render the JSON-Schema document of a resolved schema, for API consumers.
pub fn render_json_schema(resolved: &Resolved) -> Value {
    let mut out = Map::new();
    out.insert(
        "$schema".to_string(),
        Value::String(JSON_SCHEMA_DRAFT.to_string()),
    );
    if let Value::Object(fields) = &resolved.json {
        for (key, value) in fields {
            out.insert(key.clone(), value.clone());
        }
    }
    Value::Object(out)
}

/// Render the BSON-schema document of a resolved schema, suitable for the
/// `$jsonSchema` operator of a collection validator.
pub fn render_bson_schema(resolved: &Resolved) -> Value {
    resolved.bson.clone()
}

/// Render a minimal OpenAPI component-schemas excerpt naming `collection`.
pub fn render_open_api(collection: &str, resolved: &Resolved) -> Value {
    let mut schemas = Map::new();
    schemas.insert(collection.to_string(), resolved.json.clone());

    let mut components = Map::new();
    components.insert("schemas".to_string(), Value::Object(schemas));

    let mut out = Map::new();
    out.insert("openapi".to_string(), Value::String("3.1.0".to_string()));
    out.insert("components".to_string(), Value::Object(components));
    Value::Object(out)
}
