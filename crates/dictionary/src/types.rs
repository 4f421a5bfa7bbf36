use serde_json::Value;

use models::PrimitiveType;

/// Render the JSON-schema form of a primitive: the common `schema` or the
/// `json_schema` branch, verbatim.
pub fn primitive_json(primitive: &PrimitiveType) -> Option<Value> {
    primitive
        .schema
        .as_ref()
        .or(primitive.json_schema.as_ref())
        .cloned()
}

/// Render the BSON-schema form of a primitive: the `bson_schema` branch
/// verbatim, or the common `schema` with its top-level `type` renamed to
/// `bsonType` (mapping the values `integer` → `int` and `number` →
/// `double`; all others are unchanged).
pub fn primitive_bson(primitive: &PrimitiveType) -> Option<Value> {
    if let Some(bson) = &primitive.bson_schema {
        return Some(bson.clone());
    }
    primitive.schema.as_ref().map(|schema| to_bson_form(schema))
}

fn to_bson_form(schema: &Value) -> Value {
    let Value::Object(fields) = schema else {
        return schema.clone();
    };

    // Rebuild in place so bsonType keeps the position type held.
    let fields = fields
        .iter()
        .map(|(key, value)| {
            if key == "type" {
                ("bsonType".to_string(), bson_type_name(value))
            } else {
                (key.clone(), value.clone())
            }
        })
        .collect();
    Value::Object(fields)
}

fn bson_type_name(value: &Value) -> Value {
    match value.as_str() {
        Some("integer") => Value::String("int".to_string()),
        Some("number") => Value::String("double".to_string()),
        _ => value.clone(),
    }
}
