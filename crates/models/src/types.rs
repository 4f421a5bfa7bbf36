use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::Node;

/// TypeDef is one entry of the type dictionary, loaded from
/// `dictionary/types/<type>.yaml`: either a primitive rendered directly to
/// output schemas, or a complex type expressed in the schema dialect and
/// resolved recursively.
#[derive(Serialize, Deserialize, Clone, Debug, JsonSchema)]
#[serde(untagged)]
pub enum TypeDef {
    Primitive(PrimitiveType),
    Complex(Node),
}

/// PrimitiveType renders to a leaf schema. It takes one of two shapes:
///
/// * common: a single `schema` used for both output forms, with the
///   top-level `type` renamed to `bsonType` (and `integer` → `int`,
///   `number` → `double`) in the BSON form;
/// * format-specific: separate `json_schema` and `bson_schema` documents,
///   each used verbatim.
#[derive(Serialize, Deserialize, Clone, Debug, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct PrimitiveType {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json_schema: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bson_schema: Option<Value>,
}

impl PrimitiveType {
    /// A primitive is well-formed with a common `schema`, or with both
    /// format-specific branches, but not a mixture and not neither.
    pub fn is_well_formed(&self) -> bool {
        match (&self.schema, &self.json_schema, &self.bson_schema) {
            (Some(_), None, None) => true,
            (None, Some(_), Some(_)) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_primitive_common_form() {
        let def: TypeDef = serde_yaml::from_str(
            r##"
description: A short string of text
schema: {type: string, maxLength: 40}
"##,
        )
        .unwrap();
        let TypeDef::Primitive(p) = def else {
            panic!("expected primitive")
        };
        assert!(p.is_well_formed());
    }

    #[test]
    fn test_primitive_format_specific_form() {
        let def: TypeDef = serde_yaml::from_str(
            r##"
json_schema: {type: string, format: date-time}
bson_schema: {bsonType: date}
"##,
        )
        .unwrap();
        let TypeDef::Primitive(p) = def else {
            panic!("expected primitive")
        };
        assert!(p.is_well_formed());
    }

    #[test]
    fn test_primitive_mixed_form_is_malformed() {
        let def: TypeDef = serde_yaml::from_str(
            r##"
schema: {type: string}
bson_schema: {bsonType: string}
"##,
        )
        .unwrap();
        let TypeDef::Primitive(p) = def else {
            panic!("expected primitive")
        };
        assert!(!p.is_well_formed());
    }

    #[test]
    fn test_complex_type() {
        let def: TypeDef = serde_yaml::from_str(
            r##"
type: object
properties:
  street: {type: word, description: Street line}
  city: {type: word, description: City name}
"##,
        )
        .unwrap();
        assert!(matches!(def, TypeDef::Complex(_)));
    }
}
