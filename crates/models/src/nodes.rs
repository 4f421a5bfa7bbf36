use indexmap::IndexMap;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Node is one node of the schema dialect, as authored in dictionary files.
///
/// Parsing is deliberately lenient: every field is optional, and the
/// combination a node actually uses is checked by [`Node::classify`], so
/// that the validation pass can report every structural problem of a tree
/// instead of failing on the first.
#[derive(Serialize, Deserialize, Clone, Debug, Default, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct Node {
    /// # Human description. Required on every property.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// # Node type: object, array, enum, enum_array, one_of, or the name
    /// of a custom type from the type dictionary.
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_: Option<String>,
    /// # Reference to another schema file within the dictionary tree,
    /// given instead of `type`.
    #[serde(default, rename = "$ref", skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    /// # Whether the enclosing object lists this property in `required`.
    #[serde(default, skip_serializing_if = "is_false")]
    pub required: bool,
    /// # Properties of an object node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<IndexMap<String, Node>>,
    /// # Whether an object node accepts undeclared properties.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_properties: Option<bool>,
    /// # Item schema of an array node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<Node>>,
    /// # Enumerator name of an enum or enum_array node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enums: Option<String>,
    /// # Discriminator property of a one_of node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_property: Option<String>,
    /// # Branch schemas of a one_of node, keyed by discriminator value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schemas: Option<IndexMap<String, Node>>,
}

fn is_false(b: &bool) -> bool {
    !*b
}

/// Kind is the exhaustive classification of a [`Node`], borrowed from it.
/// The resolver matches on Kind so that every variant of the dialect is
/// handled explicitly.
pub enum Kind<'a> {
    Object {
        properties: &'a IndexMap<String, Node>,
        additional_properties: bool,
    },
    Array {
        items: &'a Node,
    },
    Enum {
        enums: &'a str,
    },
    EnumArray {
        enums: &'a str,
    },
    OneOf {
        type_property: &'a str,
        schemas: &'a IndexMap<String, Node>,
        properties: Option<&'a IndexMap<String, Node>>,
    },
    Ref {
        reference: &'a str,
    },
    Named {
        name: &'a str,
    },
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ClassifyError {
    #[error("node has neither `type` nor `$ref`")]
    MissingType,
    #[error("`object` requires `properties`")]
    ObjectWithoutProperties,
    #[error("`array` requires `items`")]
    ArrayWithoutItems,
    #[error("`{0}` requires `enums`")]
    EnumWithoutEnums(String),
    #[error("`one_of` requires `type_property`")]
    OneOfWithoutTypeProperty,
    #[error("`one_of` requires a non-empty `schemas` map")]
    OneOfWithoutSchemas,
}

impl Node {
    pub fn classify(&self) -> Result<Kind<'_>, ClassifyError> {
        use ClassifyError::*;

        if let Some(reference) = &self.reference {
            return Ok(Kind::Ref { reference });
        }
        let type_ = self.type_.as_deref().ok_or(MissingType)?;

        match type_ {
            "object" => match &self.properties {
                Some(properties) => Ok(Kind::Object {
                    properties,
                    additional_properties: self.additional_properties.unwrap_or(false),
                }),
                None => Err(ObjectWithoutProperties),
            },
            "array" => match &self.items {
                Some(items) => Ok(Kind::Array { items }),
                None => Err(ArrayWithoutItems),
            },
            "enum" | "enum_array" => match &self.enums {
                Some(enums) if type_ == "enum" => Ok(Kind::Enum { enums }),
                Some(enums) => Ok(Kind::EnumArray { enums }),
                None => Err(EnumWithoutEnums(type_.to_string())),
            },
            "one_of" => {
                let type_property = self
                    .type_property
                    .as_deref()
                    .ok_or(OneOfWithoutTypeProperty)?;
                match &self.schemas {
                    Some(schemas) if !schemas.is_empty() => Ok(Kind::OneOf {
                        type_property,
                        schemas,
                        properties: self.properties.as_ref(),
                    }),
                    _ => Err(OneOfWithoutSchemas),
                }
            }
            name => Ok(Kind::Named { name }),
        }
    }
}
