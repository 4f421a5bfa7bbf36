use std::collections::BTreeMap;

use serde_json::{Map, Value};

use models::{ClassifyError, ErrorKind, Errors, Kind, Node, Scope, TypeDef};

use crate::registry::{EnumeratorRegistry, LookupError};
use crate::types::{primitive_bson, primitive_json};

/// Context is everything a resolution needs: the loaded schema files and
/// type dictionary, the enumerator registry, and the enumerator version of
/// the collection being resolved. `enumerator_version` is None when walking
/// a schema referenced by no collection, in which case enumerator names are
/// checked for existence but no value list is emitted.
pub struct Context<'a> {
    pub registry: &'a EnumeratorRegistry<'a>,
    pub types: &'a BTreeMap<String, TypeDef>,
    pub schemas: &'a BTreeMap<String, Node>,
    pub enumerator_version: Option<u32>,
}

/// Resolved is the pair of fully-expanded output trees for one schema:
/// a standard JSON-Schema fragment and its BSON-schema counterpart.
#[derive(Clone, Debug, PartialEq)]
pub struct Resolved {
    pub json: Value,
    pub bson: Value,
}

impl Resolved {
    fn empty() -> Self {
        Resolved {
            json: Value::Object(Map::new()),
            bson: Value::Object(Map::new()),
        }
    }
}

impl<'a> Context<'a> {
    /// Resolve the schema file `stem` (`<name>.<M>.<m>.<p>`), or None if no
    /// such file was loaded. Every structural or resolution problem found
    /// along the way is accumulated into `errors`; resolution never stops
    /// at the first problem and always yields best-effort output.
    pub fn resolve_file(&self, stem: &str, errors: &mut Errors) -> Option<Resolved> {
        let node = self.schemas.get(stem)?;
        let rel = format!("dictionary/{stem}.yaml");
        let scope = Scope::new(&rel);

        let mut walker = Walker {
            ctx: self,
            errors,
            ref_memo: BTreeMap::new(),
            refs_in_flight: vec![stem.to_string()],
            types_in_flight: Vec::new(),
        };
        Some(walker.node(scope, node, false))
    }

    /// Resolve a single node. Used for walking type-dictionary entries and
    /// by tests; collection schemas go through [`Context::resolve_file`].
    pub fn resolve_node(&self, scope: Scope<'_>, node: &Node, errors: &mut Errors) -> Resolved {
        let mut walker = Walker {
            ctx: self,
            errors,
            ref_memo: BTreeMap::new(),
            refs_in_flight: Vec::new(),
            types_in_flight: Vec::new(),
        };
        walker.node(scope, node, false)
    }
}

struct Walker<'c, 'e> {
    ctx: &'c Context<'c>,
    errors: &'e mut Errors,
    // Memo of already-resolved $ref files, and the two per-traversal
    // in-flight stacks which detect reference cycles.
    ref_memo: BTreeMap<String, Resolved>,
    refs_in_flight: Vec<String>,
    types_in_flight: Vec<String>,
}

impl<'c, 'e> Walker<'c, 'e> {
    fn node(&mut self, scope: Scope<'_>, node: &Node, is_property: bool) -> Resolved {
        if is_property && node.description.is_none() {
            self.errors.push_at(
                scope,
                ErrorKind::MissingDescription,
                "property is missing a description",
            );
        }

        let kind = match node.classify() {
            Ok(kind) => kind,
            Err(err) => {
                let kind = match err {
                    ClassifyError::MissingType => ErrorKind::MissingTypeField,
                    _ => ErrorKind::InvalidSchema,
                };
                self.errors.push_at(scope, kind, err.to_string());
                return Resolved::empty();
            }
        };

        match kind {
            Kind::Object {
                properties,
                additional_properties,
            } => self.object(scope, node, properties, additional_properties),
            Kind::Array { items } => self.array(scope, node, items),
            Kind::Enum { enums } => self.enumeration(scope, node, enums, false),
            Kind::EnumArray { enums } => self.enumeration(scope, node, enums, true),
            Kind::OneOf {
                type_property,
                schemas,
                properties,
            } => self.one_of(scope, node, type_property, schemas, properties),
            Kind::Ref { reference } => self.reference(scope, node, reference),
            Kind::Named { name } => self.named(scope, node, name),
        }
    }

    fn object(
        &mut self,
        scope: Scope<'_>,
        node: &Node,
        properties: &indexmap::IndexMap<String, Node>,
        additional_properties: bool,
    ) -> Resolved {
        let mut json_props = Map::new();
        let mut bson_props = Map::new();
        let mut required = Vec::new();

        let props_scope = scope.push_prop("properties");
        for (name, child) in properties {
            let child_scope = props_scope.push_prop(name);
            let resolved = self.node(child_scope, child, true);

            if child.required {
                required.push(Value::String(name.clone()));
            }
            json_props.insert(name.clone(), resolved.json);
            bson_props.insert(name.clone(), resolved.bson);
        }

        let assemble = |type_key: &str, props: Map<String, Value>| {
            let mut out = Map::new();
            if let Some(description) = &node.description {
                out.insert("description".to_string(), Value::String(description.clone()));
            }
            out.insert(
                type_key.to_string(),
                Value::String("object".to_string()),
            );
            out.insert("properties".to_string(), Value::Object(props));
            if !required.is_empty() {
                out.insert("required".to_string(), Value::Array(required.clone()));
            }
            out.insert(
                "additionalProperties".to_string(),
                Value::Bool(additional_properties),
            );
            Value::Object(out)
        };

        Resolved {
            json: assemble("type", json_props),
            bson: assemble("bsonType", bson_props),
        }
    }

    fn array(&mut self, scope: Scope<'_>, node: &Node, items: &Node) -> Resolved {
        let items_scope = scope.push_prop("items");
        let resolved = self.node(items_scope, items, false);

        let assemble = |type_key: &str, items: Value| {
            let mut out = Map::new();
            if let Some(description) = &node.description {
                out.insert("description".to_string(), Value::String(description.clone()));
            }
            out.insert(type_key.to_string(), Value::String("array".to_string()));
            out.insert("items".to_string(), items);
            Value::Object(out)
        };

        Resolved {
            json: assemble("type", resolved.json),
            bson: assemble("bsonType", resolved.bson),
        }
    }

    fn enumeration(&mut self, scope: Scope<'_>, node: &Node, enums: &str, wrap: bool) -> Resolved {
        let values = match self.ctx.enumerator_version {
            Some(version) => match self.ctx.registry.lookup(enums, version) {
                Ok(values) => Some(
                    values
                        .keys()
                        .map(|value| Value::String(value.clone()))
                        .collect::<Vec<_>>(),
                ),
                Err(err) => {
                    let kind = match err {
                        LookupError::UnknownVersion { .. } => ErrorKind::UnknownEnumeratorVersion,
                        LookupError::UnknownEnumerator { .. } => ErrorKind::UnknownEnumerator,
                    };
                    self.errors.push_at(scope, kind, err.to_string());
                    None
                }
            },
            None => {
                if !self.ctx.registry.is_known_name(enums) {
                    self.errors.push_at(
                        scope,
                        ErrorKind::UnknownEnumerator,
                        format!("enumerator {enums:?} is not defined by any enumerator set"),
                    );
                }
                None
            }
        };

        let string_schema = |type_key: &str| {
            let mut out = Map::new();
            if !wrap {
                if let Some(description) = &node.description {
                    out.insert("description".to_string(), Value::String(description.clone()));
                }
            }
            out.insert(type_key.to_string(), Value::String("string".to_string()));
            if let Some(values) = &values {
                out.insert("enum".to_string(), Value::Array(values.clone()));
            }
            Value::Object(out)
        };

        let assemble = |type_key: &str| {
            if !wrap {
                return string_schema(type_key);
            }
            let mut out = Map::new();
            if let Some(description) = &node.description {
                out.insert("description".to_string(), Value::String(description.clone()));
            }
            out.insert(type_key.to_string(), Value::String("array".to_string()));
            out.insert("items".to_string(), string_schema(type_key));
            Value::Object(out)
        };

        Resolved {
            json: assemble("type"),
            bson: assemble("bsonType"),
        }
    }

    fn one_of(
        &mut self,
        scope: Scope<'_>,
        node: &Node,
        type_property: &str,
        schemas: &indexmap::IndexMap<String, Node>,
        properties: Option<&indexmap::IndexMap<String, Node>>,
    ) -> Resolved {
        let discriminators: Vec<Value> = schemas
            .keys()
            .map(|value| Value::String(value.clone()))
            .collect();

        if !properties.is_some_and(|props| props.contains_key(type_property)) {
            self.errors.push_at(
                scope,
                ErrorKind::InvalidSchema,
                format!("one_of `type_property` {type_property:?} must name a declared property"),
            );
        }

        // Base-object properties: the common properties, with the
        // discriminator's entry constrained to the exact discriminator set.
        let mut json_props = Map::new();
        let mut bson_props = Map::new();
        let mut required = Vec::new();

        let props_scope = scope.push_prop("properties");
        for (name, child) in properties.into_iter().flatten() {
            if child.required {
                required.push(Value::String(name.clone()));
            }
            if name == type_property {
                let constrained = |type_key: &str| {
                    let mut out = Map::new();
                    if let Some(description) = &child.description {
                        out.insert("description".to_string(), Value::String(description.clone()));
                    }
                    out.insert(type_key.to_string(), Value::String("string".to_string()));
                    out.insert("enum".to_string(), Value::Array(discriminators.clone()));
                    Value::Object(out)
                };
                json_props.insert(name.clone(), constrained("type"));
                bson_props.insert(name.clone(), constrained("bsonType"));
                continue;
            }
            let child_scope = props_scope.push_prop(name);
            let resolved = self.node(child_scope, child, true);
            json_props.insert(name.clone(), resolved.json);
            bson_props.insert(name.clone(), resolved.bson);
        }

        // One alternative per branch: an if/then conditioned on the
        // discriminator's value. Branches inherit nothing from the base.
        let mut json_one_of = Vec::new();
        let mut bson_one_of = Vec::new();

        let schemas_scope = scope.push_prop("schemas");
        for (value, branch) in schemas {
            let branch_scope = schemas_scope.push_prop(value);
            let resolved = self.node(branch_scope, branch, false);

            let alternative = |branch: Value| {
                let mut condition_props = Map::new();
                condition_props.insert(
                    type_property.to_string(),
                    serde_json::json!({"const": value}),
                );
                let mut condition = Map::new();
                condition.insert("properties".to_string(), Value::Object(condition_props));

                let mut out = Map::new();
                out.insert("if".to_string(), Value::Object(condition));
                out.insert("then".to_string(), branch);
                Value::Object(out)
            };
            json_one_of.push(alternative(resolved.json));
            bson_one_of.push(alternative(resolved.bson));
        }

        let assemble = |type_key: &str, props: Map<String, Value>, one_of: Vec<Value>| {
            let mut out = Map::new();
            if let Some(description) = &node.description {
                out.insert("description".to_string(), Value::String(description.clone()));
            }
            out.insert(type_key.to_string(), Value::String("object".to_string()));
            out.insert("properties".to_string(), Value::Object(props));
            if !required.is_empty() {
                out.insert("required".to_string(), Value::Array(required.clone()));
            }
            out.insert("oneOf".to_string(), Value::Array(one_of));
            Value::Object(out)
        };

        Resolved {
            json: assemble("type", json_props, json_one_of),
            bson: assemble("bsonType", bson_props, bson_one_of),
        }
    }

    fn reference(&mut self, scope: Scope<'_>, node: &Node, reference: &str) -> Resolved {
        let stem = reference
            .strip_suffix(".yaml")
            .or_else(|| reference.strip_suffix(".yml"))
            .unwrap_or(reference);

        if self.refs_in_flight.iter().any(|flight| flight == stem) {
            self.errors.push_at(
                scope,
                ErrorKind::CircularReference,
                format!("$ref {reference:?} forms a reference cycle"),
            );
            return Resolved::empty();
        }
        if let Some(memoized) = self.ref_memo.get(stem) {
            return with_description(memoized.clone(), node.description.as_ref());
        }

        let ctx = self.ctx;
        let Some(target) = ctx.schemas.get(stem) else {
            self.errors.push_at(
                scope,
                ErrorKind::UnknownRef,
                format!("$ref {reference:?} does not name a schema file in the dictionary"),
            );
            return Resolved::empty();
        };

        self.refs_in_flight.push(stem.to_string());
        let rel = format!("dictionary/{stem}.yaml");
        let target_scope = scope.push_resource(&rel);
        let resolved = self.node(target_scope, target, false);
        self.refs_in_flight.pop();

        self.ref_memo.insert(stem.to_string(), resolved.clone());
        with_description(resolved, node.description.as_ref())
    }

    fn named(&mut self, scope: Scope<'_>, node: &Node, name: &str) -> Resolved {
        if self.types_in_flight.iter().any(|flight| flight == name) {
            self.errors.push_at(
                scope,
                ErrorKind::CircularTypeReference,
                format!("custom type {name:?} forms a reference cycle"),
            );
            return Resolved::empty();
        }

        let ctx = self.ctx;
        match ctx.types.get(name) {
            None => {
                self.errors.push_at(
                    scope,
                    ErrorKind::UnknownType,
                    format!("unknown type {name:?}"),
                );
                Resolved::empty()
            }
            Some(TypeDef::Primitive(primitive)) => {
                if !primitive.is_well_formed() {
                    self.errors.push_at(
                        scope,
                        ErrorKind::InvalidSchema,
                        format!(
                            "primitive type {name:?} must define `schema`, or both `json_schema` and `bson_schema`"
                        ),
                    );
                }
                let resolved = Resolved {
                    json: primitive_json(primitive).unwrap_or_else(|| Value::Object(Map::new())),
                    bson: primitive_bson(primitive).unwrap_or_else(|| Value::Object(Map::new())),
                };
                let description = node.description.as_ref().or(primitive.description.as_ref());
                with_description(resolved, description)
            }
            Some(TypeDef::Complex(complex)) => {
                self.types_in_flight.push(name.to_string());
                let rel = format!("dictionary/types/{name}.yaml");
                let type_scope = scope.push_resource(&rel);
                let resolved = self.node(type_scope, complex, false);
                self.types_in_flight.pop();

                with_description(resolved, node.description.as_ref())
            }
        }
    }
}

/// Set `description` on both output forms, placing it first so rendered
/// documents read naturally. A None description leaves the trees untouched.
fn with_description(mut resolved: Resolved, description: Option<&String>) -> Resolved {
    let Some(description) = description else {
        return resolved;
    };

    for tree in [&mut resolved.json, &mut resolved.bson] {
        if let Value::Object(fields) = tree {
            let mut fronted = Map::new();
            fronted.insert(
                "description".to_string(),
                Value::String(description.clone()),
            );
            for (key, value) in fields.iter() {
                if key != "description" {
                    fronted.insert(key.clone(), value.clone());
                }
            }
            *fields = fronted;
        }
    }
    resolved
}
