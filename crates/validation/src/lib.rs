//! The pre-run validation pass: a dry run of the entire load and resolve
//! pipeline which aggregates every structural error of an input tree,
//! without mutating anything. The processor refuses to run while this pass
//! returns a non-empty list.

use std::collections::BTreeSet;

use dictionary::{Context, EnumeratorRegistry};
use models::{EnumeratorStatus, ErrorKind, Errors, Scope, TypeDef, Version};
use sources::Sources;

/// Validate loaded sources, returning the complete ordered list of errors.
/// The pass is successful iff the returned list is empty, and an empty list
/// guarantees that every declared `(collection, version)` pair renders.
pub fn validate(sources: &Sources) -> Errors {
    let mut errors = sources.errors.clone();

    let registry = EnumeratorRegistry::new(&sources.enumerators, &mut errors);

    // Referenced (schema stem, enumerator version) pairs, each dry-resolved
    // exactly once below.
    let mut referenced: BTreeSet<(String, u32)> = BTreeSet::new();

    for (name, config) in &sources.collections {
        let rel = format!("collections/{name}.yaml");
        let scope = Scope::new(&rel);

        if !config.name.is_valid() {
            errors.push_at(
                scope.push_prop("name"),
                ErrorKind::InvalidName,
                format!("collection name {name:?} must match {}", models::COLLECTION_RE.as_str()),
            );
        }

        let versions_scope = scope.push_prop("versions");
        if config.versions.is_empty() {
            errors.push_at(
                versions_scope,
                ErrorKind::InvalidSchema,
                "a collection must declare at least one version",
            );
        }
        let mut previous: Option<Version> = None;

        for (index, spec) in config.versions.iter().enumerate() {
            let spec_scope = versions_scope.push_item(index);

            let version = match spec.parsed_version() {
                Ok(version) => version,
                Err(err) => {
                    errors.push_at(
                        spec_scope.push_prop("version"),
                        ErrorKind::BadVersionString,
                        err.to_string(),
                    );
                    continue;
                }
            };

            match previous {
                Some(prior) if version == prior => {
                    errors.push_at(
                        spec_scope.push_prop("version"),
                        ErrorKind::DuplicateVersion,
                        format!("version {version} is declared more than once"),
                    );
                }
                Some(prior) if version < prior => {
                    errors.push_at(
                        spec_scope.push_prop("version"),
                        ErrorKind::VersionOutOfOrder,
                        format!("version {version} does not exceed its predecessor {prior}"),
                    );
                }
                _ => (),
            }
            previous = Some(version);

            // The schema document this version installs.
            let stem = format!("{name}.{}", version.schema_suffix());
            if sources.schemas.contains_key(&stem) {
                referenced.insert((stem, version.enumerators));
            } else {
                errors.push_at(
                    spec_scope,
                    ErrorKind::UnknownRef,
                    format!("schema file dictionary/{stem}.yaml was not found"),
                );
            }

            // The enumerator set the version resolves against.
            match registry.status(version.enumerators) {
                Some(EnumeratorStatus::Active) => (),
                Some(EnumeratorStatus::Deprecated) => {
                    errors.push_at(
                        spec_scope.push_prop("version"),
                        ErrorKind::UnknownEnumeratorVersion,
                        format!(
                            "enumerator set version {} is deprecated",
                            version.enumerators
                        ),
                    );
                }
                None => {
                    errors.push_at(
                        spec_scope.push_prop("version"),
                        ErrorKind::UnknownEnumeratorVersion,
                        format!(
                            "no enumerator set exists at version {}",
                            version.enumerators
                        ),
                    );
                }
            }

            if let Some(test_data) = &spec.test_data {
                if !sources.test_data.contains_key(test_data) {
                    errors.push_at(
                        spec_scope.push_prop("test_data"),
                        ErrorKind::MissingTestData,
                        format!("test-data file data/{test_data}.json was not found"),
                    );
                }
            }

            let add_scope = spec_scope.push_prop("add_indexes");
            for (position, index) in spec.add_indexes.iter().enumerate() {
                if index.name.is_empty() || index.key.is_empty() {
                    errors.push_at(
                        add_scope.push_item(position),
                        ErrorKind::InvalidIndex,
                        "an index requires a name and a non-empty key",
                    );
                }
            }
        }
    }

    // Dry-resolve every referenced pair, exactly once each.
    for (stem, enumerator_version) in &referenced {
        let ctx = Context {
            registry: &registry,
            types: &sources.types,
            schemas: &sources.schemas,
            enumerator_version: Some(*enumerator_version),
        };
        ctx.resolve_file(stem, &mut errors);
    }

    // Schemas referenced by no collection version are still walked, without
    // an enumerator version to resolve values against.
    let referenced_stems: BTreeSet<&String> = referenced.iter().map(|(stem, _)| stem).collect();
    let free_ctx = Context {
        registry: &registry,
        types: &sources.types,
        schemas: &sources.schemas,
        enumerator_version: None,
    };
    for stem in sources.schemas.keys() {
        if !referenced_stems.contains(stem) {
            free_ctx.resolve_file(stem, &mut errors);
        }
    }

    // And so is every type-dictionary entry.
    for (name, def) in &sources.types {
        let rel = format!("dictionary/types/{name}.yaml");
        let scope = Scope::new(&rel);
        match def {
            TypeDef::Primitive(primitive) => {
                if !primitive.is_well_formed() {
                    errors.push_at(
                        scope,
                        ErrorKind::InvalidSchema,
                        "a primitive type must define `schema`, or both `json_schema` and `bson_schema`",
                    );
                }
            }
            TypeDef::Complex(node) => {
                free_ctx.resolve_node(scope, node, &mut errors);
            }
        }
    }

    let errors = dedup(errors);
    tracing::debug!(errors = errors.len(), "validation pass complete");
    errors
}

/// Nested walks can visit one location through several paths (a complex
/// type used by another complex type, a schema imported under two
/// versions). Identical rows collapse to the first occurrence, keeping
/// overall order.
fn dedup(errors: Errors) -> Errors {
    let mut seen = BTreeSet::new();
    errors
        .into_iter()
        .filter(|error| seen.insert((error.scope.clone(), error.kind, error.detail.clone())))
        .collect()
}
