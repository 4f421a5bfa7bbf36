//! Loader of the declarative input tree:
//!
//! ```text
//! <root>/
//!   collections/<name>.yaml              CollectionConfig
//!   dictionary/<name>.<M>.<m>.<p>.yaml   schema document
//!   dictionary/types/<type>.yaml         primitive or complex type
//!   data/enumerators.json                enumerator sets
//!   data/<file>.json                     test-data document array
//! ```
//!
//! Loading never aborts on a bad file: every parse failure is recorded into
//! the returned [`Sources::errors`] table and the walk continues, so that
//! the validation pass can report the complete picture at once.

use std::collections::BTreeMap;
use std::path::Path;

use models::{
    CollectionConfig, EnumeratorSet, ErrorKind, Errors, Node, Scope, TypeDef,
};
use serde_json::Value;

mod fixtures;

/// Sources holds every parsed document of one input tree. It is constructed
/// once, at load time, and treated as read-only for the rest of the run.
#[derive(Default, Debug)]
pub struct Sources {
    /// Collection configurations, keyed by collection name.
    pub collections: BTreeMap<String, CollectionConfig>,
    /// Schema documents, keyed by file stem (`<name>.<M>.<m>.<p>`).
    pub schemas: BTreeMap<String, Node>,
    /// Type dictionary entries, keyed by type name.
    pub types: BTreeMap<String, TypeDef>,
    /// Enumerator sets, in file order.
    pub enumerators: Vec<EnumeratorSet>,
    /// Test-data document arrays, keyed by file stem.
    pub test_data: BTreeMap<String, Vec<Value>>,
    /// Accumulated load errors.
    pub errors: Errors,
}

impl Sources {
    /// Build Sources from an in-memory fixture: a map of relative path to
    /// file content, where content is either a string (parsed according to
    /// the path's extension) or an already-parsed document. Used by tests
    /// across the workspace.
    pub fn from_fixture(fixture: &Value) -> Sources {
        fixtures::evaluate(fixture)
    }
}

/// Load an input tree rooted at `root`.
pub fn load_tree(root: &Path) -> Sources {
    let mut sources = Sources::default();

    for dir in ["collections", "dictionary", "dictionary/types", "data"] {
        let abs = root.join(dir);
        if !abs.is_dir() {
            tracing::warn!(directory = %abs.display(), "input directory is absent; skipping");
            continue;
        }

        for name in sorted_file_names(&abs, &mut sources.errors, dir) {
            let rel = format!("{dir}/{name}");
            let scope = Scope::new(&rel);

            match std::fs::read_to_string(abs.join(&name)) {
                Ok(content) => route(&mut sources, scope, &rel, Raw::Text(&content)),
                Err(err) => {
                    sources
                        .errors
                        .push_at(scope, ErrorKind::MalformedFile, format!("reading file: {err}"));
                }
            }
        }
    }

    tracing::debug!(
        collections = sources.collections.len(),
        schemas = sources.schemas.len(),
        types = sources.types.len(),
        enumerator_sets = sources.enumerators.len(),
        errors = sources.errors.len(),
        root = %root.display(),
        "loaded input tree",
    );
    sources
}

/// Plain files of `dir`, sorted by name for a deterministic walk.
fn sorted_file_names(dir: &Path, errors: &mut Errors, rel: &str) -> Vec<String> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            errors.push(rel, ErrorKind::MalformedFile, format!("reading directory: {err}"));
            return Vec::new();
        }
    };

    let mut names: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_file())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| !name.starts_with('.'))
        .collect();
    names.sort();
    names
}

/// Raw is un-parsed file content, or a document already parsed from a
/// fixture.
pub(crate) enum Raw<'a> {
    Text(&'a str),
    Parsed(&'a Value),
}

/// Route one file into its table by relative path, recording an error if
/// the path or content doesn't conform to the tree contract.
pub(crate) fn route(sources: &mut Sources, scope: Scope<'_>, rel: &str, raw: Raw<'_>) {
    let (dir, name) = match rel.split_once('/') {
        Some(split) => split,
        None => {
            sources.errors.push_at(
                scope,
                ErrorKind::UnsupportedFileKind,
                "files must live under collections/, dictionary/, or data/",
            );
            return;
        }
    };

    match (dir, name.split_once('/')) {
        ("collections", None) => {
            if yaml_stem(name).is_none() {
                return unsupported(sources, scope, "expected a .yaml file");
            }
            if let Some(config) = parse::<CollectionConfig>(sources, scope, raw, rel) {
                let key = config.name.to_string();
                if sources.collections.insert(key.clone(), config).is_some() {
                    sources.errors.push_at(
                        scope,
                        ErrorKind::InvalidName,
                        format!("collection {key:?} is configured more than once"),
                    );
                }
            }
        }
        ("dictionary", Some(("types", type_file))) => {
            let Some(stem) = yaml_stem(type_file) else {
                return unsupported(sources, scope, "expected a .yaml file");
            };
            if let Some(def) = parse::<TypeDef>(sources, scope, raw, rel) {
                sources.types.insert(stem.to_string(), def);
            }
        }
        ("dictionary", None) => {
            let Some(stem) = yaml_stem(name) else {
                return unsupported(sources, scope, "expected a .yaml file");
            };
            if let Some(node) = parse::<Node>(sources, scope, raw, rel) {
                sources.schemas.insert(stem.to_string(), node);
            }
        }
        ("data", None) if name == "enumerators.json" => {
            if let Some(sets) = parse::<Vec<EnumeratorSet>>(sources, scope, raw, rel) {
                sources.enumerators = sets;
            }
        }
        ("data", None) => {
            let Some(stem) = name.strip_suffix(".json") else {
                return unsupported(sources, scope, "expected a .json file");
            };
            if let Some(docs) = parse::<Vec<Value>>(sources, scope, raw, rel) {
                sources.test_data.insert(stem.to_string(), docs);
            }
        }
        _ => unsupported(
            sources,
            scope,
            "path does not match the input tree contract",
        ),
    }
}

fn unsupported(sources: &mut Sources, scope: Scope<'_>, detail: &str) {
    sources
        .errors
        .push_at(scope, ErrorKind::UnsupportedFileKind, detail);
}

fn yaml_stem(name: &str) -> Option<&str> {
    name.strip_suffix(".yaml")
        .or_else(|| name.strip_suffix(".yml"))
}

/// Parse file content into `T`, recording MalformedFile on failure.
/// Text content under data/ is JSON; everything else is YAML.
fn parse<T: serde::de::DeserializeOwned>(
    sources: &mut Sources,
    scope: Scope<'_>,
    raw: Raw<'_>,
    rel: &str,
) -> Option<T> {
    let result = match raw {
        Raw::Text(content) if rel.starts_with("data/") => {
            serde_json::from_str(content).map_err(|err| err.to_string())
        }
        Raw::Text(content) => serde_yaml::from_str(content).map_err(|err| err.to_string()),
        Raw::Parsed(value) => {
            serde_json::from_value(value.clone()).map_err(|err| err.to_string())
        }
    };

    match result {
        Ok(parsed) => Some(parsed),
        Err(detail) => {
            sources
                .errors
                .push_at(scope, ErrorKind::MalformedFile, detail);
            None
        }
    }
}
