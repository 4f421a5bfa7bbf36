//! Fixture evaluation: build [`Sources`] from an in-memory description of
//! an input tree, so tests can exercise the full load path without touching
//! the filesystem.

use serde_json::Value;

use crate::{route, Raw, Sources};
use models::{ErrorKind, Scope};

pub(crate) fn evaluate(fixture: &Value) -> Sources {
    let mut sources = Sources::default();

    let Some(files) = fixture.as_object() else {
        sources.errors.push(
            "<fixture>",
            ErrorKind::MalformedFile,
            "fixture must be a map of relative path to file content",
        );
        return sources;
    };

    for (rel, content) in files {
        let scope = Scope::new(rel);
        match content {
            Value::String(text) => route(&mut sources, scope, rel, Raw::Text(text)),
            parsed => route(&mut sources, scope, rel, Raw::Parsed(parsed)),
        }
    }
    sources
}
