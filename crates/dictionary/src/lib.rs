//! Expansion of the declarative schema dialect into concrete JSON-Schema
//! and BSON-schema documents: the enumerator registry, the type dictionary,
//! the recursive resolver, and the output renderers.

mod registry;
mod render;
mod resolver;
mod types;

pub use registry::{EnumeratorRegistry, LookupError};
pub use render::{render_bson_schema, render_json_schema, render_open_api, JSON_SCHEMA_DRAFT};
pub use resolver::{Context, Resolved};
pub use types::{primitive_bson, primitive_json};
