use serde::{Deserialize, Serialize};

/// ErrorKind classifies every diagnostic the pre-run validation pass can
/// produce. Kinds are stable identifiers surfaced to operators and tests.
#[derive(Serialize, Deserialize, Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorKind {
    BadVersionString,
    VersionOutOfOrder,
    DuplicateVersion,
    UnknownType,
    CircularTypeReference,
    MissingTypeField,
    MissingDescription,
    UnknownEnumerator,
    UnknownEnumeratorVersion,
    DuplicateEnumeratorSet,
    UnknownRef,
    CircularReference,
    MalformedFile,
    UnsupportedFileKind,
    InvalidName,
    InvalidIndex,
    InvalidSchema,
    MissingTestData,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        use ErrorKind::*;
        match self {
            BadVersionString => "BadVersionString",
            VersionOutOfOrder => "VersionOutOfOrder",
            DuplicateVersion => "DuplicateVersion",
            UnknownType => "UnknownType",
            CircularTypeReference => "CircularTypeReference",
            MissingTypeField => "MissingTypeField",
            MissingDescription => "MissingDescription",
            UnknownEnumerator => "UnknownEnumerator",
            UnknownEnumeratorVersion => "UnknownEnumeratorVersion",
            DuplicateEnumeratorSet => "DuplicateEnumeratorSet",
            UnknownRef => "UnknownRef",
            CircularReference => "CircularReference",
            MalformedFile => "MalformedFile",
            UnsupportedFileKind => "UnsupportedFileKind",
            InvalidName => "InvalidName",
            InvalidIndex => "InvalidIndex",
            InvalidSchema => "InvalidSchema",
            MissingTestData => "MissingTestData",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error is one aggregated validation diagnostic, scoped to the file and
/// location which produced it.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Error {
    #[serde(rename = "path")]
    pub scope: String,
    pub kind: ErrorKind,
    #[serde(rename = "message")]
    pub detail: String,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}: {}", self.scope, self.kind, self.detail)
    }
}

/// Errors accumulates diagnostics across an entire load / validation run.
/// Passes push into it and keep going; nothing mutates the database while
/// it is non-empty.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct Errors(Vec<Error>);

impl Errors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, scope: impl Into<String>, kind: ErrorKind, detail: impl Into<String>) {
        self.0.push(Error {
            scope: scope.into(),
            kind,
            detail: detail.into(),
        });
    }

    pub fn push_at(&mut self, scope: Scope<'_>, kind: ErrorKind, detail: impl Into<String>) {
        self.push(scope.flatten(), kind, detail);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Error> {
        self.0.iter()
    }

    pub fn into_inner(self) -> Vec<Error> {
        self.0
    }
}

impl std::ops::Deref for Errors {
    type Target = [Error];

    fn deref(&self) -> &[Error] {
        &self.0
    }
}

impl Extend<Error> for Errors {
    fn extend<T: IntoIterator<Item = Error>>(&mut self, iter: T) {
        self.0.extend(iter)
    }
}

impl IntoIterator for Errors {
    type Item = Error;
    type IntoIter = std::vec::IntoIter<Error>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl FromIterator<Error> for Errors {
    fn from_iter<T: IntoIterator<Item = Error>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Scope is a stack-based mechanism for tracking the fine-grained location
/// of the node currently being processed. Scopes are cheap to copy and
/// borrow their parent, so pushing never allocates; `flatten` renders the
/// full path once, when an error is actually recorded.
#[derive(Copy, Clone)]
pub struct Scope<'a> {
    parent: Option<&'a Scope<'a>>,
    segment: Segment<'a>,
}

#[derive(Copy, Clone)]
enum Segment<'a> {
    // Root of a new resource, named by its relative path.
    Resource(&'a str),
    Property(&'a str),
    Item(usize),
}

impl<'a> Scope<'a> {
    /// Create a new scope rooted at the given resource.
    pub fn new(resource: &'a str) -> Scope<'a> {
        Scope {
            parent: None,
            segment: Segment::Resource(resource),
        }
    }

    /// Push a resource onto the current scope, returning a new scope.
    pub fn push_resource(&'a self, resource: &'a str) -> Scope<'a> {
        Scope {
            parent: Some(self),
            segment: Segment::Resource(resource),
        }
    }

    /// Push a property name onto the current scope, returning a new scope.
    pub fn push_prop(&'a self, name: &'a str) -> Scope<'a> {
        Scope {
            parent: Some(self),
            segment: Segment::Property(name),
        }
    }

    /// Push an item index onto the current scope, returning a new scope.
    pub fn push_item(&'a self, index: usize) -> Scope<'a> {
        Scope {
            parent: Some(self),
            segment: Segment::Item(index),
        }
    }

    /// Flatten into the innermost resource path, extended with a JSON
    /// pointer of the location within it.
    pub fn flatten(&self) -> String {
        let mut segments = Vec::new();
        let mut cursor = Some(self);
        let mut resource = "";

        while let Some(scope) = cursor {
            match scope.segment {
                Segment::Resource(r) => {
                    resource = r;
                    break;
                }
                Segment::Property(p) => segments.push(p.to_string()),
                Segment::Item(i) => segments.push(i.to_string()),
            }
            cursor = scope.parent;
        }
        segments.reverse();

        if segments.is_empty() {
            resource.to_string()
        } else {
            format!("{resource}#/{}", segments.join("/"))
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_scope_flatten() {
        let root = Scope::new("collections/users.yaml");
        let versions = root.push_prop("versions");
        let first = versions.push_item(0);
        let version = first.push_prop("version");

        assert_eq!(root.flatten(), "collections/users.yaml");
        assert_eq!(
            version.flatten(),
            "collections/users.yaml#/versions/0/version"
        );

        // Pushing a resource re-roots the flattened path.
        let referenced = first.push_resource("dictionary/user.1.0.0.yaml");
        let inner = referenced.push_prop("properties");
        assert_eq!(
            inner.flatten(),
            "dictionary/user.1.0.0.yaml#/properties"
        );
    }

    #[test]
    fn test_errors_accumulate_in_order() {
        let mut errors = Errors::new();
        errors.push("a.yaml", ErrorKind::MalformedFile, "bad indent");
        errors.push("b.yaml#/versions/0", ErrorKind::BadVersionString, "1.0.0.A");

        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].kind, ErrorKind::MalformedFile);
        assert_eq!(errors[1].kind, ErrorKind::BadVersionString);

        let value = serde_json::to_value(errors.iter().collect::<Vec<_>>()).unwrap();
        assert_eq!(
            value,
            serde_json::json!([
                {"path": "a.yaml", "kind": "MalformedFile", "message": "bad indent"},
                {"path": "b.yaml#/versions/0", "kind": "BadVersionString", "message": "1.0.0.A"},
            ])
        );
    }
}
