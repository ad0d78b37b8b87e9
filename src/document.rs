use crate::error::ValidationError;
use crate::types::version::OpenApiVersion;
use crate::{
    COMPONENTS_FIELD, ENCODED_SLASH, ENCODED_TILDE, IN_FIELD, NAME_FIELD, OPENAPI_FIELD,
    PARAMETERS_FIELD, PATHS_FIELD, PATH_SEPARATOR, REF_FIELD, SECURITY_FIELD,
    SECURITY_SCHEMES_FIELD, SERVERS_FIELD, TILDE, URL_FIELD,
};
use dashmap::DashMap;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::sync::Arc;

/// Faults raised while navigating the document tree. These are internal;
/// validators translate them into [`ValidationError`]s at the boundary.
#[derive(Debug)]
pub enum DocumentError {
    MissingField(String),
    UnexpectedType(String),
    CircularReference(String),
    InvalidReference(String),
}

impl Display for DocumentError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            DocumentError::MissingField(field) => write!(f, "missing field '{}'", field),
            DocumentError::UnexpectedType(detail) => write!(f, "unexpected type: {}", detail),
            DocumentError::CircularReference(reference) => {
                write!(f, "circular reference '{}'", reference)
            }
            DocumentError::InvalidReference(reference) => {
                write!(f, "unresolvable reference '{}'", reference)
            }
        }
    }
}

impl std::error::Error for DocumentError {}

/// The outcome of following a node that may have been a `$ref`.
///
/// Plain nodes borrow straight from the tree; resolved references hand out the
/// cached, shared resolution.
#[derive(Debug, Clone)]
pub enum Resolved<'a> {
    Plain(&'a Value),
    Shared(Arc<Value>),
}

impl<'a> Resolved<'a> {
    pub fn value(&self) -> &Value {
        match self {
            Resolved::Plain(node) => node,
            Resolved::Shared(shared) => shared,
        }
    }

    pub(crate) fn into_owned(self) -> Value {
        match self {
            Resolved::Plain(node) => node.clone(),
            Resolved::Shared(shared) => (*shared).clone(),
        }
    }
}

/// Read-only adapter over a parsed OpenAPI document.
///
/// The tree is bound for the lifetime of the validator and never mutated.
/// Reference resolution results are memoized in a concurrent map so repeated
/// lookups from parallel validators stay cheap.
pub struct Document {
    root: Value,
    version: OpenApiVersion,
    resolved_references: DashMap<String, Arc<Value>>,
    empty_paths: Map<String, Value>,
}

impl Document {
    pub fn new(root: Value) -> Result<Self, ValidationError> {
        let version = match root.get(OPENAPI_FIELD).and_then(|field| field.as_str()) {
            Some(version) => OpenApiVersion::from_str(version)?,
            None => return Err(ValidationError::document_field_missing(OPENAPI_FIELD)),
        };
        if root.get(PATHS_FIELD).and_then(|paths| paths.as_object()).is_none() {
            return Err(ValidationError::document_field_missing(PATHS_FIELD));
        }
        Ok(Self {
            root,
            version,
            resolved_references: DashMap::new(),
            empty_paths: Map::new(),
        })
    }

    pub fn version(&self) -> OpenApiVersion {
        self.version
    }

    pub fn root(&self) -> &Value {
        &self.root
    }

    /// The paths object, in document order. Presence is checked at
    /// construction; the empty fallback only defends the type system.
    pub fn paths(&self) -> &Map<String, Value> {
        self.root
            .get(PATHS_FIELD)
            .and_then(|paths| paths.as_object())
            .unwrap_or(&self.empty_paths)
    }

    /// Declared server URLs, in document order.
    pub fn server_urls(&self) -> Vec<&str> {
        self.root
            .get(SERVERS_FIELD)
            .and_then(|servers| servers.as_array())
            .map(|servers| {
                servers
                    .iter()
                    .filter_map(|server| server.get(URL_FIELD).and_then(|url| url.as_str()))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub(crate) fn security_schemes(&self) -> Option<&Value> {
        self.root
            .get(COMPONENTS_FIELD)
            .and_then(|components| components.get(SECURITY_SCHEMES_FIELD))
    }

    /// Document-level security requirements, the fallback when an operation
    /// declares none of its own.
    pub(crate) fn document_security(&self) -> Option<&Value> {
        self.root.get(SECURITY_FIELD)
    }

    /// Follows a node's `$ref`, if any. Plain nodes come back untouched.
    pub(crate) fn resolve<'a>(&'a self, node: &'a Value) -> Result<Resolved<'a>, DocumentError> {
        match node.get(REF_FIELD).and_then(|reference| reference.as_str()) {
            Some(reference) => self
                .resolve_reference(reference)
                .map(Resolved::Shared),
            None => Ok(Resolved::Plain(node)),
        }
    }

    /// Resolves a `#/`-rooted reference string to its target node, following
    /// nested references and rejecting cycles.
    pub(crate) fn resolve_reference(&self, reference: &str) -> Result<Arc<Value>, DocumentError> {
        if let Some(cached) = self.resolved_references.get(reference) {
            return Ok(Arc::clone(cached.value()));
        }
        let mut seen = HashSet::new();
        let resolved = self.resolve_reference_inner(reference, &mut seen)?;
        let resolved = Arc::new(resolved.clone());
        self.resolved_references
            .insert(reference.to_string(), Arc::clone(&resolved));
        Ok(resolved)
    }

    fn resolve_reference_inner<'a>(
        &'a self,
        reference: &str,
        seen: &mut HashSet<String>,
    ) -> Result<&'a Value, DocumentError> {
        if !seen.insert(reference.to_string()) {
            return Err(DocumentError::CircularReference(reference.to_string()));
        }
        let pointer = reference
            .strip_prefix("#")
            .ok_or_else(|| DocumentError::InvalidReference(reference.to_string()))?;

        let mut current = &self.root;
        for segment in pointer.split(PATH_SEPARATOR).filter(|s| !s.is_empty()) {
            let segment = segment.replace(ENCODED_SLASH, PATH_SEPARATOR).replace(ENCODED_TILDE, TILDE);
            current = match current {
                Value::Object(map) => map
                    .get(&segment)
                    .ok_or_else(|| DocumentError::InvalidReference(reference.to_string()))?,
                Value::Array(items) => segment
                    .parse::<usize>()
                    .ok()
                    .and_then(|index| items.get(index))
                    .ok_or_else(|| DocumentError::InvalidReference(reference.to_string()))?,
                _ => return Err(DocumentError::InvalidReference(reference.to_string())),
            };
        }

        if let Some(nested) = current.get(REF_FIELD).and_then(|nested| nested.as_str()) {
            let nested = nested.to_string();
            return self.resolve_reference_inner(&nested, seen);
        }
        Ok(current)
    }

    /// Fetches `field` from `node` (following references on both), or `None`
    /// when the field is absent.
    pub(crate) fn get_optional<'a>(
        &'a self,
        node: &'a Value,
        field: &str,
    ) -> Result<Option<Resolved<'a>>, DocumentError> {
        let owner = self.resolve(node)?;
        let child = match owner {
            Resolved::Plain(plain) => match plain.get(field) {
                None => return Ok(None),
                Some(child) => self.resolve(child)?,
            },
            Resolved::Shared(shared) => match shared.get(field) {
                None => return Ok(None),
                // The child borrows from the shared Arc; clone it out so the
                // result is not tied to this stack frame.
                Some(child) => match child.get(REF_FIELD).and_then(|r| r.as_str()) {
                    Some(reference) => Resolved::Shared(self.resolve_reference(reference)?),
                    None => Resolved::Shared(Arc::new(child.clone())),
                },
            },
        };
        Ok(Some(child))
    }

    pub(crate) fn get_required<'a>(
        &'a self,
        node: &'a Value,
        field: &str,
    ) -> Result<Resolved<'a>, DocumentError> {
        self.get_optional(node, field)?
            .ok_or_else(|| DocumentError::MissingField(field.to_string()))
    }

    /// The operation's effective parameter list: path-item level parameters
    /// plus operation level ones, references resolved, with operation entries
    /// overriding path-item entries that share `(name, in)`.
    pub(crate) fn merged_parameters(
        &self,
        path_item: &Value,
        operation: &Value,
    ) -> Result<Vec<Value>, DocumentError> {
        let mut merged: Vec<Value> = Vec::new();
        for source in [path_item, operation] {
            let Some(list) = source.get(PARAMETERS_FIELD) else {
                continue;
            };
            let list = Self::require_array(list)?;
            for entry in list {
                let resolved = self.resolve(entry)?.into_owned();
                let key = (
                    resolved
                        .get(NAME_FIELD)
                        .and_then(|name| name.as_str())
                        .unwrap_or_default()
                        .to_string(),
                    resolved
                        .get(IN_FIELD)
                        .and_then(|location| location.as_str())
                        .unwrap_or_default()
                        .to_string(),
                );
                if let Some(existing) = merged.iter_mut().find(|candidate| {
                    candidate.get(NAME_FIELD).and_then(|name| name.as_str()) == Some(key.0.as_str())
                        && candidate.get(IN_FIELD).and_then(|l| l.as_str())
                            == Some(key.1.as_str())
                }) {
                    *existing = resolved;
                } else {
                    merged.push(resolved);
                }
            }
        }
        Ok(merged)
    }

    pub(crate) fn require_str(node: &Value) -> Result<&str, DocumentError> {
        node.as_str()
            .ok_or_else(|| DocumentError::UnexpectedType(format!("{} is not a string", node)))
    }

    pub(crate) fn require_array(node: &Value) -> Result<&Vec<Value>, DocumentError> {
        node.as_array()
            .ok_or_else(|| DocumentError::UnexpectedType(format!("{} is not an array", node)))
    }

    pub(crate) fn require_object(node: &Value) -> Result<&Map<String, Value>, DocumentError> {
        node.as_object()
            .ok_or_else(|| DocumentError::UnexpectedType(format!("{} is not an object", node)))
    }
}
