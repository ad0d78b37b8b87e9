//! The bridge between spec schemas and the JSON Schema engine.
//!
//! Every schema handed to the engine goes through the same pipeline: render it
//! inline (all `$ref`s resolved, recursion rejected), normalize 3.0
//! nullability into the 3.1 `type` form, compile under the document's draft
//! (through the warm cache when one is configured), validate, and flatten the
//! engine's error tree into [`SchemaValidationFailure`]s.

use crate::cache::{SchemaCache, SchemaCacheEntry, schema_hash};
use crate::document::{Document, DocumentError};
use crate::error::SchemaValidationFailure;
use crate::types::primitive::PrimitiveType;
use crate::{ITEMS_FIELD, NULLABLE_FIELD, NULL_TYPE, PROPERTIES_FIELD, REF_FIELD, TYPE_FIELD};
use jsonschema::{Draft, Validator as JsonValidator};
use serde_json::{Map, Value, json};
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Failures of the adapter itself, as opposed to instance validation results.
#[derive(Debug)]
pub(crate) enum SchemaFault {
    /// Rendering hit a reference cycle; carries the offending `$ref` string.
    Circular(String),
    /// The rendered schema would not compile under the selected draft.
    Compile(String),
}

impl Display for SchemaFault {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            SchemaFault::Circular(reference) => {
                write!(f, "cannot render circular reference: {}", reference)
            }
            SchemaFault::Compile(detail) => write!(f, "schema failed to compile: {}", detail),
        }
    }
}

pub(crate) struct SchemaAdapter<'doc> {
    document: &'doc Document,
    cache: Option<Arc<SchemaCache>>,
    draft: Draft,
    /// Set for 3.0.x documents, which spell nullability with the `nullable`
    /// keyword; rendering folds it into the 3.1 `type` form. 3.1.x documents
    /// already use the `type` form and a stray `nullable` is inert.
    fold_nullable: bool,
}

impl<'doc> SchemaAdapter<'doc> {
    pub(crate) fn new(document: &'doc Document, cache: Option<Arc<SchemaCache>>) -> Self {
        let version = document.version();
        Self {
            document,
            cache,
            draft: version.draft(),
            fold_nullable: version.uses_nullable_keyword(),
        }
    }

    /// Validates `instance` against `schema`.
    ///
    /// `Ok(vec![])` means the instance conforms; a non-empty vec carries the
    /// flattened engine failures. `Err` means the schema itself could not be
    /// rendered or compiled, which halts validation for this schema only.
    pub(crate) fn validate(
        &self,
        schema: &Value,
        instance: &Value,
    ) -> Result<Vec<SchemaValidationFailure>, SchemaFault> {
        let entry = self.compile(schema)?;
        Ok(Self::flatten_errors(&entry, instance))
    }

    /// Renders and compiles a schema, going through the cache when one is
    /// configured. Structurally identical schemas share one compilation.
    pub(crate) fn compile(&self, schema: &Value) -> Result<Arc<SchemaCacheEntry>, SchemaFault> {
        let mut stack = Vec::new();
        let rendered = self.render(schema, &mut stack)?;
        let rendered_text =
            serde_json::to_string(&rendered).map_err(|e| SchemaFault::Compile(e.to_string()))?;
        let key = schema_hash(&rendered_text);

        if let Some(cache) = &self.cache {
            if let Some(entry) = cache.load(key) {
                return Ok(entry);
            }
        }

        let compiled = JsonValidator::options()
            .with_draft(self.draft)
            .build(&rendered)
            .map_err(|error| SchemaFault::Compile(error.to_string()))?;
        let entry = Arc::new(SchemaCacheEntry {
            rendered,
            rendered_text,
            compiled,
        });
        if let Some(cache) = &self.cache {
            cache.store(key, Arc::clone(&entry));
        }
        Ok(entry)
    }

    /// Renders a schema inline: every `$ref` replaced by its target and, for
    /// 3.0.x documents, every `nullable: true` folded into the `type` list.
    /// A reference that is already being rendered further up the stack is a
    /// cycle.
    fn render(&self, node: &Value, stack: &mut Vec<String>) -> Result<Value, SchemaFault> {
        match node {
            Value::Object(map) => {
                if let Some(reference) = map.get(REF_FIELD).and_then(|r| r.as_str()) {
                    if stack.iter().any(|seen| seen == reference) {
                        return Err(SchemaFault::Circular(reference.to_string()));
                    }
                    let target = self.document.resolve_reference(reference).map_err(
                        |error| match error {
                            DocumentError::CircularReference(cycle) => SchemaFault::Circular(cycle),
                            other => SchemaFault::Compile(other.to_string()),
                        },
                    )?;
                    stack.push(reference.to_string());
                    let rendered = self.render(&target, stack)?;
                    stack.pop();
                    return Ok(rendered);
                }

                let mut rendered = Map::with_capacity(map.len());
                for (key, value) in map {
                    if self.fold_nullable && key == NULLABLE_FIELD {
                        continue;
                    }
                    rendered.insert(key.clone(), self.render(value, stack)?);
                }
                if self.fold_nullable
                    && map
                        .get(NULLABLE_FIELD)
                        .and_then(|nullable| nullable.as_bool())
                        .unwrap_or(false)
                {
                    Self::fold_null_into_type(&mut rendered);
                }
                Ok(Value::Object(rendered))
            }
            Value::Array(items) => {
                let mut rendered = Vec::with_capacity(items.len());
                for item in items {
                    rendered.push(self.render(item, stack)?);
                }
                Ok(Value::Array(rendered))
            }
            other => Ok(other.clone()),
        }
    }

    fn fold_null_into_type(schema: &mut Map<String, Value>) {
        let folded = match schema.get(TYPE_FIELD) {
            Some(Value::String(single)) => Some(json!([single, NULL_TYPE])),
            Some(Value::Array(list)) if !list.iter().any(|entry| entry == NULL_TYPE) => {
                let mut list = list.clone();
                list.push(json!(NULL_TYPE));
                Some(Value::Array(list))
            }
            _ => None,
        };
        if let Some(folded) = folded {
            schema.insert(TYPE_FIELD.to_string(), folded);
        }
    }

    /// Flattens the engine's error tree, dropping wrapper-level noise and
    /// suppressing failures on values that are `null` where the schema is
    /// nullable.
    fn flatten_errors(entry: &SchemaCacheEntry, instance: &Value) -> Vec<SchemaValidationFailure> {
        let mut failures = Vec::new();
        for error in entry.compiled.iter_errors(instance) {
            let reason = error.to_string();
            if reason.starts_with("doesn't validate with") {
                continue;
            }
            let origin = error.schema_path.to_string();
            if origin.is_empty() {
                continue;
            }
            let location = error.instance_path.to_string();

            let value_is_null = instance
                .pointer(&location)
                .map(Value::is_null)
                .unwrap_or(false);
            if value_is_null && Self::location_is_nullable(&entry.rendered, &location) {
                continue;
            }

            failures.push(SchemaValidationFailure {
                reason,
                location,
                origin,
            });
        }
        failures
    }

    /// Descends the rendered (reference-free) schema along an instance
    /// pointer and reports whether the sub-schema there accepts `null`.
    /// Rendering already normalized nullability into the `type` list, so
    /// only that spelling counts here.
    fn location_is_nullable(rendered: &Value, location: &str) -> bool {
        let mut current = rendered;
        for segment in location.split('/').filter(|segment| !segment.is_empty()) {
            let next = if segment.chars().all(|c| c.is_ascii_digit()) {
                current.get(ITEMS_FIELD)
            } else {
                current
                    .get(PROPERTIES_FIELD)
                    .and_then(|properties| properties.get(segment))
            };
            match next {
                Some(sub_schema) => current = sub_schema,
                None => break,
            }
        }
        PrimitiveType::type_permits_null(current)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn document_with_components(components: Value) -> Document {
        Document::new(json!({
            "openapi": "3.0.3",
            "paths": {},
            "components": { "schemas": components }
        }))
        .unwrap()
    }

    #[test]
    fn test_validates_inline_schema() {
        let document = document_with_components(json!({}));
        let adapter = SchemaAdapter::new(&document, None);
        let schema = json!({ "type": "object", "required": ["name"] });
        assert!(adapter.validate(&schema, &json!({ "name": "Ruby" })).unwrap().is_empty());
        let failures = adapter.validate(&schema, &json!({})).unwrap();
        assert_eq!(failures.len(), 1);
        assert!(failures[0].reason.contains("required"));
    }

    #[test]
    fn test_renders_references_inline() {
        let document = document_with_components(json!({
            "Pet": {
                "type": "object",
                "properties": { "tag": { "$ref": "#/components/schemas/Tag" } }
            },
            "Tag": { "type": "string" }
        }));
        let adapter = SchemaAdapter::new(&document, None);
        let schema = json!({ "$ref": "#/components/schemas/Pet" });
        assert!(adapter.validate(&schema, &json!({ "tag": "cat" })).unwrap().is_empty());
        assert!(!adapter.validate(&schema, &json!({ "tag": 1 })).unwrap().is_empty());
    }

    #[test]
    fn test_circular_reference_is_one_clean_fault() {
        let document = document_with_components(json!({
            "Node": {
                "type": "object",
                "properties": { "next": { "$ref": "#/components/schemas/Node" } }
            }
        }));
        let adapter = SchemaAdapter::new(&document, None);
        let schema = json!({ "$ref": "#/components/schemas/Node" });
        let fault = adapter.validate(&schema, &json!({})).unwrap_err();
        assert!(matches!(fault, SchemaFault::Circular(_)));
        assert_eq!(
            fault.to_string(),
            "cannot render circular reference: #/components/schemas/Node"
        );
    }

    #[test]
    fn test_nullable_keyword_is_normalized() {
        let document = document_with_components(json!({}));
        let adapter = SchemaAdapter::new(&document, None);
        let schema = json!({
            "type": "object",
            "properties": {
                "status": { "type": "string", "nullable": true }
            }
        });
        assert!(adapter.validate(&schema, &json!({ "status": null })).unwrap().is_empty());
        assert!(adapter.validate(&schema, &json!({ "status": "ok" })).unwrap().is_empty());
        assert!(!adapter.validate(&schema, &json!({ "status": 5 })).unwrap().is_empty());
    }

    #[test]
    fn test_nullable_keyword_is_inert_for_31_documents() {
        let document = Document::new(json!({ "openapi": "3.1.0", "paths": {} })).unwrap();
        let adapter = SchemaAdapter::new(&document, None);
        let schema = json!({
            "type": "object",
            "properties": {
                "status": { "type": "string", "nullable": true }
            }
        });
        // 3.1 spells nullability through the type list; the 3.0 keyword does
        // not widen the schema
        assert!(
            !adapter
                .validate(&schema, &json!({ "status": null }))
                .unwrap()
                .is_empty()
        );
        assert!(
            adapter
                .validate(&schema, &json!({ "status": "ok" }))
                .unwrap()
                .is_empty()
        );
    }

    #[test]
    fn test_nullable_enum_accepts_null_without_null_member() {
        let document = document_with_components(json!({}));
        let adapter = SchemaAdapter::new(&document, None);
        let schema = json!({
            "type": "object",
            "properties": {
                "status": {
                    "type": ["string", "null"],
                    "enum": ["active", "inactive"]
                }
            }
        });
        // null is accepted even though the enum does not list it
        assert!(
            adapter
                .validate(&schema, &json!({ "id": 1, "status": null }))
                .unwrap()
                .is_empty()
        );
        // non-null values still honor the enum
        assert!(
            !adapter
                .validate(&schema, &json!({ "status": "retired" }))
                .unwrap()
                .is_empty()
        );
    }

    #[test]
    fn test_cache_collapses_identical_schemas() {
        let document = document_with_components(json!({}));
        let cache = Arc::new(SchemaCache::new());
        let adapter = SchemaAdapter::new(&document, Some(Arc::clone(&cache)));
        let schema_a = json!({ "type": "string" });
        let schema_b = json!({ "type": "string" });
        adapter.compile(&schema_a).unwrap();
        adapter.compile(&schema_b).unwrap();
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_outcomes_identical_with_and_without_cache() {
        let document = document_with_components(json!({}));
        let schema = json!({ "type": "integer", "minimum": 3 });
        let cached = SchemaAdapter::new(&document, Some(Arc::new(SchemaCache::new())));
        let uncached = SchemaAdapter::new(&document, None);
        for instance in [json!(2), json!(3), json!("x")] {
            assert_eq!(
                cached.validate(&schema, &instance).unwrap().len(),
                uncached.validate(&schema, &instance).unwrap().len()
            );
        }
    }
}
