//! Warm caches for compiled artifacts.
//!
//! Both caches are populated during validator construction and only read on
//! the request path. They are `dashmap`-backed: concurrent readers and writers
//! are safe, and duplicate concurrent compilation of the same key is tolerated
//! because compilation is deterministic and the last writer wins.

use crate::paths::pattern::CompiledPattern;
use dashmap::DashMap;
use jsonschema::Validator;
use serde_json::Value;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::Arc;

/// One compiled schema. Structurally identical schemas collapse onto a single
/// entry through [`schema_hash`] over the rendered inline text.
pub struct SchemaCacheEntry {
    /// The schema rendered inline: reference-free and nullability-normalized.
    pub rendered: Value,
    /// The rendered schema serialized once, for hashing and error reporting.
    pub rendered_text: String,
    /// The engine's compiled form.
    pub compiled: Validator,
}

/// Hash of a rendered schema, the key under which its compilation is shared.
pub fn schema_hash(rendered_text: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    rendered_text.hash(&mut hasher);
    hasher.finish()
}

/// Read-mostly map from schema hash to compiled schema.
#[derive(Default)]
pub struct SchemaCache {
    entries: DashMap<u64, Arc<SchemaCacheEntry>>,
}

impl SchemaCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(&self, key: u64) -> Option<Arc<SchemaCacheEntry>> {
        self.entries.get(&key).map(|entry| Arc::clone(entry.value()))
    }

    pub fn store(&self, key: u64, entry: Arc<SchemaCacheEntry>) {
        self.entries.insert(key, entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
        log::debug!("cleared schema cache");
    }
}

/// Read-mostly map from templated path segment to its compiled pattern.
#[derive(Default)]
pub struct RegexCache {
    entries: DashMap<String, Arc<dyn CompiledPattern>>,
}

impl RegexCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(&self, segment: &str) -> Option<Arc<dyn CompiledPattern>> {
        self.entries
            .get(segment)
            .map(|entry| Arc::clone(entry.value()))
    }

    pub fn store(&self, segment: impl Into<String>, pattern: Arc<dyn CompiledPattern>) {
        self.entries.insert(segment.into(), pattern);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
        log::debug!("cleared regex cache");
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::paths::pattern::{DefaultRegexEngine, RegexEngine};
    use serde_json::json;

    #[test]
    fn test_schema_hash_collapses_identical_schemas() {
        let first = serde_json::to_string(&json!({ "type": "string" })).unwrap();
        let second = serde_json::to_string(&json!({ "type": "string" })).unwrap();
        assert_eq!(schema_hash(&first), schema_hash(&second));
        assert_ne!(
            schema_hash(&first),
            schema_hash(&serde_json::to_string(&json!({ "type": "integer" })).unwrap())
        );
    }

    #[test]
    fn test_schema_cache_load_store() {
        let cache = SchemaCache::new();
        assert!(cache.is_empty());
        let rendered = json!({ "type": "string" });
        let rendered_text = serde_json::to_string(&rendered).unwrap();
        let key = schema_hash(&rendered_text);
        let compiled = jsonschema::validator_for(&rendered).unwrap();
        cache.store(
            key,
            Arc::new(SchemaCacheEntry {
                rendered,
                rendered_text,
                compiled,
            }),
        );
        assert_eq!(cache.len(), 1);
        let entry = cache.load(key).unwrap();
        assert!(entry.compiled.is_valid(&json!("hello")));
        assert!(cache.load(key ^ 1).is_none());
    }

    #[test]
    fn test_regex_cache_load_store() {
        let cache = RegexCache::new();
        let pattern = DefaultRegexEngine.compile("^(?:[0-9]+)$").unwrap();
        cache.store("{id:[0-9]+}", pattern);
        let loaded = cache.load("{id:[0-9]+}").unwrap();
        assert!(loaded.is_match("42"));
        assert!(cache.load("{other}").is_none());
    }
}
