//! Request-path resolution.
//!
//! Maps a concrete request path onto the document's (possibly templated) path
//! items. Two matchers run in a fixed order: the radix tree first, then the
//! regex matcher over templates in document order. The first hit wins, and
//! both produce the same `(path item, template)` for any template the tree
//! can represent.

pub mod pattern;
pub mod radix;

use crate::cache::RegexCache;
use crate::document::{Document, Resolved};
use crate::error::ValidationError;
use crate::paths::pattern::{CompiledPattern, RegexEngine};
use crate::paths::radix::PathTree;
use std::collections::HashMap;
use std::sync::Arc;

/// The outcome of path resolution, consumed by every downstream validator.
///
/// `path_params` carries raw, still URL-encoded segments keyed by template
/// variable name. It is `None` when the regex fallback matched a template for
/// which no extraction was possible.
#[derive(Debug)]
pub struct ResolvedRoute<'doc> {
    pub path_item: Resolved<'doc>,
    pub template: String,
    pub path_params: Option<HashMap<String, String>>,
}

/// Built once per document; owns the warm matcher state.
pub(crate) struct PathResolver {
    templates: Vec<String>,
    broken: Vec<(String, String)>,
    tree: Option<PathTree>,
    regex_cache: Option<Arc<RegexCache>>,
    engine: Arc<dyn RegexEngine>,
    base_paths: Vec<String>,
}

impl PathResolver {
    pub(crate) fn new(
        document: &Document,
        tree_enabled: bool,
        regex_cache: Option<Arc<RegexCache>>,
        engine: Arc<dyn RegexEngine>,
    ) -> Self {
        let templates: Vec<String> = document.paths().keys().cloned().collect();
        let mut broken = Vec::new();
        let mut tree = tree_enabled.then(PathTree::new);

        // Warm phase: compile every templated segment once, and register the
        // tree-eligible templates.
        for template in &templates {
            let mut template_ok = true;
            for segment in template.split('/').filter(|segment| !segment.is_empty()) {
                if !pattern::has_template(segment) && !segment.contains('}') {
                    continue;
                }
                match pattern::segment_pattern(segment) {
                    Ok(source) => match engine.compile(&source) {
                        Ok(compiled) => {
                            if let Some(cache) = &regex_cache {
                                cache.store(segment, compiled);
                            }
                        }
                        Err(error) => {
                            template_ok = false;
                            broken.push((template.clone(), error.to_string()));
                        }
                    },
                    Err(error) => {
                        template_ok = false;
                        broken.push((template.clone(), error.to_string()));
                    }
                }
            }
            if template_ok {
                if let Some(tree) = tree.as_mut() {
                    tree.insert(template);
                }
            } else {
                log::warn!("path template '{}' cannot be compiled; it will never match", template);
            }
        }

        let mut base_paths: Vec<String> = document
            .server_urls()
            .iter()
            .filter_map(|url| base_path_of(url))
            .collect();
        // Longest prefix first, so /api/v2 strips before /api.
        base_paths.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        base_paths.dedup();

        Self {
            templates,
            broken,
            tree,
            regex_cache,
            engine,
            base_paths,
        }
    }

    /// Templates that failed regex construction, surfaced by document
    /// validation as `path/badTemplate` errors.
    pub(crate) fn broken_templates(&self) -> &[(String, String)] {
        &self.broken
    }

    /// Removes the longest declared server base path prefixing the escaped
    /// request path.
    pub(crate) fn strip_base(&self, escaped_path: &str) -> String {
        for base in &self.base_paths {
            if let Some(stripped) = escaped_path.strip_prefix(base.as_str()) {
                if stripped.is_empty() {
                    return "/".to_string();
                }
                if stripped.starts_with('/') {
                    return stripped.to_string();
                }
            }
        }
        escaped_path.to_string()
    }

    /// Runs the matcher chain over the stripped path.
    pub(crate) fn resolve<'doc>(
        &self,
        document: &'doc Document,
        stripped_path: &str,
    ) -> Result<ResolvedRoute<'doc>, ValidationError> {
        if let Some(tree) = &self.tree {
            if let Some(matched) = tree.lookup_with_params(stripped_path) {
                log::debug!("radix matched '{}' to '{}'", stripped_path, matched.template);
                let template = matched.template.to_string();
                let path_item = self.path_item(document, &template)?;
                return Ok(ResolvedRoute {
                    path_item,
                    template,
                    path_params: Some(matched.params),
                });
            }
        }

        for template in &self.templates {
            if self.broken.iter().any(|(broken, _)| broken == template) {
                continue;
            }
            if let Some(params) = self.match_template(template, stripped_path) {
                log::debug!("regex matched '{}' to '{}'", stripped_path, template);
                let path_item = self.path_item(document, template)?;
                return Ok(ResolvedRoute {
                    path_item,
                    template: template.clone(),
                    path_params: if params.is_empty() { None } else { Some(params) },
                });
            }
        }

        Err(ValidationError::path_missing(stripped_path))
    }

    fn path_item<'doc>(
        &self,
        document: &'doc Document,
        template: &str,
    ) -> Result<Resolved<'doc>, ValidationError> {
        let node = document
            .paths()
            .get(template)
            .ok_or_else(|| ValidationError::path_missing(template))?;
        document
            .resolve(node)
            .map_err(|_| ValidationError::path_missing(template))
    }

    /// Positional, segment-by-segment template match. Fragments declared on
    /// the template are stripped unless the request path carries one too.
    fn match_template(&self, template: &str, path: &str) -> Option<HashMap<String, String>> {
        let effective = if path.contains('#') {
            template
        } else {
            template.split('#').next().unwrap_or(template)
        };

        let template_segments: Vec<&str> =
            effective.split('/').filter(|segment| !segment.is_empty()).collect();
        let path_segments: Vec<&str> =
            path.split('/').filter(|segment| !segment.is_empty()).collect();
        if template_segments.len() != path_segments.len() {
            return None;
        }

        for (template_segment, path_segment) in template_segments.iter().zip(&path_segments) {
            if pattern::has_template(template_segment) {
                let compiled = self.segment_matcher(template_segment)?;
                if !compiled.is_match(path_segment) {
                    return None;
                }
            } else if template_segment != path_segment {
                return None;
            }
        }

        // Extraction only after the whole template matched: scan each
        // templated segment for its variable name and bind the raw segment.
        let mut params = HashMap::new();
        for (template_segment, path_segment) in template_segments.iter().zip(&path_segments) {
            if !pattern::has_template(template_segment) {
                continue;
            }
            if let Some(name) = pattern::parameter_name(template_segment) {
                params.insert(name.to_string(), (*path_segment).to_string());
            }
        }
        Some(params)
    }

    fn segment_matcher(&self, segment: &str) -> Option<Arc<dyn CompiledPattern>> {
        if let Some(cache) = &self.regex_cache {
            if let Some(compiled) = cache.load(segment) {
                return Some(compiled);
            }
        }
        let source = pattern::segment_pattern(segment).ok()?;
        let compiled = self.engine.compile(&source).ok()?;
        if let Some(cache) = &self.regex_cache {
            cache.store(segment, Arc::clone(&compiled));
        }
        Some(compiled)
    }
}

/// Extracts the path component of a server URL for base stripping.
///
/// Well-formed URLs contribute the text after the authority. A URL without a
/// scheme is salvaged by taking the segment after the first `//…/`; plain
/// relative paths are used as-is. Root and empty paths contribute nothing.
fn base_path_of(url: &str) -> Option<String> {
    let path: &str = if let Some(scheme_end) = url.find("://") {
        let after_scheme = &url[scheme_end + 3..];
        match after_scheme.find('/') {
            Some(slash) => &after_scheme[slash..],
            None => return None,
        }
    } else if let Some(rest) = url.strip_prefix("//") {
        match rest.find('/') {
            Some(slash) => &rest[slash..],
            None => return None,
        }
    } else if url.starts_with('/') {
        url
    } else {
        return None;
    };

    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
