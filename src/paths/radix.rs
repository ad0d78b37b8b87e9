//! Radix index over path templates.
//!
//! One tree is built per document and answers `lookup_with_params` in
//! O(path depth). Only templates whose variable segments are bare `{name}`
//! forms live in the tree; segments with custom patterns or literal text
//! around the braces stay on the regex fallback, so a tree hit never has to
//! re-check a pattern.

use crate::paths::pattern;
use std::collections::HashMap;

#[derive(Default)]
struct Node {
    children: HashMap<String, Node>,
    wildcard: Option<Box<WildcardChild>>,
    template: Option<String>,
}

struct WildcardChild {
    name: String,
    node: Node,
}

/// A successful tree lookup: the matched template and the raw, still
/// URL-encoded segment bound to each template variable. Decoding is the
/// parameter validator's job.
#[derive(Debug)]
pub struct TreeMatch<'tree> {
    pub template: &'tree str,
    pub params: HashMap<String, String>,
}

/// Compressed trie over path segments with wildcard nodes for `{name}`
/// segments.
#[derive(Default)]
pub struct PathTree {
    root: Node,
}

impl PathTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a template. Returns `false` when the template is not
    /// tree-eligible (custom pattern, embedded literal text, or a fragment)
    /// and must be served by the regex matcher instead.
    ///
    /// When two templates differ only in variable name, both coexist and
    /// lookups resolve to the first one registered.
    pub fn insert(&mut self, template: &str) -> bool {
        if template.contains('#') {
            return false;
        }
        let mut segments = Vec::new();
        for segment in template.split('/').filter(|segment| !segment.is_empty()) {
            if pattern::has_template(segment) {
                match pattern::pure_parameter(segment) {
                    Some(name) => segments.push(SegmentKind::Variable(name)),
                    None => return false,
                }
            } else {
                segments.push(SegmentKind::Static(segment));
            }
        }

        let mut node = &mut self.root;
        for segment in segments {
            node = match segment {
                SegmentKind::Static(text) => {
                    node.children.entry(text.to_string()).or_default()
                }
                SegmentKind::Variable(name) => {
                    &mut node
                        .wildcard
                        .get_or_insert_with(|| {
                            Box::new(WildcardChild {
                                name: name.to_string(),
                                node: Node::default(),
                            })
                        })
                        .node
                }
            };
        }
        if node.template.is_none() {
            node.template = Some(template.to_string());
        }
        true
    }

    /// Walks the tree along `path`. Static children are preferred, with
    /// backtracking into the wildcard child when a static branch dead-ends.
    /// Matrix and label segments (leading `;` or `.`) only ever match
    /// wildcards.
    pub fn lookup_with_params(&self, path: &str) -> Option<TreeMatch<'_>> {
        let segments: Vec<&str> = path.split('/').filter(|segment| !segment.is_empty()).collect();
        let mut params = HashMap::new();
        let template = Self::walk(&self.root, &segments, &mut params)?;
        Some(TreeMatch { template, params })
    }

    fn walk<'tree>(
        node: &'tree Node,
        segments: &[&str],
        params: &mut HashMap<String, String>,
    ) -> Option<&'tree str> {
        let Some((head, tail)) = segments.split_first() else {
            return node.template.as_deref();
        };

        let styled = head.starts_with(';') || head.starts_with('.');
        if !styled {
            if let Some(child) = node.children.get(*head) {
                if let Some(found) = Self::walk(child, tail, params) {
                    return Some(found);
                }
            }
        }

        if let Some(wildcard) = &node.wildcard {
            if let Some(found) = Self::walk(&wildcard.node, tail, params) {
                params.insert(wildcard.name.clone(), (*head).to_string());
                return Some(found);
            }
        }
        None
    }
}

enum SegmentKind<'a> {
    Static(&'a str),
    Variable(&'a str),
}

#[cfg(test)]
mod test {
    use super::*;

    fn tree(templates: &[&str]) -> PathTree {
        let mut tree = PathTree::new();
        for template in templates {
            tree.insert(template);
        }
        tree
    }

    #[test]
    fn test_static_lookup() {
        let tree = tree(&["/pets", "/pets/findByStatus"]);
        assert_eq!(
            tree.lookup_with_params("/pets").unwrap().template,
            "/pets"
        );
        assert_eq!(
            tree.lookup_with_params("/pets/findByStatus").unwrap().template,
            "/pets/findByStatus"
        );
        assert!(tree.lookup_with_params("/owners").is_none());
    }

    #[test]
    fn test_variable_extraction() {
        let tree = tree(&["/pets/{petId}/photos/{photoId}"]);
        let matched = tree
            .lookup_with_params("/pets/42/photos/7%20a")
            .unwrap();
        assert_eq!(matched.template, "/pets/{petId}/photos/{photoId}");
        assert_eq!(matched.params["petId"], "42");
        // raw segment stays URL-encoded
        assert_eq!(matched.params["photoId"], "7%20a");
    }

    #[test]
    fn test_static_preferred_with_backtracking() {
        let tree = tree(&["/pets/{petId}", "/pets/findByStatus"]);
        assert_eq!(
            tree.lookup_with_params("/pets/findByStatus").unwrap().template,
            "/pets/findByStatus"
        );
        assert_eq!(
            tree.lookup_with_params("/pets/42").unwrap().template,
            "/pets/{petId}"
        );

        // static branch exists but dead-ends; the wildcard must win
        let deeper = self::tree(&["/a/b/c", "/a/{x}/d"]);
        assert_eq!(
            deeper.lookup_with_params("/a/b/d").unwrap().template,
            "/a/{x}/d"
        );
    }

    #[test]
    fn test_first_registered_wins_on_variable_collision() {
        let tree = tree(&["/pets/{petId}", "/pets/{id}"]);
        let matched = tree.lookup_with_params("/pets/42").unwrap();
        assert_eq!(matched.template, "/pets/{petId}");
        assert_eq!(matched.params["petId"], "42");
    }

    #[test]
    fn test_pattern_templates_are_rejected() {
        let mut tree = PathTree::new();
        assert!(!tree.insert("/pets/{id:[0-9]+}"));
        assert!(!tree.insert("/files/file-{name}.json"));
        assert!(tree.insert("/pets/{petId}"));
    }

    #[test]
    fn test_matrix_and_label_segments_match_wildcards_only() {
        let tree = tree(&["/pets/{petId}", "/pets/current"]);
        let matched = tree.lookup_with_params("/pets/;petId=42").unwrap();
        assert_eq!(matched.template, "/pets/{petId}");
        assert_eq!(matched.params["petId"], ";petId=42");

        let matched = tree.lookup_with_params("/pets/.current").unwrap();
        assert_eq!(matched.template, "/pets/{petId}");
    }

    #[test]
    fn test_segment_count_must_match() {
        let tree = tree(&["/pets/{petId}"]);
        assert!(tree.lookup_with_params("/pets").is_none());
        assert!(tree.lookup_with_params("/pets/42/extra").is_none());
    }
}
