//! Regex construction for templated path segments.
//!
//! A template segment may embed `{name}` or `{name:pattern}` pairs anywhere in
//! the segment text. Each templated segment compiles to a single anchored
//! regex of the shape `^raw(?:pattern)raw$`, where the default pattern is
//! `[^/]+`. User-supplied patterns must not introduce capture groups; matching
//! is positional and extraction happens by brace position, not by capture.

use regex::Regex;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// The default pattern for a template variable: one segment's worth of text.
pub(crate) const DEFAULT_VARIABLE_PATTERN: &str = "[^/]+";

/// A compiled segment pattern, produced by a [`RegexEngine`].
pub trait CompiledPattern: Send + Sync {
    fn is_match(&self, value: &str) -> bool;
}

/// The pluggable engine that compiles template segment patterns.
///
/// The default engine wraps [`regex::Regex`], which has re2-like semantics
/// (linear time, no backtracking). Callers needing a different dialect
/// (for example ECMAScript lookarounds) supply their own implementation via
/// `ValidatorOptions::regex_engine`.
pub trait RegexEngine: Send + Sync {
    fn compile(&self, pattern: &str) -> Result<Arc<dyn CompiledPattern>, PatternError>;
}

impl CompiledPattern for Regex {
    fn is_match(&self, value: &str) -> bool {
        Regex::is_match(self, value)
    }
}

/// Engine backed by the `regex` crate.
#[derive(Debug, Default)]
pub struct DefaultRegexEngine;

impl RegexEngine for DefaultRegexEngine {
    fn compile(&self, pattern: &str) -> Result<Arc<dyn CompiledPattern>, PatternError> {
        Regex::new(pattern)
            .map(|compiled| Arc::new(compiled) as Arc<dyn CompiledPattern>)
            .map_err(|error| PatternError::CompileFailed(error.to_string()))
    }
}

#[derive(Debug)]
pub enum PatternError {
    UnbalancedBraces(String),
    CaptureGroupForbidden(String),
    CompileFailed(String),
}

impl Display for PatternError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            PatternError::UnbalancedBraces(segment) => {
                write!(f, "segment '{}' has unbalanced braces", segment)
            }
            PatternError::CaptureGroupForbidden(pattern) => {
                write!(
                    f,
                    "pattern '{}' uses a capture group; only non-capturing groups are allowed",
                    pattern
                )
            }
            PatternError::CompileFailed(detail) => write!(f, "{}", detail),
        }
    }
}

impl std::error::Error for PatternError {}

/// Byte spans of every balanced `{…}` pair in a segment, outermost only.
///
/// Rejects segments where braces do not pair up.
pub(crate) fn brace_spans(segment: &str) -> Result<Vec<(usize, usize)>, PatternError> {
    let mut spans = Vec::new();
    let mut depth = 0usize;
    let mut open = 0usize;
    for (index, byte) in segment.bytes().enumerate() {
        match byte {
            b'{' => {
                if depth == 0 {
                    open = index;
                }
                depth += 1;
            }
            b'}' => {
                if depth == 0 {
                    return Err(PatternError::UnbalancedBraces(segment.to_string()));
                }
                depth -= 1;
                if depth == 0 {
                    spans.push((open, index));
                }
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err(PatternError::UnbalancedBraces(segment.to_string()));
    }
    Ok(spans)
}

pub(crate) fn has_template(segment: &str) -> bool {
    segment.contains('{')
}

/// The variable name of the first brace pair: the text before any `:`.
/// Empty names yield `None` and the segment is skipped for extraction.
pub(crate) fn parameter_name(segment: &str) -> Option<&str> {
    let spans = brace_spans(segment).ok()?;
    let (open, close) = *spans.first()?;
    let inner = &segment[open + 1..close];
    let name = inner.split(':').next().unwrap_or_default();
    if name.is_empty() { None } else { Some(name) }
}

/// When the whole segment is a single bare `{name}` (no custom pattern, no
/// surrounding literal text), it is eligible for the radix index.
pub(crate) fn pure_parameter(segment: &str) -> Option<&str> {
    let inner = segment.strip_prefix('{')?.strip_suffix('}')?;
    if inner.is_empty() || inner.contains(':') || inner.contains('{') {
        return None;
    }
    Some(inner)
}

/// Builds the anchored regex source for one templated segment.
pub(crate) fn segment_pattern(segment: &str) -> Result<String, PatternError> {
    let spans = brace_spans(segment)?;
    let mut source = String::from("^");
    let mut cursor = 0usize;
    for (open, close) in spans {
        source.push_str(&regex::escape(&segment[cursor..open]));
        let inner = &segment[open + 1..close];
        let pattern = match inner.split_once(':') {
            Some((_, custom)) if !custom.is_empty() => {
                reject_capture_groups(custom)?;
                custom
            }
            _ => DEFAULT_VARIABLE_PATTERN,
        };
        source.push_str("(?:");
        source.push_str(pattern);
        source.push(')');
        cursor = close + 1;
    }
    source.push_str(&regex::escape(&segment[cursor..]));
    source.push('$');
    Ok(source)
}

fn reject_capture_groups(pattern: &str) -> Result<(), PatternError> {
    let bytes = pattern.as_bytes();
    let mut index = 0;
    while index < bytes.len() {
        match bytes[index] {
            b'\\' => index += 1,
            b'(' => {
                if bytes.get(index + 1) != Some(&b'?') {
                    return Err(PatternError::CaptureGroupForbidden(pattern.to_string()));
                }
            }
            _ => {}
        }
        index += 1;
    }
    Ok(())
}
