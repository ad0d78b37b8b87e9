//! Serialization styles for OpenAPI parameters.
//!
//! Everything here is a pure decoding primitive: given raw request text and a
//! declared `(style, explode)` pair, produce the strings the type checker and
//! schema validator consume. No validation happens at this layer.

use crate::types::ParameterLocation;
use percent_encoding::{AsciiSet, CONTROLS, percent_decode_str, utf8_percent_encode};
use std::collections::BTreeMap;

/// The OpenAPI serialization styles the validator decodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterStyle {
    Form,
    Simple,
    Label,
    Matrix,
    SpaceDelimited,
    PipeDelimited,
    DeepObject,
}

impl ParameterStyle {
    pub(crate) fn parse(value: &str) -> Option<Self> {
        match value {
            "form" => Some(ParameterStyle::Form),
            "simple" => Some(ParameterStyle::Simple),
            "label" => Some(ParameterStyle::Label),
            "matrix" => Some(ParameterStyle::Matrix),
            "spaceDelimited" => Some(ParameterStyle::SpaceDelimited),
            "pipeDelimited" => Some(ParameterStyle::PipeDelimited),
            "deepObject" => Some(ParameterStyle::DeepObject),
            _ => None,
        }
    }

    pub(crate) fn default_for(location: ParameterLocation) -> Self {
        match location {
            ParameterLocation::Query | ParameterLocation::Cookie => ParameterStyle::Form,
            ParameterLocation::Path | ParameterLocation::Header => ParameterStyle::Simple,
        }
    }

    /// The item delimiter for array decoding under this style.
    pub(crate) fn delimiter(&self) -> char {
        match self {
            ParameterStyle::Form | ParameterStyle::Simple => ',',
            ParameterStyle::SpaceDelimited => ' ',
            ParameterStyle::PipeDelimited => '|',
            ParameterStyle::Label => '.',
            ParameterStyle::Matrix | ParameterStyle::DeepObject => ';',
        }
    }

    /// `explode` defaults to true only for form style.
    pub(crate) fn default_explode(&self) -> bool {
        matches!(self, ParameterStyle::Form)
    }

    pub(crate) fn name(&self) -> &'static str {
        match self {
            ParameterStyle::Form => "form",
            ParameterStyle::Simple => "simple",
            ParameterStyle::Label => "label",
            ParameterStyle::Matrix => "matrix",
            ParameterStyle::SpaceDelimited => "spaceDelimited",
            ParameterStyle::PipeDelimited => "pipeDelimited",
            ParameterStyle::DeepObject => "deepObject",
        }
    }
}

/// Characters RFC 3986 reserves; their unencoded presence in a query value is
/// rejected unless the parameter sets `allowReserved`.
pub(crate) const RESERVED_CHARS: &str = ":/?#[]@!$&'()*+,;=";

const RESERVED_ENCODE_SET: &AsciiSet = &CONTROLS
    .add(b':')
    .add(b'/')
    .add(b'?')
    .add(b'#')
    .add(b'[')
    .add(b']')
    .add(b'@')
    .add(b'!')
    .add(b'$')
    .add(b'&')
    .add(b'\'')
    .add(b'(')
    .add(b')')
    .add(b'*')
    .add(b'+')
    .add(b',')
    .add(b';')
    .add(b'=');

pub(crate) fn contains_reserved(value: &str) -> bool {
    value.chars().any(|c| RESERVED_CHARS.contains(c))
}

/// Percent-encodes reserved characters, producing the fix suggestion shown in
/// `allowReserved` diagnostics.
pub(crate) fn encode_reserved(value: &str) -> String {
    utf8_percent_encode(value, RESERVED_ENCODE_SET).to_string()
}

pub(crate) fn percent_decode(raw: &str) -> String {
    percent_decode_str(raw).decode_utf8_lossy().to_string()
}

/// Splits an array value by a style delimiter, keeping empty items out.
pub(crate) fn split_delimited(raw: &str, delimiter: char) -> Vec<String> {
    raw.split(delimiter)
        .filter(|item| !item.is_empty())
        .map(|item| item.to_string())
        .collect()
}

/// Label-style values must open with `.`; returns the items after stripping.
pub(crate) fn decode_label_array(raw: &str) -> Option<Vec<String>> {
    let stripped = raw.strip_prefix('.')?;
    Some(split_delimited(stripped, '.'))
}

/// Matrix-style values open with `;name=`. With `explode` each item repeats
/// the `;name=` prefix; without it the items ride in one CSV tail.
pub(crate) fn decode_matrix_array(raw: &str, name: &str, explode: bool) -> Option<Vec<String>> {
    let prefix = format!("{}=", name);
    if explode {
        let mut items = Vec::new();
        for entry in raw.split(';').filter(|entry| !entry.is_empty()) {
            items.push(entry.strip_prefix(prefix.as_str())?.to_string());
        }
        Some(items)
    } else {
        let tail = raw.strip_prefix(';')?.strip_prefix(prefix.as_str())?;
        Some(split_delimited(tail, ','))
    }
}

/// Matrix-style primitive: `;name=value`.
pub(crate) fn decode_matrix_primitive<'a>(raw: &'a str, name: &str) -> Option<&'a str> {
    raw.strip_prefix(';')?
        .strip_prefix(name)?
        .strip_prefix('=')
}

/// Label-style primitive: `.value`.
pub(crate) fn decode_label_primitive(raw: &str) -> Option<&str> {
    raw.strip_prefix('.')
}

/// Decodes alternating key/value items (`[k1, v1, k2, v2, …]`) into a map.
/// An odd item count means the encoding is broken.
pub(crate) fn object_from_alternating(items: &[String]) -> Option<BTreeMap<String, String>> {
    if items.len() % 2 != 0 {
        return None;
    }
    let mut object = BTreeMap::new();
    for pair in items.chunks(2) {
        object.insert(pair[0].clone(), pair[1].clone());
    }
    Some(object)
}

/// Exploded `k=v` items joined by a delimiter, as simple (`a=1,b=2`) and
/// label (`.a=1.b=2`, after stripping) objects use.
pub(crate) fn object_from_assignments(
    raw: &str,
    delimiter: char,
) -> Option<BTreeMap<String, String>> {
    let mut object = BTreeMap::new();
    for entry in raw.split(delimiter).filter(|entry| !entry.is_empty()) {
        let (key, value) = entry.split_once('=')?;
        object.insert(key.to_string(), value.to_string());
    }
    Some(object)
}

/// Matrix-style objects: `;a=1;b=2` exploded, `;name=a,1,b,2` otherwise.
pub(crate) fn decode_matrix_object(
    raw: &str,
    name: &str,
    explode: bool,
) -> Option<BTreeMap<String, String>> {
    if explode {
        object_from_assignments(raw.strip_prefix(';')?, ';')
    } else {
        let items = decode_matrix_array(raw, name, false)?;
        object_from_alternating(&items)
    }
}

/// Label-style objects: `.a=1.b=2` exploded, `.a.1.b.2` otherwise.
pub(crate) fn decode_label_object(raw: &str, explode: bool) -> Option<BTreeMap<String, String>> {
    let stripped = raw.strip_prefix('.')?;
    if explode {
        object_from_assignments(stripped, '.')
    } else {
        let items = split_delimited(stripped, '.');
        object_from_alternating(&items)
    }
}

/// Collects `name[prop]=value` query pairs into a deepObject map.
pub(crate) fn decode_deep_object(
    name: &str,
    pairs: &[(String, String)],
) -> BTreeMap<String, String> {
    let prefix = format!("{}[", name);
    let mut object = BTreeMap::new();
    for (key, value) in pairs {
        if let Some(property) = key
            .strip_prefix(prefix.as_str())
            .and_then(|rest| rest.strip_suffix(']'))
        {
            object.insert(property.to_string(), value.clone());
        }
    }
    object
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_style_defaults() {
        assert_eq!(
            ParameterStyle::default_for(ParameterLocation::Query),
            ParameterStyle::Form
        );
        assert_eq!(
            ParameterStyle::default_for(ParameterLocation::Path),
            ParameterStyle::Simple
        );
        assert!(ParameterStyle::Form.default_explode());
        assert!(!ParameterStyle::Simple.default_explode());
    }

    #[test]
    fn test_delimiters() {
        assert_eq!(ParameterStyle::Form.delimiter(), ',');
        assert_eq!(ParameterStyle::SpaceDelimited.delimiter(), ' ');
        assert_eq!(ParameterStyle::PipeDelimited.delimiter(), '|');
    }

    #[test]
    fn test_label_array() {
        assert_eq!(
            decode_label_array(".3.4.5").unwrap(),
            vec!["3", "4", "5"]
        );
        assert!(decode_label_array("3.4.5").is_none());
    }

    #[test]
    fn test_matrix_array_both_forms() {
        assert_eq!(
            decode_matrix_array(";id=3,4,5", "id", false).unwrap(),
            vec!["3", "4", "5"]
        );
        assert_eq!(
            decode_matrix_array(";id=3;id=4;id=5", "id", true).unwrap(),
            vec!["3", "4", "5"]
        );
        assert!(decode_matrix_array(";other=3", "id", false).is_none());
    }

    #[test]
    fn test_matrix_primitive() {
        assert_eq!(decode_matrix_primitive(";id=42", "id"), Some("42"));
        assert_eq!(decode_matrix_primitive("id=42", "id"), None);
    }

    #[test]
    fn test_alternating_object() {
        let items: Vec<String> = ["R", "100", "G", "200"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let object = object_from_alternating(&items).unwrap();
        assert_eq!(object["R"], "100");
        assert_eq!(object["G"], "200");

        let odd: Vec<String> = ["R", "100", "G"].iter().map(|s| s.to_string()).collect();
        assert!(object_from_alternating(&odd).is_none());
    }

    #[test]
    fn test_assignment_objects() {
        let object = object_from_assignments("a=1,b=2", ',').unwrap();
        assert_eq!(object["a"], "1");
        assert_eq!(object["b"], "2");

        let label = decode_label_object(".a=1.b=2", true).unwrap();
        assert_eq!(label["a"], "1");

        let matrix = decode_matrix_object(";a=1;b=2", "point", true).unwrap();
        assert_eq!(matrix["b"], "2");

        let matrix = decode_matrix_object(";point=a,1,b,2", "point", false).unwrap();
        assert_eq!(matrix["a"], "1");
    }

    #[test]
    fn test_deep_object() {
        let pairs = vec![
            ("filter[name]".to_string(), "Ruby".to_string()),
            ("filter[age]".to_string(), "5".to_string()),
            ("other".to_string(), "x".to_string()),
        ];
        let object = decode_deep_object("filter", &pairs);
        assert_eq!(object.len(), 2);
        assert_eq!(object["name"], "Ruby");
        assert_eq!(object["age"], "5");
    }

    #[test]
    fn test_reserved_detection_and_fix() {
        assert!(contains_reserved("a/b"));
        assert!(!contains_reserved("plain-value_1.0"));
        assert_eq!(encode_reserved("a/b&c"), "a%2Fb%26c");
    }

    #[test]
    fn test_percent_decode() {
        assert_eq!(percent_decode("a%20b"), "a b");
        assert_eq!(percent_decode("plain"), "plain");
    }
}
