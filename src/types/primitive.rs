use crate::{NULL_TYPE, TYPE_FIELD};
use serde_json::{Value, json};
use std::fmt::{Display, Formatter};

/// The primitive vocabulary schemas type raw parameter text against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveType {
    Null,
    Boolean,
    Integer,
    Number,
    String,
    Array,
    Object,
}

impl Display for PrimitiveType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            PrimitiveType::Null => write!(f, "null"),
            PrimitiveType::Boolean => write!(f, "boolean"),
            PrimitiveType::Integer => write!(f, "integer"),
            PrimitiveType::Number => write!(f, "number"),
            PrimitiveType::String => write!(f, "string"),
            PrimitiveType::Array => write!(f, "array"),
            PrimitiveType::Object => write!(f, "object"),
        }
    }
}

impl PrimitiveType {
    pub(crate) fn parse(value: &str) -> Option<Self> {
        match value {
            "null" => Some(PrimitiveType::Null),
            "boolean" => Some(PrimitiveType::Boolean),
            "integer" => Some(PrimitiveType::Integer),
            "number" => Some(PrimitiveType::Number),
            "string" => Some(PrimitiveType::String),
            "array" => Some(PrimitiveType::Array),
            "object" => Some(PrimitiveType::Object),
            _ => None,
        }
    }

    /// Reads the effective type out of a schema node.
    ///
    /// 3.0.x declares `type` as a single string; 3.1.x may declare a list, in
    /// which case the first non-`"null"` entry wins (nullability is handled
    /// separately). Schemas without a `type` yield `None` and are validated by
    /// the engine alone.
    pub(crate) fn of_schema(schema: &Value) -> Option<Self> {
        match schema.get(TYPE_FIELD) {
            Some(Value::String(single)) => Self::parse(single),
            Some(Value::Array(list)) => list
                .iter()
                .filter_map(|entry| entry.as_str())
                .find(|entry| *entry != NULL_TYPE)
                .and_then(Self::parse),
            _ => None,
        }
    }

    /// Whether the schema accepts `null`, in either the 3.0 (`nullable: true`)
    /// or 3.1 (`type` contains `"null"`) spelling.
    pub(crate) fn schema_is_nullable(schema: &Value) -> bool {
        schema
            .get(crate::NULLABLE_FIELD)
            .and_then(|nullable| nullable.as_bool())
            .unwrap_or(false)
            || Self::type_permits_null(schema)
    }

    /// The 3.1 spelling only: `type` is or contains `"null"`. Rendered inline
    /// schemas are normalized to this form, so post-render checks use it
    /// directly.
    pub(crate) fn type_permits_null(schema: &Value) -> bool {
        match schema.get(TYPE_FIELD) {
            Some(Value::String(single)) => single == NULL_TYPE,
            Some(Value::Array(list)) => list.iter().any(|entry| entry == NULL_TYPE),
            _ => false,
        }
    }

    /// Converts raw request text into a typed JSON value.
    ///
    /// Parsing is locale-free: integers and numbers go through the standard
    /// `FromStr` forms, booleans accept only `true`/`false`.
    pub(crate) fn convert(&self, raw: &str) -> Result<Value, ConversionError> {
        match self {
            PrimitiveType::Null => {
                if raw == "null" || raw.is_empty() {
                    Ok(Value::Null)
                } else {
                    Err(ConversionError::new(*self, raw))
                }
            }
            PrimitiveType::Boolean => match raw {
                "true" => Ok(json!(true)),
                "false" => Ok(json!(false)),
                _ => Err(ConversionError::new(*self, raw)),
            },
            PrimitiveType::Integer => raw
                .parse::<i64>()
                .map(|parsed| json!(parsed))
                .map_err(|_| ConversionError::new(*self, raw)),
            PrimitiveType::Number => raw
                .parse::<f64>()
                .ok()
                .filter(|parsed| parsed.is_finite())
                .map(|parsed| json!(parsed))
                .ok_or_else(|| ConversionError::new(*self, raw)),
            PrimitiveType::String => Ok(json!(raw)),
            PrimitiveType::Array | PrimitiveType::Object => {
                Err(ConversionError::new(*self, raw))
            }
        }
    }

    /// Best-effort conversion used for structured decodes where a property has
    /// no declared type: falls back to the raw string.
    pub(crate) fn convert_lenient(schema: Option<&Value>, raw: &str) -> Value {
        match schema.and_then(Self::of_schema) {
            Some(primitive) => primitive.convert(raw).unwrap_or_else(|_| json!(raw)),
            None => json!(raw),
        }
    }
}

#[derive(Debug)]
pub(crate) struct ConversionError {
    pub expected: PrimitiveType,
    pub raw: String,
}

impl ConversionError {
    fn new(expected: PrimitiveType, raw: &str) -> Self {
        Self {
            expected,
            raw: raw.to_string(),
        }
    }
}

impl Display for ConversionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "'{}' is not a valid {}", self.raw, self.expected)
    }
}

impl std::error::Error for ConversionError {}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_type_of_schema() {
        assert_eq!(
            PrimitiveType::of_schema(&json!({ "type": "integer" })),
            Some(PrimitiveType::Integer)
        );
        assert_eq!(
            PrimitiveType::of_schema(&json!({ "type": ["string", "null"] })),
            Some(PrimitiveType::String)
        );
        assert_eq!(PrimitiveType::of_schema(&json!({})), None);
    }

    #[test]
    fn test_nullability_spellings() {
        assert!(PrimitiveType::schema_is_nullable(
            &json!({ "type": "string", "nullable": true })
        ));
        assert!(PrimitiveType::schema_is_nullable(
            &json!({ "type": ["string", "null"] })
        ));
        assert!(!PrimitiveType::schema_is_nullable(&json!({ "type": "string" })));
    }

    #[test]
    fn test_integer_conversion() {
        assert_eq!(PrimitiveType::Integer.convert("42").unwrap(), json!(42));
        assert!(PrimitiveType::Integer.convert("doggy").is_err());
        assert!(PrimitiveType::Integer.convert("1.5").is_err());
    }

    #[test]
    fn test_number_conversion_rejects_non_finite() {
        assert_eq!(PrimitiveType::Number.convert("1.5").unwrap(), json!(1.5));
        assert!(PrimitiveType::Number.convert("NaN").is_err());
        assert!(PrimitiveType::Number.convert("inf").is_err());
    }

    #[test]
    fn test_boolean_conversion_is_strict() {
        assert_eq!(PrimitiveType::Boolean.convert("true").unwrap(), json!(true));
        assert!(PrimitiveType::Boolean.convert("TRUE").is_err());
        assert!(PrimitiveType::Boolean.convert("1").is_err());
    }
}
