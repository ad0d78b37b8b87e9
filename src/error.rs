use crate::types::ParameterLocation;
use serde::Serialize;
use serde_json::Value;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Coarse classification of a validation failure. Sorting is derived from the
/// declaration order here, so the order of variants is part of the contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum ValidationKind {
    #[serde(rename = "path")]
    Path,
    #[serde(rename = "parameter")]
    Parameter,
    #[serde(rename = "requestBody")]
    RequestBody,
    #[serde(rename = "responseBody")]
    ResponseBody,
    #[serde(rename = "security")]
    Security,
    #[serde(rename = "document")]
    Document,
}

impl Display for ValidationKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationKind::Path => write!(f, "path"),
            ValidationKind::Parameter => write!(f, "parameter"),
            ValidationKind::RequestBody => write!(f, "requestBody"),
            ValidationKind::ResponseBody => write!(f, "responseBody"),
            ValidationKind::Security => write!(f, "security"),
            ValidationKind::Document => write!(f, "document"),
        }
    }
}

/// Finer-grained classification within a [`ValidationKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ValidationSubKind {
    #[serde(rename = "missing")]
    Missing,
    #[serde(rename = "missingOperation")]
    MissingOperation,
    #[serde(rename = "badTemplate")]
    BadTemplate,
    #[serde(rename = "query")]
    Query,
    #[serde(rename = "path")]
    Path,
    #[serde(rename = "header")]
    Header,
    #[serde(rename = "cookie")]
    Cookie,
    #[serde(rename = "schema")]
    Schema,
    #[serde(rename = "missingContentType")]
    MissingContentType,
    #[serde(rename = "unexpectedContentType")]
    UnexpectedContentType,
    #[serde(rename = "unexpectedStatus")]
    UnexpectedStatus,
    #[serde(rename = "apiKeyMissing")]
    ApiKeyMissing,
    #[serde(rename = "bearerMissing")]
    BearerMissing,
    #[serde(rename = "scopeMissing")]
    ScopeMissing,
    #[serde(rename = "circular")]
    Circular,
}

impl Display for ValidationSubKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationSubKind::Missing => write!(f, "missing"),
            ValidationSubKind::MissingOperation => write!(f, "missingOperation"),
            ValidationSubKind::BadTemplate => write!(f, "badTemplate"),
            ValidationSubKind::Query => write!(f, "query"),
            ValidationSubKind::Path => write!(f, "path"),
            ValidationSubKind::Header => write!(f, "header"),
            ValidationSubKind::Cookie => write!(f, "cookie"),
            ValidationSubKind::Schema => write!(f, "schema"),
            ValidationSubKind::MissingContentType => write!(f, "missingContentType"),
            ValidationSubKind::UnexpectedContentType => write!(f, "unexpectedContentType"),
            ValidationSubKind::UnexpectedStatus => write!(f, "unexpectedStatus"),
            ValidationSubKind::ApiKeyMissing => write!(f, "apiKeyMissing"),
            ValidationSubKind::BearerMissing => write!(f, "bearerMissing"),
            ValidationSubKind::ScopeMissing => write!(f, "scopeMissing"),
            ValidationSubKind::Circular => write!(f, "circular"),
        }
    }
}

impl From<ParameterLocation> for ValidationSubKind {
    fn from(location: ParameterLocation) -> Self {
        match location {
            ParameterLocation::Query => ValidationSubKind::Query,
            ParameterLocation::Path => ValidationSubKind::Path,
            ParameterLocation::Header => ValidationSubKind::Header,
            ParameterLocation::Cookie => ValidationSubKind::Cookie,
        }
    }
}

/// One flattened failure from the JSON Schema engine.
///
/// `location` is the JSON pointer into the validated instance, `origin` the
/// pointer into the schema keyword that rejected it.
#[derive(Debug, Clone, Serialize)]
pub struct SchemaValidationFailure {
    pub reason: String,
    pub location: String,
    pub origin: String,
}

/// A single diagnostic produced by any of the validators.
///
/// Errors are value objects: validators never throw, they accumulate these.
/// The serialized form is stable (`message`, `validationType`,
/// `validationSubType`, `reason`, `specLine`, `specColumn`, `howToFix`,
/// `schemaValidationErrors`); `context` never serializes.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationError {
    pub message: String,
    #[serde(rename = "validationType")]
    pub kind: ValidationKind,
    #[serde(rename = "validationSubType")]
    pub sub_kind: ValidationSubKind,
    pub reason: String,
    #[serde(rename = "specLine")]
    pub spec_line: i32,
    #[serde(rename = "specColumn")]
    pub spec_column: i32,
    #[serde(rename = "howToFix")]
    pub how_to_fix: String,
    #[serde(
        rename = "schemaValidationErrors",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub schema_errors: Vec<SchemaValidationFailure>,
    /// The spec node this error originated from, for programmatic callers.
    #[serde(skip_serializing)]
    pub context: Option<Arc<Value>>,
}

/// The document model carries no source coordinates, so every error reports
/// this sentinel for line and column.
pub(crate) const NO_POSITION: i32 = -1;

impl ValidationError {
    fn new(
        kind: ValidationKind,
        sub_kind: ValidationSubKind,
        message: impl Into<String>,
        reason: impl Into<String>,
        how_to_fix: impl Into<String>,
    ) -> Self {
        Self {
            message: message.into(),
            kind,
            sub_kind,
            reason: reason.into(),
            spec_line: NO_POSITION,
            spec_column: NO_POSITION,
            how_to_fix: how_to_fix.into(),
            schema_errors: Vec::new(),
            context: None,
        }
    }

    pub(crate) fn with_context(mut self, context: Arc<Value>) -> Self {
        self.context = Some(context);
        self
    }

    pub(crate) fn with_schema_errors(mut self, failures: Vec<SchemaValidationFailure>) -> Self {
        self.schema_errors = failures;
        self
    }

    /// Orders errors by `(kind, message)` so aggregate output is identical for
    /// identical inputs regardless of worker scheduling.
    pub fn sort(errors: &mut [ValidationError]) {
        errors.sort_by(|a, b| a.kind.cmp(&b.kind).then_with(|| a.message.cmp(&b.message)));
    }

    // -- path resolution ----------------------------------------------------

    pub(crate) fn path_missing(path: &str) -> Self {
        Self::new(
            ValidationKind::Path,
            ValidationSubKind::Missing,
            format!("{} not found", path),
            format!(
                "The request path '{}' does not match any path template declared by the contract",
                path
            ),
            "Check the path is correct, or add it to the contract",
        )
    }

    pub(crate) fn method_missing(method: &str, template: &str) -> Self {
        Self::new(
            ValidationKind::Path,
            ValidationSubKind::MissingOperation,
            format!("{} operation on {} not found", method, template),
            format!(
                "The path template '{}' exists, but has no '{}' operation",
                template,
                method.to_lowercase()
            ),
            format!(
                "Add a '{}' operation to '{}', or use a declared method",
                method.to_lowercase(),
                template
            ),
        )
    }

    pub(crate) fn bad_template(template: &str, detail: &str) -> Self {
        Self::new(
            ValidationKind::Path,
            ValidationSubKind::BadTemplate,
            format!("path template '{}' cannot be compiled", template),
            detail,
            "Balance the braces in the template and use non-capturing groups only",
        )
    }

    // -- parameters ---------------------------------------------------------

    pub(crate) fn parameter_missing(location: ParameterLocation, name: &str) -> Self {
        Self::new(
            ValidationKind::Parameter,
            ValidationSubKind::from(location),
            format!("{} parameter '{}' is missing", location.capitalized(), name),
            format!(
                "The {} parameter '{}' is required but was not found in the request",
                location, name
            ),
            format!("Add the {} parameter '{}' to the request", location, name),
        )
    }

    pub(crate) fn parameter_wrong_type(
        location: ParameterLocation,
        name: &str,
        raw: &str,
        expected: &str,
    ) -> Self {
        Self::new(
            ValidationKind::Parameter,
            ValidationSubKind::from(location),
            format!(
                "{} parameter '{}' is not a valid {}",
                location.capitalized(),
                name,
                expected
            ),
            format!("The value '{}' cannot be read as a {}", raw, expected),
            format!("Supply a {} value for '{}'", expected, name),
        )
    }

    pub(crate) fn parameter_enum_mismatch(
        location: ParameterLocation,
        name: &str,
        raw: &str,
        allowed: &[String],
    ) -> Self {
        Self::new(
            ValidationKind::Parameter,
            ValidationSubKind::from(location),
            format!(
                "{} parameter '{}' value '{}' is not one of the allowed values",
                location.capitalized(),
                name,
                raw
            ),
            format!(
                "The {} parameter '{}' only permits a fixed set of values",
                location, name
            ),
            format!(
                "Instead of '{}', use one of the allowed values: '{}'",
                raw,
                allowed.join(", ")
            ),
        )
    }

    pub(crate) fn parameter_not_exploded(location: ParameterLocation, name: &str) -> Self {
        Self::new(
            ValidationKind::Parameter,
            ValidationSubKind::from(location),
            format!(
                "{} array parameter '{}' has not been exploded correctly",
                location.capitalized(),
                name
            ),
            format!(
                "The array parameter '{}' declares exploded form encoding, but the supplied values do not use it",
                name
            ),
            format!(
                "Encode the array items of '{}' using the declared style and explode settings",
                name
            ),
        )
    }

    pub(crate) fn parameter_style_mismatch(
        location: ParameterLocation,
        name: &str,
        style: &str,
        detail: &str,
    ) -> Self {
        Self::new(
            ValidationKind::Parameter,
            ValidationSubKind::from(location),
            format!(
                "{} parameter '{}' is not encoded with '{}' style",
                location.capitalized(),
                name,
                style
            ),
            detail,
            format!("Re-encode '{}' using the '{}' style", name, style),
        )
    }

    pub(crate) fn parameter_reserved_values(
        location: ParameterLocation,
        name: &str,
        raw: &str,
        encoded: &str,
    ) -> Self {
        Self::new(
            ValidationKind::Parameter,
            ValidationSubKind::from(location),
            format!(
                "{} parameter '{}' value contains reserved values",
                location.capitalized(),
                name
            ),
            format!(
                "'{}' contains reserved characters but the parameter does not set 'allowReserved'",
                raw
            ),
            format!("URL-encode the value, for example: '{}'", encoded),
        )
    }

    pub(crate) fn parameter_schema_invalid(
        location: ParameterLocation,
        name: &str,
        failures: Vec<SchemaValidationFailure>,
    ) -> Self {
        let reason = failures
            .first()
            .map(|f| f.reason.clone())
            .unwrap_or_else(|| "the value does not conform to the parameter schema".to_string());
        Self::new(
            ValidationKind::Parameter,
            ValidationSubKind::from(location),
            format!(
                "{} parameter '{}' failed to validate against its schema",
                location.capitalized(),
                name
            ),
            reason,
            format!(
                "Correct the value of '{}' to satisfy the declared schema",
                name
            ),
        )
        .with_schema_errors(failures)
    }

    pub(crate) fn parameter_invalid_json(
        location: ParameterLocation,
        name: &str,
        raw: &str,
    ) -> Self {
        Self::new(
            ValidationKind::Parameter,
            ValidationSubKind::from(location),
            format!(
                "{} parameter '{}' is not valid JSON",
                location.capitalized(),
                name
            ),
            format!("The value '{}' could not be parsed as JSON", raw),
            format!("Supply well-formed JSON for '{}'", name),
        )
    }

    pub(crate) fn parameter_definition_conflict(
        location: ParameterLocation,
        name: &str,
        detail: &str,
    ) -> Self {
        Self::new(
            ValidationKind::Parameter,
            ValidationSubKind::from(location),
            format!(
                "{} parameter '{}' is declared ambiguously",
                location.capitalized(),
                name
            ),
            detail,
            format!(
                "Declare exactly one of 'schema' or a single-entry 'content' map for '{}'",
                name
            ),
        )
    }

    // -- bodies -------------------------------------------------------------

    pub(crate) fn request_body_missing(method: &str, template: &str) -> Self {
        Self::new(
            ValidationKind::RequestBody,
            ValidationSubKind::Missing,
            format!("{} operation on {} requires a request body", method, template),
            "The operation declares the request body as required, but the request is empty",
            "Send a request body matching one of the declared media types",
        )
    }

    pub(crate) fn request_content_type_missing(method: &str, template: &str) -> Self {
        Self::new(
            ValidationKind::RequestBody,
            ValidationSubKind::MissingContentType,
            format!(
                "{} operation on {} requires a Content-Type header",
                method, template
            ),
            "The operation declares a request body, but the request has no Content-Type header",
            "Set a Content-Type header matching one of the declared media types",
        )
    }

    pub(crate) fn request_content_type_unexpected(method: &str, content_type: &str) -> Self {
        Self::new(
            ValidationKind::RequestBody,
            ValidationSubKind::UnexpectedContentType,
            format!(
                "{} operation request content type '{}' does not exist",
                method, content_type
            ),
            format!(
                "The content type '{}' is not declared by the operation's request body",
                content_type
            ),
            "Use one of the content types declared by the operation",
        )
    }

    pub(crate) fn request_body_invalid_json(method: &str, template: &str) -> Self {
        Self::new(
            ValidationKind::RequestBody,
            ValidationSubKind::Schema,
            format!("{} request body on {} is not valid JSON", method, template),
            "The request body could not be parsed as JSON",
            "Send a well-formed JSON body",
        )
    }

    pub(crate) fn request_body_schema_invalid(
        method: &str,
        template: &str,
        failures: Vec<SchemaValidationFailure>,
    ) -> Self {
        let reason = failures
            .first()
            .map(|f| f.reason.clone())
            .unwrap_or_else(|| "the body does not conform to the declared schema".to_string());
        Self::new(
            ValidationKind::RequestBody,
            ValidationSubKind::Schema,
            format!(
                "{} request body on {} failed to validate against the schema",
                method, template
            ),
            reason,
            "Correct the request body to satisfy the declared schema",
        )
        .with_schema_errors(failures)
    }

    pub(crate) fn response_status_unexpected(method: &str, template: &str, status: u16) -> Self {
        Self::new(
            ValidationKind::ResponseBody,
            ValidationSubKind::UnexpectedStatus,
            format!(
                "{} operation on {} response code '{}' does not exist",
                method, template, status
            ),
            format!(
                "Neither '{}', a matching 'XX' range, nor 'default' is declared in responses",
                status
            ),
            format!(
                "Declare a response for status '{}' or a 'default' response",
                status
            ),
        )
    }

    pub(crate) fn response_content_type_unexpected(
        method: &str,
        status: u16,
        content_type: &str,
    ) -> Self {
        Self::new(
            ValidationKind::ResponseBody,
            ValidationSubKind::UnexpectedContentType,
            format!(
                "{} / {} operation response content type '{}' does not exist",
                method, status, content_type
            ),
            format!(
                "The content type '{}' is not declared for the '{}' response",
                content_type, status
            ),
            "Return one of the content types declared for this response",
        )
    }

    pub(crate) fn response_content_type_missing(method: &str, status: u16) -> Self {
        Self::new(
            ValidationKind::ResponseBody,
            ValidationSubKind::MissingContentType,
            format!(
                "{} / {} response requires a Content-Type header",
                method, status
            ),
            "The response declares content, but carries no Content-Type header",
            "Set a Content-Type header matching one of the declared media types",
        )
    }

    pub(crate) fn response_body_invalid_json(method: &str, status: u16) -> Self {
        Self::new(
            ValidationKind::ResponseBody,
            ValidationSubKind::Schema,
            format!("{} / {} response body is not valid JSON", method, status),
            "The response body could not be parsed as JSON",
            "Return a well-formed JSON body",
        )
    }

    pub(crate) fn response_body_schema_invalid(
        method: &str,
        status: u16,
        failures: Vec<SchemaValidationFailure>,
    ) -> Self {
        let reason = failures
            .first()
            .map(|f| f.reason.clone())
            .unwrap_or_else(|| "the body does not conform to the declared schema".to_string());
        Self::new(
            ValidationKind::ResponseBody,
            ValidationSubKind::Schema,
            format!(
                "{} / {} response body failed to validate against the schema",
                method, status
            ),
            reason,
            "Correct the response body to satisfy the declared schema",
        )
        .with_schema_errors(failures)
    }

    // -- security -----------------------------------------------------------

    pub(crate) fn api_key_missing(name: &str, location: &str) -> Self {
        Self::new(
            ValidationKind::Security,
            ValidationSubKind::ApiKeyMissing,
            format!("API Key {} not found in {}", name, location),
            format!(
                "The security scheme requires an API key named '{}' in the request {}",
                name, location
            ),
            format!("Send the API key '{}' in the request {}", name, location),
        )
    }

    pub(crate) fn authorization_missing(scheme: &str) -> Self {
        Self::new(
            ValidationKind::Security,
            ValidationSubKind::BearerMissing,
            format!(
                "Authorization header with '{}' credentials not found",
                scheme
            ),
            format!(
                "The security scheme requires an Authorization header carrying {} credentials",
                scheme
            ),
            format!("Send an 'Authorization: {} ...' header", scheme),
        )
    }

    pub(crate) fn scope_missing(scheme_name: &str, scopes: &[String]) -> Self {
        Self::new(
            ValidationKind::Security,
            ValidationSubKind::ScopeMissing,
            format!("Required scopes for '{}' not granted", scheme_name),
            format!(
                "The security scheme '{}' requires the scopes: {}",
                scheme_name,
                scopes.join(", ")
            ),
            "Obtain a token granting the required scopes",
        )
    }

    // -- document -----------------------------------------------------------

    pub(crate) fn document_field_missing(field: &str) -> Self {
        Self::new(
            ValidationKind::Document,
            ValidationSubKind::Missing,
            format!("document is missing the '{}' field", field),
            format!("Every OpenAPI document must declare '{}'", field),
            format!("Add the '{}' field to the document", field),
        )
    }

    pub(crate) fn document_schema_invalid(location: &str, detail: &str) -> Self {
        Self::new(
            ValidationKind::Document,
            ValidationSubKind::Schema,
            format!("schema at '{}' cannot be compiled", location),
            detail,
            "Correct the schema so it compiles under the document's JSON Schema draft",
        )
    }

    pub(crate) fn document_circular_reference(reference: &str) -> Self {
        Self::new(
            ValidationKind::Document,
            ValidationSubKind::Circular,
            format!("circular reference detected at '{}'", reference),
            format!("cannot render circular reference: {}", reference),
            "Break the reference cycle, or mark the looping property as optional",
        )
    }

    pub(crate) fn document_unsupported_version(version: &str) -> Self {
        Self::new(
            ValidationKind::Document,
            ValidationSubKind::Schema,
            format!("unsupported OpenAPI version '{}'", version),
            format!(
                "Provided version '{}' does not match either 3.1.x or 3.0.x",
                version
            ),
            "Use an OpenAPI 3.0.x or 3.1.x document",
        )
    }
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}/{}] {}", self.kind, self.sub_kind, self.message)
    }
}

impl std::error::Error for ValidationError {}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_sort_is_deterministic() {
        let mut errors = vec![
            ValidationError::api_key_missing("token", "header"),
            ValidationError::path_missing("/b"),
            ValidationError::parameter_missing(ParameterLocation::Query, "fishy"),
            ValidationError::path_missing("/a"),
        ];
        ValidationError::sort(&mut errors);
        assert_eq!(errors[0].message, "/a not found");
        assert_eq!(errors[1].message, "/b not found");
        assert_eq!(errors[2].kind, ValidationKind::Parameter);
        assert_eq!(errors[3].kind, ValidationKind::Security);
    }

    #[test]
    fn test_serialized_payload_shape() {
        let error = ValidationError::parameter_missing(ParameterLocation::Query, "fishy");
        let payload = serde_json::to_value(&error).unwrap();
        assert_eq!(payload["message"], "Query parameter 'fishy' is missing");
        assert_eq!(payload["validationType"], "parameter");
        assert_eq!(payload["validationSubType"], "query");
        assert_eq!(payload["specLine"], -1);
        assert_eq!(payload["specColumn"], -1);
        assert!(payload.get("context").is_none());
        assert!(payload.get("schemaValidationErrors").is_none());
    }

    #[test]
    fn test_schema_errors_serialize_when_present() {
        let error = ValidationError::request_body_schema_invalid(
            "POST",
            "/pets",
            vec![SchemaValidationFailure {
                reason: "\"name\" is a required property".to_string(),
                location: "".to_string(),
                origin: "/required".to_string(),
            }],
        );
        let payload = serde_json::to_value(&error).unwrap();
        let nested = payload["schemaValidationErrors"].as_array().unwrap();
        assert_eq!(nested.len(), 1);
        assert_eq!(nested[0]["reason"], "\"name\" is a required property");
    }

    #[test]
    fn test_enum_fix_suggestion_format() {
        let error = ValidationError::parameter_enum_mismatch(
            ParameterLocation::Query,
            "status",
            "invalidEnum",
            &[
                "available".to_string(),
                "pending".to_string(),
                "sold".to_string(),
            ],
        );
        assert_eq!(
            error.how_to_fix,
            "Instead of 'invalidEnum', use one of the allowed values: 'available, pending, sold'"
        );
    }
}
