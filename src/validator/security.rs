//! Security requirement evaluation.
//!
//! An operation's `security` list is an OR of alternatives; each alternative
//! is an AND over named schemes. The request passes when any alternative is
//! fully satisfied. When none is, the first alternative reports one error per
//! scheme it is missing.

use crate::document::Document;
use crate::error::ValidationError;
use crate::validator::RequestContext;
use crate::{IN_FIELD, NAME_FIELD, SCHEME_FIELD, TYPE_FIELD};
use serde_json::Value;

pub(crate) struct SecurityValidator<'v> {
    document: &'v Document,
}

impl<'v> SecurityValidator<'v> {
    pub(crate) fn new(document: &'v Document) -> Self {
        Self { document }
    }

    pub(crate) fn validate(&self, ctx: &RequestContext) -> Vec<ValidationError> {
        let Some(requirements) = &ctx.security else {
            return Vec::new();
        };
        let Some(alternatives) = requirements.as_array() else {
            return Vec::new();
        };
        if alternatives.is_empty() {
            return Vec::new();
        }

        for alternative in alternatives {
            let Some(schemes) = alternative.as_object() else {
                continue;
            };
            // An empty requirement object permits anonymous access.
            if schemes.is_empty() {
                return Vec::new();
            }
            if schemes
                .iter()
                .all(|(name, scopes)| self.scheme_satisfied(ctx, name, scopes))
            {
                return Vec::new();
            }
        }

        // No alternative passed: report the first alternative's gaps.
        let mut errors = Vec::new();
        if let Some(first) = alternatives.iter().find_map(|alt| alt.as_object()) {
            for (name, scopes) in first {
                if !self.scheme_satisfied(ctx, name, scopes) {
                    errors.extend(self.scheme_errors(name, scopes));
                }
            }
        }
        errors
    }

    fn scheme_definition(&self, name: &str) -> Option<Value> {
        let schemes = self.document.security_schemes()?;
        let definition = schemes.get(name)?;
        self.document.resolve(definition).ok().map(|resolved| resolved.into_owned())
    }

    fn scheme_satisfied(&self, ctx: &RequestContext, name: &str, scopes: &Value) -> bool {
        let Some(definition) = self.scheme_definition(name) else {
            log::warn!("security scheme '{}' is not declared in components", name);
            return false;
        };
        let scheme_type = definition
            .get(TYPE_FIELD)
            .and_then(|t| t.as_str())
            .unwrap_or_default();

        match scheme_type {
            "apiKey" => {
                let key_name = definition
                    .get(NAME_FIELD)
                    .and_then(|n| n.as_str())
                    .unwrap_or_default();
                match definition.get(IN_FIELD).and_then(|l| l.as_str()) {
                    Some("header") => ctx.headers.contains_key(key_name.to_lowercase().as_str()),
                    Some("query") => ctx.query.iter().any(|pair| pair.name == key_name),
                    Some("cookie") => ctx.cookies.iter().any(|(name, _)| name == key_name),
                    _ => false,
                }
            }
            "http" => {
                let scheme = definition
                    .get(SCHEME_FIELD)
                    .and_then(|s| s.as_str())
                    .unwrap_or("bearer");
                self.authorization_has_prefix(ctx, scheme)
            }
            "oauth2" | "openIdConnect" => {
                let present = self.authorization_has_prefix(ctx, "bearer");
                if present {
                    // Scope checking is advisory in this core: presence of a
                    // bearer credential satisfies the requirement.
                    if let Some(declared) = scopes.as_array() {
                        if !declared.is_empty() {
                            log::debug!(
                                "scheme '{}' declares scopes {:?}; scope verification is advisory",
                                name,
                                declared
                            );
                        }
                    }
                }
                present
            }
            _ => {
                log::warn!("security scheme '{}' has unsupported type '{}'", name, scheme_type);
                false
            }
        }
    }

    fn authorization_has_prefix(&self, ctx: &RequestContext, scheme: &str) -> bool {
        ctx.headers
            .get(http::header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .map(|value| {
                value
                    .get(..scheme.len())
                    .is_some_and(|prefix| prefix.eq_ignore_ascii_case(scheme))
                    && value[scheme.len()..].starts_with(' ')
            })
            .unwrap_or(false)
    }

    fn scheme_errors(&self, name: &str, scopes: &Value) -> Vec<ValidationError> {
        let Some(definition) = self.scheme_definition(name) else {
            return vec![ValidationError::document_field_missing(&format!(
                "components/securitySchemes/{}",
                name
            ))];
        };
        let scheme_type = definition
            .get(TYPE_FIELD)
            .and_then(|t| t.as_str())
            .unwrap_or_default();
        match scheme_type {
            "apiKey" => {
                let key_name = definition
                    .get(NAME_FIELD)
                    .and_then(|n| n.as_str())
                    .unwrap_or_default();
                let location = definition
                    .get(IN_FIELD)
                    .and_then(|l| l.as_str())
                    .unwrap_or("header");
                vec![ValidationError::api_key_missing(key_name, location)]
            }
            "http" => {
                let scheme = definition
                    .get(SCHEME_FIELD)
                    .and_then(|s| s.as_str())
                    .unwrap_or("bearer");
                vec![ValidationError::authorization_missing(&capitalize(scheme))]
            }
            "oauth2" | "openIdConnect" => {
                let declared: Vec<String> = scopes
                    .as_array()
                    .map(|scopes| {
                        scopes
                            .iter()
                            .filter_map(|scope| scope.as_str())
                            .map(str::to_string)
                            .collect()
                    })
                    .unwrap_or_default();
                if declared.is_empty() {
                    vec![ValidationError::authorization_missing("Bearer")]
                } else {
                    vec![
                        ValidationError::authorization_missing("Bearer"),
                        ValidationError::scope_missing(name, &declared),
                    ]
                }
            }
            other => vec![ValidationError::document_schema_invalid(
                &format!("components/securitySchemes/{}", name),
                &format!("unsupported security scheme type '{}'", other),
            )],
        }
    }
}

fn capitalize(scheme: &str) -> String {
    let mut chars = scheme.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod test {
    use crate::validator::OpenApiValidator;
    use bytes::Bytes;
    use serde_json::{Value, json};

    fn validator_with(security: Value, schemes: Value) -> OpenApiValidator {
        OpenApiValidator::new(json!({
            "openapi": "3.1.0",
            "paths": {
                "/secure": {
                    "get": {
                        "security": security,
                        "responses": { "200": { "description": "ok" } }
                    }
                }
            },
            "components": { "securitySchemes": schemes }
        }))
        .unwrap()
    }

    fn get_with_headers(headers: &[(&str, &str)]) -> http::Request<Bytes> {
        let mut builder = http::Request::builder()
            .method("GET")
            .uri("https://t/secure");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(Bytes::new()).unwrap()
    }

    #[test]
    fn test_api_key_locations() {
        let validator = validator_with(
            json!([{ "key": [] }]),
            json!({ "key": { "type": "apiKey", "name": "token", "in": "query" } }),
        );
        let request = http::Request::builder()
            .method("GET")
            .uri("https://t/secure?token=abc")
            .body(Bytes::new())
            .unwrap();
        assert!(validator.validate_http_request(&request).is_ok());

        let errors = validator
            .validate_http_request(&get_with_headers(&[]))
            .unwrap_err();
        assert_eq!(errors[0].message, "API Key token not found in query");

        let validator = validator_with(
            json!([{ "key": [] }]),
            json!({ "key": { "type": "apiKey", "name": "session", "in": "cookie" } }),
        );
        assert!(
            validator
                .validate_http_request(&get_with_headers(&[("cookie", "session=abc")]))
                .is_ok()
        );
        let errors = validator
            .validate_http_request(&get_with_headers(&[]))
            .unwrap_err();
        assert_eq!(errors[0].message, "API Key session not found in cookie");
    }

    #[test]
    fn test_http_bearer_and_basic() {
        let validator = validator_with(
            json!([{ "bearer": [] }]),
            json!({ "bearer": { "type": "http", "scheme": "bearer" } }),
        );
        assert!(
            validator
                .validate_http_request(&get_with_headers(&[("authorization", "Bearer token123")]))
                .is_ok()
        );
        let errors = validator
            .validate_http_request(&get_with_headers(&[]))
            .unwrap_err();
        assert_eq!(
            errors[0].message,
            "Authorization header with 'Bearer' credentials not found"
        );

        let validator = validator_with(
            json!([{ "basic": [] }]),
            json!({ "basic": { "type": "http", "scheme": "basic" } }),
        );
        let errors = validator
            .validate_http_request(&get_with_headers(&[("authorization", "Bearer nope")]))
            .unwrap_err();
        assert_eq!(
            errors[0].message,
            "Authorization header with 'Basic' credentials not found"
        );
    }

    #[test]
    fn test_oauth2_reports_bearer_and_scopes() {
        let validator = validator_with(
            json!([{ "oauth": ["read:pets", "write:pets"] }]),
            json!({
                "oauth": {
                    "type": "oauth2",
                    "flows": {
                        "implicit": {
                            "authorizationUrl": "https://t/auth",
                            "scopes": { "read:pets": "", "write:pets": "" }
                        }
                    }
                }
            }),
        );
        assert!(
            validator
                .validate_http_request(&get_with_headers(&[("authorization", "Bearer token")]))
                .is_ok()
        );

        let errors = validator
            .validate_http_request(&get_with_headers(&[]))
            .unwrap_err();
        let messages: Vec<&str> = errors.iter().map(|e| e.message.as_str()).collect();
        assert!(messages.contains(&"Authorization header with 'Bearer' credentials not found"));
        assert!(messages.contains(&"Required scopes for 'oauth' not granted"));
    }

    #[test]
    fn test_alternatives_are_an_or() {
        let validator = validator_with(
            json!([{ "key": [] }, { "bearer": [] }]),
            json!({
                "key": { "type": "apiKey", "name": "token", "in": "header" },
                "bearer": { "type": "http", "scheme": "bearer" }
            }),
        );
        // the second alternative alone satisfies the requirement
        assert!(
            validator
                .validate_http_request(&get_with_headers(&[("authorization", "Bearer t")]))
                .is_ok()
        );
        // neither satisfied: only the first alternative reports
        let errors = validator
            .validate_http_request(&get_with_headers(&[]))
            .unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "API Key token not found in header");
    }

    #[test]
    fn test_empty_requirement_allows_anonymous() {
        let validator = validator_with(
            json!([{ "key": [] }, {}]),
            json!({ "key": { "type": "apiKey", "name": "token", "in": "header" } }),
        );
        assert!(validator.validate_http_request(&get_with_headers(&[])).is_ok());
    }

    #[test]
    fn test_document_level_security_is_the_fallback() {
        let validator = OpenApiValidator::new(json!({
            "openapi": "3.1.0",
            "security": [{ "key": [] }],
            "paths": {
                "/covered": {
                    "get": { "responses": { "200": { "description": "ok" } } }
                }
            },
            "components": {
                "securitySchemes": {
                    "key": { "type": "apiKey", "name": "token", "in": "header" }
                }
            }
        }))
        .unwrap();
        let request = http::Request::builder()
            .method("GET")
            .uri("https://t/covered")
            .body(Bytes::new())
            .unwrap();
        let errors = validator.validate_http_request(&request).unwrap_err();
        assert_eq!(errors[0].message, "API Key token not found in header");
    }
}
