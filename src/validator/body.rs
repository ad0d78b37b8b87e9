//! Request and response body validation.
//!
//! The request side selects a schema by the request's `Content-Type`; the
//! response side first selects the response object by status code (exact code,
//! then `XX` range, then `default`) and only then by content type. JSON is the
//! only media type whose payload is schema-validated.

use crate::document::Document;
use crate::error::ValidationError;
use crate::schema::{SchemaAdapter, SchemaFault};
use crate::validator::RequestContext;
use crate::{
    APPLICATION_JSON, CONTENT_FIELD, DEFAULT_FIELD, REQUEST_BODY_FIELD, REQUIRED_FIELD,
    RESPONSES_FIELD, SCHEMA_FIELD,
};
use serde_json::Value;

pub(crate) struct BodyValidator<'v, 'doc> {
    document: &'v Document,
    adapter: &'v SchemaAdapter<'doc>,
}

impl<'v, 'doc> BodyValidator<'v, 'doc> {
    pub(crate) fn new(document: &'v Document, adapter: &'v SchemaAdapter<'doc>) -> Self {
        Self { document, adapter }
    }

    pub(crate) fn validate_request_body(
        &self,
        ctx: &RequestContext,
        content_type: Option<&str>,
        body: &[u8],
    ) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        let method = ctx.method.as_str();

        let request_body = match self.document.get_optional(&ctx.operation, REQUEST_BODY_FIELD) {
            Ok(Some(request_body)) => request_body,
            Ok(None) => return errors,
            Err(error) => {
                log::warn!("request body definition unreadable: {}", error);
                return errors;
            }
        };
        let request_body = request_body.into_owned();
        let required = request_body
            .get(REQUIRED_FIELD)
            .and_then(|required| required.as_bool())
            .unwrap_or(false);

        if body.is_empty() {
            if required {
                errors.push(ValidationError::request_body_missing(
                    method,
                    &ctx.route.template,
                ));
            }
            return errors;
        }

        let Some(content_type) = content_type else {
            errors.push(ValidationError::request_content_type_missing(
                method,
                &ctx.route.template,
            ));
            return errors;
        };

        let Some(media_entry) = lookup_media_entry(&request_body, content_type) else {
            errors.push(ValidationError::request_content_type_unexpected(
                method,
                content_type,
            ));
            return errors;
        };

        // Only JSON payloads are schema-validated in this core.
        if content_type != APPLICATION_JSON {
            return errors;
        }
        let Some(schema) = media_entry.get(SCHEMA_FIELD) else {
            return errors;
        };

        let instance: Value = match serde_json::from_slice(body) {
            Ok(instance) => instance,
            Err(_) => {
                errors.push(ValidationError::request_body_invalid_json(
                    method,
                    &ctx.route.template,
                ));
                return errors;
            }
        };

        match self.adapter.validate(schema, &instance) {
            Ok(failures) if failures.is_empty() => {}
            Ok(failures) => errors.push(ValidationError::request_body_schema_invalid(
                method,
                &ctx.route.template,
                failures,
            )),
            Err(SchemaFault::Circular(reference)) => {
                errors.push(ValidationError::document_circular_reference(&reference));
            }
            Err(SchemaFault::Compile(detail)) => {
                errors.push(ValidationError::document_schema_invalid(
                    &format!("{} request body", ctx.route.template),
                    &detail,
                ));
            }
        }
        errors
    }

    pub(crate) fn validate_response_body(
        &self,
        ctx: &RequestContext,
        status: u16,
        content_type: Option<&str>,
        body: &[u8],
    ) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        let method = ctx.method.as_str();

        let responses = match self.document.get_optional(&ctx.operation, RESPONSES_FIELD) {
            Ok(Some(responses)) => responses.into_owned(),
            Ok(None) => return errors,
            Err(error) => {
                log::warn!("responses definition unreadable: {}", error);
                return errors;
            }
        };

        let Some(response) = select_response(&responses, status) else {
            errors.push(ValidationError::response_status_unexpected(
                method,
                &ctx.route.template,
                status,
            ));
            return errors;
        };
        let response = match self.document.resolve(response) {
            Ok(resolved) => resolved.into_owned(),
            Err(error) => {
                log::warn!("response definition unreadable: {}", error);
                return errors;
            }
        };

        // A response without declared content has nothing to check.
        if response.get(CONTENT_FIELD).is_none() {
            return errors;
        }

        let Some(content_type) = content_type else {
            errors.push(ValidationError::response_content_type_missing(
                method, status,
            ));
            return errors;
        };

        let Some(media_entry) = lookup_media_entry(&response, content_type) else {
            errors.push(ValidationError::response_content_type_unexpected(
                method,
                status,
                content_type,
            ));
            return errors;
        };

        if content_type != APPLICATION_JSON || body.is_empty() {
            return errors;
        }
        let Some(schema) = media_entry.get(SCHEMA_FIELD) else {
            return errors;
        };

        let instance: Value = match serde_json::from_slice(body) {
            Ok(instance) => instance,
            Err(_) => {
                errors.push(ValidationError::response_body_invalid_json(method, status));
                return errors;
            }
        };

        match self.adapter.validate(schema, &instance) {
            Ok(failures) if failures.is_empty() => {}
            Ok(failures) => errors.push(ValidationError::response_body_schema_invalid(
                method, status, failures,
            )),
            Err(SchemaFault::Circular(reference)) => {
                errors.push(ValidationError::document_circular_reference(&reference));
            }
            Err(SchemaFault::Compile(detail)) => {
                errors.push(ValidationError::document_schema_invalid(
                    &format!("{} response {}", ctx.route.template, status),
                    &detail,
                ));
            }
        }
        errors
    }
}

/// Finds the media entry whose base type matches, parameters ignored on both
/// sides. Vendor suffixes are not resolved; the match is exact.
fn lookup_media_entry<'a>(owner: &'a Value, content_type: &str) -> Option<&'a Value> {
    let content = owner.get(CONTENT_FIELD)?.as_object()?;
    let wanted = base_media_type(content_type);
    content
        .iter()
        .find(|(declared, _)| base_media_type(declared) == wanted)
        .map(|(_, entry)| entry)
}

fn base_media_type(media: &str) -> &str {
    media.split(';').next().unwrap_or(media).trim()
}

/// Response selection order: exact status code, `XX` range, `default`.
fn select_response(responses: &Value, status: u16) -> Option<&Value> {
    let responses = responses.as_object()?;
    if let Some(exact) = responses.get(&status.to_string()) {
        return Some(exact);
    }
    let range = format!("{}XX", status / 100);
    if let Some(ranged) = responses
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(&range))
        .map(|(_, value)| value)
    {
        return Some(ranged);
    }
    responses.get(DEFAULT_FIELD)
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_base_media_type() {
        assert_eq!(base_media_type("application/json; charset=utf-8"), "application/json");
        assert_eq!(base_media_type("application/json"), "application/json");
    }

    #[test]
    fn test_select_response_precedence() {
        let responses = json!({
            "404": { "description": "exact" },
            "4XX": { "description": "range" },
            "default": { "description": "fallback" }
        });
        assert_eq!(
            select_response(&responses, 404).unwrap()["description"],
            "exact"
        );
        assert_eq!(
            select_response(&responses, 400).unwrap()["description"],
            "range"
        );
        assert_eq!(
            select_response(&responses, 500).unwrap()["description"],
            "fallback"
        );
    }

    #[test]
    fn test_select_response_lowercase_range() {
        let responses = json!({ "2xx": { "description": "range" } });
        assert_eq!(
            select_response(&responses, 201).unwrap()["description"],
            "range"
        );
        assert!(select_response(&responses, 500).is_none());
    }

    mod end_to_end {
        use crate::validator::OpenApiValidator;
        use bytes::Bytes;
        use serde_json::json;

        fn validator() -> OpenApiValidator {
            OpenApiValidator::new(json!({
                "openapi": "3.0.3",
                "paths": {
                    "/pets": {
                        "post": {
                            "requestBody": {
                                "required": true,
                                "content": {
                                    "application/json": {
                                        "schema": {
                                            "type": "object",
                                            "required": ["name"],
                                            "properties": { "name": { "type": "string" } }
                                        }
                                    }
                                }
                            },
                            "responses": {
                                "404": {
                                    "description": "exact",
                                    "content": {
                                        "application/json": {
                                            "schema": {
                                                "type": "object",
                                                "required": ["code"],
                                                "properties": { "code": { "type": "integer" } }
                                            }
                                        }
                                    }
                                },
                                "4XX": {
                                    "description": "range",
                                    "content": {
                                        "application/json": {
                                            "schema": { "type": "object" }
                                        }
                                    }
                                }
                            }
                        }
                    }
                }
            }))
            .unwrap()
        }

        fn post(content_type: Option<&str>, body: &[u8]) -> http::Request<Bytes> {
            let mut builder = http::Request::builder()
                .method("POST")
                .uri("https://t/pets");
            if let Some(content_type) = content_type {
                builder = builder.header("content-type", content_type);
            }
            builder.body(Bytes::copy_from_slice(body)).unwrap()
        }

        #[test]
        fn test_undeclared_request_content_type() {
            let errors = validator()
                .validate_http_request(&post(Some("text/plain"), b"hello"))
                .unwrap_err();
            assert_eq!(errors.len(), 1);
            assert_eq!(
                errors[0].message,
                "POST operation request content type 'text/plain' does not exist"
            );
        }

        #[test]
        fn test_missing_content_type_header() {
            let errors = validator()
                .validate_http_request(&post(None, b"{\"name\":\"Ruby\"}"))
                .unwrap_err();
            assert_eq!(errors.len(), 1);
            assert_eq!(
                errors[0].message,
                "POST operation on /pets requires a Content-Type header"
            );
        }

        #[test]
        fn test_required_body_missing() {
            let errors = validator()
                .validate_http_request(&post(Some("application/json"), b""))
                .unwrap_err();
            assert_eq!(errors.len(), 1);
            assert_eq!(
                errors[0].message,
                "POST operation on /pets requires a request body"
            );
        }

        #[test]
        fn test_malformed_json_body() {
            let errors = validator()
                .validate_http_request(&post(Some("application/json"), b"{not json"))
                .unwrap_err();
            assert_eq!(errors.len(), 1);
            assert_eq!(
                errors[0].message,
                "POST request body on /pets is not valid JSON"
            );
        }

        #[test]
        fn test_charset_parameter_ignored_for_selection() {
            let request = post(
                Some("application/json; charset=utf-8"),
                b"{\"name\":\"Ruby\"}",
            );
            assert!(validator().validate_http_request(&request).is_ok());
        }

        #[test]
        fn test_response_without_content_type_header() {
            let validator = validator();
            let request = post(Some("application/json"), b"{\"name\":\"Ruby\"}");
            // the 404 response declares content, so the header is required
            let response = http::Response::builder()
                .status(404)
                .body(Bytes::new())
                .unwrap();
            let errors = validator
                .validate_http_response(&request, &response)
                .unwrap_err();
            assert_eq!(errors.len(), 1);
            assert_eq!(
                errors[0].message,
                "POST / 404 response requires a Content-Type header"
            );
        }

        #[test]
        fn test_exact_status_wins_over_range() {
            let validator = validator();
            let request = post(Some("application/json"), b"{\"name\":\"Ruby\"}");

            // 404 selects the exact response, whose schema requires "code"
            let response = http::Response::builder()
                .status(404)
                .header("content-type", "application/json")
                .body(Bytes::from_static(b"{}"))
                .unwrap();
            let errors = validator
                .validate_http_response(&request, &response)
                .unwrap_err();
            assert_eq!(errors.len(), 1);
            assert!(errors[0].reason.contains("code"));

            // 400 falls back to the 4XX range, which accepts any object
            let response = http::Response::builder()
                .status(400)
                .header("content-type", "application/json")
                .body(Bytes::from_static(b"{}"))
                .unwrap();
            assert!(validator.validate_http_response(&request, &response).is_ok());
        }
    }
}
