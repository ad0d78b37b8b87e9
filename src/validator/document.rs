//! Whole-document validation.
//!
//! Delegates the heavy lifting to the schema adapter: every schema reachable
//! from the document must render inline (no cycles) and compile under the
//! document's draft. Structural checks cover the paths table, parameter
//! schema/content exclusivity, and templates the resolver rejected.

use crate::document::Document;
use crate::error::ValidationError;
use crate::schema::{SchemaAdapter, SchemaFault};
use crate::types::ParameterLocation;
use crate::types::operation::METHOD_SLOTS;
use crate::{
    COMPONENTS_FIELD, CONTENT_FIELD, IN_FIELD, NAME_FIELD, REQUEST_BODY_FIELD, RESPONSES_FIELD,
    SCHEMA_FIELD, SCHEMAS_FIELD,
};
use serde_json::Value;
use std::collections::HashSet;

pub(crate) struct DocumentValidator<'v, 'doc> {
    document: &'v Document,
    adapter: &'v SchemaAdapter<'doc>,
    broken_templates: &'v [(String, String)],
}

impl<'v, 'doc> DocumentValidator<'v, 'doc> {
    pub(crate) fn new(
        document: &'v Document,
        adapter: &'v SchemaAdapter<'doc>,
        broken_templates: &'v [(String, String)],
    ) -> Self {
        Self {
            document,
            adapter,
            broken_templates,
        }
    }

    pub(crate) fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        for (template, detail) in self.broken_templates {
            errors.push(ValidationError::bad_template(template, detail));
        }

        if let Some(schemas) = self
            .document
            .root()
            .get(COMPONENTS_FIELD)
            .and_then(|components| components.get(SCHEMAS_FIELD))
            .and_then(|schemas| schemas.as_object())
        {
            for (name, schema) in schemas {
                self.check_schema(&format!("components/schemas/{}", name), schema, &mut errors);
            }
        }

        let paths: Vec<(String, Value)> = self
            .document
            .paths()
            .iter()
            .map(|(template, item)| (template.clone(), item.clone()))
            .collect();
        for (template, path_item) in paths {
            let path_item = match self.document.resolve(&path_item) {
                Ok(resolved) => resolved.into_owned(),
                Err(error) => {
                    errors.push(ValidationError::document_schema_invalid(
                        &format!("paths/{}", template),
                        &error.to_string(),
                    ));
                    continue;
                }
            };
            for slot in METHOD_SLOTS {
                let Some(operation) = path_item.get(slot) else {
                    continue;
                };
                self.check_operation(&template, slot, &path_item, operation, &mut errors);
            }
        }

        dedupe(errors)
    }

    fn check_operation(
        &self,
        template: &str,
        slot: &str,
        path_item: &Value,
        operation: &Value,
        errors: &mut Vec<ValidationError>,
    ) {
        let location = format!("paths/{}/{}", template, slot);

        match self.document.merged_parameters(path_item, operation) {
            Ok(parameters) => {
                for parameter in &parameters {
                    self.check_parameter(&location, parameter, errors);
                }
            }
            Err(error) => errors.push(ValidationError::document_schema_invalid(
                &format!("{}/parameters", location),
                &error.to_string(),
            )),
        }

        if let Ok(Some(request_body)) = self.document.get_optional(operation, REQUEST_BODY_FIELD) {
            let request_body = request_body.into_owned();
            self.check_content_schemas(
                &format!("{}/requestBody", location),
                &request_body,
                errors,
            );
        }

        if let Ok(Some(responses)) = self.document.get_optional(operation, RESPONSES_FIELD) {
            let responses = responses.into_owned();
            if let Some(responses) = responses.as_object() {
                for (status, response) in responses {
                    let response = match self.document.resolve(response) {
                        Ok(resolved) => resolved.into_owned(),
                        Err(error) => {
                            errors.push(ValidationError::document_schema_invalid(
                                &format!("{}/responses/{}", location, status),
                                &error.to_string(),
                            ));
                            continue;
                        }
                    };
                    self.check_content_schemas(
                        &format!("{}/responses/{}", location, status),
                        &response,
                        errors,
                    );
                }
            }
        }
    }

    fn check_parameter(
        &self,
        location: &str,
        parameter: &Value,
        errors: &mut Vec<ValidationError>,
    ) {
        let name = parameter
            .get(NAME_FIELD)
            .and_then(|name| name.as_str())
            .unwrap_or("<unnamed>");
        let parameter_location = parameter
            .get(IN_FIELD)
            .and_then(|l| l.as_str())
            .and_then(ParameterLocation::parse)
            .unwrap_or(ParameterLocation::Query);

        let has_schema = parameter.get(SCHEMA_FIELD).is_some();
        let has_content = parameter.get(CONTENT_FIELD).is_some();
        match (has_schema, has_content) {
            (true, true) => errors.push(ValidationError::parameter_definition_conflict(
                parameter_location,
                name,
                "the parameter declares both 'schema' and 'content'",
            )),
            (false, false) => errors.push(ValidationError::parameter_definition_conflict(
                parameter_location,
                name,
                "the parameter declares neither 'schema' nor 'content'",
            )),
            _ => {}
        }

        if let Some(schema) = parameter.get(SCHEMA_FIELD) {
            self.check_schema(&format!("{}/parameters/{}", location, name), schema, errors);
        }
        self.check_content_schemas(&format!("{}/parameters/{}", location, name), parameter, errors);
    }

    fn check_content_schemas(&self, location: &str, owner: &Value, errors: &mut Vec<ValidationError>) {
        let Some(content) = owner.get(CONTENT_FIELD).and_then(|content| content.as_object()) else {
            return;
        };
        for (media, entry) in content {
            if let Some(schema) = entry.get(SCHEMA_FIELD) {
                self.check_schema(&format!("{}/content/{}", location, media), schema, errors);
            }
        }
    }

    fn check_schema(&self, location: &str, schema: &Value, errors: &mut Vec<ValidationError>) {
        match self.adapter.compile(schema) {
            Ok(_) => {}
            Err(SchemaFault::Circular(reference)) => {
                errors.push(ValidationError::document_circular_reference(&reference));
            }
            Err(SchemaFault::Compile(detail)) => {
                errors.push(ValidationError::document_schema_invalid(location, &detail));
            }
        }
    }
}

/// A schema reused across operations reports each fault once.
fn dedupe(errors: Vec<ValidationError>) -> Vec<ValidationError> {
    let mut seen = HashSet::new();
    errors
        .into_iter()
        .filter(|error| seen.insert((error.kind, error.message.clone())))
        .collect()
}
