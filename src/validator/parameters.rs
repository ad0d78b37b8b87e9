//! Parameter validation across the OpenAPI style/explode matrix.
//!
//! One validator instance serves all four locations. Each parameter walks the
//! same states: decode per its declared style, type-check primitives, validate
//! structured values through the schema adapter. A parameter that fails to
//! decode contributes its error and stops its own value checks, but never
//! aborts sibling parameters.

use crate::error::ValidationError;
use crate::schema::{SchemaAdapter, SchemaFault};
use crate::styles::{self, ParameterStyle};
use crate::types::ParameterLocation;
use crate::types::primitive::PrimitiveType;
use crate::validator::RequestContext;
use crate::{
    ALLOW_RESERVED_FIELD, APPLICATION_JSON, CONTENT_FIELD, ENUM_FIELD, EXPLODE_FIELD, IN_FIELD,
    ITEMS_FIELD, NAME_FIELD, PROPERTIES_FIELD, REQUIRED_FIELD, SCHEMA_FIELD, STYLE_FIELD,
};
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use std::sync::Arc;

pub(crate) struct ParameterValidator<'v, 'doc> {
    adapter: &'v SchemaAdapter<'doc>,
}

/// A parameter definition reduced to the fields validation needs, with the
/// schema-vs-content exclusivity already enforced.
struct ParameterView<'a> {
    node: &'a Value,
    name: &'a str,
    required: bool,
    style: ParameterStyle,
    explode: bool,
    allow_reserved: bool,
    schema: Option<&'a Value>,
    /// Set when the parameter declares `content: application/json` instead of
    /// a schema; the raw value is then parsed as JSON before validation.
    json_content_schema: Option<&'a Value>,
}

impl<'v, 'doc> ParameterValidator<'v, 'doc> {
    pub(crate) fn new(adapter: &'v SchemaAdapter<'doc>) -> Self {
        Self { adapter }
    }

    pub(crate) fn validate_path(&self, ctx: &RequestContext) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        for view in self.collect_views(ctx, ParameterLocation::Path, &mut errors) {
            let raw = self.raw_path_segment(ctx, view.name);
            match raw {
                Some(raw) => self.check_path_value(&view, &raw, &mut errors),
                None => {
                    if view.required {
                        errors.push(
                            ValidationError::parameter_missing(ParameterLocation::Path, view.name)
                                .with_context(Arc::new(view.node.clone())),
                        );
                    }
                }
            }
        }
        errors
    }

    pub(crate) fn validate_query(&self, ctx: &RequestContext) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        for view in self.collect_views(ctx, ParameterLocation::Query, &mut errors) {
            self.check_query_parameter(ctx, &view, &mut errors);
        }
        errors
    }

    pub(crate) fn validate_header(&self, ctx: &RequestContext) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        for view in self.collect_views(ctx, ParameterLocation::Header, &mut errors) {
            // Header lookup is case-insensitive by construction of HeaderMap.
            let value = ctx
                .headers
                .get(view.name.to_lowercase())
                .and_then(|value| value.to_str().ok());
            match value {
                Some(raw) => self.check_flat_value(ParameterLocation::Header, &view, raw, &mut errors),
                None => {
                    if view.required {
                        errors.push(
                            ValidationError::parameter_missing(
                                ParameterLocation::Header,
                                view.name,
                            )
                            .with_context(Arc::new(view.node.clone())),
                        );
                    }
                }
            }
        }
        errors
    }

    pub(crate) fn validate_cookie(&self, ctx: &RequestContext) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        for view in self.collect_views(ctx, ParameterLocation::Cookie, &mut errors) {
            // Cookie names compare case-sensitively.
            let value = ctx
                .cookies
                .iter()
                .find(|(name, _)| name == view.name)
                .map(|(_, value)| value.as_str());
            match value {
                Some(raw) => self.check_flat_value(ParameterLocation::Cookie, &view, raw, &mut errors),
                None => {
                    if view.required {
                        errors.push(
                            ValidationError::parameter_missing(
                                ParameterLocation::Cookie,
                                view.name,
                            )
                            .with_context(Arc::new(view.node.clone())),
                        );
                    }
                }
            }
        }
        errors
    }

    // -- definition collection ------------------------------------------------

    fn collect_views<'a>(
        &self,
        ctx: &'a RequestContext,
        location: ParameterLocation,
        errors: &mut Vec<ValidationError>,
    ) -> Vec<ParameterView<'a>> {
        let mut views = Vec::new();
        for node in &ctx.parameters {
            let Some(declared) = node.get(IN_FIELD).and_then(|l| l.as_str()) else {
                continue;
            };
            if ParameterLocation::parse(declared) != Some(location) {
                continue;
            }
            let Some(name) = node.get(NAME_FIELD).and_then(|name| name.as_str()) else {
                log::warn!("parameter definition without a name in '{}'", ctx.route.template);
                continue;
            };

            let schema = node.get(SCHEMA_FIELD);
            let content = node.get(CONTENT_FIELD).and_then(|content| content.as_object());
            let (schema, json_content_schema) = match (schema, content) {
                (Some(_), Some(_)) => {
                    errors.push(ValidationError::parameter_definition_conflict(
                        location,
                        name,
                        "the parameter declares both 'schema' and 'content'",
                    ));
                    continue;
                }
                (None, None) => {
                    errors.push(ValidationError::parameter_definition_conflict(
                        location,
                        name,
                        "the parameter declares neither 'schema' nor 'content'",
                    ));
                    continue;
                }
                (Some(schema), None) => (Some(schema), None),
                (None, Some(content)) => {
                    let media_schema = content
                        .iter()
                        .next()
                        .and_then(|(media, entry)| {
                            entry.get(SCHEMA_FIELD).map(|schema| (media.as_str(), schema))
                        });
                    match media_schema {
                        Some((media, media_schema)) if media == APPLICATION_JSON => {
                            (None, Some(media_schema))
                        }
                        Some((_, media_schema)) => (Some(media_schema), None),
                        None => (None, None),
                    }
                }
            };

            let style = node
                .get(STYLE_FIELD)
                .and_then(|style| style.as_str())
                .and_then(ParameterStyle::parse)
                .unwrap_or_else(|| ParameterStyle::default_for(location));
            let explode = node
                .get(EXPLODE_FIELD)
                .and_then(|explode| explode.as_bool())
                .unwrap_or_else(|| style.default_explode());
            let required = node
                .get(REQUIRED_FIELD)
                .and_then(|required| required.as_bool())
                .unwrap_or(location == ParameterLocation::Path);
            let allow_reserved = node
                .get(ALLOW_RESERVED_FIELD)
                .and_then(|allowed| allowed.as_bool())
                .unwrap_or(false);

            views.push(ParameterView {
                node,
                name,
                required,
                style,
                explode,
                allow_reserved,
                schema,
                json_content_schema,
            });
        }
        views
    }

    fn raw_path_segment(&self, ctx: &RequestContext, name: &str) -> Option<String> {
        if let Some(params) = &ctx.route.path_params {
            if let Some(raw) = params.get(name) {
                return Some(raw.clone());
            }
        }
        // Regex fallback may match without extraction; recover the segment by
        // position in the matched template.
        let template_segments: Vec<&str> = ctx
            .route
            .template
            .split('/')
            .filter(|segment| !segment.is_empty())
            .collect();
        for (index, segment) in template_segments.iter().enumerate() {
            if crate::paths::pattern::parameter_name(segment) == Some(name) {
                return ctx.segments.get(index).cloned();
            }
        }
        None
    }

    // -- per-location value checks --------------------------------------------

    fn check_path_value(
        &self,
        view: &ParameterView,
        raw: &str,
        errors: &mut Vec<ValidationError>,
    ) {
        let location = ParameterLocation::Path;
        if let Some(content_schema) = view.json_content_schema {
            self.check_json_value(location, view, &styles::percent_decode(raw), content_schema, errors);
            return;
        }
        let Some(schema) = view.schema else { return };

        match PrimitiveType::of_schema(schema) {
            Some(PrimitiveType::Array) => {
                let items = match view.style {
                    ParameterStyle::Simple => {
                        Some(styles::split_delimited(raw, view.style.delimiter()))
                    }
                    ParameterStyle::Label => styles::decode_label_array(raw),
                    ParameterStyle::Matrix => {
                        styles::decode_matrix_array(raw, view.name, view.explode)
                    }
                    _ => Some(styles::split_delimited(raw, ',')),
                };
                match items {
                    Some(items) => {
                        let decoded: Vec<String> =
                            items.iter().map(|item| styles::percent_decode(item)).collect();
                        self.check_array_items(location, view, &decoded, schema, errors);
                    }
                    None => errors.push(ValidationError::parameter_style_mismatch(
                        location,
                        view.name,
                        view.style.name(),
                        &format!("the segment '{}' does not carry the expected style prefix", raw),
                    )),
                }
            }
            Some(PrimitiveType::Object) => {
                let object = match view.style {
                    ParameterStyle::Simple => {
                        if view.explode {
                            styles::object_from_assignments(raw, ',')
                        } else {
                            styles::object_from_alternating(&styles::split_delimited(raw, ','))
                        }
                    }
                    ParameterStyle::Label => styles::decode_label_object(raw, view.explode),
                    ParameterStyle::Matrix => {
                        styles::decode_matrix_object(raw, view.name, view.explode)
                    }
                    _ => styles::object_from_alternating(&styles::split_delimited(raw, ',')),
                };
                self.check_decoded_object(location, view, object, raw, schema, errors);
            }
            _ => {
                let primitive = match view.style {
                    ParameterStyle::Label => styles::decode_label_primitive(raw).map(str::to_string),
                    ParameterStyle::Matrix => {
                        styles::decode_matrix_primitive(raw, view.name).map(str::to_string)
                    }
                    _ => Some(raw.to_string()),
                };
                match primitive {
                    Some(value) => {
                        let decoded = styles::percent_decode(&value);
                        self.check_primitive_text(location, view, &decoded, schema, errors);
                    }
                    None => errors.push(ValidationError::parameter_style_mismatch(
                        location,
                        view.name,
                        view.style.name(),
                        &format!("the segment '{}' does not carry the expected style prefix", raw),
                    )),
                }
            }
        }
    }

    fn check_query_parameter(
        &self,
        ctx: &RequestContext,
        view: &ParameterView,
        errors: &mut Vec<ValidationError>,
    ) {
        let location = ParameterLocation::Query;
        let values: Vec<&crate::validator::QueryPair> = ctx
            .query
            .iter()
            .filter(|pair| pair.name == view.name)
            .collect();

        if values.is_empty() {
            let is_deep_object = view.style == ParameterStyle::DeepObject
                && ctx
                    .query
                    .iter()
                    .any(|pair| pair.name.starts_with(&format!("{}[", view.name)));
            if !is_deep_object {
                if view.required {
                    errors.push(
                        ValidationError::parameter_missing(location, view.name)
                            .with_context(Arc::new(view.node.clone())),
                    );
                }
                return;
            }
        }

        // allowReserved: with the default (false) and exploded form encoding,
        // reserved characters must arrive percent-encoded. Matrix style is
        // exempt.
        if !view.allow_reserved && view.explode && view.style != ParameterStyle::Matrix {
            for pair in &values {
                if styles::contains_reserved(&pair.raw_value) {
                    errors.push(ValidationError::parameter_reserved_values(
                        location,
                        view.name,
                        &pair.raw_value,
                        &styles::encode_reserved(&pair.raw_value),
                    ));
                    return;
                }
            }
        }

        if let Some(content_schema) = view.json_content_schema {
            if let Some(pair) = values.first() {
                self.check_json_value(location, view, &pair.value, content_schema, errors);
            }
            return;
        }
        let Some(schema) = view.schema else { return };

        match PrimitiveType::of_schema(schema) {
            Some(PrimitiveType::Array) => {
                let delimiter = view.style.delimiter();
                if view.explode
                    && values.len() > 1
                    && values.iter().all(|pair| !pair.value.contains(delimiter))
                {
                    for _ in &values {
                        errors.push(
                            ValidationError::parameter_not_exploded(location, view.name)
                                .with_context(Arc::new(view.node.clone())),
                        );
                    }
                    return;
                }
                let items: Vec<String> = values
                    .iter()
                    .flat_map(|pair| styles::split_delimited(&pair.value, delimiter))
                    .collect();
                self.check_array_items(location, view, &items, schema, errors);
            }
            Some(PrimitiveType::Object) => {
                let object = match view.style {
                    ParameterStyle::DeepObject => {
                        let pairs: Vec<(String, String)> = ctx
                            .query
                            .iter()
                            .map(|pair| (pair.name.clone(), pair.value.clone()))
                            .collect();
                        let decoded = styles::decode_deep_object(view.name, &pairs);
                        if decoded.is_empty() { None } else { Some(decoded) }
                    }
                    ParameterStyle::SpaceDelimited | ParameterStyle::PipeDelimited => values
                        .first()
                        .and_then(|pair| {
                            styles::object_from_alternating(&styles::split_delimited(
                                &pair.value,
                                view.style.delimiter(),
                            ))
                        }),
                    // form: alternating key,value CSV collapsed into a map
                    _ => values.first().and_then(|pair| {
                        styles::object_from_alternating(&styles::split_delimited(&pair.value, ','))
                    }),
                };
                let raw = values.first().map(|pair| pair.value.as_str()).unwrap_or("");
                self.check_decoded_object(location, view, object, raw, schema, errors);
            }
            _ => {
                if let Some(pair) = values.first() {
                    self.check_primitive_text(location, view, &pair.value, schema, errors);
                }
            }
        }
    }

    /// Headers and cookies share the flat, single-value decode: simple/form
    /// style with comma-delimited arrays and alternating key/value objects.
    fn check_flat_value(
        &self,
        location: ParameterLocation,
        view: &ParameterView,
        raw: &str,
        errors: &mut Vec<ValidationError>,
    ) {
        if let Some(content_schema) = view.json_content_schema {
            self.check_json_value(location, view, raw, content_schema, errors);
            return;
        }
        let Some(schema) = view.schema else { return };

        match PrimitiveType::of_schema(schema) {
            Some(PrimitiveType::Array) => {
                let items = styles::split_delimited(raw, ',');
                self.check_array_items(location, view, &items, schema, errors);
            }
            Some(PrimitiveType::Object) => {
                let object = if view.explode {
                    styles::object_from_assignments(raw, ',')
                } else {
                    styles::object_from_alternating(&styles::split_delimited(raw, ','))
                };
                self.check_decoded_object(location, view, object, raw, schema, errors);
            }
            _ => self.check_primitive_text(location, view, raw, schema, errors),
        }
    }

    // -- shared value checks ----------------------------------------------------

    /// Type-checks and enum-checks a primitive, then hands the typed value to
    /// the schema engine for the remaining constraints.
    fn check_primitive_text(
        &self,
        location: ParameterLocation,
        view: &ParameterView,
        raw: &str,
        schema: &Value,
        errors: &mut Vec<ValidationError>,
    ) {
        if raw == "null" && PrimitiveType::schema_is_nullable(schema) {
            return;
        }
        let typed = match PrimitiveType::of_schema(schema) {
            Some(primitive @ (PrimitiveType::Integer | PrimitiveType::Number | PrimitiveType::Boolean)) => {
                match primitive.convert(raw) {
                    Ok(typed) => typed,
                    Err(_) => {
                        errors.push(
                            ValidationError::parameter_wrong_type(
                                location,
                                view.name,
                                raw,
                                &primitive.to_string(),
                            )
                            .with_context(Arc::new(view.node.clone())),
                        );
                        return;
                    }
                }
            }
            _ => json!(raw),
        };

        if let Some(allowed) = schema.get(ENUM_FIELD).and_then(|e| e.as_array()) {
            if !allowed.contains(&typed) {
                let rendered: Vec<String> = allowed.iter().map(render_enum_member).collect();
                errors.push(
                    ValidationError::parameter_enum_mismatch(location, view.name, raw, &rendered)
                        .with_context(Arc::new(view.node.clone())),
                );
                return;
            }
        }

        self.schema_check(location, view, schema, &typed, errors);
    }

    /// Type-checks each array element against `items`, then validates the
    /// whole array against the declared schema.
    fn check_array_items(
        &self,
        location: ParameterLocation,
        view: &ParameterView,
        items: &[String],
        schema: &Value,
        errors: &mut Vec<ValidationError>,
    ) {
        let item_schema = schema.get(ITEMS_FIELD);
        let mut typed_items = Vec::with_capacity(items.len());
        let mut element_failed = false;

        for item in items {
            let typed = match item_schema.and_then(PrimitiveType::of_schema) {
                Some(
                    primitive @ (PrimitiveType::Integer
                    | PrimitiveType::Number
                    | PrimitiveType::Boolean),
                ) => match primitive.convert(item) {
                    Ok(typed) => typed,
                    Err(_) => {
                        element_failed = true;
                        errors.push(
                            ValidationError::parameter_wrong_type(
                                location,
                                view.name,
                                item,
                                &primitive.to_string(),
                            )
                            .with_context(Arc::new(view.node.clone())),
                        );
                        continue;
                    }
                },
                _ => json!(item),
            };
            typed_items.push(typed);
        }

        if !element_failed {
            self.schema_check(location, view, schema, &Value::Array(typed_items), errors);
        }
    }

    /// Validates a decoded key/value map against the object schema, converting
    /// property values by their declared types first.
    fn check_decoded_object(
        &self,
        location: ParameterLocation,
        view: &ParameterView,
        object: Option<BTreeMap<String, String>>,
        raw: &str,
        schema: &Value,
        errors: &mut Vec<ValidationError>,
    ) {
        let Some(object) = object else {
            errors.push(ValidationError::parameter_style_mismatch(
                location,
                view.name,
                view.style.name(),
                &format!("'{}' cannot be decoded as a '{}' object", raw, view.style.name()),
            ));
            return;
        };

        let properties = schema.get(PROPERTIES_FIELD);
        let mut instance = Map::new();
        for (key, value) in object {
            let property_schema = properties.and_then(|properties| properties.get(&key));
            instance.insert(
                key,
                PrimitiveType::convert_lenient(property_schema, &styles::percent_decode(&value)),
            );
        }
        self.schema_check(location, view, schema, &Value::Object(instance), errors);
    }

    /// JSON-content parameters: parse the raw text, then validate. A parse
    /// failure stops this parameter's checks only.
    fn check_json_value(
        &self,
        location: ParameterLocation,
        view: &ParameterView,
        raw: &str,
        schema: &Value,
        errors: &mut Vec<ValidationError>,
    ) {
        match serde_json::from_str::<Value>(raw) {
            Ok(instance) => self.schema_check(location, view, schema, &instance, errors),
            Err(_) => errors.push(
                ValidationError::parameter_invalid_json(location, view.name, raw)
                    .with_context(Arc::new(view.node.clone())),
            ),
        }
    }

    fn schema_check(
        &self,
        location: ParameterLocation,
        view: &ParameterView,
        schema: &Value,
        instance: &Value,
        errors: &mut Vec<ValidationError>,
    ) {
        match self.adapter.validate(schema, instance) {
            Ok(failures) if failures.is_empty() => {}
            Ok(failures) => errors.push(
                ValidationError::parameter_schema_invalid(location, view.name, failures)
                    .with_context(Arc::new(view.node.clone())),
            ),
            Err(SchemaFault::Circular(reference)) => {
                errors.push(ValidationError::document_circular_reference(&reference));
            }
            Err(SchemaFault::Compile(detail)) => {
                errors.push(ValidationError::document_schema_invalid(
                    &format!("parameter '{}'", view.name),
                    &detail,
                ));
            }
        }
    }
}

fn render_enum_member(member: &Value) -> String {
    match member {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
