//! The validator facade and per-request orchestration.
//!
//! `OpenApiValidator` binds a document for its lifetime and owns the warm
//! state: radix tree, compiled segment regexes, compiled schemas. Each
//! `validate_*` call builds one read-only [`RequestContext`] and fans the
//! independent validators out, sequentially for bodyless requests and on
//! scoped worker threads when a body is present. Either way the aggregate
//! error list is re-sorted by `(kind, message)`, so identical inputs yield
//! byte-identical output regardless of scheduling.

mod body;
mod document;
mod parameters;
mod security;

use crate::cache::{RegexCache, SchemaCache};
use crate::converter::{HttpRequestLike, HttpResponseLike};
use crate::document::{Document, Resolved};
use crate::error::ValidationError;
use crate::paths::pattern::{DefaultRegexEngine, RegexEngine};
use crate::paths::{PathResolver, ResolvedRoute};
use crate::schema::SchemaAdapter;
use crate::styles::percent_decode;
use crate::types::operation::{is_known_method, operation_for_method};
use crate::types::version::OpenApiVersion;
use crate::validator::body::BodyValidator;
use crate::validator::document::DocumentValidator;
use crate::validator::parameters::ParameterValidator;
use crate::validator::security::SecurityValidator;
use crate::SECURITY_FIELD;
use http::{HeaderMap, Method};
use serde_json::Value;
use std::sync::{Arc, Mutex};
use std::thread;

/// Construction-time configuration.
///
/// Every knob defaults to on; disabling the caches or the tree changes
/// performance, never outcomes.
#[derive(Clone)]
pub struct ValidatorOptions {
    path_tree_enabled: bool,
    schema_cache_enabled: bool,
    regex_cache_enabled: bool,
    regex_engine: Option<Arc<dyn RegexEngine>>,
}

impl Default for ValidatorOptions {
    fn default() -> Self {
        Self {
            path_tree_enabled: true,
            schema_cache_enabled: true,
            regex_cache_enabled: true,
            regex_engine: None,
        }
    }
}

impl ValidatorOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Disable the radix index; every lookup then goes through the regex
    /// matcher.
    pub fn path_tree(mut self, enabled: bool) -> Self {
        self.path_tree_enabled = enabled;
        self
    }

    pub fn schema_cache(mut self, enabled: bool) -> Self {
        self.schema_cache_enabled = enabled;
        self
    }

    pub fn regex_cache(mut self, enabled: bool) -> Self {
        self.regex_cache_enabled = enabled;
        self
    }

    /// Plug a non-default engine for template segment patterns.
    pub fn regex_engine(mut self, engine: Arc<dyn RegexEngine>) -> Self {
        self.regex_engine = Some(engine);
        self
    }
}

/// One decoded query pair. `raw_value` keeps the undecoded text for the
/// `allowReserved` check, which must see percent escapes as sent.
pub(crate) struct QueryPair {
    pub(crate) name: String,
    pub(crate) value: String,
    pub(crate) raw_value: String,
}

/// Everything the per-concern validators need, built exactly once per call
/// and read-only afterwards.
pub(crate) struct RequestContext<'doc, 'req> {
    pub(crate) method: Method,
    pub(crate) stripped_path: String,
    pub(crate) segments: Vec<String>,
    pub(crate) route: ResolvedRoute<'doc>,
    pub(crate) operation: Value,
    pub(crate) parameters: Vec<Value>,
    pub(crate) security: Option<Value>,
    pub(crate) headers: &'req HeaderMap,
    pub(crate) query: Vec<QueryPair>,
    pub(crate) cookies: Vec<(String, String)>,
    pub(crate) version: OpenApiVersion,
}

/// Validates live HTTP exchanges against one OpenAPI document.
pub struct OpenApiValidator {
    document: Document,
    resolver: PathResolver,
    schema_cache: Option<Arc<SchemaCache>>,
    options: ValidatorOptions,
}

impl OpenApiValidator {
    /// Builds a validator with default options. This is the warm phase: the
    /// radix tree, segment regexes, and schema compilations all happen here.
    pub fn new(document: Value) -> Result<Self, ValidationError> {
        Self::with_options(document, ValidatorOptions::default())
    }

    pub fn with_options(
        document: Value,
        options: ValidatorOptions,
    ) -> Result<Self, ValidationError> {
        let document = Document::new(document)?;
        let engine: Arc<dyn RegexEngine> = options
            .regex_engine
            .clone()
            .unwrap_or_else(|| Arc::new(DefaultRegexEngine));
        let regex_cache = options
            .regex_cache_enabled
            .then(|| Arc::new(RegexCache::new()));
        let resolver = PathResolver::new(
            &document,
            options.path_tree_enabled,
            regex_cache,
            engine,
        );
        let schema_cache = options
            .schema_cache_enabled
            .then(|| Arc::new(SchemaCache::new()));

        let validator = Self {
            document,
            resolver,
            schema_cache,
            options,
        };
        validator.warm_schemas();
        Ok(validator)
    }

    /// Replaces the bound document and rebuilds all warm state.
    pub fn set_document(&mut self, document: Value) -> Result<(), ValidationError> {
        *self = Self::with_options(document, self.options.clone())?;
        Ok(())
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Compiling every reachable schema is exactly the document walk the
    /// document validator performs; at construction its findings only warm
    /// the cache.
    fn warm_schemas(&self) {
        let adapter = SchemaAdapter::new(&self.document, self.schema_cache.clone());
        let findings =
            DocumentValidator::new(&self.document, &adapter, self.resolver.broken_templates())
                .validate();
        if let Some(cache) = &self.schema_cache {
            log::debug!(
                "warmed {} schema compilations ({} document findings deferred)",
                cache.len(),
                findings.len()
            );
        }
    }

    // -- facade ---------------------------------------------------------------

    /// Validates a request. Requests carrying a body fan out across worker
    /// threads; bodyless requests run the sequential pipeline to skip the
    /// scheduling overhead.
    pub fn validate_http_request<R>(&self, request: &R) -> Result<(), Vec<ValidationError>>
    where
        R: HttpRequestLike,
    {
        let ctx = self.build_request_context(request)?;
        let content_type = request.content_type();
        let errors = if request.content_length() > 0 {
            self.run_concurrent(&ctx, content_type.as_deref(), request.body_bytes())
        } else {
            self.run_sync(&ctx, content_type.as_deref(), request.body_bytes())
        };
        finish(errors)
    }

    /// The always-sequential form of [`validate_http_request`]. Returns the
    /// same error multiset for any request.
    ///
    /// [`validate_http_request`]: OpenApiValidator::validate_http_request
    pub fn validate_http_request_sync<R>(&self, request: &R) -> Result<(), Vec<ValidationError>>
    where
        R: HttpRequestLike,
    {
        let ctx = self.build_request_context(request)?;
        let content_type = request.content_type();
        let errors = self.run_sync(&ctx, content_type.as_deref(), request.body_bytes());
        finish(errors)
    }

    /// Validates the response of an exchange: status code, content type, and
    /// body schema for the operation the request resolves to.
    pub fn validate_http_response<R, S>(
        &self,
        request: &R,
        response: &S,
    ) -> Result<(), Vec<ValidationError>>
    where
        R: HttpRequestLike,
        S: HttpResponseLike,
    {
        let ctx = self.build_request_context(request)?;
        let errors = self.run_response(&ctx, response);
        finish(errors)
    }

    /// Runs the full request pipeline, then response validation on the
    /// already-resolved route.
    pub fn validate_http_request_response<R, S>(
        &self,
        request: &R,
        response: &S,
    ) -> Result<(), Vec<ValidationError>>
    where
        R: HttpRequestLike,
        S: HttpResponseLike,
    {
        let ctx = self.build_request_context(request)?;
        let content_type = request.content_type();
        let mut errors = if request.content_length() > 0 {
            self.run_concurrent(&ctx, content_type.as_deref(), request.body_bytes())
        } else {
            self.run_sync(&ctx, content_type.as_deref(), request.body_bytes())
        };
        errors.extend(self.run_response(&ctx, response));
        ValidationError::sort(&mut errors);
        finish(errors)
    }

    /// Validates the document itself: version, structure, and every
    /// reachable schema.
    pub fn validate_document(&self) -> Result<(), Vec<ValidationError>> {
        let adapter = SchemaAdapter::new(&self.document, self.schema_cache.clone());
        let mut errors =
            DocumentValidator::new(&self.document, &adapter, self.resolver.broken_templates())
                .validate();
        ValidationError::sort(&mut errors);
        finish(errors)
    }

    /// Pre-resolved variant: validates the request against a path item the
    /// caller already matched, skipping path resolution.
    pub fn validate_http_request_with_path_item<R>(
        &self,
        request: &R,
        path_item: &Value,
        template: &str,
    ) -> Result<(), Vec<ValidationError>>
    where
        R: HttpRequestLike,
    {
        let ctx = self.build_context_for_route(request, path_item, template)?;
        let content_type = request.content_type();
        let errors = self.run_sync(&ctx, content_type.as_deref(), request.body_bytes());
        finish(errors)
    }

    /// Pre-resolved variant of response validation.
    pub fn validate_http_response_with_path_item<R, S>(
        &self,
        request: &R,
        response: &S,
        path_item: &Value,
        template: &str,
    ) -> Result<(), Vec<ValidationError>>
    where
        R: HttpRequestLike,
        S: HttpResponseLike,
    {
        let ctx = self.build_context_for_route(request, path_item, template)?;
        let errors = self.run_response(&ctx, response);
        finish(errors)
    }

    // -- context --------------------------------------------------------------

    fn build_request_context<'req, R>(
        &self,
        request: &'req R,
    ) -> Result<RequestContext<'_, 'req>, Vec<ValidationError>>
    where
        R: HttpRequestLike,
    {
        let stripped_path = self.resolver.strip_base(request.escaped_path());
        let route = self
            .resolver
            .resolve(&self.document, &stripped_path)
            .map_err(|error| vec![error])?;
        self.finish_context(request, stripped_path, route)
    }

    fn build_context_for_route<'doc, 'req, R>(
        &'doc self,
        request: &'req R,
        path_item: &'doc Value,
        template: &str,
    ) -> Result<RequestContext<'doc, 'req>, Vec<ValidationError>>
    where
        R: HttpRequestLike,
    {
        let stripped_path = self.resolver.strip_base(request.escaped_path());
        let route = ResolvedRoute {
            path_item: Resolved::Plain(path_item),
            template: template.to_string(),
            path_params: None,
        };
        self.finish_context(request, stripped_path, route)
    }

    fn finish_context<'doc, 'req, R>(
        &'doc self,
        request: &'req R,
        stripped_path: String,
        route: ResolvedRoute<'doc>,
    ) -> Result<RequestContext<'doc, 'req>, Vec<ValidationError>>
    where
        R: HttpRequestLike,
    {
        let method = request.method().clone();
        let operation = match operation_for_method(route.path_item.value(), method.as_str()) {
            Some(operation) => operation.clone(),
            None => {
                if !is_known_method(method.as_str()) {
                    log::debug!("request uses unknown HTTP method '{}'", method);
                }
                return Err(vec![ValidationError::method_missing(
                    method.as_str(),
                    &route.template,
                )]);
            }
        };

        let path_item = route.path_item.clone().into_owned();
        let parameters = self
            .document
            .merged_parameters(&path_item, &operation)
            .map_err(|error| {
                vec![ValidationError::document_schema_invalid(
                    &format!("paths/{}/parameters", route.template),
                    &error.to_string(),
                )]
            })?;

        let security = operation
            .get(SECURITY_FIELD)
            .cloned()
            .or_else(|| self.document.document_security().cloned());

        let segments: Vec<String> = stripped_path
            .split('/')
            .filter(|segment| !segment.is_empty())
            .map(str::to_string)
            .collect();

        let query = request
            .raw_query()
            .map(parse_query_pairs)
            .unwrap_or_default();

        let version = self.document.version();
        log::trace!(
            "context built for {} {} against template '{}' (OpenAPI {:?})",
            method,
            stripped_path,
            route.template,
            version
        );

        Ok(RequestContext {
            method,
            stripped_path,
            segments,
            route,
            operation,
            parameters,
            security,
            headers: request.headers(),
            query,
            cookies: request.cookies(),
            version,
        })
    }

    // -- pipelines ------------------------------------------------------------

    fn run_sync(
        &self,
        ctx: &RequestContext,
        content_type: Option<&str>,
        body: &[u8],
    ) -> Vec<ValidationError> {
        log::trace!(
            "sequential pipeline for {} {} (OpenAPI {:?})",
            ctx.method,
            ctx.stripped_path,
            ctx.version
        );
        let adapter = SchemaAdapter::new(&self.document, self.schema_cache.clone());
        let parameters = ParameterValidator::new(&adapter);
        let bodies = BodyValidator::new(&self.document, &adapter);
        let security = SecurityValidator::new(&self.document);

        let mut errors = Vec::new();
        errors.extend(parameters.validate_path(ctx));
        errors.extend(parameters.validate_cookie(ctx));
        errors.extend(parameters.validate_header(ctx));
        errors.extend(parameters.validate_query(ctx));
        errors.extend(security.validate(ctx));
        errors.extend(bodies.validate_request_body(ctx, content_type, body));
        ValidationError::sort(&mut errors);
        errors
    }

    /// One scoped worker per validator; the shared error slice is the only
    /// state they touch, behind a mutex. The join plus the final sort make
    /// the output independent of scheduling.
    fn run_concurrent(
        &self,
        ctx: &RequestContext,
        content_type: Option<&str>,
        body: &[u8],
    ) -> Vec<ValidationError> {
        log::trace!(
            "concurrent pipeline for {} {} (OpenAPI {:?})",
            ctx.method,
            ctx.stripped_path,
            ctx.version
        );
        let adapter = SchemaAdapter::new(&self.document, self.schema_cache.clone());
        let collected: Mutex<Vec<ValidationError>> = Mutex::new(Vec::new());

        let adapter = &adapter;
        thread::scope(|scope| {
            let push = |errors: Vec<ValidationError>| {
                if errors.is_empty() {
                    return;
                }
                match collected.lock() {
                    Ok(mut slice) => slice.extend(errors),
                    Err(poisoned) => poisoned.into_inner().extend(errors),
                }
            };

            scope.spawn(move || push(ParameterValidator::new(adapter).validate_path(ctx)));
            scope.spawn(move || push(ParameterValidator::new(adapter).validate_cookie(ctx)));
            scope.spawn(move || push(ParameterValidator::new(adapter).validate_header(ctx)));
            scope.spawn(move || push(ParameterValidator::new(adapter).validate_query(ctx)));
            scope.spawn(move || push(SecurityValidator::new(&self.document).validate(ctx)));
            scope.spawn(move || {
                push(
                    BodyValidator::new(&self.document, adapter)
                        .validate_request_body(ctx, content_type, body),
                )
            });
        });

        let mut errors = match collected.into_inner() {
            Ok(errors) => errors,
            Err(poisoned) => poisoned.into_inner(),
        };
        ValidationError::sort(&mut errors);
        errors
    }

    fn run_response<S>(&self, ctx: &RequestContext, response: &S) -> Vec<ValidationError>
    where
        S: HttpResponseLike,
    {
        let adapter = SchemaAdapter::new(&self.document, self.schema_cache.clone());
        let bodies = BodyValidator::new(&self.document, &adapter);
        let mut errors = bodies.validate_response_body(
            ctx,
            response.status(),
            response.content_type().as_deref(),
            response.body_bytes(),
        );
        ValidationError::sort(&mut errors);
        errors
    }
}

fn finish(errors: Vec<ValidationError>) -> Result<(), Vec<ValidationError>> {
    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

fn parse_query_pairs(raw: &str) -> Vec<QueryPair> {
    raw.split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((name, value)) => QueryPair {
                name: percent_decode(name),
                value: percent_decode(value),
                raw_value: value.to_string(),
            },
            None => QueryPair {
                name: percent_decode(pair),
                value: String::new(),
                raw_value: String::new(),
            },
        })
        .collect()
}
