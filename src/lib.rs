//! oasguard validates live HTTP exchanges against an OpenAPI 3.0.x / 3.1.x
//! contract.
//!
//! The validator is built once from a parsed specification and is then shared
//! across requests. Construction is the "warm" phase: the radix path index is
//! built, every templated path segment gets a compiled regex, and every schema
//! reachable from the document is rendered inline and compiled. Per-request
//! validation only reads.
//!
//! ```rust
//! use oasguard::OpenApiValidator;
//! use bytes::Bytes;
//! use serde_json::json;
//!
//! let document = json!({
//!     "openapi": "3.1.0",
//!     "paths": {
//!         "/pets/{petId}": {
//!             "get": {
//!                 "parameters": [{
//!                     "name": "petId",
//!                     "in": "path",
//!                     "required": true,
//!                     "schema": { "type": "integer" }
//!                 }],
//!                 "responses": { "200": { "description": "ok" } }
//!             }
//!         }
//!     }
//! });
//!
//! let validator = OpenApiValidator::new(document).unwrap();
//! let request = http::Request::builder()
//!     .method("GET")
//!     .uri("https://example.com/pets/42")
//!     .body(Bytes::new())
//!     .unwrap();
//! assert!(validator.validate_http_request(&request).is_ok());
//! ```

pub mod cache;
pub mod converter;
pub mod document;
pub mod error;
pub mod paths;
pub mod schema;
pub mod styles;
pub mod types;
pub mod validator;

pub use cache::{RegexCache, SchemaCache};
pub use converter::{HttpRequestLike, HttpResponseLike};
pub use document::Document;
pub use error::{SchemaValidationFailure, ValidationError, ValidationKind, ValidationSubKind};
pub use paths::pattern::{CompiledPattern, RegexEngine};
pub use paths::radix::PathTree;
pub use paths::ResolvedRoute;
pub use types::version::OpenApiVersion;
pub use validator::{OpenApiValidator, ValidatorOptions};

// Specification field names, shared across the crate so a renamed key only
// ever changes in one place.
pub(crate) const OPENAPI_FIELD: &str = "openapi";
pub(crate) const PATHS_FIELD: &str = "paths";
pub(crate) const SERVERS_FIELD: &str = "servers";
pub(crate) const URL_FIELD: &str = "url";
pub(crate) const COMPONENTS_FIELD: &str = "components";
pub(crate) const SCHEMAS_FIELD: &str = "schemas";
pub(crate) const SECURITY_FIELD: &str = "security";
pub(crate) const SECURITY_SCHEMES_FIELD: &str = "securitySchemes";
pub(crate) const PARAMETERS_FIELD: &str = "parameters";
pub(crate) const NAME_FIELD: &str = "name";
pub(crate) const IN_FIELD: &str = "in";
pub(crate) const REQUIRED_FIELD: &str = "required";
pub(crate) const STYLE_FIELD: &str = "style";
pub(crate) const EXPLODE_FIELD: &str = "explode";
pub(crate) const ALLOW_RESERVED_FIELD: &str = "allowReserved";
pub(crate) const SCHEMA_FIELD: &str = "schema";
pub(crate) const CONTENT_FIELD: &str = "content";
pub(crate) const REQUEST_BODY_FIELD: &str = "requestBody";
pub(crate) const RESPONSES_FIELD: &str = "responses";
pub(crate) const DEFAULT_FIELD: &str = "default";
pub(crate) const REF_FIELD: &str = "$ref";
pub(crate) const TYPE_FIELD: &str = "type";
pub(crate) const ITEMS_FIELD: &str = "items";
pub(crate) const PROPERTIES_FIELD: &str = "properties";
pub(crate) const ENUM_FIELD: &str = "enum";
pub(crate) const NULLABLE_FIELD: &str = "nullable";
pub(crate) const SCHEME_FIELD: &str = "scheme";

pub(crate) const APPLICATION_JSON: &str = "application/json";
pub(crate) const NULL_TYPE: &str = "null";

pub(crate) const PATH_SEPARATOR: &str = "/";
pub(crate) const TILDE: &str = "~";
pub(crate) const ENCODED_TILDE: &str = "~0";
pub(crate) const ENCODED_SLASH: &str = "~1";
