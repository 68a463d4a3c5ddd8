//! OpenAPI document model and tool extraction.
//!
//! Only the slice of OpenAPI this bridge needs is modelled: `paths` with
//! their POST operations, each operation's JSON request body and query
//! parameters, and `components.schemas` for `$ref` resolution. Everything
//! else in the document is ignored.

use std::collections::{BTreeMap, BTreeSet};

use log::{debug, warn};
use serde::Deserialize;
use serde_json::{Map, Value, json};

use toolbridge_common::{Function, Parameters, Property, Tool};

use crate::error::SchemaError;

const SCHEMA_REF_PREFIX: &str = "#/components/schemas/";
const JSON_CONTENT_TYPE: &str = "application/json";

/// Longest function name the chat completion providers accept.
pub const MAX_TOOL_NAME_LEN: usize = 64;

/// Nesting level past which a property schema is cut off as a plain object.
const MAX_SCHEMA_DEPTH: usize = 16;

/// Keywords whose variants are collapsed to the first non-null one.
const COMPOSITION_KEYWORDS: [&str; 3] = ["anyOf", "oneOf", "allOf"];

/// A parsed OpenAPI document.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OpenApiDocument {
    /// Declared OpenAPI version, e.g. `3.1.0`.
    #[serde(default)]
    pub openapi: Option<String>,
    /// API title and version.
    #[serde(default)]
    pub info: Option<Info>,
    /// Path template to path item.
    #[serde(default)]
    pub paths: BTreeMap<String, PathItem>,
    /// Reusable schemas.
    #[serde(default)]
    pub components: Components,
}

/// The `info` block.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Info {
    /// API title.
    #[serde(default)]
    pub title: String,
    /// API version string.
    #[serde(default)]
    pub version: String,
}

/// Operations available on one path. Only POST is modelled.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathItem {
    /// The POST operation, if any.
    #[serde(default)]
    pub post: Option<Operation>,
    /// Parameters shared by every operation on this path.
    #[serde(default)]
    pub parameters: Vec<ParameterOrRef>,
}

/// A single HTTP operation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Operation {
    /// Short summary.
    #[serde(default)]
    pub summary: Option<String>,
    /// Long description.
    #[serde(default)]
    pub description: Option<String>,
    /// Operation identifier.
    #[serde(default, rename = "operationId")]
    pub operation_id: Option<String>,
    /// Operation parameters.
    #[serde(default)]
    pub parameters: Vec<ParameterOrRef>,
    /// The request body.
    #[serde(default, rename = "requestBody")]
    pub request_body: Option<RequestBody>,
}

/// A parameter, or a reference to one.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ParameterOrRef {
    /// `{"$ref": "..."}`.
    Ref {
        /// The reference string.
        #[serde(rename = "$ref")]
        reference: String,
    },
    /// An inline parameter.
    Parameter(ParameterObject),
}

/// An inline operation parameter.
#[derive(Debug, Clone, Deserialize)]
pub struct ParameterObject {
    /// Parameter name.
    pub name: String,
    /// Location: `query`, `path`, `header` or `cookie`.
    #[serde(rename = "in")]
    pub location: String,
    /// Whether the parameter must be supplied.
    #[serde(default)]
    pub required: bool,
    /// Human-readable description.
    #[serde(default)]
    pub description: Option<String>,
    /// JSON schema of the value.
    #[serde(default)]
    pub schema: Option<Value>,
}

/// An operation's request body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RequestBody {
    /// Media type to schema.
    #[serde(default)]
    pub content: BTreeMap<String, MediaType>,
    /// Whether the body must be supplied.
    #[serde(default)]
    pub required: bool,
}

/// Schema for one media type.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MediaType {
    /// The schema, inline or `$ref`.
    #[serde(default)]
    pub schema: Option<Value>,
}

/// The `components` block.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Components {
    /// Named schemas.
    #[serde(default)]
    pub schemas: BTreeMap<String, Value>,
}

impl OpenApiDocument {
    /// Parses a document from its JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::InvalidDocument`] if the text is not a JSON
    /// document of the expected shape.
    pub fn from_json(text: &str) -> Result<Self, SchemaError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Looks up `#/components/schemas/<Name>`.
    fn resolve<'a>(&'a self, schema: &'a Value, path: &str) -> Result<&'a Value, SchemaError> {
        let Some(reference) = schema.get("$ref") else {
            return Ok(schema);
        };
        let reference = reference
            .as_str()
            .ok_or_else(|| SchemaError::resolution(path, "$ref is not a string"))?;
        let name = reference.strip_prefix(SCHEMA_REF_PREFIX).ok_or_else(|| {
            SchemaError::resolution(
                path,
                format!("unsupported reference '{reference}', expected {SCHEMA_REF_PREFIX}<Name>"),
            )
        })?;
        self.components
            .schemas
            .get(name)
            .ok_or_else(|| SchemaError::resolution(path, format!("unknown schema '{name}'")))
    }
}

/// One POST operation turned into a tool declaration.
///
/// Carries what the invoker needs to call the operation back: the original
/// path, which arguments travel in the query string, and whether the rest
/// form a JSON body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedOperation {
    /// The tool declaration handed to the model.
    pub tool: Tool,
    /// The originating API path, e.g. `/multiply`.
    pub path: String,
    /// Names of arguments sent as query parameters.
    pub query_params: BTreeSet<String>,
    /// Whether the operation takes a JSON body.
    pub has_body: bool,
}

/// Derives a tool name from an API path by stripping surrounding `/`.
#[must_use]
pub fn tool_name_for_path(path: &str) -> &str {
    path.trim_matches('/')
}

/// Whether providers accept `name` as a function name: 1 to 64 ASCII
/// letters, digits, `_` or `-`.
#[must_use]
pub fn is_valid_tool_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= MAX_TOOL_NAME_LEN
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Turns every POST operation of `document` into a tool.
///
/// Results are ordered by path.
///
/// # Errors
///
/// - [`SchemaError::SchemaResolution`] if an operation's inputs cannot be
///   resolved to an object schema, or its path yields a name that is empty
///   or not a valid function name (see [`is_valid_tool_name`]).
/// - [`SchemaError::DuplicateToolName`] if two paths derive the same name.
pub fn extract(document: &OpenApiDocument) -> Result<Vec<ExtractedOperation>, SchemaError> {
    let mut seen: BTreeMap<String, &str> = BTreeMap::new();
    let mut operations = Vec::new();

    for (path, item) in &document.paths {
        let Some(operation) = &item.post else {
            continue;
        };

        let name = tool_name_for_path(path);
        if name.is_empty() {
            return Err(SchemaError::resolution(path, "path yields an empty tool name"));
        }
        if !is_valid_tool_name(name) {
            return Err(SchemaError::resolution(
                path,
                format!(
                    "tool name '{name}' is not a valid function name; \
                     only ASCII letters, digits, '_' and '-' are allowed, at most {MAX_TOOL_NAME_LEN} characters"
                ),
            ));
        }
        if let Some(previous) = seen.insert(name.to_string(), path) {
            return Err(SchemaError::DuplicateToolName {
                name: name.to_string(),
                detail: format!("both POST {previous} and POST {path} map to it"),
            });
        }

        let extracted = extract_operation(document, path, name, item, operation)?;
        debug!(
            "Extracted tool '{}' from POST {path} ({} parameters)",
            name,
            extracted.tool.function.parameters.properties.len()
        );
        operations.push(extracted);
    }

    Ok(operations)
}

fn extract_operation(
    document: &OpenApiDocument,
    path: &str,
    name: &str,
    item: &PathItem,
    operation: &Operation,
) -> Result<ExtractedOperation, SchemaError> {
    let mut properties = BTreeMap::new();
    let mut required = Vec::new();
    let mut query_params = BTreeSet::new();

    for parameter in item.parameters.iter().chain(&operation.parameters) {
        let parameter = match parameter {
            ParameterOrRef::Parameter(parameter) => parameter,
            ParameterOrRef::Ref { reference } => {
                return Err(SchemaError::resolution(
                    path,
                    format!("parameter reference '{reference}' is not supported"),
                ));
            }
        };
        if parameter.location != "query" {
            continue;
        }
        let mut property = match &parameter.schema {
            Some(schema) => property_from_schema(document, schema, path)?,
            None => Property::string(""),
        };
        if let Some(description) = &parameter.description {
            property.description.clone_from(description);
        }
        properties.insert(parameter.name.clone(), property);
        if parameter.required && !required.contains(&parameter.name) {
            required.push(parameter.name.clone());
        }
        query_params.insert(parameter.name.clone());
    }

    let has_body = match &operation.request_body {
        Some(body) => {
            let schema = body_schema(document, path, body)?;
            let body_properties = schema
                .get("properties")
                .and_then(Value::as_object)
                .ok_or_else(|| SchemaError::resolution(path, "body schema has no properties map"))?;

            for (field, value) in body_properties {
                if query_params.contains(field) {
                    return Err(SchemaError::resolution(
                        path,
                        format!("'{field}' is declared both as a query parameter and a body field"),
                    ));
                }
                properties.insert(field.clone(), property_from_schema(document, value, path)?);
            }

            for field in schema
                .get("required")
                .and_then(Value::as_array)
                .into_iter()
                .flatten()
                .filter_map(Value::as_str)
            {
                if !required.iter().any(|r| r == field) {
                    required.push(field.to_string());
                }
            }
            true
        }
        None => {
            if query_params.is_empty() {
                return Err(SchemaError::resolution(
                    path,
                    "operation declares neither a JSON body nor query parameters",
                ));
            }
            false
        }
    };

    let parameters = Parameters::new(properties, required);
    parameters
        .validate()
        .map_err(|e| SchemaError::resolution(path, e.to_string()))?;

    let description = operation
        .description
        .as_deref()
        .or(operation.summary.as_deref())
        .filter(|d| !d.trim().is_empty())
        .map_or_else(|| format!("POST {path}"), str::to_string);

    let tool = Tool::builder()
        .function(Function {
            name: name.to_string(),
            description,
            parameters,
        })
        .build();

    Ok(ExtractedOperation {
        tool,
        path: path.to_string(),
        query_params,
        has_body,
    })
}

fn body_schema<'a>(
    document: &'a OpenApiDocument,
    path: &str,
    body: &'a RequestBody,
) -> Result<&'a Value, SchemaError> {
    let media = body.content.get(JSON_CONTENT_TYPE).ok_or_else(|| {
        SchemaError::resolution(path, format!("request body has no {JSON_CONTENT_TYPE} content"))
    })?;
    let schema = media
        .schema
        .as_ref()
        .ok_or_else(|| SchemaError::resolution(path, "request body content has no schema"))?;
    document.resolve(schema, path)
}

fn property_from_schema(
    document: &OpenApiDocument,
    schema: &Value,
    path: &str,
) -> Result<Property, SchemaError> {
    let inlined = inline_schema(document, schema, path, 0)?;
    serde_json::from_value(inlined)
        .map_err(|e| SchemaError::resolution(path, format!("unusable property schema: {e}")))
}

/// Rewrites `schema` into a self-contained form the model can read.
///
/// References are replaced by their targets and composed schemas collapse to
/// their first non-null variant. Only `type`, `description`, `enum`,
/// `items`, `properties` and `required` survive.
fn inline_schema(
    document: &OpenApiDocument,
    schema: &Value,
    path: &str,
    depth: usize,
) -> Result<Value, SchemaError> {
    if depth > MAX_SCHEMA_DEPTH {
        warn!("Schema under POST {path} nests deeper than {MAX_SCHEMA_DEPTH} levels; cutting it off");
        return Ok(json!({"type": "object"}));
    }
    let resolved = document.resolve(schema, path)?;

    let mut out = match first_variant(resolved) {
        Some(variant) => match inline_schema(document, variant, path, depth + 1)? {
            Value::Object(map) => map,
            _ => Map::new(),
        },
        None => Map::new(),
    };

    // OpenAPI 3.1 spells nullable types as `["number", "null"]`.
    let schema_type = match resolved.get("type") {
        Some(Value::Array(types)) => types.iter().find(|t| t.as_str() != Some("null")),
        other => other,
    };
    if let Some(schema_type) = schema_type {
        out.insert("type".to_string(), schema_type.clone());
    }

    let description = [schema, resolved]
        .into_iter()
        .find_map(|s| s.get("description").and_then(Value::as_str))
        .or_else(|| {
            [schema, resolved]
                .into_iter()
                .find_map(|s| s.get("title").and_then(Value::as_str))
        });
    if let Some(description) = description {
        out.insert("description".to_string(), description.into());
    }

    if let Some(values) = resolved.get("enum").and_then(Value::as_array) {
        out.insert("enum".to_string(), Value::Array(values.clone()));
    }

    if let Some(items) = resolved.get("items") {
        out.insert(
            "items".to_string(),
            inline_schema(document, items, path, depth + 1)?,
        );
    }

    if let Some(fields) = resolved.get("properties").and_then(Value::as_object) {
        let mut inlined = Map::new();
        for (name, field) in fields {
            inlined.insert(name.clone(), inline_schema(document, field, path, depth + 1)?);
        }
        out.insert("properties".to_string(), Value::Object(inlined));
        if let Some(required) = resolved.get("required") {
            out.insert("required".to_string(), required.clone());
        }
    }

    if !out.contains_key("type") {
        let inferred = if out.contains_key("properties") {
            "object"
        } else if out.contains_key("items") {
            "array"
        } else {
            "string"
        };
        out.insert("type".to_string(), inferred.into());
    }
    // Gemini rejects array declarations without an element schema.
    if out.get("type").and_then(Value::as_str) == Some("array") && !out.contains_key("items") {
        out.insert("items".to_string(), json!({"type": "string"}));
    }

    Ok(Value::Object(out))
}

fn first_variant(schema: &Value) -> Option<&Value> {
    COMPOSITION_KEYWORDS
        .iter()
        .filter_map(|keyword| schema.get(*keyword).and_then(Value::as_array))
        .flatten()
        .find(|variant| variant.get("type").and_then(Value::as_str) != Some("null"))
}
