//! Tool declaration, call and invocation result types for LLM interactions.

use std::collections::BTreeMap;
use std::fmt;

use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use typed_builder::TypedBuilder;
use uuid::Uuid;

/// Describes a single property in a function parameter schema.
///
/// Arrays carry their element schema in `items` and nested objects their
/// field schemas in `properties`. Both are self-contained JSON Schema with no
/// references left in them.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct Property {
    /// The JSON type (e.g., "string", "number", "object").
    #[serde(rename = "type")]
    pub prop_type: String,
    /// Human-readable description of this property.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Element schema of an array.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Value>,
    /// The only values the property may take.
    #[serde(default, rename = "enum", skip_serializing_if = "Vec::is_empty")]
    pub enum_values: Vec<Value>,
    /// Field schemas of a nested object.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<Map<String, Value>>,
    /// Required fields of a nested object.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
}

impl Property {
    /// Creates a property of an arbitrary JSON type.
    #[must_use]
    pub fn new(prop_type: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            prop_type: prop_type.into(),
            description: description.into(),
            items: None,
            enum_values: Vec::new(),
            properties: None,
            required: Vec::new(),
        }
    }

    /// Creates an array property whose elements follow `items`.
    #[must_use]
    pub fn array(items: Value, description: impl Into<String>) -> Self {
        Self {
            items: Some(items),
            ..Self::new("array", description)
        }
    }

    /// Restricts the property to the given values.
    #[must_use]
    pub fn with_enum(mut self, values: Vec<Value>) -> Self {
        self.enum_values = values;
        self
    }

    /// Creates a string property.
    #[must_use]
    pub fn string(description: impl Into<String>) -> Self {
        Self::new("string", description)
    }

    /// Creates a number property.
    #[must_use]
    pub fn number(description: impl Into<String>) -> Self {
        Self::new("number", description)
    }

    /// Creates a boolean property.
    #[must_use]
    pub fn boolean(description: impl Into<String>) -> Self {
        Self::new("boolean", description)
    }
}

/// Defines the parameter schema for a function using JSON Schema conventions.
///
/// Every name in `required` must also be a key of `properties`; see
/// [`Parameters::validate`].
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct Parameters {
    /// The JSON type, always "object".
    #[serde(rename = "type")]
    pub param_type: String,
    /// Map of parameter names to their property definitions.
    pub properties: BTreeMap<String, Property>,
    /// List of required parameter names.
    #[serde(default)]
    pub required: Vec<String>,
}

impl Parameters {
    /// Creates a new `Parameters` with type "object".
    #[must_use]
    pub fn new(properties: BTreeMap<String, Property>, required: Vec<String>) -> Self {
        Self {
            param_type: "object".to_string(),
            properties,
            required,
        }
    }

    /// Creates an empty object schema (a tool that takes no arguments).
    #[must_use]
    pub fn empty() -> Self {
        Self::new(BTreeMap::new(), Vec::new())
    }

    /// Returns whether `name` is a required parameter.
    #[must_use]
    pub fn is_required(&self, name: &str) -> bool {
        self.required.iter().any(|r| r == name)
    }

    /// Required names that have no matching entry in `properties`.
    #[must_use]
    pub fn missing_required(&self) -> Vec<&str> {
        self.required
            .iter()
            .filter(|name| !self.properties.contains_key(name.as_str()))
            .map(String::as_str)
            .collect()
    }

    /// Checks that the required list is a subset of the declared properties.
    ///
    /// # Errors
    ///
    /// Returns an error listing every required name without a property.
    pub fn validate(&self) -> anyhow::Result<()> {
        let missing = self.missing_required();
        if !missing.is_empty() {
            anyhow::bail!(
                "required fields not declared in properties: {}",
                missing.join(", ")
            );
        }
        Ok(())
    }

    /// Fallible conversion to `serde_json::Value` for contexts that can propagate errors.
    ///
    /// # Errors
    ///
    /// Returns a `serde_json::Error` if serialization fails.
    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}

impl From<Parameters> for Value {
    fn from(params: Parameters) -> Self {
        match serde_json::to_value(params) {
            Ok(value) => value,
            Err(e) => {
                warn!("Parameters serialization unexpectedly failed: {e}");
                Self::Null
            }
        }
    }
}

/// Describes a function that can be called by an LLM.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct Function {
    /// The name of the function. Unique within a tool set.
    pub name: String,
    /// Human-readable description of what the function does.
    pub description: String,
    /// JSON Schema definition of the function's parameters.
    pub parameters: Parameters,
}

/// A tool declaration handed to the LLM, wrapping a function.
///
/// This is the tool descriptor derived from an API operation: a unique name,
/// a description, and the parameter schema the model fills in.
#[derive(Debug, Clone, Serialize, Deserialize, TypedBuilder, Eq, PartialEq)]
pub struct Tool {
    /// The type of tool (defaults to "function").
    #[serde(rename = "type")]
    #[builder(default = "function".to_string())]
    pub r#type: String,
    /// The function definition.
    pub function: Function,
}

impl Tool {
    /// The tool's unique name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.function.name
    }
}

/// A model-issued request to run a tool.
///
/// The `id` is issued by the provider and echoed back on the matching tool
/// result so the two turns can be correlated when history is replayed.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ToolCall {
    /// Unique identifier for this tool call.
    pub id: String,
    /// The name of the tool being invoked.
    pub name: String,
    /// Arguments as a JSON object.
    pub arguments: Map<String, Value>,
}

impl ToolCall {
    /// Creates a new tool call with a generated ID.
    pub fn new(name: impl Into<String>, arguments: Map<String, Value>) -> Self {
        Self {
            id: format!("call_{}", Uuid::new_v4().simple()),
            name: name.into(),
            arguments,
        }
    }

    /// Replaces the generated ID with a provider-issued one.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Returns the arguments serialized as a compact JSON string.
    #[must_use]
    pub fn arguments_json(&self) -> String {
        Value::Object(self.arguments.clone()).to_string()
    }
}

/// What came back from running a tool.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum ToolOutcome {
    /// The call succeeded; carries the parsed JSON response body.
    Success(Value),
    /// The call failed; carries a human-readable description for the model.
    Failure(String),
}

/// The result of one tool invocation.
///
/// Failures are data, not errors: the orchestrator relays them to the model
/// as a tool result instead of aborting the session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolInvocationResult {
    /// Name of the tool that was invoked.
    pub tool_name: String,
    /// Payload or error description.
    pub outcome: ToolOutcome,
}

impl ToolInvocationResult {
    /// Creates a successful result.
    pub fn success(tool_name: impl Into<String>, payload: Value) -> Self {
        Self {
            tool_name: tool_name.into(),
            outcome: ToolOutcome::Success(payload),
        }
    }

    /// Creates a failed result.
    pub fn failure(tool_name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
            outcome: ToolOutcome::Failure(error.into()),
        }
    }

    /// Whether the invocation succeeded.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.outcome, ToolOutcome::Success(_))
    }

    /// The successful payload, if any.
    #[must_use]
    pub const fn payload(&self) -> Option<&Value> {
        match &self.outcome {
            ToolOutcome::Success(value) => Some(value),
            ToolOutcome::Failure(_) => None,
        }
    }

    /// The failure description, if any.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            ToolOutcome::Success(_) => None,
            ToolOutcome::Failure(error) => Some(error),
        }
    }

    /// Renders the result as the text content sent back to the model.
    #[must_use]
    pub fn content(&self) -> String {
        match &self.outcome {
            ToolOutcome::Success(value) => value.to_string(),
            ToolOutcome::Failure(error) => format!("Tool execution failed: {error}"),
        }
    }
}

impl fmt::Display for ToolInvocationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.tool_name, self.content())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::expect_used)]

    use super::*;
    use serde_json::json;

    fn multiply_parameters() -> Parameters {
        let mut properties = BTreeMap::new();
        properties.insert("a".to_string(), Property::number("A"));
        properties.insert("b".to_string(), Property::number("B"));
        Parameters::new(properties, vec!["a".into(), "b".into()])
    }

    #[test]
    fn test_property_serialization_skips_empty_description() {
        let prop = Property::number("");
        let json = serde_json::to_value(&prop).expect("Failed to serialize");
        assert_eq!(json, json!({"type": "number"}));

        let deserialized: Property = serde_json::from_value(json).expect("Failed to deserialize");
        assert_eq!(prop, deserialized);
    }

    #[test]
    fn test_array_property_serializes_items() {
        let mut properties = BTreeMap::new();
        properties.insert(
            "values".to_string(),
            Property::array(json!({"type": "number"}), "Values"),
        );
        properties.insert(
            "mode".to_string(),
            Property::string("").with_enum(vec![json!("fast"), json!("exact")]),
        );
        let value: Value = Parameters::new(properties, vec!["values".into()]).into();

        assert_eq!(
            value["properties"],
            json!({
                "mode": {"type": "string", "enum": ["fast", "exact"]},
                "values": {"type": "array", "description": "Values", "items": {"type": "number"}}
            })
        );
    }

    #[test]
    fn test_parameters_serialize_as_json_schema() {
        let value: Value = multiply_parameters().into();
        assert_eq!(
            value,
            json!({
                "type": "object",
                "properties": {
                    "a": {"type": "number", "description": "A"},
                    "b": {"type": "number", "description": "B"}
                },
                "required": ["a", "b"]
            })
        );
    }

    #[test]
    fn test_parameters_validate_subset() {
        assert!(multiply_parameters().validate().is_ok());

        let mut params = multiply_parameters();
        params.required.push("c".into());
        let err = params.validate().unwrap_err();
        assert!(err.to_string().contains('c'));
        assert_eq!(params.missing_required(), vec!["c"]);
    }

    #[test]
    fn test_parameters_is_required() {
        let params = multiply_parameters();
        assert!(params.is_required("a"));
        assert!(!params.is_required("result"));
    }

    #[test]
    fn test_tool_builder_defaults_to_function() {
        let tool = Tool::builder()
            .function(Function {
                name: "multiply".to_string(),
                description: "Multiply".to_string(),
                parameters: Parameters::empty(),
            })
            .build();

        assert_eq!(tool.r#type, "function");
        assert_eq!(tool.name(), "multiply");
    }

    #[test]
    fn test_tool_call_ids_are_unique() {
        let first = ToolCall::new("multiply", Map::new());
        let second = ToolCall::new("multiply", Map::new());
        assert_ne!(first.id, second.id);
        assert!(first.id.starts_with("call_"));

        let fixed = first.with_id("call_abc");
        assert_eq!(fixed.id, "call_abc");
    }

    #[test]
    fn test_tool_call_arguments_json() {
        let mut args = Map::new();
        args.insert("a".into(), json!(3));
        let call = ToolCall::new("multiply", args);
        assert_eq!(call.arguments_json(), r#"{"a":3}"#);
    }

    #[test]
    fn test_invocation_result_accessors() {
        let ok = ToolInvocationResult::success("multiply", json!({"result": 12}));
        assert!(ok.is_success());
        assert_eq!(ok.payload(), Some(&json!({"result": 12})));
        assert_eq!(ok.error(), None);
        assert_eq!(ok.content(), r#"{"result":12}"#);

        let failed = ToolInvocationResult::failure("multiply", "connection refused");
        assert!(!failed.is_success());
        assert_eq!(failed.payload(), None);
        assert_eq!(failed.error(), Some("connection refused"));
        assert_eq!(failed.content(), "Tool execution failed: connection refused");
    }

    #[test]
    fn test_tool_outcome_serialization() {
        let failed = ToolInvocationResult::failure("multiply", "boom");
        let json = serde_json::to_value(&failed).expect("Failed to serialize");
        assert_eq!(json["outcome"]["status"], "failure");
        assert_eq!(json["outcome"]["value"], "boom");
    }
}
