use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use strum_macros::Display;

use crate::errors::ShieldError;

/// JSON type accepted for a tool parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ParamType {
    String,
    Number,
    Boolean,
    StringArray,
}

impl ParamType {
    /// Whether a supplied argument has this type
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            ParamType::String => value.is_string(),
            ParamType::Number => value.is_number(),
            ParamType::Boolean => value.is_boolean(),
            ParamType::StringArray => value
                .as_array()
                .is_some_and(|items| items.iter().all(Value::is_string)),
        }
    }

    fn schema(&self) -> Value {
        match self {
            ParamType::String => json!({"type": "string"}),
            ParamType::Number => json!({"type": "number"}),
            ParamType::Boolean => json!({"type": "boolean"}),
            ParamType::StringArray => json!({"type": "array", "items": {"type": "string"}}),
        }
    }
}

/// One named parameter of a tool declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: ParamType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub required: bool,
}

impl ParameterSpec {
    pub fn required<S: Into<String>>(name: S, param_type: ParamType) -> Self {
        Self {
            name: name.into(),
            param_type,
            description: None,
            required: true,
        }
    }

    pub fn optional<S: Into<String>>(name: S, param_type: ParamType) -> Self {
        Self {
            name: name.into(),
            param_type,
            description: None,
            required: false,
        }
    }

    pub fn with_description<S: Into<String>>(mut self, description: S) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A tool the model may invoke, as advertised to the completion service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDeclaration {
    /// The name of the tool
    pub name: String,
    /// A description of what the tool does
    pub description: String,
    /// Parameters that the tool accepts
    pub parameters: Vec<ParameterSpec>,
}

impl ToolDeclaration {
    /// Create a new declaration with no parameters
    pub fn new<N, D>(name: N, description: D) -> Self
    where
        N: Into<String>,
        D: Into<String>,
    {
        ToolDeclaration {
            name: name.into(),
            description: description.into(),
            parameters: Vec::new(),
        }
    }

    pub fn with_parameter(mut self, parameter: ParameterSpec) -> Self {
        self.parameters.push(parameter);
        self
    }

    pub fn parameter(&self, name: &str) -> Option<&ParameterSpec> {
        self.parameters.iter().find(|p| p.name == name)
    }

    pub fn required_parameters(&self) -> impl Iterator<Item = &ParameterSpec> {
        self.parameters.iter().filter(|p| p.required)
    }

    /// The parameters rendered as a JSON schema object, which is what providers send
    pub fn input_schema(&self) -> Value {
        let mut properties = Map::new();
        for parameter in &self.parameters {
            let mut schema = parameter.param_type.schema();
            if let (Some(description), Some(object)) =
                (&parameter.description, schema.as_object_mut())
            {
                object.insert("description".to_string(), json!(description));
            }
            properties.insert(parameter.name.clone(), schema);
        }
        let required: Vec<&str> = self
            .required_parameters()
            .map(|p| p.name.as_str())
            .collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}

/// A tool invocation requested by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// The name of the tool to execute
    pub name: String,
    /// The arguments for the execution
    pub args: Map<String, Value>,
}

impl ToolCall {
    /// Create a new call. Anything other than a JSON object is treated as no arguments.
    pub fn new<S: Into<String>>(name: S, args: Value) -> Self {
        let args = match args {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            name: name.into(),
            args,
        }
    }

    /// A string argument, if present and a string
    pub fn arg_str(&self, key: &str) -> Option<&str> {
        self.args.get(key).and_then(Value::as_str)
    }
}

/// Why a tool invocation did not succeed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    ValidationError,
    ToolExecutionError,
}

/// Structured outcome of a tool invocation, fed back to the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub ok: bool,
    pub payload: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorKind>,
}

impl ToolResult {
    /// A successful result carrying a structured payload
    pub fn success(payload: Value) -> Self {
        Self {
            ok: true,
            payload,
            error: None,
        }
    }

    /// A successful result whose payload is a single line of text
    pub fn text<S: Into<String>>(text: S) -> Self {
        Self::success(json!({ "result": text.into() }))
    }

    pub fn failure<S: Into<String>>(kind: ErrorKind, message: S) -> Self {
        Self {
            ok: false,
            payload: json!({ "error": message.into() }),
            error: Some(kind),
        }
    }

    pub fn not_found(tool_name: &str) -> Self {
        Self::failure(ErrorKind::NotFound, format!("Tool not found: {}", tool_name))
    }

    /// Human readable rendering of the payload
    pub fn summary(&self) -> String {
        let field = if self.ok { "result" } else { "error" };
        match self.payload.get(field).and_then(Value::as_str) {
            Some(text) => text.to_string(),
            None => self.payload.to_string(),
        }
    }
}

impl From<ShieldError> for ToolResult {
    fn from(error: ShieldError) -> Self {
        let kind = error
            .tool_error_kind()
            .unwrap_or(ErrorKind::ToolExecutionError);
        ToolResult::failure(kind, error.to_string())
    }
}
