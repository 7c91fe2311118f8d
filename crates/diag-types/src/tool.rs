use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON-schema-compatible parameter type for a tool argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterType {
    /// A string value.
    String,
    /// A whole number.
    Integer,
    /// A floating point number.
    Number,
    /// A boolean value.
    Boolean,
    /// An array of values.
    Array,
    /// A nested object.
    Object,
}

impl std::fmt::Display for ParameterType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::String => write!(f, "string"),
            Self::Integer => write!(f, "integer"),
            Self::Number => write!(f, "number"),
            Self::Boolean => write!(f, "boolean"),
            Self::Array => write!(f, "array"),
            Self::Object => write!(f, "object"),
        }
    }
}

/// A single parameter accepted by a tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolParameter {
    /// Parameter name.
    pub name: String,
    /// Parameter type.
    #[serde(rename = "type")]
    pub param_type: ParameterType,
    /// Human-readable description, shown to the model.
    pub description: String,
    /// Whether the model must supply this parameter.
    pub required: bool,
    /// Default value used when the model omits an optional parameter.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    /// Allowed literal values, if the parameter is an enum.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,
}

impl ToolParameter {
    /// Builds a required parameter with no default or enum constraint.
    #[must_use]
    pub fn required(name: impl Into<String>, param_type: ParameterType, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            param_type,
            description: description.into(),
            required: true,
            default: None,
            enum_values: None,
        }
    }

    /// Builds an optional parameter with no default or enum constraint.
    #[must_use]
    pub fn optional(name: impl Into<String>, param_type: ParameterType, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            param_type,
            description: description.into(),
            required: false,
            default: None,
            enum_values: None,
        }
    }

    /// Restricts this parameter to a fixed set of string values.
    #[must_use]
    pub fn with_enum_values(mut self, values: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.enum_values = Some(values.into_iter().map(Into::into).collect());
        self
    }

    /// Attaches a default value, used when the model omits this parameter.
    #[must_use]
    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }
}

/// The self-describing schema for one tool, as presented to the model.
///
/// `description` is expected to embed decision-boundary clauses (CALL WHEN
/// / DO NOT CALL IF / OUTPUT MEANING) so weak models can decide when to
/// invoke the tool without external documentation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    /// The tool's unique name.
    pub name: String,
    /// Full description including decision-boundary guidance.
    pub description: String,
    /// The tool's parameters.
    pub parameters: Vec<ToolParameter>,
}

impl ToolDefinition {
    /// Converts this definition into the JSON-schema `{type: "object",
    /// properties: {...}, required: [...]}` shape that provider adapters
    /// expect for `function.parameters`.
    #[must_use]
    pub fn parameters_json_schema(&self) -> Value {
        let mut properties = serde_json::Map::new();
        let mut required = Vec::new();

        for param in &self.parameters {
            let mut schema = serde_json::json!({
                "type": param.param_type.to_string(),
                "description": param.description,
            });
            if let Some(values) = &param.enum_values {
                schema["enum"] = serde_json::json!(values);
            }
            if let Some(default) = &param.default {
                schema["default"] = default.clone();
            }
            properties.insert(param.name.clone(), schema);
            if param.required {
                required.push(param.name.clone());
            }
        }

        serde_json::json!({
            "type": "object",
            "properties": Value::Object(properties),
            "required": required,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_params_appear_in_schema_required_array() {
        let def = ToolDefinition {
            name: "ping_gateway".to_string(),
            description: "CALL WHEN the adapter is connected.".to_string(),
            parameters: vec![
                ToolParameter::required("host", ParameterType::String, "target host"),
                ToolParameter::optional("timeoutMs", ParameterType::Integer, "timeout override"),
            ],
        };
        let schema = def.parameters_json_schema();
        assert_eq!(schema["required"], serde_json::json!(["host"]));
        assert!(schema["properties"]["timeoutMs"].is_object());
    }

    #[test]
    fn enum_values_rendered_in_schema() {
        let param = ToolParameter::optional("granularity", ParameterType::String, "bucket size")
            .with_enum_values(["daily", "weekly"]);
        let def = ToolDefinition {
            name: "get_trend".to_string(),
            description: "desc".to_string(),
            parameters: vec![param],
        };
        let schema = def.parameters_json_schema();
        assert_eq!(
            schema["properties"]["granularity"]["enum"],
            serde_json::json!(["daily", "weekly"])
        );
    }
}
