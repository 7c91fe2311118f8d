//! Argument validation and best-effort type coercion against a tool's
//! declared parameter schema.

use diag_types::{ParameterType, ToolDefinition};
use serde_json::{Map, Value};

/// Checks required parameters are present and coerces unambiguous string
/// encodings (`"42"` -> integer, `"true"` -> boolean) to their declared
/// type. Unknown keys are left untouched; the handler ignores them.
///
/// # Errors
///
/// Returns a human-readable message naming the first missing required
/// parameter or type mismatch found.
pub fn validate_and_coerce(definition: &ToolDefinition, arguments: &mut Map<String, Value>) -> Result<(), String> {
    for param in &definition.parameters {
        let Some(value) = arguments.get(&param.name).cloned() else {
            if param.required {
                return Err(format!("missing required parameter '{}'", param.name));
            }
            if let Some(default) = &param.default {
                arguments.insert(param.name.clone(), default.clone());
            }
            continue;
        };

        let coerced = coerce(&value, param.param_type).ok_or_else(|| {
            format!("parameter '{}' expects {} but got {value}", param.name, param.param_type)
        })?;
        arguments.insert(param.name.clone(), coerced);
    }
    Ok(())
}

fn coerce(value: &Value, target: ParameterType) -> Option<Value> {
    match (target, value) {
        (ParameterType::String, Value::String(_)) => Some(value.clone()),
        (ParameterType::Integer, Value::Number(n)) if n.is_i64() || n.is_u64() => Some(value.clone()),
        (ParameterType::Integer, Value::String(s)) => s.parse::<i64>().ok().map(Value::from),
        (ParameterType::Number, Value::Number(_)) => Some(value.clone()),
        (ParameterType::Number, Value::String(s)) => s.parse::<f64>().ok().map(Value::from),
        (ParameterType::Boolean, Value::Bool(_)) => Some(value.clone()),
        (ParameterType::Boolean, Value::String(s)) => match s.as_str() {
            "true" => Some(Value::Bool(true)),
            "false" => Some(Value::Bool(false)),
            _ => None,
        },
        (ParameterType::Array, Value::Array(_)) => Some(value.clone()),
        (ParameterType::Object, Value::Object(_)) => Some(value.clone()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use diag_types::ToolParameter;

    fn def_with(params: Vec<ToolParameter>) -> ToolDefinition {
        ToolDefinition {
            name: "t".to_string(),
            description: "d".to_string(),
            parameters: params,
        }
    }

    #[test]
    fn missing_required_parameter_errors() {
        let def = def_with(vec![ToolParameter::required("processName", ParameterType::String, "x")]);
        let mut args = Map::new();
        assert!(validate_and_coerce(&def, &mut args).is_err());
    }

    #[test]
    fn string_bool_literal_coerces() {
        let def = def_with(vec![ToolParameter::optional("dryRun", ParameterType::Boolean, "x")]);
        let mut args = Map::new();
        args.insert("dryRun".to_string(), Value::String("true".to_string()));
        validate_and_coerce(&def, &mut args).unwrap();
        assert_eq!(args.get("dryRun"), Some(&Value::Bool(true)));
    }

    #[test]
    fn string_integer_coerces() {
        let def = def_with(vec![ToolParameter::optional("maxAgeDays", ParameterType::Integer, "x")]);
        let mut args = Map::new();
        args.insert("maxAgeDays".to_string(), Value::String("14".to_string()));
        validate_and_coerce(&def, &mut args).unwrap();
        assert_eq!(args.get("maxAgeDays"), Some(&Value::from(14)));
    }

    #[test]
    fn missing_optional_uses_default() {
        let def = def_with(vec![
            ToolParameter::optional("maxAgeDays", ParameterType::Integer, "x").with_default(Value::from(7)),
        ]);
        let mut args = Map::new();
        validate_and_coerce(&def, &mut args).unwrap();
        assert_eq!(args.get("maxAgeDays"), Some(&Value::from(7)));
    }

    #[test]
    fn unknown_keys_pass_through_untouched() {
        let def = def_with(vec![]);
        let mut args = Map::new();
        args.insert("mystery".to_string(), Value::from("whatever"));
        validate_and_coerce(&def, &mut args).unwrap();
        assert_eq!(args.get("mystery"), Some(&Value::from("whatever")));
    }
}
