use crate::config::{AttributeType, EntityModel};
use serde_json::Value;

/// Typed value for a path or query string, using the attribute's declared type. Strings
/// that do not parse as that type are kept as strings.
pub fn coerce_param(entity: &EntityModel, attribute: &str, s: &str) -> Value {
    parse_param(entity, attribute, s).unwrap_or_else(|| Value::String(s.to_string()))
}

/// Like [`coerce_param`], but `None` when the string is not a valid value of the declared type.
/// Undeclared attributes and text-like types accept any string.
pub fn parse_param(entity: &EntityModel, attribute: &str, s: &str) -> Option<Value> {
    let Some(info) = entity.attribute(attribute) else {
        return Some(Value::String(s.to_string()));
    };
    match info.type_ {
        AttributeType::Integer => s.parse::<i64>().ok().map(|n| Value::Number(n.into())),
        AttributeType::Float => s
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number),
        AttributeType::Boolean if s.eq_ignore_ascii_case("true") => Some(Value::Bool(true)),
        AttributeType::Boolean if s.eq_ignore_ascii_case("false") => Some(Value::Bool(false)),
        AttributeType::Boolean => None,
        AttributeType::Uuid => uuid::Uuid::parse_str(s).ok().map(|u| Value::String(u.to_string())),
        AttributeType::Text | AttributeType::Timestamp | AttributeType::Json => Some(Value::String(s.to_string())),
    }
}
