//! Attribute validation from declared rules, shared by every store.

use crate::config::{AttributeType, EntityModel, ValidationRule};
use crate::error::{DataError, FieldError};
use crate::store::Instance;
use regex::Regex;
use serde_json::Value;

/// Check every declared rule and non-nullable attribute; all failures are reported together.
pub fn validate_instance(entity: &EntityModel, instance: &Instance) -> Result<(), DataError> {
    let mut errors = Vec::new();
    for attr in &entity.attributes {
        let val = instance.get(&attr.name).filter(|v| !v.is_null());
        let rule = entity.validation.get(&attr.name);
        let required = rule.and_then(|r| r.required) == Some(true) || (!attr.nullable && !attr.generated);
        match val {
            None if required => errors.push(FieldError::new(&attr.name, "is required")),
            None => {}
            Some(v) => {
                if let Err(e) = validate_type(&attr.name, v, attr.type_) {
                    errors.push(e);
                    continue;
                }
                if let Some(rule) = rule {
                    if let Err(e) = validate_field(&attr.name, v, rule) {
                        errors.push(e);
                    }
                }
            }
        }
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(DataError::Validation(errors))
    }
}

fn validate_type(col: &str, v: &Value, ty: AttributeType) -> Result<(), FieldError> {
    let ok = match ty {
        AttributeType::Text => v.is_string() || v.is_number() || v.is_boolean(),
        AttributeType::Integer => v.is_i64() || v.is_u64(),
        AttributeType::Float => v.is_number(),
        AttributeType::Boolean => v.is_boolean(),
        AttributeType::Uuid => v.as_str().is_some_and(|s| uuid::Uuid::parse_str(s).is_ok()),
        AttributeType::Timestamp => v
            .as_str()
            .is_some_and(|s| chrono::DateTime::parse_from_rfc3339(s).is_ok()),
        AttributeType::Json => true,
    };
    if ok {
        Ok(())
    } else {
        Err(FieldError::new(col, format!("must be of type {:?}", ty).to_lowercase()))
    }
}

fn validate_field(col: &str, v: &Value, rule: &ValidationRule) -> Result<(), FieldError> {
    if let Some(format) = &rule.format {
        validate_format(col, v, format)?;
    }
    if let Some(max) = rule.max_length {
        if let Some(s) = v.as_str() {
            if s.chars().count() > max as usize {
                return Err(FieldError::new(col, format!("must be at most {} characters", max)));
            }
        }
    }
    if let Some(min) = rule.min_length {
        if let Some(s) = v.as_str() {
            if s.chars().count() < min as usize {
                return Err(FieldError::new(col, format!("must be at least {} characters", min)));
            }
        }
    }
    if let Some(ref pattern) = rule.pattern {
        let re = Regex::new(pattern).map_err(|_| FieldError::new(col, "has an invalid pattern rule"))?;
        if let Some(s) = v.as_str() {
            if !re.is_match(s) {
                return Err(FieldError::new(col, "does not match required pattern"));
            }
        }
    }
    if let Some(ref allowed) = rule.allowed {
        if !allowed.iter().any(|a| value_eq(v, a)) {
            return Err(FieldError::new(
                col,
                format!("must be one of: {:?}", allowed.iter().take(5).collect::<Vec<_>>()),
            ));
        }
    }
    if let Some(min) = rule.minimum {
        if let Some(n) = v.as_f64() {
            if n < min {
                return Err(FieldError::new(col, format!("must be at least {}", min)));
            }
        }
    }
    if let Some(max) = rule.maximum {
        if let Some(n) = v.as_f64() {
            if n > max {
                return Err(FieldError::new(col, format!("must be at most {}", max)));
            }
        }
    }
    Ok(())
}

fn value_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::String(s), Value::String(t)) => s == t,
        (Value::Number(n), Value::Number(m)) => n.as_f64() == m.as_f64(),
        _ => a == b,
    }
}

fn validate_format(col: &str, v: &Value, format: &str) -> Result<(), FieldError> {
    let Some(s) = v.as_str() else { return Ok(()) };
    match format.to_lowercase().as_str() {
        "email" => {
            let at = s.find('@');
            let valid = s.len() >= 3 && at.is_some_and(|i| i > 0 && i < s.len() - 1) && !s.contains(char::is_whitespace);
            if !valid {
                return Err(FieldError::new(col, "must be a valid email"));
            }
        }
        "uuid" => {
            if uuid::Uuid::parse_str(s).is_err() {
                return Err(FieldError::new(col, "must be a valid UUID"));
            }
        }
        "date-time" => {
            if chrono::DateTime::parse_from_rfc3339(s).is_err() {
                return Err(FieldError::new(col, "must be an RFC 3339 timestamp"));
            }
        }
        _ => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AttributeInfo;
    use serde_json::json;
    use std::collections::HashMap;

    fn user_entity() -> EntityModel {
        let attr = |name: &str, type_, nullable, generated| AttributeInfo {
            name: name.into(),
            type_,
            nullable,
            generated,
        };
        let mut validation = HashMap::new();
        validation.insert(
            "email".to_string(),
            ValidationRule {
                format: Some("email".into()),
                ..Default::default()
            },
        );
        validation.insert(
            "username".to_string(),
            ValidationRule {
                max_length: Some(8),
                ..Default::default()
            },
        );
        EntityModel {
            name: "user".into(),
            schema_name: None,
            table_name: "users".into(),
            primary_key: "id".into(),
            attributes: vec![
                attr("id", AttributeType::Integer, false, true),
                attr("username", AttributeType::Text, false, false),
                attr("email", AttributeType::Text, true, false),
                attr("age", AttributeType::Integer, true, false),
            ],
            validation,
        }
    }

    fn instance(v: Value) -> Instance {
        Instance::unsaved(v.as_object().unwrap().clone())
    }

    #[test]
    fn valid_instance_passes_without_generated_key() {
        let e = user_entity();
        assert!(validate_instance(&e, &instance(json!({ "username": "james", "email": "james@gmail.com" }))).is_ok());
    }

    #[test]
    fn collects_every_failure() {
        let e = user_entity();
        let err = validate_instance(&e, &instance(json!({ "email": "not-an-email", "age": "old" }))).unwrap_err();
        match err {
            DataError::Validation(fields) => {
                let names: Vec<_> = fields.iter().map(|f| f.field.as_str()).collect();
                assert_eq!(names, vec!["username", "email", "age"]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn length_rules_count_characters() {
        let e = user_entity();
        assert!(validate_instance(&e, &instance(json!({ "username": "ééééééé" }))).is_ok());
        assert!(validate_instance(&e, &instance(json!({ "username": "toolongname" }))).is_err());
    }
}
