//! Declaration validation: referential integrity and resource consistency.

use crate::case::same_relation_name;
use crate::config::{Action, EndpointTemplate, FullConfig};
use crate::error::ConfigError;
use std::collections::{HashMap, HashSet};

pub fn validate(config: &FullConfig) -> Result<(), ConfigError> {
    let mut attributes_by_entity: HashMap<&str, HashSet<&str>> = HashMap::new();
    for e in &config.entities {
        if attributes_by_entity.contains_key(e.name.as_str()) {
            return Err(ConfigError::Duplicate {
                kind: "entity",
                name: e.name.clone(),
            });
        }
        let names: HashSet<&str> = e.attributes.iter().map(|a| a.name.as_str()).collect();
        if names.len() != e.attributes.len() {
            return Err(ConfigError::Duplicate {
                kind: "attribute",
                name: format!("{} (entity {})", first_duplicate(e.attributes.iter().map(|a| a.name.as_str())), e.name),
            });
        }
        if !names.contains(e.primary_key.as_str()) {
            return Err(ConfigError::UnknownAttribute {
                entity: e.name.clone(),
                attribute: e.primary_key.clone(),
            });
        }
        for col in e.validation.keys() {
            if !names.contains(col.as_str()) {
                return Err(ConfigError::UnknownAttribute {
                    entity: e.name.clone(),
                    attribute: col.clone(),
                });
            }
        }
        attributes_by_entity.insert(e.name.as_str(), names);
    }

    let mut names_by_from: HashMap<&str, Vec<&str>> = HashMap::new();
    for a in &config.associations {
        for (kind, id) in [("association source", &a.from), ("association target", &a.to)] {
            if !attributes_by_entity.contains_key(id.as_str()) {
                return Err(ConfigError::MissingReference { kind, id: id.clone() });
            }
        }
        if let Some(through) = &a.through {
            if !attributes_by_entity.contains_key(through.entity.as_str()) {
                return Err(ConfigError::MissingReference {
                    kind: "through entity",
                    id: through.entity.clone(),
                });
            }
        }
        let names = names_by_from.entry(a.from.as_str()).or_default();
        if names.iter().any(|n| same_relation_name(n, &a.name)) {
            return Err(ConfigError::Duplicate {
                kind: "association",
                name: format!("{}.{}", a.from, a.name),
            });
        }
        names.push(a.name.as_str());
    }

    let mut paths = HashSet::new();
    for r in &config.resources {
        let Some(attrs) = attributes_by_entity.get(r.entity.as_str()) else {
            return Err(ConfigError::MissingReference {
                kind: "resource entity",
                id: r.entity.clone(),
            });
        };
        if r.endpoints.is_empty() || r.endpoints.len() > 2 {
            return Err(ConfigError::Validation(format!(
                "resource '{}' needs a plural endpoint and at most one singular endpoint",
                r.entity
            )));
        }
        for path in &r.endpoints {
            if !path.starts_with('/') {
                return Err(ConfigError::Validation(format!("endpoint '{}' must start with '/'", path)));
            }
            if !paths.insert(path.as_str()) {
                return Err(ConfigError::Duplicate {
                    kind: "endpoint",
                    name: path.clone(),
                });
            }
            for placeholder in EndpointTemplate::parse(path).attributes {
                check_attribute(&r.entity, attrs, &placeholder)?;
            }
        }
        let listed = r
            .attributes
            .iter()
            .flatten()
            .chain(r.search.attributes.iter().flatten())
            .chain(r.hidden_attributes.iter());
        for name in listed {
            check_attribute(&r.entity, attrs, name)?;
        }
        if let Some(param) = &r.search.param {
            if param.is_empty() {
                return Err(ConfigError::Validation(format!("resource '{}' has an empty search param", r.entity)));
            }
        }
        for action in r.actions.iter().flatten() {
            if Action::parse(action).is_none() {
                return Err(ConfigError::Validation(format!("unknown action '{}'", action)));
            }
        }
    }

    Ok(())
}

fn check_attribute(entity: &str, attrs: &HashSet<&str>, name: &str) -> Result<(), ConfigError> {
    if attrs.contains(name) {
        Ok(())
    } else {
        Err(ConfigError::UnknownAttribute {
            entity: entity.to_string(),
            attribute: name.to_string(),
        })
    }
}

fn first_duplicate<'a>(names: impl Iterator<Item = &'a str>) -> &'a str {
    let mut seen = HashSet::new();
    for n in names {
        if !seen.insert(n) {
            return n;
        }
    }
    ""
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config(value: serde_json::Value) -> FullConfig {
        serde_json::from_value(value).unwrap()
    }

    fn base() -> serde_json::Value {
        json!({
            "entities": [
                { "name": "student", "attributes": [{ "name": "id", "type": "integer" }, { "name": "name" }] },
                { "name": "course", "attributes": [{ "name": "id", "type": "integer" }, { "name": "name" }] }
            ],
            "associations": [
                { "from": "student", "name": "courses", "to": "course", "cardinality": "many" }
            ],
            "resources": [
                { "entity": "student", "endpoints": ["/students", "/students/:id"] }
            ]
        })
    }

    #[test]
    fn accepts_consistent_declarations() {
        assert!(validate(&config(base())).is_ok());
    }

    #[test]
    fn rejects_duplicate_association_names_after_normalisation() {
        let mut v = base();
        v["associations"].as_array_mut().unwrap().push(json!({
            "from": "student", "name": "Course", "to": "course", "cardinality": "one"
        }));
        assert!(matches!(validate(&config(v)), Err(ConfigError::Duplicate { kind: "association", .. })));
    }

    #[test]
    fn rejects_unknown_association_target() {
        let mut v = base();
        v["associations"][0]["to"] = json!("advisor");
        assert!(matches!(validate(&config(v)), Err(ConfigError::MissingReference { .. })));
    }

    #[test]
    fn rejects_placeholder_without_attribute() {
        let mut v = base();
        v["resources"][0]["endpoints"] = json!(["/students", "/students/:slug"]);
        assert!(matches!(validate(&config(v)), Err(ConfigError::UnknownAttribute { .. })));
    }

    #[test]
    fn rejects_unknown_search_attribute() {
        let mut v = base();
        v["resources"][0]["search"] = json!({ "attributes": ["email"] });
        assert!(matches!(validate(&config(v)), Err(ConfigError::UnknownAttribute { .. })));
    }
}
