//! Raw declaration types matching the JSON model document (entities, associations, resources).

use crate::graph::Cardinality;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeType {
    #[default]
    Text,
    Integer,
    Float,
    Boolean,
    Uuid,
    Timestamp,
    Json,
}

impl AttributeType {
    /// PostgreSQL type name used for parameter casts. `None` means bind as-is.
    pub fn pg_cast(&self) -> Option<&'static str> {
        match self {
            AttributeType::Text => None,
            AttributeType::Integer => Some("bigint"),
            AttributeType::Float => Some("double precision"),
            AttributeType::Boolean => Some("boolean"),
            AttributeType::Uuid => Some("uuid"),
            AttributeType::Timestamp => Some("timestamptz"),
            AttributeType::Json => Some("jsonb"),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AttributeConfig {
    pub name: String,
    #[serde(rename = "type", default)]
    pub type_: AttributeType,
    #[serde(default = "default_true")]
    pub nullable: bool,
    /// Value assigned by the data store (serial keys, timestamps with defaults).
    #[serde(default)]
    pub generated: bool,
}

fn default_true() -> bool {
    true
}

fn default_primary_key() -> String {
    "id".into()
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ValidationRule {
    #[serde(default)]
    pub required: Option<bool>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub max_length: Option<u32>,
    #[serde(default)]
    pub min_length: Option<u32>,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub allowed: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    pub minimum: Option<f64>,
    #[serde(default)]
    pub maximum: Option<f64>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EntityConfig {
    pub name: String,
    /// Storage table; defaults to the entity name.
    #[serde(default)]
    pub table: Option<String>,
    #[serde(default)]
    pub schema: Option<String>,
    #[serde(default = "default_primary_key")]
    pub primary_key: String,
    pub attributes: Vec<AttributeConfig>,
    #[serde(default)]
    pub validation: HashMap<String, ValidationRule>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ThroughConfig {
    pub entity: String,
    #[serde(default)]
    pub source_key: Option<String>,
    #[serde(default)]
    pub target_key: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AssociationConfig {
    pub from: String,
    pub name: String,
    pub to: String,
    pub cardinality: Cardinality,
    #[serde(default)]
    pub through: Option<ThroughConfig>,
    #[serde(default)]
    pub source_key: Option<String>,
    #[serde(default)]
    pub target_key: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default)]
    pub param: Option<String>,
    #[serde(default)]
    pub attributes: Option<Vec<String>>,
    /// Reject unresolvable field paths with 400 instead of dropping them.
    #[serde(default)]
    pub strict: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IncludeConfig {
    pub relation: String,
    #[serde(default)]
    pub include: Vec<IncludeConfig>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResourceConfig {
    pub entity: String,
    /// Plural template first, optional singular template second (e.g. `["/users", "/users/:id"]`).
    pub endpoints: Vec<String>,
    #[serde(default)]
    pub attributes: Option<Vec<String>>,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub include: Vec<IncludeConfig>,
    /// Attributes that must never be exposed in responses (e.g. password hashes).
    #[serde(default)]
    pub hidden_attributes: Vec<String>,
    #[serde(default)]
    pub actions: Option<Vec<String>>,
}

/// The whole model document.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FullConfig {
    #[serde(default)]
    pub entities: Vec<EntityConfig>,
    #[serde(default)]
    pub associations: Vec<AssociationConfig>,
    #[serde(default)]
    pub resources: Vec<ResourceConfig>,
}
