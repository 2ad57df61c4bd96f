//! Resolved model: declarations validated and flattened for runtime use. Immutable after
//! registration and shared by reference across requests.

use crate::case::same_attribute_name;
use crate::config::{AttributeType, ValidationRule};
use crate::graph::{AssociationEdge, AssociationGraph};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

/// Attribute values of one entity instance.
pub type Record = Map<String, Value>;

#[derive(Clone, Debug)]
pub struct AttributeInfo {
    pub name: String,
    pub type_: AttributeType,
    pub nullable: bool,
    pub generated: bool,
}

#[derive(Clone, Debug)]
pub struct EntityModel {
    pub name: String,
    pub schema_name: Option<String>,
    pub table_name: String,
    pub primary_key: String,
    pub attributes: Vec<AttributeInfo>,
    pub validation: HashMap<String, ValidationRule>,
}

impl EntityModel {
    /// Exact name first, then a case/separator-insensitive match.
    pub fn attribute(&self, name: &str) -> Option<&AttributeInfo> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .or_else(|| self.attributes.iter().find(|a| same_attribute_name(&a.name, name)))
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.iter().any(|a| a.name == name)
    }

    pub fn attribute_names(&self) -> impl Iterator<Item = &str> {
        self.attributes.iter().map(|a| a.name.as_str())
    }
}

/// Path template such as `/users/:id`. Placeholders occupy whole segments, matching axum's
/// route syntax, so a template can be registered as a route unchanged.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EndpointTemplate {
    pub path: String,
    pub attributes: Vec<String>,
}

impl EndpointTemplate {
    pub fn parse(path: &str) -> Self {
        let attributes = path
            .split('/')
            .filter_map(|seg| seg.strip_prefix(':'))
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect();
        Self {
            path: path.to_string(),
            attributes,
        }
    }

    /// Substitute every placeholder with the matching attribute of `record`, percent-encoded
    /// as a single path segment. `None` when a placeholder has no usable value.
    pub fn substitute(&self, record: &Record) -> Option<String> {
        let mut parts = Vec::new();
        for seg in self.path.split('/') {
            match seg.strip_prefix(':') {
                Some(name) if !name.is_empty() => parts.push(value_to_path_segment(record.get(name)?)?),
                _ => parts.push(seg.to_string()),
            }
        }
        Some(parts.join("/"))
    }
}

fn value_to_path_segment(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(urlencoding::encode(s).into_owned()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// One level of the eager-load tree: relation followed from the parent entity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IncludeNode {
    pub edge: AssociationEdge,
    pub children: Vec<IncludeNode>,
}

impl IncludeNode {
    pub fn relation(&self) -> &str {
        &self.edge.name
    }
}

/// Merge `addition` into `tree`, sharing nodes for relations already present.
pub fn merge_includes(tree: &mut Vec<IncludeNode>, addition: &[IncludeNode]) {
    for node in addition {
        match tree.iter_mut().find(|n| n.edge.name == node.edge.name) {
            Some(existing) => merge_includes(&mut existing.children, &node.children),
            None => tree.push(node.clone()),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Action {
    Create,
    Read,
    Update,
    Delete,
    List,
}

impl Action {
    pub const ALL: [Action; 5] = [Action::Create, Action::Read, Action::Update, Action::Delete, Action::List];

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "create" => Some(Action::Create),
            "read" => Some(Action::Read),
            "update" => Some(Action::Update),
            "delete" => Some(Action::Delete),
            "list" | "search" => Some(Action::List),
            _ => None,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Action::Create => "create",
            Action::Read => "read",
            Action::Update => "update",
            Action::Delete => "delete",
            Action::List => "list",
        };
        f.write_str(s)
    }
}

pub const DEFAULT_SEARCH_PARAM: &str = "q";

#[derive(Clone, Debug)]
pub struct SearchSettings {
    pub param: String,
    /// Attributes an unscoped term is matched against.
    pub attributes: Vec<String>,
    pub strict: bool,
}

#[derive(Clone, Debug)]
pub struct ResourceDescriptor {
    pub entity: Arc<EntityModel>,
    pub plural: EndpointTemplate,
    pub singular: Option<EndpointTemplate>,
    /// Exposed attribute names.
    pub attributes: Vec<String>,
    pub search: SearchSettings,
    pub includes: Vec<IncludeNode>,
    pub hidden_attributes: HashSet<String>,
    pub actions: Vec<Action>,
}

impl ResourceDescriptor {
    pub fn allows(&self, action: Action) -> bool {
        self.actions.contains(&action)
    }

    /// Endpoint a given action is served on.
    pub fn endpoint_for(&self, action: Action) -> Option<&EndpointTemplate> {
        match action {
            Action::Create | Action::List => Some(&self.plural),
            Action::Read | Action::Update | Action::Delete => self.singular.as_ref(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ResolvedModel {
    pub entities: HashMap<String, Arc<EntityModel>>,
    pub graph: Arc<AssociationGraph>,
    pub resources: Vec<Arc<ResourceDescriptor>>,
}

impl ResolvedModel {
    pub fn entity(&self, name: &str) -> Option<&Arc<EntityModel>> {
        self.entities.get(name)
    }

    pub fn resource_by_path(&self, path: &str) -> Option<&Arc<ResourceDescriptor>> {
        self.resources
            .iter()
            .find(|r| r.plural.path == path || r.singular.as_ref().is_some_and(|s| s.path == path))
    }
}
