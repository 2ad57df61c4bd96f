//! Predicate tree: per-relation filter conditions handed to the data-access layer as an
//! "eager-load relation R and filter R by C" specification.

use crate::config::{IncludeNode, Record};
use crate::graph::AssociationEdge;
use serde_json::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operator {
    /// Case-insensitive substring of the attribute's textual form.
    Contains,
    /// Exact textual equality.
    Equals,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Condition {
    pub attribute: String,
    pub operator: Operator,
    pub value: String,
}

impl Condition {
    pub fn contains(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            operator: Operator::Contains,
            value: value.into(),
        }
    }

    pub fn equals(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            operator: Operator::Equals,
            value: value.into(),
        }
    }

    pub fn matches(&self, record: &Record) -> bool {
        let Some(text) = record.get(&self.attribute).and_then(value_text) else {
            return false;
        };
        match self.operator {
            Operator::Contains => text.to_lowercase().contains(&self.value.to_lowercase()),
            Operator::Equals => text == self.value,
        }
    }
}

/// Textual form used for matching; `None` for null.
pub fn value_text(v: &Value) -> Option<String> {
    match v {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}

/// One conjunct of a node: a single condition, or a disjunction produced by an unscoped term.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Filter {
    Condition(Condition),
    AnyOf(Vec<Condition>),
}

impl Filter {
    pub fn matches(&self, record: &Record) -> bool {
        match self {
            Filter::Condition(c) => c.matches(record),
            Filter::AnyOf(cs) => cs.iter().any(|c| c.matches(record)),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PredicateNode {
    pub entity: String,
    /// Edge followed from the parent; `None` on the root.
    pub edge: Option<AssociationEdge>,
    /// Combined with AND.
    pub filters: Vec<Filter>,
    /// Each child requires at least one related record satisfying it.
    pub children: Vec<PredicateNode>,
}

impl PredicateNode {
    pub fn root(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            edge: None,
            filters: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn relation_name(&self) -> Option<&str> {
        self.edge.as_ref().map(|e| e.name.as_str())
    }

    /// Child for `edge`, created on first use so repeated paths share one node.
    pub fn child_mut(&mut self, edge: &AssociationEdge) -> &mut PredicateNode {
        let idx = match self.children.iter().position(|c| c.relation_name() == Some(edge.name.as_str())) {
            Some(idx) => idx,
            None => {
                self.children.push(PredicateNode {
                    entity: edge.to_entity.clone(),
                    edge: Some(edge.clone()),
                    filters: Vec::new(),
                    children: Vec::new(),
                });
                self.children.len() - 1
            }
        };
        &mut self.children[idx]
    }

    pub fn child(&self, relation: &str) -> Option<&PredicateNode> {
        self.children.iter().find(|c| c.relation_name() == Some(relation))
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty() && self.children.is_empty()
    }

    /// Local filters only; children are evaluated by the caller against related records.
    pub fn matches_local(&self, record: &Record) -> bool {
        self.filters.iter().all(|f| f.matches(record))
    }

    /// Relations that must be eagerly joined, as an include tree.
    pub fn joins(&self) -> Vec<IncludeNode> {
        self.children
            .iter()
            .filter_map(|c| {
                c.edge.as_ref().map(|edge| IncludeNode {
                    edge: edge.clone(),
                    children: c.joins(),
                })
            })
            .collect()
    }

    /// Dotted relation paths of every node below the root, parents first.
    pub fn relation_paths(&self) -> Vec<String> {
        let mut out = Vec::new();
        collect_paths(self, "", &mut out);
        out
    }
}

fn collect_paths(node: &PredicateNode, prefix: &str, out: &mut Vec<String>) {
    for c in &node.children {
        let Some(name) = c.relation_name() else { continue };
        let path = if prefix.is_empty() {
            name.to_string()
        } else {
            format!("{}.{}", prefix, name)
        };
        out.push(path.clone());
        collect_paths(c, &path, out);
    }
}
