//! Association graph: named, typed edges between entities, built once from declarations
//! and shared read-only by every request.

use crate::case::same_relation_name;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    One,
    Many,
}

/// Join entity for many-to-many edges. `source_key` points at the from-entity's primary key,
/// `target_key` at the to-entity's primary key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Through {
    pub entity: String,
    pub source_key: String,
    pub target_key: String,
}

/// One edge. For direct edges the join is `to.target_key = from.source_key`.
/// For `through` edges `source_key` is the from-entity primary key and `target_key` the
/// to-entity primary key; the join entity carries the link columns.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssociationEdge {
    pub from_entity: String,
    pub name: String,
    pub to_entity: String,
    pub cardinality: Cardinality,
    pub through: Option<Through>,
    pub source_key: String,
    pub target_key: String,
}

impl AssociationEdge {
    /// True when the edge yields at most one related record.
    pub fn is_singular(&self) -> bool {
        self.cardinality == Cardinality::One && self.through.is_none()
    }
}

#[derive(Clone, Debug, Default)]
pub struct AssociationGraph {
    edges: HashMap<String, Vec<AssociationEdge>>,
}

impl AssociationGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an edge. Returns false (and keeps the existing edge) when the from-entity already
    /// has an edge with the same normalised name.
    pub fn insert(&mut self, edge: AssociationEdge) -> bool {
        let list = self.edges.entry(edge.from_entity.clone()).or_default();
        if list.iter().any(|e| same_relation_name(&e.name, &edge.name)) {
            return false;
        }
        list.push(edge);
        true
    }

    /// Find the edge leaving `from` whose name matches `name`. Exact name wins over a
    /// normalised (case, separator, singular/plural agnostic) match.
    pub fn edge(&self, from: &str, name: &str) -> Option<&AssociationEdge> {
        let list = self.edges.get(from)?;
        list.iter()
            .find(|e| e.name == name)
            .or_else(|| list.iter().find(|e| same_relation_name(&e.name, name)))
    }

    pub fn edges_from(&self, from: &str) -> &[AssociationEdge] {
        self.edges.get(from).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Follow a sequence of relation names from `root`. Returns the edges walked, or the
    /// index of the first segment that did not resolve.
    pub fn walk<'a>(&'a self, root: &str, path: &[String]) -> Result<Vec<&'a AssociationEdge>, usize> {
        let mut current = root.to_string();
        let mut out = Vec::with_capacity(path.len());
        for (i, segment) in path.iter().enumerate() {
            let edge = self.edge(&current, segment).ok_or(i)?;
            current = edge.to_entity.clone();
            out.push(edge);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge(from: &str, name: &str, to: &str, cardinality: Cardinality) -> AssociationEdge {
        AssociationEdge {
            from_entity: from.into(),
            name: name.into(),
            to_entity: to.into(),
            cardinality,
            through: None,
            source_key: "id".into(),
            target_key: format!("{}_id", from),
        }
    }

    #[test]
    fn lookup_accepts_singular_and_plural() {
        let mut g = AssociationGraph::new();
        assert!(g.insert(edge("student", "courses", "course", Cardinality::Many)));
        assert_eq!(g.edge("student", "course").map(|e| e.to_entity.as_str()), Some("course"));
        assert_eq!(g.edge("student", "Courses").map(|e| e.to_entity.as_str()), Some("course"));
        assert!(g.edge("student", "advisor").is_none());
        assert!(g.edge("course", "courses").is_none());
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut g = AssociationGraph::new();
        assert!(g.insert(edge("student", "courses", "course", Cardinality::Many)));
        assert!(!g.insert(edge("student", "course", "course", Cardinality::One)));
        assert_eq!(g.edges_from("student").len(), 1);
    }

    #[test]
    fn walk_reports_first_unresolved_segment() {
        let mut g = AssociationGraph::new();
        g.insert(edge("student", "courses", "course", Cardinality::Many));
        g.insert(edge("course", "requiredTextbooks", "required_textbook", Cardinality::Many));
        let ok = g.walk("student", &["course".into(), "requiredTextbook".into()]).unwrap();
        assert_eq!(ok.len(), 2);
        assert_eq!(ok[1].to_entity, "required_textbook");
        let err = g.walk("student", &["course".into(), "author".into()]).unwrap_err();
        assert_eq!(err, 1);
    }

    #[test]
    fn cycles_are_allowed() {
        let mut g = AssociationGraph::new();
        g.insert(edge("student", "courses", "course", Cardinality::Many));
        g.insert(edge("course", "students", "student", Cardinality::Many));
        let path: Vec<String> = ["course", "student", "course"].iter().map(|s| s.to_string()).collect();
        assert_eq!(g.walk("student", &path).unwrap().len(), 3);
    }
}
