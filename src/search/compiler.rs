//! Compiles search terms into a predicate tree rooted at a resource's entity.
//!
//! Multi-segment field paths walk the association graph: every segment but the last names
//! an edge, the last names an attribute of the entity reached. Paths that do not resolve
//! are reported as `Unresolved` and contribute no constraint.

use crate::config::{EntityModel, IncludeNode, ResourceDescriptor};
use crate::graph::{AssociationEdge, AssociationGraph};
use crate::search::parser::SearchTerm;
use crate::search::predicate::{Condition, Filter, PredicateNode};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UnresolvedReason {
    UnknownRelation { entity: String, segment: String },
    UnknownAttribute { entity: String, attribute: String },
    EmptySegment,
}

impl fmt::Display for UnresolvedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnresolvedReason::UnknownRelation { entity, segment } => {
                write!(f, "no relation '{}' on '{}'", segment, entity)
            }
            UnresolvedReason::UnknownAttribute { entity, attribute } => {
                write!(f, "no attribute '{}' on '{}'", attribute, entity)
            }
            UnresolvedReason::EmptySegment => f.write_str("empty path segment"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Unresolved {
    pub raw: String,
    pub reason: UnresolvedReason,
}

/// Outcome of resolving one term.
#[derive(Debug)]
pub enum Resolution<'g> {
    /// Disjunction over the root's searchable attributes.
    Unscoped(Vec<Condition>),
    Scoped { edges: Vec<&'g AssociationEdge>, condition: Condition },
    Unresolved(Unresolved),
}

#[derive(Clone, Debug)]
pub struct CompiledSearch {
    pub predicate: PredicateNode,
    pub unresolved: Vec<Unresolved>,
}

impl CompiledSearch {
    pub fn joins(&self) -> Vec<IncludeNode> {
        self.predicate.joins()
    }
}

pub struct PredicateCompiler<'a> {
    graph: &'a AssociationGraph,
    entities: &'a HashMap<String, Arc<EntityModel>>,
}

impl<'a> PredicateCompiler<'a> {
    pub fn new(graph: &'a AssociationGraph, entities: &'a HashMap<String, Arc<EntityModel>>) -> Self {
        Self { graph, entities }
    }

    pub fn compile(&self, resource: &ResourceDescriptor, terms: &[SearchTerm]) -> CompiledSearch {
        let mut predicate = PredicateNode::root(resource.entity.name.clone());
        let mut unresolved = Vec::new();
        for term in terms {
            match self.resolve(resource, term) {
                Resolution::Unscoped(conditions) => predicate.filters.push(Filter::AnyOf(conditions)),
                Resolution::Scoped { edges, condition } => {
                    let mut node = &mut predicate;
                    for edge in edges {
                        node = node.child_mut(edge);
                    }
                    node.filters.push(Filter::Condition(condition));
                }
                Resolution::Unresolved(u) => {
                    tracing::debug!(term = %u.raw, reason = %u.reason, "search term dropped");
                    unresolved.push(u);
                }
            }
        }
        CompiledSearch { predicate, unresolved }
    }

    pub fn resolve(&self, resource: &ResourceDescriptor, term: &SearchTerm) -> Resolution<'a> {
        let Some(path) = &term.field_path else {
            let conditions = resource
                .search
                .attributes
                .iter()
                .map(|a| Condition::contains(a.clone(), term.value.clone()))
                .collect();
            return Resolution::Unscoped(conditions);
        };
        let unresolved = |reason| {
            Resolution::Unresolved(Unresolved {
                raw: term.raw.clone(),
                reason,
            })
        };
        if path.iter().any(String::is_empty) {
            return unresolved(UnresolvedReason::EmptySegment);
        }
        let Some((attribute, relations)) = path.split_last() else {
            return unresolved(UnresolvedReason::EmptySegment);
        };

        let edges = match self.graph.walk(&resource.entity.name, relations) {
            Ok(edges) => edges,
            Err(idx) => {
                let entity = match idx {
                    0 => resource.entity.name.clone(),
                    _ => self
                        .graph
                        .walk(&resource.entity.name, &relations[..idx])
                        .ok()
                        .and_then(|e| e.last().map(|e| e.to_entity.clone()))
                        .unwrap_or_default(),
                };
                return unresolved(UnresolvedReason::UnknownRelation {
                    entity,
                    segment: relations[idx].clone(),
                });
            }
        };

        let target_entity = edges
            .last()
            .map(|e| e.to_entity.as_str())
            .unwrap_or(resource.entity.name.as_str());
        let found = self.entities.get(target_entity).and_then(|e| e.attribute(attribute));
        match found {
            // hidden attributes are never searchable on the root
            Some(info) if !(edges.is_empty() && resource.hidden_attributes.contains(&info.name)) => {
                Resolution::Scoped {
                    edges,
                    condition: Condition::contains(info.name.clone(), term.value.clone()),
                }
            }
            _ => unresolved(UnresolvedReason::UnknownAttribute {
                entity: target_entity.to_string(),
                attribute: attribute.clone(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{resolve, FullConfig, ResolvedModel};
    use crate::search::parser::{parse_term, parse_terms};
    use serde_json::json;

    fn model() -> ResolvedModel {
        let config: FullConfig = serde_json::from_value(json!({
            "entities": [
                { "name": "student", "attributes": [
                    { "name": "id", "type": "integer" }, { "name": "name" }, { "name": "secret" } ] },
                { "name": "course", "attributes": [
                    { "name": "id", "type": "integer" }, { "name": "name" } ] },
                { "name": "enrollment", "primary_key": "student_id", "attributes": [
                    { "name": "student_id", "type": "integer" }, { "name": "course_id", "type": "integer" } ] },
                { "name": "requiredTextbook", "attributes": [
                    { "name": "id", "type": "integer" }, { "name": "name" }, { "name": "course_id", "type": "integer" } ] }
            ],
            "associations": [
                { "from": "student", "name": "courses", "to": "course", "cardinality": "many",
                  "through": { "entity": "enrollment" } },
                { "from": "course", "name": "requiredTextbooks", "to": "requiredTextbook", "cardinality": "many" }
            ],
            "resources": [
                { "entity": "student", "endpoints": ["/students", "/students/:id"],
                  "search": { "attributes": ["name"] }, "hidden_attributes": ["secret"] }
            ]
        }))
        .unwrap();
        resolve(&config).unwrap()
    }

    fn compile(model: &ResolvedModel, raw: &[&str]) -> CompiledSearch {
        let resource = model.resource_by_path("/students").unwrap();
        PredicateCompiler::new(&model.graph, &model.entities).compile(resource, &parse_terms(raw.iter()))
    }

    #[test]
    fn empty_query_compiles_to_empty_tree() {
        let m = model();
        let c = compile(&m, &[]);
        assert!(c.predicate.is_empty());
        assert!(c.unresolved.is_empty());
    }

    #[test]
    fn unscoped_term_ors_configured_attributes() {
        let m = model();
        let c = compile(&m, &["Jane"]);
        assert_eq!(c.predicate.filters, vec![Filter::AnyOf(vec![Condition::contains("name", "Jane")])]);
    }

    #[test]
    fn nested_path_builds_nested_nodes() {
        let m = model();
        let c = compile(&m, &["course.requiredTextbook.name:algebra"]);
        let courses = c.predicate.child("courses").unwrap();
        assert!(courses.filters.is_empty());
        let books = courses.child("requiredTextbooks").unwrap();
        assert_eq!(books.entity, "requiredTextbook");
        assert_eq!(books.filters, vec![Filter::Condition(Condition::contains("name", "algebra"))]);
        assert_eq!(c.predicate.relation_paths(), vec!["courses", "courses.requiredTextbooks"]);
    }

    #[test]
    fn scoped_and_unscoped_terms_combine() {
        let m = model();
        let c = compile(&m, &["course.name:science", "Jane"]);
        assert_eq!(c.predicate.filters.len(), 1);
        assert_eq!(c.predicate.children.len(), 1);
    }

    #[test]
    fn unknown_paths_are_reported_not_compiled() {
        let m = model();
        let c = compile(&m, &["advisor.name:smith", "course.credits:3", "nickname:jj", "course..name:x"]);
        assert!(c.predicate.is_empty());
        assert_eq!(c.unresolved.len(), 4);
        assert_eq!(
            c.unresolved[0].reason,
            UnresolvedReason::UnknownRelation { entity: "student".into(), segment: "advisor".into() }
        );
        assert_eq!(
            c.unresolved[1].reason,
            UnresolvedReason::UnknownAttribute { entity: "course".into(), attribute: "credits".into() }
        );
        assert_eq!(c.unresolved[3].reason, UnresolvedReason::EmptySegment);
    }

    #[test]
    fn hidden_root_attributes_are_not_searchable() {
        let m = model();
        let c = compile(&m, &["secret:abc"]);
        assert!(c.predicate.is_empty());
        assert_eq!(c.unresolved.len(), 1);
    }

    #[test]
    fn single_segment_resolves_on_root() {
        let m = model();
        let resource = m.resource_by_path("/students").unwrap();
        let compiler = PredicateCompiler::new(&m.graph, &m.entities);
        match compiler.resolve(resource, &parse_term("NAME:jane").unwrap()) {
            Resolution::Scoped { edges, condition } => {
                assert!(edges.is_empty());
                assert_eq!(condition, Condition::contains("name", "jane"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
