//! Resolve declarations into the runtime model, or load them from a JSON document on disk.

use crate::case::to_snake_case;
use crate::config::resolved::{
    Action, AttributeInfo, EndpointTemplate, EntityModel, IncludeNode, ResolvedModel, ResourceDescriptor,
    SearchSettings, DEFAULT_SEARCH_PARAM,
};
use crate::config::types::*;
use crate::config::validate;
use crate::error::ConfigError;
use crate::graph::{AssociationEdge, AssociationGraph, Cardinality, Through};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

/// Build the resolved model from declarations (validates first).
pub fn resolve(config: &FullConfig) -> Result<ResolvedModel, ConfigError> {
    validate(config)?;

    let entities: HashMap<String, Arc<EntityModel>> = config
        .entities
        .iter()
        .map(|e| (e.name.clone(), Arc::new(entity_model(e))))
        .collect();

    let mut graph = AssociationGraph::new();
    for a in &config.associations {
        let edge = build_edge(a, &entities)?;
        if !graph.insert(edge) {
            return Err(ConfigError::Duplicate {
                kind: "association",
                name: format!("{}.{}", a.from, a.name),
            });
        }
    }

    let mut resources = Vec::with_capacity(config.resources.len());
    for r in &config.resources {
        let entity = entities
            .get(&r.entity)
            .cloned()
            .ok_or_else(|| ConfigError::MissingReference {
                kind: "resource entity",
                id: r.entity.clone(),
            })?;
        let plural = EndpointTemplate::parse(&r.endpoints[0]);
        let singular = r.endpoints.get(1).map(|p| EndpointTemplate::parse(p));
        let attributes = r
            .attributes
            .clone()
            .unwrap_or_else(|| entity.attribute_names().map(str::to_string).collect());
        let search = SearchSettings {
            param: r.search.param.clone().unwrap_or_else(|| DEFAULT_SEARCH_PARAM.to_string()),
            attributes: r.search.attributes.clone().unwrap_or_else(|| {
                attributes
                    .iter()
                    .filter(|a| !r.hidden_attributes.contains(a))
                    .cloned()
                    .collect()
            }),
            strict: r.search.strict,
        };
        let includes = resolve_includes(&graph, &entity.name, &r.include)?;
        let actions = match &r.actions {
            Some(list) => list.iter().filter_map(|a| Action::parse(a)).collect(),
            None => Action::ALL.to_vec(),
        };
        tracing::debug!(entity = %entity.name, plural = %plural.path, "resource registered");
        resources.push(Arc::new(ResourceDescriptor {
            entity,
            plural,
            singular,
            attributes,
            search,
            includes,
            hidden_attributes: r.hidden_attributes.iter().cloned().collect::<HashSet<_>>(),
            actions,
        }));
    }

    Ok(ResolvedModel {
        entities,
        graph: Arc::new(graph),
        resources,
    })
}

fn entity_model(e: &EntityConfig) -> EntityModel {
    EntityModel {
        name: e.name.clone(),
        schema_name: e.schema.clone(),
        table_name: e.table.clone().unwrap_or_else(|| e.name.clone()),
        primary_key: e.primary_key.clone(),
        attributes: e
            .attributes
            .iter()
            .map(|a| AttributeInfo {
                name: a.name.clone(),
                type_: a.type_,
                nullable: a.nullable,
                generated: a.generated,
            })
            .collect(),
        validation: e.validation.clone(),
    }
}

fn build_edge(a: &AssociationConfig, entities: &HashMap<String, Arc<EntityModel>>) -> Result<AssociationEdge, ConfigError> {
    let lookup = |name: &str| {
        entities.get(name).ok_or_else(|| ConfigError::MissingReference {
            kind: "entity",
            id: name.to_string(),
        })
    };
    let from = lookup(&a.from)?;
    let to = lookup(&a.to)?;

    let (source_key, target_key, through) = match (&a.through, a.cardinality) {
        (Some(t), _) => {
            let join = lookup(&t.entity)?;
            let through = Through {
                entity: t.entity.clone(),
                source_key: t.source_key.clone().unwrap_or_else(|| format!("{}_id", to_snake_case(&from.name))),
                target_key: t.target_key.clone().unwrap_or_else(|| format!("{}_id", to_snake_case(&to.name))),
            };
            require_attribute(join, &through.source_key)?;
            require_attribute(join, &through.target_key)?;
            let source = a.source_key.clone().unwrap_or_else(|| from.primary_key.clone());
            let target = a.target_key.clone().unwrap_or_else(|| to.primary_key.clone());
            (source, target, Some(through))
        }
        (None, Cardinality::One) => {
            let source = a.source_key.clone().unwrap_or_else(|| format!("{}_id", to_snake_case(&a.name)));
            let target = a.target_key.clone().unwrap_or_else(|| to.primary_key.clone());
            (source, target, None)
        }
        (None, Cardinality::Many) => {
            let source = a.source_key.clone().unwrap_or_else(|| from.primary_key.clone());
            let target = a.target_key.clone().unwrap_or_else(|| format!("{}_id", to_snake_case(&from.name)));
            (source, target, None)
        }
    };
    require_attribute(from, &source_key)?;
    require_attribute(to, &target_key)?;

    Ok(AssociationEdge {
        from_entity: a.from.clone(),
        name: a.name.clone(),
        to_entity: a.to.clone(),
        cardinality: a.cardinality,
        through,
        source_key,
        target_key,
    })
}

fn require_attribute(entity: &EntityModel, name: &str) -> Result<(), ConfigError> {
    if entity.has_attribute(name) {
        Ok(())
    } else {
        Err(ConfigError::UnknownAttribute {
            entity: entity.name.clone(),
            attribute: name.to_string(),
        })
    }
}

fn resolve_includes(graph: &AssociationGraph, from: &str, includes: &[IncludeConfig]) -> Result<Vec<IncludeNode>, ConfigError> {
    includes
        .iter()
        .map(|inc| {
            let edge = graph.edge(from, &inc.relation).ok_or_else(|| ConfigError::UnknownRelation {
                entity: from.to_string(),
                relation: inc.relation.clone(),
            })?;
            Ok(IncludeNode {
                edge: edge.clone(),
                children: resolve_includes(graph, &edge.to_entity, &inc.include)?,
            })
        })
        .collect()
}

/// Read a model document from a JSON file.
pub async fn load_from_path(path: impl AsRef<Path>) -> Result<FullConfig, ConfigError> {
    let path = path.as_ref();
    tracing::debug!(path = %path.display(), "loading model declarations");
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
    serde_json::from_str(&text).map_err(|e| ConfigError::Load(e.to_string()))
}
