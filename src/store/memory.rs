//! In-memory store: one table of JSON records per entity. Evaluates predicate and include
//! trees across one, many and through edges the same way the SQL backend does.

use crate::config::{AttributeType, EntityModel, IncludeNode, Record};
use crate::error::DataError;
use crate::graph::AssociationEdge;
use crate::search::{value_text, PredicateNode};
use crate::store::{DataStore, FindQuery, Instance};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::RwLock;

type Tables = HashMap<String, Vec<Record>>;

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append raw rows (objects) to an entity's table, e.g. fixtures or join-table links.
    pub async fn seed(&self, entity: &str, rows: impl IntoIterator<Item = Value>) {
        let mut tables = self.tables.write().await;
        let table = tables.entry(entity.to_string()).or_default();
        table.extend(rows.into_iter().filter_map(|v| match v {
            Value::Object(m) => Some(m),
            _ => None,
        }));
    }

    /// Snapshot of an entity's table.
    pub async fn rows(&self, entity: &str) -> Vec<Record> {
        self.tables.read().await.get(entity).cloned().unwrap_or_default()
    }
}

/// Loose equality on textual form so `1` matches `"1"`; null never matches.
fn same_value(a: &Value, b: &Value) -> bool {
    match (value_text(a), value_text(b)) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

fn matches_criteria(record: &Record, criteria: &Record) -> bool {
    criteria
        .iter()
        .all(|(k, v)| record.get(k).is_some_and(|rv| same_value(rv, v)))
}

fn related<'t>(tables: &'t Tables, edge: &AssociationEdge, record: &Record) -> Vec<&'t Record> {
    let Some(key) = record.get(&edge.source_key).filter(|v| !v.is_null()) else {
        return Vec::new();
    };
    let targets = tables.get(&edge.to_entity).map(Vec::as_slice).unwrap_or(&[]);
    match &edge.through {
        Some(through) => {
            let links: Vec<&Value> = tables
                .get(&through.entity)
                .map(Vec::as_slice)
                .unwrap_or(&[])
                .iter()
                .filter(|row| row.get(&through.source_key).is_some_and(|v| same_value(v, key)))
                .filter_map(|row| row.get(&through.target_key))
                .collect();
            targets
                .iter()
                .filter(|t| {
                    t.get(&edge.target_key)
                        .is_some_and(|tv| links.iter().any(|l| same_value(l, tv)))
                })
                .collect()
        }
        None => targets
            .iter()
            .filter(|t| t.get(&edge.target_key).is_some_and(|tv| same_value(tv, key)))
            .collect(),
    }
}

fn matches_tree(tables: &Tables, node: &PredicateNode, record: &Record) -> bool {
    node.matches_local(record)
        && node.children.iter().all(|child| match &child.edge {
            Some(edge) => related(tables, edge, record)
                .into_iter()
                .any(|r| matches_tree(tables, child, r)),
            None => true,
        })
}

/// Copy of `record` with every include attached under the relation name. Relations that
/// also appear in `filter` only carry the related records satisfying it.
fn with_includes(tables: &Tables, record: &Record, includes: &[IncludeNode], filter: Option<&PredicateNode>) -> Record {
    let mut out = record.clone();
    for inc in includes {
        let sub_filter = filter.and_then(|f| f.child(inc.relation()));
        let rows: Vec<Value> = related(tables, &inc.edge, record)
            .into_iter()
            .filter(|r| sub_filter.map_or(true, |f| matches_tree(tables, f, r)))
            .map(|r| Value::Object(with_includes(tables, r, &inc.children, sub_filter)))
            .collect();
        let value = if inc.edge.is_singular() {
            rows.into_iter().next().unwrap_or(Value::Null)
        } else {
            Value::Array(rows)
        };
        out.insert(inc.relation().to_string(), value);
    }
    out
}

fn next_id(rows: &[Record], pk: &str) -> i64 {
    rows.iter()
        .filter_map(|r| r.get(pk).and_then(Value::as_i64))
        .max()
        .unwrap_or(0)
        + 1
}

#[async_trait]
impl DataStore for MemoryStore {
    async fn find_one(&self, entity: &EntityModel, query: &FindQuery) -> Result<Option<Instance>, DataError> {
        Ok(self.find_all(entity, query).await?.into_iter().next())
    }

    async fn find_all(&self, entity: &EntityModel, query: &FindQuery) -> Result<Vec<Instance>, DataError> {
        let tables = self.tables.read().await;
        let rows = tables.get(&entity.name).map(Vec::as_slice).unwrap_or(&[]);
        let filter = (!query.filter.is_empty()).then_some(&query.filter);
        Ok(rows
            .iter()
            .filter(|r| matches_criteria(r, &query.criteria))
            .filter(|r| filter.map_or(true, |f| matches_tree(&tables, f, r)))
            .map(|r| Instance::persisted(with_includes(&tables, r, &query.includes, filter)))
            .collect())
    }

    async fn persist(&self, entity: &EntityModel, instance: Instance) -> Result<Instance, DataError> {
        let mut tables = self.tables.write().await;
        let table = tables.entry(entity.name.clone()).or_default();
        let pk = entity.primary_key.as_str();
        // relation data attached by includes is not stored
        let mut values: Record = instance
            .values()
            .iter()
            .filter(|(k, _)| entity.has_attribute(k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        if instance.is_new_record() {
            for attr in entity.attributes.iter().filter(|a| a.generated) {
                if values.get(&attr.name).is_some_and(|v| !v.is_null()) {
                    continue;
                }
                match attr.type_ {
                    AttributeType::Integer if attr.name == pk => {
                        values.insert(attr.name.clone(), Value::from(next_id(table, pk)));
                    }
                    AttributeType::Uuid => {
                        values.insert(attr.name.clone(), Value::String(uuid::Uuid::new_v4().to_string()));
                    }
                    AttributeType::Timestamp => {
                        values.insert(attr.name.clone(), Value::String(chrono::Utc::now().to_rfc3339()));
                    }
                    _ => {}
                }
            }
            let key = values.get(pk).cloned().unwrap_or(Value::Null);
            if key.is_null() {
                return Err(DataError::Constraint(format!("{}.{} must not be null", entity.name, pk)));
            }
            if table.iter().any(|r| r.get(pk).is_some_and(|v| same_value(v, &key))) {
                return Err(DataError::Constraint(format!("duplicate key {}.{} = {}", entity.name, pk, key)));
            }
            table.push(values.clone());
        } else {
            let key = values.get(pk).cloned().unwrap_or(Value::Null);
            let Some(row) = table.iter_mut().find(|r| r.get(pk).is_some_and(|v| same_value(v, &key))) else {
                return Err(DataError::Backend(format!("{} {} no longer exists", entity.name, key)));
            };
            *row = values.clone();
        }
        Ok(Instance::persisted(values))
    }

    async fn destroy(&self, entity: &EntityModel, instance: &Instance) -> Result<(), DataError> {
        let mut tables = self.tables.write().await;
        let pk = entity.primary_key.as_str();
        let key = instance.get(pk).cloned().unwrap_or(Value::Null);
        let table = tables.entry(entity.name.clone()).or_default();
        let before = table.len();
        table.retain(|r| !r.get(pk).is_some_and(|v| same_value(v, &key)));
        if table.len() == before {
            return Err(DataError::Backend(format!("{} {} no longer exists", entity.name, key)));
        }
        Ok(())
    }
}
