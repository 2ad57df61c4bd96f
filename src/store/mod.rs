//! Data-access capability consumed by the controllers, with an in-memory and a PostgreSQL
//! implementation.

mod coerce;
mod memory;
mod postgres;
pub mod validation;

pub use coerce::{coerce_param, parse_param};
pub use memory::MemoryStore;
pub use postgres::PgStore;

use crate::config::{EntityModel, IncludeNode, Record};
use crate::error::DataError;
use crate::search::PredicateNode;
use async_trait::async_trait;
use serde_json::Value;

/// One entity instance as seen by the pipeline.
#[derive(Clone, Debug, PartialEq)]
pub struct Instance {
    values: Record,
    new_record: bool,
}

impl Instance {
    /// Built but never saved.
    pub fn unsaved(values: Record) -> Self {
        Self {
            values,
            new_record: true,
        }
    }

    /// Loaded from, or written to, the store.
    pub fn persisted(values: Record) -> Self {
        Self {
            values,
            new_record: false,
        }
    }

    pub fn is_new_record(&self) -> bool {
        self.new_record
    }

    pub fn values(&self) -> &Record {
        &self.values
    }

    pub fn into_values(self) -> Record {
        self.values
    }

    pub fn get(&self, attribute: &str) -> Option<&Value> {
        self.values.get(attribute)
    }

    /// Relation data loaded under the names of `includes`.
    pub fn relations(&self, includes: &[IncludeNode]) -> Record {
        includes
            .iter()
            .filter_map(|inc| {
                let name = inc.relation();
                self.values.get(name).map(|v| (name.to_string(), v.clone()))
            })
            .collect()
    }

    /// Attach relation data alongside the attribute values.
    pub fn attach_relations(&mut self, relations: Record) {
        self.values.extend(relations);
    }

    /// Overwrite declared attributes; unknown keys are ignored.
    pub fn set_attributes(&mut self, entity: &EntityModel, attributes: &Record) {
        for (k, v) in attributes {
            if entity.has_attribute(k) {
                self.values.insert(k.clone(), v.clone());
            }
        }
    }
}

/// Lookup specification: exact criteria on the root, a predicate tree, and relations to
/// eager-load. Included relations that also appear in the predicate are filtered by it.
#[derive(Clone, Debug)]
pub struct FindQuery {
    pub criteria: Record,
    pub filter: PredicateNode,
    pub includes: Vec<IncludeNode>,
}

impl FindQuery {
    pub fn new(entity: &EntityModel) -> Self {
        Self {
            criteria: Record::new(),
            filter: PredicateNode::root(entity.name.clone()),
            includes: Vec::new(),
        }
    }

    pub fn with_criteria(mut self, criteria: Record) -> Self {
        self.criteria = criteria;
        self
    }

    pub fn with_filter(mut self, filter: PredicateNode) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_includes(mut self, includes: Vec<IncludeNode>) -> Self {
        self.includes = includes;
        self
    }
}

#[async_trait]
pub trait DataStore: Send + Sync {
    /// New unsaved instance holding only declared attributes.
    fn build(&self, entity: &EntityModel, attributes: &Record) -> Instance {
        let values = attributes
            .iter()
            .filter(|(k, _)| entity.has_attribute(k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Instance::unsaved(values)
    }

    async fn find_one(&self, entity: &EntityModel, query: &FindQuery) -> Result<Option<Instance>, DataError>;

    async fn find_all(&self, entity: &EntityModel, query: &FindQuery) -> Result<Vec<Instance>, DataError>;

    async fn validate(&self, entity: &EntityModel, instance: Instance) -> Result<Instance, DataError> {
        validation::validate_instance(entity, &instance)?;
        Ok(instance)
    }

    /// Insert a new instance or update an existing one; returns the stored state.
    async fn persist(&self, entity: &EntityModel, instance: Instance) -> Result<Instance, DataError>;

    async fn destroy(&self, entity: &EntityModel, instance: &Instance) -> Result<(), DataError>;
}
