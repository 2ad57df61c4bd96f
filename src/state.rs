//! Shared application state. Read-only after startup; every request works on its own context.

use crate::config::settings::DEFAULT_BODY_LIMIT;
use crate::config::{ResolvedModel, ResourceDescriptor};
use crate::controllers::ResourceScope;
use crate::store::DataStore;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub model: Arc<ResolvedModel>,
    pub store: Arc<dyn DataStore>,
    pub body_limit: usize,
}

impl AppState {
    pub fn new(model: ResolvedModel, store: Arc<dyn DataStore>) -> Self {
        Self {
            model: Arc::new(model),
            store,
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }

    pub fn with_body_limit(mut self, limit: usize) -> Self {
        self.body_limit = limit;
        self
    }

    pub fn scope(&self, resource: &Arc<ResourceDescriptor>) -> ResourceScope {
        ResourceScope::new(resource.clone(), self.model.clone(), self.store.clone())
    }
}
